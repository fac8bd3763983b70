use std::collections::HashMap;
use std::sync::Arc;

use loomflow_core::handler::{HandlerKind, NodeHandler};

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct HandlerKey {
    app_id: String,
    kind: HandlerKind,
    key: String,
}

/// Registry of node handlers, keyed by `(app, kind, action/trigger id)`.
///
/// Resolution is a plain map lookup returning a typed handler; an unknown
/// id is a workflow-validity error at the call site, not a panic.
pub struct HandlerRegistry {
    handlers: HashMap<HandlerKey, Arc<dyn NodeHandler>>,
}

impl HandlerRegistry {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Register a handler under its own (app, kind, key) identity.
    pub fn register(&mut self, handler: impl NodeHandler) {
        let key = HandlerKey {
            app_id: handler.app_id().to_string(),
            kind: handler.kind(),
            key: handler.key().to_string(),
        };
        self.handlers.insert(key, Arc::new(handler));
    }

    pub fn resolve(
        &self,
        app_id: &str,
        kind: HandlerKind,
        key: &str,
    ) -> Option<Arc<dyn NodeHandler>> {
        self.handlers
            .get(&HandlerKey {
                app_id: app_id.to_string(),
                kind,
                key: key.to_string(),
            })
            .cloned()
    }

    /// Registered (app, kind, key) triples, for diagnostics.
    pub fn list(&self) -> Vec<(String, HandlerKind, String)> {
        self.handlers
            .keys()
            .map(|k| (k.app_id.clone(), k.kind, k.key.clone()))
            .collect()
    }

    /// A registry with the builtin handler set registered.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();

        // Triggers
        registry.register(crate::builtin::triggers::ManualTrigger);
        registry.register(crate::builtin::triggers::WebhookTrigger);

        // Actions
        registry.register(crate::builtin::http::HttpRequestHandler);
        registry.register(crate::builtin::delay::DelayHandler);
        registry.register(crate::builtin::approval::ApprovalHandler);
        registry.register(crate::builtin::transform::TransformHandler);
        registry.register(crate::builtin::decide_path::DecidePathHandler);

        registry
    }
}

impl Default for HandlerRegistry {
    fn default() -> Self {
        Self::new()
    }
}
