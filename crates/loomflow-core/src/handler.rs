use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};

use crate::error::Result;

/// Whether a handler implements a trigger or an action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HandlerKind {
    Trigger,
    Action,
}

impl std::fmt::Display for HandlerKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            HandlerKind::Trigger => "trigger",
            HandlerKind::Action => "action",
        })
    }
}

/// Run context passed to every handler invocation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunContext {
    pub workflow_id: String,
    pub execution_id: String,
    pub workspace_id: String,
    pub project_id: String,
    pub node_id: String,
}

/// The fixed response contract every node handler must satisfy.
///
/// `NeedsInput` and `Scheduled` are suspensions, not errors: the node halts
/// and waits for an external resumption signal.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum HandlerResponse {
    Success {
        output: serde_json::Value,
    },
    Failure {
        message: String,
    },
    NeedsInput {
        payload: serde_json::Value,
    },
    Scheduled {
        payload: serde_json::Value,
        scheduled_at: DateTime<Utc>,
    },
}

/// A pluggable node handler. Opaque to the engine beyond this contract.
///
/// A returned `Err` is treated the same as `HandlerResponse::Failure`.
pub trait NodeHandler: Send + Sync + 'static {
    /// Application this handler belongs to (e.g. "core", "http").
    fn app_id(&self) -> &str;

    /// Trigger or action.
    fn kind(&self) -> HandlerKind;

    /// The action id or trigger id this handler serves.
    fn key(&self) -> &str;

    /// Run the handler with the node's configured `value`, the upstream
    /// input (if any), and the run context.
    fn run(
        &self,
        config: serde_json::Value,
        input: Option<serde_json::Value>,
        ctx: RunContext,
    ) -> BoxFuture<'_, Result<HandlerResponse>>;
}
