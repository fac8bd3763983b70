use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

use loomflow_core::error::Result;
use loomflow_core::handler::{HandlerKind, HandlerResponse, NodeHandler, RunContext};

/// Human-in-the-loop gate. Always suspends with `NeedsInput`; an external
/// resumption signal naming this node supplies the replacement input and
/// marks the node SUCCESS.
pub struct ApprovalHandler;

#[derive(Deserialize)]
struct ApprovalConfig {
    #[serde(default = "default_prompt")]
    prompt: String,
}

fn default_prompt() -> String {
    "Approval required".to_string()
}

impl NodeHandler for ApprovalHandler {
    fn app_id(&self) -> &str {
        "core"
    }

    fn kind(&self) -> HandlerKind {
        HandlerKind::Action
    }

    fn key(&self) -> &str {
        "approval"
    }

    fn run(
        &self,
        config: serde_json::Value,
        input: Option<serde_json::Value>,
        ctx: RunContext,
    ) -> BoxFuture<'_, Result<HandlerResponse>> {
        Box::pin(async move {
            let config: ApprovalConfig =
                serde_json::from_value(config).unwrap_or(ApprovalConfig {
                    prompt: default_prompt(),
                });

            debug!(
                execution_id = %ctx.execution_id,
                node_id = %ctx.node_id,
                "Awaiting human input"
            );

            Ok(HandlerResponse::NeedsInput {
                payload: serde_json::json!({
                    "prompt": config.prompt,
                    "input": input,
                }),
            })
        })
    }
}
