use futures::future::BoxFuture;
use tracing::debug;

use loomflow_core::error::Result;
use loomflow_core::handler::{HandlerKind, HandlerResponse, NodeHandler, RunContext};

/// Manual trigger: fires when a user starts the workflow by hand. The
/// caller-supplied input becomes the trigger output.
pub struct ManualTrigger;

impl NodeHandler for ManualTrigger {
    fn app_id(&self) -> &str {
        "core"
    }

    fn kind(&self) -> HandlerKind {
        HandlerKind::Trigger
    }

    fn key(&self) -> &str {
        "manual"
    }

    fn run(
        &self,
        _config: serde_json::Value,
        input: Option<serde_json::Value>,
        ctx: RunContext,
    ) -> BoxFuture<'_, Result<HandlerResponse>> {
        Box::pin(async move {
            debug!(execution_id = %ctx.execution_id, "Manual trigger fired");
            Ok(HandlerResponse::Success {
                output: input.unwrap_or(serde_json::json!({})),
            })
        })
    }
}

/// Webhook trigger: the intake surface already received the payload; the
/// node simply records it as the trigger output.
pub struct WebhookTrigger;

impl NodeHandler for WebhookTrigger {
    fn app_id(&self) -> &str {
        "core"
    }

    fn kind(&self) -> HandlerKind {
        HandlerKind::Trigger
    }

    fn key(&self) -> &str {
        "webhook"
    }

    fn run(
        &self,
        _config: serde_json::Value,
        input: Option<serde_json::Value>,
        ctx: RunContext,
    ) -> BoxFuture<'_, Result<HandlerResponse>> {
        Box::pin(async move {
            debug!(execution_id = %ctx.execution_id, "Webhook trigger fired");
            Ok(HandlerResponse::Success {
                output: input.unwrap_or(serde_json::Value::Null),
            })
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> RunContext {
        RunContext {
            workflow_id: "wf".into(),
            execution_id: "e".into(),
            workspace_id: "ws".into(),
            project_id: "p".into(),
            node_id: "n".into(),
        }
    }

    #[tokio::test]
    async fn test_manual_trigger_echoes_input() {
        let resp = ManualTrigger
            .run(
                serde_json::Value::Null,
                Some(serde_json::json!({"name": "ada"})),
                ctx(),
            )
            .await
            .unwrap();
        match resp {
            HandlerResponse::Success { output } => assert_eq!(output["name"], "ada"),
            other => panic!("unexpected response: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_manual_trigger_defaults_to_empty_object() {
        let resp = ManualTrigger
            .run(serde_json::Value::Null, None, ctx())
            .await
            .unwrap();
        match resp {
            HandlerResponse::Success { output } => assert_eq!(output, serde_json::json!({})),
            other => panic!("unexpected response: {:?}", other),
        }
    }
}
