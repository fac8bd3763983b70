use std::time::Instant;

use chrono::{DateTime, Utc};
use tracing::{debug, warn};

use loomflow_core::error::{FlowError, Result};
use loomflow_core::execution::Execution;
use loomflow_core::handler::{HandlerKind, HandlerResponse, RunContext};
use loomflow_core::workflow::{Node, NodeKind};
use loomflow_handlers::HandlerRegistry;

/// A classified handler response with its wall-clock timing.
#[derive(Debug, Clone)]
pub struct NodeRun {
    pub response: HandlerResponse,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
}

/// Execute one node through its registered handler.
///
/// Returns `Err` only for workflow-validity problems (trigger outside the
/// first position, missing action/trigger id, unregistered handler) — the
/// caller fails the execution and deactivates the workflow. A handler that
/// errors mid-flight is classified as `Failure`, not propagated.
pub async fn execute_node(
    registry: &HandlerRegistry,
    node: &Node,
    execution: &Execution,
    input: Option<serde_json::Value>,
    is_first: bool,
) -> Result<NodeRun> {
    let (handler_kind, key) = match node.kind {
        NodeKind::Trigger => {
            if !is_first {
                return Err(FlowError::InvalidWorkflow {
                    workflow_id: execution.workflow_id.clone(),
                    message: format!("Trigger node {} found mid-graph", node.id),
                });
            }
            let key = node.trigger_id.as_deref().ok_or_else(|| {
                FlowError::InvalidWorkflow {
                    workflow_id: execution.workflow_id.clone(),
                    message: format!("Trigger node {} has no trigger id", node.id),
                }
            })?;
            (HandlerKind::Trigger, key)
        }
        NodeKind::Action | NodeKind::DecidePath => {
            let key = node.action_id.as_deref().ok_or_else(|| {
                FlowError::InvalidWorkflow {
                    workflow_id: execution.workflow_id.clone(),
                    message: format!("Node {} has no action id", node.id),
                }
            })?;
            (HandlerKind::Action, key)
        }
        NodeKind::Placeholder => {
            return Err(FlowError::InvalidWorkflow {
                workflow_id: execution.workflow_id.clone(),
                message: format!("Placeholder node {} cannot be executed", node.id),
            });
        }
    };

    let handler = registry.resolve(&node.app_id, handler_kind, key).ok_or(
        FlowError::HandlerNotFound {
            app_id: node.app_id.clone(),
            kind: handler_kind.to_string(),
            key: key.to_string(),
        },
    )?;

    let ctx = RunContext {
        workflow_id: execution.workflow_id.clone(),
        execution_id: execution.id.clone(),
        workspace_id: execution.workspace_id.clone(),
        project_id: execution.project_id.clone(),
        node_id: node.id.clone(),
    };

    debug!(
        execution_id = %execution.id,
        node_id = %node.id,
        app_id = %node.app_id,
        key = %key,
        "Executing node"
    );

    let started_at = Utc::now();
    let timer = Instant::now();
    let result = handler.run(node.value.clone(), input, ctx).await;
    let ended_at = Utc::now();
    let elapsed_ms = timer.elapsed().as_millis() as u64;

    let response = match result {
        Ok(response) => response,
        Err(e) => {
            warn!(
                execution_id = %execution.id,
                node_id = %node.id,
                error = %e,
                "Handler returned an error"
            );
            HandlerResponse::Failure {
                message: e.to_string(),
            }
        }
    };

    debug!(
        execution_id = %execution.id,
        node_id = %node.id,
        elapsed_ms,
        "Node execution complete"
    );

    Ok(NodeRun {
        response,
        started_at,
        ended_at,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use futures::future::BoxFuture;
    use loomflow_core::handler::NodeHandler;
    use loomflow_core::workflow::{TriggerStrategy, Workflow};

    struct FailingHandler;

    impl NodeHandler for FailingHandler {
        fn app_id(&self) -> &str {
            "test"
        }
        fn kind(&self) -> HandlerKind {
            HandlerKind::Action
        }
        fn key(&self) -> &str {
            "explode"
        }
        fn run(
            &self,
            _config: serde_json::Value,
            _input: Option<serde_json::Value>,
            _ctx: RunContext,
        ) -> BoxFuture<'_, Result<HandlerResponse>> {
            Box::pin(async { Err(FlowError::Handler("connection reset".into())) })
        }
    }

    fn execution() -> Execution {
        Execution::new(&Workflow {
            id: "wf".into(),
            project_id: "p".into(),
            workspace_id: "ws".into(),
            nodes: vec![],
            edges: vec![],
            strategy: TriggerStrategy::Manual,
            is_active: true,
        })
    }

    #[tokio::test]
    async fn test_handler_error_becomes_failure() {
        let mut registry = HandlerRegistry::new();
        registry.register(FailingHandler);
        let node = Node::new("n", NodeKind::Action, "test").with_action("explode");

        let run = execute_node(&registry, &node, &execution(), None, false)
            .await
            .unwrap();
        match run.response {
            HandlerResponse::Failure { message } => assert!(message.contains("connection reset")),
            other => panic!("unexpected response: {:?}", other),
        }
        assert!(run.ended_at >= run.started_at);
    }

    #[tokio::test]
    async fn test_unknown_handler_is_validity_error() {
        let registry = HandlerRegistry::new();
        let node = Node::new("n", NodeKind::Action, "test").with_action("missing");

        let err = execute_node(&registry, &node, &execution(), None, false)
            .await
            .unwrap_err();
        assert!(err.is_workflow_validity());
    }

    #[tokio::test]
    async fn test_trigger_mid_graph_is_validity_error() {
        let registry = HandlerRegistry::with_builtins();
        let node = Node::new("t", NodeKind::Trigger, "core").with_trigger("manual");

        let err = execute_node(&registry, &node, &execution(), None, false)
            .await
            .unwrap_err();
        assert!(err.is_workflow_validity());

        // In first position the same node runs fine.
        let run = execute_node(&registry, &node, &execution(), None, true)
            .await
            .unwrap();
        assert!(matches!(run.response, HandlerResponse::Success { .. }));
    }
}
