use chrono::Utc;
use tracing::debug;

use loomflow_core::error::{FlowError, Result};
use loomflow_core::execution::{Execution, ExecutionStatus, NodeRunStatus};
use loomflow_core::handler::HandlerResponse;

use crate::executor::NodeRun;

/// Why a branch stopped recursing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HaltReason {
    Failed,
    NeedsInput,
    Scheduled,
}

/// Whether traversal continues past a node.
///
/// This is the explicit tagged outcome that unwinds suspensions up the call
/// chain — a `Halt` is a first-class state, never an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepOutcome {
    Continue,
    Halt(HaltReason),
}

/// Apply a classified handler response to the execution record.
///
/// Mutates the named node and the execution-level status; must run inside
/// the per-execution mutation queue. Node transitions are checked against
/// the legal table and an illegal one aborts the mutation unwritten.
pub fn apply_response(
    execution: &mut Execution,
    node_id: &str,
    run: NodeRun,
) -> Result<StepOutcome> {
    let execution_id = execution.id.clone();
    let current_status = execution.status;
    let node = execution
        .node_mut(node_id)
        .ok_or_else(|| FlowError::NodeNotFound {
            execution_id: execution_id.clone(),
            node_id: node_id.to_string(),
        })?;

    node.started_at = Some(run.started_at);
    node.ended_at = Some(run.ended_at);

    let next = match &run.response {
        HandlerResponse::Success { .. } => NodeRunStatus::Success,
        HandlerResponse::Failure { .. } => NodeRunStatus::Failed,
        HandlerResponse::NeedsInput { .. } => NodeRunStatus::NeedsInput,
        HandlerResponse::Scheduled { .. } => NodeRunStatus::Scheduled,
    };
    if !node.status.can_transition_to(next) {
        return Err(FlowError::IllegalTransition {
            node_id: node_id.to_string(),
            from: node.status.to_string(),
            to: next.to_string(),
        });
    }
    node.status = next;

    let outcome = match run.response {
        HandlerResponse::Success { output } => {
            node.output = Some(output);
            StepOutcome::Continue
        }
        HandlerResponse::Failure { message } => {
            node.status_message = Some(message.clone());
            execution.status = ExecutionStatus::Failed;
            execution.status_message = Some(message);
            execution.stopped_at = Some(Utc::now());
            StepOutcome::Halt(HaltReason::Failed)
        }
        HandlerResponse::NeedsInput { payload } => {
            node.output = Some(payload);
            // A sibling failure must stay visible at the execution level.
            if current_status == ExecutionStatus::Running {
                execution.status = ExecutionStatus::NeedsInput;
            }
            StepOutcome::Halt(HaltReason::NeedsInput)
        }
        HandlerResponse::Scheduled {
            payload,
            scheduled_at,
        } => {
            let mut output = match payload {
                serde_json::Value::Object(map) => map,
                other => {
                    let mut map = serde_json::Map::new();
                    if !other.is_null() {
                        map.insert("payload".to_string(), other);
                    }
                    map
                }
            };
            output.insert(
                "scheduled_at".to_string(),
                serde_json::Value::String(scheduled_at.to_rfc3339()),
            );
            node.output = Some(serde_json::Value::Object(output));

            // Earliest wins: continue_at never moves later.
            execution.continue_at = Some(match execution.continue_at {
                Some(current) if current <= scheduled_at => current,
                _ => scheduled_at,
            });
            if current_status == ExecutionStatus::Running {
                execution.status = ExecutionStatus::Scheduled;
            }
            StepOutcome::Halt(HaltReason::Scheduled)
        }
    };

    debug!(
        execution_id = %execution.id,
        node_id,
        status = %next,
        "Node response applied"
    );

    Ok(outcome)
}

/// Finalize an execution once a wave resolves to zero runnable nodes and
/// every branch has joined.
///
/// Priority among non-success node states: FAILED > NEEDS_INPUT >
/// SCHEDULED. A node still RUNNING (another signal's branch in flight)
/// keeps the execution RUNNING. Only a fully successful run gets SUCCESS.
pub fn finalize(execution: &mut Execution) -> ExecutionStatus {
    let status = if execution.status == ExecutionStatus::Failed
        || execution
            .nodes
            .iter()
            .any(|n| n.status == NodeRunStatus::Failed)
    {
        ExecutionStatus::Failed
    } else if execution
        .nodes
        .iter()
        .any(|n| n.status == NodeRunStatus::NeedsInput)
    {
        ExecutionStatus::NeedsInput
    } else if execution
        .nodes
        .iter()
        .any(|n| n.status == NodeRunStatus::Scheduled)
    {
        ExecutionStatus::Scheduled
    } else if execution
        .nodes
        .iter()
        .any(|n| n.status == NodeRunStatus::Running)
    {
        ExecutionStatus::Running
    } else {
        ExecutionStatus::Success
    };

    execution.status = status;
    if status.is_terminal() && execution.stopped_at.is_none() {
        execution.stopped_at = Some(Utc::now());
    }
    status
}
