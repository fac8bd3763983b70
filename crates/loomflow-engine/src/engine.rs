use std::sync::Arc;
use std::time::Duration;

use futures::future::{join_all, BoxFuture};
use tracing::{debug, info, warn};

use loomflow_core::config::EngineConfig;
use loomflow_core::error::{FlowError, Result};
use loomflow_core::execution::{Execution, ExecutionNode, ExecutionStatus, NodeRunStatus};
use loomflow_core::traits::{ExecutionStore, RunQueueStore, WorkflowStore};
use loomflow_core::workflow::{IndexedWorkflow, Node, Workflow};
use loomflow_handlers::HandlerRegistry;

use crate::executor::execute_node;
use crate::interpreter::{apply_response, finalize, StepOutcome};
use crate::mutation::MutationQueue;
use crate::resolver::resolve_next_wave;

/// Outcome of the synchronous webhook-response wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WaitOutcome {
    /// The execution left RUNNING within the poll budget.
    Finished(ExecutionStatus),
    /// Poll budget exhausted; the execution keeps running asynchronously.
    TimedOut,
}

/// The workflow execution engine.
///
/// Walks a workflow's node/edge graph wave by wave, fanning sibling
/// branches out concurrently and joining them before the completion check.
/// All mutations of one execution's record flow through the per-execution
/// mutation queue, so concurrent branch completions never lose updates.
pub struct WorkflowEngine {
    workflows: Arc<dyn WorkflowStore>,
    executions: Arc<dyn ExecutionStore>,
    run_queue: Arc<dyn RunQueueStore>,
    registry: Arc<HandlerRegistry>,
    mutations: MutationQueue,
    config: EngineConfig,
}

impl WorkflowEngine {
    pub fn new(
        workflows: Arc<dyn WorkflowStore>,
        executions: Arc<dyn ExecutionStore>,
        run_queue: Arc<dyn RunQueueStore>,
        registry: Arc<HandlerRegistry>,
        config: EngineConfig,
    ) -> Self {
        let mutations = MutationQueue::new(executions.clone());
        Self {
            workflows,
            executions,
            run_queue,
            registry,
            mutations,
            config,
        }
    }

    pub fn executions(&self) -> Arc<dyn ExecutionStore> {
        self.executions.clone()
    }

    pub(crate) fn run_queue(&self) -> &dyn RunQueueStore {
        self.run_queue.as_ref()
    }

    /// Run an execution until every branch reaches a terminal or suspended
    /// state, then finalize its overall status.
    ///
    /// This is the single entry point for every external signal: manual
    /// runs (`continue_from: None` on a fresh execution), webhook intake,
    /// and resumption after human input or a scheduled delay
    /// (`continue_from` naming the resumed nodes).
    pub async fn run_execution(
        &self,
        execution_id: &str,
        input: Option<serde_json::Value>,
        continue_from: Option<Vec<String>>,
    ) -> Result<ExecutionStatus> {
        let execution = self.load_execution(execution_id).await?;
        if execution.status.is_terminal() {
            debug!(execution_id, status = %execution.status, "Execution already finished");
            return Ok(execution.status);
        }

        let workflow = self.load_workflow(&execution.workflow_id).await?;

        // Deactivation is the only cancellation: checked once per cycle.
        if !workflow.is_active {
            let message = format!("Workflow {} is deactivated", workflow.id);
            warn!(execution_id, workflow_id = %workflow.id, "Refusing deactivated workflow");
            self.mutations
                .apply(execution_id, |exec| {
                    exec.status = ExecutionStatus::Failed;
                    exec.status_message = Some(message.clone());
                    exec.stopped_at = Some(chrono::Utc::now());
                    Ok(())
                })
                .await?;
            return Ok(ExecutionStatus::Failed);
        }

        let indexed = IndexedWorkflow::new(&workflow);

        let frontier = if execution.nodes.is_empty() && continue_from.is_none() {
            // Fresh execution: the start set is the single trigger node.
            match self.run_trigger(&indexed, execution_id, input).await? {
                Some(trigger_id) => vec![trigger_id],
                None => return self.finalize_execution(execution_id).await,
            }
        } else {
            match continue_from {
                Some(ids) => ids,
                None => execution.frontier(),
            }
        };

        info!(
            execution_id,
            workflow_id = %workflow.id,
            frontier = frontier.len(),
            "Execution cycle started"
        );

        self.advance(&indexed, execution_id, frontier).await?;
        self.finalize_execution(execution_id).await
    }

    /// Resume a suspended node (NEEDS_INPUT via human input, SCHEDULED via
    /// the time poller), marking it SUCCESS and continuing traversal from
    /// it. `replacement_input` overwrites the node output when provided.
    pub async fn resume_node(
        &self,
        execution_id: &str,
        node_id: &str,
        replacement_input: Option<serde_json::Value>,
    ) -> Result<ExecutionStatus> {
        let node_id_owned = node_id.to_string();
        self.mutations
            .apply(execution_id, move |exec| {
                let exec_id = exec.id.clone();
                let node = exec
                    .node_mut(&node_id_owned)
                    .ok_or_else(|| FlowError::NodeNotFound {
                        execution_id: exec_id,
                        node_id: node_id_owned.clone(),
                    })?;
                if !node.status.can_transition_to(NodeRunStatus::Success) {
                    return Err(FlowError::IllegalTransition {
                        node_id: node_id_owned.clone(),
                        from: node.status.to_string(),
                        to: NodeRunStatus::Success.to_string(),
                    });
                }
                node.status = NodeRunStatus::Success;
                node.ended_at = Some(chrono::Utc::now());
                if let Some(input) = replacement_input {
                    node.output = Some(input);
                }

                // Earliest remaining scheduled node, if any.
                exec.continue_at = exec
                    .nodes
                    .iter()
                    .filter(|n| n.status == NodeRunStatus::Scheduled)
                    .filter_map(|n| n.scheduled_at())
                    .min();
                exec.status = ExecutionStatus::Running;
                exec.status_message = None;
                Ok(())
            })
            .await?;

        info!(execution_id, node_id, "Node resumed");
        self.run_execution(execution_id, None, Some(vec![node_id.to_string()]))
            .await
    }

    /// Bounded synchronous wait for a webhook-style caller: poll the
    /// execution status at a fixed interval until it leaves RUNNING or the
    /// poll budget runs out. Never alters execution state.
    pub async fn wait_for_outcome(&self, execution_id: &str) -> Result<WaitOutcome> {
        let interval = Duration::from_millis(self.config.wait_poll_interval_ms);
        for attempt in 0..self.config.wait_max_polls {
            let execution = self.load_execution(execution_id).await?;
            if execution.status != ExecutionStatus::Running {
                return Ok(WaitOutcome::Finished(execution.status));
            }
            // Sleep only between polls; the last miss reports straight away.
            if attempt + 1 < self.config.wait_max_polls {
                tokio::time::sleep(interval).await;
            }
        }
        debug!(execution_id, "Wait budget exhausted");
        Ok(WaitOutcome::TimedOut)
    }

    /// Run the workflow's trigger node. Returns its id when traversal
    /// should continue past it.
    async fn run_trigger(
        &self,
        workflow: &IndexedWorkflow<'_>,
        execution_id: &str,
        input: Option<serde_json::Value>,
    ) -> Result<Option<String>> {
        let trigger = match workflow.workflow.trigger_node() {
            Some(node) => node.clone(),
            None => {
                self.fail_invalid(
                    execution_id,
                    &workflow.workflow.id,
                    "Workflow has no trigger node",
                    None,
                )
                .await?;
                return Ok(None);
            }
        };

        // Signals can be redelivered; only the call that records the
        // trigger runs it.
        let appended = self
            .mutations
            .apply(execution_id, {
                let trigger = trigger.clone();
                move |exec| {
                    if exec.node(&trigger.id).is_some() {
                        return Ok(false);
                    }
                    exec.nodes.push(ExecutionNode::started(&trigger));
                    Ok(true)
                }
            })
            .await?;
        if !appended {
            debug!(execution_id, trigger_id = %trigger.id, "Trigger already recorded");
            return Ok(None);
        }

        match self.run_recorded_node(execution_id, &trigger, input, true).await? {
            StepOutcome::Continue => Ok(Some(trigger.id)),
            StepOutcome::Halt(_) => Ok(None),
        }
    }

    /// Resolve and run waves recursively from a frontier until every
    /// branch halts or the graph is exhausted.
    fn advance<'a>(
        &'a self,
        workflow: &'a IndexedWorkflow<'a>,
        execution_id: &'a str,
        frontier: Vec<String>,
    ) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            let execution = self.load_execution(execution_id).await?;

            // A sibling branch failing the execution does not gate this
            // branch: in-flight branches run to their own halt.
            let wave = match resolve_next_wave(workflow, &execution, &frontier) {
                Ok(wave) => wave,
                Err(e) if e.is_workflow_validity() => {
                    self.fail_invalid(execution_id, &workflow.workflow.id, &e.to_string(), None)
                        .await?;
                    return Ok(());
                }
                Err(e) => return Err(e),
            };
            if wave.is_empty() {
                return Ok(());
            }

            // Append the wave's nodes and traversed edges in one ordered
            // mutation; nodes another branch already recorded (diamond
            // joins) are skipped and report back which inputs to use.
            let to_run: Vec<(Node, Option<serde_json::Value>)> = self
                .mutations
                .apply(execution_id, {
                    let wave = wave.clone();
                    move |exec| {
                        for edge in &wave.edges_to_record {
                            if !exec.edges.iter().any(|e| e.id == edge.id) {
                                exec.edges.push(edge.clone());
                            }
                        }
                        let mut to_run = Vec::new();
                        for wave_node in &wave.nodes_to_run {
                            if exec.node(&wave_node.node.id).is_some() {
                                continue;
                            }
                            let input = exec
                                .node(&wave_node.upstream_id)
                                .and_then(|n| n.output.clone());
                            exec.nodes.push(ExecutionNode::started(&wave_node.node));
                            to_run.push((wave_node.node.clone(), input));
                        }
                        Ok(to_run)
                    }
                })
                .await?;

            debug!(
                execution_id,
                wave = to_run.len(),
                "Wave resolved"
            );

            // Fan out sibling branches and genuinely wait for all of them.
            let branches = to_run.into_iter().map(|(node, input)| async move {
                match self.run_recorded_node(execution_id, &node, input, false).await? {
                    StepOutcome::Continue => {
                        self.advance(workflow, execution_id, vec![node.id.clone()])
                            .await
                    }
                    StepOutcome::Halt(reason) => {
                        debug!(execution_id, node_id = %node.id, ?reason, "Branch halted");
                        Ok(())
                    }
                }
            });

            for result in join_all(branches).await {
                result?;
            }
            Ok(())
        })
    }

    /// Execute one already-recorded node and apply its response. Validity
    /// errors fail the execution and deactivate the workflow here; the
    /// branch then halts as failed.
    async fn run_recorded_node(
        &self,
        execution_id: &str,
        node: &Node,
        input: Option<serde_json::Value>,
        is_first: bool,
    ) -> Result<StepOutcome> {
        let execution = self.load_execution(execution_id).await?;
        let run = match execute_node(&self.registry, node, &execution, input, is_first).await {
            Ok(run) => run,
            Err(e) if e.is_workflow_validity() => {
                self.fail_invalid(
                    execution_id,
                    &execution.workflow_id,
                    &e.to_string(),
                    Some(&node.id),
                )
                .await?;
                return Ok(StepOutcome::Halt(crate::interpreter::HaltReason::Failed));
            }
            Err(e) => return Err(e),
        };

        let node_id = node.id.clone();
        self.mutations
            .apply(execution_id, move |exec| apply_response(exec, &node_id, run))
            .await
    }

    /// Completion check: runs once all branches have joined.
    async fn finalize_execution(&self, execution_id: &str) -> Result<ExecutionStatus> {
        let status = self
            .mutations
            .apply(execution_id, |exec| Ok(finalize(exec)))
            .await?;
        info!(execution_id, %status, "Execution finalized");
        Ok(status)
    }

    /// A broken workflow definition: record the failure on the execution
    /// (and the offending node, when known) and deactivate the workflow so
    /// it cannot fail repeatedly.
    async fn fail_invalid(
        &self,
        execution_id: &str,
        workflow_id: &str,
        message: &str,
        node_id: Option<&str>,
    ) -> Result<()> {
        warn!(execution_id, workflow_id, message, "Workflow invalid; deactivating");
        let message_owned = message.to_string();
        let node_id = node_id.map(str::to_string);
        self.mutations
            .apply(execution_id, move |exec| {
                if let Some(node_id) = node_id {
                    if let Some(node) = exec.node_mut(&node_id) {
                        if node.status.can_transition_to(NodeRunStatus::Failed) {
                            node.status = NodeRunStatus::Failed;
                            node.status_message = Some(message_owned.clone());
                            node.ended_at = Some(chrono::Utc::now());
                        }
                    }
                }
                exec.status = ExecutionStatus::Failed;
                exec.status_message = Some(message_owned);
                exec.stopped_at = Some(chrono::Utc::now());
                Ok(())
            })
            .await?;
        self.workflows.set_workflow_active(workflow_id, false).await
    }

    async fn load_execution(&self, id: &str) -> Result<Execution> {
        self.executions
            .get_execution(id)
            .await?
            .ok_or_else(|| FlowError::ExecutionNotFound(id.to_string()))
    }

    async fn load_workflow(&self, id: &str) -> Result<Workflow> {
        self.workflows
            .get_workflow(id)
            .await?
            .ok_or_else(|| FlowError::WorkflowNotFound(id.to_string()))
    }
}
