use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

use loomflow_core::error::Result;
use loomflow_core::execution::NodeRunStatus;

use crate::engine::WorkflowEngine;

/// Time-based resumption: scans for SCHEDULED executions whose
/// `continue_at` has passed and resumes each due node.
pub struct ScheduledResumePoller {
    engine: Arc<WorkflowEngine>,
    interval: Duration,
    cancel: CancellationToken,
}

impl ScheduledResumePoller {
    pub fn new(engine: Arc<WorkflowEngine>, interval: Duration, cancel: CancellationToken) -> Self {
        Self {
            engine,
            interval,
            cancel,
        }
    }

    /// Run the poll loop. Blocks until cancelled.
    pub async fn run(&self) {
        info!(interval_secs = self.interval.as_secs(), "Scheduled-resume poller started");
        loop {
            tokio::select! {
                _ = tokio::time::sleep(self.interval) => {
                    if let Err(e) = self.tick().await {
                        error!(error = %e, "Poll scan failed");
                    }
                }
                _ = self.cancel.cancelled() => {
                    info!("Scheduled-resume poller shutting down");
                    break;
                }
            }
        }
    }

    /// One scan: resume every due scheduled node. Returns how many nodes
    /// were resumed.
    pub async fn tick(&self) -> Result<usize> {
        let now = Utc::now();
        let due = self.engine.executions().list_due_scheduled(now).await?;
        let mut resumed = 0;

        for execution in due {
            let due_nodes: Vec<String> = execution
                .nodes
                .iter()
                .filter(|n| n.status == NodeRunStatus::Scheduled)
                .filter(|n| n.scheduled_at().is_some_and(|at| at <= now))
                .map(|n| n.node.id.clone())
                .collect();

            for node_id in due_nodes {
                info!(
                    execution_id = %execution.id,
                    node_id = %node_id,
                    "Resuming scheduled node"
                );
                match self.engine.resume_node(&execution.id, &node_id, None).await {
                    Ok(_) => resumed += 1,
                    Err(e) => {
                        // One stuck execution must not starve the rest.
                        warn!(
                            execution_id = %execution.id,
                            node_id = %node_id,
                            error = %e,
                            "Scheduled resume failed"
                        );
                    }
                }
            }
        }

        Ok(resumed)
    }
}
