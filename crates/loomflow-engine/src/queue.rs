use loomflow_core::error::Result;
use loomflow_core::execution::QueueItem;
use tracing::{debug, info, warn};

use crate::engine::WorkflowEngine;

/// Workspace run queue: at most one execution progresses per workspace.
///
/// Items are deleted only after their execution cycle returns, so a drain
/// resumed after a crash is idempotent against partially-processed items.
impl WorkflowEngine {
    /// Enqueue an execution-start request and kick off a drain.
    pub async fn enqueue_run(
        &self,
        workspace_id: &str,
        execution_id: &str,
        input: Option<serde_json::Value>,
    ) -> Result<()> {
        let item = QueueItem::new(workspace_id, execution_id, input);
        self.run_queue().enqueue_item(&item).await?;
        debug!(workspace_id, execution_id, "Run enqueued");
        self.drain_workspace(workspace_id).await
    }

    /// Drain the workspace queue: pop the oldest request, run it to
    /// exhaustion, delete it, repeat. Guarded by the queue-level status
    /// flag so only one drain is active per workspace; after the visible
    /// queue empties, re-check once more so an item enqueued mid-drain is
    /// not missed.
    pub async fn drain_workspace(&self, workspace_id: &str) -> Result<()> {
        if !self.run_queue().try_begin_drain(workspace_id).await? {
            debug!(workspace_id, "Drain already active");
            return Ok(());
        }

        loop {
            while let Some(item) = self.run_queue().peek_oldest(workspace_id).await? {
                info!(
                    workspace_id,
                    execution_id = %item.execution_id,
                    "Draining queued run"
                );
                if let Err(e) = self
                    .run_execution(&item.execution_id, item.input.clone(), None)
                    .await
                {
                    // The execution record carries its own failure state;
                    // the queue must keep moving either way.
                    warn!(
                        workspace_id,
                        execution_id = %item.execution_id,
                        error = %e,
                        "Queued run errored"
                    );
                }
                self.run_queue().delete_item(&item.id).await?;
            }

            self.run_queue().end_drain(workspace_id).await?;

            // An item enqueued between the last pop and end_drain would
            // otherwise wait for the next external kick.
            if self.run_queue().peek_oldest(workspace_id).await?.is_some()
                && self.run_queue().try_begin_drain(workspace_id).await?
            {
                continue;
            }
            return Ok(());
        }
    }
}
