use chrono::{DateTime, Utc};
use futures::future::BoxFuture;

use crate::error::Result;
use crate::execution::{Execution, QueueItem};
use crate::workflow::Workflow;

/// Workflow definitions — read-by-id plus deactivation.
///
/// Any document or relational store exposing read/update-by-id works;
/// implementations clone ids before moving into the returned future.
pub trait WorkflowStore: Send + Sync + 'static {
    fn get_workflow(&self, id: &str) -> BoxFuture<'_, Result<Option<Workflow>>>;

    fn put_workflow(&self, workflow: &Workflow) -> BoxFuture<'_, Result<()>>;

    /// Flip `is_active`. Used to deactivate broken workflows.
    fn set_workflow_active(&self, id: &str, active: bool) -> BoxFuture<'_, Result<()>>;
}

/// Execution run records.
pub trait ExecutionStore: Send + Sync + 'static {
    fn get_execution(&self, id: &str) -> BoxFuture<'_, Result<Option<Execution>>>;

    /// Full-document upsert by id.
    fn put_execution(&self, execution: &Execution) -> BoxFuture<'_, Result<()>>;

    /// Executions with status SCHEDULED whose `continue_at` is due.
    fn list_due_scheduled(&self, now: DateTime<Utc>) -> BoxFuture<'_, Result<Vec<Execution>>>;
}

/// Per-workspace FIFO of pending execution-start requests, with a
/// queue-level drain guard.
pub trait RunQueueStore: Send + Sync + 'static {
    fn enqueue_item(&self, item: &QueueItem) -> BoxFuture<'_, Result<()>>;

    /// Oldest item for the workspace, if any. Items are deleted only after
    /// their execution cycle returns, so a resumed drain is idempotent.
    fn peek_oldest(&self, workspace_id: &str) -> BoxFuture<'_, Result<Option<QueueItem>>>;

    fn delete_item(&self, id: &str) -> BoxFuture<'_, Result<()>>;

    /// Compare-and-set the workspace queue PENDING -> RUNNING. Returns
    /// false when another drain already holds the queue.
    fn try_begin_drain(&self, workspace_id: &str) -> BoxFuture<'_, Result<bool>>;

    /// Flip the workspace queue back to PENDING.
    fn end_drain(&self, workspace_id: &str) -> BoxFuture<'_, Result<()>>;
}
