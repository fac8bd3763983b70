use std::path::Path;
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use futures::future::BoxFuture;
use rusqlite::{params, Connection, OptionalExtension};
use tracing::debug;

use loomflow_core::error::{FlowError, Result};
use loomflow_core::execution::{Execution, QueueItem};
use loomflow_core::traits::{ExecutionStore, RunQueueStore, WorkflowStore};
use loomflow_core::workflow::Workflow;

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS workflows (
        id TEXT PRIMARY KEY,
        is_active INTEGER NOT NULL,
        doc TEXT NOT NULL
    );

    CREATE TABLE IF NOT EXISTS executions (
        id TEXT PRIMARY KEY,
        workspace_id TEXT NOT NULL,
        status TEXT NOT NULL,
        continue_at_ms INTEGER,
        doc TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_executions_due
        ON executions(status, continue_at_ms);

    CREATE TABLE IF NOT EXISTS queue_items (
        id TEXT PRIMARY KEY,
        workspace_id TEXT NOT NULL,
        doc TEXT NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_queue_items_workspace
        ON queue_items(workspace_id);

    CREATE TABLE IF NOT EXISTS queue_state (
        workspace_id TEXT PRIMARY KEY,
        state TEXT NOT NULL
    );";

fn db_err(e: impl std::fmt::Display) -> FlowError {
    FlowError::Database(e.to_string())
}

/// SQLite-backed store for workflows, executions, and workspace run queues.
///
/// Records are JSON documents keyed by id; the columns extracted alongside
/// (`status`, `continue_at_ms`, `workspace_id`) exist only so the poller and
/// queue queries stay indexable. Queue FIFO order rides on rowid.
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Open or create a SQLite database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| FlowError::Database(format!("Failed to create db directory: {}", e)))?;
        }

        let conn = Connection::open(path).map_err(db_err)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")
            .map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;

        debug!(path = %path.display(), "SQLite store opened");
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Open an in-memory database (for testing).
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        conn.execute_batch(SCHEMA).map_err(db_err)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn get_workflow_sync(&self, id: &str) -> Result<Option<Workflow>> {
        let conn = self.conn.lock().map_err(db_err)?;
        let doc: Option<String> = conn
            .query_row("SELECT doc FROM workflows WHERE id = ?1", params![id], |r| {
                r.get(0)
            })
            .optional()
            .map_err(db_err)?;
        doc.map(|d| serde_json::from_str(&d).map_err(FlowError::from))
            .transpose()
    }

    fn put_workflow_sync(&self, workflow: &Workflow) -> Result<()> {
        let conn = self.conn.lock().map_err(db_err)?;
        let doc = serde_json::to_string(workflow)?;
        conn.execute(
            "INSERT OR REPLACE INTO workflows (id, is_active, doc) VALUES (?1, ?2, ?3)",
            params![workflow.id, workflow.is_active, doc],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn set_workflow_active_sync(&self, id: &str, active: bool) -> Result<()> {
        let conn = self.conn.lock().map_err(db_err)?;
        let doc: Option<String> = conn
            .query_row("SELECT doc FROM workflows WHERE id = ?1", params![id], |r| {
                r.get(0)
            })
            .optional()
            .map_err(db_err)?;
        let doc = doc.ok_or_else(|| FlowError::WorkflowNotFound(id.to_string()))?;
        let mut workflow: Workflow = serde_json::from_str(&doc)?;
        workflow.is_active = active;
        let doc = serde_json::to_string(&workflow)?;
        conn.execute(
            "UPDATE workflows SET is_active = ?2, doc = ?3 WHERE id = ?1",
            params![id, active, doc],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn get_execution_sync(&self, id: &str) -> Result<Option<Execution>> {
        let conn = self.conn.lock().map_err(db_err)?;
        let doc: Option<String> = conn
            .query_row(
                "SELECT doc FROM executions WHERE id = ?1",
                params![id],
                |r| r.get(0),
            )
            .optional()
            .map_err(db_err)?;
        doc.map(|d| serde_json::from_str(&d).map_err(FlowError::from))
            .transpose()
    }

    fn put_execution_sync(&self, execution: &Execution) -> Result<()> {
        let conn = self.conn.lock().map_err(db_err)?;
        let doc = serde_json::to_string(execution)?;
        let continue_at_ms = execution.continue_at.map(|t| t.timestamp_millis());
        conn.execute(
            "INSERT OR REPLACE INTO executions
                 (id, workspace_id, status, continue_at_ms, doc)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                execution.id,
                execution.workspace_id,
                execution.status.as_str(),
                continue_at_ms,
                doc
            ],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn list_due_scheduled_sync(&self, now: DateTime<Utc>) -> Result<Vec<Execution>> {
        let conn = self.conn.lock().map_err(db_err)?;
        let mut stmt = conn
            .prepare(
                "SELECT doc FROM executions
                 WHERE status = 'scheduled'
                   AND continue_at_ms IS NOT NULL
                   AND continue_at_ms <= ?1
                 ORDER BY continue_at_ms ASC",
            )
            .map_err(db_err)?;
        let docs = stmt
            .query_map(params![now.timestamp_millis()], |r| r.get::<_, String>(0))
            .map_err(db_err)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(db_err)?;
        docs.into_iter()
            .map(|d| serde_json::from_str(&d).map_err(FlowError::from))
            .collect()
    }

    fn enqueue_item_sync(&self, item: &QueueItem) -> Result<()> {
        let conn = self.conn.lock().map_err(db_err)?;
        let doc = serde_json::to_string(item)?;
        conn.execute(
            "INSERT INTO queue_items (id, workspace_id, doc) VALUES (?1, ?2, ?3)",
            params![item.id, item.workspace_id, doc],
        )
        .map_err(db_err)?;
        Ok(())
    }

    fn peek_oldest_sync(&self, workspace_id: &str) -> Result<Option<QueueItem>> {
        let conn = self.conn.lock().map_err(db_err)?;
        let doc: Option<String> = conn
            .query_row(
                "SELECT doc FROM queue_items WHERE workspace_id = ?1
                 ORDER BY rowid ASC LIMIT 1",
                params![workspace_id],
                |r| r.get(0),
            )
            .optional()
            .map_err(db_err)?;
        doc.map(|d| serde_json::from_str(&d).map_err(FlowError::from))
            .transpose()
    }

    fn delete_item_sync(&self, id: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(db_err)?;
        conn.execute("DELETE FROM queue_items WHERE id = ?1", params![id])
            .map_err(db_err)?;
        Ok(())
    }

    fn try_begin_drain_sync(&self, workspace_id: &str) -> Result<bool> {
        let conn = self.conn.lock().map_err(db_err)?;
        conn.execute(
            "INSERT OR IGNORE INTO queue_state (workspace_id, state) VALUES (?1, 'pending')",
            params![workspace_id],
        )
        .map_err(db_err)?;
        let changed = conn
            .execute(
                "UPDATE queue_state SET state = 'running'
                 WHERE workspace_id = ?1 AND state = 'pending'",
                params![workspace_id],
            )
            .map_err(db_err)?;
        Ok(changed == 1)
    }

    fn end_drain_sync(&self, workspace_id: &str) -> Result<()> {
        let conn = self.conn.lock().map_err(db_err)?;
        conn.execute(
            "UPDATE queue_state SET state = 'pending' WHERE workspace_id = ?1",
            params![workspace_id],
        )
        .map_err(db_err)?;
        Ok(())
    }
}

impl WorkflowStore for SqliteStore {
    fn get_workflow(&self, id: &str) -> BoxFuture<'_, Result<Option<Workflow>>> {
        let id = id.to_string();
        Box::pin(async move { self.get_workflow_sync(&id) })
    }

    fn put_workflow(&self, workflow: &Workflow) -> BoxFuture<'_, Result<()>> {
        let workflow = workflow.clone();
        Box::pin(async move { self.put_workflow_sync(&workflow) })
    }

    fn set_workflow_active(&self, id: &str, active: bool) -> BoxFuture<'_, Result<()>> {
        let id = id.to_string();
        Box::pin(async move { self.set_workflow_active_sync(&id, active) })
    }
}

impl ExecutionStore for SqliteStore {
    fn get_execution(&self, id: &str) -> BoxFuture<'_, Result<Option<Execution>>> {
        let id = id.to_string();
        Box::pin(async move { self.get_execution_sync(&id) })
    }

    fn put_execution(&self, execution: &Execution) -> BoxFuture<'_, Result<()>> {
        let execution = execution.clone();
        Box::pin(async move { self.put_execution_sync(&execution) })
    }

    fn list_due_scheduled(&self, now: DateTime<Utc>) -> BoxFuture<'_, Result<Vec<Execution>>> {
        Box::pin(async move { self.list_due_scheduled_sync(now) })
    }
}

impl RunQueueStore for SqliteStore {
    fn enqueue_item(&self, item: &QueueItem) -> BoxFuture<'_, Result<()>> {
        let item = item.clone();
        Box::pin(async move { self.enqueue_item_sync(&item) })
    }

    fn peek_oldest(&self, workspace_id: &str) -> BoxFuture<'_, Result<Option<QueueItem>>> {
        let workspace_id = workspace_id.to_string();
        Box::pin(async move { self.peek_oldest_sync(&workspace_id) })
    }

    fn delete_item(&self, id: &str) -> BoxFuture<'_, Result<()>> {
        let id = id.to_string();
        Box::pin(async move { self.delete_item_sync(&id) })
    }

    fn try_begin_drain(&self, workspace_id: &str) -> BoxFuture<'_, Result<bool>> {
        let workspace_id = workspace_id.to_string();
        Box::pin(async move { self.try_begin_drain_sync(&workspace_id) })
    }

    fn end_drain(&self, workspace_id: &str) -> BoxFuture<'_, Result<()>> {
        let workspace_id = workspace_id.to_string();
        Box::pin(async move { self.end_drain_sync(&workspace_id) })
    }
}
