use thiserror::Error;

#[derive(Debug, Error)]
pub enum FlowError {
    // Lookup errors
    #[error("Workflow not found: {0}")]
    WorkflowNotFound(String),

    #[error("Execution not found: {0}")]
    ExecutionNotFound(String),

    #[error("Node {node_id} not recorded on execution {execution_id}")]
    NodeNotFound {
        execution_id: String,
        node_id: String,
    },

    // Workflow-validity errors — fatal: the execution is failed and the
    // workflow deactivated so it cannot fail repeatedly.
    #[error("Invalid workflow {workflow_id}: {message}")]
    InvalidWorkflow {
        workflow_id: String,
        message: String,
    },

    #[error("No handler registered for app '{app_id}' {kind} '{key}'")]
    HandlerNotFound {
        app_id: String,
        kind: String,
        key: String,
    },

    // State machine errors
    #[error("Illegal node status transition for {node_id}: {from} -> {to}")]
    IllegalTransition {
        node_id: String,
        from: String,
        to: String,
    },

    // Handler errors
    #[error("Handler error: {0}")]
    Handler(String),

    // Config errors
    #[error("Config error: {0}")]
    Config(String),

    // Storage errors
    #[error("Database error: {0}")]
    Database(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // JSON errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl FlowError {
    /// Whether this error should fail the execution *and* deactivate the
    /// workflow (a broken definition, not a transient fault).
    pub fn is_workflow_validity(&self) -> bool {
        matches!(
            self,
            FlowError::InvalidWorkflow { .. } | FlowError::HandlerNotFound { .. }
        )
    }
}

pub type Result<T> = std::result::Result<T, FlowError>;
