pub mod config;
pub mod error;
pub mod execution;
pub mod handler;
pub mod traits;
pub mod workflow;

pub use config::{AppConfig, EngineConfig};
pub use error::{FlowError, Result};
pub use execution::{
    Execution, ExecutionNode, ExecutionStatus, NodeRunStatus, QueueItem, QueueState,
};
pub use handler::{HandlerKind, HandlerResponse, NodeHandler, RunContext};
pub use traits::{ExecutionStore, RunQueueStore, WorkflowStore};
pub use workflow::{
    Edge, EdgeKind, IndexedWorkflow, Node, NodeKind, Position, TriggerStrategy, Workflow,
};
