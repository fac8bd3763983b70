pub mod engine;
pub mod executor;
pub mod interpreter;
pub mod mutation;
pub mod poller;
pub mod queue;
pub mod resolver;

pub use engine::{WaitOutcome, WorkflowEngine};
pub use executor::{execute_node, NodeRun};
pub use interpreter::{apply_response, finalize, HaltReason, StepOutcome};
pub use mutation::MutationQueue;
pub use poller::ScheduledResumePoller;
pub use resolver::{resolve_next_wave, Wave, WaveNode};
