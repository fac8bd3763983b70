use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::workflow::{Edge, Node, Workflow};

/// Overall status of one run of a workflow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionStatus {
    Running,
    NeedsInput,
    Scheduled,
    Success,
    Failed,
}

impl ExecutionStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionStatus::Running => "running",
            ExecutionStatus::NeedsInput => "needs_input",
            ExecutionStatus::Scheduled => "scheduled",
            ExecutionStatus::Success => "success",
            ExecutionStatus::Failed => "failed",
        }
    }

    /// SUCCESS and FAILED are terminal; the rest await an external signal.
    pub fn is_terminal(&self) -> bool {
        matches!(self, ExecutionStatus::Success | ExecutionStatus::Failed)
    }
}

impl std::fmt::Display for ExecutionStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Status of a single executed node.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeRunStatus {
    Running,
    Success,
    Failed,
    NeedsInput,
    Scheduled,
}

impl NodeRunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            NodeRunStatus::Running => "running",
            NodeRunStatus::Success => "success",
            NodeRunStatus::Failed => "failed",
            NodeRunStatus::NeedsInput => "needs_input",
            NodeRunStatus::Scheduled => "scheduled",
        }
    }

    /// Legal transitions: RUNNING fans out to every other state; suspended
    /// states only ever move to SUCCESS via an external resume.
    pub fn can_transition_to(&self, next: NodeRunStatus) -> bool {
        match self {
            NodeRunStatus::Running => next != NodeRunStatus::Running,
            NodeRunStatus::NeedsInput => next == NodeRunStatus::Success,
            NodeRunStatus::Scheduled => next == NodeRunStatus::Success,
            NodeRunStatus::Success | NodeRunStatus::Failed => false,
        }
    }
}

impl std::fmt::Display for NodeRunStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A workflow node as actually executed, annotated with run state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionNode {
    pub node: Node,
    pub status: NodeRunStatus,
    #[serde(default)]
    pub status_message: Option<String>,
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    #[serde(default)]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub ended_at: Option<DateTime<Utc>>,
}

impl ExecutionNode {
    /// A freshly started copy of a workflow node. The design-time mock
    /// output is stripped here so it can never leak into the run record.
    pub fn started(node: &Node) -> Self {
        let mut node = node.clone();
        node.output = None;
        Self {
            node,
            status: NodeRunStatus::Running,
            status_message: None,
            output: None,
            started_at: Some(Utc::now()),
            ended_at: None,
        }
    }

    /// The resume time a SCHEDULED node is waiting for, parsed from the
    /// `scheduled_at` field the interpreter merges into the node output.
    pub fn scheduled_at(&self) -> Option<DateTime<Utc>> {
        self.output
            .as_ref()
            .and_then(|o| o.get("scheduled_at"))
            .and_then(|v| v.as_str())
            .and_then(|s| DateTime::parse_from_rfc3339(s).ok())
            .map(|t| t.with_timezone(&Utc))
    }
}

/// One run instance of a workflow.
///
/// `nodes` and `edges` are append-only logs of what actually ran and which
/// edges were traversed. `continue_at` is the earliest pending resume time
/// across all SCHEDULED nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    pub id: String,
    pub workflow_id: String,
    pub workspace_id: String,
    pub project_id: String,
    pub status: ExecutionStatus,
    #[serde(default)]
    pub nodes: Vec<ExecutionNode>,
    #[serde(default)]
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub continue_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub status_message: Option<String>,
    pub started_at: DateTime<Utc>,
    #[serde(default)]
    pub stopped_at: Option<DateTime<Utc>>,
}

impl Execution {
    /// A new RUNNING execution for one trigger firing of a workflow.
    pub fn new(workflow: &Workflow) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            workflow_id: workflow.id.clone(),
            workspace_id: workflow.workspace_id.clone(),
            project_id: workflow.project_id.clone(),
            status: ExecutionStatus::Running,
            nodes: Vec::new(),
            edges: Vec::new(),
            continue_at: None,
            status_message: None,
            started_at: Utc::now(),
            stopped_at: None,
        }
    }

    pub fn node(&self, id: &str) -> Option<&ExecutionNode> {
        self.nodes.iter().find(|n| n.node.id == id)
    }

    pub fn node_mut(&mut self, id: &str) -> Option<&mut ExecutionNode> {
        self.nodes.iter_mut().find(|n| n.node.id == id)
    }

    /// Leaves of the traversed sub-graph that traversal may continue from:
    /// SUCCESS nodes with no recorded outgoing edge. Suspended or failed
    /// leaves wait for their own resume signal and never re-enter the
    /// frontier on a redelivered run signal.
    pub fn frontier(&self) -> Vec<String> {
        self.nodes
            .iter()
            .filter(|n| n.status == NodeRunStatus::Success)
            .filter(|n| !self.edges.iter().any(|e| e.source == n.node.id))
            .map(|n| n.node.id.clone())
            .collect()
    }
}

/// One pending execution-start request in a workspace's run queue.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueueItem {
    pub id: String,
    pub workspace_id: String,
    pub execution_id: String,
    #[serde(default)]
    pub input: Option<serde_json::Value>,
    pub enqueued_at: DateTime<Utc>,
}

impl QueueItem {
    pub fn new(
        workspace_id: impl Into<String>,
        execution_id: impl Into<String>,
        input: Option<serde_json::Value>,
    ) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            workspace_id: workspace_id.into(),
            execution_id: execution_id.into(),
            input,
            enqueued_at: Utc::now(),
        }
    }
}

/// Drain guard for a workspace's run queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueueState {
    Pending,
    Running,
}
