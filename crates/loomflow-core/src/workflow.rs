use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// How a workflow's trigger fires.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TriggerStrategy {
    Manual,
    Schedule,
    Poll,
    Webhook,
}

/// What kind of work a node represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    Trigger,
    Action,
    /// Empty slot from the visual builder. Never executed, never recorded.
    Placeholder,
    /// Runs a handler that selects which outgoing edges to follow.
    DecidePath,
}

/// Canvas position. Irrelevant to execution, round-tripped for the builder.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

/// A unit of work in the workflow graph.
///
/// Exactly one of `action_id` / `trigger_id` is set, except placeholders
/// which carry neither. `output` is design-time mock output from the builder
/// and must never leak into an execution record.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub kind: NodeKind,
    pub app_id: String,
    #[serde(default)]
    pub action_id: Option<String>,
    #[serde(default)]
    pub trigger_id: Option<String>,
    /// Handler configuration.
    #[serde(default)]
    pub value: serde_json::Value,
    /// Design-time mock output, stripped before execution.
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    #[serde(default)]
    pub position: Position,
}

impl Node {
    pub fn new(id: impl Into<String>, kind: NodeKind, app_id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            kind,
            app_id: app_id.into(),
            action_id: None,
            trigger_id: None,
            value: serde_json::Value::Null,
            output: None,
            position: Position::default(),
        }
    }

    pub fn with_action(mut self, action_id: impl Into<String>) -> Self {
        self.action_id = Some(action_id.into());
        self
    }

    pub fn with_trigger(mut self, trigger_id: impl Into<String>) -> Self {
        self.trigger_id = Some(trigger_id.into());
        self
    }

    pub fn with_value(mut self, value: serde_json::Value) -> Self {
        self.value = value;
        self
    }

    pub fn is_placeholder(&self) -> bool {
        self.kind == NodeKind::Placeholder
    }
}

/// Edge kind. Placeholder bridges exist only as builder wiring.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Workflow,
    PlaceholderBridge,
}

impl Default for EdgeKind {
    fn default() -> Self {
        EdgeKind::Workflow
    }
}

/// A directed edge between two nodes.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Edge {
    pub id: String,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub kind: EdgeKind,
}

impl Edge {
    pub fn new(
        id: impl Into<String>,
        source: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            id: id.into(),
            source: source.into(),
            target: target.into(),
            kind: EdgeKind::Workflow,
        }
    }
}

/// A stored automation definition: a graph of nodes and edges plus a trigger
/// strategy. Read-only to the engine except for deactivation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    pub id: String,
    pub project_id: String,
    pub workspace_id: String,
    pub nodes: Vec<Node>,
    pub edges: Vec<Edge>,
    pub strategy: TriggerStrategy,
    pub is_active: bool,
}

impl Workflow {
    /// The workflow's single trigger node, if present.
    pub fn trigger_node(&self) -> Option<&Node> {
        self.nodes.iter().find(|n| n.kind == NodeKind::Trigger)
    }
}

/// Indexed view over a workflow for O(1) node and edge lookups.
///
/// Nodes and edges stay in their arena slices; lookups go through id and
/// source maps instead of repeated linear scans.
pub struct IndexedWorkflow<'a> {
    pub workflow: &'a Workflow,
    node_by_id: HashMap<&'a str, usize>,
    edges_by_source: HashMap<&'a str, Vec<usize>>,
}

impl<'a> IndexedWorkflow<'a> {
    pub fn new(workflow: &'a Workflow) -> Self {
        let mut node_by_id = HashMap::with_capacity(workflow.nodes.len());
        for (i, node) in workflow.nodes.iter().enumerate() {
            node_by_id.insert(node.id.as_str(), i);
        }
        let mut edges_by_source: HashMap<&str, Vec<usize>> = HashMap::new();
        for (i, edge) in workflow.edges.iter().enumerate() {
            edges_by_source.entry(edge.source.as_str()).or_default().push(i);
        }
        Self {
            workflow,
            node_by_id,
            edges_by_source,
        }
    }

    pub fn node(&self, id: &str) -> Option<&'a Node> {
        self.node_by_id.get(id).map(|&i| &self.workflow.nodes[i])
    }

    /// All edges whose source is the given node id, in definition order.
    pub fn edges_from(&self, source: &str) -> Vec<&'a Edge> {
        self.edges_by_source
            .get(source)
            .map(|idxs| idxs.iter().map(|&i| &self.workflow.edges[i]).collect())
            .unwrap_or_default()
    }
}
