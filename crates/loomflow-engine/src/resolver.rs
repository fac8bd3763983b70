use std::collections::HashSet;

use loomflow_core::error::{FlowError, Result};
use loomflow_core::execution::Execution;
use loomflow_core::workflow::{Edge, EdgeKind, IndexedWorkflow, Node, NodeKind};

/// A node eligible to run in the next wave, plus the frontier node whose
/// output feeds it.
#[derive(Debug, Clone)]
pub struct WaveNode {
    pub node: Node,
    pub upstream_id: String,
}

/// The next wave of eligible nodes and the edges their traversal records.
///
/// An empty `nodes_to_run` tells the caller to evaluate overall completion.
#[derive(Debug, Clone, Default)]
pub struct Wave {
    pub nodes_to_run: Vec<WaveNode>,
    pub edges_to_record: Vec<Edge>,
}

impl Wave {
    pub fn is_empty(&self) -> bool {
        self.nodes_to_run.is_empty()
    }
}

/// Compute the next wave of nodes eligible to run.
///
/// The frontier is the explicit continuation set on resumption, otherwise
/// the execution's current leaves. For each frontier node the workflow
/// edges with matching source are followed — restricted to the recorded
/// `paths_to_take` for decide-path nodes — and their targets collected.
/// Placeholder targets are traversed through, never emitted; the bridging
/// edge is re-sourced to the last non-placeholder ancestor.
pub fn resolve_next_wave(
    workflow: &IndexedWorkflow<'_>,
    execution: &Execution,
    frontier: &[String],
) -> Result<Wave> {
    let mut wave = Wave::default();
    let mut emitted_nodes: HashSet<String> = HashSet::new();
    let mut emitted_edges: HashSet<String> = HashSet::new();

    for frontier_id in frontier {
        let exec_node =
            execution
                .node(frontier_id)
                .ok_or_else(|| FlowError::NodeNotFound {
                    execution_id: execution.id.clone(),
                    node_id: frontier_id.clone(),
                })?;

        let mut candidates = workflow.edges_from(frontier_id);

        // A decide-path node selects its own outgoing edges; the list was
        // computed by actually running its handler, never inferred.
        if exec_node.node.kind == NodeKind::DecidePath {
            let chosen = paths_to_take(exec_node.output.as_ref());
            candidates.retain(|e| chosen.contains(&e.id));
        }

        for edge in candidates {
            follow_edge(
                workflow,
                edge,
                frontier_id,
                &mut wave,
                &mut emitted_nodes,
                &mut emitted_edges,
                &mut HashSet::new(),
            )?;
        }
    }

    Ok(wave)
}

/// Resolve one candidate edge, eliding placeholders.
///
/// `ancestor_id` is the last non-placeholder node on the path; `seen`
/// guards against placeholder cycles in a malformed graph.
fn follow_edge(
    workflow: &IndexedWorkflow<'_>,
    edge: &Edge,
    ancestor_id: &str,
    wave: &mut Wave,
    emitted_nodes: &mut HashSet<String>,
    emitted_edges: &mut HashSet<String>,
    seen: &mut HashSet<String>,
) -> Result<()> {
    let target = workflow.node(&edge.target).ok_or_else(|| {
        FlowError::InvalidWorkflow {
            workflow_id: workflow.workflow.id.clone(),
            message: format!("Edge {} points to nonexistent node {}", edge.id, edge.target),
        }
    })?;

    if target.is_placeholder() {
        if !seen.insert(target.id.clone()) {
            return Err(FlowError::InvalidWorkflow {
                workflow_id: workflow.workflow.id.clone(),
                message: format!("Placeholder cycle through node {}", target.id),
            });
        }
        for next in workflow.edges_from(&target.id) {
            follow_edge(
                workflow,
                next,
                ancestor_id,
                wave,
                emitted_nodes,
                emitted_edges,
                seen,
            )?;
        }
        return Ok(());
    }

    if emitted_edges.insert(edge.id.clone()) {
        wave.edges_to_record.push(Edge {
            id: edge.id.clone(),
            source: ancestor_id.to_string(),
            target: target.id.clone(),
            // A bridge edge becomes an ordinary traversal edge once the
            // placeholder chain it crossed is elided.
            kind: if edge.source == ancestor_id {
                edge.kind
            } else {
                EdgeKind::Workflow
            },
        });
    }

    if emitted_nodes.insert(target.id.clone()) {
        let mut node = target.clone();
        // Design-time mock output must never leak into the run record.
        node.output = None;
        wave.nodes_to_run.push(WaveNode {
            node,
            upstream_id: ancestor_id.to_string(),
        });
    }

    Ok(())
}

/// The edge ids a decide-path node chose, read from its recorded output.
fn paths_to_take(output: Option<&serde_json::Value>) -> HashSet<String> {
    output
        .and_then(|o| o.get("paths_to_take"))
        .and_then(|v| v.as_array())
        .map(|edges| {
            edges
                .iter()
                .filter_map(|e| e.as_str().map(str::to_string))
                .collect()
        })
        .unwrap_or_default()
}
