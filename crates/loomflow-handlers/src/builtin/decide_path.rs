use std::collections::HashMap;

use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

use loomflow_core::error::Result;
use loomflow_core::handler::{HandlerKind, HandlerResponse, NodeHandler, RunContext};

/// Conditional branch selector.
///
/// Evaluates one expression per outgoing edge against the upstream input
/// object and reports the matching edge ids as `paths_to_take` in its
/// output. The graph resolver then restricts traversal to exactly those
/// edges — zero, one, or many may match.
pub struct DecidePathHandler;

#[derive(Deserialize)]
struct DecidePathConfig {
    #[serde(default)]
    paths: Vec<PathRule>,
    /// Edge to take when no rule matches.
    #[serde(default)]
    default_edge: Option<String>,
}

#[derive(Deserialize)]
struct PathRule {
    edge_id: String,
    expr: String,
}

impl NodeHandler for DecidePathHandler {
    fn app_id(&self) -> &str {
        "core"
    }

    fn kind(&self) -> HandlerKind {
        HandlerKind::Action
    }

    fn key(&self) -> &str {
        "decide_path"
    }

    fn run(
        &self,
        config: serde_json::Value,
        input: Option<serde_json::Value>,
        ctx: RunContext,
    ) -> BoxFuture<'_, Result<HandlerResponse>> {
        Box::pin(async move {
            let config: DecidePathConfig = match serde_json::from_value(config) {
                Ok(c) => c,
                Err(e) => {
                    return Ok(HandlerResponse::Failure {
                        message: format!("Invalid decide_path config: {}", e),
                    })
                }
            };

            let data: HashMap<String, serde_json::Value> = match input {
                Some(serde_json::Value::Object(map)) => map.into_iter().collect(),
                _ => HashMap::new(),
            };

            let mut paths_to_take: Vec<String> = config
                .paths
                .iter()
                .filter(|rule| evaluate_condition(&rule.expr, &data))
                .map(|rule| rule.edge_id.clone())
                .collect();

            if paths_to_take.is_empty() {
                if let Some(default_edge) = config.default_edge {
                    paths_to_take.push(default_edge);
                }
            }

            debug!(
                execution_id = %ctx.execution_id,
                node_id = %ctx.node_id,
                paths = paths_to_take.len(),
                "Paths decided"
            );

            Ok(HandlerResponse::Success {
                output: serde_json::json!({ "paths_to_take": paths_to_take }),
            })
        })
    }
}

/// Evaluate a simple conditional expression against the input data.
///
/// Supported expressions:
/// - `key == "value"` — exact match
/// - `key != "value"` — not equal
/// - `key contains "substr"` — substring match
///
/// Returns `false` for unparseable expressions.
pub fn evaluate_condition(expr: &str, data: &HashMap<String, serde_json::Value>) -> bool {
    let expr = expr.trim();

    if let Some((key, substr)) = parse_operator(expr, "contains") {
        return data
            .get(key)
            .and_then(|v| v.as_str())
            .is_some_and(|s| s.contains(substr));
    }

    if let Some((key, value)) = parse_operator(expr, "!=") {
        return data
            .get(key)
            .and_then(|v| v.as_str())
            .is_some_and(|s| s != value);
    }

    if let Some((key, value)) = parse_operator(expr, "==") {
        return data
            .get(key)
            .and_then(|v| v.as_str())
            .is_some_and(|s| s == value);
    }

    false
}

/// Parse `key OP "value"` expressions, returning (key, value).
fn parse_operator<'a>(expr: &'a str, op: &str) -> Option<(&'a str, &'a str)> {
    let parts: Vec<&str> = expr.splitn(2, op).collect();
    if parts.len() != 2 {
        return None;
    }
    let key = parts[0].trim();
    let val = parts[1].trim().trim_matches('"');
    Some((key, val))
}
