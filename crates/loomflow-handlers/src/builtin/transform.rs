use futures::future::BoxFuture;
use serde::Deserialize;

use loomflow_core::error::Result;
use loomflow_core::handler::{HandlerKind, HandlerResponse, NodeHandler, RunContext};

/// Shallow-merges configured fields over the upstream input object.
pub struct TransformHandler;

#[derive(Deserialize)]
struct TransformConfig {
    #[serde(default)]
    set: serde_json::Map<String, serde_json::Value>,
}

impl NodeHandler for TransformHandler {
    fn app_id(&self) -> &str {
        "core"
    }

    fn kind(&self) -> HandlerKind {
        HandlerKind::Action
    }

    fn key(&self) -> &str {
        "transform"
    }

    fn run(
        &self,
        config: serde_json::Value,
        input: Option<serde_json::Value>,
        _ctx: RunContext,
    ) -> BoxFuture<'_, Result<HandlerResponse>> {
        Box::pin(async move {
            let config: TransformConfig = match serde_json::from_value(config) {
                Ok(c) => c,
                Err(e) => {
                    return Ok(HandlerResponse::Failure {
                        message: format!("Invalid transform config: {}", e),
                    })
                }
            };

            let mut output = match input {
                Some(serde_json::Value::Object(map)) => map,
                _ => serde_json::Map::new(),
            };
            for (key, value) in config.set {
                output.insert(key, value);
            }

            Ok(HandlerResponse::Success {
                output: serde_json::Value::Object(output),
            })
        })
    }
}
