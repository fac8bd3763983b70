use chrono::{Duration, Utc};
use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

use loomflow_core::error::Result;
use loomflow_core::handler::{HandlerKind, HandlerResponse, NodeHandler, RunContext};

/// Suspends the branch for a configured duration.
///
/// Returns `Scheduled` with `now + seconds`; the time-based poller resumes
/// the node once the timestamp passes. The handler itself never sleeps.
pub struct DelayHandler;

#[derive(Deserialize)]
struct DelayConfig {
    seconds: i64,
}

impl NodeHandler for DelayHandler {
    fn app_id(&self) -> &str {
        "core"
    }

    fn kind(&self) -> HandlerKind {
        HandlerKind::Action
    }

    fn key(&self) -> &str {
        "delay"
    }

    fn run(
        &self,
        config: serde_json::Value,
        input: Option<serde_json::Value>,
        ctx: RunContext,
    ) -> BoxFuture<'_, Result<HandlerResponse>> {
        Box::pin(async move {
            let config: DelayConfig = match serde_json::from_value(config) {
                Ok(c) => c,
                Err(e) => {
                    return Ok(HandlerResponse::Failure {
                        message: format!("Invalid delay config: {}", e),
                    })
                }
            };
            if config.seconds < 0 {
                return Ok(HandlerResponse::Failure {
                    message: "Delay must be non-negative".to_string(),
                });
            }

            let scheduled_at = Utc::now() + Duration::seconds(config.seconds);
            debug!(
                execution_id = %ctx.execution_id,
                node_id = %ctx.node_id,
                seconds = config.seconds,
                "Delay scheduled"
            );

            Ok(HandlerResponse::Scheduled {
                payload: serde_json::json!({
                    "delayed_seconds": config.seconds,
                    "input": input,
                }),
                scheduled_at,
            })
        })
    }
}
