use std::collections::HashMap;

use futures::future::BoxFuture;
use serde::Deserialize;
use tracing::debug;

use loomflow_core::error::{FlowError, Result};
use loomflow_core::handler::{HandlerKind, HandlerResponse, NodeHandler, RunContext};

const USER_AGENT: &str = concat!("Loomflow/", env!("CARGO_PKG_VERSION"));

/// Generic HTTP request action.
pub struct HttpRequestHandler;

#[derive(Deserialize)]
struct HttpRequestConfig {
    url: String,
    #[serde(default = "default_method")]
    method: String,
    #[serde(default)]
    headers: HashMap<String, String>,
    #[serde(default)]
    body: Option<serde_json::Value>,
    #[serde(default = "default_timeout_secs")]
    timeout_secs: u64,
}

fn default_method() -> String {
    "GET".to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl NodeHandler for HttpRequestHandler {
    fn app_id(&self) -> &str {
        "http"
    }

    fn kind(&self) -> HandlerKind {
        HandlerKind::Action
    }

    fn key(&self) -> &str {
        "http_request"
    }

    fn run(
        &self,
        config: serde_json::Value,
        _input: Option<serde_json::Value>,
        ctx: RunContext,
    ) -> BoxFuture<'_, Result<HandlerResponse>> {
        Box::pin(async move {
            let config: HttpRequestConfig = match serde_json::from_value(config) {
                Ok(c) => c,
                Err(e) => {
                    return Ok(HandlerResponse::Failure {
                        message: format!("Invalid http_request config: {}", e),
                    })
                }
            };

            debug!(
                execution_id = %ctx.execution_id,
                node_id = %ctx.node_id,
                method = %config.method,
                url = %config.url,
                "Sending HTTP request"
            );

            let client = reqwest::Client::builder()
                .timeout(std::time::Duration::from_secs(config.timeout_secs))
                .user_agent(USER_AGENT)
                .build()
                .map_err(|e| FlowError::Handler(format!("Failed to create HTTP client: {}", e)))?;

            let method: reqwest::Method = match config.method.to_uppercase().parse() {
                Ok(m) => m,
                Err(_) => {
                    return Ok(HandlerResponse::Failure {
                        message: format!("Unsupported HTTP method: {}", config.method),
                    })
                }
            };

            let mut request = client.request(method, &config.url);
            for (name, value) in &config.headers {
                request = request.header(name, value);
            }
            if let Some(body) = &config.body {
                request = request.json(body);
            }

            let response = match request.send().await {
                Ok(r) => r,
                Err(e) => {
                    return Ok(HandlerResponse::Failure {
                        message: format!("Request failed: {}", e),
                    })
                }
            };

            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            if !status.is_success() {
                return Ok(HandlerResponse::Failure {
                    message: format!("HTTP {}: {}", status.as_u16(), truncate(&text, 500)),
                });
            }

            // JSON bodies pass through structured; anything else as text.
            let body = serde_json::from_str::<serde_json::Value>(&text)
                .unwrap_or(serde_json::Value::String(text));

            Ok(HandlerResponse::Success {
                output: serde_json::json!({
                    "status": status.as_u16(),
                    "body": body,
                }),
            })
        })
    }
}

fn truncate(s: &str, max: usize) -> &str {
    match s.char_indices().nth(max) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}
