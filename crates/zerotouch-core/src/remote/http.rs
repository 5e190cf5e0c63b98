//! HTTP remote agent - executes agent tasks against the AI agent API.
//!
//! POST {base_url}/agents/execute
//! Headers:
//!   Authorization: Bearer {api_key}
//!   content-type: application/json
//!
//! The per-attempt deadline is enforced by the caller; the request timeout
//! set here is a backstop for a single HTTP exchange.

use std::time::Duration;

use async_trait::async_trait;

use super::{RemoteAgent, RemoteError, RemoteRequest, RemoteResponse};
use crate::config::RemoteConfig;
use crate::models::task::Parameters;

pub struct HttpRemoteAgent {
    client: reqwest::Client,
    base_url: String,
    api_key: String,
    health_timeout: Duration,
}

impl HttpRemoteAgent {
    pub fn new(config: &RemoteConfig) -> Self {
        Self {
            client: reqwest::Client::builder()
                .user_agent(concat!("zerotouch/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_else(|_| reqwest::Client::new()),
            base_url: config.base_url.trim_end_matches('/').to_string(),
            api_key: config.api_key.clone(),
            health_timeout: Duration::from_millis(config.health_timeout_ms),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

#[async_trait]
impl RemoteAgent for HttpRemoteAgent {
    async fn execute(&self, request: RemoteRequest) -> Result<RemoteResponse, RemoteError> {
        let url = format!("{}/agents/execute", self.base_url);

        tracing::debug!(
            "[HttpRemoteAgent] POST {} (agent: {}, task: {})",
            url,
            request.agent_type,
            request.task_id
        );

        let mut builder = self
            .client
            .post(&url)
            .header("content-type", "application/json")
            .timeout(Duration::from_millis(request.timeout.max(1)))
            .json(&request);
        if !self.api_key.is_empty() {
            builder = builder.bearer_auth(&self.api_key);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| RemoteError::Transport(format!("HTTP request failed: {}", e)))?;

        let status = response.status();
        let response_text = response
            .text()
            .await
            .map_err(|e| RemoteError::Transport(format!("Failed to read response body: {}", e)))?;

        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(RemoteError::TooManyRequests);
        }
        if !status.is_success() {
            return Err(RemoteError::Status {
                status: status.as_u16(),
                message: response_text,
            });
        }

        let json: serde_json::Value = serde_json::from_str(&response_text).map_err(|e| {
            RemoteError::Transport(format!("Failed to parse response JSON: {}", e))
        })?;

        Ok(parse_execute_response(&json))
    }

    async fn health(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self
            .client
            .get(&url)
            .timeout(self.health_timeout)
            .send()
            .await
        {
            Ok(resp) => resp.status().is_success(),
            Err(e) => {
                tracing::warn!("[HttpRemoteAgent] Health check failed: {}", e);
                false
            }
        }
    }
}

/// Map the service's `{status, result, error}` body onto a [`RemoteResponse`].
fn parse_execute_response(json: &serde_json::Value) -> RemoteResponse {
    let status = json
        .get("status")
        .and_then(|s| s.as_str())
        .unwrap_or("unknown")
        .to_ascii_lowercase();

    match status.as_str() {
        "success" | "succeeded" | "completed" | "ok" => {
            let mut payload: Parameters = json
                .get("result")
                .and_then(|r| r.as_object())
                .cloned()
                .unwrap_or_default();
            for key in ["confidence", "execution_time"] {
                if let Some(v) = json.get(key) {
                    payload.entry(key.to_string()).or_insert_with(|| v.clone());
                }
            }
            RemoteResponse::success(payload)
        }
        other => {
            let message = json
                .get("error")
                .and_then(|e| e.as_str())
                .map(|s| s.to_string())
                .unwrap_or_else(|| format!("remote reported status '{}'", other));
            RemoteResponse::failure(message)
        }
    }
}
