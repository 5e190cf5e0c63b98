//! Remote agent service boundary.
//!
//! The remote AI service is an opaque RPC: one request per task attempt,
//! one response (or transport error) back. [`HttpRemoteAgent`] talks to the
//! real service over HTTP; tests plug in scripted implementations.

pub mod http;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::models::agent::AgentKind;
use crate::models::task::{AgentTask, Parameters};

pub use http::HttpRemoteAgent;

/// One attempt of an agent task as sent over the wire.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteRequest {
    pub agent_type: AgentKind,
    pub task_id: String,
    pub description: String,
    pub parameters: Parameters,
    pub priority: i32,
    /// Per-attempt timeout in milliseconds
    pub timeout: u64,
}

impl From<&AgentTask> for RemoteRequest {
    fn from(task: &AgentTask) -> Self {
        Self {
            agent_type: task.agent_kind,
            task_id: task.task_id.clone(),
            description: task.description.clone(),
            parameters: task.parameters.clone(),
            priority: task.priority,
            timeout: task.timeout_ms,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum RemoteStatus {
    Success,
    Failure,
}

/// Response to one attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct RemoteResponse {
    pub status: RemoteStatus,
    #[serde(default)]
    pub result_payload: Option<Parameters>,
    #[serde(default)]
    pub error_message: Option<String>,
}

impl RemoteResponse {
    pub fn success(payload: Parameters) -> Self {
        Self {
            status: RemoteStatus::Success,
            result_payload: Some(payload),
            error_message: None,
        }
    }

    pub fn failure(message: impl Into<String>) -> Self {
        Self {
            status: RemoteStatus::Failure,
            result_payload: None,
            error_message: Some(message.into()),
        }
    }
}

#[derive(Debug, Clone, thiserror::Error, PartialEq)]
pub enum RemoteError {
    /// Network-level failure (connect, send, read, decode).
    #[error("transport error: {0}")]
    Transport(String),

    /// The service signalled "too many requests".
    #[error("remote service is rate limiting requests")]
    TooManyRequests,

    /// Non-success HTTP status other than 429.
    #[error("remote returned {status}: {message}")]
    Status { status: u16, message: String },
}

/// An agent service that executes one task attempt per call.
#[async_trait]
pub trait RemoteAgent: Send + Sync {
    async fn execute(&self, request: RemoteRequest) -> Result<RemoteResponse, RemoteError>;

    /// Whether the service is reachable. Defaults to `true` for in-process agents.
    async fn health(&self) -> bool {
        true
    }
}
