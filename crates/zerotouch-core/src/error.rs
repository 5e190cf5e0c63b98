//! Core error type for the ZeroTouch orchestrator.
//!
//! `OrchestratorError` is returned by every fallible core operation (stores,
//! dispatcher validation, orchestrator lifecycle). Per-task remote failures
//! never surface here; they are folded into a `TaskResult` instead.
//! When the `axum` feature is enabled, it also implements `IntoResponse`
//! so it can be used directly as an axum handler error type.

#[derive(Debug, thiserror::Error)]
pub enum OrchestratorError {
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Rate limited: {0}")]
    RateLimited(String),

    #[error("Remote transport error: {0}")]
    RemoteTransport(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid state: {0}")]
    InvalidState(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl OrchestratorError {
    /// Short, stable label used as the `error` field of API error bodies.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Validation(_) => "Validation error",
            Self::RateLimited(_) => "Rate limited",
            Self::RemoteTransport(_) => "Remote transport error",
            Self::NotFound(_) => "Not found",
            Self::InvalidState(_) => "Invalid state",
            Self::Internal(_) => "Internal error",
        }
    }

    /// The detail message carried by the variant.
    pub fn details(&self) -> &str {
        match self {
            Self::Validation(msg)
            | Self::RateLimited(msg)
            | Self::RemoteTransport(msg)
            | Self::NotFound(msg)
            | Self::InvalidState(msg)
            | Self::Internal(msg) => msg,
        }
    }
}

impl From<serde_yaml::Error> for OrchestratorError {
    fn from(err: serde_yaml::Error) -> Self {
        OrchestratorError::Validation(format!("Invalid YAML: {}", err))
    }
}

// ---------------------------------------------------------------------------
// axum integration (opt-in via feature flag)
// ---------------------------------------------------------------------------

#[cfg(feature = "axum")]
impl axum::response::IntoResponse for OrchestratorError {
    fn into_response(self) -> axum::response::Response {
        use axum::http::StatusCode;

        let status = match &self {
            OrchestratorError::Validation(_) => StatusCode::BAD_REQUEST,
            OrchestratorError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            OrchestratorError::RemoteTransport(_) => StatusCode::BAD_GATEWAY,
            OrchestratorError::NotFound(_) => StatusCode::NOT_FOUND,
            OrchestratorError::InvalidState(_) => StatusCode::CONFLICT,
            OrchestratorError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let mut body = serde_json::json!({
            "success": false,
            "error": self.label(),
            "timestamp": chrono::Utc::now().to_rfc3339(),
        });
        if !self.details().is_empty() {
            body["details"] = serde_json::Value::String(self.details().to_string());
        }
        (status, axum::Json(body)).into_response()
    }
}
