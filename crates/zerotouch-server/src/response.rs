//! Success envelope shared by every API handler.
//!
//! Errors use the `OrchestratorError` response body instead:
//! `{success: false, error, details?, timestamp}`.

use axum::Json;
use serde::Serialize;

use zerotouch_core::OrchestratorError;

/// `{success: true, message, data, timestamp}`
pub fn ok<T: Serialize>(
    message: impl Into<String>,
    data: T,
) -> Result<Json<serde_json::Value>, OrchestratorError> {
    let data = serde_json::to_value(data)
        .map_err(|e| OrchestratorError::Internal(format!("Failed to serialize response: {}", e)))?;
    Ok(Json(serde_json::json!({
        "success": true,
        "message": message.into(),
        "data": data,
        "timestamp": chrono::Utc::now().to_rfc3339(),
    })))
}

/// Turn a JSON body rejection into a 400 with the standard error body.
pub fn bad_body(rejection: axum::extract::rejection::JsonRejection) -> OrchestratorError {
    OrchestratorError::Validation(rejection.body_text())
}
