use axum::{extract::State, routing::get, Json, Router};

use zerotouch_core::{AppState, OrchestratorError};

use crate::response::ok;

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(get_metrics))
        .route("/agents", get(get_agent_performance))
}

async fn get_metrics(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, OrchestratorError> {
    let metrics = state.orchestrator.metrics().await;
    ok("Metrics computed", metrics)
}

async fn get_agent_performance(
    State(state): State<AppState>,
) -> Result<Json<serde_json::Value>, OrchestratorError> {
    let metrics = state.orchestrator.metrics().await;
    ok(
        "Agent performance computed",
        serde_json::json!({ "agents": metrics.agents }),
    )
}
