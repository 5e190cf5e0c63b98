use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use zerotouch_core::models::AgentTaskInput;
use zerotouch_core::{AppState, OrchestratorError};

use crate::response::{bad_body, ok};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_workflows).post(submit_workflow))
        .route("/{id}", get(get_workflow).delete(remove_workflow))
        .route("/{id}/run", post(run_workflow))
        .route("/{id}/cancel", post(cancel_workflow))
}

type ApiResult = Result<Json<serde_json::Value>, OrchestratorError>;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitWorkflowRequest {
    kind: String,
    tasks: Vec<AgentTaskInput>,
    #[serde(default = "default_auto_run", alias = "auto_run")]
    auto_run: bool,
}

fn default_auto_run() -> bool {
    true
}

async fn submit_workflow(
    State(state): State<AppState>,
    body: Result<Json<SubmitWorkflowRequest>, JsonRejection>,
) -> ApiResult {
    let Json(body) = body.map_err(bad_body)?;
    let workflow_id = state.orchestrator.submit(&body.kind, body.tasks).await?;

    if body.auto_run {
        // The handle is dropped on purpose; callers poll GET /{id}.
        state.orchestrator.run(&workflow_id).await.map_err(|e| match e {
            OrchestratorError::RateLimited(detail) => OrchestratorError::RateLimited(format!(
                "Workflow {} registered but not started: {}",
                workflow_id, detail
            )),
            other => other,
        })?;
    }

    let workflow = state.orchestrator.status(&workflow_id).await?;
    ok(
        "Workflow submitted",
        serde_json::json!({
            "workflowId": workflow.workflow_id,
            "status": workflow.status,
        }),
    )
}

async fn list_workflows(State(state): State<AppState>) -> ApiResult {
    let workflows = state.orchestrator.list().await;
    ok(
        format!("{} workflow(s)", workflows.len()),
        serde_json::json!({ "workflows": workflows }),
    )
}

async fn get_workflow(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let workflow = state.orchestrator.status(&id).await?;
    ok("Workflow status", workflow)
}

async fn run_workflow(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    state.orchestrator.run(&id).await?;
    let workflow = state.orchestrator.status(&id).await?;
    ok(
        "Workflow started",
        serde_json::json!({ "workflowId": workflow.workflow_id, "status": workflow.status }),
    )
}

async fn cancel_workflow(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    state.orchestrator.cancel(&id).await?;
    ok(
        "Cancellation requested",
        serde_json::json!({ "workflowId": id, "cancelled": true }),
    )
}

async fn remove_workflow(State(state): State<AppState>, Path(id): Path<String>) -> ApiResult {
    let workflow = state.orchestrator.remove(&id).await?;
    ok(
        "Workflow removed",
        serde_json::json!({ "workflowId": workflow.workflow_id, "deleted": true }),
    )
}
