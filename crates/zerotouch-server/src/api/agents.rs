use axum::{
    extract::{rejection::JsonRejection, Path, State},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;

use zerotouch_core::models::{AgentKind, AgentStatus, AgentTaskInput, Parameters};
use zerotouch_core::{AppState, OrchestratorError};

use crate::response::{bad_body, ok};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_agents))
        .route("/{kind}", get(get_agent))
        .route("/{kind}/status", post(update_agent_status))
        .route("/{kind}/execute", post(execute_agent_task))
}

type ApiResult = Result<Json<serde_json::Value>, OrchestratorError>;

fn parse_kind(kind: &str) -> Result<AgentKind, OrchestratorError> {
    AgentKind::from_str(kind)
        .ok_or_else(|| OrchestratorError::NotFound(format!("Agent {} not found", kind)))
}

async fn list_agents(State(state): State<AppState>) -> ApiResult {
    let agents = state.orchestrator.agent_states().await;
    ok(
        "Agent status retrieved",
        serde_json::json!({ "agents": agents }),
    )
}

async fn get_agent(State(state): State<AppState>, Path(kind): Path<String>) -> ApiResult {
    let kind = parse_kind(&kind)?;
    let agent = state.orchestrator.agent_state(kind).await;
    ok(format!("{} agent status retrieved", kind), agent)
}

#[derive(Debug, Deserialize)]
struct UpdateAgentStatusRequest {
    status: Option<String>,
    confidence: Option<f64>,
}

async fn update_agent_status(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    body: Result<Json<UpdateAgentStatusRequest>, JsonRejection>,
) -> ApiResult {
    let kind = parse_kind(&kind)?;
    let Json(body) = body.map_err(bad_body)?;

    let status = body
        .status
        .as_deref()
        .map(|s| {
            AgentStatus::from_str(s)
                .ok_or_else(|| OrchestratorError::Validation(format!("Invalid status: {}", s)))
        })
        .transpose()?;

    let agent = state
        .orchestrator
        .update_agent_state(kind, status, body.confidence)
        .await?;
    ok(format!("{} agent status updated", kind), agent)
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ExecuteAgentRequest {
    #[serde(default, alias = "task_id")]
    task_id: Option<String>,
    #[serde(default)]
    description: String,
    #[serde(default)]
    parameters: Parameters,
    #[serde(default)]
    priority: Option<i32>,
    #[serde(default, alias = "timeout_ms")]
    timeout_ms: Option<u64>,
    #[serde(default, alias = "max_retries")]
    max_retries: Option<u32>,
}

/// Run one task against a single agent and answer with its result.
async fn execute_agent_task(
    State(state): State<AppState>,
    Path(kind): Path<String>,
    body: Result<Json<ExecuteAgentRequest>, JsonRejection>,
) -> ApiResult {
    let kind = parse_kind(&kind)?;
    let Json(body) = body.map_err(bad_body)?;

    let task_id = body
        .task_id
        .unwrap_or_else(|| format!("{}-{}", kind, chrono::Utc::now().timestamp_millis()));
    let mut input = AgentTaskInput::new(kind, task_id);
    input.description = body.description;
    input.parameters = body.parameters;
    if let Some(priority) = body.priority {
        input.priority = priority;
    }
    input.timeout_ms = body.timeout_ms;
    input.max_retries = body.max_retries;

    let workflow = state.orchestrator.execute_single(input).await?;
    let result = workflow.results.first().ok_or_else(|| {
        OrchestratorError::Internal(format!("Workflow {} recorded no result", workflow.workflow_id))
    })?;
    ok(
        format!("{} task {}", kind, result.status.as_str()),
        serde_json::json!({
            "workflowId": workflow.workflow_id,
            "status": workflow.status,
            "result": result,
        }),
    )
}
