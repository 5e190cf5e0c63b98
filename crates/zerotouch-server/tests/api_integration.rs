//! HTTP API integration tests.
//!
//! The router is driven in-process with `tower::ServiceExt::oneshot`; the
//! reqwest-backed remote agent is exercised against a throwaway axum server
//! bound to an ephemeral port.
//!
//! Run with: cargo test -p zerotouch-server --test api_integration

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::routing::{get, post};
use axum::Router;
use serde_json::{json, Value};
use tower::ServiceExt;

use zerotouch_core::remote::{
    HttpRemoteAgent, RemoteAgent, RemoteError, RemoteRequest, RemoteResponse, RemoteStatus,
};
use zerotouch_core::{AppConfig, AppState, AppStateInner, OrchestratorConfig, RemoteConfig};
use zerotouch_server::app_router;

// ─── Helpers ────────────────────────────────────────────────────────────────

/// Succeeds for every task except ids starting with `fail`.
struct FakeAgent;

#[async_trait]
impl RemoteAgent for FakeAgent {
    async fn execute(&self, request: RemoteRequest) -> Result<RemoteResponse, RemoteError> {
        if request.task_id.starts_with("fail") {
            return Ok(RemoteResponse::failure("simulated failure"));
        }
        let mut payload = serde_json::Map::new();
        payload.insert("confidence".to_string(), json!(0.8));
        Ok(RemoteResponse::success(payload))
    }
}

fn state() -> AppState {
    let config = AppConfig {
        orchestrator: OrchestratorConfig {
            base_retry_delay_ms: 1,
            max_retry_delay_ms: 2,
            max_retries: 1,
            max_batch_size: 3,
            ..OrchestratorConfig::default()
        },
        remote: RemoteConfig::default(),
    };
    Arc::new(AppStateInner::with_remote(config, Arc::new(FakeAgent)).unwrap())
}

async fn send(app: &Router, method: &str, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let request = Request::builder()
        .method(method)
        .uri(uri)
        .header("content-type", "application/json")
        .body(match body {
            Some(v) => Body::from(v.to_string()),
            None => Body::empty(),
        })
        .unwrap();
    let response = app.clone().oneshot(request).await.unwrap();
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap_or(Value::Null)
    };
    (status, json)
}

async fn wait_terminal(app: &Router, id: &str) -> Value {
    for _ in 0..200 {
        let (_, body) = send(app, "GET", &format!("/api/workflows/{}", id), None).await;
        let status = body["data"]["status"].as_str().unwrap_or_default().to_string();
        if status == "completed" || status == "failed" {
            return body["data"].clone();
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("workflow {} did not finish", id);
}

// ─── Workflows ──────────────────────────────────────────────────────────────

#[tokio::test]
async fn test_submit_and_poll_workflow() {
    let app = app_router(state(), None);

    let (status, body) = send(
        &app,
        "POST",
        "/api/workflows",
        Some(json!({
            "kind": "port_strike_response",
            "tasks": [
                { "agentKind": "sentinel", "taskId": "detect", "priority": 1 },
                { "agent_kind": "simulator", "task_id": "reroute", "priority": 2 }
            ]
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    let id = body["data"]["workflowId"].as_str().unwrap().to_string();

    let workflow = wait_terminal(&app, &id).await;
    assert_eq!(workflow["status"], "completed");
    assert_eq!(workflow["totalTasks"], 2);
    assert_eq!(workflow["results"].as_array().unwrap().len(), 2);

    let (_, list) = send(&app, "GET", "/api/workflows", None).await;
    assert_eq!(list["data"]["workflows"].as_array().unwrap().len(), 1);

    let (status, _) = send(&app, "DELETE", &format!("/api/workflows/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);
    let (status, body) = send(&app, "GET", &format!("/api/workflows/{}", id), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn test_failed_task_fails_workflow() {
    let app = app_router(state(), None);
    let (_, body) = send(
        &app,
        "POST",
        "/api/workflows",
        Some(json!({
            "kind": "test",
            "tasks": [{ "agentKind": "audit", "taskId": "fail-now", "maxRetries": 0 }]
        })),
    )
    .await;
    let id = body["data"]["workflowId"].as_str().unwrap().to_string();

    let workflow = wait_terminal(&app, &id).await;
    assert_eq!(workflow["status"], "failed");
    assert_eq!(workflow["results"][0]["errorDetail"], "simulated failure");
    assert_eq!(workflow["results"][0]["attemptsMade"], 1);
}

#[tokio::test]
async fn test_manual_run_and_run_twice() {
    let app = app_router(state(), None);
    let (_, body) = send(
        &app,
        "POST",
        "/api/workflows",
        Some(json!({
            "kind": "test",
            "autoRun": false,
            "tasks": [{ "agentKind": "executor", "taskId": "go" }]
        })),
    )
    .await;
    assert_eq!(body["data"]["status"], "pending");
    let id = body["data"]["workflowId"].as_str().unwrap().to_string();

    let (status, _) = send(&app, "POST", &format!("/api/workflows/{}/cancel", id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);

    let (status, _) = send(&app, "POST", &format!("/api/workflows/{}/run", id), None).await;
    assert_eq!(status, StatusCode::OK);
    wait_terminal(&app, &id).await;

    let (status, body) = send(&app, "POST", &format!("/api/workflows/{}/run", id), None).await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["error"], "Invalid state");
}

#[tokio::test]
async fn test_malformed_submissions_are_bad_requests() {
    let app = app_router(state(), None);

    // unknown agent kind
    let (status, body) = send(
        &app,
        "POST",
        "/api/workflows",
        Some(json!({ "kind": "test", "tasks": [{ "agentKind": "oracle", "taskId": "a" }] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);

    // duplicate ids
    let (status, _) = send(
        &app,
        "POST",
        "/api/workflows",
        Some(json!({ "kind": "test", "tasks": [
            { "agentKind": "sentinel", "taskId": "a" },
            { "agentKind": "sentinel", "taskId": "a" }
        ] })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    // over the batch limit of 3
    let tasks: Vec<Value> = (0..4)
        .map(|i| json!({ "agentKind": "audit", "taskId": format!("t{}", i) }))
        .collect();
    let (status, body) = send(
        &app,
        "POST",
        "/api/workflows",
        Some(json!({ "kind": "test", "tasks": tasks })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert!(body["details"].as_str().unwrap().contains("exceeds"));

    let (_, list) = send(&app, "GET", "/api/workflows", None).await;
    assert!(list["data"]["workflows"].as_array().unwrap().is_empty());
}

// ─── Agents, metrics, health ────────────────────────────────────────────────

#[tokio::test]
async fn test_agent_status_endpoints() {
    let app = app_router(state(), None);

    let (status, body) = send(&app, "GET", "/api/agents", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["agents"].as_array().unwrap().len(), 5);

    let (status, body) = send(
        &app,
        "POST",
        "/api/agents/negotiator/status",
        Some(json!({ "status": "waiting", "confidence": 0.65 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "waiting");

    let (_, body) = send(&app, "GET", "/api/agents/negotiator", None).await;
    assert_eq!(body["data"]["confidence"], 0.65);

    let (status, _) = send(
        &app,
        "POST",
        "/api/agents/negotiator/status",
        Some(json!({ "confidence": 2.0 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);

    let (status, _) = send(&app, "GET", "/api/agents/oracle", None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_execute_single_agent_task() {
    let app = app_router(state(), None);

    let (status, body) = send(
        &app,
        "POST",
        "/api/agents/sentinel/execute",
        Some(json!({ "taskId": "scan", "parameters": { "analysis_type": "congestion" } })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "completed");
    assert_eq!(body["data"]["result"]["taskId"], "scan");
    assert_eq!(body["data"]["result"]["status"], "succeeded");
    let id = body["data"]["workflowId"].as_str().unwrap().to_string();
    let (status, _) = send(&app, "GET", &format!("/api/workflows/{}", id), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        "POST",
        "/api/agents/audit/execute",
        Some(json!({ "taskId": "fail-audit" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "failed");
    assert_eq!(body["data"]["result"]["status"], "failed");

    let (status, body) = send(&app, "POST", "/api/agents/executor/execute", Some(json!({}))).await;
    assert_eq!(status, StatusCode::OK);
    assert!(body["data"]["result"]["taskId"]
        .as_str()
        .unwrap()
        .starts_with("executor-"));

    let (status, _) = send(&app, "POST", "/api/agents/oracle/execute", Some(json!({}))).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_metrics_and_health() {
    let app = app_router(state(), None);
    let (_, body) = send(
        &app,
        "POST",
        "/api/workflows",
        Some(json!({ "kind": "test", "tasks": [{ "agentKind": "sentinel", "taskId": "a" }] })),
    )
    .await;
    let id = body["data"]["workflowId"].as_str().unwrap().to_string();
    wait_terminal(&app, &id).await;

    let (status, body) = send(&app, "GET", "/api/metrics", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["workflowsCompleted"], 1);
    assert_eq!(body["data"]["tasksSucceeded"], 1);

    let (status, body) = send(&app, "GET", "/api/metrics/agents", None).await;
    assert_eq!(status, StatusCode::OK);
    let agents = body["data"]["agents"].as_array().unwrap();
    assert_eq!(agents.len(), 5);
    let sentinel = agents
        .iter()
        .find(|a| a["agentKind"] == "sentinel")
        .unwrap();
    assert_eq!(sentinel["tasksTotal"], 1);
    assert_eq!(sentinel["successRate"], 1.0);
    assert_eq!(sentinel["meanAttempts"], 1.0);
    let audit = agents.iter().find(|a| a["agentKind"] == "audit").unwrap();
    assert_eq!(audit["tasksTotal"], 0);

    let (status, body) = send(&app, "GET", "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["status"], "ok");
    assert_eq!(body["remoteConnected"], true);
    assert_eq!(body["agentsAvailable"], 5);
}

// ─── HttpRemoteAgent against a live socket ──────────────────────────────────

/// Serve a fake agent service; returns its base URL.
async fn spawn_fake_service(hits: Arc<AtomicUsize>) -> String {
    let app = Router::new()
        .route("/health", get(|| async { "ok" }))
        .route(
            "/agents/execute",
            post(move |headers: axum::http::HeaderMap, axum::Json(body): axum::Json<Value>| {
                let hits = hits.clone();
                async move {
                    hits.fetch_add(1, Ordering::SeqCst);
                    let authorized = headers
                        .get("authorization")
                        .and_then(|v| v.to_str().ok())
                        == Some("Bearer secret");
                    if !authorized {
                        return (StatusCode::UNAUTHORIZED, axum::Json(json!({ "error": "no key" })));
                    }
                    match body["task_id"].as_str() {
                        Some("busy") => (
                            StatusCode::TOO_MANY_REQUESTS,
                            axum::Json(json!({ "error": "slow down" })),
                        ),
                        Some("broken") => (
                            StatusCode::OK,
                            axum::Json(json!({ "status": "error", "error": "model crashed" })),
                        ),
                        _ => (
                            StatusCode::OK,
                            axum::Json(json!({
                                "status": "success",
                                "result": { "agent": body["agent_type"] },
                                "confidence": 0.75
                            })),
                        ),
                    }
                }
            }),
        );
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

fn request(task_id: &str) -> RemoteRequest {
    RemoteRequest {
        agent_type: zerotouch_core::models::AgentKind::Sentinel,
        task_id: task_id.to_string(),
        description: String::new(),
        parameters: serde_json::Map::new(),
        priority: 1,
        timeout: 5_000,
    }
}

#[tokio::test]
async fn test_http_remote_agent_round_trip() {
    let hits = Arc::new(AtomicUsize::new(0));
    let base_url = spawn_fake_service(hits.clone()).await;
    let agent = HttpRemoteAgent::new(&RemoteConfig {
        base_url: base_url.clone(),
        api_key: "secret".to_string(),
        ..RemoteConfig::default()
    });

    assert!(agent.health().await);

    let response = agent.execute(request("ok")).await.unwrap();
    assert_eq!(response.status, RemoteStatus::Success);
    let payload = response.result_payload.unwrap();
    assert_eq!(payload["agent"], "sentinel");
    assert_eq!(payload["confidence"], 0.75);

    let response = agent.execute(request("broken")).await.unwrap();
    assert_eq!(response.status, RemoteStatus::Failure);
    assert_eq!(response.error_message.as_deref(), Some("model crashed"));

    assert_eq!(
        agent.execute(request("busy")).await.unwrap_err(),
        RemoteError::TooManyRequests
    );

    let anonymous = HttpRemoteAgent::new(&RemoteConfig {
        base_url,
        ..RemoteConfig::default()
    });
    match anonymous.execute(request("ok")).await.unwrap_err() {
        RemoteError::Status { status, .. } => assert_eq!(status, 401),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(hits.load(Ordering::SeqCst), 4);
}

#[tokio::test]
async fn test_http_remote_agent_unreachable() {
    // Bind then drop to get a port nobody listens on.
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let agent = HttpRemoteAgent::new(&RemoteConfig {
        base_url: format!("http://{}", addr),
        health_timeout_ms: 500,
        ..RemoteConfig::default()
    });
    assert!(!agent.health().await);
    assert!(matches!(
        agent.execute(request("ok")).await,
        Err(RemoteError::Transport(_))
    ));
}
