//! ZeroTouch Server - Multi-agent Workflow Orchestration Backend
//!
//! A standalone Rust backend exposing the zerotouch-core orchestrator over a
//! RESTful HTTP API via axum:
//! - workflow submission, polling, cancellation and eviction
//! - per-agent status reads and updates
//! - computed metrics and a health probe
//!
//! This crate can be used standalone (see `zerotouch server`) or embedded in
//! other applications that already hold an `AppState`.

pub mod api;
pub mod response;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::extract::State;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use zerotouch_core::models::AgentKind;
use zerotouch_core::{AppConfig, AppState, AppStateInner};

/// Configuration for the ZeroTouch HTTP server.
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Optional path to static frontend files.
    /// When set, the server serves these files for all non-API routes.
    pub static_dir: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 3210,
            static_dir: None,
        }
    }
}

/// Create a shared `AppState` talking to the configured remote agent service.
pub fn create_app_state(config: AppConfig) -> Result<AppState, String> {
    let inner = AppStateInner::new(config)
        .map_err(|e| format!("Failed to initialize orchestrator: {}", e))?;
    Ok(Arc::new(inner))
}

/// Start the HTTP server.
///
/// Returns the actual address the server is listening on.
pub async fn start_server(config: ServerConfig, app_config: AppConfig) -> Result<SocketAddr, String> {
    // Initialize tracing
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "zerotouch_core=info,zerotouch_server=info,tower_http=info".into()),
        )
        .try_init();

    tracing::info!(
        "Starting ZeroTouch server on {}:{} (remote: {})",
        config.host,
        config.port,
        app_config.remote.base_url
    );

    let state = create_app_state(app_config)?;

    start_server_with_state(config, state).await
}

/// Build the application router (API routes, health, CORS, tracing) without
/// binding a listener.
pub fn app_router(state: AppState, static_dir: Option<&str>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    let mut app = Router::new()
        .merge(api::api_router())
        .route("/api/health", axum::routing::get(health_check))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    // Serve static frontend files if configured
    if let Some(static_dir) = static_dir {
        let static_path = std::path::Path::new(static_dir);
        if static_path.is_dir() {
            tracing::info!("Serving static frontend from: {}", static_dir);
            let serve_dir = tower_http::services::ServeDir::new(static_dir).not_found_service(
                tower_http::services::ServeFile::new(static_path.join("index.html")),
            );
            app = app.fallback_service(serve_dir);
        } else {
            tracing::warn!(
                "Static directory not found: {}. Frontend won't be served.",
                static_dir
            );
        }
    }

    app
}

/// Start the HTTP server with a pre-built `AppState`.
pub async fn start_server_with_state(
    config: ServerConfig,
    state: AppState,
) -> Result<SocketAddr, String> {
    let app = app_router(state, config.static_dir.as_deref());

    // Bind and serve
    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .map_err(|e| format!("Invalid address: {}", e))?;

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|e| format!("Failed to bind to {}: {}", addr, e))?;

    let local_addr = listener
        .local_addr()
        .map_err(|e| format!("Failed to get local address: {}", e))?;

    tracing::info!("ZeroTouch server listening on {}", local_addr);

    // Spawn the server in a background task
    tokio::spawn(async move {
        if let Err(e) = axum::serve(listener, app).await {
            tracing::error!("Server error: {}", e);
        }
    });

    Ok(local_addr)
}

async fn health_check(State(state): State<AppState>) -> axum::Json<serde_json::Value> {
    let remote_connected = state.orchestrator.remote_healthy().await;
    axum::Json(serde_json::json!({
        "status": "ok",
        "server": "zerotouch-server",
        "version": env!("CARGO_PKG_VERSION"),
        "remoteConnected": remote_connected,
        "agentsAvailable": AgentKind::ALL.len(),
        "timestamp": chrono::Utc::now().to_rfc3339(),
    }))
}
