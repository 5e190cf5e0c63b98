pub mod agents;
pub mod metrics;
pub mod workflows;

use axum::Router;

use zerotouch_core::AppState;

/// Build the complete API router with all sub-routes.
pub fn api_router() -> Router<AppState> {
    Router::new()
        .nest("/api/workflows", workflows::router())
        .nest("/api/agents", agents::router())
        .nest("/api/metrics", metrics::router())
}
