//! Shared application state for the axum server and the CLI.

use std::sync::Arc;

use crate::config::AppConfig;
use crate::error::OrchestratorError;
use crate::orchestrator::WorkflowOrchestrator;
use crate::remote::{HttpRemoteAgent, RemoteAgent};

/// Shared state accessible by all API handlers.
pub struct AppStateInner {
    pub orchestrator: WorkflowOrchestrator,
    pub config: AppConfig,
}

pub type AppState = Arc<AppStateInner>;

impl AppStateInner {
    /// Build state talking to the configured HTTP agent service.
    pub fn new(config: AppConfig) -> Result<Self, OrchestratorError> {
        let remote: Arc<dyn RemoteAgent> = Arc::new(HttpRemoteAgent::new(&config.remote));
        Self::with_remote(config, remote)
    }

    /// Build state around any remote agent implementation.
    pub fn with_remote(
        config: AppConfig,
        remote: Arc<dyn RemoteAgent>,
    ) -> Result<Self, OrchestratorError> {
        let orchestrator = WorkflowOrchestrator::from_config(&config.orchestrator, remote)?;
        Ok(Self {
            orchestrator,
            config,
        })
    }
}
