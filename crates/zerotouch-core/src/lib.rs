//! ZeroTouch Core - transport-agnostic orchestration of multi-agent workflows.
//!
//! A workflow is a batch of agent tasks addressed to a remote AI agent
//! service. This crate owns everything between "a caller submitted a batch"
//! and "every task has a recorded result":
//!
//! - [`rate_limiter`] - sliding-window admission for remote calls
//! - [`agent_client`] - one task against the remote service, with retries
//! - [`dispatcher`] - bounded, priority-ordered execution of a batch
//! - [`store`] - workflow lifecycle records and per-agent state
//! - [`orchestrator`] - submit / run / status / cancel
//!
//! It has **no HTTP framework dependency** by default, making it suitable
//! for use from the HTTP server (`zerotouch-server`) and the CLI alike.
//!
//! # Feature Flags
//!
//! - `axum` - Enables `IntoResponse` impl on `OrchestratorError` for use in axum handlers.

pub mod agent_client;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod rate_limiter;
pub mod remote;
pub mod state;
pub mod store;

// Convenience re-exports
pub use config::{AppConfig, OrchestratorConfig, RemoteConfig};
pub use error::OrchestratorError;
pub use orchestrator::{RunHandle, WorkflowOrchestrator};
pub use state::{AppState, AppStateInner};
