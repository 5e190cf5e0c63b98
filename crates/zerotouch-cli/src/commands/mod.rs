//! CLI command implementations.
//!
//! Each submodule corresponds to a top-level CLI command and reuses
//! the zerotouch-core orchestrator through `AppState`.

pub mod server;
pub mod workflow;

use std::path::Path;
use std::sync::Arc;

use zerotouch_core::{AppConfig, AppState, AppStateInner};

/// Command-line / environment overrides layered on top of the config file.
#[derive(Debug, Default, Clone)]
pub struct ConfigOverrides {
    pub max_concurrency: Option<usize>,
    pub rate_limit_requests: Option<usize>,
    pub rate_limit_window_ms: Option<u64>,
    pub max_retries: Option<u32>,
    pub max_batch_size: Option<usize>,
    pub base_url: Option<String>,
    pub api_key: Option<String>,
}

impl ConfigOverrides {
    pub fn apply(self, config: &mut AppConfig) {
        let o = &mut config.orchestrator;
        if let Some(v) = self.max_concurrency {
            o.max_concurrency = v;
        }
        if let Some(v) = self.rate_limit_requests {
            o.rate_limit_quota = v;
        }
        if let Some(v) = self.rate_limit_window_ms {
            o.rate_limit_window_ms = v;
        }
        if let Some(v) = self.max_retries {
            o.max_retries = v;
        }
        if let Some(v) = self.max_batch_size {
            o.max_batch_size = v;
        }
        if let Some(v) = self.base_url {
            config.remote.base_url = v;
        }
        if let Some(v) = self.api_key {
            config.remote.api_key = v;
        }
    }
}

/// Defaults, then the config file (explicit or default location), then overrides.
pub fn load_config(path: Option<&str>, overrides: ConfigOverrides) -> Result<AppConfig, String> {
    let mut config = AppConfig::load(path.map(Path::new)).map_err(|e| e.to_string())?;
    overrides.apply(&mut config);
    config.orchestrator.validate().map_err(|e| e.to_string())?;
    Ok(config)
}

/// Build a shared `AppState` talking to the configured remote service.
pub fn init_state(config: AppConfig) -> Result<AppState, String> {
    let inner = AppStateInner::new(config).map_err(|e| e.to_string())?;
    Ok(Arc::new(inner))
}

/// Pretty-print a JSON value to stdout.
pub fn print_json(value: &serde_json::Value) {
    println!(
        "{}",
        serde_json::to_string_pretty(value).unwrap_or_else(|_| value.to_string())
    );
}
