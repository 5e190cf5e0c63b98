//! Configuration for the orchestrator and the remote agent service.
//!
//! Values are layered: built-in defaults, then an optional YAML file, then
//! explicit overrides (CLI flags / environment) applied by the caller.
//!
//! ```yaml
//! orchestrator:
//!   max_concurrency: 8
//!   rate_limit_quota: 100
//!   rate_limit_window_ms: 60000
//! remote:
//!   base_url: "${ZEROTOUCH_BASE_URL:-https://api.io.net/v1}"
//!   api_key: "${ZEROTOUCH_API_KEY}"
//! ```

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;

/// Tuning knobs consumed by the rate limiter, agent client and dispatcher.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct OrchestratorConfig {
    /// Worker pool size per dispatched batch
    pub max_concurrency: usize,
    /// Admissions allowed within one sliding window
    pub rate_limit_quota: usize,
    pub rate_limit_window_ms: u64,
    pub base_retry_delay_ms: u64,
    pub max_retry_delay_ms: u64,
    pub backoff_factor: f64,
    /// Retry budget for tasks that don't set their own
    pub max_retries: u32,
    /// Per-attempt timeout for tasks that don't set their own
    pub default_timeout_ms: u64,
    pub max_batch_size: usize,
    /// Require the kind-specific parameter keys on every task
    pub validate_parameters: bool,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 5,
            rate_limit_quota: 100,
            rate_limit_window_ms: 60_000,
            base_retry_delay_ms: 1_000,
            max_retry_delay_ms: 30_000,
            backoff_factor: 2.0,
            max_retries: 3,
            default_timeout_ms: 30_000,
            max_batch_size: 10,
            validate_parameters: false,
        }
    }
}

impl OrchestratorConfig {
    pub fn validate(&self) -> Result<(), OrchestratorError> {
        let invalid = |msg: &str| Err(OrchestratorError::Validation(msg.to_string()));
        if self.max_concurrency == 0 {
            return invalid("max_concurrency must be at least 1");
        }
        if self.rate_limit_quota == 0 {
            return invalid("rate_limit_quota must be at least 1");
        }
        if self.rate_limit_window_ms == 0 {
            return invalid("rate_limit_window_ms must be positive");
        }
        if self.max_batch_size == 0 {
            return invalid("max_batch_size must be at least 1");
        }
        if !(self.backoff_factor >= 1.0) {
            return invalid("backoff_factor must be >= 1.0");
        }
        Ok(())
    }
}

/// Where and how to reach the remote agent service.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct RemoteConfig {
    pub base_url: String,
    pub api_key: String,
    /// Timeout for the health probe
    pub health_timeout_ms: u64,
}

impl Default for RemoteConfig {
    fn default() -> Self {
        Self {
            base_url: "https://api.io.net/v1".to_string(),
            api_key: String::new(),
            health_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct AppConfig {
    pub orchestrator: OrchestratorConfig,
    pub remote: RemoteConfig,
}

impl AppConfig {
    /// Parse a config from YAML, expanding `${VAR}` references in strings.
    pub fn from_yaml(yaml: &str) -> Result<Self, OrchestratorError> {
        let mut config: AppConfig = serde_yaml::from_str(yaml)?;
        config.remote.base_url = resolve_env_vars(&config.remote.base_url);
        config.remote.api_key = resolve_env_vars(&config.remote.api_key);
        Ok(config)
    }

    pub fn from_file(path: &Path) -> Result<Self, OrchestratorError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            OrchestratorError::Validation(format!(
                "Failed to read config file '{}': {}",
                path.display(),
                e
            ))
        })?;
        Self::from_yaml(&content)
    }

    /// Load from an explicit path, or from the default location if a file
    /// exists there, or fall back to defaults.
    pub fn load(path: Option<&Path>) -> Result<Self, OrchestratorError> {
        match path {
            Some(p) => Self::from_file(p),
            None => match default_config_path() {
                Some(p) if p.is_file() => {
                    tracing::info!("[Config] Loading {}", p.display());
                    Self::from_file(&p)
                }
                _ => Ok(Self::default()),
            },
        }
    }
}

/// `<config_dir>/zerotouch/config.yaml`
pub fn default_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|d| d.join("zerotouch").join("config.yaml"))
}

/// Resolve environment variable references in a string.
/// Supports `${ENV_VAR}` and `${ENV_VAR:-default}` syntax.
pub fn resolve_env_vars(input: &str) -> String {
    let re = match regex::Regex::new(r"\$\{([^}]+)\}") {
        Ok(re) => re,
        Err(_) => return input.to_string(),
    };
    re.replace_all(input, |caps: &regex::Captures| {
        let var_expr = &caps[1];
        if let Some(idx) = var_expr.find(":-") {
            let var_name = &var_expr[..idx];
            let default_val = &var_expr[idx + 2..];
            std::env::var(var_name).unwrap_or_else(|_| default_val.to_string())
        } else {
            std::env::var(var_expr).unwrap_or_default()
        }
    })
    .to_string()
}
