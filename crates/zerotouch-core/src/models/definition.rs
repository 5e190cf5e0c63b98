//! YAML workflow definitions.
//!
//! A definition file names the workflow kind and lists its agent tasks:
//!
//! ```yaml
//! kind: "port_strike_response"
//! description: "Detect, simulate and reroute"
//!
//! tasks:
//!   - agent_kind: sentinel
//!     task_id: detect
//!     description: "Analyze port data for crisis indicators"
//!     priority: 1
//!     parameters:
//!       analysis_type: crisis_detection
//!
//!   - agent_kind: simulator
//!     task_id: reroute
//!     priority: 2
//!     max_retries: 2
//!     parameters:
//!       optimization_method: monte_carlo
//! ```

use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;
use crate::models::task::AgentTaskInput;

/// Top-level workflow definition loaded from YAML or JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowDefinition {
    /// Caller-supplied label for the workflow
    pub kind: String,

    /// Optional description
    #[serde(default)]
    pub description: Option<String>,

    /// Tasks to dispatch, in submission order
    pub tasks: Vec<AgentTaskInput>,
}

impl WorkflowDefinition {
    /// Parse a workflow definition from a YAML string.
    pub fn from_yaml(yaml: &str) -> Result<Self, OrchestratorError> {
        serde_yaml::from_str(yaml).map_err(|e| {
            OrchestratorError::Validation(format!("Failed to parse workflow YAML: {}", e))
        })
    }

    /// Load a workflow definition from a file path.
    pub fn from_file(path: &str) -> Result<Self, OrchestratorError> {
        let content = std::fs::read_to_string(path).map_err(|e| {
            OrchestratorError::Validation(format!("Failed to read workflow file '{}': {}", path, e))
        })?;
        Self::from_yaml(&content)
    }
}
