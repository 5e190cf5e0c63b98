use serde::{Deserialize, Serialize};

use crate::config::OrchestratorConfig;
use crate::models::agent::AgentKind;

/// Opaque key/value mapping passed through to the remote agent.
pub type Parameters = serde_json::Map<String, serde_json::Value>;

/// One unit of work addressed to an agent role.
///
/// Built from an [`AgentTaskInput`] at submission time; never mutated afterwards.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentTask {
    pub agent_kind: AgentKind,
    pub task_id: String,
    pub description: String,
    pub parameters: Parameters,
    /// Lower value = scheduled earlier.
    pub priority: i32,
    pub timeout_ms: u64,
    pub max_retries: u32,
}

/// Caller-facing task definition. Omitted limits fall back to the
/// orchestrator configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentTaskInput {
    #[serde(alias = "agent_kind")]
    pub agent_kind: AgentKind,
    #[serde(alias = "task_id")]
    pub task_id: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub parameters: Parameters,
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default, alias = "timeout_ms")]
    pub timeout_ms: Option<u64>,
    #[serde(default, alias = "max_retries")]
    pub max_retries: Option<u32>,
}

fn default_priority() -> i32 {
    1
}

impl AgentTaskInput {
    pub fn new(agent_kind: AgentKind, task_id: impl Into<String>) -> Self {
        Self {
            agent_kind,
            task_id: task_id.into(),
            description: String::new(),
            parameters: Parameters::new(),
            priority: default_priority(),
            timeout_ms: None,
            max_retries: None,
        }
    }

    pub fn into_task(self, config: &OrchestratorConfig) -> AgentTask {
        AgentTask {
            agent_kind: self.agent_kind,
            task_id: self.task_id,
            description: self.description,
            parameters: self.parameters,
            priority: self.priority,
            timeout_ms: self.timeout_ms.unwrap_or(config.default_timeout_ms),
            max_retries: self.max_retries.unwrap_or(config.max_retries),
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "camelCase")]
pub enum TaskStatus {
    Succeeded,
    Failed,
    TimedOut,
}

impl TaskStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::Failed => "failed",
            Self::TimedOut => "timedOut",
        }
    }
}

/// Outcome of one [`AgentTask`].
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TaskResult {
    pub task_id: String,
    pub agent_kind: AgentKind,
    pub status: TaskStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub payload: Option<Parameters>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_detail: Option<String>,
    pub attempts_made: u32,
    pub elapsed_ms: u64,
}

impl TaskResult {
    pub fn succeeded(task: &AgentTask, payload: Parameters, attempts_made: u32, elapsed_ms: u64) -> Self {
        Self {
            task_id: task.task_id.clone(),
            agent_kind: task.agent_kind,
            status: TaskStatus::Succeeded,
            payload: Some(payload),
            error_detail: None,
            attempts_made,
            elapsed_ms,
        }
    }

    pub fn failed(
        task: &AgentTask,
        status: TaskStatus,
        error_detail: impl Into<String>,
        attempts_made: u32,
        elapsed_ms: u64,
    ) -> Self {
        Self {
            task_id: task.task_id.clone(),
            agent_kind: task.agent_kind,
            status,
            payload: None,
            error_detail: Some(error_detail.into()),
            attempts_made,
            elapsed_ms,
        }
    }

    pub fn is_success(&self) -> bool {
        self.status == TaskStatus::Succeeded
    }

    /// Numeric `confidence` reported by the remote agent, if any.
    pub fn confidence(&self) -> Option<f64> {
        self.payload
            .as_ref()
            .and_then(|p| p.get("confidence"))
            .and_then(|c| c.as_f64())
    }
}
