use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::agent::AgentKind;
use crate::models::task::TaskResult;

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl WorkflowStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Running => "running",
            Self::Completed => "completed",
            Self::Failed => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// Lifecycle record of one submitted batch of agent tasks.
///
/// `results` is in completion order, not submission order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Workflow {
    pub workflow_id: String,
    pub kind: String,
    pub status: WorkflowStatus,
    pub total_tasks: usize,
    pub current_step: usize,
    pub results: Vec<TaskResult>,
    pub created_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

impl Workflow {
    pub fn new(workflow_id: String, kind: String, total_tasks: usize) -> Self {
        Self {
            workflow_id,
            kind,
            status: WorkflowStatus::Pending,
            total_tasks,
            current_step: 0,
            results: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    pub fn summary(&self) -> WorkflowSummary {
        WorkflowSummary {
            workflow_id: self.workflow_id.clone(),
            kind: self.kind.clone(),
            status: self.status,
            created_at: self.created_at,
            current_step: self.current_step,
            total_tasks: self.total_tasks,
        }
    }
}

/// Listing entry for a workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowSummary {
    pub workflow_id: String,
    pub kind: String,
    pub status: WorkflowStatus,
    pub created_at: DateTime<Utc>,
    pub current_step: usize,
    pub total_tasks: usize,
}

/// Aggregates computed over every workflow in the store.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkflowMetrics {
    pub workflows_total: usize,
    pub workflows_pending: usize,
    pub workflows_running: usize,
    pub workflows_completed: usize,
    pub workflows_failed: usize,
    pub tasks_total: usize,
    pub tasks_succeeded: usize,
    pub tasks_failed: usize,
    pub tasks_timed_out: usize,
    pub total_attempts: u64,
    pub success_rate: f64,
    pub mean_task_elapsed_ms: f64,
    /// One entry per agent kind, including kinds with no results yet
    pub agents: Vec<AgentPerformance>,
}

/// Recorded results of one agent kind across every workflow.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentPerformance {
    pub agent_kind: AgentKind,
    pub tasks_total: usize,
    pub tasks_succeeded: usize,
    pub success_rate: f64,
    pub mean_elapsed_ms: f64,
    pub mean_attempts: f64,
}

impl AgentPerformance {
    pub fn empty(agent_kind: AgentKind) -> Self {
        Self {
            agent_kind,
            tasks_total: 0,
            tasks_succeeded: 0,
            success_rate: 0.0,
            mean_elapsed_ms: 0.0,
            mean_attempts: 0.0,
        }
    }
}
