use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use chrono::Utc;
use tokio::sync::{Mutex, RwLock};

use crate::error::OrchestratorError;
use crate::models::agent::AgentKind;
use crate::models::task::{TaskResult, TaskStatus};
use crate::models::workflow::{
    AgentPerformance, Workflow, WorkflowMetrics, WorkflowStatus, WorkflowSummary,
};

/// Owns every workflow record for the lifetime of the process.
///
/// The map lock is only held to find or insert an entry; mutations of one
/// workflow are serialized by that workflow's own lock, so unrelated
/// workflows never contend.
#[derive(Default)]
pub struct WorkflowStore {
    workflows: RwLock<HashMap<String, Arc<Mutex<Workflow>>>>,
}

impl WorkflowStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn create(&self, kind: &str, total_tasks: usize) -> Workflow {
        let mut workflows = self.workflows.write().await;
        let mut id = uuid::Uuid::new_v4().to_string();
        while workflows.contains_key(&id) {
            id = uuid::Uuid::new_v4().to_string();
        }
        let workflow = Workflow::new(id.clone(), kind.to_string(), total_tasks);
        workflows.insert(id, Arc::new(Mutex::new(workflow.clone())));
        tracing::info!(
            "[WorkflowStore] Created workflow {} ({}, {} task(s))",
            workflow.workflow_id,
            workflow.kind,
            total_tasks
        );
        workflow
    }

    /// Snapshot of a workflow.
    pub async fn get(&self, workflow_id: &str) -> Result<Workflow, OrchestratorError> {
        let entry = self.entry(workflow_id).await?;
        let workflow = entry.lock().await;
        Ok(workflow.clone())
    }

    /// `pending → running`.
    pub async fn mark_running(&self, workflow_id: &str) -> Result<Workflow, OrchestratorError> {
        let entry = self.entry(workflow_id).await?;
        let mut workflow = entry.lock().await;
        if workflow.status != WorkflowStatus::Pending {
            return Err(OrchestratorError::InvalidState(format!(
                "Workflow {} is {}, expected pending",
                workflow_id,
                workflow.status.as_str()
            )));
        }
        workflow.status = WorkflowStatus::Running;
        workflow.started_at = Some(Utc::now());
        tracing::info!("[WorkflowStore] Workflow {} is running", workflow_id);
        Ok(workflow.clone())
    }

    /// Append one result; rejected once the workflow is terminal.
    pub async fn append_result(
        &self,
        workflow_id: &str,
        result: TaskResult,
    ) -> Result<(), OrchestratorError> {
        let entry = self.entry(workflow_id).await?;
        let mut workflow = entry.lock().await;
        if workflow.status.is_terminal() {
            return Err(OrchestratorError::InvalidState(format!(
                "Workflow {} is already {}",
                workflow_id,
                workflow.status.as_str()
            )));
        }
        tracing::debug!(
            "[WorkflowStore] Workflow {}: recorded {} ({})",
            workflow_id,
            result.task_id,
            result.status.as_str()
        );
        workflow.results.push(result);
        workflow.current_step = workflow.results.len();
        Ok(())
    }

    /// `running → completed | failed`, exactly once.
    pub async fn finish(
        &self,
        workflow_id: &str,
        final_status: WorkflowStatus,
    ) -> Result<Workflow, OrchestratorError> {
        if !final_status.is_terminal() {
            return Err(OrchestratorError::Validation(format!(
                "{} is not a terminal status",
                final_status.as_str()
            )));
        }
        let entry = self.entry(workflow_id).await?;
        let mut workflow = entry.lock().await;
        if workflow.status != WorkflowStatus::Running {
            return Err(OrchestratorError::InvalidState(format!(
                "Workflow {} is {}, only running workflows can finish",
                workflow_id,
                workflow.status.as_str()
            )));
        }
        if workflow.results.len() != workflow.total_tasks {
            return Err(OrchestratorError::InvalidState(format!(
                "Workflow {} has {} of {} results",
                workflow_id,
                workflow.results.len(),
                workflow.total_tasks
            )));
        }
        workflow.status = final_status;
        workflow.completed_at = Some(Utc::now());
        tracing::info!(
            "[WorkflowStore] Workflow {} finished: {}",
            workflow_id,
            final_status.as_str()
        );
        Ok(workflow.clone())
    }

    /// Summaries ordered by creation time.
    pub async fn list(&self) -> Vec<WorkflowSummary> {
        let entries: Vec<_> = self.workflows.read().await.values().cloned().collect();
        let mut summaries = Vec::with_capacity(entries.len());
        for entry in entries {
            summaries.push(entry.lock().await.summary());
        }
        summaries.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        summaries
    }

    /// Evict a terminal workflow.
    pub async fn remove(&self, workflow_id: &str) -> Result<Workflow, OrchestratorError> {
        let mut workflows = self.workflows.write().await;
        let entry = workflows
            .get(workflow_id)
            .cloned()
            .ok_or_else(|| not_found(workflow_id))?;
        let workflow = entry.lock().await;
        if !workflow.status.is_terminal() {
            return Err(OrchestratorError::InvalidState(format!(
                "Workflow {} is {}, only finished workflows can be removed",
                workflow_id,
                workflow.status.as_str()
            )));
        }
        workflows.remove(workflow_id);
        tracing::info!("[WorkflowStore] Removed workflow {}", workflow_id);
        Ok(workflow.clone())
    }

    pub async fn metrics(&self) -> WorkflowMetrics {
        let entries: Vec<_> = self.workflows.read().await.values().cloned().collect();
        let mut m = WorkflowMetrics::default();
        let mut elapsed_total: u64 = 0;
        // kind -> (tasks, succeeded, elapsed ms, attempts)
        let mut per_kind: BTreeMap<AgentKind, (usize, usize, u64, u64)> =
            AgentKind::ALL.iter().map(|k| (*k, (0, 0, 0, 0))).collect();
        for entry in entries {
            let workflow = entry.lock().await;
            m.workflows_total += 1;
            match workflow.status {
                WorkflowStatus::Pending => m.workflows_pending += 1,
                WorkflowStatus::Running => m.workflows_running += 1,
                WorkflowStatus::Completed => m.workflows_completed += 1,
                WorkflowStatus::Failed => m.workflows_failed += 1,
            }
            for result in &workflow.results {
                m.tasks_total += 1;
                m.total_attempts += u64::from(result.attempts_made);
                elapsed_total += result.elapsed_ms;
                let kind = per_kind.entry(result.agent_kind).or_default();
                kind.0 += 1;
                kind.1 += usize::from(result.is_success());
                kind.2 += result.elapsed_ms;
                kind.3 += u64::from(result.attempts_made);
                match result.status {
                    TaskStatus::Succeeded => m.tasks_succeeded += 1,
                    TaskStatus::Failed => m.tasks_failed += 1,
                    TaskStatus::TimedOut => m.tasks_timed_out += 1,
                }
            }
        }
        if m.tasks_total > 0 {
            m.success_rate = m.tasks_succeeded as f64 / m.tasks_total as f64;
            m.mean_task_elapsed_ms = elapsed_total as f64 / m.tasks_total as f64;
        }
        m.agents = per_kind
            .into_iter()
            .map(|(kind, (tasks, succeeded, elapsed, attempts))| {
                if tasks == 0 {
                    return AgentPerformance::empty(kind);
                }
                let n = tasks as f64;
                AgentPerformance {
                    agent_kind: kind,
                    tasks_total: tasks,
                    tasks_succeeded: succeeded,
                    success_rate: succeeded as f64 / n,
                    mean_elapsed_ms: elapsed as f64 / n,
                    mean_attempts: attempts as f64 / n,
                }
            })
            .collect();
        m
    }

    async fn entry(&self, workflow_id: &str) -> Result<Arc<Mutex<Workflow>>, OrchestratorError> {
        self.workflows
            .read()
            .await
            .get(workflow_id)
            .cloned()
            .ok_or_else(|| not_found(workflow_id))
    }
}

fn not_found(workflow_id: &str) -> OrchestratorError {
    OrchestratorError::NotFound(format!("Workflow {} not found", workflow_id))
}
