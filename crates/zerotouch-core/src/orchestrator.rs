//! WorkflowOrchestrator - registers workflows and drives them to completion.
//!
//! `submit` validates a batch and registers a pending workflow without doing
//! any remote work. `run` flips the workflow to running and hands the batch to
//! the dispatcher in the background; every result is appended to the store as
//! it arrives and the workflow is finished once the batch has drained.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::agent_client::{RemoteAgentClient, RetryPolicy};
use crate::config::OrchestratorConfig;
use crate::dispatcher::TaskDispatcher;
use crate::error::OrchestratorError;
use crate::models::agent::{AgentKind, AgentState, AgentStatus};
use crate::models::task::{AgentTask, AgentTaskInput, TaskResult, TaskStatus};
use crate::models::workflow::{Workflow, WorkflowMetrics, WorkflowStatus, WorkflowSummary};
use crate::rate_limiter::RateLimiter;
use crate::remote::RemoteAgent;
use crate::store::{AgentStateStore, WorkflowStore};

/// Handle to a workflow running in the background; resolves to the final
/// snapshot.
pub type RunHandle = JoinHandle<Result<Workflow, OrchestratorError>>;

pub struct WorkflowOrchestrator {
    store: Arc<WorkflowStore>,
    agent_states: Arc<AgentStateStore>,
    dispatcher: Arc<TaskDispatcher>,
    config: OrchestratorConfig,
    /// Task batches of workflows that were submitted but not yet run
    pending: Mutex<HashMap<String, Vec<AgentTask>>>,
    /// Cancellation tokens of running workflows
    running: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl WorkflowOrchestrator {
    pub fn new(dispatcher: TaskDispatcher, config: OrchestratorConfig) -> Self {
        Self {
            store: Arc::new(WorkflowStore::new()),
            agent_states: Arc::new(AgentStateStore::new()),
            dispatcher: Arc::new(dispatcher),
            config,
            pending: Mutex::new(HashMap::new()),
            running: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Wire limiter, client and dispatcher from one config.
    pub fn from_config(
        config: &OrchestratorConfig,
        remote: Arc<dyn RemoteAgent>,
    ) -> Result<Self, OrchestratorError> {
        config.validate()?;
        let limiter = Arc::new(RateLimiter::from_config(config));
        let client = Arc::new(RemoteAgentClient::new(
            remote,
            limiter,
            RetryPolicy::from_config(config),
        ));
        let dispatcher = TaskDispatcher::new(client, config);
        Ok(Self::new(dispatcher, config.clone()))
    }

    pub fn config(&self) -> &OrchestratorConfig {
        &self.config
    }

    pub fn dispatcher(&self) -> &TaskDispatcher {
        &self.dispatcher
    }

    // ─── Lifecycle ──────────────────────────────────────────────────────

    /// Register a workflow. Nothing is sent to the remote service until
    /// [`run`](Self::run) is called.
    pub async fn submit(
        &self,
        kind: &str,
        inputs: Vec<AgentTaskInput>,
    ) -> Result<String, OrchestratorError> {
        let kind = kind.trim();
        if kind.is_empty() {
            return Err(OrchestratorError::Validation(
                "Workflow kind must not be empty".to_string(),
            ));
        }
        let tasks: Vec<AgentTask> = inputs
            .into_iter()
            .map(|input| input.into_task(&self.config))
            .collect();
        self.dispatcher.validate(&tasks)?;

        let workflow = self.store.create(kind, tasks.len()).await;
        self.pending
            .lock()
            .await
            .insert(workflow.workflow_id.clone(), tasks);
        Ok(workflow.workflow_id)
    }

    /// Start a pending workflow in the background.
    ///
    /// Refused with `RateLimited` while the limiter window is full; the
    /// workflow then stays pending and may be run again later.
    pub async fn run(&self, workflow_id: &str) -> Result<RunHandle, OrchestratorError> {
        let current = self.store.get(workflow_id).await?;
        if current.status != WorkflowStatus::Pending {
            return Err(OrchestratorError::InvalidState(format!(
                "Workflow {} is {}, only pending workflows can run",
                workflow_id,
                current.status.as_str()
            )));
        }
        let limiter = self.dispatcher.client().limiter();
        if limiter.in_flight_at(Instant::now()) >= limiter.quota() {
            return Err(OrchestratorError::RateLimited(format!(
                "{} requests already admitted within {:?}, retry later",
                limiter.quota(),
                limiter.window()
            )));
        }
        self.store.mark_running(workflow_id).await?;
        let tasks = self
            .pending
            .lock()
            .await
            .remove(workflow_id)
            .ok_or_else(|| {
                OrchestratorError::Internal(format!(
                    "Workflow {} has no queued tasks",
                    workflow_id
                ))
            })?;

        let kinds: BTreeSet<AgentKind> = tasks.iter().map(|t| t.agent_kind).collect();
        for kind in kinds {
            self.agent_states.mark_processing(kind).await;
        }

        let cancel = CancellationToken::new();
        self.running
            .lock()
            .await
            .insert(workflow_id.to_string(), cancel.clone());

        let rx = match self.dispatcher.spawn(workflow_id, tasks.clone(), cancel) {
            Ok(rx) => rx,
            Err(e) => {
                // Record the refusal against every task so the workflow still
                // reaches a terminal state.
                tracing::error!("[Orchestrator] Workflow {} could not start: {}", workflow_id, e);
                let (tx, rx) = mpsc::unbounded_channel();
                for task in &tasks {
                    let _ = tx.send(TaskResult::failed(
                        task,
                        TaskStatus::Failed,
                        e.to_string(),
                        0,
                        0,
                    ));
                }
                rx
            }
        };

        tracing::info!("[Orchestrator] Workflow {} started", workflow_id);
        let drive = Drive {
            workflow_id: workflow_id.to_string(),
            store: self.store.clone(),
            agent_states: self.agent_states.clone(),
            running: self.running.clone(),
        };
        Ok(tokio::spawn(drive.run(rx)))
    }

    pub async fn submit_and_run(
        &self,
        kind: &str,
        inputs: Vec<AgentTaskInput>,
    ) -> Result<(String, RunHandle), OrchestratorError> {
        let workflow_id = self.submit(kind, inputs).await?;
        let handle = self.run(&workflow_id).await?;
        Ok((workflow_id, handle))
    }

    /// Run one task as a workflow of its own and wait for it to finish.
    pub async fn execute_single(
        &self,
        input: AgentTaskInput,
    ) -> Result<Workflow, OrchestratorError> {
        let kind = format!("{}-direct", input.agent_kind);
        let (_, handle) = self.submit_and_run(&kind, vec![input]).await?;
        handle
            .await
            .map_err(|e| OrchestratorError::Internal(format!("Workflow task did not finish: {}", e)))?
    }

    /// Snapshot for polling.
    pub async fn status(&self, workflow_id: &str) -> Result<Workflow, OrchestratorError> {
        self.store.get(workflow_id).await
    }

    pub async fn list(&self) -> Vec<WorkflowSummary> {
        self.store.list().await
    }

    /// Stop a running workflow. Queued tasks and abandoned retries are
    /// recorded as cancelled; the workflow ends `failed`.
    pub async fn cancel(&self, workflow_id: &str) -> Result<(), OrchestratorError> {
        if let Some(token) = self.running.lock().await.get(workflow_id) {
            tracing::info!("[Orchestrator] Cancelling workflow {}", workflow_id);
            token.cancel();
            return Ok(());
        }
        let workflow = self.store.get(workflow_id).await?;
        Err(OrchestratorError::InvalidState(format!(
            "Workflow {} is {}, only running workflows can be cancelled",
            workflow_id,
            workflow.status.as_str()
        )))
    }

    /// Evict a finished workflow.
    pub async fn remove(&self, workflow_id: &str) -> Result<Workflow, OrchestratorError> {
        self.store.remove(workflow_id).await
    }

    pub async fn metrics(&self) -> WorkflowMetrics {
        self.store.metrics().await
    }

    // ─── Agent state ────────────────────────────────────────────────────

    pub async fn agent_states(&self) -> Vec<AgentState> {
        self.agent_states.all().await
    }

    pub async fn agent_state(&self, kind: AgentKind) -> AgentState {
        self.agent_states.get(kind).await
    }

    pub async fn update_agent_state(
        &self,
        kind: AgentKind,
        status: Option<AgentStatus>,
        confidence: Option<f64>,
    ) -> Result<AgentState, OrchestratorError> {
        self.agent_states.update(kind, status, confidence).await
    }

    /// Whether the remote agent service answers its health probe.
    pub async fn remote_healthy(&self) -> bool {
        self.dispatcher.client().remote().health().await
    }

    /// Like [`remote_healthy`](Self::remote_healthy), as an error.
    pub async fn ensure_remote(&self) -> Result<(), OrchestratorError> {
        if self.remote_healthy().await {
            Ok(())
        } else {
            Err(OrchestratorError::RemoteTransport(
                "Remote agent service is unreachable".to_string(),
            ))
        }
    }
}

/// Background half of [`WorkflowOrchestrator::run`].
struct Drive {
    workflow_id: String,
    store: Arc<WorkflowStore>,
    agent_states: Arc<AgentStateStore>,
    running: Arc<Mutex<HashMap<String, CancellationToken>>>,
}

impl Drive {
    async fn run(
        self,
        rx: mpsc::UnboundedReceiver<TaskResult>,
    ) -> Result<Workflow, OrchestratorError> {
        let outcome = self.drain(rx).await;
        // Only after `finish`, so a workflow that still reads `running` stays
        // cancellable.
        self.running.lock().await.remove(&self.workflow_id);
        outcome
    }

    async fn drain(
        &self,
        mut rx: mpsc::UnboundedReceiver<TaskResult>,
    ) -> Result<Workflow, OrchestratorError> {
        let mut all_succeeded = true;
        while let Some(result) = rx.recv().await {
            all_succeeded &= result.is_success();
            if !result.is_success() {
                tracing::warn!(
                    "[Orchestrator] Workflow {}: task {} {} ({})",
                    self.workflow_id,
                    result.task_id,
                    result.status.as_str(),
                    result.error_detail.as_deref().unwrap_or("no detail")
                );
            }
            self.agent_states.record_result(&result).await;
            self.store.append_result(&self.workflow_id, result).await?;
        }

        let final_status = if all_succeeded {
            WorkflowStatus::Completed
        } else {
            WorkflowStatus::Failed
        };
        self.store.finish(&self.workflow_id, final_status).await
    }
}
