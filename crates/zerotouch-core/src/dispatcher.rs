//! TaskDispatcher - runs one workflow's batch of agent tasks on a bounded
//! worker pool.
//!
//! Scheduling:
//!
//! ```text
//!   tasks ──► validate ──► priority queue (priority asc, then submission order)
//!                              │
//!              ┌───────────────┼───────────────┐
//!           worker 1        worker 2   …    worker N     (N = max_concurrency)
//!              └───────────────┼───────────────┘
//!                              ▼
//!                   collector (fills gaps) ──► results in completion order
//! ```
//!
//! Priority only decides which queued task a worker picks up next when it
//! frees; it does not serialize execution.
//!
//! Workers of every batch draw from one semaphore of `max_concurrency`
//! permits, so the bound holds across concurrently running workflows.

use std::collections::{HashSet, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{mpsc, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::agent_client::{RemoteAgentClient, CANCELLED};
use crate::config::OrchestratorConfig;
use crate::error::OrchestratorError;
use crate::models::task::{AgentTask, TaskResult, TaskStatus};

const WORKER_LOST: &str = "worker terminated before reporting a result";

pub struct TaskDispatcher {
    client: Arc<RemoteAgentClient>,
    max_concurrency: usize,
    /// Slots shared by every batch this dispatcher runs
    permits: Arc<Semaphore>,
    max_batch_size: usize,
    validate_parameters: bool,
}

impl TaskDispatcher {
    pub fn new(client: Arc<RemoteAgentClient>, config: &OrchestratorConfig) -> Self {
        let max_concurrency = config.max_concurrency.max(1);
        Self {
            client,
            max_concurrency,
            permits: Arc::new(Semaphore::new(max_concurrency)),
            max_batch_size: config.max_batch_size,
            validate_parameters: config.validate_parameters,
        }
    }

    pub fn client(&self) -> &Arc<RemoteAgentClient> {
        &self.client
    }

    /// Reject a batch before any remote call is made.
    pub fn validate(&self, tasks: &[AgentTask]) -> Result<(), OrchestratorError> {
        if tasks.is_empty() {
            return Err(OrchestratorError::Validation(
                "A workflow needs at least one task".to_string(),
            ));
        }
        if tasks.len() > self.max_batch_size {
            return Err(OrchestratorError::Validation(format!(
                "Batch of {} tasks exceeds the maximum of {}",
                tasks.len(),
                self.max_batch_size
            )));
        }

        let mut seen = HashSet::with_capacity(tasks.len());
        for task in tasks {
            if task.task_id.trim().is_empty() {
                return Err(OrchestratorError::Validation(
                    "Task id must not be empty".to_string(),
                ));
            }
            if !seen.insert(task.task_id.as_str()) {
                return Err(OrchestratorError::Validation(format!(
                    "Duplicate task id: {}",
                    task.task_id
                )));
            }
            if self.validate_parameters && !task.agent_kind.accepts_parameters(&task.parameters) {
                return Err(OrchestratorError::Validation(format!(
                    "Task {} ({}) needs one of the parameters: {}",
                    task.task_id,
                    task.agent_kind,
                    task.agent_kind.expected_parameters().join(", ")
                )));
            }
        }
        Ok(())
    }

    /// Run a batch and collect every result, in completion order.
    pub async fn dispatch(
        &self,
        workflow_id: &str,
        tasks: Vec<AgentTask>,
    ) -> Result<Vec<TaskResult>, OrchestratorError> {
        let mut rx = self.spawn(workflow_id, tasks, CancellationToken::new())?;
        let mut results = Vec::new();
        while let Some(result) = rx.recv().await {
            results.push(result);
        }
        Ok(results)
    }

    /// Start a batch in the background and stream its results.
    ///
    /// The receiver yields exactly one result per input task and closes
    /// afterwards. Once `cancel` fires, queued tasks are reported as
    /// cancelled without being started.
    pub fn spawn(
        &self,
        workflow_id: &str,
        tasks: Vec<AgentTask>,
        cancel: CancellationToken,
    ) -> Result<mpsc::UnboundedReceiver<TaskResult>, OrchestratorError> {
        self.validate(&tasks)?;

        let expected: Vec<AgentTask> = tasks.clone();
        let queue = Arc::new(Mutex::new(priority_order(tasks)));
        let workers = self.max_concurrency.min(expected.len());

        tracing::info!(
            "[Dispatcher] Workflow {}: dispatching {} task(s) on {} worker(s)",
            workflow_id,
            expected.len(),
            workers
        );

        let (worker_tx, mut worker_rx) = mpsc::unbounded_channel::<TaskResult>();
        for worker_id in 0..workers {
            let queue = queue.clone();
            let client = self.client.clone();
            let tx = worker_tx.clone();
            let cancel = cancel.clone();
            let permits = self.permits.clone();
            let workflow_id = workflow_id.to_string();
            tokio::spawn(async move {
                loop {
                    // Hold a slot before taking a task so the highest-priority
                    // task still queued is the one that gets it.
                    let permit = tokio::select! {
                        permit = permits.acquire() => permit.ok(),
                        _ = cancel.cancelled() => None,
                    };
                    let Some(task) = next_task(&queue) else {
                        break;
                    };
                    let result = match permit {
                        Some(_permit) if !cancel.is_cancelled() => {
                            tracing::debug!(
                                "[Dispatcher] Workflow {}: worker {} picked {} (priority {})",
                                workflow_id,
                                worker_id,
                                task.task_id,
                                task.priority
                            );
                            client.execute_with_cancel(&task, &cancel).await
                        }
                        _ => TaskResult::failed(&task, TaskStatus::Failed, CANCELLED, 0, 0),
                    };
                    if tx.send(result).is_err() {
                        break;
                    }
                }
            });
        }
        drop(worker_tx);

        // Forward results as they complete; anything a worker never reported
        // (e.g. it panicked) is reported as failed once all workers are gone.
        let (tx, rx) = mpsc::unbounded_channel();
        let workflow_id = workflow_id.to_string();
        tokio::spawn(async move {
            let mut reported = HashSet::with_capacity(expected.len());
            while let Some(result) = worker_rx.recv().await {
                reported.insert(result.task_id.clone());
                let _ = tx.send(result);
            }
            for task in expected.iter().filter(|t| !reported.contains(&t.task_id)) {
                tracing::error!(
                    "[Dispatcher] Workflow {}: task {} lost its worker",
                    workflow_id,
                    task.task_id
                );
                let _ = tx.send(TaskResult::failed(
                    task,
                    TaskStatus::Failed,
                    WORKER_LOST,
                    0,
                    0,
                ));
            }
            tracing::info!("[Dispatcher] Workflow {}: batch drained", workflow_id);
        });

        Ok(rx)
    }
}

/// Stable sort by priority; equal priorities keep submission order.
fn priority_order(mut tasks: Vec<AgentTask>) -> VecDeque<AgentTask> {
    tasks.sort_by_key(|t| t.priority);
    tasks.into()
}

fn next_task(queue: &Mutex<VecDeque<AgentTask>>) -> Option<AgentTask> {
    queue
        .lock()
        .unwrap_or_else(|poisoned| poisoned.into_inner())
        .pop_front()
}

/// Upper bound on how long a batch can take, used by callers that want to
/// wait with a deadline. Saturates at `u64::MAX` milliseconds.
pub fn worst_case_duration(tasks: &[AgentTask], config: &OrchestratorConfig) -> Duration {
    let total = tasks.iter().fold(0u64, |acc, t| {
        let retries = u64::from(t.max_retries);
        let attempts = retries.saturating_add(1);
        let per_task = attempts
            .saturating_mul(t.timeout_ms)
            .saturating_add(retries.saturating_mul(config.max_retry_delay_ms));
        acc.saturating_add(per_task)
    });
    Duration::from_millis(total)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agent_client::RetryPolicy;
    use crate::models::agent::AgentKind;
    use crate::rate_limiter::RateLimiter;
    use crate::remote::{RemoteAgent, RemoteError, RemoteRequest, RemoteResponse};
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// Records the order of calls and the peak number of concurrent calls.
    #[derive(Default)]
    struct Recording {
        order: Mutex<Vec<String>>,
        active: AtomicUsize,
        peak: AtomicUsize,
    }

    #[async_trait]
    impl RemoteAgent for Recording {
        async fn execute(&self, request: RemoteRequest) -> Result<RemoteResponse, RemoteError> {
            self.order.lock().unwrap().push(request.task_id.clone());
            let now = self.active.fetch_add(1, Ordering::SeqCst) + 1;
            self.peak.fetch_max(now, Ordering::SeqCst);
            tokio::time::sleep(Duration::from_millis(15)).await;
            self.active.fetch_sub(1, Ordering::SeqCst);
            if request.task_id.starts_with("fail") {
                Err(RemoteError::Status {
                    status: 500,
                    message: "boom".to_string(),
                })
            } else {
                Ok(RemoteResponse::success(Default::default()))
            }
        }
    }

    fn task(id: &str, priority: i32) -> AgentTask {
        AgentTask {
            agent_kind: AgentKind::Executor,
            task_id: id.to_string(),
            description: String::new(),
            parameters: Default::default(),
            priority,
            timeout_ms: 1_000,
            max_retries: 0,
        }
    }

    fn dispatcher(remote: Arc<Recording>, config: OrchestratorConfig) -> TaskDispatcher {
        let client = RemoteAgentClient::new(
            remote,
            Arc::new(RateLimiter::new(1_000, Duration::from_secs(60))),
            RetryPolicy::from_config(&config),
        );
        TaskDispatcher::new(Arc::new(client), &config)
    }

    fn config(max_concurrency: usize) -> OrchestratorConfig {
        OrchestratorConfig {
            max_concurrency,
            base_retry_delay_ms: 1,
            ..OrchestratorConfig::default()
        }
    }

    #[tokio::test]
    async fn test_one_result_per_task_even_with_failures() {
        let remote = Arc::new(Recording::default());
        let d = dispatcher(remote, config(3));
        let tasks = vec![task("a", 1), task("fail-b", 1), task("c", 2), task("fail-d", 3)];
        let results = d.dispatch("wf", tasks).await.unwrap();
        assert_eq!(results.len(), 4);
        let mut ids: Vec<_> = results.iter().map(|r| r.task_id.as_str()).collect();
        ids.sort();
        assert_eq!(ids, vec!["a", "c", "fail-b", "fail-d"]);
        assert_eq!(results.iter().filter(|r| r.is_success()).count(), 2);
    }

    #[tokio::test]
    async fn test_duplicate_ids_rejected_before_any_call() {
        let remote = Arc::new(Recording::default());
        let d = dispatcher(remote.clone(), config(2));
        let err = d
            .dispatch("wf", vec![task("a", 1), task("b", 1), task("a", 2)])
            .await
            .unwrap_err();
        assert!(matches!(err, OrchestratorError::Validation(_)));
        assert!(remote.order.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_oversized_batch_rejected() {
        let remote = Arc::new(Recording::default());
        let d = dispatcher(
            remote.clone(),
            OrchestratorConfig {
                max_batch_size: 2,
                ..config(2)
            },
        );
        let err = d
            .dispatch("wf", vec![task("a", 1), task("b", 1), task("c", 1)])
            .await
            .unwrap_err();
        assert!(err.to_string().contains("exceeds the maximum of 2"));
        assert!(remote.order.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_single_worker_follows_priority_then_submission_order() {
        let remote = Arc::new(Recording::default());
        let d = dispatcher(remote.clone(), config(1));
        let tasks = vec![task("low", 5), task("first", 1), task("mid", 3), task("second", 1)];
        let results = d.dispatch("wf", tasks).await.unwrap();
        let order = remote.order.lock().unwrap().clone();
        assert_eq!(order, vec!["first", "second", "mid", "low"]);
        let completed: Vec<_> = results.iter().map(|r| r.task_id.clone()).collect();
        assert_eq!(completed, order);
    }

    #[tokio::test]
    async fn test_concurrency_is_bounded() {
        let remote = Arc::new(Recording::default());
        let d = dispatcher(remote.clone(), config(2));
        let tasks = (0..6).map(|i| task(&format!("t{}", i), i)).collect();
        let results = d.dispatch("wf", tasks).await.unwrap();
        assert_eq!(results.len(), 6);
        assert!(remote.peak.load(Ordering::SeqCst) <= 2);
        assert!(remote.peak.load(Ordering::SeqCst) >= 1);
    }

    #[tokio::test]
    async fn test_concurrency_bound_is_shared_across_batches() {
        let remote = Arc::new(Recording::default());
        let d = dispatcher(remote.clone(), config(2));
        let first = (0..4).map(|i| task(&format!("a{}", i), 1)).collect();
        let second = (0..4).map(|i| task(&format!("b{}", i), 1)).collect();
        let (a, b) = tokio::join!(d.dispatch("wf-a", first), d.dispatch("wf-b", second));
        assert_eq!(a.unwrap().len(), 4);
        assert_eq!(b.unwrap().len(), 4);
        assert!(remote.peak.load(Ordering::SeqCst) <= 2);
    }

    #[tokio::test]
    async fn test_cancel_reports_queued_tasks_as_cancelled() {
        let remote = Arc::new(Recording::default());
        let d = dispatcher(remote.clone(), config(1));
        let cancel = CancellationToken::new();
        cancel.cancel();
        let mut rx = d
            .spawn("wf", vec![task("a", 1), task("b", 2)], cancel)
            .unwrap();
        let mut results = Vec::new();
        while let Some(r) = rx.recv().await {
            results.push(r);
        }
        assert_eq!(results.len(), 2);
        assert!(results
            .iter()
            .all(|r| r.error_detail.as_deref() == Some(CANCELLED)));
        assert!(remote.order.lock().unwrap().is_empty());
    }

    #[test]
    fn test_parameter_validation_when_enabled() {
        let remote = Arc::new(Recording::default());
        let d = dispatcher(
            remote,
            OrchestratorConfig {
                validate_parameters: true,
                ..config(1)
            },
        );
        let bare = task("x", 1);
        assert!(d.validate(&[bare.clone()]).is_err());

        let mut with_plan = bare;
        with_plan
            .parameters
            .insert("routing_plan".to_string(), serde_json::json!({}));
        assert!(d.validate(&[with_plan]).is_ok());
    }

    #[test]
    fn test_worst_case_duration() {
        let config = OrchestratorConfig {
            max_retry_delay_ms: 100,
            ..OrchestratorConfig::default()
        };
        let mut t = task("a", 1);
        t.max_retries = 2;
        // 3 attempts of 1s plus 2 capped backoffs, twice
        assert_eq!(
            worst_case_duration(&[t.clone(), task("b", 1)], &config),
            Duration::from_millis(3 * 1_000 + 2 * 100 + 1_000)
        );
    }

    #[test]
    fn test_worst_case_duration_saturates_on_huge_timeouts() {
        let mut huge = task("a", 1);
        huge.timeout_ms = u64::MAX / 2;
        huge.max_retries = 3;
        let tasks = vec![huge.clone(), AgentTask { task_id: "b".to_string(), ..huge }];
        assert_eq!(
            worst_case_duration(&tasks, &OrchestratorConfig::default()),
            Duration::from_millis(u64::MAX)
        );
    }
}
