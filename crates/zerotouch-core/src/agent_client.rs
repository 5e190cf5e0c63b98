//! RemoteAgentClient - runs one agent task against the remote service with
//! rate limiting, per-attempt timeouts and exponential backoff.
//!
//! `execute` never fails: every outcome, including cancellation and local
//! rate limiting, is folded into the returned [`TaskResult`].

use std::sync::Arc;
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;

use crate::config::OrchestratorConfig;
use crate::models::task::{AgentTask, TaskResult, TaskStatus};
use crate::rate_limiter::RateLimiter;
use crate::remote::{RemoteAgent, RemoteError, RemoteRequest, RemoteStatus};

pub const RATE_LIMITED: &str = "rate limited";
pub const CANCELLED: &str = "cancelled";

/// Backoff schedule between attempts.
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub backoff_factor: f64,
}

impl RetryPolicy {
    pub fn from_config(config: &OrchestratorConfig) -> Self {
        Self {
            base_delay: Duration::from_millis(config.base_retry_delay_ms),
            max_delay: Duration::from_millis(config.max_retry_delay_ms),
            backoff_factor: config.backoff_factor,
        }
    }

    /// Delay before the next attempt, given how many attempts have failed
    /// before the one that just failed: `base * factor^prior_failures`.
    pub fn delay_for(&self, prior_failures: u32) -> Duration {
        let exponent = i32::try_from(prior_failures).unwrap_or(i32::MAX);
        let millis = self.base_delay.as_millis() as f64 * self.backoff_factor.powi(exponent);
        let capped = millis.min(self.max_delay.as_millis() as f64);
        if capped.is_finite() && capped > 0.0 {
            Duration::from_millis(capped as u64)
        } else if capped.is_finite() {
            Duration::ZERO
        } else {
            self.max_delay
        }
    }
}

/// Why the most recent attempt failed.
enum AttemptFailure {
    TimedOut,
    Remote(String),
}

pub struct RemoteAgentClient {
    remote: Arc<dyn RemoteAgent>,
    limiter: Arc<RateLimiter>,
    policy: RetryPolicy,
}

impl RemoteAgentClient {
    pub fn new(remote: Arc<dyn RemoteAgent>, limiter: Arc<RateLimiter>, policy: RetryPolicy) -> Self {
        Self {
            remote,
            limiter,
            policy,
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn remote(&self) -> &Arc<dyn RemoteAgent> {
        &self.remote
    }

    /// Run a task to completion without an external cancellation signal.
    pub async fn execute(&self, task: &AgentTask) -> TaskResult {
        self.execute_with_cancel(task, &CancellationToken::new()).await
    }

    /// Run a task; `cancel` stops further attempts and aborts any in-flight one.
    pub async fn execute_with_cancel(&self, task: &AgentTask, cancel: &CancellationToken) -> TaskResult {
        let started = Instant::now();
        let elapsed_ms = || started.elapsed().as_millis() as u64;
        let request = RemoteRequest::from(task);
        let deadline = Duration::from_millis(task.timeout_ms);
        let mut attempts: u32 = 0;

        loop {
            if cancel.is_cancelled() {
                return TaskResult::failed(task, TaskStatus::Failed, CANCELLED, attempts, elapsed_ms());
            }

            // Every attempt, retries included, needs its own admission.
            if !self.limiter.try_acquire() {
                tracing::warn!(
                    "[AgentClient] Task {} denied by rate limiter after {} attempt(s)",
                    task.task_id,
                    attempts
                );
                return TaskResult::failed(task, TaskStatus::Failed, RATE_LIMITED, attempts, elapsed_ms());
            }

            attempts += 1;
            tracing::debug!(
                "[AgentClient] Task {} ({}) attempt {}/{}",
                task.task_id,
                task.agent_kind,
                attempts,
                task.max_retries + 1
            );

            let outcome = tokio::select! {
                _ = cancel.cancelled() => {
                    return TaskResult::failed(task, TaskStatus::Failed, CANCELLED, attempts, elapsed_ms());
                }
                outcome = tokio::time::timeout(deadline, self.remote.execute(request.clone())) => outcome,
            };

            let failure = match outcome {
                Ok(Ok(response)) if response.status == RemoteStatus::Success => {
                    tracing::info!(
                        "[AgentClient] Task {} succeeded after {} attempt(s)",
                        task.task_id,
                        attempts
                    );
                    return TaskResult::succeeded(
                        task,
                        response.result_payload.unwrap_or_default(),
                        attempts,
                        elapsed_ms(),
                    );
                }
                Ok(Ok(response)) => AttemptFailure::Remote(
                    response
                        .error_message
                        .unwrap_or_else(|| "remote reported failure".to_string()),
                ),
                Ok(Err(RemoteError::TooManyRequests)) => {
                    tracing::warn!("[AgentClient] Remote rate limited task {}", task.task_id);
                    AttemptFailure::Remote(RemoteError::TooManyRequests.to_string())
                }
                Ok(Err(e)) => AttemptFailure::Remote(e.to_string()),
                Err(_) => AttemptFailure::TimedOut,
            };

            if attempts > task.max_retries {
                let (status, detail) = match failure {
                    AttemptFailure::TimedOut => (
                        TaskStatus::TimedOut,
                        format!("timed out after {} ms", task.timeout_ms),
                    ),
                    AttemptFailure::Remote(msg) => (TaskStatus::Failed, msg),
                };
                tracing::error!(
                    "[AgentClient] Task {} exhausted {} attempt(s): {}",
                    task.task_id,
                    attempts,
                    detail
                );
                return TaskResult::failed(task, status, detail, attempts, elapsed_ms());
            }

            let delay = self.policy.delay_for(attempts - 1);
            tracing::warn!(
                "[AgentClient] Task {} attempt {} failed ({}), retrying in {:?}",
                task.task_id,
                attempts,
                match &failure {
                    AttemptFailure::TimedOut => "timeout",
                    AttemptFailure::Remote(msg) => msg.as_str(),
                },
                delay
            );

            tokio::select! {
                _ = cancel.cancelled() => {
                    return TaskResult::failed(task, TaskStatus::Failed, CANCELLED, attempts, elapsed_ms());
                }
                _ = tokio::time::sleep(delay) => {}
            }
        }
    }
}
