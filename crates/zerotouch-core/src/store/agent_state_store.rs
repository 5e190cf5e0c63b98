use std::collections::BTreeMap;

use chrono::Utc;
use tokio::sync::RwLock;

use crate::error::OrchestratorError;
use crate::models::agent::{AgentKind, AgentState, AgentStatus};
use crate::models::task::TaskResult;

/// Last known status of each agent role, fed by task results and by
/// explicit status reports.
pub struct AgentStateStore {
    states: RwLock<BTreeMap<AgentKind, AgentState>>,
}

impl Default for AgentStateStore {
    fn default() -> Self {
        Self::new()
    }
}

impl AgentStateStore {
    pub fn new() -> Self {
        let states = AgentKind::ALL
            .iter()
            .map(|kind| (*kind, AgentState::idle(*kind)))
            .collect();
        Self {
            states: RwLock::new(states),
        }
    }

    /// Every role, in declaration order.
    pub async fn all(&self) -> Vec<AgentState> {
        self.states.read().await.values().cloned().collect()
    }

    pub async fn get(&self, kind: AgentKind) -> AgentState {
        self.states
            .read()
            .await
            .get(&kind)
            .cloned()
            .unwrap_or_else(|| AgentState::idle(kind))
    }

    pub async fn mark_processing(&self, kind: AgentKind) {
        let mut states = self.states.write().await;
        let state = states.entry(kind).or_insert_with(|| AgentState::idle(kind));
        state.status = AgentStatus::Processing;
        state.last_update = Some(Utc::now());
    }

    /// Fold a finished task into its role's state.
    pub async fn record_result(&self, result: &TaskResult) {
        let mut states = self.states.write().await;
        let kind = result.agent_kind;
        let state = states.entry(kind).or_insert_with(|| AgentState::idle(kind));
        if result.is_success() {
            state.status = AgentStatus::Success;
            if let Some(confidence) = result.confidence() {
                state.confidence = confidence.clamp(0.0, 1.0);
            }
        } else {
            state.status = AgentStatus::Error;
        }
        state.last_update = Some(Utc::now());
    }

    /// Explicit status report for one role.
    pub async fn update(
        &self,
        kind: AgentKind,
        status: Option<AgentStatus>,
        confidence: Option<f64>,
    ) -> Result<AgentState, OrchestratorError> {
        if let Some(c) = confidence {
            if !(0.0..=1.0).contains(&c) {
                return Err(OrchestratorError::Validation(format!(
                    "Confidence must be within 0.0..=1.0, got {}",
                    c
                )));
            }
        }

        let mut states = self.states.write().await;
        let state = states.entry(kind).or_insert_with(|| AgentState::idle(kind));
        if let Some(status) = status {
            state.status = status;
        }
        if let Some(c) = confidence {
            state.confidence = c;
        }
        state.last_update = Some(Utc::now());
        tracing::info!(
            "[AgentStateStore] {} is now {} (confidence {:.2})",
            kind,
            state.status.as_str(),
            state.confidence
        );
        Ok(state.clone())
    }
}
