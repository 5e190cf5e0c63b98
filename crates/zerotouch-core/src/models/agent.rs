use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::OrchestratorError;

/// The fixed set of agent roles a task can be addressed to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum AgentKind {
    Sentinel,
    Simulator,
    Negotiator,
    Executor,
    Audit,
}

impl AgentKind {
    pub const ALL: [AgentKind; 5] = [
        AgentKind::Sentinel,
        AgentKind::Simulator,
        AgentKind::Negotiator,
        AgentKind::Executor,
        AgentKind::Audit,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sentinel => "sentinel",
            Self::Simulator => "simulator",
            Self::Negotiator => "negotiator",
            Self::Executor => "executor",
            Self::Audit => "audit",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "sentinel" => Some(Self::Sentinel),
            "simulator" => Some(Self::Simulator),
            "negotiator" => Some(Self::Negotiator),
            "executor" => Some(Self::Executor),
            "audit" => Some(Self::Audit),
            _ => None,
        }
    }

    /// Parameter keys of which at least one must be present for this kind.
    pub fn expected_parameters(&self) -> &'static [&'static str] {
        match self {
            Self::Sentinel => &["port_data", "analysis_type"],
            Self::Simulator => &["containers", "optimization_method"],
            Self::Negotiator => &["carrier", "requirements"],
            Self::Executor => &["routing_plan", "execution_mode"],
            Self::Audit => &["operations", "audit_level"],
        }
    }

    pub fn accepts_parameters(&self, parameters: &serde_json::Map<String, serde_json::Value>) -> bool {
        self.expected_parameters()
            .iter()
            .any(|key| parameters.contains_key(*key))
    }
}

impl std::fmt::Display for AgentKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for AgentKind {
    type Err = OrchestratorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        AgentKind::from_str(s)
            .ok_or_else(|| OrchestratorError::Validation(format!("Unknown agent kind: {}", s)))
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum AgentStatus {
    Idle,
    Processing,
    Success,
    Error,
    Waiting,
}

impl AgentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Processing => "processing",
            Self::Success => "success",
            Self::Error => "error",
            Self::Waiting => "waiting",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "idle" => Some(Self::Idle),
            "processing" => Some(Self::Processing),
            "success" => Some(Self::Success),
            "error" => Some(Self::Error),
            "waiting" => Some(Self::Waiting),
            _ => None,
        }
    }
}

/// Last known state of one agent role.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AgentState {
    pub kind: AgentKind,
    pub status: AgentStatus,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}

impl AgentState {
    pub fn idle(kind: AgentKind) -> Self {
        Self {
            kind,
            status: AgentStatus::Idle,
            confidence: 0.0,
            last_update: None,
        }
    }
}
