// Adapter result and engine status vocabulary

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Outcome of every adapter start-operation call
///
/// Adapters produce this explicitly; the orchestrator never infers it from
/// raw engine response shape.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "result", content = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OperationResult {
    Accepted,
    AlreadyInProgress,
    Rejected(String),
    EngineUnreachable(String),
}

impl OperationResult {
    /// Accepted or AlreadyInProgress: an operation is running on the engine
    pub fn is_started(&self) -> bool {
        matches!(
            self,
            OperationResult::Accepted | OperationResult::AlreadyInProgress
        )
    }
}

/// Cluster health as reported by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

impl std::fmt::Display for HealthStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HealthStatus::Healthy => write!(f, "HEALTHY"),
            HealthStatus::Degraded => write!(f, "DEGRADED"),
            HealthStatus::Unhealthy => write!(f, "UNHEALTHY"),
        }
    }
}

/// Minimum health a gate waits for
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HealthRequirement {
    /// Healthy or Degraded: the engine accepts requests
    Serving,
    /// Fully Healthy
    Healthy,
}

impl HealthRequirement {
    pub fn is_met_by(&self, status: HealthStatus) -> bool {
        match self {
            HealthRequirement::Serving => status != HealthStatus::Unhealthy,
            HealthRequirement::Healthy => status == HealthStatus::Healthy,
        }
    }
}

/// Progress of a snapshot/dump (or its restore)
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "state", content = "reason", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SnapshotStatus {
    InProgress,
    Succeeded,
    Failed(String),
}

impl SnapshotStatus {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, SnapshotStatus::InProgress)
    }
}

/// A status probe could not reach the engine; transient inside a poll loop
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("engine unreachable: {0}")]
pub struct Unreachable(pub String);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_health_requirement() {
        assert!(HealthRequirement::Serving.is_met_by(HealthStatus::Degraded));
        assert!(!HealthRequirement::Serving.is_met_by(HealthStatus::Unhealthy));
        assert!(HealthRequirement::Healthy.is_met_by(HealthStatus::Healthy));
        assert!(!HealthRequirement::Healthy.is_met_by(HealthStatus::Degraded));
    }

    #[test]
    fn test_operation_result_serializes_tagged() {
        let json = serde_json::to_value(OperationResult::Rejected("repo missing".into())).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"result": "REJECTED", "reason": "repo missing"})
        );
        assert!(OperationResult::AlreadyInProgress.is_started());
        assert!(!OperationResult::EngineUnreachable("timeout".into()).is_started());
    }
}
