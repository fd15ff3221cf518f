// Job phase state machine

use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};

/// Orchestration phases in their only legal order
///
/// A path may skip phases (backup never pulls, restore never pushes) but
/// never moves backwards.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobPhase {
    Init,
    CredentialsReady,
    ArchivePulled,
    TargetReady,
    OperationStarted,
    Polling,
    HealthGating,
    ArchivePushed,
    Succeeded,
    Failed,
    Cancelled,
}

impl JobPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobPhase::Succeeded | JobPhase::Failed | JobPhase::Cancelled
        )
    }
}

impl std::fmt::Display for JobPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            JobPhase::Init => "INIT",
            JobPhase::CredentialsReady => "CREDENTIALS_READY",
            JobPhase::ArchivePulled => "ARCHIVE_PULLED",
            JobPhase::TargetReady => "TARGET_READY",
            JobPhase::OperationStarted => "OPERATION_STARTED",
            JobPhase::Polling => "POLLING",
            JobPhase::HealthGating => "HEALTH_GATING",
            JobPhase::ArchivePushed => "ARCHIVE_PUSHED",
            JobPhase::Succeeded => "SUCCEEDED",
            JobPhase::Failed => "FAILED",
            JobPhase::Cancelled => "CANCELLED",
        };
        write!(f, "{}", name)
    }
}

/// Tracks the current phase of one run; holds the latest value only
#[derive(Debug, Clone)]
pub struct PhaseTracker {
    current: JobPhase,
    /// Last non-terminal phase reached, kept for failure reports
    last_active: JobPhase,
}

impl Default for PhaseTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl PhaseTracker {
    pub fn new() -> Self {
        Self {
            current: JobPhase::Init,
            last_active: JobPhase::Init,
        }
    }

    pub fn current(&self) -> JobPhase {
        self.current
    }

    pub fn last_active(&self) -> JobPhase {
        self.last_active
    }

    /// Move strictly forward
    pub fn advance(&mut self, next: JobPhase) -> Result<()> {
        if self.current.is_terminal() || next <= self.current {
            return Err(DomainError::InvalidPhaseTransition {
                from: self.current.to_string(),
                to: next.to_string(),
            });
        }
        self.current = next;
        if !next.is_terminal() {
            self.last_active = next;
        }
        Ok(())
    }

    /// Enter a terminal phase from wherever the run stopped
    pub fn finish(&mut self, terminal: JobPhase) {
        debug_assert!(terminal.is_terminal());
        if !self.current.is_terminal() {
            self.current = terminal;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_forward_with_skips() {
        let mut tracker = PhaseTracker::new();
        tracker.advance(JobPhase::CredentialsReady).unwrap();
        tracker.advance(JobPhase::OperationStarted).unwrap();
        tracker.advance(JobPhase::Polling).unwrap();
        tracker.advance(JobPhase::ArchivePushed).unwrap();
        tracker.advance(JobPhase::Succeeded).unwrap();
        assert_eq!(tracker.current(), JobPhase::Succeeded);
        assert_eq!(tracker.last_active(), JobPhase::ArchivePushed);
    }

    #[test]
    fn test_never_reenters_target_ready() {
        let mut tracker = PhaseTracker::new();
        tracker.advance(JobPhase::CredentialsReady).unwrap();
        tracker.advance(JobPhase::TargetReady).unwrap();
        tracker.advance(JobPhase::OperationStarted).unwrap();

        let err = tracker.advance(JobPhase::TargetReady).unwrap_err();
        assert!(err.to_string().contains("OPERATION_STARTED -> TARGET_READY"));
        assert!(tracker.advance(JobPhase::CredentialsReady).is_err());
    }

    #[test]
    fn test_terminal_is_final() {
        let mut tracker = PhaseTracker::new();
        tracker.advance(JobPhase::CredentialsReady).unwrap();
        tracker.finish(JobPhase::Failed);
        tracker.finish(JobPhase::Succeeded);
        assert_eq!(tracker.current(), JobPhase::Failed);
        assert_eq!(tracker.last_active(), JobPhase::CredentialsReady);
        assert!(tracker.advance(JobPhase::Cancelled).is_err());
    }
}
