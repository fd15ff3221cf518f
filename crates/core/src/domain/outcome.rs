// Job outcome and run report

use super::job::{EngineKind, Process, SnapshotId};
use super::phase::JobPhase;
use crate::error::{AppError, ErrorKind};
use serde::{Deserialize, Serialize};

/// Terminal result of one orchestrator run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum JobOutcome {
    Succeeded,
    Failed { kind: ErrorKind, reason: String },
    /// External cancellation; not an error. Engine-side work already started is not reversed.
    Cancelled,
}

impl JobOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, JobOutcome::Succeeded)
    }
}

impl From<AppError> for JobOutcome {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Cancelled => JobOutcome::Cancelled,
            other => JobOutcome::Failed {
                kind: other.kind(),
                reason: other.to_string(),
            },
        }
    }
}

/// Summary returned to the submission surface
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobReport {
    pub run_id: String,
    pub process: Process,
    pub engine: EngineKind,
    pub snapshot_id: SnapshotId,
    pub outcome: JobOutcome,
    /// Last non-terminal phase the run reached
    pub last_phase: JobPhase,
    /// Logical units backed up or restored (empty when the run stopped before the manifest)
    pub units: Vec<String>,
    pub started_at: i64,  // epoch ms
    pub finished_at: i64, // epoch ms
}

impl JobReport {
    pub fn duration_ms(&self) -> i64 {
        self.finished_at - self.started_at
    }
}
