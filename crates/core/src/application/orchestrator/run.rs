// Per-run state: the job, its cancel token and the phase it has reached

use crate::application::poll::CancelToken;
use crate::domain::{Job, JobPhase, PhaseTracker};
use crate::error::{AppError, Result};
use tracing::info;

pub(super) struct Run<'a> {
    pub job: &'a Job,
    pub cancel: &'a CancelToken,
    pub phases: PhaseTracker,
    /// Units from the archive manifest, once known
    pub units: Vec<String>,
}

impl<'a> Run<'a> {
    pub fn new(job: &'a Job, cancel: &'a CancelToken) -> Self {
        Self {
            job,
            cancel,
            phases: PhaseTracker::new(),
            units: Vec::new(),
        }
    }

    pub fn advance(&mut self, next: JobPhase) -> Result<()> {
        self.phases.advance(next)?;
        info!(snapshot = %self.job.snapshot_id(), phase = %next, "Phase advanced");
        Ok(())
    }

    /// Stop before the next external call once cancellation is requested
    pub fn checkpoint(&self) -> Result<()> {
        if self.cancel.is_cancelled() {
            return Err(AppError::Cancelled);
        }
        Ok(())
    }

    /// Engine-side work may be running or done
    pub fn engine_work_started(&self) -> bool {
        self.phases.last_active() >= JobPhase::OperationStarted
    }
}
