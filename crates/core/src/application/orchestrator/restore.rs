// Restore path: credentials, pull, health gate, start + poll, health gate

use super::run::Run;
use super::{read_manifest, reset_dir, Orchestrator};
use crate::domain::{HealthRequirement, JobPhase, RepositoryTarget};
use crate::error::Result;
use crate::port::{ArchiveRef, Operation, TransferRequest};
use tracing::info;

impl Orchestrator {
    pub(super) async fn restore(&self, run: &mut Run<'_>) -> Result<()> {
        let job = run.job;
        let credentials = self.resolve_credentials(job).await?;
        run.advance(JobPhase::CredentialsReady)?;

        let adapter = self
            .adapters
            .build(job.engine(), job.host(), &credentials.engine)?;

        // Pull completes before any adapter call
        let dir = self.config.restore_dir(job.snapshot_id());
        reset_dir(&dir).await?;
        run.checkpoint()?;
        let request = TransferRequest::for_job(job, credentials.cloud.clone());
        self.transfer.pull(&request, &dir).await?;
        info!(remote = %request.remote_url(), dir = %dir.display(), "Archive pulled");
        run.advance(JobPhase::ArchivePulled)?;

        let manifest = read_manifest(&dir).await?;
        run.units = manifest.units().to_vec();

        run.checkpoint()?;
        self.wait_for_health(adapter.as_ref(), HealthRequirement::Serving, run.cancel)
            .await?;

        let target = self.target_for(job, &credentials.cloud, &dir);
        if let RepositoryTarget::ObjectStore { .. } = target {
            self.setup_target(run, adapter.as_ref(), &target).await?;
        }

        let archive = ArchiveRef {
            snapshot_id: job.snapshot_id(),
            dir: &dir,
        };
        self.start_operation(run, adapter.as_ref(), Operation::Restore(archive, &manifest))
            .await?;

        // Not complete while the engine is Degraded or Unhealthy
        run.advance(JobPhase::HealthGating)?;
        self.wait_for_health(adapter.as_ref(), HealthRequirement::Healthy, run.cancel)
            .await?;
        info!(units = manifest.len(), "Restore complete and engine healthy");
        Ok(())
    }
}
