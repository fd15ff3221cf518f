// Backup path: credentials, target, start + poll, push

use super::run::Run;
use super::{read_manifest, reset_dir, Orchestrator};
use crate::domain::{JobPhase, RepositoryTarget};
use crate::error::Result;
use crate::port::{ArchiveRef, Operation, TransferRequest};
use tracing::info;

impl Orchestrator {
    pub(super) async fn backup(&self, run: &mut Run<'_>) -> Result<()> {
        let job = run.job;
        let credentials = self.resolve_credentials(job).await?;
        run.advance(JobPhase::CredentialsReady)?;

        let adapter = self
            .adapters
            .build(job.engine(), job.host(), &credentials.engine)?;

        let dir = self.config.backup_dir(job.snapshot_id());
        reset_dir(&dir).await?;

        let target = self.target_for(job, &credentials.cloud, &dir);
        if let RepositoryTarget::ObjectStore { .. } = target {
            self.setup_target(run, adapter.as_ref(), &target).await?;
        }

        let archive = ArchiveRef {
            snapshot_id: job.snapshot_id(),
            dir: &dir,
        };
        self.start_operation(run, adapter.as_ref(), Operation::Backup(archive))
            .await?;

        let manifest = read_manifest(&dir).await?;
        run.units = manifest.units().to_vec();
        info!(units = manifest.len(), dir = %dir.display(), "Backup complete on engine");

        run.checkpoint()?;
        let request = TransferRequest::for_job(job, credentials.cloud);
        self.transfer.push(&dir, &request).await?;
        info!(remote = %request.remote_url(), "Archive pushed");
        run.advance(JobPhase::ArchivePushed)
    }
}
