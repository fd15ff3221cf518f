//! Snapshot-capable variant (search engine)
//!
//! Backups go straight from the engine into an object-store repository; the
//! local archive only carries the index manifest. The manifest is staged once
//! the engine accepts the snapshot and published when the snapshot succeeds.
//! Hidden and system indices (leading `.`) are neither snapshotted nor closed.

use super::{probe_failure, start_failure};
use crate::domain::{
    EngineKind, HealthStatus, OperationResult, RepositoryTarget, SnapshotStatus, UnitManifest,
    Unreachable,
};
use crate::port::{
    ArchiveRef, BackendAdapter, ClientError, CompletionMode, Operation, SearchApi,
};
use async_trait::async_trait;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

/// Engine error types meaning "a snapshot by that name is already known"
const SNAPSHOT_CONFLICT_KINDS: &[&str] = &[
    "invalid_snapshot_name_exception",
    "concurrent_snapshot_execution_exception",
];

/// Engine error types meaning "a restore is already running"
const RESTORE_CONFLICT_KINDS: &[&str] = &["concurrent_snapshot_execution_exception"];

/// Index manifest waiting for the snapshot to finish
const PENDING_MANIFEST: &str = "units.txt.pending";

pub struct SnapshotAdapter {
    client: Arc<dyn SearchApi>,
    repository: String,
}

impl SnapshotAdapter {
    pub fn new(client: Arc<dyn SearchApi>, repository: impl Into<String>) -> Self {
        Self {
            client,
            repository: repository.into(),
        }
    }

    /// Engine snapshot vocabulary → SnapshotStatus
    fn map_snapshot_state(state: &str) -> SnapshotStatus {
        match state {
            "INIT" | "STARTED" | "IN_PROGRESS" => SnapshotStatus::InProgress,
            "SUCCESS" => SnapshotStatus::Succeeded,
            "FAILED" | "PARTIAL" | "ABORTED" | "INCOMPATIBLE" | "MISSING" => {
                SnapshotStatus::Failed(format!("snapshot state {}", state))
            }
            other => SnapshotStatus::Failed(format!("unrecognized snapshot state {}", other)),
        }
    }

    fn map_cluster_health(colour: &str) -> HealthStatus {
        match colour {
            "green" => HealthStatus::Healthy,
            "yellow" => HealthStatus::Degraded,
            "red" => HealthStatus::Unhealthy,
            other => {
                warn!(status = %other, "Unrecognized cluster health");
                HealthStatus::Unhealthy
            }
        }
    }

    /// Listed indices minus hidden and system ones
    async fn user_indices(&self) -> Result<Vec<String>, ClientError> {
        let indices = self.client.list_indices().await?;
        Ok(indices
            .into_iter()
            .filter(|index| !index.starts_with('.'))
            .collect())
    }

    async fn stage_manifest(dir: &Path, manifest: &UnitManifest) -> std::io::Result<()> {
        tokio::fs::write(dir.join(PENDING_MANIFEST), manifest.render()).await
    }

    /// Move the staged manifest into place; a repeat poll finds it already there
    async fn publish_manifest(dir: &Path) -> SnapshotStatus {
        let published = UnitManifest::path_in(dir);
        match tokio::fs::rename(dir.join(PENDING_MANIFEST), &published).await {
            Ok(()) => SnapshotStatus::Succeeded,
            Err(_) if tokio::fs::metadata(&published).await.is_ok() => SnapshotStatus::Succeeded,
            Err(e) => SnapshotStatus::Failed(format!("publish index manifest: {}", e)),
        }
    }

    fn is_conflict(err: &ClientError, kinds: &[&str]) -> bool {
        matches!(err, ClientError::Api { kind, .. } if kinds.contains(&kind.as_str()))
    }

    /// A name conflict is only AlreadyInProgress if that snapshot is still running
    async fn resolve_snapshot_conflict(&self, snapshot_id: &str, err: ClientError) -> OperationResult {
        match self.client.snapshot_state(&self.repository, snapshot_id).await {
            Ok(state) if !Self::map_snapshot_state(&state).is_terminal() => {
                info!(snapshot = %snapshot_id, state = %state, "Snapshot already in progress");
                OperationResult::AlreadyInProgress
            }
            Ok(state) => OperationResult::Rejected(format!(
                "snapshot {} already exists in state {}",
                snapshot_id, state
            )),
            Err(_) => start_failure("create snapshot", err),
        }
    }

    /// Close every open index; failures are logged and the restore goes ahead
    async fn close_open_indices(&self) {
        let open = match self.user_indices().await {
            Ok(indices) => indices,
            Err(e) => {
                warn!(error = %e, "Cannot list open indices before restore");
                return;
            }
        };

        let mut failed = 0usize;
        for index in &open {
            if let Err(e) = self.client.close_index(index).await {
                failed += 1;
                warn!(index = %index, error = %e, "Failed to close index");
            }
        }
        info!(open = open.len(), failed, "Closed indices before restore");
    }

    async fn restore_progress(
        &self,
        manifest: &UnitManifest,
    ) -> std::result::Result<SnapshotStatus, Unreachable> {
        if manifest.is_empty() {
            return Ok(SnapshotStatus::Succeeded);
        }
        let stages = match self.client.recovery_stages(manifest.units()).await {
            Ok(stages) => stages,
            Err(e) => return probe_failure(e, |e| SnapshotStatus::Failed(e.to_string())),
        };
        if stages.is_empty() {
            return Ok(SnapshotStatus::InProgress);
        }

        let mut done = true;
        for stage in &stages {
            match stage.as_str() {
                "DONE" => {}
                "INIT" | "INDEX" | "VERIFY_INDEX" | "TRANSLOG" | "FINALIZE" => done = false,
                other => {
                    return Ok(SnapshotStatus::Failed(format!(
                        "unrecognized recovery stage {}",
                        other
                    )))
                }
            }
        }
        Ok(if done {
            SnapshotStatus::Succeeded
        } else {
            SnapshotStatus::InProgress
        })
    }
}

#[async_trait]
impl BackendAdapter for SnapshotAdapter {
    fn engine(&self) -> EngineKind {
        EngineKind::Search
    }

    fn completion(&self) -> CompletionMode {
        CompletionMode::Polled
    }

    async fn setup_target(&self, target: &RepositoryTarget) -> OperationResult {
        match target {
            RepositoryTarget::ObjectStore { .. } => match self.client.put_repository(target).await {
                Ok(()) => {
                    info!(repository = %self.repository, "Snapshot repository registered");
                    OperationResult::Accepted
                }
                Err(e) => start_failure("register repository", e),
            },
            RepositoryTarget::Staging { dir } => OperationResult::Rejected(format!(
                "snapshot engine needs an object-store repository, got staging dir {}",
                dir.display()
            )),
        }
    }

    async fn start_backup(&self, archive: ArchiveRef<'_>) -> OperationResult {
        let indices = match self.user_indices().await {
            Ok(indices) => indices,
            Err(e) => return start_failure("list indices", e),
        };
        let manifest = match UnitManifest::new(indices) {
            Ok(m) => m,
            Err(e) => return OperationResult::Rejected(e.to_string()),
        };
        info!(snapshot = %archive.snapshot_id, indices = manifest.len(), "Starting snapshot");

        let result = match self
            .client
            .create_snapshot(&self.repository, archive.snapshot_id, manifest.units())
            .await
        {
            Ok(()) => OperationResult::Accepted,
            Err(e) if Self::is_conflict(&e, SNAPSHOT_CONFLICT_KINDS) => {
                self.resolve_snapshot_conflict(archive.snapshot_id, e).await
            }
            Err(e) => start_failure("create snapshot", e),
        };

        if matches!(
            result,
            OperationResult::Accepted | OperationResult::AlreadyInProgress
        ) {
            if let Err(e) = Self::stage_manifest(archive.dir, &manifest).await {
                return OperationResult::Rejected(format!("write index manifest: {}", e));
            }
        }
        result
    }

    async fn start_restore(
        &self,
        archive: ArchiveRef<'_>,
        manifest: &UnitManifest,
    ) -> OperationResult {
        self.close_open_indices().await;

        info!(snapshot = %archive.snapshot_id, indices = manifest.len(), "Starting snapshot restore");
        match self
            .client
            .restore_snapshot(&self.repository, archive.snapshot_id, manifest.units())
            .await
        {
            Ok(()) => OperationResult::Accepted,
            Err(e) if Self::is_conflict(&e, RESTORE_CONFLICT_KINDS) => {
                OperationResult::AlreadyInProgress
            }
            Err(e) => start_failure("restore snapshot", e),
        }
    }

    async fn check_health(&self) -> std::result::Result<HealthStatus, Unreachable> {
        match self.client.cluster_health().await {
            Ok(colour) => Ok(Self::map_cluster_health(&colour)),
            Err(e) => probe_failure(e, |e| {
                warn!(error = %e, "Cluster health check failed");
                HealthStatus::Unhealthy
            }),
        }
    }

    async fn check_snapshot_status(
        &self,
        operation: Operation<'_>,
    ) -> std::result::Result<SnapshotStatus, Unreachable> {
        match operation {
            Operation::Backup(archive) => {
                match self
                    .client
                    .snapshot_state(&self.repository, archive.snapshot_id)
                    .await
                {
                    Ok(state) => match Self::map_snapshot_state(&state) {
                        SnapshotStatus::Succeeded => Ok(Self::publish_manifest(archive.dir).await),
                        other => Ok(other),
                    },
                    Err(e) => probe_failure(e, |e| SnapshotStatus::Failed(e.to_string())),
                }
            }
            Operation::Restore(_, manifest) => self.restore_progress(manifest).await,
        }
    }
}
