// Streaming variant (relational engine)
// Dump and restore block until done; there is no engine-side status to poll

use super::{probe_failure, start_failure, verify_archive};
use crate::domain::{
    payload_dir, payload_name, EngineKind, HealthStatus, OperationResult, RepositoryTarget,
    SnapshotStatus, UnitManifest, Unreachable,
};
use crate::port::{
    ArchiveRef, BackendAdapter, CompletionMode, Operation, Readiness, RelationalApi,
};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

pub struct StreamingAdapter {
    client: Arc<dyn RelationalApi>,
}

impl StreamingAdapter {
    pub fn new(client: Arc<dyn RelationalApi>) -> Self {
        Self { client }
    }

    /// `<dir>/units/<encoded database>.dump`
    fn dump_file(dir: &Path, database: &str) -> PathBuf {
        payload_dir(dir).join(format!("{}.dump", payload_name(database)))
    }
}

#[async_trait]
impl BackendAdapter for StreamingAdapter {
    fn engine(&self) -> EngineKind {
        EngineKind::Relational
    }

    fn completion(&self) -> CompletionMode {
        CompletionMode::Blocking
    }

    async fn setup_target(&self, target: &RepositoryTarget) -> OperationResult {
        match target {
            RepositoryTarget::Staging { dir } => match tokio::fs::create_dir_all(dir).await {
                Ok(()) => OperationResult::Accepted,
                Err(e) => OperationResult::Rejected(format!(
                    "create staging dir {}: {}",
                    dir.display(),
                    e
                )),
            },
            RepositoryTarget::ObjectStore { .. } => OperationResult::Rejected(
                "relational dumps stream to a staging dir".to_string(),
            ),
        }
    }

    async fn start_backup(&self, archive: ArchiveRef<'_>) -> OperationResult {
        let databases = match self.client.list_databases().await {
            Ok(databases) => databases,
            Err(e) => return start_failure("list databases", e),
        };
        let manifest = match UnitManifest::new(databases) {
            Ok(m) => m,
            Err(e) => return OperationResult::Rejected(e.to_string()),
        };
        let payloads = payload_dir(archive.dir);
        if let Err(e) = tokio::fs::create_dir_all(&payloads).await {
            return OperationResult::Rejected(format!(
                "create dump dir {}: {}",
                payloads.display(),
                e
            ));
        }

        for database in manifest.units() {
            let dest = Self::dump_file(archive.dir, database);
            if let Err(e) = self.client.dump(database, &dest).await {
                warn!(snapshot = %archive.snapshot_id, database = %database, error = %e, "Dump failed");
                return start_failure(&format!("dump {}", database), e);
            }
            info!(snapshot = %archive.snapshot_id, database = %database, file = %dest.display(), "Database dumped");
        }

        match manifest.write_to(archive.dir).await {
            Ok(_) => OperationResult::Accepted,
            Err(e) => OperationResult::Rejected(format!("write database manifest: {}", e)),
        }
    }

    async fn start_restore(
        &self,
        archive: ArchiveRef<'_>,
        manifest: &UnitManifest,
    ) -> OperationResult {
        for database in manifest.units() {
            let src = Self::dump_file(archive.dir, database);
            if tokio::fs::metadata(&src).await.is_err() {
                return OperationResult::Rejected(format!(
                    "dump for {} missing at {}",
                    database,
                    src.display()
                ));
            }
            if let Err(e) = self.client.restore(database, &src).await {
                warn!(snapshot = %archive.snapshot_id, database = %database, error = %e, "Restore failed");
                return start_failure(&format!("restore {}", database), e);
            }
            info!(snapshot = %archive.snapshot_id, database = %database, "Database restored");
        }
        OperationResult::Accepted
    }

    async fn check_health(&self) -> std::result::Result<HealthStatus, Unreachable> {
        match self.client.readiness().await {
            Ok(Readiness::Accepting) => Ok(HealthStatus::Healthy),
            Ok(Readiness::Rejecting) => Ok(HealthStatus::Degraded),
            Err(e) => probe_failure(e, |_| HealthStatus::Unhealthy),
        }
    }

    /// Archive check only; a blocking restore that returned Accepted is done
    async fn check_snapshot_status(
        &self,
        operation: Operation<'_>,
    ) -> std::result::Result<SnapshotStatus, Unreachable> {
        let archive = match operation {
            Operation::Backup(archive) | Operation::Restore(archive, _) => archive,
        };
        Ok(verify_archive(archive.dir, Self::dump_file).await)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::port::engine_client::mocks::MockRelationalApi;
    use crate::port::ClientError;

    #[tokio::test]
    async fn test_backup_writes_dump_per_database() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(MockRelationalApi::default());
        *api.databases.lock().unwrap() = vec!["app".into(), "billing".into()];
        let adapter = StreamingAdapter::new(api.clone());
        let archive = ArchiveRef {
            snapshot_id: "nightly",
            dir: dir.path(),
        };

        assert_eq!(adapter.completion(), CompletionMode::Blocking);
        assert_eq!(adapter.start_backup(archive).await, OperationResult::Accepted);
        assert_eq!(*api.dump_calls.lock().unwrap(), 2);
        assert!(dir.path().join("units/app.dump").exists());
        assert!(dir.path().join("units/billing.dump").exists());
        assert_eq!(
            adapter.check_snapshot_status(Operation::Backup(archive)).await,
            Ok(SnapshotStatus::Succeeded)
        );
    }

    #[tokio::test]
    async fn test_unreachable_dump_is_distinct_from_rejection() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(MockRelationalApi::default());
        api.dump_results
            .lock()
            .unwrap()
            .push(Err(ClientError::Unreachable("connection refused".into())));
        api.dump_results
            .lock()
            .unwrap()
            .push(Err(ClientError::api(None, "pg_dump", "permission denied")));
        let adapter = StreamingAdapter::new(api.clone());
        let archive = ArchiveRef {
            snapshot_id: "nightly",
            dir: dir.path(),
        };

        assert_eq!(
            adapter.start_backup(archive).await,
            OperationResult::EngineUnreachable("connection refused".into())
        );
        assert!(matches!(
            adapter.start_backup(archive).await,
            OperationResult::Rejected(reason) if reason.contains("permission denied")
        ));
        assert!(!UnitManifest::path_in(dir.path()).exists());
    }

    #[tokio::test]
    async fn test_restore_missing_dump_is_rejected_before_engine_call() {
        let dir = tempfile::tempdir().unwrap();
        let api = Arc::new(MockRelationalApi::default());
        let adapter = StreamingAdapter::new(api.clone());
        let archive = ArchiveRef {
            snapshot_id: "nightly",
            dir: dir.path(),
        };
        let manifest = UnitManifest::new(["app"]).unwrap();

        assert!(matches!(
            adapter.start_restore(archive, &manifest).await,
            OperationResult::Rejected(_)
        ));
        assert_eq!(*api.restore_calls.lock().unwrap(), 0);

        std::fs::create_dir_all(dir.path().join("units")).unwrap();
        std::fs::write(dir.path().join("units/app.dump"), b"-- dump").unwrap();
        assert_eq!(
            adapter.start_restore(archive, &manifest).await,
            OperationResult::Accepted
        );
        assert_eq!(*api.restore_calls.lock().unwrap(), 1);
    }

    #[tokio::test]
    async fn test_database_names_never_leave_the_archive_dir() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("backup/snap");
        std::fs::create_dir_all(&dir).unwrap();
        let api = Arc::new(MockRelationalApi::default());
        *api.databases.lock().unwrap() = vec!["../../escaped".into(), "units.txt".into()];
        let adapter = StreamingAdapter::new(api.clone());
        let archive = ArchiveRef {
            snapshot_id: "snap",
            dir: &dir,
        };

        assert_eq!(adapter.start_backup(archive).await, OperationResult::Accepted);
        assert!(!root.path().join("escaped.dump").exists());
        assert!(dir.join("units/%2E%2E%2F%2E%2E%2Fescaped.dump").is_file());
        assert!(dir.join("units/units%2Etxt.dump").is_file());
        assert_eq!(
            UnitManifest::read_from(&dir).await.unwrap().units(),
            ["../../escaped", "units.txt"]
        );
        assert_eq!(
            adapter.check_snapshot_status(Operation::Backup(archive)).await,
            Ok(SnapshotStatus::Succeeded)
        );
    }

    #[tokio::test]
    async fn test_tampered_manifest_cannot_point_restore_outside_archive() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("restore/snap");
        std::fs::create_dir_all(dir.join("units")).unwrap();
        std::fs::write(root.path().join("victim.dump"), b"-- not ours").unwrap();
        let api = Arc::new(MockRelationalApi::default());
        let adapter = StreamingAdapter::new(api.clone());
        let archive = ArchiveRef {
            snapshot_id: "snap",
            dir: &dir,
        };
        let manifest = UnitManifest::new(["../../victim"]).unwrap();

        assert!(matches!(
            adapter.start_restore(archive, &manifest).await,
            OperationResult::Rejected(reason) if reason.contains("missing")
        ));
        assert_eq!(*api.restore_calls.lock().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_readiness_maps_to_health() {
        let api = Arc::new(MockRelationalApi::default());
        let adapter = StreamingAdapter::new(api.clone());
        assert_eq!(adapter.check_health().await, Ok(HealthStatus::Healthy));

        *api.readiness.lock().unwrap() = Ok(Readiness::Rejecting);
        assert_eq!(adapter.check_health().await, Ok(HealthStatus::Degraded));

        *api.readiness.lock().unwrap() = Err(ClientError::Unreachable("no response".into()));
        assert_eq!(
            adapter.check_health().await,
            Err(Unreachable("no response".into()))
        );
    }
}
