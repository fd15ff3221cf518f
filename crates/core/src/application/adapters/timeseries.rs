//! Dump-based variant (time-series store)
//!
//! Each database is dumped into its own directory under `units/`, one after
//! another. The manifest goes in last.

use super::{probe_failure, start_failure, verify_archive};
use crate::domain::{
    payload_dir, payload_name, EngineKind, HealthStatus, OperationResult, RepositoryTarget,
    SnapshotStatus, UnitManifest, Unreachable,
};
use crate::port::{ArchiveRef, BackendAdapter, CompletionMode, Operation, TimeSeriesApi};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{info, warn};

/// System databases never included in a dump
const SYSTEM_DATABASES: &[&str] = &["_internal"];

pub struct DumpAdapter {
    client: Arc<dyn TimeSeriesApi>,
}

impl DumpAdapter {
    pub fn new(client: Arc<dyn TimeSeriesApi>) -> Self {
        Self { client }
    }

    /// `<dir>/units/<encoded database>`
    fn unit_dir(dir: &Path, unit: &str) -> PathBuf {
        payload_dir(dir).join(payload_name(unit))
    }

    fn map_verdict(verdict: &str) -> HealthStatus {
        match verdict {
            "pass" => HealthStatus::Healthy,
            "warn" => HealthStatus::Degraded,
            "fail" => HealthStatus::Unhealthy,
            other => {
                warn!(verdict = %other, "Unrecognized health verdict");
                HealthStatus::Unhealthy
            }
        }
    }

    async fn restored_status(
        &self,
        manifest: &UnitManifest,
    ) -> std::result::Result<SnapshotStatus, Unreachable> {
        let present = match self.client.list_databases().await {
            Ok(databases) => databases,
            Err(e) => return probe_failure(e, |e| SnapshotStatus::Failed(e.to_string())),
        };
        let missing: Vec<&str> = manifest
            .units()
            .iter()
            .filter(|unit| !present.contains(*unit))
            .map(String::as_str)
            .collect();

        if missing.is_empty() {
            Ok(SnapshotStatus::Succeeded)
        } else {
            Ok(SnapshotStatus::Failed(format!(
                "databases missing after restore: {}",
                missing.join(", ")
            )))
        }
    }
}

#[async_trait]
impl BackendAdapter for DumpAdapter {
    fn engine(&self) -> EngineKind {
        EngineKind::TimeSeries
    }

    fn completion(&self) -> CompletionMode {
        CompletionMode::Polled
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
                "dump engine writes to a staging dir, not an object-store repository".to_string(),
            ),
        }
    }

    async fn start_backup(&self, archive: ArchiveRef<'_>) -> OperationResult {
        let databases = match self.client.list_databases().await {
            Ok(databases) => databases,
            Err(e) => return start_failure("list databases", e),
        };
        let manifest = match UnitManifest::new(
            databases
                .into_iter()
                .filter(|db| !SYSTEM_DATABASES.contains(&db.as_str())),
        ) {
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

        for (position, unit) in manifest.units().iter().enumerate() {
            let dest = Self::unit_dir(archive.dir, unit);
            if let Err(e) = self.client.dump_database(unit, &dest).await {
                warn!(
                    snapshot = %archive.snapshot_id,
                    database = %unit,
                    dumped = position,
                    error = %e,
                    "Database dump failed, backup stopped"
                );
                return start_failure(&format!("dump {}", unit), e);
            }
            info!(snapshot = %archive.snapshot_id, database = %unit, "Database dumped");
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
        for unit in manifest.units() {
            let src = Self::unit_dir(archive.dir, unit);
            if tokio::fs::metadata(&src).await.is_err() {
                return OperationResult::Rejected(format!(
                    "payload for {} missing at {}",
                    unit,
                    src.display()
                ));
            }
            if let Err(e) = self.client.restore_database(unit, &src).await {
                warn!(snapshot = %archive.snapshot_id, database = %unit, error = %e, "Database restore failed");
                return start_failure(&format!("restore {}", unit), e);
            }
            info!(snapshot = %archive.snapshot_id, database = %unit, "Database restored");
        }
        OperationResult::Accepted
    }

    async fn check_health(&self) -> std::result::Result<HealthStatus, Unreachable> {
        match self.client.health().await {
            Ok(verdict) => Ok(Self::map_verdict(&verdict)),
            Err(e) => probe_failure(e, |_| HealthStatus::Unhealthy),
        }
    }

    async fn check_snapshot_status(
        &self,
        operation: Operation<'_>,
    ) -> std::result::Result<SnapshotStatus, Unreachable> {
        match operation {
            Operation::Backup(archive) => Ok(verify_archive(archive.dir, Self::unit_dir).await),
            Operation::Restore(_, manifest) => self.restored_status(manifest).await,
        }
    }
}
