// Orchestrator configuration
// Every polling call site carries its own policy

use super::poll::RetryPolicy;
use crate::domain::{RepositorySettings, DEFAULT_REPOSITORY};
use std::path::{Path, PathBuf};

/// Default staging root for local archives
pub const DEFAULT_STAGING_ROOT: &str = "/var/snapvault";

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Backup/restore completion polling on polled engines
    pub completion_poll: RetryPolicy,
    /// Health gating before and after a restore, and at startup
    pub health_poll: RetryPolicy,
    /// Retry of blocking start operations
    pub blocking_retry: RetryPolicy,
    pub staging_root: PathBuf,
    pub repository: String,
    pub repository_settings: RepositorySettings,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            completion_poll: RetryPolicy::default_unbounded(),
            health_poll: RetryPolicy::default_unbounded(),
            blocking_retry: RetryPolicy::default_bounded(),
            staging_root: PathBuf::from(DEFAULT_STAGING_ROOT),
            repository: DEFAULT_REPOSITORY.to_string(),
            repository_settings: RepositorySettings::default(),
        }
    }
}

impl OrchestratorConfig {
    pub fn with_staging_root(mut self, root: impl AsRef<Path>) -> Self {
        self.staging_root = root.as_ref().to_path_buf();
        self
    }

    /// `<root>/backup/<snapshot>`
    pub fn backup_dir(&self, snapshot_id: &str) -> PathBuf {
        self.staging_root.join("backup").join(snapshot_id)
    }

    /// `<root>/restore/<snapshot>`
    pub fn restore_dir(&self, snapshot_id: &str) -> PathBuf {
        self.staging_root.join("restore").join(snapshot_id)
    }
}
