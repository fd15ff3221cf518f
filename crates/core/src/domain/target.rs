// Repository target - where a snapshot or dump set lives
//
// Bucket layout under `<bucket>/<namespace>/`:
//   repository/          engine-owned snapshot repository (search only)
//   archives/<snapshot>/ archives pushed and pulled by the transfer gateway

use super::credentials::CloudCredentials;
use super::job::CloudProvider;
use std::path::PathBuf;

/// Default repository name registered on snapshot-capable engines
pub const DEFAULT_REPOSITORY: &str = "snapvault_backup";

/// Namespace subtree handed to the engine as its repository base path
pub const REPOSITORY_PREFIX: &str = "repository";

/// Namespace subtree holding one archive per snapshot ID
pub const ARCHIVE_PREFIX: &str = "archives";

/// `<namespace>/repository`
pub fn repository_base_path(namespace: &str) -> String {
    format!("{}/{}", namespace, REPOSITORY_PREFIX)
}

/// `<namespace>/archives/<snapshot>`
pub fn archive_path(namespace: &str, snapshot_id: &str) -> String {
    format!("{}/{}/{}", namespace, ARCHIVE_PREFIX, snapshot_id)
}

/// Repository tuning passed to the engine when registering an object-store repository
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositorySettings {
    pub max_retries: u32,
    pub compress: bool,
    pub server_side_encryption: bool,
}

impl Default for RepositorySettings {
    fn default() -> Self {
        Self {
            max_retries: 5,
            compress: true,
            server_side_encryption: true,
        }
    }
}

/// Engine-specific description of a snapshot/dump location
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RepositoryTarget {
    /// Engine writes snapshots straight into the bucket
    ObjectStore {
        repository: String,
        provider: CloudProvider,
        bucket: String,
        base_path: String,
        region: Option<String>,
        credentials: CloudCredentials,
        settings: RepositorySettings,
    },
    /// Dump-based engines write into a local staging directory
    Staging { dir: PathBuf },
}

impl RepositoryTarget {
    pub fn repository_name(&self) -> Option<&str> {
        match self {
            RepositoryTarget::ObjectStore { repository, .. } => Some(repository),
            RepositoryTarget::Staging { .. } => None,
        }
    }
}
