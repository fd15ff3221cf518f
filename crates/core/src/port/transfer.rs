// Cloud Transfer Gateway Port
// Pushes/pulls a snapshot directory to/from `<bucket>/<namespace>/archives/<snapshot>`

use crate::domain::{archive_path, CloudCredentials, CloudProvider, Job};
use async_trait::async_trait;
use std::path::Path;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransferError {
    #[error("push to {remote} failed: {reason}")]
    Push { remote: String, reason: String },

    #[error("pull from {remote} failed: {reason}")]
    Pull { remote: String, reason: String },
}

/// Remote side of a transfer
///
/// Archives live under `<namespace>/archives/`, a sibling of the engine-owned
/// `<namespace>/repository/` tree, so no snapshot ID can write into the
/// engine's own repository files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferRequest {
    pub provider: CloudProvider,
    pub bucket: String,
    pub namespace: String,
    pub snapshot_id: String,
    pub credentials: CloudCredentials,
}

impl TransferRequest {
    pub fn for_job(job: &Job, credentials: CloudCredentials) -> Self {
        Self {
            provider: job.cloud(),
            bucket: job.bucket().to_string(),
            namespace: job.namespace().to_string(),
            snapshot_id: job.snapshot_id().to_string(),
            credentials,
        }
    }

    /// e.g. `s3://backups/es-prod/archives/snap-1`
    pub fn remote_url(&self) -> String {
        format!(
            "{}://{}/{}",
            self.provider.scheme(),
            self.bucket,
            archive_path(&self.namespace, &self.snapshot_id)
        )
    }
}

#[async_trait]
pub trait TransferGateway: Send + Sync {
    async fn push(&self, local: &Path, request: &TransferRequest) -> Result<(), TransferError>;

    async fn pull(&self, request: &TransferRequest, local: &Path) -> Result<(), TransferError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::collections::HashMap;
    use std::path::PathBuf;
    use std::sync::Mutex;

    /// In-memory bucket: push copies files into a map keyed by remote URL,
    /// pull writes them back out
    #[derive(Default)]
    pub struct MockTransferGateway {
        objects: Mutex<HashMap<String, Vec<(PathBuf, Vec<u8>)>>>,
        fail_push: bool,
        fail_pull: bool,
        pushes: Mutex<usize>,
        pulls: Mutex<usize>,
    }

    impl MockTransferGateway {
        pub fn new() -> Self {
            Self::default()
        }

        pub fn new_failing_push() -> Self {
            Self {
                fail_push: true,
                ..Self::default()
            }
        }

        pub fn new_failing_pull() -> Self {
            Self {
                fail_pull: true,
                ..Self::default()
            }
        }

        pub fn push_count(&self) -> usize {
            *self.pushes.lock().unwrap()
        }

        pub fn pull_count(&self) -> usize {
            *self.pulls.lock().unwrap()
        }

        /// Relative file names stored under a remote URL
        pub fn stored_files(&self, remote: &str) -> Vec<PathBuf> {
            self.objects
                .lock()
                .unwrap()
                .get(remote)
                .map(|files| files.iter().map(|(p, _)| p.clone()).collect())
                .unwrap_or_default()
        }

        fn collect(root: &Path, dir: &Path, out: &mut Vec<(PathBuf, Vec<u8>)>) -> std::io::Result<()> {
            for entry in std::fs::read_dir(dir)? {
                let path = entry?.path();
                if path.is_dir() {
                    Self::collect(root, &path, out)?;
                } else {
                    let relative = path.strip_prefix(root).unwrap_or(&path).to_path_buf();
                    out.push((relative, std::fs::read(&path)?));
                }
            }
            Ok(())
        }
    }

    #[async_trait]
    impl TransferGateway for MockTransferGateway {
        async fn push(&self, local: &Path, request: &TransferRequest) -> Result<(), TransferError> {
            *self.pushes.lock().unwrap() += 1;
            let remote = request.remote_url();
            if self.fail_push {
                return Err(TransferError::Push {
                    remote,
                    reason: "mock push failure".to_string(),
                });
            }
            let mut files = Vec::new();
            Self::collect(local, local, &mut files).map_err(|e| TransferError::Push {
                remote: remote.clone(),
                reason: e.to_string(),
            })?;
            files.sort();
            self.objects.lock().unwrap().insert(remote, files);
            Ok(())
        }

        async fn pull(&self, request: &TransferRequest, local: &Path) -> Result<(), TransferError> {
            *self.pulls.lock().unwrap() += 1;
            let remote = request.remote_url();
            if self.fail_pull {
                return Err(TransferError::Pull {
                    remote,
                    reason: "mock pull failure".to_string(),
                });
            }
            let files = self
                .objects
                .lock()
                .unwrap()
                .get(&remote)
                .cloned()
                .ok_or_else(|| TransferError::Pull {
                    remote: remote.clone(),
                    reason: "no such object".to_string(),
                })?;
            for (relative, bytes) in files {
                let path = local.join(relative);
                if let Some(parent) = path.parent() {
                    std::fs::create_dir_all(parent).map_err(|e| TransferError::Pull {
                        remote: remote.clone(),
                        reason: e.to_string(),
                    })?;
                }
                std::fs::write(&path, bytes).map_err(|e| TransferError::Pull {
                    remote: remote.clone(),
                    reason: e.to_string(),
                })?;
            }
            Ok(())
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::JobRequest;

    #[test]
    fn test_remote_url_namespaced_by_snapshot() {
        let job = JobRequest {
            process: Some("backup".into()),
            engine: Some("timeseries".into()),
            host: Some("influx-0".into()),
            cloud: Some("gce".into()),
            bucket: Some("tsdb-backups".into()),
            database: Some("metrics".into()),
            snapshot: Some("nightly-7".into()),
            ..Default::default()
        }
        .validate()
        .unwrap();

        let request = TransferRequest::for_job(&job, CloudCredentials::new("project", "key.json"));
        assert_eq!(request.remote_url(), "gs://tsdb-backups/metrics/archives/nightly-7");
    }
}
