// Cloud transfer via the provider CLIs
// aws: `aws s3 cp --recursive` with credentials in the environment
// gce: `gsutil -m rsync -r` with boto overrides for the service-account key
use async_trait::async_trait;
use std::path::Path;
use tracing::info;

use snapvault_core::domain::CloudProvider;
use snapvault_core::port::{TransferError, TransferGateway, TransferRequest};

use crate::subprocess_runner::{CommandSpec, SubprocessRunner};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Direction {
    Push,
    Pull,
}

pub struct CliTransferGateway {
    runner: SubprocessRunner,
}

impl CliTransferGateway {
    pub fn new(runner: SubprocessRunner) -> Self {
        Self { runner }
    }

    fn command_for(direction: Direction, local: &Path, request: &TransferRequest) -> CommandSpec {
        let local = local.display().to_string();
        let remote = request.remote_url();
        let (src, dst) = match direction {
            Direction::Push => (local, remote),
            Direction::Pull => (remote, local),
        };

        match request.provider {
            CloudProvider::Aws => CommandSpec::new("aws")
                .args(["s3", "cp", "--recursive", "--only-show-errors"])
                .args([src, dst])
                .env("AWS_ACCESS_KEY_ID", &request.credentials.access_key_id)
                .env("AWS_SECRET_ACCESS_KEY", &request.credentials.secret_access_key),
            // GCE credentials: access_key_id is the project, secret the key file path
            CloudProvider::Gce => CommandSpec::new("gsutil")
                .arg("-o")
                .arg(format!(
                    "Credentials:gs_service_key_file={}",
                    request.credentials.secret_access_key
                ))
                .arg("-o")
                .arg(format!(
                    "GSUtil:default_project_id={}",
                    request.credentials.access_key_id
                ))
                .args(["-m", "rsync", "-r"])
                .args([src, dst]),
        }
    }

    async fn transfer(
        &self,
        direction: Direction,
        local: &Path,
        request: &TransferRequest,
    ) -> Result<(), TransferError> {
        let remote = request.remote_url();
        let spec = Self::command_for(direction, local, request);
        info!(direction = ?direction, remote = %remote, local = %local.display(), "Starting transfer");

        self.runner
            .run_checked(&spec)
            .await
            .map(|_| ())
            .map_err(|e| match direction {
                Direction::Push => TransferError::Push {
                    remote,
                    reason: e.to_string(),
                },
                Direction::Pull => TransferError::Pull {
                    remote,
                    reason: e.to_string(),
                },
            })
    }
}

#[async_trait]
impl TransferGateway for CliTransferGateway {
    async fn push(&self, local: &Path, request: &TransferRequest) -> Result<(), TransferError> {
        self.transfer(Direction::Push, local, request).await
    }

    async fn pull(&self, request: &TransferRequest, local: &Path) -> Result<(), TransferError> {
        tokio::fs::create_dir_all(local)
            .await
            .map_err(|e| TransferError::Pull {
                remote: request.remote_url(),
                reason: format!("create {}: {}", local.display(), e),
            })?;
        self.transfer(Direction::Pull, local, request).await
    }
}
