// Credential provisioner over a mounted secrets directory
//
// Layout:
//   <dir>/aws/keyid, <dir>/aws/secret
//   <dir>/gce               service-account JSON (project_id read from it)
//   <dir>/<engine>/username, <dir>/<engine>/password
use async_trait::async_trait;
use serde::Deserialize;
use std::path::{Path, PathBuf};
use tracing::debug;

use snapvault_core::domain::{CloudCredentials, CloudProvider, EngineCredentials, EngineKind};
use snapvault_core::port::{CredentialError, CredentialProvisioner};

#[derive(Deserialize)]
struct ServiceAccountKey {
    project_id: String,
}

pub struct FileCredentialProvisioner {
    dir: PathBuf,
}

impl FileCredentialProvisioner {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Read a secret file, trimming the trailing newline mounts usually carry
    async fn read_value(path: &Path) -> Result<String, CredentialError> {
        let raw = match tokio::fs::read_to_string(path).await {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(CredentialError::NotFound(path.display().to_string()))
            }
            Err(e) => {
                return Err(CredentialError::Unreadable {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })
            }
        };
        let value = raw.trim();
        if value.is_empty() {
            return Err(CredentialError::Malformed(path.display().to_string()));
        }
        Ok(value.to_string())
    }
}

#[async_trait]
impl CredentialProvisioner for FileCredentialProvisioner {
    async fn resolve_cloud_credentials(
        &self,
        provider: CloudProvider,
    ) -> Result<CloudCredentials, CredentialError> {
        debug!(provider = %provider, dir = %self.dir.display(), "Resolving cloud credentials");
        match provider {
            CloudProvider::Aws => {
                let base = self.dir.join("aws");
                let key_id = Self::read_value(&base.join("keyid")).await?;
                let secret = Self::read_value(&base.join("secret")).await?;
                Ok(CloudCredentials::new(key_id, secret))
            }
            CloudProvider::Gce => {
                let key_file = self.dir.join("gce");
                let raw = Self::read_value(&key_file).await?;
                let key: ServiceAccountKey = serde_json::from_str(&raw).map_err(|e| {
                    CredentialError::Malformed(format!("{}: {}", key_file.display(), e))
                })?;
                Ok(CloudCredentials::new(
                    key.project_id,
                    key_file.display().to_string(),
                ))
            }
        }
    }

    async fn resolve_engine_credentials(
        &self,
        engine: EngineKind,
    ) -> Result<EngineCredentials, CredentialError> {
        let base = self.dir.join(engine.to_string());
        debug!(engine = %engine, dir = %base.display(), "Resolving engine credentials");
        let username = Self::read_value(&base.join("username")).await?;
        let password = Self::read_value(&base.join("password")).await?;
        Ok(EngineCredentials::new(username, password))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn write(dir: &Path, rel: &str, contents: &str) {
        let path = dir.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }

    #[tokio::test]
    async fn test_aws_credentials_are_trimmed() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "aws/keyid", "AKIA123\n");
        write(dir.path(), "aws/secret", "  s3cret\n");
        let provisioner = FileCredentialProvisioner::new(dir.path());

        let creds = provisioner
            .resolve_cloud_credentials(CloudProvider::Aws)
            .await
            .unwrap();
        assert_eq!(creds, CloudCredentials::new("AKIA123", "s3cret"));
    }

    #[tokio::test]
    async fn test_gce_reads_project_from_key_file() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "gce",
            r#"{"type":"service_account","project_id":"my-project"}"#,
        );
        let provisioner = FileCredentialProvisioner::new(dir.path());

        let creds = provisioner
            .resolve_cloud_credentials(CloudProvider::Gce)
            .await
            .unwrap();
        assert_eq!(creds.access_key_id, "my-project");
        assert!(creds.secret_access_key.ends_with("gce"));
    }

    #[tokio::test]
    async fn test_gce_key_without_project_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "gce", r#"{"type":"service_account"}"#);
        let provisioner = FileCredentialProvisioner::new(dir.path());

        let err = provisioner
            .resolve_cloud_credentials(CloudProvider::Gce)
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::Malformed(_)));
    }

    #[tokio::test]
    async fn test_engine_credentials_by_kind() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "relational/username", "postgres\n");
        write(dir.path(), "relational/password", "hunter2\n");
        let provisioner = FileCredentialProvisioner::new(dir.path());

        let creds = provisioner
            .resolve_engine_credentials(EngineKind::Relational)
            .await
            .unwrap();
        assert_eq!(creds, EngineCredentials::new("postgres", "hunter2"));

        let missing = provisioner
            .resolve_engine_credentials(EngineKind::Search)
            .await
            .unwrap_err();
        assert!(matches!(missing, CredentialError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_empty_secret_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "timeseries/username", "admin");
        write(dir.path(), "timeseries/password", "\n");
        let provisioner = FileCredentialProvisioner::new(dir.path());

        let err = provisioner
            .resolve_engine_credentials(EngineKind::TimeSeries)
            .await
            .unwrap_err();
        assert!(matches!(err, CredentialError::Malformed(_)));
    }
}
