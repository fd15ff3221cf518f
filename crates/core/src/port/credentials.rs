// Credential Provisioner Port
// Resolves cloud and database admin credentials once at job start

use crate::domain::{CloudCredentials, CloudProvider, EngineCredentials, EngineKind};
use async_trait::async_trait;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialError {
    #[error("no credentials configured for {0}")]
    NotFound(String),

    #[error("cannot read {path}: {reason}")]
    Unreadable { path: String, reason: String },

    #[error("malformed credentials in {0}")]
    Malformed(String),
}

#[async_trait]
pub trait CredentialProvisioner: Send + Sync {
    async fn resolve_cloud_credentials(
        &self,
        provider: CloudProvider,
    ) -> Result<CloudCredentials, CredentialError>;

    async fn resolve_engine_credentials(
        &self,
        engine: EngineKind,
    ) -> Result<EngineCredentials, CredentialError>;
}

// ============================================================================
// Mock Implementations for Testing
// ============================================================================

pub mod mocks {
    use super::*;
    use std::sync::Mutex;

    /// Static provisioner; `None` makes the corresponding call fail
    pub struct MockCredentialProvisioner {
        cloud: Option<CloudCredentials>,
        engine: Option<EngineCredentials>,
        calls: Mutex<usize>,
    }

    impl MockCredentialProvisioner {
        pub fn new_valid() -> Self {
            Self {
                cloud: Some(CloudCredentials::new("AKIAMOCK", "mock-secret")),
                engine: Some(EngineCredentials::new("admin", "mock-password")),
                calls: Mutex::new(0),
            }
        }

        pub fn new_missing_cloud() -> Self {
            Self {
                cloud: None,
                ..Self::new_valid()
            }
        }

        pub fn new_missing_engine() -> Self {
            Self {
                engine: None,
                ..Self::new_valid()
            }
        }

        pub fn call_count(&self) -> usize {
            *self.calls.lock().unwrap()
        }
    }

    #[async_trait]
    impl CredentialProvisioner for MockCredentialProvisioner {
        async fn resolve_cloud_credentials(
            &self,
            provider: CloudProvider,
        ) -> Result<CloudCredentials, CredentialError> {
            *self.calls.lock().unwrap() += 1;
            self.cloud
                .clone()
                .ok_or_else(|| CredentialError::NotFound(provider.to_string()))
        }

        async fn resolve_engine_credentials(
            &self,
            engine: EngineKind,
        ) -> Result<EngineCredentials, CredentialError> {
            *self.calls.lock().unwrap() += 1;
            self.engine
                .clone()
                .ok_or_else(|| CredentialError::NotFound(engine.to_string()))
        }
    }
}
