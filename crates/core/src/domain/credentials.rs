// Credential value types
//
// Debug output is redacted; these values flow through tracing fields.

use serde::{Deserialize, Serialize};

const REDACTED: &str = "***";

/// Object-storage credentials (AWS access key pair, or GCE project + key file)
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CloudCredentials {
    pub access_key_id: String,
    pub secret_access_key: String,
}

impl CloudCredentials {
    pub fn new(access_key_id: impl Into<String>, secret_access_key: impl Into<String>) -> Self {
        Self {
            access_key_id: access_key_id.into(),
            secret_access_key: secret_access_key.into(),
        }
    }
}

impl std::fmt::Debug for CloudCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CloudCredentials")
            .field("access_key_id", &self.access_key_id)
            .field("secret_access_key", &REDACTED)
            .finish()
    }
}

/// Database admin credentials
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineCredentials {
    pub username: String,
    pub password: String,
}

impl EngineCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }
}

impl std::fmt::Debug for EngineCredentials {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EngineCredentials")
            .field("username", &self.username)
            .field("password", &REDACTED)
            .finish()
    }
}

/// Credentials supplied directly on the job; they take precedence over the provisioner
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct InlineCredentials {
    pub cloud: Option<CloudCredentials>,
    pub engine: Option<EngineCredentials>,
}

/// Credentials materialized once at job start
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedCredentials {
    pub cloud: CloudCredentials,
    pub engine: EngineCredentials,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_secrets() {
        let cloud = CloudCredentials::new("AKIA123", "top-secret");
        let engine = EngineCredentials::new("admin", "hunter2");

        let rendered = format!("{:?} {:?}", cloud, engine);
        assert!(rendered.contains("AKIA123"));
        assert!(rendered.contains("admin"));
        assert!(!rendered.contains("top-secret"));
        assert!(!rendered.contains("hunter2"));
    }
}
