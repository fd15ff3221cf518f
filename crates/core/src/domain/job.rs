// Job Domain Model

use super::credentials::{CloudCredentials, EngineCredentials, InlineCredentials};
use super::error::{DomainError, Result};
use serde::{Deserialize, Serialize};
use std::str::FromStr;

/// Snapshot identifier (also the archive directory name in the bucket)
pub type SnapshotId = String;

/// Which direction the job moves data
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Process {
    Backup,
    Restore,
}

impl std::fmt::Display for Process {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Process::Backup => write!(f, "backup"),
            Process::Restore => write!(f, "restore"),
        }
    }
}

impl FromStr for Process {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "backup" => Ok(Process::Backup),
            "restore" => Ok(Process::Restore),
            other => Err(DomainError::InvalidParameter {
                name: "process",
                value: other.to_string(),
            }),
        }
    }
}

/// Database engine family; selects the backend adapter variant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineKind {
    /// Snapshot-capable search/indexing engine
    Search,
    /// Enumerate-and-dump time-series store
    TimeSeries,
    /// Streaming dump/restore relational engine
    Relational,
}

impl std::fmt::Display for EngineKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            EngineKind::Search => write!(f, "search"),
            EngineKind::TimeSeries => write!(f, "timeseries"),
            EngineKind::Relational => write!(f, "relational"),
        }
    }
}

impl FromStr for EngineKind {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "search" | "elasticsearch" => Ok(EngineKind::Search),
            "timeseries" | "influxdb" => Ok(EngineKind::TimeSeries),
            "relational" | "postgres" => Ok(EngineKind::Relational),
            other => Err(DomainError::InvalidParameter {
                name: "engine",
                value: other.to_string(),
            }),
        }
    }
}

/// Object storage provider
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CloudProvider {
    Aws,
    Gce,
}

impl CloudProvider {
    /// URL scheme used for bucket addresses
    pub fn scheme(&self) -> &'static str {
        match self {
            CloudProvider::Aws => "s3",
            CloudProvider::Gce => "gs",
        }
    }
}

impl std::fmt::Display for CloudProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CloudProvider::Aws => write!(f, "aws"),
            CloudProvider::Gce => write!(f, "gce"),
        }
    }
}

impl FromStr for CloudProvider {
    type Err = DomainError;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "aws" => Ok(CloudProvider::Aws),
            "gce" => Ok(CloudProvider::Gce),
            other => Err(DomainError::InvalidParameter {
                name: "cloud",
                value: other.to_string(),
            }),
        }
    }
}

/// Raw job parameters as submitted (every field optional until validated)
///
/// No Debug: `secret` and `db_password` arrive here in clear text.
#[derive(Clone, Default)]
pub struct JobRequest {
    pub process: Option<String>,
    pub engine: Option<String>,
    pub host: Option<String>,
    pub cloud: Option<String>,
    pub bucket: Option<String>,
    pub database: Option<String>,
    pub snapshot: Option<String>,
    pub region: Option<String>,
    pub keyid: Option<String>,
    pub secret: Option<String>,
    pub db_user: Option<String>,
    pub db_password: Option<String>,
}

impl JobRequest {
    /// Validate the request into an immutable Job
    ///
    /// Parameters are checked in submission order and the first missing
    /// one is reported. Nothing external is touched here.
    pub fn validate(&self) -> Result<Job> {
        let process: Process = required("process", &self.process)?.parse()?;
        let host = required("host", &self.host)?.to_string();
        let cloud: CloudProvider = required("cloud", &self.cloud)?.parse()?;
        let bucket = required("bucket", &self.bucket)?.to_string();
        let snapshot_id = required("snapshot", &self.snapshot)?.to_string();
        let namespace = required("database", &self.database)?.to_string();
        let engine: EngineKind = required("engine", &self.engine)?.parse()?;

        validate_path_segment("snapshot", &snapshot_id)?;
        validate_path_segment("database", &namespace)?;

        let region = non_empty(&self.region);
        if engine == EngineKind::Search && cloud == CloudProvider::Aws && region.is_none() {
            return Err(DomainError::MissingParameter("region"));
        }

        let cloud_credentials = match (non_empty(&self.keyid), non_empty(&self.secret)) {
            (Some(key), Some(secret)) => Some(CloudCredentials::new(key, secret)),
            (None, None) => None,
            (Some(_), None) => return Err(DomainError::MissingParameter("secret")),
            (None, Some(_)) => return Err(DomainError::MissingParameter("keyid")),
        };

        let engine_credentials = match (non_empty(&self.db_user), non_empty(&self.db_password)) {
            (Some(user), Some(password)) => Some(EngineCredentials::new(user, password)),
            (None, None) => None,
            (Some(_), None) => return Err(DomainError::MissingParameter("db-password")),
            (None, Some(_)) => return Err(DomainError::MissingParameter("db-user")),
        };

        Ok(Job {
            process,
            engine,
            host,
            snapshot_id,
            cloud,
            bucket,
            namespace,
            region,
            credentials: InlineCredentials {
                cloud: cloud_credentials,
                engine: engine_credentials,
            },
        })
    }

    /// Validate only what a startup health gate needs: engine and host
    pub fn validate_target(&self) -> Result<(EngineKind, String)> {
        let host = required("host", &self.host)?.to_string();
        let engine: EngineKind = required("engine", &self.engine)?.parse()?;
        Ok((engine, host))
    }
}

fn non_empty(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

fn required<'a>(name: &'static str, value: &'a Option<String>) -> Result<&'a str> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .ok_or(DomainError::MissingParameter(name))
}

/// Snapshot IDs and namespaces become bucket path segments
fn validate_path_segment(name: &'static str, value: &str) -> Result<()> {
    let valid_chars = value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'));

    if !valid_chars || value == "." || value == ".." {
        return Err(DomainError::InvalidParameter {
            name,
            value: value.to_string(),
        });
    }
    Ok(())
}

/// Job descriptor - immutable once validated, owned by one orchestrator run
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Job {
    process: Process,
    engine: EngineKind,
    host: String,
    snapshot_id: SnapshotId,
    cloud: CloudProvider,
    bucket: String,
    namespace: String,
    region: Option<String>,
    credentials: InlineCredentials,
}

impl Job {
    pub fn process(&self) -> Process {
        self.process
    }

    pub fn engine(&self) -> EngineKind {
        self.engine
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    pub fn snapshot_id(&self) -> &str {
        &self.snapshot_id
    }

    pub fn cloud(&self) -> CloudProvider {
        self.cloud
    }

    pub fn bucket(&self) -> &str {
        &self.bucket
    }

    /// Database namespace; base path of the archive inside the bucket
    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    pub fn region(&self) -> Option<&str> {
        self.region.as_deref()
    }

    pub fn credentials(&self) -> &InlineCredentials {
        &self.credentials
    }
}
