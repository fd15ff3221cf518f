// Command-line surface
// Every job parameter is optional here; JobRequest::validate reports what is missing

use clap::Parser;
use std::time::Duration;

use snapvault_core::application::config::DEFAULT_STAGING_ROOT;
use snapvault_core::application::{OrchestratorConfig, RetryPolicy};
use snapvault_core::domain::{EngineCredentials, JobRequest};

pub const DEFAULT_CREDENTIALS_DIR: &str = "/etc/snapvault/credentials";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 30;
pub const DEFAULT_RETRY_DEADLINE_SECS: u64 = 120;

/// `--process` value that runs the startup health gate instead of a job
pub const STARTUP_PROCESS: &str = "startup";

#[derive(Parser)]
#[command(name = "snapvault")]
#[command(about = "Back up and restore database engines to cloud object storage", long_about = None)]
#[command(version)]
pub struct Cli {
    /// backup, restore or startup
    #[arg(long, env = "SNAPVAULT_PROCESS")]
    pub process: Option<String>,

    /// search, timeseries or relational
    #[arg(long, env = "SNAPVAULT_ENGINE")]
    pub engine: Option<String>,

    /// Engine host, optionally with `:port`
    #[arg(long, env = "SNAPVAULT_HOST")]
    pub host: Option<String>,

    /// aws or gce
    #[arg(long, env = "SNAPVAULT_CLOUD")]
    pub cloud: Option<String>,

    #[arg(long, env = "SNAPVAULT_BUCKET")]
    pub bucket: Option<String>,

    /// Database namespace; base path inside the bucket
    #[arg(long, env = "SNAPVAULT_DATABASE")]
    pub database: Option<String>,

    /// Snapshot ID
    #[arg(long, env = "SNAPVAULT_SNAPSHOT")]
    pub snapshot: Option<String>,

    /// Bucket region (required for search on aws)
    #[arg(long, env = "SNAPVAULT_REGION")]
    pub region: Option<String>,

    /// Cloud access key ID (overrides the credentials directory)
    #[arg(long, env = "SNAPVAULT_KEYID")]
    pub keyid: Option<String>,

    /// Cloud secret access key
    #[arg(long, env = "SNAPVAULT_SECRET", hide_env_values = true)]
    pub secret: Option<String>,

    /// Engine admin user (overrides the credentials directory)
    #[arg(long, env = "SNAPVAULT_DB_USER")]
    pub db_user: Option<String>,

    #[arg(long, env = "SNAPVAULT_DB_PASSWORD", hide_env_values = true)]
    pub db_password: Option<String>,

    /// Local staging root for archives
    #[arg(long, env = "SNAPVAULT_STAGING_DIR", default_value = DEFAULT_STAGING_ROOT)]
    pub staging_dir: String,

    /// Mounted secrets directory
    #[arg(long, env = "SNAPVAULT_CREDENTIALS_DIR", default_value = DEFAULT_CREDENTIALS_DIR)]
    pub credentials_dir: String,

    /// Interval between status, health and retry attempts
    #[arg(
        long,
        env = "SNAPVAULT_POLL_INTERVAL_SECS",
        default_value_t = DEFAULT_POLL_INTERVAL_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub poll_interval_secs: u64,

    /// Deadline for retrying blocking dump/restore calls
    #[arg(
        long,
        env = "SNAPVAULT_RETRY_DEADLINE_SECS",
        default_value_t = DEFAULT_RETRY_DEADLINE_SECS,
        value_parser = clap::value_parser!(u64).range(1..)
    )]
    pub retry_deadline_secs: u64,
}

impl Cli {
    pub fn is_startup(&self) -> bool {
        self.process.as_deref().map(str::trim) == Some(STARTUP_PROCESS)
    }

    pub fn job_request(&self) -> JobRequest {
        JobRequest {
            process: self.process.clone(),
            engine: self.engine.clone(),
            host: self.host.clone(),
            cloud: self.cloud.clone(),
            bucket: self.bucket.clone(),
            database: self.database.clone(),
            snapshot: self.snapshot.clone(),
            region: self.region.clone(),
            keyid: self.keyid.clone(),
            secret: self.secret.clone(),
            db_user: self.db_user.clone(),
            db_password: self.db_password.clone(),
        }
    }

    /// Inline engine credentials for the startup gate, when both halves are given
    pub fn inline_engine_credentials(&self) -> Option<EngineCredentials> {
        let user = self.db_user.as_deref().map(str::trim).filter(|v| !v.is_empty())?;
        let password = self
            .db_password
            .as_deref()
            .map(str::trim)
            .filter(|v| !v.is_empty())?;
        Some(EngineCredentials::new(user, password))
    }

    pub fn staging_root(&self) -> String {
        shellexpand::tilde(&self.staging_dir).into_owned()
    }

    pub fn credentials_root(&self) -> String {
        shellexpand::tilde(&self.credentials_dir).into_owned()
    }

    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        let interval = Duration::from_secs(self.poll_interval_secs);
        OrchestratorConfig {
            completion_poll: RetryPolicy::unbounded(interval),
            health_poll: RetryPolicy::unbounded(interval),
            blocking_retry: RetryPolicy::bounded(
                interval,
                Duration::from_secs(self.retry_deadline_secs),
            ),
            ..OrchestratorConfig::default()
        }
        .with_staging_root(self.staging_root())
    }
}
