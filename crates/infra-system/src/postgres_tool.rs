// Relational streaming dump/restore over pg_dump / pg_restore / pg_isready
// Password goes through PGPASSWORD; custom-format archives, one file per database
use async_trait::async_trait;
use std::path::Path;
use tracing::{debug, info};

use snapvault_core::domain::EngineCredentials;
use snapvault_core::port::{ClientError, Readiness, RelationalApi};

use crate::constants::{POSTGRES_PORT, PROBE_TIMEOUT};
use crate::endpoint::split_host;
use crate::subprocess_runner::{CommandError, CommandSpec, SubprocessRunner};

/// Maintenance database used for listing and creating databases
const MAINTENANCE_DB: &str = "postgres";

const LIST_DATABASES_SQL: &str =
    "SELECT datname FROM pg_database WHERE NOT datistemplate AND datallowconn ORDER BY datname";

pub struct PgStreamTool {
    runner: SubprocessRunner,
    host: String,
    port: u16,
    credentials: EngineCredentials,
}

impl PgStreamTool {
    pub fn new(runner: SubprocessRunner, host: &str, credentials: EngineCredentials) -> Self {
        let (host, port) = split_host(host, POSTGRES_PORT);
        Self {
            runner,
            host,
            port,
            credentials,
        }
    }

    /// Program with connection flags and PGPASSWORD
    fn command(&self, program: &str) -> CommandSpec {
        CommandSpec::new(program)
            .args(["-h", self.host.as_str()])
            .args(["-p".to_string(), self.port.to_string()])
            .args(["-U", self.credentials.username.as_str()])
            .env("PGPASSWORD", &self.credentials.password)
    }

    fn dump_command(&self, database: &str, dest_file: &Path) -> CommandSpec {
        self.command("pg_dump")
            .args(["-Fc", "--no-password", "-f"])
            .arg(dest_file.display().to_string())
            .arg(database)
    }

    fn restore_command(&self, database: &str, src_file: &Path) -> CommandSpec {
        self.command("pg_restore")
            .args(["--clean", "--if-exists", "--no-owner", "--no-password", "-d", database])
            .arg(src_file.display().to_string())
    }

    /// Create the target database if it does not exist yet
    async fn ensure_database(&self, database: &str) -> Result<(), ClientError> {
        let spec = self
            .command("createdb")
            .args(["--no-password", "--maintenance-db", MAINTENANCE_DB, database]);
        match self.runner.run_checked(&spec).await {
            Ok(_) => {
                info!(database, "Created database for restore");
                Ok(())
            }
            Err(CommandError::Failed { ref stderr, .. }) if stderr.contains("already exists") => {
                debug!(database, "Database already exists");
                Ok(())
            }
            Err(e) => Err(e.into()),
        }
    }

    /// pg_isready exit codes: 0 accepting, 1 rejecting, 2 no response, 3 bad parameters
    fn readiness_from_exit(exit_code: Option<i32>, stderr: &str) -> Result<Readiness, ClientError> {
        match exit_code {
            Some(0) => Ok(Readiness::Accepting),
            Some(1) => Ok(Readiness::Rejecting),
            Some(2) => Err(ClientError::Unreachable("no response from server".to_string())),
            other => Err(ClientError::api(
                None,
                "pg_isready",
                format!("exit {:?}: {}", other, stderr.trim()),
            )),
        }
    }
}

#[async_trait]
impl RelationalApi for PgStreamTool {
    async fn list_databases(&self) -> Result<Vec<String>, ClientError> {
        let spec = self
            .command("psql")
            .args(["--no-password", "-At", "-d", MAINTENANCE_DB, "-c", LIST_DATABASES_SQL]);
        let output = self.runner.run_checked(&spec).await?;
        Ok(output
            .stdout
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty())
            .map(str::to_string)
            .collect())
    }

    async fn dump(&self, database: &str, dest_file: &Path) -> Result<(), ClientError> {
        self.runner
            .run_checked(&self.dump_command(database, dest_file))
            .await?;
        Ok(())
    }

    async fn restore(&self, database: &str, src_file: &Path) -> Result<(), ClientError> {
        self.ensure_database(database).await?;
        self.runner
            .run_checked(&self.restore_command(database, src_file))
            .await?;
        Ok(())
    }

    async fn readiness(&self) -> Result<Readiness, ClientError> {
        let probe = self.runner.clone().with_timeout(PROBE_TIMEOUT);
        let spec = CommandSpec::new("pg_isready")
            .args(["-h", self.host.as_str()])
            .args(["-p".to_string(), self.port.to_string()])
            .args(["-U", self.credentials.username.as_str()])
            .args(["-t", "10"]);
        let output = probe.run(&spec).await?;
        Self::readiness_from_exit(output.exit_code, &output.stderr)
    }
}
