// Time-series dump utility over the influx/influxd CLIs
// Portable backup format, one directory per database
use async_trait::async_trait;
use std::path::Path;
use tracing::debug;

use snapvault_core::domain::EngineCredentials;
use snapvault_core::port::{ClientError, TimeSeriesApi};

use crate::constants::{INFLUX_BACKUP_PORT, INFLUX_HTTP_PORT, PROBE_TIMEOUT};
use crate::endpoint::split_host;
use crate::subprocess_runner::{CommandError, CommandSpec, SubprocessRunner};

pub struct InfluxDumpTool {
    runner: SubprocessRunner,
    host: String,
    http_port: u16,
    credentials: EngineCredentials,
}

impl InfluxDumpTool {
    /// `host` may carry the HTTP API port (`influx-0:8086`)
    pub fn new(runner: SubprocessRunner, host: &str, credentials: EngineCredentials) -> Self {
        let (host, http_port) = split_host(host, INFLUX_HTTP_PORT);
        Self {
            runner,
            host,
            http_port,
            credentials,
        }
    }

    fn query(&self, statement: &str) -> CommandSpec {
        CommandSpec::new("influx")
            .args(["-host", self.host.as_str()])
            .args(["-port".to_string(), self.http_port.to_string()])
            .args(["-username", self.credentials.username.as_str()])
            .args(["-format", "csv", "-execute", statement])
            .env("INFLUX_PASSWORD", &self.credentials.password)
    }

    fn rpc_address(&self) -> String {
        format!("{}:{}", self.host, INFLUX_BACKUP_PORT)
    }

    fn backup_command(&self, database: &str, dest: &Path) -> CommandSpec {
        CommandSpec::new("influxd")
            .args(["backup", "-portable", "-database", database])
            .args(["-host".to_string(), self.rpc_address()])
            .arg(dest.display().to_string())
    }

    fn restore_command(&self, database: &str, src: &Path) -> CommandSpec {
        CommandSpec::new("influxd")
            .args(["restore", "-portable", "-db", database])
            .args(["-host".to_string(), self.rpc_address()])
            .arg(src.display().to_string())
    }

    /// `SHOW DATABASES` csv: header `name,name`, then `databases,<db>` rows
    fn parse_databases(csv: &str) -> Vec<String> {
        csv.lines()
            .skip(1)
            .filter_map(|line| line.split_once(','))
            .map(|(_, name)| name.trim().to_string())
            .filter(|name| !name.is_empty())
            .collect()
    }
}

#[async_trait]
impl TimeSeriesApi for InfluxDumpTool {
    async fn list_databases(&self) -> Result<Vec<String>, ClientError> {
        let output = self.runner.run_checked(&self.query("SHOW DATABASES")).await?;
        let databases = Self::parse_databases(&output.stdout);
        debug!(count = databases.len(), "Listed databases");
        Ok(databases)
    }

    async fn dump_database(&self, database: &str, dest: &Path) -> Result<(), ClientError> {
        tokio::fs::create_dir_all(dest)
            .await
            .map_err(|e| ClientError::Malformed(format!("create {}: {}", dest.display(), e)))?;
        self.runner
            .run_checked(&self.backup_command(database, dest))
            .await?;
        Ok(())
    }

    async fn restore_database(&self, database: &str, src: &Path) -> Result<(), ClientError> {
        self.runner
            .run_checked(&self.restore_command(database, src))
            .await?;
        Ok(())
    }

    /// pass when a query succeeds, fail when the server answers with an error
    async fn health(&self) -> Result<String, ClientError> {
        let probe = self.runner.clone().with_timeout(PROBE_TIMEOUT);
        match probe.run_checked(&self.query("SHOW DATABASES")).await {
            Ok(_) => Ok("pass".to_string()),
            Err(e @ CommandError::Failed { .. }) => match ClientError::from(e) {
                ClientError::Unreachable(reason) => Err(ClientError::Unreachable(reason)),
                other => {
                    debug!(error = %other, "Health query failed");
                    Ok("fail".to_string())
                }
            },
            Err(e) => Err(e.into()),
        }
    }
}
