// Subprocess runner
// Spawns engine/cloud tools with an allowlisted environment, captures output,
// and escalates SIGTERM -> SIGKILL when a timeout is hit
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::{Duration, Instant};
use thiserror::Error;
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::{Child, Command};
use tokio::time::timeout;
use tracing::{debug, info, warn};

use crate::constants::{ENV_ALLOWLIST, GRACEFUL_SHUTDOWN_TIMEOUT};
use snapvault_core::port::ClientError;

#[derive(Error, Debug)]
pub enum CommandError {
    #[error("{program} not found on PATH")]
    NotFound { program: String },

    #[error("failed to spawn {program}: {reason}")]
    SpawnFailed { program: String, reason: String },

    #[error("{program} timed out after {}s", .after.as_secs())]
    Timeout { program: String, after: Duration },

    #[error("{program} exited with {exit_code:?}: {stderr}")]
    Failed {
        program: String,
        exit_code: Option<i32>,
        stderr: String,
    },

    #[error("I/O error running {program}: {reason}")]
    Io { program: String, reason: String },
}

/// One tool invocation
#[derive(Clone, PartialEq, Eq)]
pub struct CommandSpec {
    pub program: String,
    pub args: Vec<String>,
    /// Explicit variables (credentials); never logged
    pub env: HashMap<String, String>,
    pub current_dir: Option<PathBuf>,
}

impl CommandSpec {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            args: Vec::new(),
            env: HashMap::new(),
            current_dir: None,
        }
    }

    pub fn arg(mut self, arg: impl Into<String>) -> Self {
        self.args.push(arg.into());
        self
    }

    pub fn args<I, S>(mut self, args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.args.extend(args.into_iter().map(Into::into));
        self
    }

    pub fn env(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.env.insert(key.into(), value.into());
        self
    }

    /// Full command line; arguments only, env values stay out
    pub fn display(&self) -> String {
        std::iter::once(self.program.as_str())
            .chain(self.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Env keys only, so a spec can sit in test failure output
impl std::fmt::Debug for CommandSpec {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let mut env_keys: Vec<&String> = self.env.keys().collect();
        env_keys.sort();
        f.debug_struct("CommandSpec")
            .field("program", &self.program)
            .field("args", &self.args)
            .field("env_keys", &env_keys)
            .field("current_dir", &self.current_dir)
            .finish()
    }
}

#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == Some(0)
    }
}

/// Spawns child processes (one at a time per call; no shared state)
#[derive(Debug, Clone)]
pub struct SubprocessRunner {
    env_allowlist: Vec<String>,
    timeout: Option<Duration>,
}

impl Default for SubprocessRunner {
    fn default() -> Self {
        Self::new(ENV_ALLOWLIST.iter().map(|s| s.to_string()).collect())
    }
}

impl SubprocessRunner {
    pub fn new(env_allowlist: Vec<String>) -> Self {
        Self {
            env_allowlist,
            timeout: None,
        }
    }

    pub fn with_timeout(mut self, limit: Duration) -> Self {
        self.timeout = Some(limit);
        self
    }

    /// Inherited variables that survive the allowlist
    fn inherited_env(&self) -> HashMap<String, String> {
        self.env_allowlist
            .iter()
            .filter_map(|key| std::env::var(key).ok().map(|v| (key.clone(), v)))
            .collect()
    }

    /// Run to completion; a non-zero exit is returned, not an error
    pub async fn run(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        let started = Instant::now();
        info!(command = %spec.display(), timeout_ms = ?self.timeout.map(|t| t.as_millis() as u64), "Starting subprocess");

        let mut command = Command::new(&spec.program);
        command
            .args(&spec.args)
            .env_clear()
            .envs(self.inherited_env())
            .envs(&spec.env)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        if let Some(dir) = &spec.current_dir {
            command.current_dir(dir);
        }

        let mut child = command.spawn().map_err(|e| {
            if e.kind() == std::io::ErrorKind::NotFound {
                CommandError::NotFound {
                    program: spec.program.clone(),
                }
            } else {
                CommandError::SpawnFailed {
                    program: spec.program.clone(),
                    reason: e.to_string(),
                }
            }
        })?;

        let stdout = child.stdout.take();
        let stderr = child.stderr.take();
        let limit = self.timeout;
        let program = spec.program.as_str();

        let wait = async {
            match limit {
                Some(limit) => match timeout(limit, child.wait()).await {
                    Ok(status) => status.map(Some),
                    Err(_) => {
                        terminate(&mut child, program).await;
                        Ok(None)
                    }
                },
                None => child.wait().await.map(Some),
            }
        };
        let (status, stdout, stderr) = tokio::join!(wait, drain(stdout), drain(stderr));

        let io_error = |e: std::io::Error| CommandError::Io {
            program: spec.program.clone(),
            reason: e.to_string(),
        };
        let status = match status.map_err(io_error)? {
            Some(status) => status,
            None => {
                return Err(CommandError::Timeout {
                    program: spec.program.clone(),
                    after: limit.unwrap_or_default(),
                })
            }
        };

        let output = CommandOutput {
            exit_code: status.code(),
            stdout: String::from_utf8_lossy(&stdout.map_err(io_error)?).into_owned(),
            stderr: String::from_utf8_lossy(&stderr.map_err(io_error)?).into_owned(),
        };

        info!(
            command = %spec.program,
            duration_ms = started.elapsed().as_millis() as u64,
            exit_code = ?output.exit_code,
            "Subprocess completed"
        );
        Ok(output)
    }

    /// Run and require exit code 0
    pub async fn run_checked(&self, spec: &CommandSpec) -> Result<CommandOutput, CommandError> {
        let output = self.run(spec).await?;
        if output.success() {
            Ok(output)
        } else {
            Err(CommandError::Failed {
                program: spec.program.clone(),
                exit_code: output.exit_code,
                stderr: output.stderr.trim().to_string(),
            })
        }
    }
}

/// Tool stderr fragments meaning "the server never answered"
const UNREACHABLE_MARKERS: &[&str] = &[
    "connection refused",
    "could not connect",
    "unable to connect",
    "no route to host",
    "timeout expired",
];

/// Tool failure -> wire-client error at the adapter boundary
impl From<CommandError> for ClientError {
    fn from(err: CommandError) -> Self {
        match err {
            CommandError::Timeout { .. } => ClientError::Unreachable(err.to_string()),
            CommandError::Failed {
                ref program,
                ref stderr,
                ..
            } => {
                let lowered = stderr.to_lowercase();
                if UNREACHABLE_MARKERS.iter().any(|m| lowered.contains(m)) {
                    ClientError::Unreachable(err.to_string())
                } else {
                    ClientError::api(None, program.clone(), stderr.clone())
                }
            }
            CommandError::NotFound { ref program }
            | CommandError::SpawnFailed { ref program, .. }
            | CommandError::Io { ref program, .. } => {
                ClientError::api(None, program.clone(), err.to_string())
            }
        }
    }
}

async fn drain<R: AsyncRead + Unpin>(pipe: Option<R>) -> std::io::Result<Vec<u8>> {
    let mut buf = Vec::new();
    if let Some(mut pipe) = pipe {
        pipe.read_to_end(&mut buf).await?;
    }
    Ok(buf)
}

/// SIGTERM first, SIGKILL once the grace period runs out
async fn terminate(child: &mut Child, program: &str) {
    #[cfg(unix)]
    {
        use nix::sys::signal::{kill, Signal};
        use nix::unistd::Pid;

        if let Some(pid) = child.id() {
            info!(pid, program, "Sending SIGTERM to timed-out process");
            if kill(Pid::from_raw(pid as i32), Signal::SIGTERM).is_ok() {
                if timeout(GRACEFUL_SHUTDOWN_TIMEOUT, child.wait()).await.is_ok() {
                    debug!(pid, "Process exited after SIGTERM");
                    return;
                }
                warn!(pid, "Process did not exit after SIGTERM, sending SIGKILL");
            }
        }
    }

    if let Err(e) = child.kill().await {
        warn!(program, error = %e, "Failed to kill process");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_run_captures_stdout() {
        let runner = SubprocessRunner::default();
        let output = runner
            .run_checked(&CommandSpec::new("echo").arg("hello"))
            .await
            .unwrap();
        assert!(output.stdout.contains("hello"));
    }

    #[tokio::test]
    async fn test_non_zero_exit_is_output_until_checked() {
        let runner = SubprocessRunner::default();
        let spec = CommandSpec::new("sh").args(["-c", "echo oops >&2; exit 3"]);

        let output = runner.run(&spec).await.unwrap();
        assert_eq!(output.exit_code, Some(3));

        match runner.run_checked(&spec).await {
            Err(CommandError::Failed {
                exit_code, stderr, ..
            }) => {
                assert_eq!(exit_code, Some(3));
                assert_eq!(stderr, "oops");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_timeout_terminates_process() {
        let runner = SubprocessRunner::default().with_timeout(Duration::from_millis(100));
        let started = Instant::now();

        let result = runner.run(&CommandSpec::new("sleep").arg("10")).await;

        assert!(matches!(result, Err(CommandError::Timeout { .. })));
        assert!(started.elapsed() < Duration::from_secs(5));
    }

    #[tokio::test]
    async fn test_env_is_allowlisted_plus_explicit() {
        std::env::set_var("SNAPVAULT_TEST_BLOCKED", "leak");
        let runner = SubprocessRunner::new(vec!["PATH".to_string()]);
        let spec = CommandSpec::new("sh")
            .args(["-c", "echo \"${PGPASSWORD}:${SNAPVAULT_TEST_BLOCKED}\""])
            .env("PGPASSWORD", "pw");

        let output = runner.run_checked(&spec).await.unwrap();
        assert_eq!(output.stdout.trim(), "pw:");
    }

    #[tokio::test]
    async fn test_missing_program_is_not_found() {
        let runner = SubprocessRunner::default();
        let result = runner
            .run(&CommandSpec::new("snapvault-no-such-tool"))
            .await;
        assert!(matches!(result, Err(CommandError::NotFound { .. })));
    }

    #[test]
    fn test_connection_failures_map_to_unreachable() {
        let refused = CommandError::Failed {
            program: "pg_dump".into(),
            exit_code: Some(1),
            stderr: "pg_dump: error: connection to server failed: Connection refused".into(),
        };
        assert!(matches!(ClientError::from(refused), ClientError::Unreachable(_)));

        let denied = CommandError::Failed {
            program: "pg_dump".into(),
            exit_code: Some(1),
            stderr: "permission denied for table users".into(),
        };
        assert!(matches!(
            ClientError::from(denied),
            ClientError::Api { kind, .. } if kind == "pg_dump"
        ));
    }

    #[test]
    fn test_debug_hides_env_values() {
        let spec = CommandSpec::new("pg_dump").env("PGPASSWORD", "hunter2");
        let rendered = format!("{:?}", spec);
        assert!(rendered.contains("PGPASSWORD"));
        assert!(!rendered.contains("hunter2"));
    }
}
