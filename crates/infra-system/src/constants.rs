// Subprocess constants (no magic values)

use std::time::Duration;

/// Inherited environment passed to every tool; everything else is cleared
pub const ENV_ALLOWLIST: &[&str] = &["PATH", "HOME", "USER", "LANG", "TZ", "TMPDIR"];

/// Grace period between SIGTERM and SIGKILL for a timed-out tool
pub const GRACEFUL_SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Upper bound on a single health/readiness probe invocation
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(30);

/// Default time-series backup/restore RPC port
pub const INFLUX_BACKUP_PORT: u16 = 8088;

/// Default time-series HTTP API port
pub const INFLUX_HTTP_PORT: u16 = 8086;

/// Default relational server port
pub const POSTGRES_PORT: u16 = 5432;
