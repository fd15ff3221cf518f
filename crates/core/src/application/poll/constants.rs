// Poll engine constants (No magic values)
use std::time::Duration;

/// Interval between health/status checks and between retries (30s)
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Elapsed-time budget for bounded retry of blocking operations (120s)
pub const DEFAULT_RETRY_DEADLINE: Duration = Duration::from_secs(120);
