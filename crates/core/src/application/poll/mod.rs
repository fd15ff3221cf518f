//! Retry/Poll Engine
//!
//! Two primitives drive every wait for an asynchronous engine transition:
//! - [`poll_until`]: repeat a status/health probe at a fixed interval until it
//!   reports ready. With an unbounded policy it never times out; only the
//!   cancel token ends it early.
//! - [`retry_until`]: repeat an action at a fixed interval until it succeeds or
//!   the elapsed-time deadline passes, reported as `DeadlineExceeded`.
//!
//! Cancellation is checked before every attempt and raced against every sleep.

mod cancel;
pub mod constants;

pub use cancel::{cancel_channel, CancelHandle, CancelToken};

use crate::error::{AppError, Result};
use constants::{DEFAULT_POLL_INTERVAL, DEFAULT_RETRY_DEADLINE};
use std::future::Future;
use std::time::Duration;
use tokio::time::{sleep, Instant};
use tracing::{debug, info, warn};

/// When a polling call site gives up
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Deadline {
    Unbounded,
    After(Duration),
}

/// Interval and deadline for one polling call site
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub interval: Duration,
    pub deadline: Deadline,
}

impl RetryPolicy {
    pub const fn unbounded(interval: Duration) -> Self {
        Self {
            interval,
            deadline: Deadline::Unbounded,
        }
    }

    pub const fn bounded(interval: Duration, deadline: Duration) -> Self {
        Self {
            interval,
            deadline: Deadline::After(deadline),
        }
    }

    /// 30s interval, never times out
    pub const fn default_unbounded() -> Self {
        Self::unbounded(DEFAULT_POLL_INTERVAL)
    }

    /// 30s interval, 120s deadline
    pub const fn default_bounded() -> Self {
        Self::bounded(DEFAULT_POLL_INTERVAL, DEFAULT_RETRY_DEADLINE)
    }
}

/// Result of one probe inside [`poll_until`]
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Probe<T> {
    Ready(T),
    /// Not there yet; the note is logged and kept as the last observation
    Pending(String),
}

/// Failed attempt inside [`retry_until`]
#[derive(Debug)]
pub enum Attempt {
    /// Try again after the interval
    Retry(String),
    /// Stop retrying and fail with this error
    Abort(AppError),
}

/// Unbounded (or policy-bounded) poll
///
/// A probe error aborts the poll immediately.
pub async fn poll_until<T, F, Fut>(
    label: &str,
    policy: &RetryPolicy,
    cancel: &CancelToken,
    mut probe: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<Probe<T>>>,
{
    drive(label, policy, cancel, || {
        let attempt = probe();
        async move {
            match attempt.await {
                Ok(Probe::Ready(value)) => Ok(value),
                Ok(Probe::Pending(note)) => Err(Attempt::Retry(note)),
                Err(err) => Err(Attempt::Abort(err)),
            }
        }
    })
    .await
}

/// Bounded retry
///
/// A policy without a deadline makes this retry until success or cancellation.
pub async fn retry_until<T, F, Fut>(
    label: &str,
    policy: &RetryPolicy,
    cancel: &CancelToken,
    action: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, Attempt>>,
{
    drive(label, policy, cancel, action).await
}

async fn drive<T, F, Fut>(
    label: &str,
    policy: &RetryPolicy,
    cancel: &CancelToken,
    mut action: F,
) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, Attempt>>,
{
    let started = Instant::now();
    let mut attempts: u32 = 0;
    let mut waiter = cancel.clone();

    loop {
        if cancel.is_cancelled() {
            info!(label, attempts, "Poll cancelled before attempt");
            return Err(AppError::Cancelled);
        }

        attempts += 1;
        let last_failure = match action().await {
            Ok(value) => {
                info!(
                    label,
                    attempts,
                    elapsed_ms = started.elapsed().as_millis() as u64,
                    "Poll completed"
                );
                return Ok(value);
            }
            Err(Attempt::Abort(err)) => {
                warn!(label, attempts, error = %err, "Poll aborted");
                return Err(err);
            }
            Err(Attempt::Retry(note)) => note,
        };

        if let Deadline::After(limit) = policy.deadline {
            let waited = started.elapsed();
            if waited >= limit {
                warn!(
                    label,
                    attempts,
                    waited_ms = waited.as_millis() as u64,
                    last_failure = %last_failure,
                    "Deadline exceeded"
                );
                return Err(AppError::DeadlineExceeded {
                    waited,
                    last_failure,
                });
            }
        }

        debug!(
            label,
            attempts,
            note = %last_failure,
            interval_ms = policy.interval.as_millis() as u64,
            "Not ready, waiting for next interval"
        );

        tokio::select! {
            _ = sleep(policy.interval) => {},
            _ = waiter.cancelled() => {
                info!(label, attempts, "Poll interrupted during interval");
                return Err(AppError::Cancelled);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    const INTERVAL: Duration = Duration::from_secs(30);
    const DEADLINE: Duration = Duration::from_secs(120);

    #[tokio::test(start_paused = true)]
    async fn test_poll_returns_when_ready() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let start = Instant::now();

        let value = poll_until(
            "status",
            &RetryPolicy::unbounded(INTERVAL),
            &CancelToken::never(),
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    if n < 3 {
                        Ok(Probe::Pending(format!("attempt {}", n)))
                    } else {
                        Ok(Probe::Ready(n))
                    }
                }
            },
        )
        .await
        .unwrap();

        assert_eq!(value, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(start.elapsed(), INTERVAL * 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_retry_deadline_window() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let start = Instant::now();

        let err = retry_until(
            "dump",
            &RetryPolicy::bounded(INTERVAL, DEADLINE),
            &CancelToken::never(),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(Attempt::Retry("connection refused".into())) }
            },
        )
        .await
        .unwrap_err();

        let elapsed = start.elapsed();
        assert!(elapsed >= DEADLINE);
        assert!(elapsed <= DEADLINE + INTERVAL);
        match err {
            AppError::DeadlineExceeded { last_failure, .. } => {
                assert_eq!(last_failure, "connection refused")
            }
            other => panic!("expected DeadlineExceeded, got {:?}", other),
        }
        // t = 0, 30, 60, 90, 120
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_poll_honours_deadline() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let start = Instant::now();

        let err = poll_until(
            "status",
            &RetryPolicy::bounded(INTERVAL, DEADLINE),
            &CancelToken::never(),
            move || {
                let n = counter.fetch_add(1, Ordering::SeqCst) + 1;
                async move {
                    Ok::<Probe<()>, AppError>(Probe::Pending(format!("IN_PROGRESS #{}", n)))
                }
            },
        )
        .await
        .unwrap_err();

        let elapsed = start.elapsed();
        assert!(elapsed >= DEADLINE);
        assert!(elapsed <= DEADLINE + INTERVAL);
        match err {
            AppError::DeadlineExceeded { last_failure, .. } => {
                assert_eq!(last_failure, "IN_PROGRESS #5")
            }
            other => panic!("expected DeadlineExceeded, got {:?}", other),
        }
        assert_eq!(calls.load(Ordering::SeqCst), 5);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded_retry_abort_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let err = retry_until(
            "restore",
            &RetryPolicy::bounded(INTERVAL, DEADLINE),
            &CancelToken::never(),
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(Attempt::Abort(AppError::EngineRejected("denied".into()))) }
            },
        )
        .await
        .unwrap_err();

        assert!(matches!(err, AppError::EngineRejected(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unbounded_poll_never_times_out_until_cancelled() {
        let (handle, token) = cancel_channel();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let task = tokio::spawn(async move {
            poll_until(
                "health",
                &RetryPolicy::unbounded(INTERVAL),
                &token,
                move || {
                    counter.fetch_add(1, Ordering::SeqCst);
                    async { Ok::<Probe<()>, AppError>(Probe::Pending("degraded".into())) }
                },
            )
            .await
        });

        // Far beyond any bounded deadline
        tokio::time::sleep(Duration::from_secs(24 * 3600)).await;
        assert!(!task.is_finished());
        assert!(calls.load(Ordering::SeqCst) > 2000);

        handle.cancel();
        let result = task.await.unwrap();
        assert!(matches!(result, Err(AppError::Cancelled)));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_before_first_attempt_skips_action() {
        let (handle, token) = cancel_channel();
        handle.cancel();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();

        let result = retry_until(
            "backup",
            &RetryPolicy::default_bounded(),
            &token,
            move || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Ok::<(), Attempt>(()) }
            },
        )
        .await;

        assert!(matches!(result, Err(AppError::Cancelled)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_probe_error_aborts_poll() {
        let result: Result<()> = poll_until(
            "status",
            &RetryPolicy::default_unbounded(),
            &CancelToken::never(),
            || async { Err(AppError::EngineRejected("snapshot FAILED".into())) },
        )
        .await;

        assert!(matches!(result, Err(AppError::EngineRejected(_))));
    }
}
