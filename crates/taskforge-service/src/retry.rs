use std::fmt;
use std::future::Future;
use std::time::Duration;

use rand::Rng;
use taskforge_core::TaskforgeError;
use tracing::{info, warn};

use crate::sync::CancelToken;
use crate::traits::BackendError;

/// Bounded exponential backoff around one backend call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    pub base_delay: Duration,
    /// Upper bound of the random delay added to each backoff.
    pub max_jitter: Duration,
    /// Per-attempt limit; expiry counts as a transient failure.
    pub call_timeout: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_jitter: Duration::from_millis(250),
            call_timeout: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_jitter: Duration::ZERO,
            ..Self::default()
        }
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_retries + 1
    }

    /// Delay before retry number `retry` (0-based), without jitter.
    pub fn backoff(&self, retry: u32) -> Duration {
        self.base_delay.saturating_mul(2u32.saturating_pow(retry))
    }

    fn jitter(&self) -> Duration {
        let max = self.max_jitter.as_millis() as u64;
        if max == 0 {
            return Duration::ZERO;
        }
        Duration::from_millis(rand::thread_rng().gen_range(0..=max))
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryDecision {
    Stop,
    Retry,
    /// Retry, waiting at least this long.
    RetryAfter(Duration),
}

impl BackendError {
    pub fn retry_decision(&self) -> RetryDecision {
        match (self.is_transient(), self.retry_after()) {
            (false, _) => RetryDecision::Stop,
            (true, Some(wait)) => RetryDecision::RetryAfter(wait),
            (true, None) => RetryDecision::Retry,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// Classified as not worth retrying.
    Permanent(E),
    Exhausted { attempts: u32, last: String },
    /// The token was cancelled before another attempt could start.
    Cancelled { attempts: u32 },
}

impl From<RetryError<BackendError>> for TaskforgeError {
    fn from(err: RetryError<BackendError>) -> Self {
        match err {
            RetryError::Permanent(e) => e.into(),
            RetryError::Exhausted { attempts, last } => TaskforgeError::TransientFailure {
                attempts,
                message: last,
            },
            RetryError::Cancelled { attempts } => {
                TaskforgeError::Cancelled(format!("cancelled after {attempts} attempt(s)"))
            }
        }
    }
}

/// Run `op` until it succeeds, `classify` says stop, or attempts run out.
///
/// Each attempt is bounded by `policy.call_timeout`; a timed out attempt
/// is retried like any transient failure.
pub async fn run<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    operation: &str,
    classify: C,
    op: F,
) -> Result<T, RetryError<E>>
where
    E: fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> RetryDecision,
{
    run_until(policy, operation, &CancelToken::never(), classify, op).await
}

/// `run`, stopping once `cancel` fires. An attempt already in flight runs
/// to completion or timeout; no further attempt starts and a pending
/// backoff is cut short.
pub async fn run_until<T, E, F, Fut, C>(
    policy: &RetryPolicy,
    operation: &str,
    cancel: &CancelToken,
    classify: C,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> RetryDecision,
{
    let mut attempt = 0;
    loop {
        if cancel.is_cancelled() {
            info!(operation, attempts = attempt, "cancelled before attempt");
            return Err(RetryError::Cancelled { attempts: attempt });
        }
        attempt += 1;
        let (message, decision) = match tokio::time::timeout(policy.call_timeout, op()).await {
            Ok(Ok(value)) => return Ok(value),
            Ok(Err(err)) => match classify(&err) {
                RetryDecision::Stop => return Err(RetryError::Permanent(err)),
                decision => (err.to_string(), decision),
            },
            Err(_) => (
                format!("timed out after {}ms", policy.call_timeout.as_millis()),
                RetryDecision::Retry,
            ),
        };

        if attempt >= policy.max_attempts() {
            warn!(operation, attempts = attempt, error = %message, "giving up");
            return Err(RetryError::Exhausted {
                attempts: attempt,
                last: message,
            });
        }

        let mut delay = policy.backoff(attempt - 1) + policy.jitter();
        if let RetryDecision::RetryAfter(hint) = decision {
            delay = delay.max(hint);
        }
        warn!(
            operation,
            attempt,
            delay_ms = delay.as_millis() as u64,
            error = %message,
            "transient failure, retrying"
        );
        tokio::select! {
            _ = tokio::time::sleep(delay) => {}
            _ = cancel.cancelled() => {
                info!(operation, attempts = attempt, "cancelled during backoff");
                return Err(RetryError::Cancelled { attempts: attempt });
            }
        }
    }
}

/// `run` with the backend error classification, surfacing a `TaskforgeError`.
pub async fn run_backend<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    op: F,
) -> Result<T, TaskforgeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    run(policy, operation, BackendError::retry_decision, op)
        .await
        .map_err(TaskforgeError::from)
}

/// `run_backend` bounded by a cancel token.
pub async fn run_backend_until<T, F, Fut>(
    policy: &RetryPolicy,
    operation: &str,
    cancel: &CancelToken,
    op: F,
) -> Result<T, TaskforgeError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, BackendError>>,
{
    run_until(policy, operation, cancel, BackendError::retry_decision, op)
        .await
        .map_err(TaskforgeError::from)
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    use super::*;

    fn unavailable() -> BackendError {
        BackendError::Unavailable {
            status: 503,
            message: "service unavailable".into(),
        }
    }

    #[test]
    fn test_default_policy() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.max_attempts(), 4);
        assert_eq!(policy.backoff(0), Duration::from_secs(1));
        assert_eq!(policy.backoff(1), Duration::from_secs(2));
        assert_eq!(policy.backoff(2), Duration::from_secs(4));
    }

    #[tokio::test(start_paused = true)]
    async fn test_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let start = tokio::time::Instant::now();
        let value = run_backend(&RetryPolicy::default(), "test", || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(unavailable())
                } else {
                    Ok(42)
                }
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 42);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(3));
        assert!(elapsed <= Duration::from_millis(3_500));
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhaustion_reports_attempts() {
        let err = run_backend(&RetryPolicy::default(), "test", || async {
            Err::<(), _>(unavailable())
        })
        .await
        .unwrap_err();
        match err {
            TaskforgeError::TransientFailure { attempts, message } => {
                assert_eq!(attempts, 4);
                assert!(message.contains("503"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_validation_failure_not_retried() {
        let calls = AtomicU32::new(0);
        let err = run_backend(&RetryPolicy::default(), "test", || {
            calls.fetch_add(1, Ordering::SeqCst);
            async {
                Err::<(), _>(BackendError::Rejected {
                    status: 400,
                    message: "unknown column".into(),
                })
            }
        })
        .await
        .unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(err, TaskforgeError::ValidationRejected("unknown column".into()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_retry_after_extends_delay() {
        let calls = AtomicU32::new(0);
        let start = tokio::time::Instant::now();
        run_backend(&RetryPolicy::default(), "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    Err(BackendError::RateLimited {
                        retry_after_secs: Some(10),
                    })
                } else {
                    Ok(())
                }
            }
        })
        .await
        .unwrap();
        assert!(start.elapsed() >= Duration::from_secs(10));
        assert!(start.elapsed() < Duration::from_secs(11));
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_cuts_backoff_short() {
        let (handle, token) = CancelToken::pair();
        let calls = Arc::new(AtomicU32::new(0));
        let counter = calls.clone();
        let start = tokio::time::Instant::now();
        let task = tokio::spawn(async move {
            run_backend_until(&RetryPolicy::default(), "test", &token, || {
                counter.fetch_add(1, Ordering::SeqCst);
                async { Err::<(), _>(unavailable()) }
            })
            .await
        });

        tokio::time::sleep(Duration::from_millis(500)).await;
        handle.cancel();
        let err = task.await.unwrap().unwrap_err();

        assert_eq!(err, TaskforgeError::Cancelled("cancelled after 1 attempt(s)".into()));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(start.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_cancelled_token_starts_no_attempt() {
        let (handle, token) = CancelToken::pair();
        handle.cancel();
        let calls = AtomicU32::new(0);
        let err = run_backend_until(&RetryPolicy::default(), "test", &token, || {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok::<_, BackendError>(()) }
        })
        .await
        .unwrap_err();
        assert!(matches!(err, TaskforgeError::Cancelled(_)));
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_in_flight_attempt_finishes_after_cancel() {
        let (handle, token) = CancelToken::pair();
        let task = tokio::spawn(async move {
            run_backend_until(&RetryPolicy::default(), "test", &token, || async {
                tokio::time::sleep(Duration::from_secs(2)).await;
                Ok::<_, BackendError>("created")
            })
            .await
        });
        tokio::time::sleep(Duration::from_secs(1)).await;
        handle.cancel();
        assert_eq!(task.await.unwrap().unwrap(), "created");
    }

    #[tokio::test(start_paused = true)]
    async fn test_timeout_is_transient() {
        let calls = AtomicU32::new(0);
        let policy = RetryPolicy {
            call_timeout: Duration::from_secs(5),
            ..RetryPolicy::default()
        };
        let value = run_backend(&policy, "test", || {
            let n = calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if n == 0 {
                    tokio::time::sleep(Duration::from_secs(60)).await;
                }
                Ok::<_, BackendError>(n)
            }
        })
        .await
        .unwrap();
        assert_eq!(value, 1);
    }
}
