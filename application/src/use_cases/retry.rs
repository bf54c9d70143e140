//! Timeout, exponential backoff and cancellation around external calls.

use crate::config::RetryPolicy;
use std::future::Future;
use std::time::Duration;
use thiserror::Error;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Port errors that know whether a retry can help.
pub trait Retryable: std::error::Error {
    /// Timeouts, rate limits and temporary unavailability.
    fn is_transient(&self) -> bool;

    /// The error reported when a single call exceeds its timeout.
    fn timed_out(after: Duration) -> Self;
}

#[derive(Error, Debug, Clone, PartialEq)]
pub enum RetryError<E> {
    #[error("Operation cancelled")]
    Cancelled,

    #[error("gave up after {attempts} attempts: {last}")]
    Exhausted { attempts: u32, last: E },

    #[error("{0}")]
    Permanent(E),
}

impl<E> RetryError<E> {
    pub fn is_cancelled(&self) -> bool {
        matches!(self, RetryError::Cancelled)
    }
}

/// Run `op` until it succeeds, fails permanently, runs out of retries or
/// the token is cancelled.
///
/// Each call is bounded by `policy.timeout`; a timeout counts as a
/// transient failure.
pub async fn call_with_retry<T, E, F, Fut>(
    policy: &RetryPolicy,
    token: &CancellationToken,
    label: &str,
    mut op: F,
) -> Result<T, RetryError<E>>
where
    E: Retryable,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt: u32 = 0;
    loop {
        if token.is_cancelled() {
            return Err(RetryError::Cancelled);
        }

        let result = tokio::select! {
            biased;
            _ = token.cancelled() => return Err(RetryError::Cancelled),
            r = tokio::time::timeout(policy.timeout, op()) => match r {
                Ok(r) => r,
                Err(_) => Err(E::timed_out(policy.timeout)),
            },
        };

        let error = match result {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_transient() => return Err(RetryError::Permanent(e)),
            Err(e) => e,
        };

        if attempt >= policy.max_retries {
            warn!("{} failed after {} attempts: {}", label, attempt + 1, error);
            return Err(RetryError::Exhausted {
                attempts: attempt + 1,
                last: error,
            });
        }

        let delay = policy.delay_for(attempt, &mut rand::thread_rng());
        debug!("{} failed ({}), retrying in {:?}", label, error, delay);
        tokio::select! {
            biased;
            _ = token.cancelled() => return Err(RetryError::Cancelled),
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Error, Debug, Clone, PartialEq)]
    enum FakeError {
        #[error("busy")]
        Busy,
        #[error("bad request")]
        Bad,
        #[error("timeout")]
        Timeout,
    }

    impl Retryable for FakeError {
        fn is_transient(&self) -> bool {
            !matches!(self, FakeError::Bad)
        }

        fn timed_out(_after: Duration) -> Self {
            FakeError::Timeout
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy::default()
            .with_base_delay(Duration::from_millis(1))
            .with_timeout(Duration::from_millis(200))
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result = call_with_retry(&fast_policy(), &CancellationToken::new(), "test", || {
            let c = c.clone();
            async move {
                if c.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(FakeError::Busy)
                } else {
                    Ok("done")
                }
            }
        })
        .await;
        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_reports_attempts() {
        let result: Result<(), _> =
            call_with_retry(&fast_policy().with_max_retries(2), &CancellationToken::new(), "test", || async {
                Err(FakeError::Busy)
            })
            .await;
        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 3,
                last: FakeError::Busy
            })
        );
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let calls = Arc::new(AtomicU32::new(0));
        let c = calls.clone();
        let result: Result<(), _> = call_with_retry(&fast_policy(), &CancellationToken::new(), "test", || {
            c.fetch_add(1, Ordering::SeqCst);
            async { Err(FakeError::Bad) }
        })
        .await;
        assert_eq!(result, Err(RetryError::Permanent(FakeError::Bad)));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_timeout_counts_as_transient() {
        let policy = fast_policy().with_max_retries(0).with_timeout(Duration::from_millis(10));
        let result: Result<(), _> = call_with_retry(&policy, &CancellationToken::new(), "test", || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert_eq!(
            result,
            Err(RetryError::Exhausted {
                attempts: 1,
                last: FakeError::Timeout
            })
        );
    }

    #[tokio::test]
    async fn test_cancellation_stops_waiting() {
        let token = CancellationToken::new();
        let t = token.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            t.cancel();
        });
        let policy = fast_policy().with_timeout(Duration::from_secs(10));
        let result: Result<(), RetryError<FakeError>> = call_with_retry(&policy, &token, "test", || async {
            tokio::time::sleep(Duration::from_secs(5)).await;
            Ok(())
        })
        .await;
        assert!(result.unwrap_err().is_cancelled());
    }
}
