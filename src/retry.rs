//! Bounded retry with exponential backoff.
//!
//! Launch, liveness probes and navigation all go through
//! [`retry_with_backoff`]. The operation receives the caller's state by
//! `&mut` on every attempt, so an attempt can tear down and rebuild that
//! state (for example relaunch a browser) before trying again.

use std::time::Duration;

use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::context::OperationContext;
use crate::error::SpcError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    #[serde(with = "humantime_serde")]
    pub base_delay: Duration,
    pub multiplier: f64,
    #[serde(with = "humantime_serde")]
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::new(3, Duration::from_millis(500))
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay,
            multiplier: 2.0,
            max_delay: Duration::from_secs(10),
        }
    }

    /// Single attempt, no waiting.
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            base_delay: Duration::ZERO,
            multiplier: 1.0,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before attempt `failed + 1`, after `failed` failures (1-based).
    pub fn delay_after(&self, failed: u32) -> Duration {
        let exp = failed.saturating_sub(1).min(16) as i32;
        let secs = self.base_delay.as_secs_f64() * self.multiplier.max(1.0).powi(exp);
        Duration::from_secs_f64(secs.min(self.max_delay.as_secs_f64()))
    }
}

#[derive(Debug)]
pub enum RetryError {
    /// Every attempt failed with a retryable error.
    Exhausted { attempts: u32, last: SpcError },
    /// A non-retryable error (or cancellation) stopped the loop early.
    Aborted(SpcError),
}

impl RetryError {
    pub fn attempts(&self) -> Option<u32> {
        match self {
            RetryError::Exhausted { attempts, .. } => Some(*attempts),
            RetryError::Aborted(_) => None,
        }
    }

    pub fn into_inner(self) -> SpcError {
        match self {
            RetryError::Exhausted { last, .. } => last,
            RetryError::Aborted(err) => err,
        }
    }
}

/// Run `op` up to `policy.max_attempts` times, sleeping with backoff between
/// failures. Attempts are numbered from 1.
pub async fn retry_with_backoff<S, T, F>(
    policy: &RetryPolicy,
    ctx: &OperationContext,
    operation: &str,
    state: &mut S,
    mut op: F,
) -> Result<T, RetryError>
where
    S: Send,
    F: for<'a> FnMut(&'a mut S, u32) -> BoxFuture<'a, crate::Result<T>>,
{
    let max = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        if let Err(err) = ctx.check(operation) {
            return Err(RetryError::Aborted(err));
        }

        match op(state, attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(operation, attempt, "succeeded after retry");
                }
                return Ok(value);
            }
            Err(err) if !err.is_retryable() => return Err(RetryError::Aborted(err)),
            Err(err) if attempt >= max => {
                warn!(operation, attempts = attempt, error = %err, "retries exhausted");
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last: err,
                });
            }
            Err(err) => {
                let delay = policy.delay_after(attempt);
                warn!(
                    operation,
                    attempt,
                    max_attempts = max,
                    delay_ms = delay.as_millis() as u64,
                    error = %err,
                    "attempt failed; backing off"
                );
                ctx.sleep(operation, delay)
                    .await
                    .map_err(RetryError::Aborted)?;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fast(max_attempts: u32) -> RetryPolicy {
        RetryPolicy {
            max_attempts,
            base_delay: Duration::from_millis(1),
            multiplier: 2.0,
            max_delay: Duration::from_millis(5),
        }
    }

    #[test]
    fn delay_grows_and_caps() {
        let policy = RetryPolicy {
            max_attempts: 5,
            base_delay: Duration::from_millis(100),
            multiplier: 2.0,
            max_delay: Duration::from_millis(300),
        };
        assert_eq!(policy.delay_after(1), Duration::from_millis(100));
        assert_eq!(policy.delay_after(2), Duration::from_millis(200));
        assert_eq!(policy.delay_after(3), Duration::from_millis(300));
        assert_eq!(policy.delay_after(9), Duration::from_millis(300));
    }

    #[tokio::test]
    async fn succeeds_on_later_attempt_with_state() {
        let ctx = OperationContext::new();
        let mut calls: Vec<u32> = Vec::new();
        let out = retry_with_backoff(&fast(3), &ctx, "probe", &mut calls, |calls, attempt| {
            Box::pin(async move {
                calls.push(attempt);
                if attempt < 3 {
                    Err(SpcError::browser("flaky"))
                } else {
                    Ok(attempt * 10)
                }
            })
        })
        .await
        .expect("third attempt succeeds");
        assert_eq!(out, 30);
        assert_eq!(calls, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn exhausts_after_max_attempts() {
        let ctx = OperationContext::new();
        let mut count = 0u32;
        let err = retry_with_backoff(&fast(3), &ctx, "navigate", &mut count, |count, _| {
            Box::pin(async move {
                *count += 1;
                Err::<(), _>(SpcError::browser("net::ERR_FAILED"))
            })
        })
        .await
        .expect_err("always fails");
        assert_eq!(count, 3);
        assert_eq!(err.attempts(), Some(3));
        assert!(matches!(err.into_inner(), SpcError::Browser(_)));
    }

    #[tokio::test]
    async fn non_retryable_error_aborts_immediately() {
        let ctx = OperationContext::new();
        let mut count = 0u32;
        let err = retry_with_backoff(&fast(5), &ctx, "extract", &mut count, |count, _| {
            Box::pin(async move {
                *count += 1;
                Err::<(), _>(SpcError::SelectorNotFound("#missing".into()))
            })
        })
        .await
        .expect_err("aborts");
        assert_eq!(count, 1);
        assert!(matches!(err, RetryError::Aborted(SpcError::SelectorNotFound(_))));
    }

    #[tokio::test]
    async fn cancelled_context_never_runs_op() {
        let ctx = OperationContext::new();
        ctx.cancel();
        let mut count = 0u32;
        let res: std::result::Result<(), RetryError> =
            retry_with_backoff(&fast(3), &ctx, "launch", &mut count, |count, _| {
                Box::pin(async move {
                    *count += 1;
                    Ok(())
                })
            })
            .await;
        assert_eq!(count, 0);
        assert!(matches!(res, Err(RetryError::Aborted(SpcError::Cancelled(_)))));
    }
}
