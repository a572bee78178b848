//! Bounded retry with exponential backoff.
//!
//! The policy is applied explicitly at each call site: the caller passes the
//! operation and a classifier deciding which errors are worth another attempt.

use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

use crate::common::constants::{
    BACKOFF_BASE_MS, BACKOFF_CAP_MS, BACKOFF_MULTIPLIER, MAX_FETCH_ATTEMPTS,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts, including the first one
    pub max_attempts: u32,
    pub base: Duration,
    pub multiplier: u32,
    pub cap: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: MAX_FETCH_ATTEMPTS,
            base: Duration::from_millis(BACKOFF_BASE_MS),
            multiplier: BACKOFF_MULTIPLIER,
            cap: Duration::from_millis(BACKOFF_CAP_MS),
        }
    }
}

impl RetryPolicy {
    /// Same attempt budget, no waiting between attempts
    pub fn immediate(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            base: Duration::ZERO,
            multiplier: BACKOFF_MULTIPLIER,
            cap: Duration::ZERO,
        }
    }

    /// Delay to wait after the `failed_attempt`-th failure (1-based).
    pub fn backoff(&self, failed_attempt: u32) -> Duration {
        let exponent = failed_attempt.saturating_sub(1);
        let factor = self.multiplier.checked_pow(exponent).unwrap_or(u32::MAX);
        self.base.saturating_mul(factor).min(self.cap)
    }
}

/// Successful value together with the number of attempts it took
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Attempted<T> {
    pub value: T,
    pub attempts: u32,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryError<E> {
    /// The classifier rejected the error; no further attempts were made
    Permanent { error: E, attempts: u32 },
    /// Every attempt failed with a retryable error
    Exhausted { error: E, attempts: u32 },
}

impl<E> RetryError<E> {
    pub fn attempts(&self) -> u32 {
        match self {
            RetryError::Permanent { attempts, .. } | RetryError::Exhausted { attempts, .. } => {
                *attempts
            }
        }
    }

    pub fn into_inner(self) -> E {
        match self {
            RetryError::Permanent { error, .. } | RetryError::Exhausted { error, .. } => error,
        }
    }
}

/// Run `op` until it succeeds, the classifier rejects its error, or the budget runs out.
pub async fn retry<T, E, Op, Fut, C>(
    policy: &RetryPolicy,
    is_retryable: C,
    mut op: Op,
) -> Result<Attempted<T>, RetryError<E>>
where
    Op: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    C: Fn(&E) -> bool,
    E: std::fmt::Display,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        match op(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    debug!("Succeeded on attempt {}/{}", attempt, max_attempts);
                }
                return Ok(Attempted { value, attempts: attempt });
            }
            Err(error) if !is_retryable(&error) => {
                debug!("Non-retryable error on attempt {}: {}", attempt, error);
                return Err(RetryError::Permanent { error, attempts: attempt });
            }
            Err(error) if attempt >= max_attempts => {
                return Err(RetryError::Exhausted { error, attempts: attempt });
            }
            Err(error) => {
                let delay = policy.backoff(attempt);
                warn!(
                    "Attempt {}/{} failed: {}; retrying in {:?}",
                    attempt, max_attempts, error, delay
                );
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn test_default_backoff_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_secs(1));
        assert_eq!(policy.backoff(2), Duration::from_secs(2));
        assert_eq!(policy.backoff(3), Duration::from_secs(4));
        assert_eq!(policy.backoff(4), Duration::from_secs(8));
        assert_eq!(policy.backoff(5), Duration::from_secs(10));
        assert_eq!(policy.backoff(40), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let calls = AtomicU32::new(0);
        let result = retry(&RetryPolicy::immediate(3), |_: &String| true, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move {
                if attempt < 3 {
                    Err(format!("flaky {attempt}"))
                } else {
                    Ok("done")
                }
            }
        })
        .await
        .unwrap();

        assert_eq!(result.value, "done");
        assert_eq!(result.attempts, 3);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_non_retryable_stops_immediately() {
        let calls = AtomicU32::new(0);
        let result: Result<Attempted<()>, _> =
            retry(&RetryPolicy::immediate(3), |_: &String| false, |_| {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err("not found".to_string()) }
            })
            .await;

        assert_eq!(
            result.unwrap_err(),
            RetryError::Permanent { error: "not found".to_string(), attempts: 1 }
        );
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_exhausted_keeps_last_error() {
        let result: Result<Attempted<()>, _> =
            retry(&RetryPolicy::immediate(3), |_: &String| true, |attempt| async move {
                Err(format!("failure {attempt}"))
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts(), 3);
        assert!(matches!(&err, RetryError::Exhausted { .. }));
        assert_eq!(err.into_inner(), "failure 3");
    }

    #[tokio::test]
    async fn test_classifier_can_reject_after_transient_failures() {
        let result: Result<Attempted<()>, _> = retry(
            &RetryPolicy::immediate(3),
            |e: &u16| *e == 503,
            |attempt| async move { Err(if attempt == 1 { 503 } else { 404 }) },
        )
        .await;

        assert_eq!(result.unwrap_err(), RetryError::Permanent { error: 404, attempts: 2 });
    }
}
