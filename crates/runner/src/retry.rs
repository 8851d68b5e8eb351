//! Retry combinator — re-runs a fallible async operation under a fixed policy.
//!
//! The attempt counter lives only for one call to [`retry`]; nothing is shared
//! between invocations.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;

/// Cap on the doubling exponent so the multiplier cannot overflow.
const MAX_BACKOFF_EXPONENT: u32 = 16;

/// Wait between two consecutive attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayStrategy {
    /// Same delay after every failed attempt. No growth, no jitter.
    Fixed(Duration),
    /// `base * 2^(attempt - 1)`, capped at `max`.
    Exponential { base: Duration, max: Duration },
}

impl DelayStrategy {
    /// Delay to wait after the given (1-based) failed attempt.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        match *self {
            DelayStrategy::Fixed(delay) => delay,
            DelayStrategy::Exponential { base, max } => {
                let exp = attempt.saturating_sub(1).min(MAX_BACKOFF_EXPONENT);
                base.saturating_mul(2u32.saturating_pow(exp)).min(max)
            }
        }
    }
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum RetryPolicyError {
    #[error("max_attempts must be > 0 (got {0})")]
    InvalidMaxAttempts(u32),
}

/// Attempt limit plus delay strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    delay: DelayStrategy,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, delay: DelayStrategy) -> Result<Self, RetryPolicyError> {
        if max_attempts == 0 {
            return Err(RetryPolicyError::InvalidMaxAttempts(max_attempts));
        }
        Ok(Self {
            max_attempts,
            delay,
        })
    }

    /// `max_attempts` tries with a constant wait in between.
    pub fn fixed(max_attempts: u32, interval: Duration) -> Result<Self, RetryPolicyError> {
        Self::new(max_attempts, DelayStrategy::Fixed(interval))
    }

    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// Run `operation` until it succeeds or the policy's attempts are used up.
///
/// `operation` receives the 1-based attempt number. On exhaustion the error
/// from the last attempt is returned unchanged. There is no wait before the
/// first attempt or after the last one.
pub async fn retry<T, E, F, Fut>(policy: &RetryPolicy, mut operation: F) -> Result<T, E>
where
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut attempt = 1;

    loop {
        match operation(attempt).await {
            Ok(value) => {
                if attempt > 1 {
                    tracing::info!(attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt >= policy.max_attempts => {
                tracing::warn!(
                    attempts = attempt,
                    error = %e,
                    "Retry attempts exhausted"
                );
                return Err(e);
            }
            Err(e) => {
                let delay = policy.delay.delay_for(attempt);
                tracing::warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Attempt failed, retrying"
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Instant;

    use super::*;

    #[test]
    fn test_zero_attempts_rejected() {
        assert_eq!(
            RetryPolicy::fixed(0, Duration::ZERO),
            Err(RetryPolicyError::InvalidMaxAttempts(0))
        );
    }

    #[test]
    fn test_fixed_delay_does_not_grow() {
        let strategy = DelayStrategy::Fixed(Duration::from_secs(5));
        assert_eq!(strategy.delay_for(1), Duration::from_secs(5));
        assert_eq!(strategy.delay_for(2), Duration::from_secs(5));
        assert_eq!(strategy.delay_for(10), Duration::from_secs(5));
    }

    #[test]
    fn test_exponential_delay_doubles_and_caps() {
        let strategy = DelayStrategy::Exponential {
            base: Duration::from_secs(1),
            max: Duration::from_secs(10),
        };
        assert_eq!(strategy.delay_for(1), Duration::from_secs(1));
        assert_eq!(strategy.delay_for(2), Duration::from_secs(2));
        assert_eq!(strategy.delay_for(3), Duration::from_secs(4));
        assert_eq!(strategy.delay_for(5), Duration::from_secs(10));
        assert_eq!(strategy.delay_for(u32::MAX), Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_first_success_runs_once() {
        let policy = RetryPolicy::fixed(3, Duration::ZERO).unwrap();
        let calls = AtomicU32::new(0);

        let result: Result<&str, String> = retry(&policy, |_| {
            calls.fetch_add(1, Ordering::SeqCst);
            async { Ok("done") }
        })
        .await;

        assert_eq!(result, Ok("done"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_succeeds_on_third_attempt() {
        let policy = RetryPolicy::fixed(3, Duration::ZERO).unwrap();
        let mut seen = Vec::new();

        let result: Result<u32, String> = retry(&policy, |attempt| {
            seen.push(attempt);
            async move {
                if attempt < 3 {
                    Err(format!("failure {attempt}"))
                } else {
                    Ok(attempt)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(3));
        assert_eq!(seen, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_exhaustion_returns_last_error() {
        let policy = RetryPolicy::fixed(3, Duration::ZERO).unwrap();
        let calls = AtomicU32::new(0);

        let result: Result<(), String> = retry(&policy, |attempt| {
            calls.fetch_add(1, Ordering::SeqCst);
            async move { Err(format!("failure {attempt}")) }
        })
        .await;

        assert_eq!(result, Err("failure 3".to_string()));
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_waits_between_attempts_only() {
        let interval = Duration::from_millis(20);
        let policy = RetryPolicy::fixed(3, interval).unwrap();

        let started = Instant::now();
        let _: Result<(), &str> = retry(&policy, |_| async { Err("nope") }).await;

        // Two waits: after attempt 1 and after attempt 2.
        assert!(started.elapsed() >= interval * 2);
    }
}
