use std::thread;
use std::time::Duration;

use crate::error::{StoreError, StoreResult};

/// Bounded retry for block store operations.
///
/// An operation is attempted up to `num_retries + 1` times. Only retryable
/// errors (see [`StoreError::is_retryable`]) trigger another attempt; the
/// delay before attempt `n + 1` is `backoff * n`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Extra attempts after the first one fails.
    pub num_retries: u32,
    /// Base delay between attempts (linear backoff).
    pub backoff: Duration,
}

impl RetryPolicy {
    pub fn new(num_retries: u32, backoff: Duration) -> Self {
        Self {
            num_retries,
            backoff,
        }
    }

    /// A policy that never retries.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO)
    }

    /// Total attempts this policy allows.
    pub fn max_attempts(&self) -> u32 {
        self.num_retries.saturating_add(1)
    }

    /// Run `op` until it succeeds, fails with a non-retryable error, or the
    /// attempt budget is spent.
    ///
    /// When at least one retry happened and the last error was still
    /// retryable, it is wrapped in [`StoreError::RetriesExhausted`].
    pub fn run<T, F>(&self, what: &str, mut op: F) -> StoreResult<T>
    where
        F: FnMut() -> StoreResult<T>,
    {
        let mut attempt = 0;
        loop {
            attempt += 1;
            match op() {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts() => {
                    tracing::warn!(
                        what,
                        attempt,
                        max_attempts = self.max_attempts(),
                        error = %err,
                        "block store operation failed, retrying"
                    );
                    self.sleep_for(attempt);
                }
                Err(err) if err.is_retryable() && attempt > 1 => {
                    return Err(StoreError::RetriesExhausted {
                        attempts: attempt,
                        last: Box::new(err),
                    });
                }
                Err(err) => return Err(err),
            }
        }
    }

    fn sleep_for(&self, attempt: u32) {
        if self.backoff.is_zero() {
            return;
        }
        thread::sleep(self.backoff * attempt);
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::none()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use keep_types::Locator;

    /// Fails with `Transient` for the first `failures` calls.
    fn flaky(failures: u32) -> impl FnMut() -> StoreResult<u32> {
        let mut calls = 0;
        move || {
            calls += 1;
            if calls <= failures {
                Err(StoreError::Transient(format!("call {calls}")))
            } else {
                Ok(calls)
            }
        }
    }

    #[test]
    fn no_retry_returns_first_error_unwrapped() {
        let policy = RetryPolicy::none();
        let err = policy.run("get", flaky(1)).unwrap_err();
        assert!(matches!(err, StoreError::Transient(_)));
    }

    #[test]
    fn succeeds_within_budget() {
        let policy = RetryPolicy::new(2, Duration::ZERO);
        assert_eq!(policy.run("get", flaky(2)).unwrap(), 3);
    }

    #[test]
    fn exhausting_budget_wraps_last_error() {
        let policy = RetryPolicy::new(2, Duration::ZERO);
        match policy.run("get", flaky(5)).unwrap_err() {
            StoreError::RetriesExhausted { attempts, last } => {
                assert_eq!(attempts, 3);
                assert_eq!(last.to_string(), "transient backend failure: call 3");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn non_retryable_error_stops_immediately() {
        let policy = RetryPolicy::new(5, Duration::ZERO);
        let mut calls = 0;
        let err = policy
            .run("get", || -> StoreResult<()> {
                calls += 1;
                Err(StoreError::NotFound(Locator::empty()))
            })
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound(_)));
        assert_eq!(calls, 1);
    }

    #[test]
    fn backoff_sleeps_between_attempts() {
        let policy = RetryPolicy::new(2, Duration::from_millis(5));
        let started = std::time::Instant::now();
        policy.run("get", flaky(2)).unwrap();
        // 5ms after the first attempt, 10ms after the second
        assert!(started.elapsed() >= Duration::from_millis(15));
    }
}
