//! # Retry Module
//!
//! Fixed-interval retry for operations against a backend that may be
//! unavailable for an unknown length of time.
//!
//! Every failed attempt is logged at `warn` with the operation name and the
//! attempt number; the stream of warnings is the liveness signal while the
//! backend is down. There is no backoff growth and, by default, no cap.

use std::fmt::Display;
use std::future::Future;
use std::time::Duration;
use tracing::warn;

#[cfg(test)]
#[path = "retry_tests.rs"]
mod tests;

/// Retry policy with a constant delay between attempts
///
/// # Examples
///
/// ```rust
/// use counter_relay_core::retry::RetryPolicy;
/// use std::time::Duration;
///
/// // Default policy: retry forever, once per second
/// let policy = RetryPolicy::default();
/// assert_eq!(policy.interval, Duration::from_secs(1));
/// assert_eq!(policy.max_attempts, None);
///
/// // Bounded policy for one-shot tools and tests
/// let policy = RetryPolicy::new(Duration::from_millis(250)).with_max_attempts(3);
/// assert!(policy.should_retry(2));
/// assert!(!policy.should_retry(3));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay between a failed attempt and the next one
    pub interval: Duration,

    /// Total attempts allowed; `None` retries forever
    pub max_attempts: Option<u32>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(1),
            max_attempts: None,
        }
    }
}

impl RetryPolicy {
    /// Create an unbounded policy with the given interval
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            max_attempts: None,
        }
    }

    pub fn from_millis(interval_ms: u64) -> Self {
        Self::new(Duration::from_millis(interval_ms))
    }

    /// Stop after `max_attempts` attempts in total
    pub fn with_max_attempts(mut self, max_attempts: u32) -> Self {
        self.max_attempts = Some(max_attempts);
        self
    }

    /// Check whether another attempt is allowed after `attempts_made` failures
    pub fn should_retry(&self, attempts_made: u32) -> bool {
        match self.max_attempts {
            Some(max) => attempts_made < max,
            None => true,
        }
    }
}

/// Outcome of a retried operation that did not succeed
#[derive(Debug, thiserror::Error)]
pub enum RetryError<E> {
    /// The policy ran out of attempts
    #[error("gave up after {attempts} attempts: {last_error}")]
    Exhausted { attempts: u32, last_error: E },

    /// The error was not worth retrying
    #[error("failed permanently on attempt {attempts}: {error}")]
    Aborted { attempts: u32, error: E },
}

impl<E> RetryError<E> {
    /// The error from the last attempt
    pub fn into_inner(self) -> E {
        match self {
            Self::Exhausted { last_error, .. } => last_error,
            Self::Aborted { error, .. } => error,
        }
    }
}

/// Run `operation` until it succeeds or the policy runs out of attempts
///
/// The closure receives the 1-based attempt number.
pub async fn retry_with_fixed_delay<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    operation: F,
) -> Result<T, RetryError<E>>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    retry_if(policy, operation_name, |_| true, operation).await
}

/// Like [`retry_with_fixed_delay`], but stops at the first error for which
/// `is_retryable` returns `false`
pub async fn retry_if<T, E, F, Fut, P>(
    policy: &RetryPolicy,
    operation_name: &str,
    is_retryable: P,
    mut operation: F,
) -> Result<T, RetryError<E>>
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(value) => return Ok(value),
            Err(error) if !is_retryable(&error) => {
                return Err(RetryError::Aborted {
                    attempts: attempt,
                    error,
                });
            }
            Err(error) if !policy.should_retry(attempt) => {
                warn!(
                    operation = operation_name,
                    attempt,
                    error = %error,
                    "Operation failed, giving up"
                );
                return Err(RetryError::Exhausted {
                    attempts: attempt,
                    last_error: error,
                });
            }
            Err(error) => {
                warn!(
                    operation = operation_name,
                    attempt,
                    retry_in_ms = policy.interval.as_millis() as u64,
                    error = %error,
                    "Operation failed, retrying"
                );
                tokio::time::sleep(policy.interval).await;
            }
        }
    }
}

/// Run `operation` until it succeeds, ignoring any attempt cap in `policy`
pub async fn retry_forever<T, E, F, Fut>(
    policy: &RetryPolicy,
    operation_name: &str,
    mut operation: F,
) -> T
where
    E: Display,
    F: FnMut(u32) -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;
    loop {
        attempt += 1;
        match operation(attempt).await {
            Ok(value) => return value,
            Err(error) => {
                warn!(
                    operation = operation_name,
                    attempt,
                    retry_in_ms = policy.interval.as_millis() as u64,
                    error = %error,
                    "Operation failed, retrying"
                );
                tokio::time::sleep(policy.interval).await;
            }
        }
    }
}
