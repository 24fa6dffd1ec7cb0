//! Retry Policy
//!
//! Fixed-delay, bounded-attempt retries with a failure-class predicate. Two
//! predicates are used across the providers: [`transport_retryable`] for the
//! HTTP call itself (5xx / 429) and [`session_retryable`] layered around
//! session-expiry detection. No exponential growth, no jitter: the original
//! contract is at most `max_attempts` attempts with the same delay between
//! them, and [`Error::RetryExhausted`] wrapping the last failure.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

use crate::errors::Error;

/// Default attempt budget (total attempts, not retries)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;
/// Default fixed delay between attempts
pub const DEFAULT_RETRY_DELAY: Duration = Duration::from_secs(1);

/// Fixed-delay retry policy shared by all providers
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts before giving up
    pub max_attempts: u32,
    /// Fixed delay between attempts
    pub delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            delay: DEFAULT_RETRY_DELAY,
        }
    }
}

impl RetryPolicy {
    /// Run `attempt` up to `max_attempts` times, sleeping the fixed delay
    /// between attempts that failed with a retryable error.
    ///
    /// Non-retryable errors propagate on first occurrence. When the budget is
    /// exhausted the last failure is wrapped in [`Error::RetryExhausted`]
    /// carrying `operation` for diagnostics.
    pub async fn run<T, F, Fut, P>(
        &self,
        operation: &str,
        retryable: P,
        mut attempt: F
    ) -> Result<T, Error>
        where F: FnMut() -> Fut, Fut: Future<Output = Result<T, Error>>, P: Fn(&Error) -> bool
    {
        let mut attempts_made = 0u32;
        loop {
            attempts_made += 1;
            match attempt().await {
                Ok(value) => {
                    return Ok(value);
                }
                Err(e) if !retryable(&e) => {
                    return Err(e);
                }
                Err(e) if attempts_made >= self.max_attempts => {
                    return Err(Error::RetryExhausted {
                        operation: operation.to_string(),
                        attempts: self.max_attempts,
                        cause: Box::new(e),
                    });
                }
                Err(e) => {
                    warn!(
                        "{operation} failed (attempt {attempts_made}/{}): {e}; retrying in {:?}",
                        self.max_attempts,
                        self.delay
                    );
                    tokio::time::sleep(self.delay).await;
                }
            }
        }
    }
}

/// Retry iff the failure is an HTTP 5xx or 429 response.
///
/// Connection-level failures ([`Error::Http`]) are NOT retried, matching the
/// original clients' status-code-only filter.
pub fn transport_retryable(error: &Error) -> bool {
    match error {
        Error::Transport { status: Some(status), .. } => {
            *status == 429 || (500..=599).contains(status)
        }
        _ => false,
    }
}

/// Retry iff the failure is a detected session expiry
pub fn session_retryable(error: &Error) -> bool {
    matches!(error, Error::SessionExpired(_))
}
