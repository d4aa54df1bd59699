//! Bounded exponential backoff for throttled directory calls

use std::future::Future;
use std::time::Duration;

use log::warn;
use tokio_util::sync::CancellationToken;

use crate::aws::{DirectoryError, DirectoryResult};

/// Backoff schedule: `base_delay * factor^(attempt - 1)` between attempts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub base_delay: Duration,
    pub factor: u32,
    /// Total attempts, including the first one.
    pub max_attempts: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(200),
            factor: 2,
            max_attempts: 5,
        }
    }
}

impl RetryPolicy {
    /// Delay to wait after failed attempt number `attempt` (1-based).
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let multiplier = self
            .factor
            .saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(multiplier)
    }
}

#[derive(Debug)]
pub(crate) enum RetryError {
    /// Still throttled on the last allowed attempt.
    Exhausted {
        operation: &'static str,
        attempts: u32,
    },
    Permanent(DirectoryError),
    Cancelled,
}

/// Run `call` until it succeeds, fails permanently, exhausts the policy, or
/// `cancel` fires. Only [`DirectoryError::is_transient`] errors are retried.
pub(crate) async fn with_backoff<T, F, Fut>(
    policy: &RetryPolicy,
    cancel: &CancellationToken,
    mut call: F,
) -> Result<T, RetryError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = DirectoryResult<T>>,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let result = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(RetryError::Cancelled),
            result = call() => result,
        };

        let err = match result {
            Ok(value) => return Ok(value),
            Err(err) if err.is_transient() => err,
            Err(err) => return Err(RetryError::Permanent(err)),
        };

        if attempt >= max_attempts {
            return Err(RetryError::Exhausted {
                operation: err.operation(),
                attempts: attempt,
            });
        }

        let delay = policy.delay_after(attempt);
        warn!(
            "{} throttled (attempt {attempt}/{max_attempts}), retrying in {delay:?}",
            err.operation()
        );
        tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(RetryError::Cancelled),
            () = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}
