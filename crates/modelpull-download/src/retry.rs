//! Bounded exponential-backoff retry.
//!
//! Wraps one attempt-scoped operation. Retryable failures (see
//! [`DownloadError::is_retryable`]) sleep `base_delay * 2^(attempt-1)` and run
//! the operation again; fatal failures and exhaustion propagate the error.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use modelpull_core::DownloadError;

/// Upper bound on a single backoff sleep.
const MAX_DELAY: Duration = Duration::from_secs(300);

/// Information about the attempt being made, handed to the operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryAttempt {
    /// 1-based attempt number.
    pub attempt_number: u32,
    /// Delay that will follow if this attempt fails retryably
    /// (`None` on the last attempt).
    pub next_delay: Option<Duration>,
}

/// Retry schedule for one fetch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
}

impl RetryPolicy {
    /// Create a policy. `max_attempts` counts the first attempt and is at least 1.
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Delay after failed attempt `attempt` (1-based): `base * 2^(attempt-1)`.
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(MAX_DELAY)
    }

    /// Run `op` until it succeeds, fails fatally, or attempts run out.
    ///
    /// The backoff sleep is cancellable; cancellation returns `Cancelled`.
    pub async fn execute<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, DownloadError>
    where
        F: FnMut(RetryAttempt) -> Fut,
        Fut: Future<Output = Result<T, DownloadError>>,
    {
        let mut attempt_number = 1;
        loop {
            let next_delay =
                (attempt_number < self.max_attempts).then(|| self.delay_after(attempt_number));
            let attempt = RetryAttempt {
                attempt_number,
                next_delay,
            };

            let err = match op(attempt).await {
                Ok(value) => return Ok(value),
                Err(err) => err,
            };

            let delay = match next_delay {
                Some(delay) if err.is_retryable() => delay,
                _ => {
                    if err.is_retryable() {
                        tracing::warn!(
                            target: "modelpull.download",
                            attempts = attempt_number,
                            error = %err,
                            "Giving up after exhausting retries"
                        );
                    }
                    return Err(err);
                }
            };

            tracing::warn!(
                target: "modelpull.download",
                attempt = attempt_number,
                max_attempts = self.max_attempts,
                delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                error = %err,
                "Attempt failed, retrying"
            );

            tokio::select! {
                biased;

                () = cancel.cancelled() => return Err(DownloadError::Cancelled),

                () = tokio::time::sleep(delay) => {}
            }

            attempt_number += 1;
        }
    }
}
