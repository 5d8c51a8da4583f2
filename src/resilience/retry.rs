//! Retry Policy
//!
//! Exponential backoff with jitter for transient failures.

use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{AuthError, AuthResult};
use crate::types::{LoggingOptions, RetryOptions};

/// Retry executor with exponential backoff.
///
/// Retries transient errors and responses the caller classifies as
/// retryable. When retries are exhausted on a classified response, the last
/// response is returned as-is so the caller sees the real status.
pub struct RetryPolicy {
    options: RetryOptions,
    logging: LoggingOptions,
}

impl RetryPolicy {
    /// Create a retry policy.
    pub fn new(options: RetryOptions, logging: LoggingOptions) -> Self {
        Self { options, logging }
    }

    /// Backoff before retry number `attempt` (1-based): exponential, capped
    /// at `max_delay`, plus uniform jitter.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1) as i32;
        let base = self.options.base_delay.as_millis() as f64
            * self.options.backoff_multiplier.powi(exponent);
        let capped = base.min(self.options.max_delay.as_millis() as f64);
        let mut delay = Duration::from_millis(capped as u64);

        if self.options.use_jitter && !self.options.max_jitter.is_zero() {
            let jitter_ms = rand::thread_rng()
                .gen_range(0..=self.options.max_jitter.as_millis() as u64);
            delay += Duration::from_millis(jitter_ms);
        }
        delay
    }

    /// Run `op` with retries, treating `classify(&value) == true` as a
    /// retryable failure.
    pub async fn execute_classified<T, F, Fut, C>(
        &self,
        operation: &str,
        op: F,
        classify: C,
        cancel: &CancellationToken,
    ) -> AuthResult<T>
    where
        T: Send,
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = AuthResult<T>> + Send,
        C: Fn(&T) -> bool + Send + Sync,
    {
        let max_attempts = self.options.max_attempts.max(1);

        for attempt in 1..=max_attempts {
            let result = tokio::select! {
                _ = cancel.cancelled() => return Err(AuthError::Cancelled),
                result = op() => result,
            };

            let last_attempt = attempt == max_attempts;
            match result {
                Ok(value) => {
                    if !classify(&value) || last_attempt {
                        return Ok(value);
                    }
                    if self.logging.log_retry_attempts {
                        warn!(operation, attempt, "retrying after retryable response");
                    }
                }
                Err(AuthError::Cancelled) => return Err(AuthError::Cancelled),
                Err(e) => {
                    if !e.is_transient() || last_attempt {
                        return Err(e);
                    }
                    if self.logging.log_retry_attempts {
                        warn!(operation, attempt, error = %e, "retrying after transient error");
                    }
                }
            }

            let delay = self.delay_for_attempt(attempt);
            tokio::select! {
                _ = cancel.cancelled() => return Err(AuthError::Cancelled),
                _ = tokio::time::sleep(delay) => {}
            }
        }

        unreachable!("loop returns on last attempt")
    }

    /// Run `op` with retries on transient errors only.
    pub async fn execute<T, F, Fut>(
        &self,
        operation: &str,
        op: F,
        cancel: &CancellationToken,
    ) -> AuthResult<T>
    where
        T: Send,
        F: Fn() -> Fut + Send + Sync,
        Fut: Future<Output = AuthResult<T>> + Send,
    {
        self.execute_classified(operation, op, |_| false, cancel).await
    }
}
