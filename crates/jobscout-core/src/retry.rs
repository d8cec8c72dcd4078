//! Bounded exponential-backoff retry for retrieval calls.
//!
//! [`RetryPolicy`] is an explicit object wrapping any fallible async
//! call. Failures classified transient by [`AppError::is_retryable`] are
//! retried with exponential backoff; permanent failures return after the
//! first attempt. Cancellation is honored between attempts, never by
//! interrupting a call in flight.

use std::future::Future;
use std::time::Duration;

use tokio_util::sync::CancellationToken;

use crate::config::RetryConfig;
use crate::error::AppError;

#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
    pub backoff_factor: f64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&RetryConfig::default())
    }
}

impl RetryPolicy {
    pub fn from_config(config: &RetryConfig) -> Self {
        Self {
            max_attempts: config.max_attempts,
            base_delay: config.base_delay(),
            backoff_factor: config.backoff_factor,
        }
    }

    /// Backoff before retrying after the given failed attempt (1-indexed):
    /// `base_delay * backoff_factor^(attempt - 1)`.
    pub fn delay_for_attempt(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(30) as i32;
        self.base_delay.mul_f64(self.backoff_factor.powi(exponent))
    }

    /// Run `op`, retrying transient failures up to `max_attempts` total
    /// attempts. Returns the first success or the last error.
    pub async fn run<T, F, Fut>(
        &self,
        cancel: &CancellationToken,
        mut op: F,
    ) -> Result<T, AppError>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, AppError>>,
    {
        let mut attempt = 1u32;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(err) if err.is_retryable() && attempt < self.max_attempts => {
                    let delay = self.delay_for_attempt(attempt);
                    tracing::warn!(
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "transient failure, backing off"
                    );
                    tokio::select! {
                        _ = cancel.cancelled() => {
                            tracing::debug!("cancelled during backoff");
                            return Err(err);
                        }
                        _ = tokio::time::sleep(delay) => {}
                    }
                    attempt += 1;
                }
                Err(err) => return Err(err),
            }
        }
    }
}
