/*!
 * Bounded retries for collaborator calls.
 *
 * Every attempt runs under its own timeout. Failed attempts are retried up to
 * `max_retries` times with exponential backoff plus a little random jitter.
 * Errors that can not succeed on a second try stop the loop early.
 */

use std::future::Future;
use std::time::Duration;

use log::{debug, warn};
use rand::Rng;

use crate::errors::ProviderError;

/// Retry settings for one kind of collaborator call
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,

    /// First backoff delay, doubled on each retry
    pub backoff_base_ms: u64,

    /// Budget of a single attempt
    pub call_timeout: Duration,
}

/// All attempts failed
#[derive(Debug, Clone, PartialEq)]
pub struct RetryFailure {
    /// Attempts made, including the first
    pub attempts: u32,

    /// Error of the final attempt
    pub last_error: ProviderError,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_base_ms: u64, call_timeout: Duration) -> Self {
        RetryPolicy {
            max_retries,
            backoff_base_ms,
            call_timeout,
        }
    }

    /// Single attempt, no backoff
    pub fn no_retry(call_timeout: Duration) -> Self {
        Self::new(0, 0, call_timeout)
    }

    /// Delay before retry number `retry` (1-based)
    pub fn backoff_delay(&self, retry: u32) -> Duration {
        if self.backoff_base_ms == 0 {
            return Duration::ZERO;
        }
        let multiplier = 2u64.saturating_pow(retry.saturating_sub(1));
        let base = self.backoff_base_ms.saturating_mul(multiplier);
        let jitter = rand::rng().random_range(0..=self.backoff_base_ms / 4);
        Duration::from_millis(base.saturating_add(jitter))
    }

    /// Run `op` until it succeeds or the attempts are exhausted
    pub async fn run<T, F, Fut>(&self, label: &str, mut op: F) -> Result<T, RetryFailure>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = Result<T, ProviderError>>,
    {
        let mut attempts = 0;

        loop {
            attempts += 1;
            let outcome = match tokio::time::timeout(self.call_timeout, op()).await {
                Ok(result) => result,
                Err(_) => Err(ProviderError::Timeout(self.call_timeout)),
            };

            let error = match outcome {
                Ok(value) => {
                    if attempts > 1 {
                        debug!("{} succeeded on attempt {}", label, attempts);
                    }
                    return Ok(value);
                }
                Err(e) => e,
            };

            if !error.is_retryable() || attempts > self.max_retries {
                return Err(RetryFailure {
                    attempts,
                    last_error: error,
                });
            }

            let delay = self.backoff_delay(attempts);
            warn!(
                "{} failed (attempt {}/{}): {}; retrying in {}ms",
                label,
                attempts,
                self.max_retries + 1,
                error,
                delay.as_millis()
            );
            tokio::time::sleep(delay).await;
        }
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        RetryPolicy::new(2, 1000, Duration::from_secs(120))
    }
}
