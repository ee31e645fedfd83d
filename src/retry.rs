//! Bounded retry with exponential backoff.
//!
//! Every public client operation runs through [`with_retry`]. The loop is
//! explicit (no recursion) so sustained throttling cannot grow the stack.
//! Only errors with [`Doc2xError::is_retryable`] are retried; input errors and
//! terminal business failures return on the first attempt.
//!
//! With the default 1000 ms base and 3 retries the wait sequence is
//! 1 s → 2 s → 4 s.

use crate::config::ClientConfig;
use crate::error::Doc2xError;
use std::future::Future;
use tokio::time::{sleep, Duration};
use tracing::warn;

/// Retry budget and backoff base.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt.
    pub max_retries: u32,
    /// Delay before the first retry; doubles on each further retry.
    pub backoff_ms: u64,
}

impl RetryPolicy {
    pub fn new(max_retries: u32, backoff_ms: u64) -> Self {
        Self {
            max_retries,
            backoff_ms,
        }
    }

    /// No retries at all.
    pub fn none() -> Self {
        Self::new(0, 0)
    }

    pub fn from_config(config: &ClientConfig) -> Self {
        Self::new(config.max_retries, config.retry_backoff_ms)
    }

    /// Delay before retry number `attempt` (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = 2u64.saturating_pow(attempt.saturating_sub(1));
        Duration::from_millis(self.backoff_ms.saturating_mul(factor))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from_config(&ClientConfig::default())
    }
}

/// Run `op` until it succeeds, fails permanently, or the budget is spent.
///
/// A retryable error on the last attempt is wrapped in
/// [`Doc2xError::RetryExhausted`]; with a zero budget the error is returned
/// as-is.
pub async fn with_retry<T, F, Fut>(
    policy: RetryPolicy,
    operation: &'static str,
    mut op: F,
) -> Result<T, Doc2xError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, Doc2xError>>,
{
    let mut attempt = 0u32;
    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if !e.is_retryable() => return Err(e),
            Err(e) if attempt >= policy.max_retries => {
                if policy.max_retries == 0 {
                    return Err(e);
                }
                warn!(
                    "{}: giving up after {} attempts: {}",
                    operation,
                    attempt + 1,
                    e
                );
                return Err(Doc2xError::RetryExhausted {
                    operation,
                    attempts: attempt + 1,
                    last: Box::new(e),
                });
            }
            Err(e) => {
                attempt += 1;
                let backoff = policy.backoff(attempt);
                if e.is_rate_limit() {
                    warn!(
                        "{}: rate limited, retry {}/{} after {}ms",
                        operation,
                        attempt,
                        policy.max_retries,
                        backoff.as_millis()
                    );
                } else {
                    warn!(
                        "{}: retry {}/{} after {}ms: {}",
                        operation,
                        attempt,
                        policy.max_retries,
                        backoff.as_millis(),
                        e
                    );
                }
                sleep(backoff).await;
            }
        }
    }
}
