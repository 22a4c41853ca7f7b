//! Retry with exponential backoff.
//!
//! One utility shared by every upstream call site, parameterized by attempt
//! bound, base delay and a retry predicate, instead of ad-hoc loops per
//! caller.

use std::future::Future;
use std::time::Duration;

use tracing::{debug, warn};

/// Bounds and pacing for a retried operation.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    /// Delay before the first retry; doubles after each failed attempt.
    pub base_delay: Duration,
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        debug_assert!(max_attempts >= 1, "RetryPolicy needs at least one attempt");
        Self {
            max_attempts,
            base_delay,
        }
    }

    /// Policy used by the page fetcher: 3 attempts, 2s base delay.
    pub fn upstream_default() -> Self {
        Self::new(3, Duration::from_millis(2000))
    }
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::upstream_default()
    }
}

/// Run `operation` until it succeeds, the predicate rejects the error, or
/// attempts are exhausted. The last error is returned on exhaustion.
///
/// `should_retry` lets callers exempt terminal outcomes (a 429 normalized
/// to a sentinel never reaches here; a 4xx rejection is not worth retrying).
pub async fn retry_with_backoff<T, E, F, Fut, P>(
    policy: RetryPolicy,
    mut operation: F,
    should_retry: P,
) -> Result<T, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    P: Fn(&E) -> bool,
{
    let mut delay = policy.base_delay;
    let mut attempt = 1u32;

    loop {
        match operation().await {
            Ok(value) => {
                if attempt > 1 {
                    debug!(attempt, "Operation succeeded after retry");
                }
                return Ok(value);
            }
            Err(e) if attempt < policy.max_attempts && should_retry(&e) => {
                warn!(
                    attempt,
                    max_attempts = policy.max_attempts,
                    delay_ms = delay.as_millis() as u64,
                    error = %e,
                    "Transient failure, backing off before retry"
                );
                tokio::time::sleep(delay).await;
                delay *= 2;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
