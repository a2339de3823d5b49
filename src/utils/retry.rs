//! Retry utilities for transient fetch failures
//!
//! Every fetch failure is treated as retryable. The delay grows linearly with
//! the attempt number and is capped, and no delay follows the final attempt.

use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::debug;

use crate::config::RetryConfig;
use crate::errors::{FetchError, FetchResult};

/// Linear backoff policy shared by all retrying fetches
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Delay added per failed attempt
    pub backoff_step: Duration,
    /// Upper bound of a single delay
    pub max_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&RetryConfig::default())
    }
}

impl From<&RetryConfig> for RetryPolicy {
    fn from(config: &RetryConfig) -> Self {
        Self {
            backoff_step: config.backoff_step,
            max_backoff: config.max_backoff,
        }
    }
}

impl RetryPolicy {
    /// Policy without any waiting, for tests and local endpoints
    pub fn immediate() -> Self {
        Self {
            backoff_step: Duration::ZERO,
            max_backoff: Duration::ZERO,
        }
    }

    /// Delay after failed attempt `attempt` (counting from 1)
    pub fn backoff(&self, attempt: u32) -> Duration {
        self.backoff_step
            .saturating_mul(attempt)
            .min(self.max_backoff)
    }
}

/// Run `operation` up to `max_retries + 1` times, sleeping between failures
///
/// Returns the first success, or the error of the last attempt.
pub async fn with_retry<T, F, Fut>(
    policy: &RetryPolicy,
    max_retries: u32,
    mut operation: F,
    operation_name: &str,
) -> FetchResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = FetchResult<T>>,
{
    let attempts = max_retries.saturating_add(1);
    let mut last_error = None;

    for attempt in 1..=attempts {
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        "{} succeeded on attempt {}/{}",
                        operation_name, attempt, attempts
                    );
                }
                return Ok(result);
            }
            Err(err) => {
                debug!(
                    "{} failed on attempt {}/{}: {}",
                    operation_name, attempt, attempts, err
                );
                last_error = Some(err);
                if attempt < attempts {
                    sleep(policy.backoff(attempt)).await;
                }
            }
        }
    }

    Err(last_error.unwrap_or(FetchError::Unknown))
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[test]
    fn default_schedule() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.backoff(1), Duration::from_millis(500));
        assert_eq!(policy.backoff(2), Duration::from_millis(1000));
        assert_eq!(policy.backoff(4), Duration::from_secs(2));
        assert_eq!(policy.backoff(10), Duration::from_secs(2));
    }

    #[tokio::test]
    async fn stops_on_first_success() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(
            &RetryPolicy::immediate(),
            5,
            || {
                let counter = counter_clone.clone();
                async move {
                    let count = counter.fetch_add(1, Ordering::SeqCst);
                    if count < 2 {
                        Err(FetchError::Status(503))
                    } else {
                        Ok(count)
                    }
                }
            },
            "flaky",
        )
        .await;

        assert_eq!(result, Ok(2));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn exhaustion_returns_last_error() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: FetchResult<()> = with_retry(
            &RetryPolicy::immediate(),
            2,
            || {
                let counter = counter_clone.clone();
                async move {
                    let count = counter.fetch_add(1, Ordering::SeqCst);
                    Err(FetchError::Status(500 + count as u16))
                }
            },
            "always failing",
        )
        .await;

        assert_eq!(result, Err(FetchError::Status(502)));
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: FetchResult<()> = with_retry(
            &RetryPolicy::default(),
            0,
            || {
                let counter = counter_clone.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(FetchError::Transport("refused".into()))
                }
            },
            "single",
        )
        .await;

        assert_eq!(result, Err(FetchError::Transport("refused".into())));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    proptest! {
        #[test]
        fn backoff_is_monotonic_and_capped(
            step_ms in 0u64..5_000,
            cap_ms in 0u64..10_000,
            attempt in 1u32..1_000,
        ) {
            let policy = RetryPolicy {
                backoff_step: Duration::from_millis(step_ms),
                max_backoff: Duration::from_millis(cap_ms),
            };
            let delay = policy.backoff(attempt);
            prop_assert!(delay <= policy.max_backoff);
            prop_assert!(delay <= policy.backoff_step * attempt);
            prop_assert!(policy.backoff(attempt + 1) >= delay);
        }
    }
}
