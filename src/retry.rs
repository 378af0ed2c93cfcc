//! Retry logic with exponential backoff
//!
//! Transient fetch failures are retried with exponential backoff and optional
//! jitter. The total time spent sleeping can be capped with
//! [`RetryConfig::max_total_wait`], which is how the fetcher enforces its
//! `max_wait_time`.
//!
//! # Example
//!
//! ```no_run
//! use submission_dl::retry::{IsRetryable, with_retry};
//! use submission_dl::config::RetryConfig;
//!
//! #[derive(Debug)]
//! enum MyError {
//!     Transient,
//!     Permanent,
//! }
//!
//! impl std::fmt::Display for MyError {
//!     fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
//!         write!(f, "{:?}", self)
//!     }
//! }
//!
//! impl IsRetryable for MyError {
//!     fn is_retryable(&self) -> bool {
//!         matches!(self, MyError::Transient)
//!     }
//! }
//!
//! # async fn example() -> Result<(), MyError> {
//! let config = RetryConfig::default();
//! with_retry(&config, || async {
//!     // Your operation here
//!     Ok::<_, MyError>(())
//! }).await?;
//! # Ok(())
//! # }
//! ```

use crate::config::RetryConfig;
use crate::error::FetchError;
use rand::Rng;
use std::future::Future;
use std::time::Duration;

/// Trait for errors that can be classified as retryable or not
///
/// Transient failures (timeouts, connection resets, throttling) return `true`.
/// Permanent failures (not found, forbidden, empty content) return `false`.
pub trait IsRetryable {
    /// Returns true if the error is transient and the operation should be retried
    fn is_retryable(&self) -> bool;
}

impl IsRetryable for FetchError {
    fn is_retryable(&self) -> bool {
        match self {
            FetchError::Timeout { .. } | FetchError::Connect { .. } | FetchError::Body { .. } => {
                true
            }
            // Request timeout, throttling and server-side failures
            FetchError::Status { status, .. } => {
                matches!(status, 408 | 429) || (500..600).contains(status)
            }
            FetchError::EmptyBody { .. } | FetchError::InvalidUrl { .. } => false,
        }
    }
}

/// Execute an async operation with exponential backoff retry logic
///
/// Retries while the error is retryable, fewer than `max_attempts` retries
/// have been made, and the next sleep fits in `max_total_wait` (if set).
///
/// # Returns
///
/// Returns the successful result or the last error once retrying stops.
pub async fn with_retry<F, Fut, T, E>(config: &RetryConfig, mut operation: F) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: IsRetryable + std::fmt::Display,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;
    let mut waited = Duration::ZERO;

    loop {
        match operation().await {
            Ok(result) => {
                if attempt > 0 {
                    tracing::info!(attempts = attempt + 1, "Operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) if e.is_retryable() && attempt < config.max_attempts => {
                let sleep_for = if config.jitter {
                    add_jitter(delay)
                } else {
                    delay
                };

                if let Some(budget) = config.max_total_wait
                    && waited.saturating_add(sleep_for) > budget
                {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        waited_ms = waited.as_millis(),
                        "Operation failed, retry wait budget exhausted"
                    );
                    return Err(e);
                }

                attempt += 1;
                tracing::warn!(
                    error = %e,
                    attempt = attempt,
                    max_attempts = config.max_attempts,
                    delay_ms = sleep_for.as_millis(),
                    "Operation failed, retrying"
                );

                tokio::time::sleep(sleep_for).await;
                waited = waited.saturating_add(sleep_for);
                delay = next_delay(delay, config);
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::error!(
                        error = %e,
                        attempts = attempt + 1,
                        "Operation failed after all retry attempts exhausted"
                    );
                } else {
                    tracing::error!(error = %e, "Operation failed with non-retryable error");
                }
                return Err(e);
            }
        }
    }
}

/// Grow `delay` by the backoff multiplier, capped at `max_delay`
///
/// A product that is not representable as a `Duration` saturates to `max_delay`.
fn next_delay(delay: Duration, config: &RetryConfig) -> Duration {
    Duration::try_from_secs_f64(delay.as_secs_f64() * config.backoff_multiplier)
        .unwrap_or(config.max_delay)
        .min(config.max_delay)
}

/// Add random jitter to a delay to prevent thundering herd
///
/// The result is uniformly distributed between `delay` and `2 * delay`.
/// Delays too large to scale are returned unchanged.
fn add_jitter(delay: Duration) -> Duration {
    let mut rng = rand::thread_rng();
    let jitter_factor: f64 = rng.gen_range(0.0..=1.0);
    Duration::try_from_secs_f64(delay.as_secs_f64() * (1.0 + jitter_factor)).unwrap_or(delay)
}

// unwrap/expect are acceptable in tests for concise failure-on-error assertions
#[allow(clippy::unwrap_used, clippy::expect_used)]
#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    enum TestError {
        Transient,
        Permanent,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            match self {
                TestError::Transient => write!(f, "transient error"),
                TestError::Permanent => write!(f, "permanent error"),
            }
        }
    }

    impl IsRetryable for TestError {
        fn is_retryable(&self) -> bool {
            matches!(self, TestError::Transient)
        }
    }

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(10),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 2.0,
            jitter: false,
            max_total_wait: None,
        }
    }

    #[tokio::test]
    async fn test_success_no_retry() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&fast_config(3), || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Ok::<_, TestError>(42)
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 1, "should only call once");
    }

    #[tokio::test]
    async fn test_retry_transient_then_succeed() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&fast_config(3), || {
            let counter = counter_clone.clone();
            async move {
                let count = counter.fetch_add(1, Ordering::SeqCst);
                if count < 2 {
                    Err(TestError::Transient)
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&fast_config(2), || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(TestError::Transient)
            }
        })
        .await;

        assert!(matches!(result, Err(TestError::Transient)));
        assert_eq!(counter.load(Ordering::SeqCst), 3, "initial call plus two retries");
    }

    #[tokio::test]
    async fn test_permanent_error_not_retried() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&fast_config(5), || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(TestError::Permanent)
            }
        })
        .await;

        assert!(matches!(result, Err(TestError::Permanent)));
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_attempts_fails_fast() {
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&fast_config(0), || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(TestError::Transient)
            }
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_total_wait_budget_stops_retries() {
        let config = RetryConfig {
            max_total_wait: Some(Duration::from_millis(25)),
            ..fast_config(10)
        };
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result = with_retry(&config, || {
            let counter = counter_clone.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err::<i32, _>(TestError::Transient)
            }
        })
        .await;

        // Sleeps of 10ms then 20ms: the second would exceed the 25ms budget
        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_fetch_error_classification() {
        let status = |status| FetchError::Status {
            url: "u".into(),
            status,
        };
        assert!(status(429).is_retryable());
        assert!(status(408).is_retryable());
        assert!(status(503).is_retryable());
        assert!(!status(404).is_retryable());
        assert!(!status(403).is_retryable());
        assert!(FetchError::Timeout { url: "u".into() }.is_retryable());
        assert!(!FetchError::EmptyBody { url: "u".into() }.is_retryable());
    }

    #[tokio::test]
    async fn test_extreme_multiplier_saturates_at_max_delay() {
        for multiplier in [1e300, f64::INFINITY, f64::NAN] {
            let config = RetryConfig {
                max_delay: Duration::from_millis(20),
                backoff_multiplier: multiplier,
                jitter: true,
                ..fast_config(3)
            };
            let counter = Arc::new(AtomicU32::new(0));
            let counter_clone = counter.clone();

            let result = with_retry(&config, || {
                let counter = counter_clone.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err::<i32, _>(TestError::Transient)
                }
            })
            .await;

            assert!(matches!(result, Err(TestError::Transient)));
            assert_eq!(counter.load(Ordering::SeqCst), 4, "multiplier {multiplier}");
        }
    }

    #[test]
    fn test_next_delay_is_capped() {
        let config = RetryConfig {
            max_delay: Duration::from_secs(30),
            backoff_multiplier: 1e300,
            ..fast_config(3)
        };
        assert_eq!(
            next_delay(Duration::from_secs(1), &config),
            Duration::from_secs(30)
        );
        assert_eq!(
            next_delay(Duration::MAX, &fast_config(3)),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn test_jitter_on_huge_delay_does_not_overflow() {
        assert_eq!(add_jitter(Duration::MAX), Duration::MAX);
    }

    #[test]
    fn test_jitter_range() {
        let base = Duration::from_millis(100);
        for _ in 0..50 {
            let jittered = add_jitter(base);
            assert!(jittered >= base && jittered <= base * 2);
        }
    }
}
