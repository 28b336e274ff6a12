// SPDX-License-Identifier: MIT OR Apache-2.0
//! Retry loop with exponential backoff for transient external failures.
//!
//! Retry is a cross-cutting concern: nodes and clients wrap their calls in
//! [`retry_async`] with a classifier that decides which errors are
//! transient, instead of hand-rolling loops. Non-transient errors return
//! immediately.
#![deny(unsafe_code)]
#![warn(missing_docs)]

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Configuration for retry behaviour.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryConfig {
    /// Total number of attempts, the initial call included.
    /// `0` behaves like `1`: a single attempt, no retries.
    pub max_retries: u32,
    /// Base delay for exponential backoff.
    pub base_delay_ms: u64,
    /// Maximum delay cap for exponential backoff.
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay_ms: 1_000,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryConfig {
    /// A configuration that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Self::default()
        }
    }

    /// Fast backoff for tests.
    #[must_use]
    pub fn fast(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay_ms: 1,
            max_delay_ms: 10,
        }
    }
}

/// Record of a single failed attempt.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RetryAttempt {
    /// Zero-indexed attempt number.
    pub attempt: u32,
    /// Error message from this attempt.
    pub error: String,
    /// Backoff delay applied before the next attempt, in milliseconds.
    pub delay_ms: u64,
}

/// Metadata captured across all retry attempts.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RetryMetadata {
    /// Total number of attempts made (including the successful one).
    pub total_attempts: u32,
    /// Records of each *failed* attempt.
    pub failed_attempts: Vec<RetryAttempt>,
    /// Wall-clock time spanning all attempts, in milliseconds.
    pub total_duration_ms: u64,
}

/// Result of a retry-enabled operation.
#[derive(Debug)]
pub struct RetryOutcome<T> {
    /// The successfully produced value.
    pub value: T,
    /// Retry metadata (empty `failed_attempts` when the first attempt
    /// succeeds).
    pub metadata: RetryMetadata,
}

/// Compute the backoff delay for a zero-indexed attempt number
/// (`base * 2^attempt`, capped).
#[must_use]
pub fn compute_delay(config: &RetryConfig, attempt: u32) -> Duration {
    let exp = 2u64.saturating_pow(attempt);
    let delay_ms = config.base_delay_ms.saturating_mul(exp);
    Duration::from_millis(delay_ms.min(config.max_delay_ms))
}

/// Generic retry loop. Calls `op` up to `max_retries` times in total with
/// exponential backoff, returning the first successful result along with
/// metadata about failed attempts.
///
/// `retryable` decides whether a given error should trigger another
/// attempt; non-retryable errors are returned immediately.
///
/// # Errors
///
/// Returns the last error once attempts are exhausted, or the first
/// non-retryable error.
pub async fn retry_async<T, E, F, Fut>(
    config: &RetryConfig,
    mut op: F,
    retryable: impl Fn(&E) -> bool,
) -> Result<RetryOutcome<T>, E>
where
    E: std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let start = Instant::now();
    let mut failed_attempts = Vec::new();
    let mut attempt: u32 = 0;

    loop {
        match op().await {
            Ok(value) => {
                let total = start.elapsed();
                debug!(
                    target: "ino.retry",
                    attempt,
                    total_duration_ms = total.as_millis() as u64,
                    "operation succeeded"
                );
                return Ok(RetryOutcome {
                    value,
                    metadata: RetryMetadata {
                        total_attempts: attempt + 1,
                        failed_attempts,
                        total_duration_ms: total.as_millis() as u64,
                    },
                });
            }
            Err(err) => {
                if !retryable(&err) {
                    debug!(
                        target: "ino.retry",
                        error = %err,
                        "non-retryable error, giving up"
                    );
                    return Err(err);
                }

                if attempt + 1 >= config.max_retries {
                    warn!(
                        target: "ino.retry",
                        error = %err,
                        attempt,
                        "max retries exhausted"
                    );
                    return Err(err);
                }

                let delay = compute_delay(config, attempt);
                warn!(
                    target: "ino.retry",
                    error = %err,
                    attempt,
                    delay_ms = delay.as_millis() as u64,
                    "retryable error, backing off"
                );
                failed_attempts.push(RetryAttempt {
                    attempt,
                    error: err.to_string(),
                    delay_ms: delay.as_millis() as u64,
                });
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct TestError {
        transient: bool,
    }

    impl std::fmt::Display for TestError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            write!(f, "transient={}", self.transient)
        }
    }

    #[test]
    fn delay_doubles_and_caps() {
        let config = RetryConfig {
            max_retries: 5,
            base_delay_ms: 100,
            max_delay_ms: 500,
        };
        assert_eq!(compute_delay(&config, 0), Duration::from_millis(100));
        assert_eq!(compute_delay(&config, 1), Duration::from_millis(200));
        assert_eq!(compute_delay(&config, 2), Duration::from_millis(400));
        assert_eq!(compute_delay(&config, 3), Duration::from_millis(500));
    }

    #[tokio::test]
    async fn first_attempt_success_has_no_failures() {
        let outcome = retry_async(
            &RetryConfig::fast(3),
            || async { Ok::<_, TestError>(7) },
            |e| e.transient,
        )
        .await
        .unwrap();
        assert_eq!(outcome.value, 7);
        assert_eq!(outcome.metadata.total_attempts, 1);
        assert!(outcome.metadata.failed_attempts.is_empty());
    }

    #[tokio::test]
    async fn retries_until_success() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let outcome = retry_async(
            &RetryConfig::fast(3),
            move || {
                let calls = calls2.clone();
                async move {
                    if calls.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(TestError { transient: true })
                    } else {
                        Ok(42)
                    }
                }
            },
            |e| e.transient,
        )
        .await
        .unwrap();
        assert_eq!(outcome.value, 42);
        assert_eq!(outcome.metadata.total_attempts, 3);
        assert_eq!(outcome.metadata.failed_attempts.len(), 2);
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_retryable_fails_immediately() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let err = retry_async(
            &RetryConfig::fast(3),
            move || {
                let calls = calls2.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, _>(TestError { transient: false })
                }
            },
            |e| e.transient,
        )
        .await
        .unwrap_err();
        assert!(!err.transient);
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhaustion_returns_last_error() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let err = retry_async(
            &RetryConfig::fast(2),
            move || {
                let calls = calls2.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, _>(TestError { transient: true })
                }
            },
            |e| e.transient,
        )
        .await
        .unwrap_err();
        assert!(err.transient);
        // two attempts in total
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn zero_retries_means_single_attempt() {
        let calls = Arc::new(AtomicU32::new(0));
        let calls2 = calls.clone();
        let _ = retry_async(
            &RetryConfig::none(),
            move || {
                let calls = calls2.clone();
                async move {
                    calls.fetch_add(1, Ordering::SeqCst);
                    Err::<u32, _>(TestError { transient: true })
                }
            },
            |e| e.transient,
        )
        .await;
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }
}
