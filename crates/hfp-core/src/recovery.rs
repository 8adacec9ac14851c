//! Retry support for transient engine failures
//!
//! Connection setup against a gateway fails transiently all the time (the
//! phone is out of range, the driver is still tearing down a previous
//! link). This module provides exponential-backoff retries for operations
//! whose failures are [recoverable](crate::HfpError::is_recoverable);
//! non-recoverable errors fail fast.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;
use tracing::{debug, error, warn};

use crate::error::HfpResult;

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Initial delay between attempts
    pub initial_delay: Duration,
    /// Maximum delay between attempts
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    /// Configuration for quick retries in tests and local transports
    pub fn quick() -> Self {
        Self {
            max_attempts: 5,
            initial_delay: Duration::from_millis(50),
            max_delay: Duration::from_secs(1),
            backoff_multiplier: 1.5,
        }
    }
}

/// Retry an operation with exponential backoff
///
/// The operation is retried only while it fails with a recoverable error
/// and attempts remain; the last error is returned otherwise.
pub async fn retry_with_backoff<T, F, Fut>(
    operation_name: &str,
    config: RetryConfig,
    mut operation: F,
) -> HfpResult<T>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = HfpResult<T>>,
{
    let mut attempt = 0;
    let mut delay = config.initial_delay;

    loop {
        attempt += 1;
        match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(
                        operation = operation_name,
                        attempt,
                        "operation succeeded after retries"
                    );
                }
                return Ok(result);
            }
            Err(e) if e.is_recoverable() && attempt < config.max_attempts => {
                warn!(
                    operation = operation_name,
                    attempt,
                    error = %e,
                    next_delay_ms = delay.as_millis() as u64,
                    "recoverable error, will retry"
                );
                sleep(delay).await;
                let next_ms = (delay.as_millis() as f64 * config.backoff_multiplier) as u64;
                delay = Duration::from_millis(next_ms).min(config.max_delay);
            }
            Err(e) => {
                error!(
                    operation = operation_name,
                    attempts = attempt,
                    error = %e,
                    "operation failed"
                );
                return Err(e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HfpError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn quick_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            initial_delay: Duration::from_millis(1),
            max_delay: Duration::from_millis(5),
            backoff_multiplier: 2.0,
        }
    }

    #[tokio::test]
    async fn recoverable_errors_retry_until_success() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result = retry_with_backoff("op", quick_config(3), move || {
            let counter = counter.clone();
            async move {
                if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                    Err(HfpError::connection_failed("gateway busy"))
                } else {
                    Ok(42)
                }
            }
        })
        .await;

        assert_eq!(result, Ok(42));
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn non_recoverable_errors_fail_fast() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: HfpResult<()> = retry_with_backoff("op", quick_config(3), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(HfpError::command_failed("bad digit"))
            }
        })
        .await;

        assert_eq!(result, Err(HfpError::command_failed("bad digit")));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn exhausted_attempts_return_last_error() {
        let attempts = Arc::new(AtomicU32::new(0));
        let counter = attempts.clone();

        let result: HfpResult<()> = retry_with_backoff("op", quick_config(2), move || {
            let counter = counter.clone();
            async move {
                counter.fetch_add(1, Ordering::SeqCst);
                Err(HfpError::TransportError { code: -3 })
            }
        })
        .await;

        assert_eq!(result, Err(HfpError::TransportError { code: -3 }));
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
    }
}
