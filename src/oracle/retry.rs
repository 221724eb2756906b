//! Exponential backoff retry for oracle calls
//!
//! - Delay doubles each attempt: base_delay * 2^attempt
//! - Jitter spreads retries: delay * (1 + pseudo_random(0, jitter_factor))
//! - A Retry-After hint overrides the calculated delay
//! - Non-retryable errors fail immediately (4xx except 429)

use crate::oracle::OracleError;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries).
    pub max_retries: usize,
    /// Initial delay before first retry.
    pub base_delay: Duration,
    /// Maximum delay between retries.
    pub max_delay: Duration,
    /// Random jitter factor (0.0 - 1.0).
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(60),
            jitter_factor: 0.25,
        }
    }
}

impl RetryConfig {
    /// Create a new retry config with custom values.
    pub fn new(
        max_retries: usize,
        base_delay: Duration,
        max_delay: Duration,
        jitter_factor: f64,
    ) -> Self {
        Self {
            max_retries,
            base_delay,
            max_delay,
            jitter_factor: jitter_factor.clamp(0.0, 1.0),
        }
    }

    /// Retry config that never retries, for sequential batches where the
    /// driver itself accounts for failures.
    pub fn none() -> Self {
        Self::new(0, Duration::ZERO, Duration::ZERO, 0.0)
    }

    /// Calculate delay for a given attempt (0-indexed).
    ///
    /// Exponential backoff capped at `max_delay`, then jitter. The jitter is
    /// deterministic in the attempt number so tests stay reproducible.
    pub fn calculate_delay(&self, attempt: usize) -> Duration {
        let exp_delay = self.base_delay.as_millis() as u64 * 2u64.saturating_pow(attempt as u32);
        let capped = exp_delay.min(self.max_delay.as_millis() as u64);

        let jitter = if self.jitter_factor > 0.0 {
            let pseudo_random = ((attempt as f64 * 0.618033988749895) % 1.0) * self.jitter_factor;
            1.0 + pseudo_random
        } else {
            1.0
        };

        Duration::from_millis((capped as f64 * jitter) as u64)
    }

    /// Override delay with a Retry-After hint if present.
    pub fn delay_with_retry_after(
        &self,
        attempt: usize,
        retry_after: Option<Duration>,
    ) -> Duration {
        retry_after.unwrap_or_else(|| self.calculate_delay(attempt))
    }
}

/// Execute an async oracle operation with retry logic.
///
/// Returns the first success, or the final error once retries are exhausted
/// or a non-retryable error occurs.
pub async fn call_with_retry<F, Fut, T>(
    mut operation: F,
    config: &RetryConfig,
) -> Result<T, OracleError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, OracleError>>,
{
    let mut attempt = 0;

    loop {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(err) => {
                if !err.is_retryable() {
                    return Err(err);
                }
                if attempt >= config.max_retries {
                    return Err(err);
                }

                let retry_after = if let OracleError::RateLimited { retry_after } = &err {
                    *retry_after
                } else {
                    None
                };

                let delay = config.delay_with_retry_after(attempt, retry_after);
                sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_default_config() {
        let config = RetryConfig::default();
        assert_eq!(config.max_retries, 3);
        assert_eq!(config.base_delay, Duration::from_secs(1));
        assert!((config.jitter_factor - 0.25).abs() < f64::EPSILON);
    }

    #[test]
    fn test_jitter_factor_clamped() {
        let config = RetryConfig::new(1, Duration::from_secs(1), Duration::from_secs(10), 2.0);
        assert!((config.jitter_factor - 1.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_calculate_delay_exponential() {
        let config = RetryConfig::new(5, Duration::from_secs(1), Duration::from_secs(60), 0.0);
        assert_eq!(config.calculate_delay(0), Duration::from_secs(1));
        assert_eq!(config.calculate_delay(1), Duration::from_secs(2));
        assert_eq!(config.calculate_delay(2), Duration::from_secs(4));
    }

    #[test]
    fn test_calculate_delay_capped() {
        let config = RetryConfig::new(10, Duration::from_secs(1), Duration::from_secs(10), 0.0);
        assert_eq!(config.calculate_delay(5), Duration::from_secs(10));
    }

    #[test]
    fn test_retry_after_overrides() {
        let config = RetryConfig::new(5, Duration::from_secs(1), Duration::from_secs(60), 0.0);
        let delay = config.delay_with_retry_after(0, Some(Duration::from_secs(30)));
        assert_eq!(delay, Duration::from_secs(30));
        let delay = config.delay_with_retry_after(2, None);
        assert_eq!(delay, Duration::from_secs(4));
    }

    #[tokio::test]
    async fn test_retry_success_first_attempt() {
        let config = RetryConfig::new(3, Duration::from_millis(1), Duration::from_millis(10), 0.0);
        let result = call_with_retry(|| async { Ok::<_, OracleError>("ok") }, &config).await;
        assert_eq!(result.unwrap(), "ok");
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let config = RetryConfig::new(5, Duration::from_millis(1), Duration::from_millis(10), 0.0);

        let result = call_with_retry(
            || {
                let counter = counter.clone();
                async move {
                    if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(OracleError::Timeout)
                    } else {
                        Ok("recovered")
                    }
                }
            },
            &config,
        )
        .await;

        assert_eq!(result.unwrap(), "recovered");
        assert_eq!(attempts.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_exhausted() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let config = RetryConfig::new(2, Duration::from_millis(1), Duration::from_millis(10), 0.0);

        let result: Result<(), OracleError> = call_with_retry(
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(OracleError::NetworkError("always down".to_string()))
                }
            },
            &config,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 3); // 1 initial + 2 retries
    }

    #[tokio::test]
    async fn test_non_retryable_fails_immediately() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();
        let config = RetryConfig::new(5, Duration::from_millis(1), Duration::from_millis(10), 0.0);

        let result: Result<(), OracleError> = call_with_retry(
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(OracleError::InvalidResponse("bad schema".to_string()))
                }
            },
            &config,
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_zero_retries_single_attempt() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let counter = attempts.clone();

        let result: Result<(), OracleError> = call_with_retry(
            || {
                let counter = counter.clone();
                async move {
                    counter.fetch_add(1, Ordering::SeqCst);
                    Err(OracleError::Timeout)
                }
            },
            &RetryConfig::none(),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
