use infonet_core::{CollectionAction, CoreError, ErrorExt, ErrorRecovery};
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::sleep;
use tracing::{debug, error, info};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts, the first one included
    pub max_attempts: u32,
    /// Base delay for exponential backoff (in milliseconds)
    pub base_delay_ms: u64,
    /// Maximum delay between retries (in milliseconds)
    pub max_delay_ms: u64,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Maximum jitter factor (0.0 to 1.0)
    pub jitter_factor: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            base_delay_ms: 1000,
            max_delay_ms: 30000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.1,
        }
    }
}

impl RetryConfig {
    /// Create retry config tuned for the Reddit API
    pub fn reddit(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay_ms: 2000,
            max_delay_ms: 60000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.2,
        }
    }
}

/// Calculate delay with exponential backoff and jitter
pub fn calculate_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let multiplier = config.backoff_multiplier.powi(attempt as i32);
    let delay_ms = ((config.base_delay_ms as f64 * multiplier) as u64).min(config.max_delay_ms);

    let jitter_range = (delay_ms as f64 * config.jitter_factor) as u64;
    let jitter = fastrand::u64(0..=jitter_range);

    Duration::from_millis((delay_ms + jitter).min(config.max_delay_ms))
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RetryMetrics {
    pub total_retries: u64,
    pub successful_retries: u64,
    pub failed_operations: u64,
    pub total_delay: Duration,
}

/// Wraps API operations with the collection retry policy.
#[derive(Debug)]
pub struct RetryExecutor {
    config: RetryConfig,
    metrics: Mutex<RetryMetrics>,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self {
            config,
            metrics: Mutex::new(RetryMetrics::default()),
        }
    }

    /// Run `operation` until it succeeds, the error is not worth retrying, or the
    /// attempts are used up. The last error is returned unchanged.
    pub async fn execute<F, Fut, T>(&self, operation_name: &str, operation: F) -> Result<T, CoreError>
    where
        F: Fn() -> Fut,
        Fut: std::future::Future<Output = Result<T, CoreError>>,
    {
        let mut attempt: u32 = 0;
        let mut total_delay = Duration::ZERO;

        loop {
            attempt += 1;
            match operation().await {
                Ok(result) => {
                    if attempt > 1 {
                        let mut metrics = self.metrics.lock().await;
                        metrics.total_retries += (attempt - 1) as u64;
                        metrics.successful_retries += 1;
                        metrics.total_delay += total_delay;
                        info!(
                            "Operation {} succeeded after {} retries (total delay: {:?})",
                            operation_name,
                            attempt - 1,
                            total_delay
                        );
                    }
                    return Ok(result);
                }
                Err(error) => {
                    match ErrorRecovery::for_collection(&error, attempt, self.config.max_attempts) {
                        CollectionAction::Retry { delay } => {
                            // Server-provided waits win over the local backoff.
                            let delay = if delay.is_zero() {
                                delay
                            } else {
                                error
                                    .retry_after()
                                    .unwrap_or_else(|| calculate_delay(attempt - 1, &self.config))
                            };
                            total_delay += delay;
                            info!(
                                "Retrying {} in {:?} (attempt {}/{}) due to: {}",
                                operation_name,
                                delay,
                                attempt + 1,
                                self.config.max_attempts,
                                error
                            );
                            sleep(delay).await;
                        }
                        action => {
                            debug!("Giving up on {} ({:?})", operation_name, action);
                            let mut metrics = self.metrics.lock().await;
                            metrics.total_retries += (attempt - 1) as u64;
                            metrics.failed_operations += 1;
                            metrics.total_delay += total_delay;
                            drop(metrics);

                            error!(
                                "Operation {} failed after {} attempt(s): {}",
                                operation_name, attempt, error
                            );
                            return Err(error);
                        }
                    }
                }
            }
        }
    }

    pub async fn get_metrics(&self) -> RetryMetrics {
        self.metrics.lock().await.clone()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use infonet_core::RedditApiError;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    fn fast_config(max_attempts: u32) -> RetryConfig {
        RetryConfig {
            max_attempts,
            base_delay_ms: 1,
            max_delay_ms: 5,
            jitter_factor: 0.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_retry_config_reddit() {
        let config = RetryConfig::reddit(0);
        assert_eq!(config.max_attempts, 1);
        assert_eq!(config.base_delay_ms, 2000);
        assert_eq!(config.jitter_factor, 0.2);
    }

    #[test]
    fn test_exponential_backoff_calculation() {
        let config = RetryConfig {
            base_delay_ms: 1000,
            max_delay_ms: 10000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.0,
            ..Default::default()
        };

        assert_eq!(calculate_delay(0, &config), Duration::from_millis(1000));
        assert_eq!(calculate_delay(1, &config), Duration::from_millis(2000));
        assert_eq!(calculate_delay(3, &config), Duration::from_millis(8000));
        assert_eq!(calculate_delay(10, &config), Duration::from_millis(10000));
    }

    #[test]
    fn test_jitter_stays_in_range() {
        let config = RetryConfig {
            base_delay_ms: 1000,
            max_delay_ms: 10000,
            backoff_multiplier: 2.0,
            jitter_factor: 0.5,
            ..Default::default()
        };

        for _ in 0..20 {
            let delay = calculate_delay(1, &config);
            assert!(delay >= Duration::from_millis(2000));
            assert!(delay <= Duration::from_millis(3000));
        }
    }

    #[tokio::test]
    async fn test_success_on_first_attempt() {
        let executor = RetryExecutor::new(fast_config(3));

        let result = executor
            .execute("search", || async { Ok::<i32, CoreError>(42) })
            .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(executor.get_metrics().await, RetryMetrics::default());
    }

    #[tokio::test]
    async fn test_success_after_server_errors() {
        let executor = RetryExecutor::new(fast_config(3));
        let attempts = Arc::new(AtomicU32::new(0));

        let result = executor
            .execute("search", || {
                let attempts = attempts.clone();
                async move {
                    if attempts.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err(CoreError::RedditApi(RedditApiError::ServerError {
                            status_code: 503,
                        }))
                    } else {
                        Ok(7)
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), 7);
        let metrics = executor.get_metrics().await;
        assert_eq!(metrics.total_retries, 2);
        assert_eq!(metrics.successful_retries, 1);
    }

    #[tokio::test]
    async fn test_no_retry_on_forbidden() {
        let executor = RetryExecutor::new(fast_config(3));
        let attempts = Arc::new(AtomicU32::new(0));

        let result = executor
            .execute("search", || {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<i32, CoreError>(CoreError::RedditApi(RedditApiError::Forbidden {
                        resource: "/r/private/search".to_string(),
                    }))
                }
            })
            .await;

        assert!(matches!(
            result,
            Err(CoreError::RedditApi(RedditApiError::Forbidden { .. }))
        ));
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
        assert_eq!(executor.get_metrics().await.failed_operations, 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let executor = RetryExecutor::new(fast_config(2));
        let attempts = Arc::new(AtomicU32::new(0));

        let result = executor
            .execute("comments", || {
                let attempts = attempts.clone();
                async move {
                    attempts.fetch_add(1, Ordering::SeqCst);
                    Err::<i32, CoreError>(CoreError::RedditApi(RedditApiError::RequestTimeout))
                }
            })
            .await;

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 2);
        let metrics = executor.get_metrics().await;
        assert_eq!(metrics.total_retries, 1);
        assert_eq!(metrics.failed_operations, 1);
    }

    #[test]
    fn test_authentication_failure_is_not_retried() {
        let executor = RetryExecutor::new(fast_config(3));
        let attempts = Arc::new(AtomicU32::new(0));

        let result = tokio_test::block_on(executor.execute("token", || {
            let attempts = attempts.clone();
            async move {
                attempts.fetch_add(1, Ordering::SeqCst);
                Err::<i32, CoreError>(CoreError::RedditApi(RedditApiError::AuthenticationFailed {
                    reason: "invalid_grant".to_string(),
                }))
            }
        }));

        assert!(result.is_err());
        assert_eq!(attempts.load(Ordering::SeqCst), 1);
    }
}
