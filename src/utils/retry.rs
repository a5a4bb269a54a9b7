//! Exponential backoff for transient upstream failures during ingestion.

use std::future::Future;
use std::time::Duration;

use tokio::time::sleep;

/// Backoff settings for a retried operation.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Total attempts, including the first one.
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 4,
            initial_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(20),
            multiplier: 2.0,
        }
    }
}

impl RetryConfig {
    #[must_use]
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Default::default()
        }
    }

    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Delay before attempt `attempt + 1`, without jitter.
    fn delay_for(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.powi(attempt.saturating_sub(1) as i32);
        Duration::from_secs_f64(self.initial_delay.as_secs_f64() * factor).min(self.max_delay)
    }
}

/// Marks errors worth another attempt.
pub trait Retryable {
    fn is_retryable(&self) -> bool;
}

/// Run `operation` until it succeeds, fails permanently, or attempts run out.
///
/// `label` names the operation in the warning emitted before each retry.
pub async fn with_retry<T, E, F, Fut>(config: &RetryConfig, label: &str, mut operation: F) -> Result<T, E>
where
    E: Retryable + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
{
    let mut attempt = 0;

    loop {
        attempt += 1;

        match operation().await {
            Ok(value) => return Ok(value),
            Err(error) if attempt < config.max_attempts && error.is_retryable() => {
                let base = config.delay_for(attempt);
                let delay = base + Duration::from_millis(jitter_ms(base.as_millis() as u64 / 4));
                tracing::warn!(
                    "[retry] {label} failed (attempt {attempt}/{}): {error}; retrying in {}ms",
                    config.max_attempts,
                    delay.as_millis()
                );
                sleep(delay).await;
            }
            Err(error) => return Err(error),
        }
    }
}

fn jitter_ms(max: u64) -> u64 {
    if max == 0 {
        return 0;
    }
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| u64::from(d.subsec_nanos()))
        .unwrap_or(0);
    nanos % max
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};

    #[derive(Debug)]
    struct FlakyError(&'static str);

    impl std::fmt::Display for FlakyError {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.0)
        }
    }

    impl Retryable for FlakyError {
        fn is_retryable(&self) -> bool {
            self.0 == "transient"
        }
    }

    fn fast(max_attempts: u32) -> RetryConfig {
        RetryConfig::new(max_attempts).with_initial_delay(Duration::from_millis(5))
    }

    #[tokio::test]
    async fn test_succeeds_after_transient_failures() {
        let counter = AtomicU32::new(0);
        let result = with_retry(&fast(3), "embed", || async {
            if counter.fetch_add(1, Ordering::SeqCst) < 2 {
                Err(FlakyError("transient"))
            } else {
                Ok("done")
            }
        })
        .await;

        assert_eq!(result.unwrap(), "done");
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_permanent_error_is_not_retried() {
        let counter = AtomicU32::new(0);
        let result = with_retry(&fast(3), "embed", || async {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(FlakyError("permanent"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_gives_up_after_max_attempts() {
        let counter = AtomicU32::new(0);
        let result = with_retry(&fast(3), "upsert", || async {
            counter.fetch_add(1, Ordering::SeqCst);
            Err::<(), _>(FlakyError("transient"))
        })
        .await;

        assert!(result.is_err());
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[test]
    fn test_delay_is_capped() {
        let config = RetryConfig {
            max_attempts: 10,
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(3),
            multiplier: 2.0,
        };
        assert_eq!(config.delay_for(1), Duration::from_secs(1));
        assert_eq!(config.delay_for(2), Duration::from_secs(2));
        assert_eq!(config.delay_for(5), Duration::from_secs(3));
    }
}
