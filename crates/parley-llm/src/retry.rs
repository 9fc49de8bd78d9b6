//! Retry logic with exponential backoff
//!
//! Backoff sleeps race the request's cancellation token, so a cancelled
//! request never waits out its remaining retries.

use crate::error::{Error, Result};
use crate::reasoner::{Decision, DecisionRequest, Reasoner};

use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    /// Maximum number of attempts, including the first
    pub max_attempts: u32,
    /// Initial delay between retries
    #[serde(with = "millis")]
    pub initial_delay: Duration,
    /// Maximum delay between retries
    #[serde(with = "millis")]
    pub max_delay: Duration,
    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,
    /// Add random jitter to delays
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay: Duration::from_millis(100),
            max_delay: Duration::from_secs(10),
            backoff_multiplier: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a new retry configuration
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Set maximum attempts
    #[must_use]
    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    /// Set initial delay
    #[must_use]
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set maximum delay
    #[must_use]
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set backoff multiplier
    #[must_use]
    pub fn with_backoff_multiplier(mut self, multiplier: f64) -> Self {
        self.backoff_multiplier = multiplier;
        self
    }

    /// Enable or disable jitter
    #[must_use]
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before the retry that follows attempt number `attempt`
    #[must_use]
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as u32) as i32;
        let base_delay = self.initial_delay.as_millis() as f64 * self.backoff_multiplier.powi(exponent);
        let delay_ms = base_delay.min(self.max_delay.as_millis() as f64) as u64;

        let final_delay = if self.jitter {
            // up to 25%
            delay_ms + rand_jitter(delay_ms / 4)
        } else {
            delay_ms
        };

        Duration::from_millis(final_delay)
    }
}

mod millis {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_millis() as u64)
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        u64::deserialize(deserializer).map(Duration::from_millis)
    }
}

/// Pseudo-random jitter from the clock's sub-second nanos
fn rand_jitter(max: u64) -> u64 {
    if max == 0 {
        return 0;
    }
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| u64::from(d.subsec_nanos()))
        .unwrap_or(0);
    nanos % max
}

/// Error type for retry operations
#[derive(Debug)]
pub struct RetryError<E> {
    /// The last error encountered
    pub last_error: E,
    /// Total number of attempts made
    pub attempts: u32,
    /// Retrying stopped because the token was cancelled
    pub cancelled: bool,
}

impl<E: std::fmt::Display> std::fmt::Display for RetryError<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "operation failed after {} attempts: {}",
            self.attempts, self.last_error
        )
    }
}

impl<E: std::fmt::Debug + std::fmt::Display> std::error::Error for RetryError<E> {}

/// Execute an async operation with retry logic
///
/// `is_retryable` decides whether an error is worth another attempt. The
/// backoff sleep ends early when `cancel` fires, and the last error is
/// returned with `cancelled` set.
pub async fn retry_with_backoff<T, E, F, Fut, R>(
    config: &RetryConfig,
    cancel: &CancellationToken,
    mut operation: F,
    is_retryable: R,
) -> std::result::Result<T, RetryError<E>>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = std::result::Result<T, E>>,
    R: Fn(&E) -> bool,
    E: std::fmt::Debug,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;
    loop {
        let error = match operation().await {
            Ok(result) => {
                if attempt > 1 {
                    debug!(attempt, "operation succeeded after retry");
                }
                return Ok(result);
            }
            Err(e) => e,
        };

        if attempt >= max_attempts || !is_retryable(&error) {
            debug!(attempt, error = ?error, "operation failed, no more retries");
            return Err(RetryError {
                last_error: error,
                attempts: attempt,
                cancelled: false,
            });
        }

        let delay = config.delay_for(attempt);
        warn!(
            attempt,
            max_attempts,
            delay_ms = delay.as_millis() as u64,
            error = ?error,
            "operation failed, retrying"
        );
        tokio::select! {
            _ = cancel.cancelled() => {
                return Err(RetryError {
                    last_error: error,
                    attempts: attempt,
                    cancelled: true,
                });
            }
            _ = tokio::time::sleep(delay) => {}
        }
        attempt += 1;
    }
}

/// Wraps a reasoner and retries its transient failures
pub struct RetryingReasoner<R> {
    inner: R,
    config: RetryConfig,
}

impl<R: Reasoner> RetryingReasoner<R> {
    /// Wrap `inner` with the given retry policy
    #[must_use]
    pub fn new(inner: R, config: RetryConfig) -> Self {
        Self { inner, config }
    }

    /// The wrapped reasoner
    #[must_use]
    pub fn inner(&self) -> &R {
        &self.inner
    }
}

#[async_trait::async_trait]
impl<R: Reasoner> Reasoner for RetryingReasoner<R> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    async fn decide(
        &self,
        request: DecisionRequest,
        cancel: &CancellationToken,
    ) -> Result<Decision> {
        retry_with_backoff(
            &self.config,
            cancel,
            || self.inner.decide(request.clone(), cancel),
            Error::is_transient,
        )
        .await
        .map_err(|e| if e.cancelled { Error::Cancelled } else { e.last_error })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockReasoner;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_retry_config_defaults() {
        let config = RetryConfig::default();
        assert_eq!(config.max_attempts, 3);
        assert_eq!(config.initial_delay, Duration::from_millis(100));
        assert_eq!(config.backoff_multiplier, 2.0);
    }

    #[test]
    fn test_delay_for() {
        let config = RetryConfig::new()
            .with_initial_delay(Duration::from_millis(100))
            .with_backoff_multiplier(2.0)
            .with_jitter(false);

        assert_eq!(config.delay_for(1), Duration::from_millis(100));
        assert_eq!(config.delay_for(2), Duration::from_millis(200));
        assert_eq!(config.delay_for(3), Duration::from_millis(400));
    }

    #[test]
    fn test_delay_respects_max() {
        let config = RetryConfig::new()
            .with_initial_delay(Duration::from_secs(1))
            .with_max_delay(Duration::from_secs(5))
            .with_backoff_multiplier(10.0)
            .with_jitter(false);

        assert_eq!(config.delay_for(3), Duration::from_secs(5));
    }

    #[test]
    fn test_config_deserializes_millis() {
        let config: RetryConfig =
            serde_json::from_str(r#"{"max_attempts": 5, "initial_delay": 250}"#).unwrap();
        assert_eq!(config.max_attempts, 5);
        assert_eq!(config.initial_delay, Duration::from_millis(250));
        assert_eq!(config.max_delay, Duration::from_secs(10));
    }

    #[tokio::test]
    async fn test_retry_success_after_failures() {
        let config = RetryConfig::new()
            .with_max_attempts(3)
            .with_initial_delay(Duration::from_millis(1));
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: std::result::Result<i32, RetryError<&str>> = retry_with_backoff(
            &config,
            &CancellationToken::new(),
            || {
                let c = counter_clone.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("transient error")
                    } else {
                        Ok(42)
                    }
                }
            },
            |_| true,
        )
        .await;

        assert_eq!(result.unwrap(), 42);
        assert_eq!(counter.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_retry_non_retryable_error() {
        let config = RetryConfig::new().with_initial_delay(Duration::from_millis(1));
        let counter = Arc::new(AtomicU32::new(0));
        let counter_clone = counter.clone();

        let result: std::result::Result<i32, RetryError<&str>> = retry_with_backoff(
            &config,
            &CancellationToken::new(),
            || {
                let c = counter_clone.clone();
                async move {
                    c.fetch_add(1, Ordering::SeqCst);
                    Err::<i32, &str>("non-retryable error")
                }
            },
            |_| false,
        )
        .await;

        let err = result.unwrap_err();
        assert_eq!(err.attempts, 1);
        assert!(!err.cancelled);
        assert_eq!(counter.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancel_stops_backoff() {
        let config = RetryConfig::new()
            .with_max_attempts(10)
            .with_initial_delay(Duration::from_secs(30))
            .with_jitter(false);
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(1)).await;
            trigger.cancel();
        });

        let result: std::result::Result<(), RetryError<&str>> =
            retry_with_backoff(&config, &cancel, || async { Err("down") }, |_| true).await;

        let err = result.unwrap_err();
        assert!(err.cancelled);
        assert_eq!(err.attempts, 1);
    }

    #[tokio::test]
    async fn test_retrying_reasoner_recovers_from_rate_limit() {
        let mock = MockReasoner::new().with_default_reply("recovered");
        mock.push_error(Error::RateLimit);
        mock.push_error(Error::Network("reset".into()));

        let reasoner = RetryingReasoner::new(
            mock.clone(),
            RetryConfig::new()
                .with_initial_delay(Duration::from_millis(1))
                .with_jitter(false),
        );

        let decision = reasoner
            .decide(DecisionRequest::default(), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(decision, Decision::reply("recovered"));
        assert_eq!(mock.requests().len(), 3);
    }

    #[tokio::test]
    async fn test_retrying_reasoner_does_not_retry_invalid_response() {
        let mock = MockReasoner::new();
        mock.push_error(Error::InvalidResponse("garbled".into()));
        let reasoner = RetryingReasoner::new(mock.clone(), RetryConfig::default());

        let result = reasoner
            .decide(DecisionRequest::default(), &CancellationToken::new())
            .await;
        assert!(matches!(result, Err(Error::InvalidResponse(_))));
        assert_eq!(mock.requests().len(), 1);
    }
}
