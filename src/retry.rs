//! Retry with exponential backoff and jitter for API and model calls.

use crate::error::ApiError;
use crate::provider::ProviderError;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::warn;

/// Configuration for automatic retry of transient errors.
///
/// Defaults: 3 retries, 1s initial delay, 2x backoff, 30s max delay.
/// Use `RetryConfig::none()` to disable retries entirely.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of retry attempts (0 = no retries).
    pub max_retries: usize,
    /// Initial delay before the first retry (milliseconds).
    pub initial_delay_ms: u64,
    /// Multiplier applied to the delay after each attempt.
    pub backoff_multiplier: f64,
    /// Maximum delay between retries (milliseconds).
    pub max_delay_ms: u64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
            max_delay_ms: 30_000,
        }
    }
}

impl RetryConfig {
    /// No retries: fail on the first error.
    pub fn none() -> Self {
        Self {
            max_retries: 0,
            ..Default::default()
        }
    }

    /// Calculate the delay for a given attempt (1-indexed).
    /// Uses exponential backoff with ±20% jitter.
    pub fn delay_for_attempt(&self, attempt: usize) -> Duration {
        let exponent = attempt.saturating_sub(1).min(i32::MAX as usize) as i32;
        let base_ms = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(exponent);
        let capped_ms = base_ms.min(self.max_delay_ms as f64);

        // Jitter: ±20% (multiply by 0.8–1.2)
        let jitter = 0.8 + rand::random::<f64>() * 0.4;
        Duration::from_millis((capped_ms * jitter) as u64)
    }

    /// Delay before retry `attempt`, preferring a server-provided hint but
    /// never waiting longer than `max_delay_ms`.
    pub fn delay_with_hint(&self, attempt: usize, hint: Option<Duration>) -> Duration {
        match hint {
            Some(d) => d.min(Duration::from_millis(self.max_delay_ms)),
            None => self.delay_for_attempt(attempt),
        }
    }
}

/// Errors that know whether another attempt could succeed.
pub trait Retryable: std::fmt::Display {
    fn is_retryable(&self) -> bool;

    /// Server-specified delay before the next attempt, if any.
    fn retry_after(&self) -> Option<Duration> {
        None
    }
}

impl Retryable for ApiError {
    /// Retryable: rate limits (429), 5xx and network failures.
    /// Authentication, client and decoding errors are final.
    fn is_retryable(&self) -> bool {
        matches!(self, Self::Transient { .. })
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::Transient {
                retry_after_ms: Some(ms),
                ..
            } => Some(Duration::from_millis(*ms)),
            _ => None,
        }
    }
}

impl Retryable for ProviderError {
    fn is_retryable(&self) -> bool {
        matches!(self, Self::RateLimited { .. } | Self::Network(_))
    }

    fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited {
                retry_after_ms: Some(ms),
            } => Some(Duration::from_millis(*ms)),
            _ => None,
        }
    }
}

/// Sleep for `delay` unless cancelled first. Returns `false` on cancellation.
pub async fn sleep_or_cancel(delay: Duration, cancel: &CancellationToken) -> bool {
    tokio::select! {
        _ = cancel.cancelled() => false,
        _ = tokio::time::sleep(delay) => true,
    }
}

/// Log a retry attempt.
pub(crate) fn log_retry(attempt: usize, max: usize, delay: &Duration, error: &dyn Retryable) {
    warn!(
        "Request failed (attempt {}/{}), retrying in {:.1}s: {}",
        attempt,
        max,
        delay.as_secs_f64(),
        error
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn delays_grow_and_are_capped() {
        let config = RetryConfig {
            max_retries: 5,
            initial_delay_ms: 100,
            backoff_multiplier: 2.0,
            max_delay_ms: 500,
        };
        let first = config.delay_for_attempt(1).as_millis();
        assert!((80..=120).contains(&first), "first delay {}", first);
        let third = config.delay_for_attempt(3).as_millis();
        assert!((320..=480).contains(&third), "third delay {}", third);
        let tenth = config.delay_for_attempt(10).as_millis();
        assert!(tenth <= 600, "capped delay {}", tenth);
    }

    #[test]
    fn hint_is_bounded_by_max_delay() {
        let config = RetryConfig {
            max_delay_ms: 1000,
            ..Default::default()
        };
        assert_eq!(
            config.delay_with_hint(1, Some(Duration::from_secs(60))),
            Duration::from_secs(1)
        );
    }

    #[test]
    fn only_transient_api_errors_retry() {
        assert!(ApiError::transient(Some(503), "down").is_retryable());
        assert!(ApiError::transient(None, "reset").is_retryable());
        assert!(!ApiError::Authentication("revoked".into()).is_retryable());
        assert!(!ApiError::Client {
            status: 400,
            message: "bad".into()
        }
        .is_retryable());
    }

    #[tokio::test]
    async fn cancelled_sleep_returns_early() {
        let cancel = CancellationToken::new();
        cancel.cancel();
        assert!(!sleep_or_cancel(Duration::from_secs(30), &cancel).await);
    }
}
