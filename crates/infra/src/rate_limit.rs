//! Rate limiter adapters for the `FetchRateLimiter` port
//!
//! One limiter instance is shared by every fetch path in the process, so
//! client misses and scheduler refreshes draw from the same budget.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tfmkt_common::resilience::{RateLimitError, SlidingWindowConfig, SlidingWindowLimiter};
use tfmkt_core::FetchRateLimiter;
use tfmkt_domain::{RateLimitConfig, RateLimitFrequency, Result, TfmktError};
use tracing::info;

/// Sliding-window limiter behind the fetch port
#[derive(Clone, Debug)]
pub struct WindowedFetchLimiter {
    inner: SlidingWindowLimiter,
}

impl WindowedFetchLimiter {
    pub fn new(frequency: RateLimitFrequency) -> Result<Self> {
        let config = SlidingWindowConfig::new(frequency.max_requests, frequency.window)
            .map_err(|e| TfmktError::Config(e.to_string()))?;
        Ok(Self { inner: SlidingWindowLimiter::new(config) })
    }

    /// The underlying window, for inspection.
    pub fn limiter(&self) -> &SlidingWindowLimiter {
        &self.inner
    }
}

#[async_trait]
impl FetchRateLimiter for WindowedFetchLimiter {
    async fn acquire(&self, timeout: Duration) -> Result<()> {
        self.inner.acquire(timeout).await.map(|_| ()).map_err(map_rate_limit_error)
    }
}

/// Admits every fetch immediately
#[derive(Clone, Copy, Debug, Default)]
pub struct UnlimitedFetchLimiter;

#[async_trait]
impl FetchRateLimiter for UnlimitedFetchLimiter {
    async fn acquire(&self, _timeout: Duration) -> Result<()> {
        Ok(())
    }
}

/// Build the process-wide limiter described by `config`.
pub fn build_rate_limiter(config: &RateLimitConfig) -> Result<Arc<dyn FetchRateLimiter>> {
    if !config.enabled {
        info!("Outbound rate limiting disabled");
        return Ok(Arc::new(UnlimitedFetchLimiter));
    }

    info!(frequency = %config.frequency, "Outbound rate limiting enabled");
    Ok(Arc::new(WindowedFetchLimiter::new(config.frequency)?))
}

fn map_rate_limit_error(err: RateLimitError) -> TfmktError {
    match err {
        RateLimitError::InvalidConfig(msg) => TfmktError::Config(msg),
        other => TfmktError::RateLimited(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frequency(raw: &str) -> RateLimitFrequency {
        raw.parse().unwrap()
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_rejects_when_window_full() {
        let limiter = WindowedFetchLimiter::new(frequency("1/second")).unwrap();

        limiter.acquire(Duration::ZERO).await.unwrap();
        let err = limiter.acquire(Duration::ZERO).await.unwrap_err();

        assert!(matches!(err, TfmktError::RateLimited(_)));
    }

    #[tokio::test(start_paused = true)]
    async fn waits_for_next_window_within_timeout() {
        let limiter = WindowedFetchLimiter::new(frequency("2/3seconds")).unwrap();
        let started = tokio::time::Instant::now();

        for _ in 0..3 {
            limiter.acquire(Duration::from_secs(5)).await.unwrap();
        }

        assert!(started.elapsed() >= Duration::from_secs(3));
    }

    #[tokio::test]
    async fn disabled_config_is_unlimited() {
        let config = RateLimitConfig { enabled: false, ..RateLimitConfig::default() };
        let limiter = build_rate_limiter(&config).unwrap();

        for _ in 0..100 {
            limiter.acquire(Duration::ZERO).await.unwrap();
        }
    }

    #[tokio::test(start_paused = true)]
    async fn enabled_config_enforces_frequency() {
        let config = RateLimitConfig {
            enabled: true,
            frequency: frequency("2/minute"),
            ..RateLimitConfig::default()
        };
        let limiter = build_rate_limiter(&config).unwrap();

        limiter.acquire(Duration::ZERO).await.unwrap();
        limiter.acquire(Duration::ZERO).await.unwrap();
        assert!(limiter.acquire(Duration::from_secs(1)).await.is_err());
    }
}
