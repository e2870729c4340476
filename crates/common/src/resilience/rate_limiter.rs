//! Sliding-window rate limiting
//!
//! The limiter keeps a log of the instants at which the last `max_requests`
//! permits were granted. A new permit is granted only when fewer than
//! `max_requests` of those instants fall inside the trailing `window`, so no
//! interval of length `window` ever contains more than `max_requests`
//! admissions. Permits are never returned; budget frees up as old
//! admissions slide out of the window.

use std::collections::VecDeque;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

use parking_lot::Mutex;
use thiserror::Error;
use tracing::{debug, trace};

use super::{Clock, SystemClock};

/// Errors produced by [`SlidingWindowLimiter`]
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RateLimitError {
    #[error("invalid rate limiter configuration: {0}")]
    InvalidConfig(String),

    #[error("rate limit exhausted, next permit in {retry_after:?}")]
    Exhausted { retry_after: Duration },

    #[error("no permit within {timeout:?}, next permit in {retry_after:?}")]
    Timeout { timeout: Duration, retry_after: Duration },
}

/// `max_requests` admissions per trailing `window`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SlidingWindowConfig {
    pub max_requests: u32,
    pub window: Duration,
}

impl SlidingWindowConfig {
    /// Validated window config.
    ///
    /// # Errors
    /// `InvalidConfig` when either value is zero.
    pub fn new(max_requests: u32, window: Duration) -> Result<Self, RateLimitError> {
        let config = Self { max_requests, window };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RateLimitError> {
        if self.max_requests == 0 {
            return Err(RateLimitError::InvalidConfig(
                "max_requests must be greater than 0".to_string(),
            ));
        }
        if self.window.is_zero() {
            return Err(RateLimitError::InvalidConfig(
                "window must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

/// Proof of one admission
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Permit {
    admitted_at: Instant,
}

impl Permit {
    pub fn admitted_at(&self) -> Instant {
        self.admitted_at
    }
}

/// Shared sliding-window limiter
///
/// Clones share the same admission log.
///
/// # Examples
///
/// ```rust
/// use std::time::Duration;
///
/// use tfmkt_common::resilience::{SlidingWindowConfig, SlidingWindowLimiter};
///
/// let config = SlidingWindowConfig::new(2, Duration::from_secs(3)).unwrap();
/// let limiter = SlidingWindowLimiter::new(config);
///
/// assert!(limiter.try_acquire().is_ok());
/// assert!(limiter.try_acquire().is_ok());
/// assert!(limiter.try_acquire().is_err());
/// ```
pub struct SlidingWindowLimiter<C: Clock = SystemClock> {
    config: SlidingWindowConfig,
    admissions: Arc<Mutex<VecDeque<Instant>>>,
    clock: Arc<C>,
}

impl SlidingWindowLimiter<SystemClock> {
    /// Limiter on the tokio clock.
    pub fn new(config: SlidingWindowConfig) -> Self {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> SlidingWindowLimiter<C> {
    pub fn with_clock(config: SlidingWindowConfig, clock: C) -> Self {
        Self {
            admissions: Arc::new(Mutex::new(VecDeque::with_capacity(
                config.max_requests as usize,
            ))),
            clock: Arc::new(clock),
            config,
        }
    }

    pub fn config(&self) -> SlidingWindowConfig {
        self.config
    }

    /// Drops admissions that have slid out of the window ending at `now`.
    fn evict(&self, log: &mut VecDeque<Instant>, now: Instant) {
        while let Some(&oldest) = log.front() {
            if now.saturating_duration_since(oldest) >= self.config.window {
                log.pop_front();
            } else {
                break;
            }
        }
    }

    fn retry_after(&self, log: &VecDeque<Instant>, now: Instant) -> Duration {
        log.front()
            .map(|oldest| (*oldest + self.config.window).saturating_duration_since(now))
            .unwrap_or(Duration::ZERO)
    }

    /// Grants a permit if the window has room, without waiting.
    pub fn try_acquire(&self) -> Result<Permit, RateLimitError> {
        let now = self.clock.now();
        let mut log = self.admissions.lock();
        self.evict(&mut log, now);

        if log.len() < self.config.max_requests as usize {
            log.push_back(now);
            trace!(in_window = log.len(), max = self.config.max_requests, "Permit granted");
            return Ok(Permit { admitted_at: now });
        }

        Err(RateLimitError::Exhausted { retry_after: self.retry_after(&log, now) })
    }

    /// Waits for a permit for at most `timeout`.
    ///
    /// Fails immediately when the next slot opens after the deadline, so a
    /// zero timeout never sleeps.
    pub async fn acquire(&self, timeout: Duration) -> Result<Permit, RateLimitError> {
        let started = self.clock.now();

        loop {
            match self.try_acquire() {
                Ok(permit) => return Ok(permit),
                Err(RateLimitError::Exhausted { retry_after }) => {
                    let waited = self.clock.now().saturating_duration_since(started);
                    let remaining = timeout.saturating_sub(waited);
                    if retry_after > remaining {
                        return Err(RateLimitError::Timeout { timeout, retry_after });
                    }
                    debug!(wait_ms = retry_after.as_millis() as u64, "Waiting for rate limit window");
                    tokio::time::sleep(retry_after).await;
                }
                Err(other) => return Err(other),
            }
        }
    }

    /// Permits that could be granted right now.
    pub fn available(&self) -> u32 {
        let now = self.clock.now();
        let mut log = self.admissions.lock();
        self.evict(&mut log, now);
        self.config.max_requests.saturating_sub(log.len() as u32)
    }

    /// Time until the next permit frees up; zero when one is available.
    pub fn time_until_available(&self) -> Duration {
        let now = self.clock.now();
        let mut log = self.admissions.lock();
        self.evict(&mut log, now);
        if log.len() < self.config.max_requests as usize {
            Duration::ZERO
        } else {
            self.retry_after(&log, now)
        }
    }
}

impl<C: Clock> Clone for SlidingWindowLimiter<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config,
            admissions: Arc::clone(&self.admissions),
            clock: Arc::clone(&self.clock),
        }
    }
}

impl<C: Clock> fmt::Debug for SlidingWindowLimiter<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlidingWindowLimiter")
            .field("max_requests", &self.config.max_requests)
            .field("window", &self.config.window)
            .field("in_window", &self.admissions.lock().len())
            .finish()
    }
}
