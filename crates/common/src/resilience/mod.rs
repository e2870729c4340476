//! Resilience primitives
//!
//! Generic building blocks with no knowledge of football data:
//! - [`Clock`]: injectable time source with a [`MockClock`] for tests
//! - [`SlidingWindowLimiter`]: shared ceiling on operations per time window

pub mod clock;
pub mod rate_limiter;

pub use clock::{Clock, MockClock, SystemClock};
pub use rate_limiter::{Permit, RateLimitError, SlidingWindowConfig, SlidingWindowLimiter};
