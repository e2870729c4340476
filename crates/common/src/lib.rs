//! Common utilities shared across tfmkt crates.
//!
//! # Feature Tiers
//!
//! - `runtime` (default): async-aware primitives (clock, rate limiting)
//!
//! Nothing in this crate knows about the football domain.

#![forbid(unsafe_code)]
#![warn(rust_2018_idioms)]
#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

#[cfg(feature = "runtime")]
pub mod resilience;

#[cfg(feature = "runtime")]
pub use resilience::{Clock, MockClock, SystemClock};
