//! # tfmkt Core
//!
//! Cache logic with no infrastructure dependencies.
//!
//! This crate contains:
//! - Port interfaces for storage, origin fetching and rate limiting
//! - The [`CacheCoordinator`] that serves, fetches and falls back
//!
//! ## Architecture Principles
//! - Depends only on `tfmkt-domain` and `tfmkt-common`
//! - No database, HTTP, or filesystem code
//! - All external collaborators arrive as `Arc<dyn Port>`

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod cache;

pub use cache::{
    CacheCoordinator, CachePolicy, CacheStore, CoordinatorStats, FetchRateLimiter, Fetcher,
    ResolveMode,
};
