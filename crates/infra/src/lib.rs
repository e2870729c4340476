//! # tfmkt Infrastructure
//!
//! Infrastructure implementations of core ports.
//!
//! This crate contains:
//! - Cache stores (SQLite via r2d2, in-memory)
//! - The HTTP origin client and fetcher
//! - The windowed fetch limiter
//! - Configuration loading from env and files
//! - The background refresh scheduler
//!
//! ## Architecture
//! - Implements traits defined in `tfmkt-core`
//! - Depends on `tfmkt-common`, `tfmkt-domain` and `tfmkt-core`
//! - Contains all "impure" code (I/O, timers, sockets)

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod config;
pub mod database;
pub mod errors;
pub mod http;
pub mod rate_limit;
pub mod scheduling;

// Re-export commonly used items
pub use database::{open_cache_store, DbManager, MemoryCacheStore, SqliteCacheStore};
pub use errors::InfraError;
pub use http::{HttpClient, HttpFetcher};
pub use rate_limit::{build_rate_limiter, UnlimitedFetchLimiter, WindowedFetchLimiter};
pub use scheduling::{RefreshScheduler, RefreshState, RefreshStats, SchedulerError, SweepReport};
