//! # tfmkt API
//!
//! HTTP layer - routes, application context and the server entry point.
//!
//! This crate contains:
//! - Axum routes (entity reads, cache inspection, health)
//! - Application context (dependency injection)
//! - Error-to-status mapping and logging setup
//!
//! ## Architecture
//! - Depends on `domain`, `core`, and `infra`
//! - Wires up the hexagonal architecture
//! - Holds no cache logic of its own

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod context;
pub mod error;
pub mod routes;
pub mod utils;

// Re-export for convenience
pub use context::AppContext;
pub use error::{ApiError, ApiResult};
pub use routes::router;
