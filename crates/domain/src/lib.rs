//! # tfmkt Domain
//!
//! Domain types for the cached football-statistics service.
//!
//! This crate contains:
//! - Cache keys, entries and resolve results
//! - The error taxonomy and Result alias
//! - Configuration structures and their defaults
//!
//! ## Architecture
//! - No dependencies on other tfmkt crates
//! - Pure data; no I/O and no async

#![cfg_attr(test, allow(clippy::unwrap_used, clippy::expect_used, clippy::panic))]

pub mod config;
pub mod constants;
pub mod errors;
pub mod macros;
pub mod types;

pub use config::*;
pub use errors::*;
pub use types::*;
