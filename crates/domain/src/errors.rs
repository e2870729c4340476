//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Main error type for tfmkt
///
/// The first four variants are the cache subsystem's taxonomy and must stay
/// distinguishable all the way to the client: an origin outage, a rate-limit
/// rejection and a storage outage each map to their own status code.
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum TfmktError {
    /// Origin unreachable or returned a malformed response.
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    /// No permit could be obtained within the allowed wait.
    #[error("Rate limited: {0}")]
    RateLimited(String),

    /// Cache backend is down.
    #[error("Storage unavailable: {0}")]
    StorageUnavailable(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl TfmktError {
    /// Errors produced by the origin side of a fetch.
    ///
    /// These are the only failures a stale entry may paper over.
    pub fn is_origin_failure(&self) -> bool {
        matches!(self, Self::FetchFailed(_) | Self::NotFound(_))
    }

    /// Short machine-readable label, stable across releases.
    pub fn label(&self) -> &'static str {
        match self {
            Self::FetchFailed(_) => "fetch_failed",
            Self::RateLimited(_) => "rate_limited",
            Self::StorageUnavailable(_) => "storage_unavailable",
            Self::NotFound(_) => "not_found",
            Self::Config(_) => "config",
            Self::InvalidInput(_) => "invalid_input",
            Self::Internal(_) => "internal",
        }
    }
}

/// Result type alias for tfmkt operations
pub type Result<T> = std::result::Result<T, TfmktError>;
