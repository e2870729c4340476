//! Configuration structures
//!
//! Every section carries `#[serde(default)]` so a config file only needs the
//! values it overrides; `origin.base_url` is the one field with no useful
//! default and is checked by [`Config::validate`].

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::constants::{
    DEFAULT_BIND_ADDR, DEFAULT_CACHE_TTL_SECS, DEFAULT_DB_PATH, DEFAULT_DB_POOL_SIZE,
    DEFAULT_ORIGIN_TIMEOUT_SECS, DEFAULT_PRESERVED_FIELDS, DEFAULT_RATE_LIMIT_ACQUIRE_TIMEOUT_MS,
    DEFAULT_RATE_LIMIT_ENABLED, DEFAULT_REFRESH_CYCLE_DELAY_SECS,
    DEFAULT_REFRESH_ENABLED, DEFAULT_REFRESH_ITEM_DELAY_SECS, DEFAULT_REFRESH_ITEM_TIMEOUT_SECS,
};
use crate::errors::{Result, TfmktError};
use crate::impl_domain_enum_conversions;
use crate::types::{EntityKind, RateLimitFrequency};

/// Application configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub origin: OriginConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub cache: CacheConfig,
    #[serde(default)]
    pub refresh: RefreshConfig,
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    #[serde(default)]
    pub server: ServerConfig,
}

impl Config {
    /// Rejects values that would make the service misbehave at runtime.
    pub fn validate(&self) -> Result<()> {
        if self.origin.base_url.trim().is_empty() {
            return Err(TfmktError::Config("origin.base_url must be set".into()));
        }
        if self.cache.ttl_seconds == 0 {
            return Err(TfmktError::Config("cache.ttl_seconds must be positive".into()));
        }
        if self.database.backend == StorageBackend::Sqlite && self.database.pool_size == 0 {
            return Err(TfmktError::Config("database.pool_size must be positive".into()));
        }
        Ok(())
    }
}

/* -------------------------------------------------------------------------- */
/* Origin */
/* -------------------------------------------------------------------------- */

/// Where the fetcher retrieves entities from
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct OriginConfig {
    pub base_url: String,
    pub timeout_seconds: u64,
}

impl OriginConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_seconds)
    }
}

impl Default for OriginConfig {
    fn default() -> Self {
        Self { base_url: String::new(), timeout_seconds: DEFAULT_ORIGIN_TIMEOUT_SECS }
    }
}

/* -------------------------------------------------------------------------- */
/* Storage */
/* -------------------------------------------------------------------------- */

/// Cache store implementation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StorageBackend {
    #[default]
    Sqlite,
    Memory,
}

impl_domain_enum_conversions!(StorageBackend {
    Sqlite => "sqlite",
    Memory => "memory",
});

/// Cache store settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub backend: StorageBackend,
    pub path: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            backend: StorageBackend::default(),
            path: DEFAULT_DB_PATH.to_string(),
            pool_size: DEFAULT_DB_POOL_SIZE,
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Cache Policy */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub ttl_seconds: u64,
    /// Top-level payload fields carried over when a refresh omits them.
    pub preserved_fields: Vec<String>,
}

impl CacheConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_seconds)
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            ttl_seconds: DEFAULT_CACHE_TTL_SECS,
            preserved_fields: DEFAULT_PRESERVED_FIELDS.iter().map(|f| (*f).to_string()).collect(),
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Background Refresh */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RefreshConfig {
    pub enabled: bool,
    /// Pause between two refreshed items within one sweep.
    pub item_delay_seconds: u64,
    /// Pause between the end of one sweep and the start of the next.
    pub cycle_delay_seconds: u64,
    pub item_timeout_seconds: u64,
    /// Collections to sweep; empty means all.
    pub kinds: Vec<EntityKind>,
}

impl RefreshConfig {
    /// Pause between two refreshed keys.
    pub fn item_delay(&self) -> Duration {
        Duration::from_secs(self.item_delay_seconds)
    }

    /// Pause after a sweep before the next one.
    pub fn cycle_delay(&self) -> Duration {
        Duration::from_secs(self.cycle_delay_seconds)
    }

    /// Longest a single refresh may take.
    pub fn item_timeout(&self) -> Duration {
        Duration::from_secs(self.item_timeout_seconds)
    }
}

impl Default for RefreshConfig {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_REFRESH_ENABLED,
            item_delay_seconds: DEFAULT_REFRESH_ITEM_DELAY_SECS,
            cycle_delay_seconds: DEFAULT_REFRESH_CYCLE_DELAY_SECS,
            item_timeout_seconds: DEFAULT_REFRESH_ITEM_TIMEOUT_SECS,
            kinds: Vec::new(),
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Rate Limiting */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub enabled: bool,
    pub frequency: RateLimitFrequency,
    /// How long a fetch may wait for a permit; zero fails immediately.
    pub acquire_timeout_ms: u64,
}

impl RateLimitConfig {
    pub fn acquire_timeout(&self) -> Duration {
        Duration::from_millis(self.acquire_timeout_ms)
    }
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            enabled: DEFAULT_RATE_LIMIT_ENABLED,
            // Two requests per three seconds.
            frequency: RateLimitFrequency {
                max_requests: 2,
                window: Duration::from_secs(3),
            },
            acquire_timeout_ms: DEFAULT_RATE_LIMIT_ACQUIRE_TIMEOUT_MS,
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Server */
/* -------------------------------------------------------------------------- */

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_addr: DEFAULT_BIND_ADDR.to_string() }
    }
}
