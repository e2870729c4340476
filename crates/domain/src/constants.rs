//! Application constants
//!
//! Defaults for every tunable knob live here so the config structs, the
//! loader and the docs agree on one value.

// Cache
/// Three days.
pub const DEFAULT_CACHE_TTL_SECS: u64 = 3 * 24 * 60 * 60;
pub const DEFAULT_PRESERVED_FIELDS: &[&str] = &["isLbPlayer"];

// Background refresh
pub const DEFAULT_REFRESH_ENABLED: bool = true;
pub const DEFAULT_REFRESH_ITEM_DELAY_SECS: u64 = 10;
pub const DEFAULT_REFRESH_CYCLE_DELAY_SECS: u64 = 6000;
pub const DEFAULT_REFRESH_ITEM_TIMEOUT_SECS: u64 = 120;

// Rate limiting
pub const DEFAULT_RATE_LIMIT_ENABLED: bool = false;
/// Two requests per three seconds.
pub const DEFAULT_RATE_LIMIT_FREQUENCY: &str = "2/3seconds";
pub const DEFAULT_RATE_LIMIT_ACQUIRE_TIMEOUT_MS: u64 = 10_000;

// Storage
pub const DEFAULT_DB_PATH: &str = "tfmkt-cache.db";
pub const DEFAULT_DB_POOL_SIZE: u32 = 8;

// Origin
pub const DEFAULT_ORIGIN_TIMEOUT_SECS: u64 = 30;
pub const DEFAULT_ORIGIN_USER_AGENT: &str = concat!("tfmkt/", env!("CARGO_PKG_VERSION"));

// Server
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";
