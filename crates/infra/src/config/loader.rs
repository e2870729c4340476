//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If `TFMKT_ORIGIN_BASE_URL` is missing or a value is invalid, falls back
//!    to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! - `TFMKT_ORIGIN_BASE_URL`: Origin base URL (required)
//! - `TFMKT_ORIGIN_TIMEOUT_SECS`: Per-request origin timeout
//! - `TFMKT_DB_BACKEND`: `sqlite` or `memory`
//! - `TFMKT_DB_PATH`: Database file path
//! - `TFMKT_DB_POOL_SIZE`: Connection pool size
//! - `TFMKT_CACHE_TTL_SECS`: Cache entry lifetime
//! - `TFMKT_CACHE_PRESERVED_FIELDS`: Comma separated payload fields kept
//!   across refreshes
//! - `TFMKT_BG_REFRESH_ENABLED`: Whether the background sweep runs
//! - `TFMKT_BG_REFRESH_SCRAPE_DELAY`: Seconds between refreshed items
//! - `TFMKT_BG_REFRESH_CYCLE_DELAY`: Seconds between sweeps
//! - `TFMKT_BG_REFRESH_KINDS`: Comma separated collections to sweep
//! - `TFMKT_RATE_LIMITING_ENABLE`: Whether outbound fetches are limited
//! - `TFMKT_RATE_LIMITING_FREQUENCY`: Limit such as `2/3seconds`
//! - `TFMKT_RATE_LIMIT_ACQUIRE_TIMEOUT_MS`: Longest wait for a permit
//! - `TFMKT_SERVER_ADDR`: HTTP bind address
//!
//! ## File Locations
//! The loader probes the following paths (in order):
//! 1. `./config.json` or `./config.toml` (current working directory)
//! 2. `./tfmkt.json` or `./tfmkt.toml` (current working directory)
//! 3. `../config.json` or `../config.toml` (parent directory)
//! 4. `../../config.json` or `../../config.toml` (grandparent directory)
//! 5. Relative to executable location

use std::path::{Path, PathBuf};
use std::str::FromStr;

use tfmkt_domain::{
    CacheConfig, Config, DatabaseConfig, EntityKind, OriginConfig, RateLimitConfig,
    RateLimitFrequency, RefreshConfig, Result, ServerConfig, StorageBackend, TfmktError,
};

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If the required
/// variable is missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `TfmktError::Config` if configuration cannot be loaded from
/// either source or a file is malformed.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = ?e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// Only `TFMKT_ORIGIN_BASE_URL` is required; every other value falls back
/// to its default.
///
/// # Errors
/// Returns `TfmktError::Config` if the required variable is missing or any
/// variable has an invalid value.
pub fn load_from_env() -> Result<Config> {
    let defaults = Config::default();

    let origin = OriginConfig {
        base_url: env_var("TFMKT_ORIGIN_BASE_URL")?,
        timeout_seconds: env_parse("TFMKT_ORIGIN_TIMEOUT_SECS", defaults.origin.timeout_seconds)?,
    };

    let database = DatabaseConfig {
        backend: env_parse::<StorageBackend>("TFMKT_DB_BACKEND", defaults.database.backend)?,
        path: std::env::var("TFMKT_DB_PATH").unwrap_or(defaults.database.path),
        pool_size: env_parse("TFMKT_DB_POOL_SIZE", defaults.database.pool_size)?,
    };

    let cache = CacheConfig {
        ttl_seconds: env_parse("TFMKT_CACHE_TTL_SECS", defaults.cache.ttl_seconds)?,
        preserved_fields: env_list("TFMKT_CACHE_PRESERVED_FIELDS")
            .unwrap_or(defaults.cache.preserved_fields),
    };

    let kinds = match env_list("TFMKT_BG_REFRESH_KINDS") {
        Some(names) => names
            .iter()
            .map(|name| {
                name.parse::<EntityKind>().map_err(|e| {
                    TfmktError::Config(format!("Invalid TFMKT_BG_REFRESH_KINDS entry: {e}"))
                })
            })
            .collect::<Result<Vec<_>>>()?,
        None => defaults.refresh.kinds,
    };

    let refresh = RefreshConfig {
        enabled: env_bool("TFMKT_BG_REFRESH_ENABLED", defaults.refresh.enabled),
        item_delay_seconds: env_parse(
            "TFMKT_BG_REFRESH_SCRAPE_DELAY",
            defaults.refresh.item_delay_seconds,
        )?,
        cycle_delay_seconds: env_parse(
            "TFMKT_BG_REFRESH_CYCLE_DELAY",
            defaults.refresh.cycle_delay_seconds,
        )?,
        item_timeout_seconds: defaults.refresh.item_timeout_seconds,
        kinds,
    };

    let rate_limit = RateLimitConfig {
        enabled: env_bool("TFMKT_RATE_LIMITING_ENABLE", defaults.rate_limit.enabled),
        frequency: env_parse::<RateLimitFrequency>(
            "TFMKT_RATE_LIMITING_FREQUENCY",
            defaults.rate_limit.frequency,
        )?,
        acquire_timeout_ms: env_parse(
            "TFMKT_RATE_LIMIT_ACQUIRE_TIMEOUT_MS",
            defaults.rate_limit.acquire_timeout_ms,
        )?,
    };

    let server = ServerConfig {
        bind_addr: std::env::var("TFMKT_SERVER_ADDR").unwrap_or(defaults.server.bind_addr),
    };

    Ok(Config { origin, database, cache, refresh, rate_limit, server })
}

/// Load configuration from a file
///
/// If `path` is `None`, probes multiple locations for config files.
/// Supports both JSON and TOML formats (detected by file extension).
///
/// # Errors
/// Returns `TfmktError::Config` if:
/// - File not found (when path is specified)
/// - No config file found (when path is `None`)
/// - File format is invalid
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(TfmktError::Config(format!("Config file not found: {}", p.display())));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            TfmktError::Config("No config file found in any of the standard locations".to_string())
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| TfmktError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

/// Parse configuration from string content
///
/// Format is detected by file extension (`.json` or `.toml`).
fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| TfmktError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| TfmktError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(TfmktError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe multiple paths for configuration files
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut candidates = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        candidates.extend(candidate_files(&cwd));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            candidates.extend(candidate_files(exe_dir));
        }
    }

    candidates.into_iter().find(|path| path.exists())
}

fn candidate_files(dir: &Path) -> Vec<PathBuf> {
    vec![
        dir.join("config.json"),
        dir.join("config.toml"),
        dir.join("tfmkt.json"),
        dir.join("tfmkt.toml"),
        dir.join("../config.json"),
        dir.join("../config.toml"),
        dir.join("../../config.json"),
        dir.join("../../config.toml"),
    ]
}

/// Get required environment variable
///
/// # Errors
/// Returns `TfmktError::Config` if the variable is not set or blank.
fn env_var(key: &str) -> Result<String> {
    std::env::var(key)
        .ok()
        .filter(|v| !v.trim().is_empty())
        .ok_or_else(|| TfmktError::Config(format!("Missing required environment variable: {}", key)))
}

/// Parse an optional environment variable, using `default` when unset.
fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| TfmktError::Config(format!("Invalid value for {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.trim().to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}

/// Comma separated list; blank items are dropped.
fn env_list(key: &str) -> Option<Vec<String>> {
    std::env::var(key).ok().map(|raw| {
        raw.split(',').map(str::trim).filter(|s| !s.is_empty()).map(str::to_string).collect()
    })
}
