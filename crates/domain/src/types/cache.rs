//! Cache keys, entries and resolve results

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::errors::TfmktError;
use crate::impl_domain_enum_conversions;

/// Payload produced by the fetcher for one entity.
pub type Payload = Value;

/* -------------------------------------------------------------------------- */
/* Entity Kinds */
/* -------------------------------------------------------------------------- */

/// Cached collections
///
/// Each kind maps to one origin page type and one client route.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    Competitions,
    Clubs,
    Players,
    PlayerMarketValues,
    PlayerTransfers,
    PlayerJerseyNumbers,
    PlayerStats,
    PlayerAchievements,
    PlayerInjuries,
}

impl_domain_enum_conversions!(EntityKind {
    Competitions => "competitions",
    Clubs => "clubs",
    Players => "players",
    PlayerMarketValues => "player_market_values",
    PlayerTransfers => "player_transfers",
    PlayerJerseyNumbers => "player_jersey_numbers",
    PlayerStats => "player_stats",
    PlayerAchievements => "player_achievements",
    PlayerInjuries => "player_injuries",
});

impl EntityKind {
    /// Relative origin path serving this kind for `id`.
    pub fn origin_path(&self, id: &EntityId) -> String {
        match self {
            Self::Competitions => format!("competitions/{id}/clubs"),
            Self::Clubs => format!("clubs/{id}/profile"),
            Self::Players => format!("players/{id}/profile"),
            Self::PlayerMarketValues => format!("players/{id}/market_value"),
            Self::PlayerTransfers => format!("players/{id}/transfers"),
            Self::PlayerJerseyNumbers => format!("players/{id}/jersey_numbers"),
            Self::PlayerStats => format!("players/{id}/stats"),
            Self::PlayerAchievements => format!("players/{id}/achievements"),
            Self::PlayerInjuries => format!("players/{id}/injuries"),
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Keys */
/* -------------------------------------------------------------------------- */

/// Opaque origin identifier
///
/// Non-empty and usable verbatim as one URL path segment: dot segments,
/// separators, URL delimiters and control characters are rejected so two
/// distinct ids never address the same origin page.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct EntityId(String);

const RESERVED_ID_CHARS: &[char] = &['/', '\\', '?', '#', '%'];

impl EntityId {
    /// Trims and validates `raw`.
    ///
    /// # Errors
    /// `InvalidInput` for blank ids and ids that are not a single clean path
    /// segment.
    pub fn new(raw: impl Into<String>) -> Result<Self, TfmktError> {
        let raw = raw.into();
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(TfmktError::InvalidInput("entity id must not be empty".into()));
        }
        if trimmed == "." || trimmed == ".." {
            return Err(TfmktError::InvalidInput(format!(
                "entity id must not be a dot segment: {trimmed}"
            )));
        }
        let reserved = |c: &char| RESERVED_ID_CHARS.contains(c) || c.is_control();
        if let Some(c) = trimmed.chars().find(reserved) {
            return Err(TfmktError::InvalidInput(format!(
                "entity id must not contain {c:?}: {trimmed}"
            )));
        }
        Ok(Self(trimmed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for EntityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for EntityId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl TryFrom<String> for EntityId {
    type Error = TfmktError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<EntityId> for String {
    fn from(value: EntityId) -> Self {
        value.0
    }
}

/// Store lookup key: equal iff kind and id match exactly
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct CacheKey {
    pub kind: EntityKind,
    pub id: EntityId,
}

impl CacheKey {
    pub fn new(kind: EntityKind, id: EntityId) -> Self {
        Self { kind, id }
    }

    /// Builds a key from a raw id, validating it.
    pub fn parse(kind: EntityKind, id: &str) -> Result<Self, TfmktError> {
        Ok(Self::new(kind, EntityId::new(id)?))
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.kind, self.id)
    }
}

impl FromStr for CacheKey {
    type Err = TfmktError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, id) = s
            .split_once('/')
            .ok_or_else(|| TfmktError::InvalidInput(format!("expected <kind>/<id>, got {s}")))?;
        let kind = kind.parse::<EntityKind>().map_err(TfmktError::InvalidInput)?;
        Self::parse(kind, id)
    }
}

/* -------------------------------------------------------------------------- */
/* Entries */
/* -------------------------------------------------------------------------- */

/// One cached record
///
/// Created only from a successful fetch and replaced wholesale by the next
/// one; no history is kept.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    pub key: CacheKey,
    pub payload: Payload,
    pub fetched_at: DateTime<Utc>,
    pub ttl: Duration,
}

impl CacheEntry {
    pub fn new(key: CacheKey, payload: Payload, fetched_at: DateTime<Utc>, ttl: Duration) -> Self {
        Self { key, payload, fetched_at, ttl }
    }

    /// Age at `now`. A `fetched_at` in the future counts as zero.
    pub fn age(&self, now: DateTime<Utc>) -> Duration {
        now.signed_duration_since(self.fetched_at).to_std().unwrap_or(Duration::ZERO)
    }

    /// Fresh iff `now - fetched_at < ttl`.
    pub fn is_fresh(&self, now: DateTime<Utc>) -> bool {
        self.age(now) < self.ttl
    }

    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        !self.is_fresh(now)
    }
}

/* -------------------------------------------------------------------------- */
/* Resolve Results */
/* -------------------------------------------------------------------------- */

/// Where a resolved payload came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResolveSource {
    /// Fresh entry served without touching the origin.
    Cache,
    /// Fetched from the origin during this resolve.
    Origin,
    /// Last-known-good entry served after a failed fetch.
    Fallback,
}

impl_domain_enum_conversions!(ResolveSource {
    Cache => "cache",
    Origin => "origin",
    Fallback => "fallback",
});

/// Payload plus the metadata a client needs to judge it
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Resolved {
    pub payload: Payload,
    pub fetched_at: DateTime<Utc>,
    pub stale: bool,
    pub source: ResolveSource,
}

impl Resolved {
    /// A fresh entry served without fetching.
    pub fn from_cache(entry: &CacheEntry) -> Self {
        Self {
            payload: entry.payload.clone(),
            fetched_at: entry.fetched_at,
            stale: false,
            source: ResolveSource::Cache,
        }
    }

    /// An entry just written from a successful fetch.
    pub fn from_origin(entry: &CacheEntry) -> Self {
        Self {
            payload: entry.payload.clone(),
            fetched_at: entry.fetched_at,
            stale: false,
            source: ResolveSource::Origin,
        }
    }

    /// The last known entry served after an origin failure; `stale`
    /// reflects its actual age at `now`.
    pub fn fallback(entry: &CacheEntry, now: DateTime<Utc>) -> Self {
        Self {
            payload: entry.payload.clone(),
            fetched_at: entry.fetched_at,
            stale: entry.is_stale(now),
            source: ResolveSource::Fallback,
        }
    }
}

/* -------------------------------------------------------------------------- */
/* Listing */
/* -------------------------------------------------------------------------- */

/// Pagination window for collection listings; no limit means everything
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Page {
    pub limit: Option<u32>,
    #[serde(default)]
    pub skip: u32,
}

/// Number of cached items in one collection
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CollectionCount {
    pub collection_name: String,
    pub count: u64,
}
