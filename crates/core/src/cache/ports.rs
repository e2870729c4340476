//! Port interfaces for the cache subsystem
//!
//! These traits define the boundaries between the coordinator and the
//! infrastructure that stores, fetches and throttles.

use std::time::Duration;

use async_trait::async_trait;
use tfmkt_domain::{CacheEntry, CacheKey, EntityId, EntityKind, Page, Payload, Result};

/// Persistent `(kind, id)`-keyed map of cache entries
///
/// Implementations signal backend failures as `StorageUnavailable` and never
/// retry internally.
#[async_trait]
pub trait CacheStore: Send + Sync {
    /// Entry for `key`, if any. No side effects.
    async fn get(&self, key: &CacheKey) -> Result<Option<CacheEntry>>;

    /// Replaces any existing entry for `entry.key` atomically.
    async fn put(&self, entry: CacheEntry) -> Result<()>;

    /// Evicts `key`; returns whether an entry existed.
    async fn remove(&self, key: &CacheKey) -> Result<bool>;

    /// Stored keys ordered by kind then id; an empty `kinds` means all kinds.
    async fn keys(&self, kinds: &[EntityKind]) -> Result<Vec<CacheKey>>;

    async fn count(&self, kind: EntityKind) -> Result<u64>;

    /// Entries of one kind ordered by id.
    async fn list(&self, kind: EntityKind, page: Page) -> Result<Vec<CacheEntry>>;
}

/// Origin retrieval for one entity
///
/// `NotFound` means the origin has no such entity; any other origin problem
/// is `FetchFailed`.
#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, kind: EntityKind, id: &EntityId) -> Result<Payload>;
}

/// Shared ceiling on outbound fetches
#[async_trait]
pub trait FetchRateLimiter: Send + Sync {
    /// Consumes one unit of budget, waiting at most `timeout` for it.
    ///
    /// Fails with `RateLimited` when no permit is available in time.
    async fn acquire(&self, timeout: Duration) -> Result<()>;
}
