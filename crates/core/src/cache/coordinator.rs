//! Cache coordinator - every read goes through here
//!
//! Serves fresh entries straight from the store, otherwise fetches under a
//! rate-limit permit with one fetch per key in flight, and falls back to the
//! last-known-good entry when the origin fails.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tfmkt_common::resilience::{Clock, SystemClock};
use tfmkt_domain::constants::{
    DEFAULT_CACHE_TTL_SECS, DEFAULT_PRESERVED_FIELDS, DEFAULT_RATE_LIMIT_ACQUIRE_TIMEOUT_MS,
};
use tfmkt_domain::{
    CacheConfig, CacheEntry, CacheKey, Payload, RateLimitConfig, Resolved, Result, TfmktError,
};
use tracing::{debug, error, info, warn};

use super::in_flight::{InFlightTable, Join};
use super::ports::{CacheStore, FetchRateLimiter, Fetcher};

/// Freshness and fetch policy applied by the coordinator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CachePolicy {
    /// Lifetime stamped on every entry written.
    pub ttl: Duration,
    /// Longest a fetch waits for a rate-limit permit.
    pub acquire_timeout: Duration,
    /// Top-level payload fields kept from the previous entry when a fresh
    /// fetch does not carry them.
    pub preserved_fields: Vec<String>,
}

impl CachePolicy {
    /// Policy from the `cache` and `rate_limit` config sections.
    pub fn from_config(cache: &CacheConfig, rate_limit: &RateLimitConfig) -> Self {
        Self {
            ttl: cache.ttl(),
            acquire_timeout: rate_limit.acquire_timeout(),
            preserved_fields: cache.preserved_fields.clone(),
        }
    }

    /// Same policy with a different entry lifetime.
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    pub fn with_acquire_timeout(mut self, timeout: Duration) -> Self {
        self.acquire_timeout = timeout;
        self
    }
}

impl Default for CachePolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(DEFAULT_CACHE_TTL_SECS),
            acquire_timeout: Duration::from_millis(DEFAULT_RATE_LIMIT_ACQUIRE_TIMEOUT_MS),
            preserved_fields: DEFAULT_PRESERVED_FIELDS.iter().map(|f| (*f).to_string()).collect(),
        }
    }
}

/// How a resolve treats an existing entry
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResolveMode {
    /// Serve a fresh entry without fetching.
    CacheFirst,
    /// Fetch even if the entry is still fresh.
    ForceRefresh,
}

/// Cumulative coordinator counters
#[derive(Debug, Default)]
struct CoordinatorCounters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale: AtomicU64,
    fetches: AtomicU64,
    fetch_failures: AtomicU64,
    fallbacks: AtomicU64,
    coalesced: AtomicU64,
    rate_limited: AtomicU64,
}

impl CoordinatorCounters {
    fn bump(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    fn snapshot(&self) -> CoordinatorStats {
        CoordinatorStats {
            hits: self.hits.load(Ordering::Relaxed),
            misses: self.misses.load(Ordering::Relaxed),
            stale: self.stale.load(Ordering::Relaxed),
            fetches: self.fetches.load(Ordering::Relaxed),
            fetch_failures: self.fetch_failures.load(Ordering::Relaxed),
            fallbacks: self.fallbacks.load(Ordering::Relaxed),
            coalesced: self.coalesced.load(Ordering::Relaxed),
            rate_limited: self.rate_limited.load(Ordering::Relaxed),
        }
    }
}

/// Point-in-time copy of the coordinator counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct CoordinatorStats {
    pub hits: u64,
    pub misses: u64,
    pub stale: u64,
    pub fetches: u64,
    pub fetch_failures: u64,
    pub fallbacks: u64,
    pub coalesced: u64,
    pub rate_limited: u64,
}

/// Mediates every cache read
///
/// Shared by the request path and the refresh scheduler; wrap in `Arc`.
pub struct CacheCoordinator {
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetcher>,
    limiter: Arc<dyn FetchRateLimiter>,
    clock: Arc<dyn Clock>,
    policy: CachePolicy,
    flights: InFlightTable,
    counters: CoordinatorCounters,
}

impl CacheCoordinator {
    /// Coordinator on the system clock.
    pub fn new(
        store: Arc<dyn CacheStore>,
        fetcher: Arc<dyn Fetcher>,
        limiter: Arc<dyn FetchRateLimiter>,
        policy: CachePolicy,
    ) -> Self {
        Self {
            store,
            fetcher,
            limiter,
            clock: Arc::new(SystemClock),
            policy,
            flights: InFlightTable::default(),
            counters: CoordinatorCounters::default(),
        }
    }

    /// Replace the clock used for freshness checks and `fetched_at` stamps.
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn policy(&self) -> &CachePolicy {
        &self.policy
    }

    /// The backing store, for listings and key enumeration.
    pub fn store(&self) -> &Arc<dyn CacheStore> {
        &self.store
    }

    pub fn stats(&self) -> CoordinatorStats {
        self.counters.snapshot()
    }

    /// Number of fetches currently in flight.
    pub fn in_flight(&self) -> usize {
        self.flights.len()
    }

    /// Client read: fresh entries are served without fetching.
    pub async fn resolve(&self, key: &CacheKey) -> Result<Resolved> {
        self.resolve_with(key, ResolveMode::CacheFirst).await
    }

    /// Proactive refresh: fetches even when the entry is fresh.
    pub async fn refresh(&self, key: &CacheKey) -> Result<Resolved> {
        self.resolve_with(key, ResolveMode::ForceRefresh).await
    }

    /// Resolves `key` under an explicit [`ResolveMode`].
    ///
    /// # Errors
    /// `RateLimited` or `StorageUnavailable` always surface. Origin failures
    /// surface only when nothing is cached for `key`.
    pub async fn resolve_with(&self, key: &CacheKey, mode: ResolveMode) -> Result<Resolved> {
        if mode == ResolveMode::CacheFirst {
            match self.read(key).await? {
                Some(entry) if entry.is_fresh(self.now()) => {
                    CoordinatorCounters::bump(&self.counters.hits);
                    debug!(%key, "Cache hit");
                    return Ok(Resolved::from_cache(&entry));
                }
                Some(_) => CoordinatorCounters::bump(&self.counters.stale),
                None => CoordinatorCounters::bump(&self.counters.misses),
            }
        }

        match self.flights.join(key) {
            Join::Follower(waiter) => {
                CoordinatorCounters::bump(&self.counters.coalesced);
                debug!(%key, "Joining in-flight fetch");
                match waiter.wait().await {
                    // The leader may have been cancelled before publishing.
                    Err(err) if err.is_origin_failure() => {
                        let previous = self.read(key).await?;
                        self.fall_back(key, err, previous)
                    }
                    outcome => outcome,
                }
            }
            Join::Leader(guard) => {
                let outcome = self.lead(key, mode).await;
                guard.complete(&outcome);
                outcome
            }
        }
    }

    /// Sets one top-level payload field on a cached entry.
    ///
    /// `fetched_at` and `ttl` are left untouched, so the entry keeps its
    /// place in the freshness timeline.
    pub async fn annotate(&self, key: &CacheKey, field: &str, value: Value) -> Result<CacheEntry> {
        let field = field.trim();
        if field.is_empty() {
            return Err(TfmktError::InvalidInput("annotation field must not be empty".into()));
        }

        let mut entry = self
            .read(key)
            .await?
            .ok_or_else(|| TfmktError::NotFound(format!("no cached entry for {key}")))?;

        let object = entry.payload.as_object_mut().ok_or_else(|| {
            TfmktError::InvalidInput(format!("cached payload for {key} is not an object"))
        })?;
        object.insert(field.to_string(), value);

        self.write(entry.clone()).await?;
        info!(%key, field, "Annotated cache entry");
        Ok(entry)
    }

    fn now(&self) -> DateTime<Utc> {
        DateTime::<Utc>::from(self.clock.system_time())
    }

    async fn read(&self, key: &CacheKey) -> Result<Option<CacheEntry>> {
        self.store.get(key).await.inspect_err(|e| {
            error!(%key, error = %e, "Cache store read failed");
        })
    }

    async fn write(&self, entry: CacheEntry) -> Result<()> {
        let key = entry.key.clone();
        self.store.put(entry).await.inspect_err(|e| {
            error!(%key, error = %e, "Cache store write failed");
        })
    }

    /// Runs the fetch for a flight this caller owns.
    async fn lead(&self, key: &CacheKey, mode: ResolveMode) -> Result<Resolved> {
        // A flight that finished between the first read and joining may
        // already have populated the entry.
        let previous = self.read(key).await?;
        if mode == ResolveMode::CacheFirst {
            if let Some(entry) = previous.as_ref().filter(|e| e.is_fresh(self.now())) {
                debug!(%key, "Entry populated by a previous flight");
                return Ok(Resolved::from_cache(entry));
            }
        }

        self.fetch_and_populate(key, previous).await
    }

    async fn fetch_and_populate(
        &self,
        key: &CacheKey,
        previous: Option<CacheEntry>,
    ) -> Result<Resolved> {
        if let Err(err) = self.limiter.acquire(self.policy.acquire_timeout).await {
            CoordinatorCounters::bump(&self.counters.rate_limited);
            warn!(%key, error = %err, "No fetch permit");
            return Err(err);
        }

        CoordinatorCounters::bump(&self.counters.fetches);
        let started = self.clock.now();

        match self.fetcher.fetch(key.kind, &key.id).await {
            Ok(mut payload) => {
                // Pick up annotations written while the fetch was running.
                let latest = self.read(key).await?;
                self.carry_preserved_fields(latest.as_ref(), &mut payload);
                let entry = CacheEntry::new(key.clone(), payload, self.now(), self.policy.ttl);
                self.write(entry.clone()).await?;
                info!(
                    %key,
                    elapsed_ms = self.clock.now().saturating_duration_since(started).as_millis() as u64,
                    "Fetched from origin"
                );
                Ok(Resolved::from_origin(&entry))
            }
            Err(err) if err.is_origin_failure() => {
                CoordinatorCounters::bump(&self.counters.fetch_failures);
                self.fall_back(key, err, previous)
            }
            Err(err) => {
                CoordinatorCounters::bump(&self.counters.fetch_failures);
                error!(%key, error = %err, "Fetcher failed");
                Err(err)
            }
        }
    }

    /// Serves `previous` in place of an origin failure, if there is one.
    fn fall_back(
        &self,
        key: &CacheKey,
        err: TfmktError,
        previous: Option<CacheEntry>,
    ) -> Result<Resolved> {
        match previous {
            Some(entry) => {
                CoordinatorCounters::bump(&self.counters.fallbacks);
                warn!(
                    %key,
                    error = %err,
                    fetched_at = %entry.fetched_at,
                    "Fetch failed, serving last known entry"
                );
                Ok(Resolved::fallback(&entry, self.now()))
            }
            None => {
                warn!(%key, error = %err, "Fetch failed with nothing cached");
                Err(err)
            }
        }
    }

    fn carry_preserved_fields(&self, previous: Option<&CacheEntry>, payload: &mut Payload) {
        let Some(old) = previous.and_then(|e| e.payload.as_object()) else { return };
        let Some(new) = payload.as_object_mut() else { return };

        for field in &self.policy.preserved_fields {
            if new.contains_key(field) {
                continue;
            }
            if let Some(value) = old.get(field) {
                new.insert(field.clone(), value.clone());
            }
        }
    }
}
