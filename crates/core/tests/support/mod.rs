//! Shared test helpers for `tfmkt-core` integration tests.
//!
//! Lightweight in-memory implementations of the cache ports so tests can
//! script origin behaviour and inspect what the coordinator did.

#![allow(dead_code)]

use std::collections::{BTreeMap, HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::{Duration, UNIX_EPOCH};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;
use tfmkt_common::resilience::{MockClock, SlidingWindowLimiter};
use tfmkt_core::{CacheCoordinator, CachePolicy, CacheStore, FetchRateLimiter, Fetcher};
use tfmkt_domain::{
    CacheEntry, CacheKey, EntityId, EntityKind, Page, Payload, Result as DomainResult, TfmktError,
};

pub fn player(id: &str) -> CacheKey {
    CacheKey::parse(EntityKind::Players, id).unwrap()
}

// 2024-08-01T12:00:00Z
const T0_EPOCH_SECS: u64 = 1_722_513_600;

pub fn mock_clock() -> MockClock {
    MockClock::starting_at(UNIX_EPOCH + Duration::from_secs(T0_EPOCH_SECS))
}

/* -------------------------------------------------------------------------- */
/* Store */
/* -------------------------------------------------------------------------- */

/// In-memory `CacheStore` with switchable failures.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<CacheKey, CacheEntry>>,
    fail_reads: AtomicBool,
    fail_writes: AtomicBool,
    writes: AtomicUsize,
}

impl MemoryStore {
    pub fn seeded(entries: impl IntoIterator<Item = CacheEntry>) -> Self {
        let store = Self::default();
        {
            let mut map = store.entries.lock().unwrap();
            for entry in entries {
                map.insert(entry.key.clone(), entry);
            }
        }
        store
    }

    pub fn entry(&self, key: &CacheKey) -> Option<CacheEntry> {
        self.entries.lock().unwrap().get(key).cloned()
    }

    pub fn fail_reads(&self, fail: bool) {
        self.fail_reads.store(fail, Ordering::SeqCst);
    }

    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    pub fn writes(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check(&self, flag: &AtomicBool) -> DomainResult<()> {
        if flag.load(Ordering::SeqCst) {
            return Err(TfmktError::StorageUnavailable("disk detached".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl CacheStore for MemoryStore {
    async fn get(&self, key: &CacheKey) -> DomainResult<Option<CacheEntry>> {
        self.check(&self.fail_reads)?;
        Ok(self.entry(key))
    }

    async fn put(&self, entry: CacheEntry) -> DomainResult<()> {
        self.check(&self.fail_writes)?;
        self.writes.fetch_add(1, Ordering::SeqCst);
        self.entries.lock().unwrap().insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> DomainResult<bool> {
        self.check(&self.fail_writes)?;
        Ok(self.entries.lock().unwrap().remove(key).is_some())
    }

    async fn keys(&self, kinds: &[EntityKind]) -> DomainResult<Vec<CacheKey>> {
        self.check(&self.fail_reads)?;
        Ok(self
            .entries
            .lock()
            .unwrap()
            .keys()
            .filter(|k| kinds.is_empty() || kinds.contains(&k.kind))
            .cloned()
            .collect())
    }

    async fn count(&self, kind: EntityKind) -> DomainResult<u64> {
        Ok(self.keys(&[kind]).await?.len() as u64)
    }

    async fn list(&self, kind: EntityKind, page: Page) -> DomainResult<Vec<CacheEntry>> {
        self.check(&self.fail_reads)?;
        let map = self.entries.lock().unwrap();
        let items = map.values().filter(|e| e.key.kind == kind).skip(page.skip as usize);
        Ok(match page.limit {
            Some(limit) => items.take(limit as usize).cloned().collect(),
            None => items.cloned().collect(),
        })
    }
}

/* -------------------------------------------------------------------------- */
/* Fetcher */
/* -------------------------------------------------------------------------- */

/// Fetcher that replays scripted results and counts calls.
///
/// Scripted results are consumed in order; once the script is empty the
/// fallback result is returned.
pub struct ScriptedFetcher {
    script: Mutex<VecDeque<DomainResult<Payload>>>,
    fallback: Mutex<DomainResult<Payload>>,
    calls: Mutex<HashMap<CacheKey, usize>>,
    total: AtomicUsize,
    delay: Duration,
    hang: bool,
}

impl ScriptedFetcher {
    pub fn returning(payload: Value) -> Self {
        Self::with_fallback(Ok(payload))
    }

    pub fn failing(error: TfmktError) -> Self {
        Self::with_fallback(Err(error))
    }

    /// Never completes; used to tear down a leader mid-fetch.
    pub fn hanging() -> Self {
        Self { hang: true, ..Self::failing(TfmktError::Internal("unreachable".into())) }
    }

    fn with_fallback(fallback: DomainResult<Payload>) -> Self {
        Self {
            script: Mutex::new(VecDeque::new()),
            fallback: Mutex::new(fallback),
            calls: Mutex::new(HashMap::new()),
            total: AtomicUsize::new(0),
            delay: Duration::ZERO,
            hang: false,
        }
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn then(self, result: DomainResult<Payload>) -> Self {
        self.script.lock().unwrap().push_back(result);
        self
    }

    pub fn set_fallback(&self, result: DomainResult<Payload>) {
        *self.fallback.lock().unwrap() = result;
    }

    pub fn calls(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    pub fn calls_for(&self, key: &CacheKey) -> usize {
        self.calls.lock().unwrap().get(key).copied().unwrap_or(0)
    }
}

#[async_trait]
impl Fetcher for ScriptedFetcher {
    async fn fetch(&self, kind: EntityKind, id: &EntityId) -> DomainResult<Payload> {
        self.total.fetch_add(1, Ordering::SeqCst);
        *self.calls.lock().unwrap().entry(CacheKey::new(kind, id.clone())).or_default() += 1;

        if self.hang {
            futures::future::pending::<()>().await;
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let scripted = self.script.lock().unwrap().pop_front();
        scripted.unwrap_or_else(|| self.fallback.lock().unwrap().clone())
    }
}

/* -------------------------------------------------------------------------- */
/* Rate limiters */
/* -------------------------------------------------------------------------- */

pub struct Unlimited;

#[async_trait]
impl FetchRateLimiter for Unlimited {
    async fn acquire(&self, _timeout: Duration) -> DomainResult<()> {
        Ok(())
    }
}

/// Limiter whose budget is permanently spent.
pub struct Exhausted;

#[async_trait]
impl FetchRateLimiter for Exhausted {
    async fn acquire(&self, timeout: Duration) -> DomainResult<()> {
        Err(TfmktError::RateLimited(format!("no permit within {timeout:?}")))
    }
}

/// Real sliding-window limiter behind the port.
pub struct Windowed(pub SlidingWindowLimiter);

#[async_trait]
impl FetchRateLimiter for Windowed {
    async fn acquire(&self, timeout: Duration) -> DomainResult<()> {
        self.0
            .acquire(timeout)
            .await
            .map(|_| ())
            .map_err(|e| TfmktError::RateLimited(e.to_string()))
    }
}

/* -------------------------------------------------------------------------- */
/* Wiring */
/* -------------------------------------------------------------------------- */

pub struct Harness {
    pub store: Arc<MemoryStore>,
    pub fetcher: Arc<ScriptedFetcher>,
    pub clock: MockClock,
    pub coordinator: Arc<CacheCoordinator>,
}

impl Harness {
    pub fn new(store: MemoryStore, fetcher: ScriptedFetcher, policy: CachePolicy) -> Self {
        Self::with_limiter(store, fetcher, Arc::new(Unlimited), policy)
    }

    pub fn with_limiter(
        store: MemoryStore,
        fetcher: ScriptedFetcher,
        limiter: Arc<dyn FetchRateLimiter>,
        policy: CachePolicy,
    ) -> Self {
        let store = Arc::new(store);
        let fetcher = Arc::new(fetcher);
        let clock = mock_clock();
        let coordinator = CacheCoordinator::new(store.clone(), fetcher.clone(), limiter, policy)
            .with_clock(Arc::new(clock.clone()));
        Self { store, fetcher, clock, coordinator: Arc::new(coordinator) }
    }

    /// Wall time as seen by the coordinator.
    pub fn now(&self) -> DateTime<Utc> {
        t0() + chrono::Duration::from_std(self.clock.elapsed()).unwrap()
    }
}

/// Wall time at which every harness clock starts.
pub fn t0() -> DateTime<Utc> {
    DateTime::<Utc>::from(UNIX_EPOCH + Duration::from_secs(T0_EPOCH_SECS))
}

/// Entry fetched `age` before [`t0`].
pub fn entry_aged(key: &CacheKey, payload: Value, age: Duration, ttl: Duration) -> CacheEntry {
    CacheEntry::new(key.clone(), payload, t0() - chrono::Duration::from_std(age).unwrap(), ttl)
}
