#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde_json::json;
use tempfile::TempDir;
use tfmkt_core::{CacheCoordinator, CachePolicy, CacheStore, FetchRateLimiter, Fetcher};
use tfmkt_domain::{CacheEntry, CacheKey, EntityId, EntityKind, Payload, Result, TfmktError};
use tfmkt_infra::database::{DbManager, SqliteCacheStore};
use tfmkt_infra::rate_limit::UnlimitedFetchLimiter;
use tokio::time::Instant;

/// Temporary database wrapper that keeps the underlying file alive for the
/// duration of a test run.
pub struct TestDatabase {
    pub manager: Arc<DbManager>,
    _temp_dir: TempDir,
}

impl TestDatabase {
    /// Create a new migrated database in a temporary directory.
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("temp dir should be created");
        let db_path = temp_dir.path().join("cache.db");

        let manager = DbManager::new(&db_path, 4).expect("db manager should be created");
        manager.run_migrations().expect("migrations should run");

        Self { manager: Arc::new(manager), _temp_dir: temp_dir }
    }

    pub fn store(&self) -> Arc<SqliteCacheStore> {
        Arc::new(SqliteCacheStore::new(Arc::clone(&self.manager)))
    }

    /// Open a second manager over the same file, as a restarted process would.
    pub fn reopen(&self) -> Arc<SqliteCacheStore> {
        let manager =
            DbManager::new(self.manager.path(), 2).expect("db manager should reopen");
        Arc::new(SqliteCacheStore::new(Arc::new(manager)))
    }
}

/// How a [`CountingFetcher`] answers a given key.
#[derive(Clone)]
pub enum Answer {
    Payload(Payload),
    Fail,
    Hang,
}

/// Fetcher that counts calls per key and answers from a script.
///
/// Unscripted keys succeed with `{"id": <id>, "call": <n>}`.
#[derive(Default)]
pub struct CountingFetcher {
    answers: Mutex<HashMap<String, Answer>>,
    calls: Mutex<HashMap<String, usize>>,
    admitted: Mutex<Vec<Instant>>,
    total: AtomicUsize,
}

impl CountingFetcher {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn answer(&self, key: &CacheKey, answer: Answer) {
        self.answers.lock().insert(key.to_string(), answer);
    }

    pub fn calls_for(&self, key: &CacheKey) -> usize {
        self.calls.lock().get(&key.to_string()).copied().unwrap_or(0)
    }

    pub fn total(&self) -> usize {
        self.total.load(Ordering::SeqCst)
    }

    /// Instants at which fetches reached the origin, in call order.
    pub fn admissions(&self) -> Vec<Instant> {
        self.admitted.lock().clone()
    }
}

#[async_trait]
impl Fetcher for CountingFetcher {
    async fn fetch(&self, kind: EntityKind, id: &EntityId) -> Result<Payload> {
        let key = CacheKey::new(kind, id.clone()).to_string();
        let call = {
            let mut calls = self.calls.lock();
            let count = calls.entry(key.clone()).or_insert(0);
            *count += 1;
            *count
        };
        self.admitted.lock().push(Instant::now());
        self.total.fetch_add(1, Ordering::SeqCst);

        let answer = self.answers.lock().get(&key).cloned();
        match answer {
            Some(Answer::Payload(payload)) => Ok(payload),
            Some(Answer::Fail) => Err(TfmktError::FetchFailed(format!("{key} unavailable"))),
            Some(Answer::Hang) => std::future::pending().await,
            None => Ok(json!({ "id": id.as_str(), "call": call })),
        }
    }
}

pub fn key(kind: EntityKind, id: &str) -> CacheKey {
    CacheKey::parse(kind, id).expect("valid key")
}

pub fn t0() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_722_513_600, 0).expect("valid timestamp")
}

/// Seed an entry fetched at `t0()`.
pub async fn seed(store: &dyn CacheStore, key: &CacheKey, payload: Payload) {
    store
        .put(CacheEntry::new(key.clone(), payload, t0(), Duration::from_secs(3600)))
        .await
        .expect("seed entry should be stored");
}

pub fn coordinator(store: Arc<dyn CacheStore>, fetcher: Arc<dyn Fetcher>) -> Arc<CacheCoordinator> {
    Arc::new(CacheCoordinator::new(
        store,
        fetcher,
        Arc::new(UnlimitedFetchLimiter),
        CachePolicy::default(),
    ))
}

pub fn coordinator_with_limiter(
    store: Arc<dyn CacheStore>,
    fetcher: Arc<dyn Fetcher>,
    limiter: Arc<dyn FetchRateLimiter>,
    policy: CachePolicy,
) -> Arc<CacheCoordinator> {
    Arc::new(CacheCoordinator::new(store, fetcher, limiter, policy))
}
