#![allow(dead_code)]

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{HeaderMap, Method, Request, StatusCode};
use chrono::{DateTime, Utc};
use serde_json::Value;
use tfmkt_api::{router, AppContext};
use tfmkt_core::{CacheStore, FetchRateLimiter, Fetcher};
use tfmkt_domain::{
    CacheEntry, CacheKey, Config, EntityId, EntityKind, Payload, Result, TfmktError,
};
use tfmkt_infra::database::MemoryCacheStore;
use tfmkt_infra::rate_limit::UnlimitedFetchLimiter;
use tower::ServiceExt;

/// Fetcher answering from a per-key script; unscripted keys fail.
#[derive(Default)]
pub struct StubFetcher {
    answers: Mutex<HashMap<String, Result<Payload>>>,
    calls: AtomicUsize,
}

impl StubFetcher {
    pub fn respond(&self, key: &CacheKey, answer: Result<Payload>) {
        self.answers.lock().unwrap().insert(key.to_string(), answer);
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Fetcher for StubFetcher {
    async fn fetch(&self, kind: EntityKind, id: &EntityId) -> Result<Payload> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let key = CacheKey::new(kind, id.clone()).to_string();
        self.answers
            .lock()
            .unwrap()
            .get(&key)
            .cloned()
            .unwrap_or_else(|| Err(TfmktError::FetchFailed(format!("no script for {key}"))))
    }
}

pub struct TestApp {
    pub context: Arc<AppContext>,
    pub store: Arc<MemoryCacheStore>,
    pub fetcher: Arc<StubFetcher>,
}

impl TestApp {
    pub fn new() -> Self {
        Self::with_limiter(Config::default(), Arc::new(UnlimitedFetchLimiter))
    }

    pub fn with_limiter(config: Config, limiter: Arc<dyn FetchRateLimiter>) -> Self {
        let store = Arc::new(MemoryCacheStore::new());
        let fetcher = Arc::new(StubFetcher::default());
        let context = Arc::new(AppContext::with_adapters(
            config,
            store.clone(),
            fetcher.clone(),
            limiter,
        ));
        Self { context, store, fetcher }
    }

    pub async fn seed(&self, key: &CacheKey, payload: Payload, fetched_at: DateTime<Utc>) {
        self.store
            .put(CacheEntry::new(key.clone(), payload, fetched_at, Duration::from_secs(3600)))
            .await
            .expect("seed should be stored");
    }

    pub async fn get(&self, uri: &str) -> TestResponse {
        self.send(Request::builder().method(Method::GET).uri(uri).body(Body::empty()).unwrap())
            .await
    }

    pub async fn post_json(&self, uri: &str, body: Value) -> TestResponse {
        let request = Request::builder()
            .method(Method::POST)
            .uri(uri)
            .header("content-type", "application/json")
            .body(Body::from(body.to_string()))
            .unwrap();
        self.send(request).await
    }

    async fn send(&self, request: Request<Body>) -> TestResponse {
        let response = router(Arc::clone(&self.context)).oneshot(request).await.unwrap();
        let status = response.status();
        let headers = response.headers().clone();
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap_or(Value::Null)
        };
        TestResponse { status, headers, body }
    }
}

pub struct TestResponse {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Value,
}

impl TestResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }
}

pub fn key(kind: EntityKind, id: &str) -> CacheKey {
    CacheKey::parse(kind, id).expect("valid key")
}

/// A fetch time far enough back that any entry stamped with it is stale.
pub fn long_ago() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(1_722_513_600, 0).expect("valid timestamp")
}
