//! Integration tests for the background refresh scheduler
//!
//! Runs with paused tokio time so item and cycle delays elapse instantly
//! while preserving their ordering.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

mod support;

use std::sync::Arc;
use std::time::Duration;

use serde_json::json;
use tfmkt_core::{CachePolicy, CacheStore};
use tfmkt_domain::{EntityKind, RateLimitConfig, RefreshConfig};
use tfmkt_infra::database::MemoryCacheStore;
use tfmkt_infra::rate_limit::build_rate_limiter;
use tfmkt_infra::scheduling::{RefreshScheduler, RefreshState};
use tokio::time::Instant;

use support::{coordinator, coordinator_with_limiter, key, seed, Answer, CountingFetcher};

const ITEM_DELAY: u64 = 10;
const CYCLE_DELAY: u64 = 3600;

fn refresh_config() -> RefreshConfig {
    RefreshConfig {
        enabled: true,
        item_delay_seconds: ITEM_DELAY,
        cycle_delay_seconds: CYCLE_DELAY,
        item_timeout_seconds: 30,
        kinds: Vec::new(),
    }
}

async fn seeded_store(ids: &[&str]) -> Arc<MemoryCacheStore> {
    let store = Arc::new(MemoryCacheStore::new());
    for id in ids {
        seed(&*store, &key(EntityKind::Players, id), json!({ "id": id, "call": 0 })).await;
    }
    store
}

async fn wait_for_state(scheduler: &RefreshScheduler, target: RefreshState) {
    let mut rx = scheduler.subscribe_state();
    rx.wait_for(|state| *state == target).await.expect("scheduler state channel open");
}

#[tokio::test(start_paused = true)]
async fn sweep_refreshes_every_key_with_item_delays() {
    let store = seeded_store(&["1", "2", "3"]).await;
    let fetcher = CountingFetcher::new();
    let coordinator = coordinator(store.clone(), fetcher.clone());
    let mut scheduler = RefreshScheduler::new(coordinator, refresh_config());

    let started = Instant::now();
    scheduler.start().await.unwrap();
    wait_for_state(&scheduler, RefreshState::SleepingBetweenCycles).await;

    // Three keys, two gaps between them.
    let elapsed = started.elapsed();
    assert!(elapsed >= Duration::from_secs(2 * ITEM_DELAY), "elapsed {elapsed:?}");
    assert!(elapsed < Duration::from_secs(3 * ITEM_DELAY), "elapsed {elapsed:?}");

    assert_eq!(fetcher.total(), 3);
    for id in ["1", "2", "3"] {
        let key = key(EntityKind::Players, id);
        assert_eq!(fetcher.calls_for(&key), 1);
        let entry = store.get(&key).await.unwrap().unwrap();
        assert_eq!(entry.payload["call"], 1, "entry {key} should hold the refreshed payload");
    }

    let stats = scheduler.stats();
    assert_eq!(stats.cycles_completed, 1);
    assert_eq!(stats.items_refreshed, 3);
    assert_eq!(stats.items_failed, 0);
    let report = stats.last_report.unwrap();
    assert_eq!((report.attempted, report.refreshed, report.failed), (3, 3, 0));

    scheduler.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn failed_items_are_counted_and_the_sweep_continues() {
    let store = seeded_store(&["1", "2", "3"]).await;
    let fetcher = CountingFetcher::new();
    let broken = key(EntityKind::Players, "2");
    fetcher.answer(&broken, Answer::Fail);
    let coordinator = coordinator(store.clone(), fetcher.clone());
    let mut scheduler = RefreshScheduler::new(coordinator, refresh_config());

    scheduler.start().await.unwrap();
    wait_for_state(&scheduler, RefreshState::SleepingBetweenCycles).await;

    assert_eq!(fetcher.total(), 3);
    let report = scheduler.stats().last_report.unwrap();
    assert_eq!((report.attempted, report.refreshed, report.failed), (3, 2, 1));

    // The previous entry for the failed key is untouched.
    let entry = store.get(&broken).await.unwrap().unwrap();
    assert_eq!(entry.payload["call"], 0);

    scheduler.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn hung_fetch_times_out_and_the_sweep_continues() {
    let store = seeded_store(&["1", "2"]).await;
    let fetcher = CountingFetcher::new();
    fetcher.answer(&key(EntityKind::Players, "1"), Answer::Hang);
    let coordinator = coordinator(store.clone(), fetcher.clone());
    let mut scheduler = RefreshScheduler::new(Arc::clone(&coordinator), refresh_config());

    scheduler.start().await.unwrap();
    wait_for_state(&scheduler, RefreshState::SleepingBetweenCycles).await;

    let report = scheduler.stats().last_report.unwrap();
    assert_eq!((report.attempted, report.refreshed, report.failed), (2, 1, 1));
    assert!(report.elapsed >= Duration::from_secs(30 + ITEM_DELAY));
    assert_eq!(coordinator.in_flight(), 0, "timed out fetch should release its flight");

    scheduler.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn keys_written_mid_sweep_wait_for_the_next_cycle() {
    let store = seeded_store(&["1", "2"]).await;
    let fetcher = CountingFetcher::new();
    let coordinator = coordinator(store.clone(), fetcher.clone());
    let mut scheduler = RefreshScheduler::new(coordinator, refresh_config());

    scheduler.start().await.unwrap();
    wait_for_state(&scheduler, RefreshState::SleepingBetweenItems).await;

    let late = key(EntityKind::Players, "3");
    seed(&*store, &late, json!({ "id": "3", "call": 0 })).await;

    wait_for_state(&scheduler, RefreshState::SleepingBetweenCycles).await;
    assert_eq!(scheduler.stats().last_report.unwrap().attempted, 2);
    assert_eq!(fetcher.calls_for(&late), 0);

    scheduler.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn sweep_only_covers_configured_kinds() {
    let store = seeded_store(&["1"]).await;
    let club = key(EntityKind::Clubs, "27");
    seed(&*store, &club, json!({ "id": "27" })).await;
    let fetcher = CountingFetcher::new();
    let coordinator = coordinator(store.clone(), fetcher.clone());
    let config = RefreshConfig { kinds: vec![EntityKind::Clubs], ..refresh_config() };
    let mut scheduler = RefreshScheduler::new(coordinator, config);

    scheduler.start().await.unwrap();
    wait_for_state(&scheduler, RefreshState::SleepingBetweenCycles).await;

    assert_eq!(fetcher.total(), 1);
    assert_eq!(fetcher.calls_for(&club), 1);

    scheduler.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn disabled_scheduler_idles_until_enabled() {
    let store = seeded_store(&["1", "2"]).await;
    let fetcher = CountingFetcher::new();
    let coordinator = coordinator(store.clone(), fetcher.clone());
    let config = RefreshConfig { enabled: false, ..refresh_config() };
    let mut scheduler = RefreshScheduler::new(coordinator, config);

    scheduler.start().await.unwrap();
    tokio::time::sleep(Duration::from_secs(10 * CYCLE_DELAY)).await;

    assert_eq!(scheduler.state(), RefreshState::Idle);
    assert_eq!(fetcher.total(), 0);

    scheduler.set_enabled(true);
    wait_for_state(&scheduler, RefreshState::SleepingBetweenCycles).await;
    assert_eq!(fetcher.total(), 2);

    scheduler.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn empty_store_completes_empty_cycles() {
    let store = Arc::new(MemoryCacheStore::new());
    let fetcher = CountingFetcher::new();
    let coordinator = coordinator(store, fetcher.clone());
    let mut scheduler = RefreshScheduler::new(coordinator, refresh_config());

    scheduler.start().await.unwrap();
    wait_for_state(&scheduler, RefreshState::SleepingBetweenCycles).await;

    let stats = scheduler.stats();
    assert_eq!(stats.cycles_completed, 1);
    assert_eq!(stats.last_report.unwrap().attempted, 0);
    assert_eq!(fetcher.total(), 0);

    scheduler.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn next_cycle_starts_after_cycle_delay() {
    let store = seeded_store(&["1"]).await;
    let fetcher = CountingFetcher::new();
    let coordinator = coordinator(store, fetcher.clone());
    let mut scheduler = RefreshScheduler::new(coordinator, refresh_config());

    scheduler.start().await.unwrap();
    wait_for_state(&scheduler, RefreshState::SleepingBetweenCycles).await;
    assert_eq!(scheduler.stats().cycles_completed, 1);

    tokio::time::sleep(Duration::from_secs(CYCLE_DELAY - 1)).await;
    assert_eq!(scheduler.stats().cycles_completed, 1);
    assert_eq!(fetcher.total(), 1);

    tokio::time::sleep(Duration::from_secs(2)).await;
    assert_eq!(scheduler.stats().cycles_completed, 2);
    assert_eq!(fetcher.total(), 2);

    scheduler.stop().await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn stop_interrupts_a_sweep_in_progress() {
    let store = seeded_store(&["1", "2"]).await;
    let fetcher = CountingFetcher::new();
    let coordinator = coordinator(store, fetcher.clone());
    let mut scheduler = RefreshScheduler::new(Arc::clone(&coordinator), refresh_config());

    scheduler.start().await.unwrap();
    wait_for_state(&scheduler, RefreshState::SleepingBetweenItems).await;

    scheduler.stop().await.unwrap();

    assert_eq!(scheduler.state(), RefreshState::Stopped);
    assert_eq!(scheduler.stats().cycles_completed, 0);
    assert_eq!(fetcher.total(), 1);
    assert_eq!(coordinator.in_flight(), 0);
}

#[tokio::test(start_paused = true)]
async fn sweep_and_client_misses_share_one_fetch_budget() {
    let store = seeded_store(&["1", "2", "3"]).await;
    let fetcher = CountingFetcher::new();
    let rate_limit = RateLimitConfig {
        enabled: true,
        frequency: "1/second".parse().unwrap(),
        acquire_timeout_ms: 60_000,
    };
    let coordinator = coordinator_with_limiter(
        store.clone(),
        fetcher.clone(),
        build_rate_limiter(&rate_limit).unwrap(),
        CachePolicy::default().with_acquire_timeout(Duration::from_secs(60)),
    );
    // No item delay: only the limiter paces the sweep.
    let config = RefreshConfig {
        item_delay_seconds: 0,
        kinds: vec![EntityKind::Players],
        ..refresh_config()
    };
    let mut scheduler = RefreshScheduler::new(coordinator.clone(), config);

    scheduler.start().await.unwrap();
    let clients: Vec<_> = ["27", "31", "418"]
        .into_iter()
        .map(|id| {
            let coordinator = coordinator.clone();
            let club = key(EntityKind::Clubs, id);
            tokio::spawn(async move { coordinator.resolve(&club).await })
        })
        .collect();
    for client in clients {
        client.await.unwrap().unwrap();
    }
    wait_for_state(&scheduler, RefreshState::SleepingBetweenCycles).await;
    scheduler.stop().await.unwrap();

    let mut admitted = fetcher.admissions();
    assert_eq!(admitted.len(), 6);
    admitted.sort();
    for pair in admitted.windows(2) {
        let gap = pair[1] - pair[0];
        assert!(gap >= Duration::from_secs(1), "two fetches {gap:?} apart within one window");
    }
    assert_eq!(scheduler.stats().items_refreshed, 3);
}
