//! Application context - dependency injection container

use std::sync::Arc;

use tfmkt_core::{CacheCoordinator, CachePolicy, CacheStore, FetchRateLimiter, Fetcher};
use tfmkt_domain::{Config, Result};
use tfmkt_infra::scheduling::{RefreshScheduler, RefreshState, RefreshStats};
use tfmkt_infra::{build_rate_limiter, open_cache_store, HttpFetcher};
use tokio::sync::Mutex;
use tracing::{info, warn};

/// Application context - holds the cache services shared by every request
/// and the background refresh loop
pub struct AppContext {
    pub config: Config,
    pub store: Arc<dyn CacheStore>,
    pub coordinator: Arc<CacheCoordinator>,
    scheduler: Mutex<RefreshScheduler>,
}

impl AppContext {
    /// Build the production adapters described by `config`.
    ///
    /// Opens (and migrates) the cache store, points the fetcher at the
    /// configured origin and builds the shared fetch limiter.
    pub fn from_config(config: Config) -> Result<Self> {
        let store = open_cache_store(&config.database)?;
        let fetcher: Arc<dyn Fetcher> = Arc::new(HttpFetcher::from_config(&config.origin)?);
        let limiter = build_rate_limiter(&config.rate_limit)?;

        info!(
            backend = %config.database.backend,
            origin = %config.origin.base_url,
            rate_limited = config.rate_limit.enabled,
            "cache services initialised"
        );

        Ok(Self::with_adapters(config, store, fetcher, limiter))
    }

    /// Wire the context from explicit adapters.
    ///
    /// Tests use this to inject in-memory stores and scripted fetchers.
    pub fn with_adapters(
        config: Config,
        store: Arc<dyn CacheStore>,
        fetcher: Arc<dyn Fetcher>,
        limiter: Arc<dyn FetchRateLimiter>,
    ) -> Self {
        let policy = CachePolicy::from_config(&config.cache, &config.rate_limit);
        let coordinator =
            Arc::new(CacheCoordinator::new(Arc::clone(&store), fetcher, limiter, policy));
        let scheduler = RefreshScheduler::new(Arc::clone(&coordinator), config.refresh.clone());

        Self { config, store, coordinator, scheduler: Mutex::new(scheduler) }
    }

    /// Start the background refresh loop.
    ///
    /// The loop is started even when refresh is disabled; it idles until
    /// [`set_refresh_enabled`](Self::set_refresh_enabled) turns it on.
    pub async fn start_background(&self) -> Result<()> {
        self.scheduler.lock().await.start().await?;
        Ok(())
    }

    /// Turn background refresh on or off without restarting the loop.
    pub async fn set_refresh_enabled(&self, enabled: bool) {
        self.scheduler.lock().await.set_enabled(enabled);
    }

    /// Current phase of the background refresh loop.
    pub async fn refresh_state(&self) -> RefreshState {
        self.scheduler.lock().await.state()
    }

    /// Counters accumulated by the background refresh loop.
    pub async fn refresh_stats(&self) -> RefreshStats {
        self.scheduler.lock().await.stats()
    }

    /// Stop the background loop and wait for it to exit.
    ///
    /// Safe to call when the loop never started.
    pub async fn shutdown(&self) {
        let mut scheduler = self.scheduler.lock().await;
        if !scheduler.is_running() {
            return;
        }
        match scheduler.stop().await {
            Ok(()) => info!("background refresh stopped"),
            Err(e) => warn!(error = %e, "background refresh did not stop cleanly"),
        }
    }
}
