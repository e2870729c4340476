//! Background refresh scheduler.
//!
//! One long-running task that repeatedly sweeps a snapshot of the cached
//! keys, forcing a refresh of each through the [`CacheCoordinator`] so the
//! same rate limiter and in-flight table guard client and background
//! fetches alike.
//!
//! ```text
//! Idle ──enabled──▶ Sweeping ◀──▶ SleepingBetweenItems
//!                      │
//!                      ▼
//!                CycleComplete ──▶ SleepingBetweenCycles ──▶ Sweeping …
//! ```
//!
//! Every suspension point also waits on the cancellation token; after
//! shutdown the state is `Stopped`. Configuration is snapshotted once per
//! cycle, so toggling `enabled` mid-sweep lets the current sweep finish.
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use tfmkt_core::CacheCoordinator;
//! use tfmkt_domain::RefreshConfig;
//! use tfmkt_infra::scheduling::RefreshScheduler;
//!
//! # async fn example(coordinator: Arc<CacheCoordinator>) -> Result<(), Box<dyn std::error::Error>> {
//! let mut scheduler = RefreshScheduler::new(coordinator, RefreshConfig::default());
//!
//! scheduler.start().await?;
//! // ... application runs ...
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex as StatsMutex;
use tfmkt_core::CacheCoordinator;
use tfmkt_domain::{CacheKey, RefreshConfig, ResolveSource, Resolved, TfmktError};
use tokio::sync::{watch, Mutex};
use tokio::task::JoinHandle;
use tokio::time::error::Elapsed;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

const JOIN_TIMEOUT: Duration = Duration::from_secs(5);

type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Where the refresh loop currently is
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshState {
    /// Not started, or disabled and waiting for a configuration change.
    Idle,
    Sweeping,
    SleepingBetweenItems,
    CycleComplete,
    SleepingBetweenCycles,
    Stopped,
}

/// Outcome of one sweep
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SweepReport {
    pub attempted: usize,
    pub refreshed: usize,
    pub failed: usize,
    pub elapsed: Duration,
}

/// Cumulative counters across sweeps
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RefreshStats {
    pub cycles_completed: u64,
    pub items_refreshed: u64,
    pub items_failed: u64,
    pub last_report: Option<SweepReport>,
}

struct RefreshLoopContext {
    coordinator: Arc<CacheCoordinator>,
    config: watch::Receiver<RefreshConfig>,
    state: Arc<watch::Sender<RefreshState>>,
    stats: Arc<StatsMutex<RefreshStats>>,
}

/// Background refresh scheduler
pub struct RefreshScheduler {
    coordinator: Arc<CacheCoordinator>,
    config: watch::Sender<RefreshConfig>,
    state: Arc<watch::Sender<RefreshState>>,
    stats: Arc<StatsMutex<RefreshStats>>,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
}

impl RefreshScheduler {
    /// Scheduler in the `Idle` state; call [`start`](Self::start) to run it.
    pub fn new(coordinator: Arc<CacheCoordinator>, config: RefreshConfig) -> Self {
        let (config, _) = watch::channel(config);
        let (state, _) = watch::channel(RefreshState::Idle);
        Self {
            coordinator,
            config,
            state: Arc::new(state),
            stats: Arc::new(StatsMutex::new(RefreshStats::default())),
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Spawn the refresh loop.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::AlreadyRunning`] if the loop is running.
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }

        info!("Starting refresh scheduler");

        // Fresh token so the scheduler can be restarted after a stop.
        self.cancellation_token = CancellationToken::new();
        self.state.send_replace(RefreshState::Idle);

        let context = RefreshLoopContext {
            coordinator: Arc::clone(&self.coordinator),
            config: self.config.subscribe(),
            state: Arc::clone(&self.state),
            stats: Arc::clone(&self.stats),
        };
        let cancel = self.cancellation_token.clone();

        let handle = tokio::spawn(async move {
            Self::refresh_loop(context, cancel).await;
        });

        *self.task_handle.lock().await = Some(handle);

        info!("Refresh scheduler started");
        Ok(())
    }

    /// Cancel the loop and wait for it to wind down.
    ///
    /// A refresh in progress is dropped; its waiters receive a terminal
    /// error from the coordinator.
    ///
    /// # Errors
    ///
    /// Returns [`SchedulerError::NotRunning`] if the loop is not running,
    /// or a timeout/join error if it does not exit cleanly.
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        info!("Stopping refresh scheduler");
        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            tokio::time::timeout(JOIN_TIMEOUT, handle)
                .await
                .map_err(|_| SchedulerError::Timeout { seconds: JOIN_TIMEOUT.as_secs() })?
                .map_err(|e| SchedulerError::TaskJoinFailed(e.to_string()))?;
        }

        info!("Refresh scheduler stopped");
        Ok(())
    }

    /// Whether the loop task is alive.
    pub fn is_running(&self) -> bool {
        self.task_handle
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    pub fn state(&self) -> RefreshState {
        *self.state.borrow()
    }

    /// Receiver that observes every state transition.
    pub fn subscribe_state(&self) -> watch::Receiver<RefreshState> {
        self.state.subscribe()
    }

    pub fn stats(&self) -> RefreshStats {
        self.stats.lock().clone()
    }

    /// The configuration the next cycle will use.
    pub fn config(&self) -> RefreshConfig {
        self.config.borrow().clone()
    }

    /// Switch the sweep on or off; takes effect at the next cycle boundary.
    pub fn set_enabled(&self, enabled: bool) {
        self.config.send_modify(|config| config.enabled = enabled);
        info!(enabled, "Background refresh toggled");
    }

    /// Replace the configuration; takes effect at the next cycle boundary.
    pub fn update_config(&self, config: RefreshConfig) {
        self.config.send_replace(config);
        info!("Background refresh configuration updated");
    }

    async fn refresh_loop(context: RefreshLoopContext, cancel: CancellationToken) {
        let RefreshLoopContext { coordinator, config: mut config_rx, state, stats } = context;

        loop {
            if cancel.is_cancelled() {
                break;
            }

            let config = config_rx.borrow_and_update().clone();
            if !config.enabled {
                state.send_replace(RefreshState::Idle);
                debug!("Background refresh disabled; waiting");
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    changed = config_rx.changed() => {
                        if changed.is_err() {
                            break;
                        }
                        continue;
                    }
                }
            }

            state.send_replace(RefreshState::Sweeping);
            let Some(report) = Self::sweep(&coordinator, &config, &state, &cancel).await else {
                debug!("Sweep cancelled");
                break;
            };

            state.send_replace(RefreshState::CycleComplete);
            {
                let mut stats = stats.lock();
                stats.cycles_completed += 1;
                stats.items_refreshed += report.refreshed as u64;
                stats.items_failed += report.failed as u64;
                stats.last_report = Some(report);
            }
            info!(
                attempted = report.attempted,
                refreshed = report.refreshed,
                failed = report.failed,
                elapsed_ms = report.elapsed.as_millis() as u64,
                "Background refresh cycle complete"
            );

            state.send_replace(RefreshState::SleepingBetweenCycles);
            tokio::select! {
                _ = cancel.cancelled() => break,
                _ = tokio::time::sleep(config.cycle_delay()) => {}
            }
        }

        state.send_replace(RefreshState::Stopped);
        debug!("Refresh loop exited");
    }

    /// One pass over the key snapshot; `None` when cancelled.
    async fn sweep(
        coordinator: &CacheCoordinator,
        config: &RefreshConfig,
        state: &watch::Sender<RefreshState>,
        cancel: &CancellationToken,
    ) -> Option<SweepReport> {
        let started = Instant::now();

        // Keys written after this point wait for the next cycle.
        let keys = match coordinator.store().keys(&config.kinds).await {
            Ok(keys) => keys,
            Err(e) => {
                warn!(error = %e, "Failed to enumerate cached keys; skipping cycle");
                Vec::new()
            }
        };
        debug!(count = keys.len(), "Sweep snapshot taken");

        let mut report = SweepReport::default();
        for (cursor, key) in keys.iter().enumerate() {
            if cursor > 0 {
                state.send_replace(RefreshState::SleepingBetweenItems);
                tokio::select! {
                    _ = cancel.cancelled() => return None,
                    _ = tokio::time::sleep(config.item_delay()) => {}
                }
                state.send_replace(RefreshState::Sweeping);
            }

            report.attempted += 1;
            let succeeded = tokio::select! {
                _ = cancel.cancelled() => return None,
                outcome = tokio::time::timeout(config.item_timeout(), coordinator.refresh(key)) => {
                    Self::record_outcome(key, config, outcome)
                }
            };
            if succeeded {
                report.refreshed += 1;
            } else {
                report.failed += 1;
            }
        }

        report.elapsed = started.elapsed();
        Some(report)
    }

    fn record_outcome(
        key: &CacheKey,
        config: &RefreshConfig,
        outcome: Result<Result<Resolved, TfmktError>, Elapsed>,
    ) -> bool {
        match outcome {
            Ok(Ok(resolved)) if resolved.source != ResolveSource::Fallback => {
                debug!(%key, "Refreshed");
                true
            }
            Ok(Ok(_)) => {
                warn!(%key, "Refresh failed; keeping previous entry");
                false
            }
            Ok(Err(e)) => {
                warn!(%key, error = %e, "Refresh failed");
                false
            }
            Err(_) => {
                warn!(%key, timeout_s = config.item_timeout().as_secs(), "Refresh timed out");
                false
            }
        }
    }
}

/// Ensure the loop is cancelled when the scheduler is dropped
impl Drop for RefreshScheduler {
    fn drop(&mut self) {
        if self.is_running() && !self.cancellation_token.is_cancelled() {
            warn!("RefreshScheduler dropped while running; cancelling");
            self.cancellation_token.cancel();
        }
    }
}
