//! In-flight fetch table
//!
//! At most one fetch per key runs at a time. The first caller for a key
//! becomes the leader and receives a [`FlightGuard`]; later callers receive a
//! [`FlightWaiter`] that resolves to the leader's outcome. The guard removes
//! the flight when dropped, so a leader torn down mid-fetch closes the
//! channel and every waiter gets a terminal `FetchFailed` instead of hanging.

use std::sync::atomic::{AtomicU64, Ordering};

use dashmap::mapref::entry::Entry;
use dashmap::DashMap;
use tfmkt_domain::{CacheKey, Resolved, Result, TfmktError};
use tokio::sync::watch;

pub(crate) type FlightOutcome = Result<Resolved>;

struct Flight {
    id: u64,
    outcome: watch::Receiver<Option<FlightOutcome>>,
}

#[derive(Default)]
pub(crate) struct InFlightTable {
    flights: DashMap<CacheKey, Flight>,
    next_id: AtomicU64,
}

pub(crate) enum Join<'a> {
    Leader(FlightGuard<'a>),
    Follower(FlightWaiter),
}

impl InFlightTable {
    /// Registers a flight for `key` or joins the one already running.
    pub(crate) fn join(&self, key: &CacheKey) -> Join<'_> {
        match self.flights.entry(key.clone()) {
            Entry::Occupied(existing) => Join::Follower(FlightWaiter {
                key: key.clone(),
                outcome: existing.get().outcome.clone(),
            }),
            Entry::Vacant(slot) => {
                let id = self.next_id.fetch_add(1, Ordering::Relaxed);
                let (tx, rx) = watch::channel(None);
                slot.insert(Flight { id, outcome: rx });
                Join::Leader(FlightGuard { table: self, key: key.clone(), id, tx })
            }
        }
    }

    pub(crate) fn len(&self) -> usize {
        self.flights.len()
    }
}

/// Leader's handle on a flight
pub(crate) struct FlightGuard<'a> {
    table: &'a InFlightTable,
    key: CacheKey,
    id: u64,
    tx: watch::Sender<Option<FlightOutcome>>,
}

impl FlightGuard<'_> {
    /// Publishes the outcome to every waiter and retires the flight.
    pub(crate) fn complete(self, outcome: &FlightOutcome) {
        self.tx.send_replace(Some(outcome.clone()));
    }
}

impl Drop for FlightGuard<'_> {
    fn drop(&mut self) {
        // A newer flight may already own the slot.
        let id = self.id;
        self.table.flights.remove_if(&self.key, |_, flight| flight.id == id);
    }
}

/// Follower's handle on a flight
pub(crate) struct FlightWaiter {
    key: CacheKey,
    outcome: watch::Receiver<Option<FlightOutcome>>,
}

impl FlightWaiter {
    pub(crate) async fn wait(mut self) -> FlightOutcome {
        let abandoned = |key: &CacheKey| {
            TfmktError::FetchFailed(format!("in-flight fetch for {key} was abandoned"))
        };

        match self.outcome.wait_for(Option::is_some).await {
            Ok(published) => {
                let outcome: Option<FlightOutcome> = (*published).clone();
                outcome.unwrap_or_else(|| Err(abandoned(&self.key)))
            }
            Err(_) => Err(abandoned(&self.key)),
        }
    }
}
