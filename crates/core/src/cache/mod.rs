//! Cache subsystem: ports and the read-through coordinator

pub mod coordinator;
mod in_flight;
pub mod ports;

pub use coordinator::{CacheCoordinator, CachePolicy, CoordinatorStats, ResolveMode};
pub use ports::{CacheStore, FetchRateLimiter, Fetcher};
