//! Domain types and models

pub mod cache;
pub mod rate;

pub use cache::{
    CacheEntry, CacheKey, CollectionCount, EntityId, EntityKind, Page, Payload, ResolveSource,
    Resolved,
};
pub use rate::RateLimitFrequency;
