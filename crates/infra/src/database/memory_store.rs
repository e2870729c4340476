//! In-process cache store.
//!
//! Entries live in a sharded `DashMap`, so writers to different keys never
//! contend on one lock. Nothing survives a restart.

use async_trait::async_trait;
use dashmap::DashMap;
use tfmkt_core::CacheStore;
use tfmkt_domain::{CacheEntry, CacheKey, EntityKind, Page, Result as DomainResult};

/// In-process `CacheStore`; contents are lost on restart.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: DashMap<CacheKey, CacheEntry>,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Entries across every collection.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn sorted_entries(&self, kind: EntityKind) -> Vec<CacheEntry> {
        let mut entries: Vec<CacheEntry> = self
            .entries
            .iter()
            .filter(|e| e.key().kind == kind)
            .map(|e| e.value().clone())
            .collect();
        entries.sort_by(|a, b| a.key.cmp(&b.key));
        entries
    }
}

#[async_trait]
impl CacheStore for MemoryCacheStore {
    async fn get(&self, key: &CacheKey) -> DomainResult<Option<CacheEntry>> {
        Ok(self.entries.get(key).map(|e| e.value().clone()))
    }

    async fn put(&self, entry: CacheEntry) -> DomainResult<()> {
        self.entries.insert(entry.key.clone(), entry);
        Ok(())
    }

    async fn remove(&self, key: &CacheKey) -> DomainResult<bool> {
        Ok(self.entries.remove(key).is_some())
    }

    async fn keys(&self, kinds: &[EntityKind]) -> DomainResult<Vec<CacheKey>> {
        let mut keys: Vec<CacheKey> = self
            .entries
            .iter()
            .map(|e| e.key().clone())
            .filter(|k| kinds.is_empty() || kinds.contains(&k.kind))
            .collect();
        keys.sort();
        Ok(keys)
    }

    async fn count(&self, kind: EntityKind) -> DomainResult<u64> {
        Ok(self.entries.iter().filter(|e| e.key().kind == kind).count() as u64)
    }

    async fn list(&self, kind: EntityKind, page: Page) -> DomainResult<Vec<CacheEntry>> {
        let items = self.sorted_entries(kind).into_iter().skip(page.skip as usize);
        Ok(match page.limit {
            Some(limit) => items.take(limit as usize).collect(),
            None => items.collect(),
        })
    }
}
