//! SQLite-backed cache store.
//!
//! Implements the `CacheStore` port over the `cache_entries` table. All
//! database operations run in `spawn_blocking` to avoid blocking the async
//! runtime.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tfmkt_core::CacheStore;
use tfmkt_domain::{
    CacheEntry, CacheKey, EntityId, EntityKind, Page, Result as DomainResult, TfmktError,
};
use tokio::task;

use super::manager::{map_sql_error, DbManager};

/// SQLite-backed `CacheStore`.
pub struct SqliteCacheStore {
    db: Arc<DbManager>,
}

impl SqliteCacheStore {
    /// Create a store over an already migrated database.
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }

    /// Borrow the underlying database manager.
    pub fn db(&self) -> &Arc<DbManager> {
        &self.db
    }

    async fn with_conn<T, F>(&self, op: F) -> DomainResult<T>
    where
        T: Send + 'static,
        F: FnOnce(&Connection) -> DomainResult<T> + Send + 'static,
    {
        let db = Arc::clone(&self.db);
        task::spawn_blocking(move || -> DomainResult<T> {
            let conn = db.get_connection()?;
            op(&*conn)
        })
        .await
        .map_err(map_join_error)?
    }
}

#[async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(&self, key: &CacheKey) -> DomainResult<Option<CacheEntry>> {
        let key = key.clone();
        self.with_conn(move |conn| query_entry(conn, &key)).await
    }

    async fn put(&self, entry: CacheEntry) -> DomainResult<()> {
        self.with_conn(move |conn| upsert_entry(conn, &entry)).await
    }

    async fn remove(&self, key: &CacheKey) -> DomainResult<bool> {
        let key = key.clone();
        self.with_conn(move |conn| delete_entry(conn, &key)).await
    }

    async fn keys(&self, kinds: &[EntityKind]) -> DomainResult<Vec<CacheKey>> {
        let mut kinds = if kinds.is_empty() { EntityKind::ALL.to_vec() } else { kinds.to_vec() };
        kinds.sort_unstable();
        kinds.dedup();
        self.with_conn(move |conn| query_keys(conn, &kinds)).await
    }

    async fn count(&self, kind: EntityKind) -> DomainResult<u64> {
        self.with_conn(move |conn| count_entries(conn, kind)).await
    }

    async fn list(&self, kind: EntityKind, page: Page) -> DomainResult<Vec<CacheEntry>> {
        self.with_conn(move |conn| query_page(conn, kind, page)).await
    }
}

// ============================================================================
// Synchronous SQL Operations (called inside spawn_blocking)
// ============================================================================

fn query_entry(conn: &Connection, key: &CacheKey) -> DomainResult<Option<CacheEntry>> {
    let row = conn
        .query_row(
            "SELECT payload, fetched_at_ms, ttl_ms
             FROM cache_entries
             WHERE kind = ?1 AND entity_id = ?2",
            params![key.kind.as_str(), key.id.as_str()],
            |row| Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?, row.get::<_, i64>(2)?)),
        )
        .optional()
        .map_err(map_sql_error)?;

    row.map(|(payload, fetched_at_ms, ttl_ms)| {
        decode_entry(key.clone(), &payload, fetched_at_ms, ttl_ms)
    })
    .transpose()
}

/// Insert or replace one entry; `created_at_ms` survives replacement.
fn upsert_entry(conn: &Connection, entry: &CacheEntry) -> DomainResult<()> {
    let payload = serde_json::to_string(&entry.payload)
        .map_err(|e| TfmktError::Internal(format!("failed to encode payload: {e}")))?;
    let now = Utc::now().timestamp_millis();
    let ttl_ms = i64::try_from(entry.ttl.as_millis()).unwrap_or(i64::MAX);

    conn.execute(
        "INSERT INTO cache_entries
            (kind, entity_id, payload, fetched_at_ms, ttl_ms, created_at_ms, updated_at_ms)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
         ON CONFLICT(kind, entity_id) DO UPDATE SET
            payload = excluded.payload,
            fetched_at_ms = excluded.fetched_at_ms,
            ttl_ms = excluded.ttl_ms,
            updated_at_ms = excluded.updated_at_ms",
        params![
            entry.key.kind.as_str(),
            entry.key.id.as_str(),
            payload,
            entry.fetched_at.timestamp_millis(),
            ttl_ms,
            now,
        ],
    )
    .map_err(map_sql_error)?;
    Ok(())
}

fn delete_entry(conn: &Connection, key: &CacheKey) -> DomainResult<bool> {
    let deleted = conn
        .execute(
            "DELETE FROM cache_entries WHERE kind = ?1 AND entity_id = ?2",
            params![key.kind.as_str(), key.id.as_str()],
        )
        .map_err(map_sql_error)?;
    Ok(deleted > 0)
}

fn query_keys(conn: &Connection, kinds: &[EntityKind]) -> DomainResult<Vec<CacheKey>> {
    let mut stmt = conn
        .prepare("SELECT entity_id FROM cache_entries WHERE kind = ?1 ORDER BY entity_id")
        .map_err(map_sql_error)?;

    let mut keys = Vec::new();
    for kind in kinds {
        let ids = stmt
            .query_map(params![kind.as_str()], |row| row.get::<_, String>(0))
            .map_err(map_sql_error)?;
        for id in ids {
            let id = EntityId::new(id.map_err(map_sql_error)?)?;
            keys.push(CacheKey::new(*kind, id));
        }
    }
    Ok(keys)
}

fn count_entries(conn: &Connection, kind: EntityKind) -> DomainResult<u64> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM cache_entries WHERE kind = ?1",
            params![kind.as_str()],
            |row| row.get(0),
        )
        .map_err(map_sql_error)?;
    Ok(count.max(0) as u64)
}

fn query_page(conn: &Connection, kind: EntityKind, page: Page) -> DomainResult<Vec<CacheEntry>> {
    // SQLite treats a negative LIMIT as "no limit".
    let limit = page.limit.map_or(-1, i64::from);

    let mut stmt = conn
        .prepare(
            "SELECT entity_id, payload, fetched_at_ms, ttl_ms
             FROM cache_entries
             WHERE kind = ?1
             ORDER BY entity_id
             LIMIT ?2 OFFSET ?3",
        )
        .map_err(map_sql_error)?;

    let rows = stmt
        .query_map(params![kind.as_str(), limit, i64::from(page.skip)], read_page_row)
        .map_err(map_sql_error)?;

    let mut entries = Vec::new();
    for row in rows {
        let (id, payload, fetched_at_ms, ttl_ms) = row.map_err(map_sql_error)?;
        let key = CacheKey::new(kind, EntityId::new(id)?);
        entries.push(decode_entry(key, &payload, fetched_at_ms, ttl_ms)?);
    }
    Ok(entries)
}

fn read_page_row(row: &Row<'_>) -> rusqlite::Result<(String, String, i64, i64)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode_entry(
    key: CacheKey,
    payload: &str,
    fetched_at_ms: i64,
    ttl_ms: i64,
) -> DomainResult<CacheEntry> {
    let payload = serde_json::from_str(payload).map_err(|e| {
        TfmktError::StorageUnavailable(format!("corrupt payload stored for {key}: {e}"))
    })?;
    let fetched_at = DateTime::<Utc>::from_timestamp_millis(fetched_at_ms).ok_or_else(|| {
        TfmktError::StorageUnavailable(format!("invalid fetched_at stored for {key}"))
    })?;
    let ttl = Duration::from_millis(ttl_ms.max(0) as u64);

    Ok(CacheEntry::new(key, payload, fetched_at, ttl))
}

// ============================================================================
// Error Mapping
// ============================================================================

fn map_join_error(err: task::JoinError) -> TfmktError {
    if err.is_cancelled() {
        TfmktError::Internal("blocking task cancelled".into())
    } else {
        TfmktError::Internal(format!("blocking task failed: {err}"))
    }
}

// ============================================================================
// Tests
// ============================================================================
