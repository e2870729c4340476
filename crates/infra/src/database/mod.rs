//! Cache store implementations

pub mod cache_store;
pub mod manager;
pub mod memory_store;

use std::sync::Arc;

use tfmkt_core::CacheStore;
use tfmkt_domain::{DatabaseConfig, Result, StorageBackend};
use tracing::info;

pub use cache_store::SqliteCacheStore;
pub use manager::{DbConnection, DbManager};
pub use memory_store::MemoryCacheStore;

/// Open the store selected by `config.backend`, running migrations for
/// SQLite.
pub fn open_cache_store(config: &DatabaseConfig) -> Result<Arc<dyn CacheStore>> {
    match config.backend {
        StorageBackend::Sqlite => {
            let db = DbManager::new(&config.path, config.pool_size)?;
            db.run_migrations()?;
            Ok(Arc::new(SqliteCacheStore::new(Arc::new(db))))
        }
        StorageBackend::Memory => {
            info!("Using in-memory cache store; entries are lost on restart");
            Ok(Arc::new(MemoryCacheStore::new()))
        }
    }
}
