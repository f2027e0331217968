pub mod cleanup;
pub mod errors;
pub mod run;

use anyhow::{bail, Context, Result};
use keyload_core::{ErrorLogStore, RecordStore, StoreBackend, StoreConfig};
use keyload_storage::{
    create_sqlite_pool, run_migrations, MemoryErrorLogStore, MemoryRecordStore,
    SqliteErrorLogStore, SqliteRecordStore,
};
use std::sync::Arc;
use tracing::info;

/// Record store and error log pair selected by configuration.
pub struct Stores {
    pub records: Arc<dyn RecordStore>,
    pub errors: Arc<dyn ErrorLogStore>,
}

pub async fn build_stores(config: &StoreConfig) -> Result<Stores> {
    match config.backend {
        StoreBackend::Memory => {
            info!("Using in-memory store");
            Ok(Stores {
                records: Arc::new(MemoryRecordStore::new()),
                errors: Arc::new(MemoryErrorLogStore::new()),
            })
        }
        StoreBackend::Sqlite => {
            info!(database_url = %config.database_url, "Using SQLite store");
            let pool = create_sqlite_pool(&config.database_url, config.max_connections)
                .await
                .context("failed to create SQLite pool")?;
            run_migrations(&pool)
                .await
                .context("failed to apply migrations")?;

            Ok(Stores {
                records: Arc::new(SqliteRecordStore::new(pool.clone())),
                errors: Arc::new(SqliteErrorLogStore::new(pool)),
            })
        }
    }
}

/// Stores for commands that act on rows left by earlier processes.
///
/// The memory backend starts empty in every process, so it is rejected.
pub async fn build_persistent_stores(config: &StoreConfig, command: &str) -> Result<Stores> {
    if config.backend == StoreBackend::Memory {
        bail!(
            "`{command}` needs a persistent store; the memory backend holds no rows \
             from earlier runs (set store.backend = \"sqlite\")"
        );
    }
    build_stores(config).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use keyload_core::Record;

    #[tokio::test]
    async fn sqlite_backend_is_migrated() {
        let dir = tempfile::tempdir().unwrap();
        let config = StoreConfig {
            backend: StoreBackend::Sqlite,
            database_url: format!("sqlite://{}", dir.path().join("cli.db").display()),
            max_connections: 2,
        };

        let stores = build_stores(&config).await.unwrap();
        stores
            .records
            .insert(&Record::new(1, 1, "x", 1))
            .await
            .unwrap();
        assert_eq!(stores.records.scan_partition(1).await.unwrap().len(), 1);
        assert!(stores.errors.scan_partition(1).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn memory_backend_is_rejected_for_persistent_commands() {
        let err = build_persistent_stores(&StoreConfig::default(), "cleanup")
            .await
            .err()
            .unwrap();
        assert!(err.to_string().contains("persistent store"));
    }
}
