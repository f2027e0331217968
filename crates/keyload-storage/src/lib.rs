//! Record store and error log adapters for the keyload engine.

pub mod fault;
pub mod memory;
pub mod sqlite;

pub use fault::{FaultInjectingErrorLogStore, FaultInjectingRecordStore, StoreFault};
pub use memory::{MemoryErrorLogStore, MemoryRecordStore};
pub use sqlite::{
    create_sqlite_pool, run_migrations, SqliteErrorLogStore, SqliteRecordStore, MIGRATOR,
};
