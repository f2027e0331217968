use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::CoreResult;
use crate::record::{ExceptionRecord, Record};

/// Keyed record store driven by the load-test engine.
///
/// Implementations provide their own concurrency control; the engine never
/// serializes access.
#[async_trait]
pub trait RecordStore: Send + Sync {
    /// Inserts a new row. Fails with `Conflict` if the key already exists.
    async fn insert(&self, record: &Record) -> CoreResult<()>;

    /// Fetches a row. Fails with `NotFound` if absent.
    async fn select(&self, partition_key: i32, clustering_key: i64) -> CoreResult<Record>;

    /// Overwrites the payload of an existing row.
    async fn update(&self, record: &Record) -> CoreResult<()>;

    /// Removes a row. Fails with `NotFound` if absent.
    async fn delete(&self, partition_key: i32, clustering_key: i64) -> CoreResult<()>;

    /// Returns every row under a partition ordered by clustering key.
    async fn scan_partition(&self, partition_key: i32) -> CoreResult<Vec<Record>>;
}

/// Durable log of failures captured during a run.
#[async_trait]
pub trait ErrorLogStore: Send + Sync {
    /// Persists an exception. Fails with `Conflict` when
    /// `(partition_key, clustering_key, occurred_at)` is already taken.
    async fn insert(&self, record: &ExceptionRecord) -> CoreResult<()>;

    /// Returns every exception recorded under a partition.
    async fn scan_partition(&self, partition_key: i32) -> CoreResult<Vec<ExceptionRecord>>;

    /// Removes one exception row.
    async fn delete(
        &self,
        partition_key: i32,
        clustering_key: i64,
        occurred_at: DateTime<Utc>,
    ) -> CoreResult<()>;
}
