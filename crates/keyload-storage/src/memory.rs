//! In-memory store adapters.
//!
//! Rows live in ordered maps behind `parking_lot` locks, so a partition scan
//! returns rows ordered by clustering key the way a wide-column store would.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::sync::Arc;

use keyload_core::{CoreError, CoreResult, ErrorLogStore, ExceptionRecord, Record, RecordStore};

type RecordKey = (i32, i64);
type ErrorKey = (i32, i64, DateTime<Utc>);

/// Record store backed by a `BTreeMap`.
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    rows: Arc<RwLock<BTreeMap<RecordKey, Record>>>,
}

impl MemoryRecordStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of rows across all partitions.
    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }

    /// Number of rows under one partition.
    pub fn partition_len(&self, partition_key: i32) -> usize {
        self.rows
            .read()
            .range((partition_key, i64::MIN)..=(partition_key, i64::MAX))
            .count()
    }
}

fn record_id(partition_key: i32, clustering_key: i64) -> String {
    format!("{partition_key}/{clustering_key}")
}

#[async_trait]
impl RecordStore for MemoryRecordStore {
    async fn insert(&self, record: &Record) -> CoreResult<()> {
        let mut rows = self.rows.write();
        match rows.entry((record.partition_key, record.clustering_key)) {
            Entry::Occupied(_) => Err(CoreError::conflict("record", record.key_string())),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn select(&self, partition_key: i32, clustering_key: i64) -> CoreResult<Record> {
        self.rows
            .read()
            .get(&(partition_key, clustering_key))
            .cloned()
            .ok_or_else(|| CoreError::not_found("record", record_id(partition_key, clustering_key)))
    }

    async fn update(&self, record: &Record) -> CoreResult<()> {
        let mut rows = self.rows.write();
        match rows.get_mut(&(record.partition_key, record.clustering_key)) {
            Some(existing) => {
                existing.string_value = record.string_value.clone();
                existing.bint_value = record.bint_value;
                Ok(())
            }
            None => Err(CoreError::not_found("record", record.key_string())),
        }
    }

    async fn delete(&self, partition_key: i32, clustering_key: i64) -> CoreResult<()> {
        self.rows
            .write()
            .remove(&(partition_key, clustering_key))
            .map(|_| ())
            .ok_or_else(|| CoreError::not_found("record", record_id(partition_key, clustering_key)))
    }

    async fn scan_partition(&self, partition_key: i32) -> CoreResult<Vec<Record>> {
        Ok(self
            .rows
            .read()
            .range((partition_key, i64::MIN)..=(partition_key, i64::MAX))
            .map(|(_, record)| record.clone())
            .collect())
    }
}

/// Error log store backed by a `BTreeMap` keyed by
/// `(partition, clustering, occurred_at)`.
#[derive(Debug, Clone, Default)]
pub struct MemoryErrorLogStore {
    rows: Arc<RwLock<BTreeMap<ErrorKey, ExceptionRecord>>>,
}

impl MemoryErrorLogStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.read().is_empty()
    }
}

#[async_trait]
impl ErrorLogStore for MemoryErrorLogStore {
    async fn insert(&self, record: &ExceptionRecord) -> CoreResult<()> {
        let mut rows = self.rows.write();
        let key = (
            record.partition_key,
            record.clustering_key,
            record.occurred_at,
        );
        match rows.entry(key) {
            Entry::Occupied(_) => Err(CoreError::conflict("record error", record.key_string())),
            Entry::Vacant(slot) => {
                slot.insert(record.clone());
                Ok(())
            }
        }
    }

    async fn scan_partition(&self, partition_key: i32) -> CoreResult<Vec<ExceptionRecord>> {
        Ok(self
            .rows
            .read()
            .iter()
            .filter(|((pk, _, _), _)| *pk == partition_key)
            .map(|(_, record)| record.clone())
            .collect())
    }

    async fn delete(
        &self,
        partition_key: i32,
        clustering_key: i64,
        occurred_at: DateTime<Utc>,
    ) -> CoreResult<()> {
        self.rows
            .write()
            .remove(&(partition_key, clustering_key, occurred_at))
            .map(|_| ())
            .ok_or_else(|| {
                CoreError::not_found(
                    "record error",
                    format!(
                        "{partition_key}/{clustering_key}@{}",
                        occurred_at.timestamp_millis()
                    ),
                )
            })
    }
}
