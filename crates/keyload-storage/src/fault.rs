//! Fault-injecting store wrappers
//!
//! Wrap any record store or error log store and fail selected calls, so the
//! engine's failure isolation and the recorder's retry policy can be exercised
//! without a degraded backend.
//!
//! # Failure sources
//!
//! Checked in this order on every call:
//!
//! - **Always-fail**: a fixed fault per operation kind
//! - **Failure queue**: pre-defined faults consumed in call order
//! - **Failure rate**: seeded random faults (`Unavailable`)
//!
//! # Example
//!
//! ```rust
//! use keyload_core::{OperationKind, RecordStore};
//! use keyload_storage::{FaultInjectingRecordStore, MemoryRecordStore, StoreFault};
//!
//! let store = FaultInjectingRecordStore::new(MemoryRecordStore::new())
//!     .with_always_fail(OperationKind::Insert, StoreFault::Conflict);
//! ```

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::{Mutex, RwLock};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};

use keyload_core::{
    CoreError, CoreResult, ErrorLogStore, ExceptionRecord, OperationKind, Record, RecordStore,
};

/// Injected failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreFault {
    /// Key collision.
    Conflict,

    /// Row missing.
    NotFound,

    /// Backend outage.
    Unavailable(&'static str),

    /// Commit outcome lost.
    UnknownStatus(&'static str),

    /// Let the call through.
    Ok,
}

impl StoreFault {
    fn to_error(&self, entity: &'static str, id: String) -> Option<CoreError> {
        match self {
            StoreFault::Conflict => Some(CoreError::conflict(entity, id)),
            StoreFault::NotFound => Some(CoreError::not_found(entity, id)),
            StoreFault::Unavailable(msg) => Some(CoreError::unavailable(*msg)),
            StoreFault::UnknownStatus(msg) => Some(CoreError::unknown_status(*msg)),
            StoreFault::Ok => None,
        }
    }
}

/// Failure plan shared by both wrappers.
struct FaultPlan {
    always_fail: RwLock<HashMap<OperationKind, StoreFault>>,
    failure_queue: RwLock<VecDeque<StoreFault>>,
    failure_rate: f64,
    rng: Mutex<StdRng>,
    succeeded: [AtomicU64; 4],
    failed: [AtomicU64; 4],
}

impl FaultPlan {
    fn new() -> Self {
        Self {
            always_fail: RwLock::new(HashMap::new()),
            failure_queue: RwLock::new(VecDeque::new()),
            failure_rate: 0.0,
            rng: Mutex::new(StdRng::seed_from_u64(0)),
            succeeded: Default::default(),
            failed: Default::default(),
        }
    }

    fn check(&self, kind: OperationKind, entity: &'static str, id: String) -> Option<CoreError> {
        if let Some(fault) = self.always_fail.read().get(&kind) {
            return fault.to_error(entity, id);
        }

        if let Some(fault) = self.failure_queue.write().pop_front() {
            return fault.to_error(entity, id);
        }

        if self.failure_rate > 0.0 && self.rng.lock().gen::<f64>() < self.failure_rate {
            return Some(CoreError::unavailable("injected random failure"));
        }

        None
    }

    fn record<T>(&self, kind: OperationKind, result: &CoreResult<T>) {
        let counters = if result.is_ok() {
            &self.succeeded
        } else {
            &self.failed
        };
        counters[kind.index()].fetch_add(1, Ordering::Relaxed);
    }
}

macro_rules! fault_builders {
    () => {
        /// Fail every call of `kind` with `fault`.
        pub fn with_always_fail(self, kind: OperationKind, fault: StoreFault) -> Self {
            self.plan.always_fail.write().insert(kind, fault);
            self
        }

        /// Consume `pattern` in call order; calls succeed once it is drained.
        pub fn with_failures(self, pattern: Vec<StoreFault>) -> Self {
            *self.plan.failure_queue.write() = pattern.into();
            self
        }

        /// Fail a `rate` fraction of calls with `Unavailable`, reproducibly for a given seed.
        pub fn with_failure_rate(mut self, rate: f64, seed: u64) -> Self {
            self.plan.failure_rate = rate;
            self.plan.rng = Mutex::new(StdRng::seed_from_u64(seed));
            self
        }

        /// Number of calls of `kind` that reached the inner store and succeeded.
        pub fn successful_calls(&self, kind: OperationKind) -> u64 {
            self.plan.succeeded[kind.index()].load(Ordering::Relaxed)
        }

        /// Number of calls of `kind` that returned an error, injected or not.
        pub fn failed_calls(&self, kind: OperationKind) -> u64 {
            self.plan.failed[kind.index()].load(Ordering::Relaxed)
        }

        /// Access the wrapped store.
        pub fn inner(&self) -> &S {
            &self.inner
        }
    };
}

/// Record store wrapper that injects failures.
pub struct FaultInjectingRecordStore<S> {
    inner: S,
    plan: FaultPlan,
}

impl<S: RecordStore> FaultInjectingRecordStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            plan: FaultPlan::new(),
        }
    }

    fault_builders!();

    async fn guarded<T, F>(&self, kind: OperationKind, id: String, call: F) -> CoreResult<T>
    where
        F: std::future::Future<Output = CoreResult<T>>,
    {
        let result = match self.plan.check(kind, "record", id) {
            Some(err) => Err(err),
            None => call.await,
        };
        self.plan.record(kind, &result);
        result
    }
}

#[async_trait]
impl<S: RecordStore> RecordStore for FaultInjectingRecordStore<S> {
    async fn insert(&self, record: &Record) -> CoreResult<()> {
        self.guarded(
            OperationKind::Insert,
            record.key_string(),
            self.inner.insert(record),
        )
        .await
    }

    async fn select(&self, partition_key: i32, clustering_key: i64) -> CoreResult<Record> {
        self.guarded(
            OperationKind::Select,
            format!("{partition_key}/{clustering_key}"),
            self.inner.select(partition_key, clustering_key),
        )
        .await
    }

    async fn update(&self, record: &Record) -> CoreResult<()> {
        self.guarded(
            OperationKind::Update,
            record.key_string(),
            self.inner.update(record),
        )
        .await
    }

    async fn delete(&self, partition_key: i32, clustering_key: i64) -> CoreResult<()> {
        self.guarded(
            OperationKind::Delete,
            format!("{partition_key}/{clustering_key}"),
            self.inner.delete(partition_key, clustering_key),
        )
        .await
    }

    // Scans are never faulted; cleanup needs a reliable row listing.
    async fn scan_partition(&self, partition_key: i32) -> CoreResult<Vec<Record>> {
        self.inner.scan_partition(partition_key).await
    }
}

/// Error log store wrapper that injects failures.
///
/// Inserts are checked as [`OperationKind::Insert`], scans as
/// [`OperationKind::Select`], and deletes as [`OperationKind::Delete`].
pub struct FaultInjectingErrorLogStore<S> {
    inner: S,
    plan: FaultPlan,
}

impl<S: ErrorLogStore> FaultInjectingErrorLogStore<S> {
    pub fn new(inner: S) -> Self {
        Self {
            inner,
            plan: FaultPlan::new(),
        }
    }

    fault_builders!();

    async fn guarded<T, F>(&self, kind: OperationKind, id: String, call: F) -> CoreResult<T>
    where
        F: std::future::Future<Output = CoreResult<T>>,
    {
        let result = match self.plan.check(kind, "record error", id) {
            Some(err) => Err(err),
            None => call.await,
        };
        self.plan.record(kind, &result);
        result
    }
}

#[async_trait]
impl<S: ErrorLogStore> ErrorLogStore for FaultInjectingErrorLogStore<S> {
    async fn insert(&self, record: &ExceptionRecord) -> CoreResult<()> {
        self.guarded(
            OperationKind::Insert,
            record.key_string(),
            self.inner.insert(record),
        )
        .await
    }

    async fn scan_partition(&self, partition_key: i32) -> CoreResult<Vec<ExceptionRecord>> {
        self.guarded(
            OperationKind::Select,
            partition_key.to_string(),
            self.inner.scan_partition(partition_key),
        )
        .await
    }

    async fn delete(
        &self,
        partition_key: i32,
        clustering_key: i64,
        occurred_at: DateTime<Utc>,
    ) -> CoreResult<()> {
        self.guarded(
            OperationKind::Delete,
            format!(
                "{partition_key}/{clustering_key}@{}",
                occurred_at.timestamp_millis()
            ),
            self.inner.delete(partition_key, clustering_key, occurred_at),
        )
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryRecordStore;

    #[tokio::test]
    async fn test_always_fail_only_affects_kind() {
        let store = FaultInjectingRecordStore::new(MemoryRecordStore::new())
            .with_always_fail(OperationKind::Insert, StoreFault::Conflict);

        let err = store.insert(&Record::new(1, 1, "x", 1)).await.unwrap_err();
        assert!(err.is_conflict());
        assert!(store.inner().is_empty());

        // Select reaches the inner store and reports its own NotFound.
        assert!(matches!(
            store.select(1, 1).await,
            Err(CoreError::NotFound { .. })
        ));

        assert_eq!(store.failed_calls(OperationKind::Insert), 1);
        assert_eq!(store.failed_calls(OperationKind::Select), 1);
        assert_eq!(store.successful_calls(OperationKind::Insert), 0);
    }

    #[tokio::test]
    async fn test_failure_queue_drains() {
        let store = FaultInjectingRecordStore::new(MemoryRecordStore::new()).with_failures(vec![
            StoreFault::Unavailable("503"),
            StoreFault::UnknownStatus("commit lost"),
            StoreFault::Ok,
        ]);

        assert!(store.insert(&Record::new(1, 1, "x", 1)).await.is_err());
        assert!(store.insert(&Record::new(1, 2, "x", 1)).await.is_err());
        assert!(store.insert(&Record::new(1, 3, "x", 1)).await.is_ok());
        assert!(store.insert(&Record::new(1, 4, "x", 1)).await.is_ok());

        assert_eq!(store.successful_calls(OperationKind::Insert), 2);
        assert_eq!(store.failed_calls(OperationKind::Insert), 2);
    }

    #[tokio::test]
    async fn test_failure_rate_is_reproducible() {
        async fn outcomes(seed: u64) -> Vec<bool> {
            let store = FaultInjectingRecordStore::new(MemoryRecordStore::new())
                .with_failure_rate(0.5, seed);
            let mut results = Vec::new();
            for ck in 0..32 {
                results.push(store.insert(&Record::new(1, ck, "x", ck)).await.is_ok());
            }
            results
        }

        let first = outcomes(7).await;
        assert_eq!(first, outcomes(7).await);
        assert!(first.iter().any(|ok| *ok));
        assert!(first.iter().any(|ok| !*ok));
    }
}
