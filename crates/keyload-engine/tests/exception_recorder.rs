//! Exception recorder retry policy and timestamp disambiguation.

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use keyload_core::{
    CoreError, CoreResult, ErrorLogStore, ExceptionRecord, OperationKind, RecorderConfig,
};
use keyload_engine::ExceptionRecorder;
use keyload_storage::{FaultInjectingErrorLogStore, MemoryErrorLogStore, StoreFault};
use parking_lot::Mutex;
use std::sync::Arc;

/// Rejects the first `reject` inserts with a conflict and remembers every
/// timestamp it was offered.
struct CollidingErrorLog {
    reject: usize,
    attempts: Mutex<Vec<DateTime<Utc>>>,
    stored: MemoryErrorLogStore,
}

impl CollidingErrorLog {
    fn new(reject: usize) -> Self {
        Self {
            reject,
            attempts: Mutex::new(Vec::new()),
            stored: MemoryErrorLogStore::new(),
        }
    }
}

#[async_trait]
impl ErrorLogStore for CollidingErrorLog {
    async fn insert(&self, record: &ExceptionRecord) -> CoreResult<()> {
        let attempt = {
            let mut attempts = self.attempts.lock();
            attempts.push(record.occurred_at);
            attempts.len()
        };
        if attempt <= self.reject {
            return Err(CoreError::conflict("record error", record.key_string()));
        }
        self.stored.insert(record).await
    }

    async fn scan_partition(&self, partition_key: i32) -> CoreResult<Vec<ExceptionRecord>> {
        self.stored.scan_partition(partition_key).await
    }

    async fn delete(
        &self,
        partition_key: i32,
        clustering_key: i64,
        occurred_at: DateTime<Utc>,
    ) -> CoreResult<()> {
        self.stored
            .delete(partition_key, clustering_key, occurred_at)
            .await
    }
}

#[tokio::test]
async fn retries_advance_timestamp_by_one_millisecond() {
    let store = Arc::new(CollidingErrorLog::new(2));
    let recorder = ExceptionRecorder::new(store.clone(), RecorderConfig::default());

    let err = CoreError::not_found("record", "42/1000003");
    recorder
        .record(42, 1_000_003, OperationKind::Update, &err)
        .await;

    let attempts = store.attempts.lock().clone();
    assert_eq!(attempts.len(), 3);
    assert_eq!(attempts[1] - attempts[0], TimeDelta::milliseconds(1));
    assert_eq!(attempts[2] - attempts[0], TimeDelta::milliseconds(2));

    let rows = store.scan_partition(42).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert_eq!(rows[0].occurred_at, attempts[2]);
    assert_eq!(
        rows[0].message,
        "UPDATE failed [code 9300]: record `42/1000003` was not found"
    );
    assert_eq!(recorder.recorded(), 1);
    assert_eq!(recorder.failures(), 0);
}

#[tokio::test]
async fn persistent_failures_are_swallowed_after_max_attempts() {
    let store = Arc::new(
        FaultInjectingErrorLogStore::new(MemoryErrorLogStore::new())
            .with_always_fail(OperationKind::Insert, StoreFault::Conflict),
    );
    let recorder = ExceptionRecorder::new(store.clone(), RecorderConfig::default());

    recorder
        .record(
            42,
            1,
            OperationKind::Insert,
            &CoreError::conflict("record", "42/1"),
        )
        .await;

    assert_eq!(store.failed_calls(OperationKind::Insert), 3);
    assert_eq!(recorder.recorded(), 0);
    assert_eq!(recorder.failures(), 1);
    assert!(store.inner().is_empty());
}

#[tokio::test]
async fn non_conflict_failures_are_retried_too() {
    let store = Arc::new(
        FaultInjectingErrorLogStore::new(MemoryErrorLogStore::new())
            .with_failures(vec![StoreFault::Unavailable("timeout")]),
    );
    let config = RecorderConfig {
        max_attempts: 5,
        retry_backoff_ms: 1,
        ..Default::default()
    };
    let recorder = ExceptionRecorder::new(store.clone(), config);

    recorder
        .record(
            7,
            2_000_000,
            OperationKind::Delete,
            &CoreError::unknown_status("commit lost"),
        )
        .await;

    assert_eq!(store.failed_calls(OperationKind::Insert), 1);
    assert_eq!(store.successful_calls(OperationKind::Insert), 1);
    assert_eq!(recorder.recorded(), 1);
}

#[tokio::test]
async fn oversized_messages_are_truncated_before_persisting() {
    let store = Arc::new(MemoryErrorLogStore::new());
    let recorder = ExceptionRecorder::new(store.clone(), RecorderConfig::default());

    let err = CoreError::StorageError("z".repeat(20_000));
    recorder
        .record(42, 5, OperationKind::Select, &err)
        .await;

    let rows = store.scan_partition(42).await.unwrap();
    assert_eq!(rows.len(), 1);
    assert!(rows[0].message.len() <= 8192);
    assert!(rows[0].message.starts_with("SELECT failed [code 9300]: storage error: zzz"));
    assert!(rows[0].message.contains("[TRUNCATED - original length:"));
}

#[tokio::test]
async fn handle_never_reuses_a_timestamp() {
    let store = Arc::new(MemoryErrorLogStore::new());
    let recorder = Arc::new(ExceptionRecorder::new(
        store.clone(),
        RecorderConfig::default(),
    ));
    let mut handle = recorder.handle();

    let err = CoreError::unavailable("busy");
    for _ in 0..20 {
        handle
            .record(42, 1_000_000, OperationKind::Select, &err)
            .await;
    }

    let rows = store.scan_partition(42).await.unwrap();
    assert_eq!(rows.len(), 20);
    assert!(rows.windows(2).all(|w| w[0].occurred_at < w[1].occurred_at));
    assert_eq!(handle.last_occurred_at(), Some(rows[19].occurred_at));
    assert_eq!(recorder.recorded(), 20);
}
