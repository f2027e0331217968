//! Best-effort removal of a partition's rows after a run.

use keyload_core::metrics::CLEANUP_DELETED;
use keyload_core::{CleanupScope, ErrorLogStore, RecordStore};
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, warn};

/// Rows removed by one cleanup pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CleanupReport {
    pub records_deleted: u64,
    pub error_records_deleted: u64,
    /// Scans or deletes that failed and were skipped.
    pub failures: u64,
}

impl CleanupReport {
    pub fn total_deleted(&self) -> u64 {
        self.records_deleted + self.error_records_deleted
    }
}

pub struct Cleanup {
    records: Arc<dyn RecordStore>,
    errors: Arc<dyn ErrorLogStore>,
}

impl Cleanup {
    pub fn new(records: Arc<dyn RecordStore>, errors: Arc<dyn ErrorLogStore>) -> Self {
        Self { records, errors }
    }

    /// Deletes every row under `partition_key`, one at a time.
    ///
    /// A failed delete is logged and skipped. Error-log rows are only touched
    /// under [`CleanupScope::RecordsAndErrors`].
    pub async fn run(&self, partition_key: i32, scope: CleanupScope) -> CleanupReport {
        let mut report = CleanupReport::default();

        match self.records.scan_partition(partition_key).await {
            Ok(rows) => {
                for row in rows {
                    match self
                        .records
                        .delete(row.partition_key, row.clustering_key)
                        .await
                    {
                        Ok(()) => report.records_deleted += 1,
                        Err(e) => {
                            warn!(key = %row.key_string(), "Failed to delete record: {}", e);
                            report.failures += 1;
                        }
                    }
                }
            }
            Err(e) => {
                error!(partition_key, "Failed to scan records for cleanup: {}", e);
                report.failures += 1;
            }
        }

        if scope == CleanupScope::RecordsAndErrors {
            match self.errors.scan_partition(partition_key).await {
                Ok(rows) => {
                    for row in rows {
                        match self
                            .errors
                            .delete(row.partition_key, row.clustering_key, row.occurred_at)
                            .await
                        {
                            Ok(()) => report.error_records_deleted += 1,
                            Err(e) => {
                                warn!(key = %row.key_string(), "Failed to delete error record: {}", e);
                                report.failures += 1;
                            }
                        }
                    }
                }
                Err(e) => {
                    error!(partition_key, "Failed to scan error log for cleanup: {}", e);
                    report.failures += 1;
                }
            }
        }

        CLEANUP_DELETED
            .with_label_values(&["records"])
            .inc_by(report.records_deleted);
        CLEANUP_DELETED
            .with_label_values(&["record_errors"])
            .inc_by(report.error_records_deleted);

        info!(
            partition_key,
            records_deleted = report.records_deleted,
            error_records_deleted = report.error_records_deleted,
            failures = report.failures,
            "Cleanup finished"
        );

        report
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use keyload_core::{ExceptionRecord, OperationKind, Record};
    use keyload_storage::{
        FaultInjectingRecordStore, MemoryErrorLogStore, MemoryRecordStore, StoreFault,
    };

    async fn seed(records: &dyn RecordStore, errors: &dyn ErrorLogStore) {
        for ck in 0..5 {
            records.insert(&Record::new(42, ck, "x", ck)).await.unwrap();
        }
        records.insert(&Record::new(7, 1, "keep", 1)).await.unwrap();
        errors
            .insert(&ExceptionRecord {
                partition_key: 42,
                clustering_key: 3,
                operation_kind: OperationKind::Select,
                message: "SELECT failed".to_string(),
                occurred_at: Utc::now(),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_records_only_keeps_error_log() {
        let records = Arc::new(MemoryRecordStore::new());
        let errors = Arc::new(MemoryErrorLogStore::new());
        seed(records.as_ref(), errors.as_ref()).await;

        let report = Cleanup::new(records.clone(), errors.clone())
            .run(42, CleanupScope::RecordsOnly)
            .await;

        assert_eq!(report.records_deleted, 5);
        assert_eq!(report.error_records_deleted, 0);
        assert_eq!(records.partition_len(42), 0);
        assert_eq!(records.partition_len(7), 1);
        assert_eq!(errors.len(), 1);
    }

    #[tokio::test]
    async fn test_records_and_errors_scope() {
        let records = Arc::new(MemoryRecordStore::new());
        let errors = Arc::new(MemoryErrorLogStore::new());
        seed(records.as_ref(), errors.as_ref()).await;

        let report = Cleanup::new(records.clone(), errors.clone())
            .run(42, CleanupScope::RecordsAndErrors)
            .await;

        assert_eq!(report.total_deleted(), 6);
        assert!(errors.is_empty());
    }

    #[tokio::test]
    async fn test_failed_delete_does_not_stop_cleanup() {
        let inner = MemoryRecordStore::new();
        for ck in 0..4 {
            inner.insert(&Record::new(42, ck, "x", ck)).await.unwrap();
        }
        let records = Arc::new(FaultInjectingRecordStore::new(inner).with_failures(vec![
            StoreFault::Ok,
            StoreFault::Unavailable("lock timeout"),
        ]));

        let report = Cleanup::new(records.clone(), Arc::new(MemoryErrorLogStore::new()))
            .run(42, CleanupScope::RecordsOnly)
            .await;

        assert_eq!(report.records_deleted, 3);
        assert_eq!(report.failures, 1);
        assert_eq!(records.inner().partition_len(42), 1);
    }
}
