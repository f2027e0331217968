//! Durable capture of per-operation failures.
//!
//! The recorder never returns an error to its caller: persistence is retried
//! a bounded number of times with the timestamp advanced by one millisecond
//! per attempt, then the exception is dropped and counted.

use chrono::{DateTime, TimeDelta, Utc};
use keyload_core::metrics::{EXCEPTIONS_RECORDED, RECORDER_FAILURES};
use keyload_core::record::truncate_to_millis;
use keyload_core::{CoreError, ErrorLogStore, ExceptionRecord, OperationKind, RecorderConfig};
use std::error::Error as StdError;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::{error, warn};

/// Serializes a failure as `"{KIND} failed [code N]: {error}"` plus one
/// `Caused by:` line per source in the chain.
#[must_use]
pub fn format_exception(kind: OperationKind, err: &CoreError) -> String {
    let mut message = format!("{} failed [code {}]: {}", kind.label(), err.error_code(), err);
    let mut source = err.source();
    while let Some(cause) = source {
        message.push_str("\nCaused by: ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

/// Cuts `message` so the result, marker included, fits in `max_bytes`.
///
/// Messages already within the ceiling are returned unchanged. The cut lands
/// on a UTF-8 character boundary.
#[must_use]
pub fn truncate_message(message: String, max_bytes: usize) -> String {
    let original_len = message.len();
    if original_len <= max_bytes {
        return message;
    }

    let marker = format!("\n... [TRUNCATED - original length: {original_len} bytes]");
    let mut keep = max_bytes.saturating_sub(marker.len());
    while !message.is_char_boundary(keep) {
        keep -= 1;
    }

    let mut truncated = String::with_capacity(keep + marker.len());
    truncated.push_str(&message[..keep]);
    if truncated.len() + marker.len() <= max_bytes {
        truncated.push_str(&marker);
    }
    truncated
}

/// Persists [`ExceptionRecord`]s to the error log store.
pub struct ExceptionRecorder {
    store: Arc<dyn ErrorLogStore>,
    config: RecorderConfig,
    recorded: AtomicU64,
    failures: AtomicU64,
}

impl ExceptionRecorder {
    pub fn new(store: Arc<dyn ErrorLogStore>, config: RecorderConfig) -> Self {
        Self {
            store,
            config,
            recorded: AtomicU64::new(0),
            failures: AtomicU64::new(0),
        }
    }

    /// Exceptions persisted so far.
    pub fn recorded(&self) -> u64 {
        self.recorded.load(Ordering::Relaxed)
    }

    /// Exceptions dropped after exhausting every attempt.
    pub fn failures(&self) -> u64 {
        self.failures.load(Ordering::Relaxed)
    }

    /// Worker-local handle that keeps a timestamp cursor.
    pub fn handle(self: &Arc<Self>) -> RecorderHandle {
        RecorderHandle {
            recorder: Arc::clone(self),
            last_occurred_at: None,
        }
    }

    /// Records one failure stamped with the current time. Never fails.
    pub async fn record(
        &self,
        partition_key: i32,
        clustering_key: i64,
        kind: OperationKind,
        err: &CoreError,
    ) {
        let occurred_at = truncate_to_millis(Utc::now());
        self.persist(partition_key, clustering_key, kind, err, occurred_at)
            .await;
    }

    /// Tries up to `max_attempts` timestamps starting at `base`.
    ///
    /// Returns the last timestamp tried and whether it was persisted.
    async fn persist(
        &self,
        partition_key: i32,
        clustering_key: i64,
        kind: OperationKind,
        err: &CoreError,
        base: DateTime<Utc>,
    ) -> (DateTime<Utc>, bool) {
        let message = truncate_message(format_exception(kind, err), self.config.max_message_bytes);
        let mut record = ExceptionRecord {
            partition_key,
            clustering_key,
            operation_kind: kind,
            message,
            occurred_at: base,
        };

        let max_attempts = self.config.max_attempts.max(1);
        for attempt in 0..max_attempts {
            record.occurred_at = base + TimeDelta::milliseconds(i64::from(attempt));

            match self.store.insert(&record).await {
                Ok(()) => {
                    self.recorded.fetch_add(1, Ordering::Relaxed);
                    EXCEPTIONS_RECORDED.inc();
                    return (record.occurred_at, true);
                }
                Err(persist_err) if attempt + 1 < max_attempts => {
                    warn!(
                        key = %record.key_string(),
                        attempt = attempt + 1,
                        conflict = persist_err.is_conflict(),
                        "Failed to persist exception, retrying: {}",
                        persist_err
                    );
                    tokio::time::sleep(self.config.retry_backoff()).await;
                }
                Err(persist_err) => {
                    error!(
                        key = %record.key_string(),
                        attempts = max_attempts,
                        "Dropping exception after exhausting attempts: {}",
                        persist_err
                    );
                }
            }
        }

        self.failures.fetch_add(1, Ordering::Relaxed);
        RECORDER_FAILURES.inc();
        (record.occurred_at, false)
    }
}

/// Per-worker recorder front end.
///
/// Never hands out a timestamp at or before one this worker already used, so
/// two failures on the same key within one millisecond get distinct rows.
pub struct RecorderHandle {
    recorder: Arc<ExceptionRecorder>,
    last_occurred_at: Option<DateTime<Utc>>,
}

impl RecorderHandle {
    pub async fn record(
        &mut self,
        partition_key: i32,
        clustering_key: i64,
        kind: OperationKind,
        err: &CoreError,
    ) {
        let now = truncate_to_millis(Utc::now());
        let base = match self.last_occurred_at {
            Some(last) if now <= last => last + TimeDelta::milliseconds(1),
            _ => now,
        };

        let (last_tried, _) = self
            .recorder
            .persist(partition_key, clustering_key, kind, err, base)
            .await;
        self.last_occurred_at = Some(last_tried);
    }

    pub fn last_occurred_at(&self) -> Option<DateTime<Utc>> {
        self.last_occurred_at
    }
}
