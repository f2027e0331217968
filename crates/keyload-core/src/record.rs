use chrono::{DateTime, DurationRound, TimeDelta, Utc};
use serde::{Deserialize, Serialize};

use crate::operation::OperationKind;

/// Row of the record store, keyed by `(partition_key, clustering_key)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Record {
    pub partition_key: i32,
    pub clustering_key: i64,
    pub string_value: Option<String>,
    pub bint_value: Option<i64>,
}

impl Record {
    /// Creates a record carrying both payload columns.
    #[must_use]
    pub fn new(
        partition_key: i32,
        clustering_key: i64,
        string_value: impl Into<String>,
        bint_value: i64,
    ) -> Self {
        Self {
            partition_key,
            clustering_key,
            string_value: Some(string_value.into()),
            bint_value: Some(bint_value),
        }
    }

    /// `partition/clustering` identifier used in error messages.
    #[must_use]
    pub fn key_string(&self) -> String {
        format!("{}/{}", self.partition_key, self.clustering_key)
    }
}

/// Failure captured during a load test, keyed by
/// `(partition_key, clustering_key, occurred_at)` in the error log store.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExceptionRecord {
    pub partition_key: i32,
    pub clustering_key: i64,
    pub operation_kind: OperationKind,
    pub message: String,
    pub occurred_at: DateTime<Utc>,
}

impl ExceptionRecord {
    /// `partition/clustering@timestamp` identifier used in error messages.
    #[must_use]
    pub fn key_string(&self) -> String {
        format!(
            "{}/{}@{}",
            self.partition_key,
            self.clustering_key,
            self.occurred_at.timestamp_millis()
        )
    }
}

/// Truncates a timestamp to millisecond precision.
#[must_use]
pub fn truncate_to_millis(ts: DateTime<Utc>) -> DateTime<Utc> {
    ts.duration_trunc(TimeDelta::milliseconds(1)).unwrap_or(ts)
}
