//! SQLite store adapters built on sqlx.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use sqlx::migrate::MigrateError;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions, SqliteRow};
use sqlx::{query, Row, SqlitePool};
use std::str::FromStr;
use std::time::Duration;

use keyload_core::{
    CoreError, CoreResult, ErrorLogStore, ExceptionRecord, OperationKind, Record, RecordStore,
};

/// Embedded SQL migrations for the record and error tables.
pub static MIGRATOR: sqlx::migrate::Migrator = sqlx::migrate!("./migrations");

/// Creates a SQLite connection pool configured for concurrent load-test writers.
pub async fn create_sqlite_pool(
    database_url: &str,
    max_connections: u32,
) -> Result<SqlitePool, sqlx::Error> {
    let options = SqliteConnectOptions::from_str(database_url)?
        .create_if_missing(true)
        .journal_mode(SqliteJournalMode::Wal)
        .busy_timeout(Duration::from_secs(5));

    SqlitePoolOptions::new()
        .max_connections(max_connections)
        .connect_with(options)
        .await
}

/// Runs all outstanding migrations against the provided connection pool.
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

fn map_sqlx_error(entity: &'static str, id: String, err: sqlx::Error) -> CoreError {
    match err {
        sqlx::Error::RowNotFound => CoreError::not_found(entity, id),
        sqlx::Error::Database(db_err) => {
            let message = db_err.message().to_string();
            if db_err.is_unique_violation() || message.contains("UNIQUE constraint failed") {
                CoreError::conflict(entity, id)
            } else if message.contains("database is locked") || message.contains("busy") {
                CoreError::unavailable(message)
            } else {
                CoreError::StorageError(message)
            }
        }
        sqlx::Error::PoolTimedOut | sqlx::Error::PoolClosed | sqlx::Error::Io(_) => {
            CoreError::unavailable(err.to_string())
        }
        other => CoreError::StorageError(other.to_string()),
    }
}

fn format_timestamp(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

/// SQLite-backed record store.
#[derive(Debug, Clone)]
pub struct SqliteRecordStore {
    pool: SqlitePool,
}

impl SqliteRecordStore {
    /// Creates a store backed by the provided pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn map_row(row: SqliteRow) -> Record {
        Record {
            partition_key: row.get("partition_key"),
            clustering_key: row.get("clustering_key"),
            string_value: row.get("string_value"),
            bint_value: row.get("bint_value"),
        }
    }
}

#[async_trait]
impl RecordStore for SqliteRecordStore {
    async fn insert(&self, record: &Record) -> CoreResult<()> {
        query(
            r#"
            INSERT INTO records (partition_key, clustering_key, string_value, bint_value)
            VALUES (?1, ?2, ?3, ?4)
            "#,
        )
        .bind(record.partition_key)
        .bind(record.clustering_key)
        .bind(&record.string_value)
        .bind(record.bint_value)
        .execute(&self.pool)
        .await
        .map(|_| ())
        .map_err(|err| map_sqlx_error("record", record.key_string(), err))
    }

    async fn select(&self, partition_key: i32, clustering_key: i64) -> CoreResult<Record> {
        let id = format!("{partition_key}/{clustering_key}");
        let row = query(
            r#"
            SELECT partition_key, clustering_key, string_value, bint_value
              FROM records
             WHERE partition_key = ?1 AND clustering_key = ?2
            "#,
        )
        .bind(partition_key)
        .bind(clustering_key)
        .fetch_optional(&self.pool)
        .await
        .map_err(|err| map_sqlx_error("record", id.clone(), err))?;

        row.map(Self::map_row)
            .ok_or_else(|| CoreError::not_found("record", id))
    }

    async fn update(&self, record: &Record) -> CoreResult<()> {
        let rows = query(
            r#"
            UPDATE records
               SET string_value = ?3,
                   bint_value = ?4
             WHERE partition_key = ?1 AND clustering_key = ?2
            "#,
        )
        .bind(record.partition_key)
        .bind(record.clustering_key)
        .bind(&record.string_value)
        .bind(record.bint_value)
        .execute(&self.pool)
        .await
        .map_err(|err| map_sqlx_error("record", record.key_string(), err))?;

        if rows.rows_affected() == 0 {
            return Err(CoreError::not_found("record", record.key_string()));
        }
        Ok(())
    }

    async fn delete(&self, partition_key: i32, clustering_key: i64) -> CoreResult<()> {
        let id = format!("{partition_key}/{clustering_key}");
        let rows = query(
            r#"
            DELETE FROM records
             WHERE partition_key = ?1 AND clustering_key = ?2
            "#,
        )
        .bind(partition_key)
        .bind(clustering_key)
        .execute(&self.pool)
        .await
        .map_err(|err| map_sqlx_error("record", id.clone(), err))?;

        if rows.rows_affected() == 0 {
            return Err(CoreError::not_found("record", id));
        }
        Ok(())
    }

    async fn scan_partition(&self, partition_key: i32) -> CoreResult<Vec<Record>> {
        let rows = query(
            r#"
            SELECT partition_key, clustering_key, string_value, bint_value
              FROM records
             WHERE partition_key = ?1
          ORDER BY clustering_key ASC
            "#,
        )
        .bind(partition_key)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| map_sqlx_error("record", partition_key.to_string(), err))?;

        Ok(rows.into_iter().map(Self::map_row).collect())
    }
}

/// SQLite-backed error log store.
#[derive(Debug, Clone)]
pub struct SqliteErrorLogStore {
    pool: SqlitePool,
}

impl SqliteErrorLogStore {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn map_row(row: SqliteRow) -> CoreResult<ExceptionRecord> {
        let kind: String = row.get("operation_kind");
        let operation_kind = OperationKind::ALL
            .into_iter()
            .find(|candidate| candidate.as_str() == kind)
            .ok_or_else(|| CoreError::internal(format!("unknown operation kind `{kind}`")))?;

        let occurred_at: String = row.get("exception_at");
        let occurred_at = DateTime::parse_from_rfc3339(&occurred_at)
            .map_err(|err| CoreError::internal(format!("invalid exception_at: {err}")))?
            .with_timezone(&Utc);

        Ok(ExceptionRecord {
            partition_key: row.get("partition_key"),
            clustering_key: row.get("clustering_key"),
            operation_kind,
            message: row.get("exception"),
            occurred_at,
        })
    }
}

#[async_trait]
impl ErrorLogStore for SqliteErrorLogStore {
    async fn insert(&self, record: &ExceptionRecord) -> CoreResult<()> {
        query(
            r#"
            INSERT INTO record_errors (
                partition_key,
                clustering_key,
                exception_at,
                operation_kind,
                exception
            )
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
        )
        .bind(record.partition_key)
        .bind(record.clustering_key)
        .bind(format_timestamp(record.occurred_at))
        .bind(record.operation_kind.as_str())
        .bind(&record.message)
        .execute(&self.pool)
        .await
        .map(|_| ())
        .map_err(|err| map_sqlx_error("record error", record.key_string(), err))
    }

    async fn scan_partition(&self, partition_key: i32) -> CoreResult<Vec<ExceptionRecord>> {
        let rows = query(
            r#"
            SELECT partition_key, clustering_key, exception_at, operation_kind, exception
              FROM record_errors
             WHERE partition_key = ?1
          ORDER BY clustering_key ASC, exception_at ASC
            "#,
        )
        .bind(partition_key)
        .fetch_all(&self.pool)
        .await
        .map_err(|err| map_sqlx_error("record error", partition_key.to_string(), err))?;

        rows.into_iter().map(Self::map_row).collect()
    }

    async fn delete(
        &self,
        partition_key: i32,
        clustering_key: i64,
        occurred_at: DateTime<Utc>,
    ) -> CoreResult<()> {
        let id = format!(
            "{partition_key}/{clustering_key}@{}",
            occurred_at.timestamp_millis()
        );
        let rows = query(
            r#"
            DELETE FROM record_errors
             WHERE partition_key = ?1 AND clustering_key = ?2 AND exception_at = ?3
            "#,
        )
        .bind(partition_key)
        .bind(clustering_key)
        .bind(format_timestamp(occurred_at))
        .execute(&self.pool)
        .await
        .map_err(|err| map_sqlx_error("record error", id.clone(), err))?;

        if rows.rows_affected() == 0 {
            return Err(CoreError::not_found("record error", id));
        }
        Ok(())
    }
}
