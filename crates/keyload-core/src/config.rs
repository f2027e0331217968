//! Configuration management for keyload
//!
//! This module provides a centralized configuration system that supports:
//! - YAML/TOML/JSON configuration files
//! - Environment variable overrides
//! - Reasonable defaults
//! - Configuration validation

use config::{Config, ConfigError, Environment, File};
use serde::{Deserialize, Serialize};
use std::path::Path;
use std::time::Duration;

use crate::error::{CoreError, CoreResult};

/// Root configuration structure for keyload
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct KeyloadConfig {
    #[serde(default)]
    pub load_test: LoadTestConfig,

    #[serde(default)]
    pub recorder: RecorderConfig,

    #[serde(default)]
    pub cleanup: CleanupConfig,

    #[serde(default)]
    pub store: StoreConfig,

    #[serde(default)]
    pub logging: LoggingConfig,
}

impl KeyloadConfig {
    /// Load configuration from multiple sources with precedence:
    /// 1. Environment variables (highest priority)
    /// 2. Config file specified by KEYLOAD_CONFIG env var
    /// 3. ./config/keyload.{yaml,toml,json}
    /// 4. Hardcoded defaults (lowest priority)
    pub fn load() -> CoreResult<Self> {
        let mut builder = Self::set_defaults(Config::builder())?;

        builder = builder.add_source(File::with_name("./config/keyload").required(false));

        if let Ok(config_path) = std::env::var("KEYLOAD_CONFIG") {
            builder = builder.add_source(File::with_name(&config_path).required(false));
        }

        // Example: KEYLOAD_LOAD_TEST__THREAD_COUNT=32
        builder = builder.add_source(
            Environment::with_prefix("KEYLOAD")
                .prefix_separator("_")
                .separator("__")
                .try_parsing(true),
        );

        let config: KeyloadConfig = builder.build()?.try_deserialize()?;
        config.validate()?;

        Ok(config)
    }

    /// Load configuration from a specific file path, layered over defaults.
    pub fn from_file<P: AsRef<Path>>(path: P) -> CoreResult<Self> {
        let config: KeyloadConfig = Self::set_defaults(Config::builder())?
            .add_source(File::from(path.as_ref()))
            .build()?
            .try_deserialize()?;

        config.validate()?;
        Ok(config)
    }

    fn set_defaults(
        builder: config::ConfigBuilder<config::builder::DefaultState>,
    ) -> Result<config::ConfigBuilder<config::builder::DefaultState>, ConfigError> {
        let load_test = LoadTestConfig::default();
        let recorder = RecorderConfig::default();
        builder
            // Load test
            .set_default("load_test.test_duration_seconds", i64::from(load_test.test_duration_seconds))?
            .set_default("load_test.ramp_up_time_seconds", i64::from(load_test.ramp_up_time_seconds))?
            .set_default("load_test.thread_count", i64::from(load_test.thread_count))?
            .set_default("load_test.partition_key", i64::from(load_test.partition_key))?
            .set_default("load_test.select_ratio", load_test.select_ratio)?
            .set_default("load_test.update_ratio", load_test.update_ratio)?
            .set_default("load_test.delete_ratio", load_test.delete_ratio)?
            .set_default(
                "load_test.exception_retry_interval_ms",
                load_test.exception_retry_interval_ms as i64,
            )?
            .set_default("load_test.operation_delay_ms", load_test.operation_delay_ms as i64)?
            .set_default("load_test.cleanup_after_test", load_test.cleanup_after_test)?
            .set_default("load_test.ramp_up_mode", "staggered")?
            // Exception recorder
            .set_default("recorder.max_message_bytes", recorder.max_message_bytes as i64)?
            .set_default("recorder.max_attempts", i64::from(recorder.max_attempts))?
            .set_default("recorder.retry_backoff_ms", recorder.retry_backoff_ms as i64)?
            // Cleanup
            .set_default("cleanup.scope", "records_only")?
            // Store
            .set_default("store.backend", "memory")?
            .set_default("store.database_url", StoreConfig::default().database_url)?
            .set_default("store.max_connections", i64::from(StoreConfig::default().max_connections))?
            // Logging
            .set_default("logging.level", "info")
    }

    /// Validate configuration values
    pub fn validate(&self) -> CoreResult<()> {
        self.load_test.validate()?;
        self.recorder.validate()?;

        if self.store.max_connections == 0 {
            return Err(CoreError::ValidationError(
                "store.max_connections must be > 0".to_string(),
            ));
        }

        Ok(())
    }
}

/// Extra time workers get past the test deadline before the run is finalized.
pub const DEFAULT_AWAIT_GRACE: Duration = Duration::from_secs(60);

/// How workers are started across the ramp-up window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum RampUpMode {
    /// All workers start at once; ramp-up only excludes early operations from statistics.
    Immediate,

    /// Worker `i` starts `ramp_up / thread_count * (i - 1)` after the test start.
    #[default]
    Staggered,
}

/// Parameters of one load-test run. Read-only once the run starts.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoadTestConfig {
    /// Length of the statistics window after ramp-up
    pub test_duration_seconds: u32,

    /// Length of the ramp-up window
    pub ramp_up_time_seconds: u32,

    /// Number of concurrent workers
    pub thread_count: u32,

    /// Partition every worker writes into
    pub partition_key: i32,

    /// Selects per iteration (fractional part applied probabilistically)
    pub select_ratio: f64,

    /// Updates per iteration
    pub update_ratio: f64,

    /// Deletes per iteration
    pub delete_ratio: f64,

    /// Pause after a failed operation
    pub exception_retry_interval_ms: u64,

    /// Pause between iterations regardless of outcome
    pub operation_delay_ms: u64,

    /// Delete the partition's rows once the run finishes
    pub cleanup_after_test: bool,

    #[serde(default)]
    pub ramp_up_mode: RampUpMode,

    /// Base seed for per-worker random sources; entropy-seeded when absent
    #[serde(default)]
    pub seed: Option<u64>,
}

impl Default for LoadTestConfig {
    fn default() -> Self {
        Self {
            test_duration_seconds: 60,
            ramp_up_time_seconds: 0,
            thread_count: 10,
            partition_key: 1,
            select_ratio: 1.0,
            update_ratio: 1.0,
            delete_ratio: 0.0,
            exception_retry_interval_ms: 100,
            operation_delay_ms: 0,
            cleanup_after_test: false,
            ramp_up_mode: RampUpMode::Staggered,
            seed: None,
        }
    }
}

impl LoadTestConfig {
    /// Rejects configurations the engine cannot run.
    pub fn validate(&self) -> CoreResult<()> {
        if self.thread_count == 0 {
            return Err(CoreError::ValidationError(
                "load_test.thread_count must be >= 1".to_string(),
            ));
        }

        if self.test_duration_seconds == 0 {
            return Err(CoreError::ValidationError(
                "load_test.test_duration_seconds must be >= 1".to_string(),
            ));
        }

        for (name, ratio) in [
            ("select_ratio", self.select_ratio),
            ("update_ratio", self.update_ratio),
            ("delete_ratio", self.delete_ratio),
        ] {
            if !ratio.is_finite() || ratio < 0.0 {
                return Err(CoreError::ValidationError(format!(
                    "load_test.{name} must be a finite value >= 0 (got {ratio})"
                )));
            }
        }

        Ok(())
    }

    pub fn ramp_up(&self) -> Duration {
        Duration::from_secs(u64::from(self.ramp_up_time_seconds))
    }

    pub fn test_duration(&self) -> Duration {
        Duration::from_secs(u64::from(self.test_duration_seconds))
    }

    /// Bound on how long the orchestrator waits for workers to finish:
    /// ramp-up plus test duration plus `grace`.
    pub fn await_timeout(&self, grace: Duration) -> Duration {
        self.ramp_up() + self.test_duration() + grace
    }

    pub fn exception_retry_interval(&self) -> Duration {
        Duration::from_millis(self.exception_retry_interval_ms)
    }

    pub fn operation_delay(&self) -> Duration {
        Duration::from_millis(self.operation_delay_ms)
    }
}

/// Exception recorder configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RecorderConfig {
    /// Ceiling on the serialized exception message, marker included
    pub max_message_bytes: usize,

    /// Persistence attempts per exception
    pub max_attempts: u32,

    /// Pause between persistence attempts
    pub retry_backoff_ms: u64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            max_message_bytes: 8192,
            max_attempts: 3,
            retry_backoff_ms: 10,
        }
    }
}

impl RecorderConfig {
    pub fn validate(&self) -> CoreResult<()> {
        if self.max_message_bytes < 128 {
            return Err(CoreError::ValidationError(
                "recorder.max_message_bytes must be >= 128".to_string(),
            ));
        }

        if self.max_attempts == 0 {
            return Err(CoreError::ValidationError(
                "recorder.max_attempts must be > 0".to_string(),
            ));
        }

        Ok(())
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

/// Which tables post-run cleanup sweeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CleanupScope {
    /// Delete records only; error-log rows are kept for analysis.
    #[default]
    RecordsOnly,

    /// Delete records, then error-log rows under the same partition.
    RecordsAndErrors,
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
pub struct CleanupConfig {
    #[serde(default)]
    pub scope: CleanupScope,
}

/// Store adapter selected at construction time.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum StoreBackend {
    #[default]
    Memory,
    Sqlite,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct StoreConfig {
    pub backend: StoreBackend,

    /// Connection URL for the SQLite backend
    pub database_url: String,

    pub max_connections: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: StoreBackend::Memory,
            database_url: "sqlite://keyload.db".to_string(),
            max_connections: 8,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct LoggingConfig {
    /// Default filter directive when RUST_LOG is unset
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
        }
    }
}
