//! Core domain types, configuration, and store traits for the keyload engine.

pub mod config;
pub mod error;
pub mod metrics;
pub mod operation;
pub mod record;
pub mod traits;

pub use config::{
    CleanupConfig, CleanupScope, KeyloadConfig, LoadTestConfig, LoggingConfig, RampUpMode,
    RecorderConfig, StoreBackend, StoreConfig, DEFAULT_AWAIT_GRACE,
};
pub use error::{CoreError, CoreResult};
pub use operation::{OperationKind, Phase};
pub use record::{ExceptionRecord, Record};
pub use traits::{ErrorLogStore, RecordStore};
