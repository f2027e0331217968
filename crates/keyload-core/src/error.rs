use thiserror::Error;

/// Canonical error type shared by the engine and every store adapter.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Row was not found in the store.
    #[error("{entity} `{id}` was not found")]
    NotFound {
        /// Entity type name (e.g. `"record"`).
        entity: &'static str,
        /// Key of the missing row.
        id: String,
    },

    /// Row already exists, or a concurrent writer won an optimistic check.
    #[error("{entity} `{id}` conflicts with an existing row")]
    Conflict {
        /// Entity type name (e.g. `"record"`).
        entity: &'static str,
        /// Key that conflicts.
        id: String,
    },

    /// Backend could not serve the request (lock contention, pool exhaustion, outage).
    #[error("store unavailable: {message}")]
    Unavailable {
        /// Human-readable description of the outage.
        message: String,
    },

    /// Commit outcome could not be determined.
    #[error("unknown transaction status: {message}")]
    UnknownStatus {
        /// Human-readable details.
        message: String,
    },

    /// Validation error for configuration or input data.
    #[error("validation error: {0}")]
    ValidationError(String),

    /// Worker pool could not be created.
    #[error("failed to create worker pool: {0}")]
    PoolCreation(String),

    /// Storage backend error that does not fit another variant.
    #[error("storage error: {0}")]
    StorageError(String),

    /// Unexpected internal error occurred.
    #[error("internal error: {message}")]
    Internal {
        /// Human-readable details for debugging purposes.
        message: String,
    },

    /// I/O error occurred during file or network operations.
    #[error("I/O error: {0}")]
    IoError(#[from] std::io::Error),

    /// Configuration could not be loaded.
    #[error("configuration error: {0}")]
    Config(#[from] config::ConfigError),
}

impl CoreError {
    /// Creates a `NotFound` variant.
    #[must_use]
    pub fn not_found(entity: &'static str, id: impl Into<String>) -> Self {
        Self::NotFound {
            entity,
            id: id.into(),
        }
    }

    /// Creates a `Conflict` variant.
    #[must_use]
    pub fn conflict(entity: &'static str, id: impl Into<String>) -> Self {
        Self::Conflict {
            entity,
            id: id.into(),
        }
    }

    /// Creates an `Unavailable` variant.
    #[must_use]
    pub fn unavailable(message: impl Into<String>) -> Self {
        Self::Unavailable {
            message: message.into(),
        }
    }

    /// Creates an `UnknownStatus` variant.
    #[must_use]
    pub fn unknown_status(message: impl Into<String>) -> Self {
        Self::UnknownStatus {
            message: message.into(),
        }
    }

    /// Creates an `Internal` variant.
    #[must_use]
    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
        }
    }

    /// Returns true when the failure is a key collision.
    #[must_use]
    pub fn is_conflict(&self) -> bool {
        matches!(self, Self::Conflict { .. })
    }

    /// Numeric error code reported alongside recorded exceptions.
    ///
    /// 9100 = conflict, 9200 = unknown commit status, 9300 = other store
    /// failure, 9400 = validation or internal fault, 9500 = anything else.
    #[must_use]
    pub fn error_code(&self) -> u32 {
        match self {
            Self::Conflict { .. } => 9100,
            Self::UnknownStatus { .. } => 9200,
            Self::NotFound { .. } | Self::Unavailable { .. } | Self::StorageError(_) => 9300,
            Self::ValidationError(_) | Self::Internal { .. } => 9400,
            Self::PoolCreation(_) | Self::IoError(_) | Self::Config(_) => 9500,
        }
    }
}

/// Convenient result alias for core operations.
pub type CoreResult<T> = Result<T, CoreError>;
