use serde::{Deserialize, Serialize};
use std::fmt;

/// Store operation issued by a load-test worker.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OperationKind {
    Insert,
    Select,
    Update,
    Delete,
}

impl OperationKind {
    /// All kinds in the order a worker issues them within one iteration.
    pub const ALL: [OperationKind; 4] = [
        OperationKind::Insert,
        OperationKind::Select,
        OperationKind::Update,
        OperationKind::Delete,
    ];

    /// Lowercase label used in results and metrics.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Insert => "insert",
            Self::Select => "select",
            Self::Update => "update",
            Self::Delete => "delete",
        }
    }

    /// Uppercase label used in recorded exception messages.
    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            Self::Insert => "INSERT",
            Self::Select => "SELECT",
            Self::Update => "UPDATE",
            Self::Delete => "DELETE",
        }
    }

    /// Dense index for per-kind counter arrays.
    #[must_use]
    pub fn index(&self) -> usize {
        match self {
            Self::Insert => 0,
            Self::Select => 1,
            Self::Update => 2,
            Self::Delete => 3,
        }
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Phase of the test timeline an operation belongs to.
///
/// Classified per iteration by comparing the wall clock against the ramp-up
/// deadline; ramp-up operations hit the store but are left out of reported
/// statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    RampUp,
    SteadyState,
}

impl Phase {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::RampUp => "ramp_up",
            Self::SteadyState => "steady_state",
        }
    }
}
