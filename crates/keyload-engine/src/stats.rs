//! Statistics aggregation shared by all workers.
//!
//! Only outcomes are stored; `attempted` is derived as `succeeded + failed`,
//! so every snapshot balances even while workers are still running.

use keyload_core::metrics::OPERATIONS_TOTAL;
use keyload_core::{OperationKind, Phase};
use serde::Serialize;
use std::sync::atomic::{AtomicU64, Ordering};

#[derive(Debug, Default)]
struct KindCounters {
    succeeded: AtomicU64,
    failed: AtomicU64,
}

impl KindCounters {
    fn load(&self) -> KindStats {
        let succeeded = self.succeeded.load(Ordering::Relaxed);
        let failed = self.failed.load(Ordering::Relaxed);
        KindStats {
            attempted: succeeded + failed,
            succeeded,
            failed,
        }
    }
}

#[derive(Debug, Default)]
struct PeriodCounters {
    kinds: [KindCounters; 4],
}

impl PeriodCounters {
    fn load(&self) -> PeriodStats {
        PeriodStats {
            kinds: [
                self.kinds[0].load(),
                self.kinds[1].load(),
                self.kinds[2].load(),
                self.kinds[3].load(),
            ],
        }
    }
}

/// Lock-free per-kind counters for the ramp-up and steady-state periods.
#[derive(Debug, Default)]
pub struct StatisticsAggregator {
    ramp_up: PeriodCounters,
    steady_state: PeriodCounters,
}

impl StatisticsAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records the outcome of one operation.
    pub fn record(&self, kind: OperationKind, phase: Phase, success: bool) {
        let period = match phase {
            Phase::RampUp => &self.ramp_up,
            Phase::SteadyState => &self.steady_state,
        };
        let counters = &period.kinds[kind.index()];

        let outcome = if success {
            counters.succeeded.fetch_add(1, Ordering::Relaxed);
            "success"
        } else {
            counters.failed.fetch_add(1, Ordering::Relaxed);
            "error"
        };

        OPERATIONS_TOTAL
            .with_label_values(&[kind.as_str(), outcome, phase.as_str()])
            .inc();
    }

    /// Reads every counter. Safe to call while workers are still recording.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            ramp_up: self.ramp_up.load(),
            steady_state: self.steady_state.load(),
        }
    }
}

/// Counts for one operation kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindStats {
    pub attempted: u64,
    pub succeeded: u64,
    pub failed: u64,
}

impl KindStats {
    fn merge(self, other: KindStats) -> KindStats {
        KindStats {
            attempted: self.attempted + other.attempted,
            succeeded: self.succeeded + other.succeeded,
            failed: self.failed + other.failed,
        }
    }
}

/// Counts for every kind within one period.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PeriodStats {
    kinds: [KindStats; 4],
}

impl PeriodStats {
    pub fn kind(&self, kind: OperationKind) -> KindStats {
        self.kinds[kind.index()]
    }

    /// Operations attempted across all kinds.
    pub fn attempted(&self) -> u64 {
        self.kinds.iter().map(|k| k.attempted).sum()
    }

    pub fn failed(&self) -> u64 {
        self.kinds.iter().map(|k| k.failed).sum()
    }

    fn merge(&self, other: &PeriodStats) -> PeriodStats {
        let mut kinds = self.kinds;
        for (kind, extra) in kinds.iter_mut().zip(other.kinds.iter()) {
            *kind = kind.merge(*extra);
        }
        PeriodStats { kinds }
    }
}

/// Point-in-time copy of the aggregator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub ramp_up: PeriodStats,
    pub steady_state: PeriodStats,
}

impl StatsSnapshot {
    /// Lifetime counts (ramp-up plus steady-state).
    pub fn total(&self) -> PeriodStats {
        self.ramp_up.merge(&self.steady_state)
    }
}

/// Operations per minute over `elapsed_ms`, or 0 for an empty or negative window.
#[must_use]
pub fn throughput_per_minute(operations: u64, elapsed_ms: i64) -> f64 {
    if elapsed_ms <= 0 {
        return 0.0;
    }
    operations as f64 * 60_000.0 / elapsed_ms as f64
}
