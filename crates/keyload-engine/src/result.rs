use keyload_core::{OperationKind, RampUpMode};
use serde::Serialize;

use crate::stats::{KindStats, PeriodStats};

/// One count per operation kind.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct KindCounts {
    pub insert: u64,
    pub select: u64,
    pub update: u64,
    pub delete: u64,
}

impl KindCounts {
    /// Projects one field of every kind's stats out of `period`.
    pub fn from_period(period: &PeriodStats, field: impl Fn(KindStats) -> u64) -> Self {
        Self {
            insert: field(period.kind(OperationKind::Insert)),
            select: field(period.kind(OperationKind::Select)),
            update: field(period.kind(OperationKind::Update)),
            delete: field(period.kind(OperationKind::Delete)),
        }
    }

    pub fn get(&self, kind: OperationKind) -> u64 {
        match kind {
            OperationKind::Insert => self.insert,
            OperationKind::Select => self.select,
            OperationKind::Update => self.update,
            OperationKind::Delete => self.delete,
        }
    }

    pub fn sum(&self) -> u64 {
        self.insert + self.select + self.update + self.delete
    }
}

/// Ratios the run was configured with.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Ratios {
    pub select: f64,
    pub update: f64,
    pub delete: f64,
}

/// Final report of one load-test run.
///
/// Per-kind counts and throughput cover the steady-state window only;
/// `total_operations` includes ramp-up.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadTestResult {
    pub total_operations: u64,
    pub steady_state_operations: u64,
    pub operation_counts: KindCounts,
    pub success_counts: KindCounts,
    pub error_counts: KindCounts,

    pub total_elapsed_ms: i64,
    pub ramp_up_elapsed_ms: i64,
    pub steady_state_elapsed_ms: i64,
    /// Same as `steady_state_elapsed_ms`.
    pub actual_test_duration_ms: i64,
    pub throughput_per_minute: f64,

    pub ratios: Ratios,
    pub thread_count: u32,
    pub test_duration_seconds: u32,
    pub ramp_up_time_seconds: u32,
    pub ramp_up_mode: RampUpMode,

    pub exceptions_recorded: u64,
    pub recorder_failures: u64,

    pub cleanup_executed: bool,
    pub cleanup_records_deleted: u64,

    pub timed_out: bool,
    pub cancelled: bool,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::stats::StatisticsAggregator;
    use keyload_core::Phase;

    #[test]
    fn test_kind_counts_projection() {
        let stats = StatisticsAggregator::new();
        stats.record(OperationKind::Insert, Phase::SteadyState, true);
        stats.record(OperationKind::Select, Phase::SteadyState, false);
        stats.record(OperationKind::Select, Phase::SteadyState, true);

        let period = stats.snapshot().steady_state;
        let attempted = KindCounts::from_period(&period, |k| k.attempted);
        let failed = KindCounts::from_period(&period, |k| k.failed);

        assert_eq!(attempted.get(OperationKind::Select), 2);
        assert_eq!(attempted.sum(), 3);
        assert_eq!(failed, KindCounts { select: 1, ..Default::default() });
    }

    #[test]
    fn test_serializes_camel_case() {
        let result = LoadTestResult {
            total_operations: 10,
            steady_state_operations: 8,
            operation_counts: KindCounts::default(),
            success_counts: KindCounts::default(),
            error_counts: KindCounts::default(),
            total_elapsed_ms: 1_000,
            ramp_up_elapsed_ms: 0,
            steady_state_elapsed_ms: 1_000,
            actual_test_duration_ms: 1_000,
            throughput_per_minute: 480.0,
            ratios: Ratios {
                select: 1.0,
                update: 0.5,
                delete: 0.0,
            },
            thread_count: 2,
            test_duration_seconds: 1,
            ramp_up_time_seconds: 0,
            ramp_up_mode: RampUpMode::Immediate,
            exceptions_recorded: 0,
            recorder_failures: 0,
            cleanup_executed: false,
            cleanup_records_deleted: 0,
            timed_out: false,
            cancelled: false,
        };

        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["steadyStateOperations"], 8);
        assert_eq!(json["throughputPerMinute"], 480.0);
        assert_eq!(json["rampUpMode"], "immediate");
        assert_eq!(json["operationCounts"]["insert"], 0);
    }
}
