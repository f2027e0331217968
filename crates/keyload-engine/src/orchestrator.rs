//! Load test orchestrator: timeline, worker pool, cleanup, result assembly.

use keyload_core::{
    CleanupScope, CoreResult, ErrorLogStore, LoadTestConfig, RecordStore, RecorderConfig,
    DEFAULT_AWAIT_GRACE,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

use crate::cancel::CancellationSignal;
use crate::cleanup::Cleanup;
use crate::pool::WorkerPool;
use crate::recorder::ExceptionRecorder;
use crate::result::{KindCounts, LoadTestResult, Ratios};
use crate::stats::{throughput_per_minute, StatisticsAggregator};
use crate::timeline::{elapsed_ms, Timeline};
use crate::worker::{Worker, WorkerContext};

/// Runs load tests against one record store / error log pair.
pub struct LoadTestOrchestrator {
    records: Arc<dyn RecordStore>,
    errors: Arc<dyn ErrorLogStore>,
    recorder_config: RecorderConfig,
    cleanup_scope: CleanupScope,
    await_grace: Duration,
}

impl LoadTestOrchestrator {
    pub fn new(records: Arc<dyn RecordStore>, errors: Arc<dyn ErrorLogStore>) -> Self {
        Self {
            records,
            errors,
            recorder_config: RecorderConfig::default(),
            cleanup_scope: CleanupScope::default(),
            await_grace: DEFAULT_AWAIT_GRACE,
        }
    }

    pub fn with_recorder_config(mut self, config: RecorderConfig) -> Self {
        self.recorder_config = config;
        self
    }

    pub fn with_cleanup_scope(mut self, scope: CleanupScope) -> Self {
        self.cleanup_scope = scope;
        self
    }

    /// How long past the test deadline to wait for workers before finalizing.
    pub fn with_await_grace(mut self, grace: Duration) -> Self {
        self.await_grace = grace;
        self
    }

    /// Runs one load test to completion.
    ///
    /// Fails only on invalid configuration or when the worker pool cannot be
    /// built; store failures are counted and recorded, never returned.
    pub async fn run(&self, config: &LoadTestConfig) -> CoreResult<LoadTestResult> {
        self.run_with_cancellation(config, CancellationSignal::new())
            .await
    }

    /// Like [`run`](Self::run), stopping early once `cancel` fires.
    pub async fn run_with_cancellation(
        &self,
        config: &LoadTestConfig,
        cancel: CancellationSignal,
    ) -> CoreResult<LoadTestResult> {
        config.validate()?;
        self.recorder_config.validate()?;

        let stats = Arc::new(StatisticsAggregator::new());
        let recorder = Arc::new(ExceptionRecorder::new(
            Arc::clone(&self.errors),
            self.recorder_config.clone(),
        ));

        let mut pool = WorkerPool::new(config.thread_count)?;
        let timeline = Timeline::start_now(config);

        info!(
            thread_count = config.thread_count,
            partition_key = config.partition_key,
            test_duration_seconds = config.test_duration_seconds,
            ramp_up_time_seconds = config.ramp_up_time_seconds,
            ramp_up_mode = ?config.ramp_up_mode,
            select_ratio = config.select_ratio,
            update_ratio = config.update_ratio,
            delete_ratio = config.delete_ratio,
            "Starting load test"
        );

        let ctx = WorkerContext {
            config: Arc::new(config.clone()),
            store: Arc::clone(&self.records),
            stats: Arc::clone(&stats),
            recorder: Arc::clone(&recorder),
            timeline,
            cancel: cancel.clone(),
        };
        for thread_id in 1..=config.thread_count {
            pool.submit(Worker::new(thread_id, ctx.clone()))?;
        }

        let outcome = pool
            .await_termination(config.await_timeout(self.await_grace))
            .await;
        if outcome.timed_out {
            warn!(
                pending = pool.pending(),
                "Workers did not finish before the await timeout; finalizing with partial statistics"
            );
            cancel.cancel();
        }
        let cancelled = cancel.is_cancelled() && !outcome.timed_out;
        if cancelled {
            warn!("Load test cancelled before its deadline");
        }
        drop(pool);

        let iterations: u64 = outcome.reports.iter().map(|r| r.iterations).sum();
        let exhausted = outcome
            .reports
            .iter()
            .filter(|r| r.key_space_exhausted)
            .count();
        if exhausted > 0 {
            warn!(
                workers = exhausted,
                "Workers stopped early after exhausting their key space"
            );
        }

        let end = Instant::now();
        let snapshot = stats.snapshot();

        let total_elapsed_ms = elapsed_ms(timeline.start, end);
        let ramp_up_elapsed_ms = elapsed_ms(timeline.start, end.min(timeline.ramp_up_end));
        let steady_state_elapsed_ms = elapsed_ms(timeline.ramp_up_end, end);
        let steady_state_operations = snapshot.steady_state.attempted();

        let (cleanup_executed, cleanup_records_deleted) = if config.cleanup_after_test {
            let report = Cleanup::new(Arc::clone(&self.records), Arc::clone(&self.errors))
                .run(config.partition_key, self.cleanup_scope)
                .await;
            (true, report.total_deleted())
        } else {
            (false, 0)
        };

        let result = LoadTestResult {
            total_operations: snapshot.total().attempted(),
            steady_state_operations,
            operation_counts: KindCounts::from_period(&snapshot.steady_state, |k| k.attempted),
            success_counts: KindCounts::from_period(&snapshot.steady_state, |k| k.succeeded),
            error_counts: KindCounts::from_period(&snapshot.steady_state, |k| k.failed),
            total_elapsed_ms,
            ramp_up_elapsed_ms,
            steady_state_elapsed_ms,
            actual_test_duration_ms: steady_state_elapsed_ms,
            throughput_per_minute: throughput_per_minute(
                steady_state_operations,
                steady_state_elapsed_ms,
            ),
            ratios: Ratios {
                select: config.select_ratio,
                update: config.update_ratio,
                delete: config.delete_ratio,
            },
            thread_count: config.thread_count,
            test_duration_seconds: config.test_duration_seconds,
            ramp_up_time_seconds: config.ramp_up_time_seconds,
            ramp_up_mode: config.ramp_up_mode,
            exceptions_recorded: recorder.recorded(),
            recorder_failures: recorder.failures(),
            cleanup_executed,
            cleanup_records_deleted,
            timed_out: outcome.timed_out,
            cancelled,
        };

        info!(
            workers_finished = outcome.reports.len(),
            iterations,
            total_operations = result.total_operations,
            steady_state_operations = result.steady_state_operations,
            throughput_per_minute = result.throughput_per_minute,
            exceptions_recorded = result.exceptions_recorded,
            recorder_failures = result.recorder_failures,
            cleanup_records_deleted = result.cleanup_records_deleted,
            "Load test complete"
        );

        Ok(result)
    }
}
