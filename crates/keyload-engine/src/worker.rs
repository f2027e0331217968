//! One load-generating worker.

use keyload_core::metrics::ACTIVE_WORKERS;
use keyload_core::{CoreResult, LoadTestConfig, OperationKind, Phase, Record, RecordStore};
use rand::rngs::StdRng;
use rand::SeedableRng;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::cancel::CancellationSignal;
use crate::keys::KeySequence;
use crate::ratio::{ratio_split, RatioSplit};
use crate::recorder::{ExceptionRecorder, RecorderHandle};
use crate::stats::StatisticsAggregator;
use crate::timeline::Timeline;

/// State shared by every worker of a run.
#[derive(Clone)]
pub struct WorkerContext {
    pub config: Arc<LoadTestConfig>,
    pub store: Arc<dyn RecordStore>,
    pub stats: Arc<StatisticsAggregator>,
    pub recorder: Arc<ExceptionRecorder>,
    pub timeline: Timeline,
    pub cancel: CancellationSignal,
}

/// What a worker did before returning.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WorkerReport {
    pub thread_id: u32,
    pub iterations: u64,
    pub key_space_exhausted: bool,
}

struct ActiveWorkerGuard;

impl ActiveWorkerGuard {
    fn enter() -> Self {
        ACTIVE_WORKERS.inc();
        Self
    }
}

impl Drop for ActiveWorkerGuard {
    fn drop(&mut self) {
        ACTIVE_WORKERS.dec();
    }
}

pub struct Worker {
    thread_id: u32,
    ctx: WorkerContext,
    keys: KeySequence,
    rng: StdRng,
    recorder: RecorderHandle,
    select: RatioSplit,
    update: RatioSplit,
    delete: RatioSplit,
}

impl Worker {
    /// `thread_id` is 1-indexed.
    pub fn new(thread_id: u32, ctx: WorkerContext) -> Self {
        let rng = match ctx.config.seed {
            Some(base) => StdRng::seed_from_u64(base.wrapping_add(u64::from(thread_id))),
            None => StdRng::from_entropy(),
        };

        Self {
            thread_id,
            keys: KeySequence::new(thread_id, ctx.config.ramp_up_mode),
            rng,
            recorder: ctx.recorder.handle(),
            select: ratio_split(ctx.config.select_ratio),
            update: ratio_split(ctx.config.update_ratio),
            delete: ratio_split(ctx.config.delete_ratio),
            ctx,
        }
    }

    /// Loops until the test deadline, cancellation, or key exhaustion.
    pub async fn run(mut self) -> WorkerReport {
        let _active = ActiveWorkerGuard::enter();
        let mut report = WorkerReport {
            thread_id: self.thread_id,
            iterations: 0,
            key_space_exhausted: false,
        };

        let start_at = self.ctx.timeline.worker_start(
            self.thread_id,
            self.ctx.config.thread_count,
            self.ctx.config.ramp_up_mode,
        );
        let now = Instant::now();
        if start_at > now && !self.ctx.cancel.sleep(start_at - now).await {
            return report;
        }

        debug!(thread_id = self.thread_id, "Worker started");

        loop {
            if self.ctx.cancel.is_cancelled() || self.ctx.timeline.is_over(Instant::now()) {
                break;
            }

            let Some((sequence, clustering_key)) = self.keys.next_key() else {
                warn!(
                    thread_id = self.thread_id,
                    "Key space exhausted; worker stops issuing operations"
                );
                report.key_space_exhausted = true;
                break;
            };

            let phase = self.ctx.timeline.phase_at(Instant::now());
            debug!(
                thread_id = self.thread_id,
                sequence,
                clustering_key,
                phase = phase.as_str(),
                "Generated key"
            );

            report.iterations += 1;
            if !self.iteration(sequence, clustering_key, phase).await {
                break;
            }

            let delay = self.ctx.config.operation_delay();
            if !delay.is_zero() && !self.ctx.cancel.sleep(delay).await {
                break;
            }
        }

        debug!(
            thread_id = self.thread_id,
            iterations = report.iterations,
            "Worker finished"
        );
        report
    }

    /// Insert, then selects, updates, and deletes. Returns `false` when
    /// cancellation arrives during a retry pause.
    async fn iteration(&mut self, sequence: u64, clustering_key: i64, phase: Phase) -> bool {
        let partition_key = self.ctx.config.partition_key;
        let thread_id = self.thread_id;

        let record = Record::new(
            partition_key,
            clustering_key,
            format!("LoadTest_T{thread_id}_{sequence}"),
            clustering_key,
        );
        let result = self.ctx.store.insert(&record).await;
        if !self.observe(OperationKind::Insert, phase, clustering_key, result).await {
            return false;
        }

        let selects = self.count(self.select);
        for _ in 0..selects {
            let result = self
                .ctx
                .store
                .select(partition_key, clustering_key)
                .await
                .map(|_| ());
            if !self.observe(OperationKind::Select, phase, clustering_key, result).await {
                return false;
            }
        }

        let update = self.update;
        for n in 0..update.repeats {
            let record = Record::new(
                partition_key,
                clustering_key,
                format!("Updated_T{thread_id}_{sequence}_{n}"),
                clustering_key + i64::from(n) * 100,
            );
            let result = self.ctx.store.update(&record).await;
            if !self.observe(OperationKind::Update, phase, clustering_key, result).await {
                return false;
            }
        }
        if update.fires(&mut self.rng) {
            let record = Record::new(
                partition_key,
                clustering_key,
                format!("Updated_fractional_T{thread_id}_{sequence}"),
                clustering_key + i64::from(update.repeats) * 100,
            );
            let result = self.ctx.store.update(&record).await;
            if !self.observe(OperationKind::Update, phase, clustering_key, result).await {
                return false;
            }
        }

        let deletes = self.count(self.delete);
        for _ in 0..deletes {
            let result = self.ctx.store.delete(partition_key, clustering_key).await;
            if !self.observe(OperationKind::Delete, phase, clustering_key, result).await {
                return false;
            }
        }

        true
    }

    /// Guaranteed repeats plus the fractional draw.
    fn count(&mut self, split: RatioSplit) -> u32 {
        split.repeats + u32::from(split.fires(&mut self.rng))
    }

    /// Counts the outcome; failures are recorded and followed by the retry pause.
    async fn observe(
        &mut self,
        kind: OperationKind,
        phase: Phase,
        clustering_key: i64,
        result: CoreResult<()>,
    ) -> bool {
        let err = match result {
            Ok(()) => {
                self.ctx.stats.record(kind, phase, true);
                return true;
            }
            Err(err) => err,
        };

        self.ctx.stats.record(kind, phase, false);
        debug!(
            thread_id = self.thread_id,
            clustering_key,
            kind = kind.as_str(),
            "Operation failed: {}",
            err
        );
        self.recorder
            .record(self.ctx.config.partition_key, clustering_key, kind, &err)
            .await;

        self.ctx
            .cancel
            .sleep(self.ctx.config.exception_retry_interval())
            .await
    }
}
