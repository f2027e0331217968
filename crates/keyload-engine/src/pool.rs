//! Fixed-size worker pool backed by a dedicated multi-threaded Tokio runtime.
//!
//! Each configured thread gets its own runtime worker thread, so workers run
//! in parallel on separate cores rather than sharing the caller's runtime.

use keyload_core::{CoreError, CoreResult};
use std::time::Duration;
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinHandle;
use tracing::error;

use crate::worker::{Worker, WorkerReport};

/// Outcome of waiting for the pool to drain.
#[derive(Debug, Default)]
pub struct PoolOutcome {
    pub reports: Vec<WorkerReport>,
    pub timed_out: bool,
}

pub struct WorkerPool {
    runtime: Option<Runtime>,
    handles: Vec<JoinHandle<WorkerReport>>,
}

impl WorkerPool {
    /// Builds a pool with exactly `size` worker threads.
    pub fn new(size: u32) -> CoreResult<Self> {
        if size == 0 {
            return Err(CoreError::PoolCreation(
                "pool size must be at least 1".to_string(),
            ));
        }

        let runtime = Builder::new_multi_thread()
            .worker_threads(size as usize)
            .thread_name("keyload-worker")
            .enable_all()
            .build()
            .map_err(|e| CoreError::PoolCreation(e.to_string()))?;

        Ok(Self {
            runtime: Some(runtime),
            handles: Vec::with_capacity(size as usize),
        })
    }

    /// Schedules a worker on the pool.
    pub fn submit(&mut self, worker: Worker) -> CoreResult<()> {
        let runtime = self
            .runtime
            .as_ref()
            .ok_or_else(|| CoreError::internal("worker pool already shut down"))?;
        self.handles.push(runtime.spawn(worker.run()));
        Ok(())
    }

    /// Stops accepting work and waits up to `timeout` for submitted workers.
    ///
    /// Workers still running at the deadline stay pending and are left to
    /// observe cancellation; only finished workers are reported.
    pub async fn await_termination(&mut self, timeout: Duration) -> PoolOutcome {
        let mut reports = Vec::with_capacity(self.handles.len());
        let handles = &mut self.handles;

        let drained = tokio::time::timeout(timeout, async {
            while let Some(handle) = handles.last_mut() {
                let joined = handle.await;
                handles.pop();
                match joined {
                    Ok(report) => reports.push(report),
                    Err(e) => error!("Worker task failed: {}", e),
                }
            }
        })
        .await;

        PoolOutcome {
            reports,
            timed_out: drained.is_err(),
        }
    }

    /// Workers still running after a timed-out wait.
    pub fn pending(&self) -> usize {
        self.handles.len()
    }
}

impl Drop for WorkerPool {
    fn drop(&mut self) {
        // Safe inside an async context, unlike dropping the runtime directly.
        if let Some(runtime) = self.runtime.take() {
            runtime.shutdown_background();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cancel::CancellationSignal;
    use crate::recorder::ExceptionRecorder;
    use crate::stats::StatisticsAggregator;
    use crate::timeline::Timeline;
    use crate::worker::WorkerContext;
    use async_trait::async_trait;
    use keyload_core::{LoadTestConfig, Record, RecordStore, RecorderConfig};
    use keyload_storage::MemoryErrorLogStore;
    use std::sync::Arc;

    /// Inserts hang far past any test deadline.
    struct StalledStore;

    #[async_trait]
    impl RecordStore for StalledStore {
        async fn insert(&self, _record: &Record) -> CoreResult<()> {
            tokio::time::sleep(Duration::from_secs(300)).await;
            Ok(())
        }

        async fn select(&self, partition_key: i32, clustering_key: i64) -> CoreResult<Record> {
            Err(CoreError::not_found(
                "record",
                format!("{partition_key}/{clustering_key}"),
            ))
        }

        async fn update(&self, record: &Record) -> CoreResult<()> {
            Err(CoreError::not_found("record", record.key_string()))
        }

        async fn delete(&self, partition_key: i32, clustering_key: i64) -> CoreResult<()> {
            Err(CoreError::not_found(
                "record",
                format!("{partition_key}/{clustering_key}"),
            ))
        }

        async fn scan_partition(&self, _partition_key: i32) -> CoreResult<Vec<Record>> {
            Ok(Vec::new())
        }
    }

    fn stalled_context() -> WorkerContext {
        let config = LoadTestConfig {
            test_duration_seconds: 1,
            thread_count: 2,
            ..Default::default()
        };
        WorkerContext {
            timeline: Timeline::start_now(&config),
            config: Arc::new(config),
            store: Arc::new(StalledStore),
            stats: Arc::new(StatisticsAggregator::new()),
            recorder: Arc::new(ExceptionRecorder::new(
                Arc::new(MemoryErrorLogStore::new()),
                RecorderConfig::default(),
            )),
            cancel: CancellationSignal::new(),
        }
    }

    #[test]
    fn test_zero_sized_pool_is_rejected() {
        assert!(matches!(WorkerPool::new(0), Err(CoreError::PoolCreation(_))));
    }

    #[tokio::test]
    async fn test_empty_pool_drains_immediately() {
        let mut pool = WorkerPool::new(2).unwrap();
        let outcome = pool.await_termination(Duration::from_secs(1)).await;
        assert!(!outcome.timed_out);
        assert!(outcome.reports.is_empty());
        assert_eq!(pool.pending(), 0);
    }

    #[tokio::test]
    async fn test_stalled_workers_time_out_and_stay_pending() {
        let ctx = stalled_context();
        let mut pool = WorkerPool::new(2).unwrap();
        pool.submit(Worker::new(1, ctx.clone())).unwrap();
        pool.submit(Worker::new(2, ctx.clone())).unwrap();

        let outcome = pool.await_termination(Duration::from_millis(100)).await;

        assert!(outcome.timed_out);
        assert!(outcome.reports.is_empty());
        assert_eq!(pool.pending(), 2);
        assert_eq!(ctx.stats.snapshot().total().attempted(), 0);

        // Dropping inside the async context shuts the runtime down in the background.
        drop(pool);
    }
}
