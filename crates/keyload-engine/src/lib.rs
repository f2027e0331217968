//! Storage-agnostic load-test engine.
//!
//! A fixed pool of workers drives a [`RecordStore`](keyload_core::RecordStore)
//! with a ratio-controlled mix of insert/select/update/delete operations over a
//! ramp-up + steady-state timeline. Failures are isolated per operation and
//! persisted through the [`ExceptionRecorder`]; throughput is reported over the
//! steady-state window only.

pub mod cancel;
pub mod cleanup;
pub mod keys;
pub mod orchestrator;
pub mod pool;
pub mod ratio;
pub mod recorder;
pub mod result;
pub mod stats;
pub mod timeline;
pub mod worker;

pub use cancel::CancellationSignal;
pub use cleanup::{Cleanup, CleanupReport};
pub use keys::{clustering_key, KeySequence, KEY_SPACE_PER_THREAD};
pub use orchestrator::LoadTestOrchestrator;
pub use pool::{PoolOutcome, WorkerPool};
pub use ratio::{ratio_split, RatioSplit};
pub use recorder::{format_exception, truncate_message, ExceptionRecorder, RecorderHandle};
pub use result::{KindCounts, LoadTestResult, Ratios};
pub use stats::{throughput_per_minute, KindStats, PeriodStats, StatisticsAggregator, StatsSnapshot};
pub use timeline::Timeline;
pub use worker::{Worker, WorkerContext, WorkerReport};
