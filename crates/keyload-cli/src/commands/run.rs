use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use keyload_core::{metrics, KeyloadConfig, LoadTestConfig, RampUpMode};
use keyload_engine::{CancellationSignal, LoadTestOrchestrator};
use tracing::warn;

use super::build_stores;

#[derive(Clone, Copy, Debug, PartialEq, Eq, ValueEnum)]
pub enum RampUpModeArg {
    Immediate,
    Staggered,
}

impl From<RampUpModeArg> for RampUpMode {
    fn from(arg: RampUpModeArg) -> Self {
        match arg {
            RampUpModeArg::Immediate => RampUpMode::Immediate,
            RampUpModeArg::Staggered => RampUpMode::Staggered,
        }
    }
}

/// Command-line overrides layered over the loaded `load_test` section.
#[derive(Args, Debug, Default)]
pub struct RunOverrides {
    /// Number of concurrent workers
    #[arg(long)]
    pub threads: Option<u32>,

    /// Steady-state duration in seconds
    #[arg(long)]
    pub duration: Option<u32>,

    /// Ramp-up duration in seconds
    #[arg(long)]
    pub ramp_up: Option<u32>,

    #[arg(long, value_enum)]
    pub ramp_up_mode: Option<RampUpModeArg>,

    #[arg(long)]
    pub partition_key: Option<i32>,

    #[arg(long)]
    pub select_ratio: Option<f64>,

    #[arg(long)]
    pub update_ratio: Option<f64>,

    #[arg(long)]
    pub delete_ratio: Option<f64>,

    /// Pause between iterations in milliseconds
    #[arg(long)]
    pub operation_delay_ms: Option<u64>,

    /// Base seed for per-worker random sources
    #[arg(long)]
    pub seed: Option<u64>,

    /// Delete the partition's records after the run
    #[arg(long)]
    pub cleanup: bool,
}

impl RunOverrides {
    pub fn apply(&self, config: &mut LoadTestConfig) {
        if let Some(threads) = self.threads {
            config.thread_count = threads;
        }
        if let Some(duration) = self.duration {
            config.test_duration_seconds = duration;
        }
        if let Some(ramp_up) = self.ramp_up {
            config.ramp_up_time_seconds = ramp_up;
        }
        if let Some(mode) = self.ramp_up_mode {
            config.ramp_up_mode = mode.into();
        }
        if let Some(partition_key) = self.partition_key {
            config.partition_key = partition_key;
        }
        if let Some(ratio) = self.select_ratio {
            config.select_ratio = ratio;
        }
        if let Some(ratio) = self.update_ratio {
            config.update_ratio = ratio;
        }
        if let Some(ratio) = self.delete_ratio {
            config.delete_ratio = ratio;
        }
        if let Some(delay) = self.operation_delay_ms {
            config.operation_delay_ms = delay;
        }
        if self.seed.is_some() {
            config.seed = self.seed;
        }
        if self.cleanup {
            config.cleanup_after_test = true;
        }
    }
}

pub async fn run_load_test(
    mut config: KeyloadConfig,
    overrides: &RunOverrides,
    print_metrics: bool,
) -> Result<()> {
    overrides.apply(&mut config.load_test);
    config.validate().context("invalid configuration")?;
    metrics::init();

    let stores = build_stores(&config.store).await?;
    let orchestrator = LoadTestOrchestrator::new(stores.records, stores.errors)
        .with_recorder_config(config.recorder.clone())
        .with_cleanup_scope(config.cleanup.scope);

    let cancel = CancellationSignal::new();
    let on_interrupt = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupt received, stopping workers");
            on_interrupt.cancel();
        }
    });

    let result = orchestrator
        .run_with_cancellation(&config.load_test, cancel)
        .await
        .context("load test failed")?;

    println!("{}", serde_json::to_string_pretty(&result)?);
    if print_metrics {
        print!("{}", metrics::export_prometheus());
    }

    Ok(())
}
