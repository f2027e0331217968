use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use keyload_core::KeyloadConfig;
use std::path::PathBuf;
use tracing_subscriber::{fmt, EnvFilter};

mod commands;

use commands::run::RunOverrides;

#[derive(Parser, Debug)]
#[command(name = "keyload")]
#[command(about = "Ratio-driven load generator for keyed record stores", long_about = None)]
#[command(version)]
struct Cli {
    /// Configuration file; when omitted, ./config/keyload.* and KEYLOAD_CONFIG
    /// are layered under KEYLOAD_* environment variables
    #[arg(long, short, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a load test and print the result as JSON
    Run {
        #[command(flatten)]
        overrides: RunOverrides,

        /// Print Prometheus metrics after the result
        #[arg(long)]
        metrics: bool,
    },

    /// Delete every row under a partition
    Cleanup {
        /// Partition to clean
        #[arg(long)]
        partition_key: i32,

        /// Also delete recorded exceptions under the partition
        #[arg(long)]
        include_errors: bool,
    },

    /// List exceptions recorded under a partition
    Errors {
        /// Partition to inspect
        #[arg(long)]
        partition_key: i32,

        /// Maximum number of rows to print
        #[arg(long)]
        limit: Option<usize>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => KeyloadConfig::from_file(path)
            .with_context(|| format!("failed to load config from {}", path.display()))?,
        None => KeyloadConfig::load().context("failed to load config")?,
    };

    init_logging(&config.logging.level);

    match cli.command {
        Commands::Run { overrides, metrics } => {
            commands::run::run_load_test(config, &overrides, metrics).await
        }
        Commands::Cleanup {
            partition_key,
            include_errors,
        } => commands::cleanup::run_cleanup(&config, partition_key, include_errors).await,
        Commands::Errors {
            partition_key,
            limit,
        } => commands::errors::list_errors(&config, partition_key, limit).await,
    }
}

fn init_logging(default_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level));
    fmt().with_env_filter(env_filter).with_target(false).init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_run_overrides() {
        let cli = Cli::try_parse_from([
            "keyload",
            "run",
            "--threads",
            "4",
            "--select-ratio",
            "2.5",
            "--ramp-up-mode",
            "immediate",
            "--cleanup",
        ])
        .unwrap();

        match cli.command {
            Commands::Run { overrides, metrics } => {
                assert_eq!(overrides.threads, Some(4));
                assert_eq!(overrides.select_ratio, Some(2.5));
                assert!(overrides.cleanup);
                assert!(!metrics);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn cleanup_requires_partition_key() {
        assert!(Cli::try_parse_from(["keyload", "cleanup"]).is_err());

        let cli = Cli::try_parse_from([
            "keyload",
            "--config",
            "keyload.yaml",
            "cleanup",
            "--partition-key",
            "42",
            "--include-errors",
        ])
        .unwrap();
        assert_eq!(cli.config, Some(PathBuf::from("keyload.yaml")));
        assert!(matches!(
            cli.command,
            Commands::Cleanup {
                partition_key: 42,
                include_errors: true
            }
        ));
    }
}
