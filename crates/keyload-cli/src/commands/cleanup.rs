use anyhow::Result;
use keyload_core::{metrics, CleanupScope, KeyloadConfig};
use keyload_engine::Cleanup;

use super::build_persistent_stores;

/// Standalone cleanup of one partition, outside of any run.
pub async fn run_cleanup(
    config: &KeyloadConfig,
    partition_key: i32,
    include_errors: bool,
) -> Result<()> {
    metrics::init();

    let scope = if include_errors {
        CleanupScope::RecordsAndErrors
    } else {
        config.cleanup.scope
    };

    let stores = build_persistent_stores(&config.store, "cleanup").await?;
    let report = Cleanup::new(stores.records, stores.errors)
        .run(partition_key, scope)
        .await;

    println!("{}", serde_json::to_string_pretty(&report)?);
    Ok(())
}
