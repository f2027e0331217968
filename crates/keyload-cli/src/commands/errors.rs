use anyhow::{Context, Result};
use keyload_core::KeyloadConfig;

use super::build_persistent_stores;

/// Prints recorded exceptions under a partition as a JSON array.
pub async fn list_errors(
    config: &KeyloadConfig,
    partition_key: i32,
    limit: Option<usize>,
) -> Result<()> {
    let stores = build_persistent_stores(&config.store, "errors").await?;
    let mut rows = stores
        .errors
        .scan_partition(partition_key)
        .await
        .with_context(|| format!("failed to scan error log for partition {partition_key}"))?;

    if let Some(limit) = limit {
        rows.truncate(limit);
    }

    println!("{}", serde_json::to_string_pretty(&rows)?);
    Ok(())
}
