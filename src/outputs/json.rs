//! Raw snapshot of scraped records.
//!
//! The snapshot is written before any cleaning happens, so a later run can
//! replay the transform and load stages without scraping the site again:
//!
//! ```sh
//! product_etl --raw-output ./snapshots/raw.json
//! product_etl --from-raw ./snapshots/raw.json
//! ```
//!
//! Records are stored as a JSON array of objects keyed by column name.

use crate::models::RawProduct;
use crate::utils::ensure_parent_dir;
use serde_json::Value;
use std::error::Error;
use std::path::Path;
use tokio::fs;
use tracing::{error, info, instrument};

/// Write scraped records to `path` as pretty-printed JSON.
///
/// Missing parent directories are created.
#[instrument(level = "info", skip_all, fields(path = %path.display(), count = records.len()))]
pub async fn write_raw_snapshot(records: &[RawProduct], path: &Path) -> Result<(), Box<dyn Error>> {
    let json = serde_json::to_string_pretty(records)?;

    if let Err(e) = ensure_parent_dir(path).await {
        error!(error = %e, "Failed to create snapshot directory");
        return Err(e);
    }

    fs::write(path, json).await?;
    info!("Wrote raw snapshot");
    Ok(())
}

/// Read a snapshot back as untyped records.
///
/// The values are left untyped so the transform can check their shape.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub async fn read_raw_snapshot(path: &Path) -> Result<Vec<Value>, Box<dyn Error>> {
    let text = fs::read_to_string(path).await?;
    let records: Vec<Value> = serde_json::from_str(&text)?;
    info!(count = records.len(), "Read raw snapshot");
    Ok(records)
}
