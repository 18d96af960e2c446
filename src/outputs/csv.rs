//! CSV output.
//!
//! The header row always uses [`COLUMNS`], also for an empty table. There is
//! no index column, and missing optional fields are written as empty cells.

use crate::models::{ProductTable, COLUMNS};
use std::error::Error;
use std::path::Path;
use tracing::{info, instrument};

/// Write the table to `path`, replacing any existing file.
///
/// The parent directory must already exist.
///
/// # Returns
///
/// The number of data rows written.
#[instrument(level = "info", skip_all, fields(path = %path.display()))]
pub fn load_to_csv(table: &ProductTable, path: &Path) -> Result<usize, Box<dyn Error>> {
    let mut wtr = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)?;

    wtr.write_record(COLUMNS)?;
    for product in table.iter() {
        wtr.serialize(product)?;
    }
    wtr.flush()?;

    info!(rows = table.len(), "Wrote CSV file");
    Ok(table.len())
}
