//! # Product ETL
//!
//! Scrapes a paginated product catalog, cleans the listings into a typed
//! table, and loads the result into a CSV file, a PostgreSQL table and a
//! Google Sheets range.
//!
//! ## Usage
//!
//! ```sh
//! product_etl --max-pages 50 --delay 5 --database-url postgres://etl@localhost/productdb
//! ```
//!
//! ## Architecture
//!
//! The application runs three stages strictly in sequence on one thread:
//! 1. **Extract**: Fetch each catalog page and parse its listing blocks
//! 2. **Transform**: Drop invalid listings and convert price and rating to numbers
//! 3. **Load**: Write the table to every configured sink
//!
//! Failures are logged and the run carries on: a failed page is skipped, a
//! bad batch yields an empty table, and a failing sink does not stop the
//! others. Only invalid configuration ends the process with an error.

use clap::Parser;
use std::error::Error;
use tracing::{debug, error, info, instrument, warn};
use tracing_subscriber::{fmt as tfmt, EnvFilter};

mod cli;
mod config;
mod models;
mod outputs;
mod scrapers;
mod transform;
mod utils;

use cli::Cli;
use config::PipelineConfig;
use models::{ProductTable, RawProduct};
use outputs::{database, json, sheets};
use utils::redact_url;

#[tokio::main(flavor = "current_thread")]
#[instrument]
async fn main() -> Result<(), Box<dyn Error>> {
    // --- Tracing init ---
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tfmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .with_timer(tracing_subscriber::fmt::time::UtcTime::rfc_3339())
        .init();

    let start_time = std::time::Instant::now();
    info!("product_etl starting up");

    let args = Cli::parse();
    debug!(?args.config, ?args.from_raw, ?args.raw_output, "Parsed CLI arguments");

    let config = match PipelineConfig::load(&args) {
        Ok(config) => config,
        Err(e) => {
            error!(error = %e, "Invalid configuration");
            return Err(e.into());
        }
    };

    // ---- Extract ----
    info!("Step 1: Extracting product data");
    let cleaned = match &args.from_raw {
        Some(path) => match json::read_raw_snapshot(path).await {
            Ok(values) => transform::transform_raw_records(&values),
            Err(e) => {
                error!(path = %path.display(), error = %e, "Failed to read raw snapshot");
                ProductTable::empty()
            }
        },
        None => {
            let raw_products = scrapers::fashion_studio::scrape_products(&config.scrape_settings()).await;
            write_snapshot(&raw_products, &args).await;

            // ---- Transform ----
            info!("Step 2: Transforming and cleaning data");
            transform::transform_product_data(Some(&raw_products))
        }
    };
    let cleaned = transform::clean_table(&cleaned);
    info!(count = cleaned.len(), "Total valid products after cleaning");

    // ---- Load ----
    info!("Step 3: Loading data to destinations");
    load_all(&cleaned, &config).await;

    let elapsed = start_time.elapsed();
    info!(
        ?elapsed,
        secs = elapsed.as_secs(),
        millis = elapsed.subsec_millis(),
        "Execution complete"
    );
    Ok(())
}

async fn write_snapshot(raw_products: &[RawProduct], args: &Cli) {
    if let Some(path) = &args.raw_output {
        if let Err(e) = json::write_raw_snapshot(raw_products, path).await {
            error!(path = %path.display(), error = %e, "Failed to write raw snapshot");
        }
    }
}

/// Attempt every configured sink; failures are logged, never returned.
#[instrument(level = "info", skip_all, fields(rows = table.len()))]
async fn load_all(table: &ProductTable, config: &PipelineConfig) {
    match outputs::csv::load_to_csv(table, &config.csv_path) {
        Ok(rows) => info!(rows, path = %config.csv_path.display(), "Saved CSV"),
        Err(e) => error!(path = %config.csv_path.display(), error = %e, "Failed to save CSV"),
    }

    match &config.database_url {
        Some(db_url) => match database::load_to_db(table, db_url).await {
            Ok(rows) => info!(rows, db = %redact_url(db_url), "Saved to database"),
            Err(e) => error!(db = %redact_url(db_url), error = %e, "Failed to save to database"),
        },
        None => info!("No database URL configured; skipping database load"),
    }

    match &config.spreadsheet_id {
        Some(spreadsheet_id) => {
            match sheets::load_to_google_sheets(
                table,
                spreadsheet_id,
                &config.sheet_range,
                &config.service_account_file,
            )
            .await
            {
                Ok(rows) => info!(rows, %spreadsheet_id, "Saved to Google Sheets"),
                Err(e) => error!(%spreadsheet_id, error = %e, "Failed to save to Google Sheets"),
            }
        }
        None => info!("No spreadsheet id configured; skipping Google Sheets load"),
    }

    if table.is_empty() {
        warn!("Loaded an empty table; check the logs above for skipped pages or rejected batches");
    }
}
