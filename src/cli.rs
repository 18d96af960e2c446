//! Command-line interface definitions for the product ETL pipeline.
//!
//! This module defines the CLI arguments and options using the `clap` crate.
//! Every option is optional: unset flags fall back to the YAML config file
//! (if given) and then to the built-in defaults in [`crate::config`].

use clap::Parser;
use std::path::PathBuf;

/// Command-line arguments for the product ETL pipeline.
///
/// # Examples
///
/// ```sh
/// # Scrape the default catalog and write products.csv only
/// product_etl
///
/// # Scrape three pages quickly and load into Postgres
/// product_etl --max-pages 3 --delay 0 --database-url postgres://etl@localhost/productdb
///
/// # Replay a saved snapshot through transform and load
/// product_etl --from-raw ./snapshots/raw.json
/// ```
#[derive(Parser, Debug, Default)]
#[command(author, version, about)]
pub struct Cli {
    /// Optional path to a YAML config file
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Page URL template; `{}` is replaced by the page number
    #[arg(long, env = "BASE_URL")]
    pub base_url: Option<String>,

    /// First page to scrape
    #[arg(long)]
    pub start_page: Option<u32>,

    /// Number of pages to scrape
    #[arg(long)]
    pub max_pages: Option<u32>,

    /// Seconds to wait after each scraped page
    #[arg(long)]
    pub delay: Option<f64>,

    /// Per-request timeout in seconds
    #[arg(long)]
    pub timeout: Option<u64>,

    /// User-Agent header sent with every page request
    #[arg(long)]
    pub user_agent: Option<String>,

    /// Output path for the CSV file
    #[arg(long)]
    pub csv_path: Option<PathBuf>,

    /// PostgreSQL connection URL; the database load is skipped when unset
    #[arg(long, env = "DATABASE_URL")]
    pub database_url: Option<String>,

    /// Google Sheets spreadsheet id; the sheets load is skipped when unset
    #[arg(long, env = "SPREADSHEET_ID")]
    pub spreadsheet_id: Option<String>,

    /// A1 range to overwrite, e.g. `Sheet1!A1`
    #[arg(long)]
    pub sheet_range: Option<String>,

    /// Path to the Google service-account JSON key
    #[arg(long, env = "GOOGLE_APPLICATION_CREDENTIALS")]
    pub service_account_file: Option<PathBuf>,

    /// Also write the raw scraped records to this JSON file
    #[arg(long)]
    pub raw_output: Option<PathBuf>,

    /// Skip scraping and transform records from a raw JSON snapshot instead
    #[arg(long)]
    pub from_raw: Option<PathBuf>,
}
