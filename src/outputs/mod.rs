//! Output sinks for the cleaned product table.
//!
//! # Submodules
//!
//! - [`csv`]: Writes the table to a CSV file
//! - [`database`]: Appends the table to the PostgreSQL `products` table
//! - [`sheets`]: Overwrites a Google Sheets range
//! - [`json`]: Writes and reads raw scrape snapshots for replay
//!
//! Sinks never transform data. Each returns a `Result` that the pipeline
//! logs, so one failing sink does not stop the others.

pub mod csv;
pub mod database;
pub mod json;
pub mod sheets;
