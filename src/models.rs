//! Data models for scraped listings and their cleaned representation.
//!
//! This module defines the core data structures used throughout the pipeline:
//! - [`RawProduct`]: Listing fields exactly as they were scraped from a page
//! - [`Product`]: A cleaned row with numeric price and rating
//! - [`ProductTable`]: The ordered collection of cleaned rows handed to every sink
//!
//! Field names serialize with the capitalized column names (`Title`, `Price`, ...)
//! so the raw JSON snapshot, the CSV header, the database columns and the
//! spreadsheet header all share one vocabulary.

use serde::{Deserialize, Serialize};

/// Column order shared by every sink.
pub const COLUMNS: [&str; 7] = [
    "Title",
    "Price",
    "Rating",
    "Color",
    "Size",
    "Gender",
    "Timestamp",
];

/// A single product listing as scraped from a page.
///
/// Every field except `timestamp` is optional because the markup for it may be
/// missing from the listing block. The values are kept as display strings
/// (e.g. `"$29.99"`, `"⭐4.5 / 5"`) for the transform stage to parse.
#[derive(Debug, Clone, PartialEq, Default, Deserialize, Serialize)]
pub struct RawProduct {
    /// Product name from the listing heading.
    #[serde(rename = "Title")]
    pub title: Option<String>,
    /// Raw price text, including the currency symbol.
    #[serde(rename = "Price")]
    pub price: Option<String>,
    /// Raw rating text after the `Rating:` label.
    #[serde(rename = "Rating")]
    pub rating: Option<String>,
    /// First token of the colors line.
    #[serde(rename = "Color")]
    pub color: Option<String>,
    #[serde(rename = "Size")]
    pub size: Option<String>,
    #[serde(rename = "Gender")]
    pub gender: Option<String>,
    /// Local capture time, `YYYY-MM-DD HH:MM:SS`.
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
}

/// A cleaned product row.
///
/// # Invariants
///
/// Rows produced by the transform stage always have a title other than the
/// `"Unknown Product"` sentinel, a non-negative converted price, and a finite
/// rating.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct Product {
    #[serde(rename = "Title")]
    pub title: String,
    /// Price converted into the target currency unit and truncated.
    #[serde(rename = "Price")]
    pub price: i64,
    #[serde(rename = "Rating")]
    pub rating: f64,
    #[serde(rename = "Color")]
    pub color: Option<String>,
    #[serde(rename = "Size")]
    pub size: Option<String>,
    #[serde(rename = "Gender")]
    pub gender: Option<String>,
    #[serde(rename = "Timestamp")]
    pub timestamp: String,
}

/// The cleaned, ordered output of the transform stage.
///
/// Row order follows first-seen extraction order. Since rows live in a plain
/// `Vec`, indices are always dense.
#[derive(Debug, Clone, PartialEq, Default, Serialize)]
pub struct ProductTable {
    pub rows: Vec<Product>,
}

impl ProductTable {
    /// Create an empty table.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Product> {
        self.rows.iter()
    }

    /// Titles in row order; handy for logging and assertions.
    pub fn titles(&self) -> Vec<&str> {
        self.rows.iter().map(|p| p.title.as_str()).collect()
    }
}

impl From<Vec<Product>> for ProductTable {
    fn from(rows: Vec<Product>) -> Self {
        Self { rows }
    }
}

impl<'a> IntoIterator for &'a ProductTable {
    type Item = &'a Product;
    type IntoIter = std::slice::Iter<'a, Product>;

    fn into_iter(self) -> Self::IntoIter {
        self.rows.iter()
    }
}
