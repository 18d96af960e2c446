//! Cleaning and normalization of scraped listings.
//!
//! The transform runs in a fixed order because later steps assume earlier
//! filters already removed inputs they cannot parse:
//!
//! 1. Drop rows without a title
//! 2. Drop rows titled `"Unknown Product"`
//! 3. Drop rows whose price is missing or `"Price Unavailable"`
//! 4. Drop rows whose rating text mentions `"Invalid"` or `"Not Rated"`
//! 5. Convert the price to an integer in the target currency
//! 6. Extract the first numeric run of the rating text
//! 7. Drop rows whose rating could not be read as a number
//!
//! # Two kinds of failure
//!
//! Row filters (steps 1-4 and 7) can only shrink the row set; they never fail.
//! The coercion stage (steps 5-6) either converts every surviving row or
//! rejects the whole batch with a [`TransformError`]. Callers that use
//! [`transform_product_data`] get an empty table in that case; the error is
//! logged rather than propagated.

use crate::models::{Product, ProductTable, RawProduct};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::{Map, Value};
use tracing::{debug, error, info, instrument, warn};

/// Multiplier applied to the parsed dollar price.
pub const CURRENCY_RATE: f64 = 16_000.0;

pub const UNKNOWN_TITLE: &str = "Unknown Product";
pub const PRICE_UNAVAILABLE: &str = "Price Unavailable";

/// Substrings that mark a rating as unusable during the transform.
const RATING_REJECT_MARKERS: [&str; 2] = ["Invalid", "Not Rated"];

/// Exact rating strings rejected by [`remove_invalid_products`].
const RATING_SENTINELS: [&str; 2] = ["Invalid Rating/5", "Not Rated"];

/// Columns the untyped entry point requires at least one record to carry.
const REQUIRED_COLUMNS: [&str; 3] = ["Title", "Price", "Rating"];

const RATING_GLYPH: char = '⭐';

static RATING_NUMBER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[\d.]+").expect("rating pattern is valid"));

/// Failure that rejects a whole batch.
#[derive(Debug, thiserror::Error, PartialEq)]
pub enum TransformError {
    #[error("price {raw:?} at row {row} is not numeric after stripping symbols")]
    PriceNotNumeric { row: usize, raw: String },
    #[error("column {0:?} is missing from every record")]
    MissingColumn(&'static str),
    #[error("record {row} is not a JSON object")]
    NotARecord { row: usize },
    #[error("column {column:?} at record {row} holds a non-text value")]
    NonText { row: usize, column: String },
}

/// A column value as the row filters see it.
#[derive(Debug, Clone, Copy, PartialEq)]
enum Cell<'a> {
    Null,
    Text(&'a str),
    /// Present but not text, e.g. a number in a replayed snapshot.
    Other,
}

impl<'a> From<Option<&'a str>> for Cell<'a> {
    fn from(value: Option<&'a str>) -> Self {
        value.map_or(Cell::Null, Cell::Text)
    }
}

/// The three columns steps 1-4 look at.
trait FilterRow {
    fn title_cell(&self) -> Cell<'_>;
    fn price_cell(&self) -> Cell<'_>;
    fn rating_cell(&self) -> Cell<'_>;
}

impl FilterRow for RawProduct {
    fn title_cell(&self) -> Cell<'_> {
        Cell::from(self.title.as_deref())
    }

    fn price_cell(&self) -> Cell<'_> {
        Cell::from(self.price.as_deref())
    }

    fn rating_cell(&self) -> Cell<'_> {
        Cell::from(self.rating.as_deref())
    }
}

/// A row filter: rows for which `keep` returns `false` are dropped.
struct RowFilter {
    name: &'static str,
    keep: fn(&dyn FilterRow) -> bool,
}

const PRE_COERCION_FILTERS: [RowFilter; 4] = [
    RowFilter {
        name: "null_title",
        keep: |r| r.title_cell() != Cell::Null,
    },
    RowFilter {
        name: "sentinel_title",
        keep: |r| r.title_cell() != Cell::Text(UNKNOWN_TITLE),
    },
    RowFilter {
        name: "price_unavailable",
        keep: |r| !matches!(r.price_cell(), Cell::Null | Cell::Text(PRICE_UNAVAILABLE)),
    },
    RowFilter {
        name: "rating_text",
        keep: |r| match r.rating_cell() {
            Cell::Text(rating) => !RATING_REJECT_MARKERS.iter().any(|m| rating.contains(m)),
            Cell::Null | Cell::Other => true,
        },
    },
];

fn apply_filter<T: FilterRow>(rows: Vec<T>, filter: &RowFilter) -> Vec<T> {
    let before = rows.len();
    let kept: Vec<T> = rows.into_iter().filter(|r| (filter.keep)(r)).collect();
    debug!(
        step = filter.name,
        dropped = before - kept.len(),
        remaining = kept.len(),
        "Applied row filter"
    );
    kept
}

/// Steps 1-4, in order.
fn prefilter<T: FilterRow>(rows: Vec<T>) -> Vec<T> {
    PRE_COERCION_FILTERS
        .iter()
        .fold(rows, |rows, filter| apply_filter(rows, filter))
}

/// Convert a raw price string such as `"$29.99"` into the target currency.
///
/// Everything except ASCII digits and `.` is stripped before parsing. Returns
/// `None` when the remainder is not a number.
///
/// # Examples
///
/// ```ignore
/// assert_eq!(normalize_price("$100.00"), Some(1_600_000));
/// assert_eq!(normalize_price("$"), None);
/// ```
pub fn normalize_price(raw: &str) -> Option<i64> {
    let digits: String = raw
        .chars()
        .filter(|c| c.is_ascii_digit() || *c == '.')
        .collect();
    let value: f64 = digits.parse().ok()?;
    let converted = value * CURRENCY_RATE;
    converted.is_finite().then(|| converted.trunc() as i64)
}

/// Read the first numeric run out of a rating string.
///
/// The search is unanchored, so `"⭐No Rating/5"` yields `5.0`. Returns `None`
/// when there is no run or it is not a finite number (e.g. a lone `"."`).
pub fn normalize_rating(raw: &str) -> Option<f64> {
    let cleaned = raw.replace(RATING_GLYPH, "");
    let found = RATING_NUMBER.find(cleaned.trim())?;
    found.as_str().parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Steps 5-6: every row converts or the batch fails.
///
/// Rows keep `None` for an unreadable rating; step 7 drops them.
fn coerce(rows: Vec<RawProduct>) -> Result<Vec<(Product, bool)>, TransformError> {
    rows.into_iter()
        .enumerate()
        .map(|(row, raw)| {
            let price_text = raw.price.unwrap_or_default();
            let price = normalize_price(&price_text).ok_or_else(|| {
                TransformError::PriceNotNumeric {
                    row,
                    raw: price_text.clone(),
                }
            })?;
            let rating = raw.rating.as_deref().and_then(normalize_rating);
            Ok((
                Product {
                    title: raw.title.unwrap_or_default(),
                    price,
                    rating: rating.unwrap_or(f64::NAN),
                    color: raw.color,
                    size: raw.size,
                    gender: raw.gender,
                    timestamp: raw.timestamp,
                },
                rating.is_some(),
            ))
        })
        .collect()
}

/// Steps 5-7 on rows that passed [`prefilter`].
fn coerce_and_drop_nan(rows: Vec<RawProduct>) -> Result<ProductTable, TransformError> {
    let coerced = coerce(rows)?;
    let before = coerced.len();
    let rows: Vec<Product> = coerced
        .into_iter()
        .filter_map(|(product, has_rating)| has_rating.then_some(product))
        .collect();
    debug!(
        step = "rating_nan",
        dropped = before - rows.len(),
        remaining = rows.len(),
        "Applied row filter"
    );

    Ok(ProductTable::from(rows))
}

/// Run the full transform, surfacing a batch failure to the caller.
#[instrument(level = "info", skip_all, fields(input = raw.len()))]
pub fn try_transform(raw: &[RawProduct]) -> Result<ProductTable, TransformError> {
    coerce_and_drop_nan(prefilter(raw.to_vec()))
}

/// Turn scraped listings into a clean [`ProductTable`].
///
/// `None` or an empty slice yields an empty table. A batch failure is logged
/// and also yields an empty table, so the pipeline never sees partial output.
#[instrument(level = "info", skip_all)]
pub fn transform_product_data(raw: Option<&[RawProduct]>) -> ProductTable {
    let raw = match raw {
        Some(raw) if !raw.is_empty() => raw,
        _ => {
            warn!("No raw products to transform");
            return ProductTable::empty();
        }
    };

    match try_transform(raw) {
        Ok(table) => {
            info!(
                input = raw.len(),
                output = table.len(),
                dropped = raw.len() - table.len(),
                "Transformed product data"
            );
            debug!(titles = ?table.titles(), "Surviving products");
            table
        }
        Err(e) => {
            error!(error = %e, input = raw.len(), "Transform aborted; returning empty table");
            ProductTable::empty()
        }
    }
}

/// One untyped record, borrowed, with its position in the input.
struct Record<'a> {
    row: usize,
    fields: &'a Map<String, Value>,
}

impl Record<'_> {
    fn cell(&self, column: &str) -> Cell<'_> {
        match self.fields.get(column) {
            None | Some(Value::Null) => Cell::Null,
            Some(Value::String(s)) => Cell::Text(s),
            Some(_) => Cell::Other,
        }
    }

    /// A column the transform parses; anything but text or null fails the batch.
    fn text(&self, column: &str) -> Result<Option<String>, TransformError> {
        match self.cell(column) {
            Cell::Null => Ok(None),
            Cell::Text(s) => Ok(Some(s.to_string())),
            Cell::Other => Err(TransformError::NonText {
                row: self.row,
                column: column.to_string(),
            }),
        }
    }

    /// A pass-through column; numbers and booleans are kept as their text.
    fn lenient_text(&self, column: &str) -> Option<String> {
        match self.fields.get(column)? {
            Value::Null => None,
            Value::String(s) => Some(s.clone()),
            other => Some(other.to_string()),
        }
    }

    fn to_raw(&self) -> Result<RawProduct, TransformError> {
        Ok(RawProduct {
            title: self.text("Title")?,
            price: self.text("Price")?,
            rating: self.text("Rating")?,
            color: self.lenient_text("Color"),
            size: self.lenient_text("Size"),
            gender: self.lenient_text("Gender"),
            timestamp: self.lenient_text("Timestamp").unwrap_or_default(),
        })
    }
}

impl FilterRow for Record<'_> {
    fn title_cell(&self) -> Cell<'_> {
        self.cell("Title")
    }

    fn price_cell(&self) -> Cell<'_> {
        self.cell("Price")
    }

    fn rating_cell(&self) -> Cell<'_> {
        self.cell("Rating")
    }
}

/// Run the full transform on untyped records, surfacing a batch failure.
///
/// Shape errors (a non-object record, a required column absent everywhere)
/// are checked first. Steps 1-4 then run on the records as they are, so a
/// non-text `Title`, `Price` or `Rating` only fails the batch when its row
/// survives them.
#[instrument(level = "info", skip_all, fields(input = values.len()))]
pub fn try_transform_records(values: &[Value]) -> Result<ProductTable, TransformError> {
    let records = values
        .iter()
        .enumerate()
        .map(|(row, v)| {
            v.as_object()
                .map(|fields| Record { row, fields })
                .ok_or(TransformError::NotARecord { row })
        })
        .collect::<Result<Vec<_>, _>>()?;

    if let Some(column) = REQUIRED_COLUMNS
        .into_iter()
        .find(|column| records.iter().all(|r| !r.fields.contains_key(*column)))
    {
        return Err(TransformError::MissingColumn(column));
    }

    let rows = prefilter(records)
        .iter()
        .map(Record::to_raw)
        .collect::<Result<Vec<_>, _>>()?;
    coerce_and_drop_nan(rows)
}

/// Transform untyped records, e.g. a replayed raw snapshot.
///
/// Behaves like [`transform_product_data`], and also rejects batches whose
/// shape is wrong (see [`try_transform_records`]). A rejected batch yields an
/// empty table.
#[instrument(level = "info", skip_all, fields(input = values.len()))]
pub fn transform_raw_records(values: &[Value]) -> ProductTable {
    if values.is_empty() {
        warn!("No raw records to transform");
        return ProductTable::empty();
    }

    match try_transform_records(values) {
        Ok(table) => {
            info!(
                input = values.len(),
                output = table.len(),
                dropped = values.len() - table.len(),
                "Transformed raw records"
            );
            debug!(titles = ?table.titles(), "Surviving products");
            table
        }
        Err(e) => {
            error!(error = %e, input = values.len(), "Raw records rejected; returning empty table");
            ProductTable::empty()
        }
    }
}

/// Row-level view used by [`remove_invalid_products`].
///
/// Implemented for both raw and cleaned rows, so the same cross-check can run
/// before or after coercion.
pub trait Listing {
    fn title(&self) -> Option<&str>;
    /// The price is missing or flagged unavailable.
    fn price_unavailable(&self) -> bool;
    /// The rating carries one of the site's "no rating" strings.
    fn rating_sentinel(&self) -> bool;
    /// The rating is missing or not a number.
    fn rating_missing(&self) -> bool;
}

impl Listing for RawProduct {
    fn title(&self) -> Option<&str> {
        self.title.as_deref()
    }

    fn price_unavailable(&self) -> bool {
        matches!(self.price.as_deref(), None | Some(PRICE_UNAVAILABLE))
    }

    fn rating_sentinel(&self) -> bool {
        self.rating
            .as_deref()
            .is_some_and(|r| RATING_SENTINELS.contains(&r))
    }

    fn rating_missing(&self) -> bool {
        self.rating.is_none()
    }
}

impl Listing for Product {
    fn title(&self) -> Option<&str> {
        Some(&self.title)
    }

    fn price_unavailable(&self) -> bool {
        false
    }

    fn rating_sentinel(&self) -> bool {
        false
    }

    fn rating_missing(&self) -> bool {
        self.rating.is_nan()
    }
}

/// Drop rows that fail any of the four validity predicates.
///
/// No coercion happens here. Applying it twice gives the same rows as
/// applying it once.
pub fn remove_invalid_products<T: Listing + Clone>(rows: &[T]) -> Vec<T> {
    rows.iter()
        .filter(|row| row.title() != Some(UNKNOWN_TITLE))
        .filter(|row| !row.price_unavailable())
        .filter(|row| !row.rating_sentinel())
        .filter(|row| !row.rating_missing())
        .cloned()
        .collect()
}

/// [`remove_invalid_products`] over a whole table.
pub fn clean_table(table: &ProductTable) -> ProductTable {
    let rows = remove_invalid_products(&table.rows);
    if rows.len() != table.len() {
        warn!(
            dropped = table.len() - rows.len(),
            "Cross-check removed rows from the transformed table"
        );
    }
    ProductTable::from(rows)
}
