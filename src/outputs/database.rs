//! PostgreSQL output.
//!
//! Rows are appended to the `products` table. The table is created on first
//! use with one column per entry of [`COLUMNS`]; existing rows are never
//! touched.

use crate::models::{Product, ProductTable, COLUMNS};
use crate::utils::redact_url;
use sqlx::postgres::{PgPool, PgPoolOptions};
use sqlx::{Postgres, QueryBuilder};
use std::error::Error;
use std::time::Duration;
use tracing::{debug, info, instrument};

/// Destination table name.
pub const PRODUCTS_TABLE: &str = "products";

/// Postgres caps bind parameters at 65535 per statement.
const ROWS_PER_INSERT: usize = 1000;

const CREATE_TABLE_SQL: &str = r#"
    CREATE TABLE IF NOT EXISTS products (
        "Title" TEXT NOT NULL,
        "Price" BIGINT NOT NULL,
        "Rating" DOUBLE PRECISION NOT NULL,
        "Color" TEXT,
        "Size" TEXT,
        "Gender" TEXT,
        "Timestamp" TEXT NOT NULL
    )
"#;

fn quoted_columns() -> String {
    COLUMNS
        .iter()
        .map(|c| format!("\"{c}\""))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Build one multi-row `INSERT` for `rows`.
fn insert_query(rows: &[Product]) -> QueryBuilder<'_, Postgres> {
    let mut builder = QueryBuilder::new(format!(
        "INSERT INTO {PRODUCTS_TABLE} ({}) ",
        quoted_columns()
    ));
    builder.push_values(rows, |mut b, product| {
        b.push_bind(&product.title)
            .push_bind(product.price)
            .push_bind(product.rating)
            .push_bind(&product.color)
            .push_bind(&product.size)
            .push_bind(&product.gender)
            .push_bind(&product.timestamp);
    });
    builder
}

/// Append the table to the `products` table of the database at `db_url`.
///
/// An empty table returns `Ok(0)` without opening a connection. All rows go
/// in one transaction, so a failure leaves the table unchanged.
///
/// # Returns
///
/// The number of rows inserted.
#[instrument(level = "info", skip_all, fields(db = %redact_url(db_url)))]
pub async fn load_to_db(table: &ProductTable, db_url: &str) -> Result<usize, Box<dyn Error>> {
    if table.is_empty() {
        info!("No rows to insert; skipping database load");
        return Ok(0);
    }

    let pool: PgPool = PgPoolOptions::new()
        .max_connections(1)
        .acquire_timeout(Duration::from_secs(10))
        .connect(db_url)
        .await?;

    sqlx::query(CREATE_TABLE_SQL).execute(&pool).await?;

    let mut tx = pool.begin().await?;
    let mut inserted = 0u64;
    for chunk in table.rows.chunks(ROWS_PER_INSERT) {
        let result = insert_query(chunk).build().execute(&mut *tx).await?;
        inserted += result.rows_affected();
        debug!(chunk = chunk.len(), "Inserted chunk");
    }
    tx.commit().await?;
    pool.close().await;

    info!(rows = inserted, table = PRODUCTS_TABLE, "Appended rows to database");
    Ok(inserted as usize)
}
