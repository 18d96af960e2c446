//! Catalog scrapers for fetching product listings.
//!
//! Each scraper follows the same pattern:
//!
//! 1. **Parsing**: `extract_product` turns one listing block into a `RawProduct`
//! 2. **Paging**: `scrape_products` walks a page range and aggregates records
//!
//! Scrapers use:
//! - One request at a time with a courtesy delay between pages
//! - Graceful error handling (failed pages and malformed blocks are logged and skipped)

pub mod fashion_studio;
