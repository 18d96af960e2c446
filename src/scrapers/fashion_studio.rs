//! Fashion Studio catalog scraper.
//!
//! Scrapes the paginated product catalog at
//! [fashion-studio.dicoding.dev](https://fashion-studio.dicoding.dev). Each page
//! lists products as `div.product-details` blocks:
//!
//! ```html
//! <div class="product-details">
//!   <h3 class="product-title">T-shirt 2</h3>
//!   <div class="price-container"><span class="price">$102.15</span></div>
//!   <p>Rating: ⭐ 3.9 / 5</p>
//!   <p>3 Colors</p>
//!   <p>Size: M</p>
//!   <p>Gender: Women</p>
//! </div>
//! ```
//!
//! # Page URLs
//!
//! Pages are addressed through a template whose `{}` placeholder receives the
//! page number, e.g. `https://fashion-studio.dicoding.dev/?page={}`.

use crate::models::RawProduct;
use crate::utils::capture_timestamp;
use once_cell::sync::Lazy;
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Client, StatusCode};
use scraper::{ElementRef, Html, Selector};
use std::error::Error;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, error, info, instrument, warn};

static BLOCK_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("div.product-details").expect("valid block selector"));
static TITLE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("h3.product-title").expect("valid title selector"));
static PRICE_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("span.price").expect("valid price selector"));
static DETAIL_SELECTOR: Lazy<Selector> =
    Lazy::new(|| Selector::parse("p").expect("valid detail selector"));

/// Placeholder replaced by the page number in the URL template.
pub const PAGE_PLACEHOLDER: &str = "{}";

/// Settings for one run of [`scrape_products`].
#[derive(Debug, Clone)]
pub struct ScrapeSettings {
    /// Page URL template containing [`PAGE_PLACEHOLDER`].
    pub base_url: String,
    pub start_page: u32,
    /// Number of pages to visit, starting at `start_page`.
    pub max_pages: u32,
    /// Courtesy pause after each successfully scraped page.
    pub delay: Duration,
    /// Per-request timeout.
    pub timeout: Duration,
    pub user_agent: String,
}

/// A labelled detail line and where its value goes.
struct DetailRule {
    label: &'static str,
    apply: fn(&mut RawProduct, &str, &'static str),
}

/// Value after the first occurrence of the label, up to the next one.
fn after_label(text: &str, label: &str) -> String {
    text.split(label).nth(1).unwrap_or_default().trim().to_string()
}

/// First matching rule wins for a given line; declaration order decides ties.
const DETAIL_RULES: [DetailRule; 4] = [
    DetailRule {
        label: "Rating:",
        apply: |p, text, label| p.rating = Some(after_label(text, label)),
    },
    DetailRule {
        // The first token is kept as-is: "3 Colors" gives "3", "Colors: 3" gives "Colors:".
        label: "Colors",
        apply: |p, text, _| p.color = text.split_whitespace().next().map(str::to_string),
    },
    DetailRule {
        label: "Size:",
        apply: |p, text, label| p.size = Some(after_label(text, label)),
    },
    DetailRule {
        label: "Gender:",
        apply: |p, text, label| p.gender = Some(after_label(text, label)),
    },
];

/// Text of an element with each fragment trimmed and empty fragments skipped.
fn stripped_text(element: ElementRef<'_>) -> String {
    element
        .text()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("")
}

fn first_text(block: ElementRef<'_>, selector: &Selector) -> Option<String> {
    block.select(selector).next().map(stripped_text)
}

/// Parse one listing block into a [`RawProduct`].
///
/// Missing markup leaves the corresponding field as `None`. A block with no
/// title, no price and no labelled detail line is not a listing at all and
/// yields `None`; the caller logs and moves on.
pub fn extract_product(block: ElementRef<'_>) -> Option<RawProduct> {
    let mut product = RawProduct {
        title: first_text(block, &TITLE_SELECTOR),
        price: first_text(block, &PRICE_SELECTOR),
        timestamp: capture_timestamp(),
        ..Default::default()
    };

    let mut matched_details = 0usize;
    for detail in block.select(&DETAIL_SELECTOR) {
        let text = stripped_text(detail);
        if let Some(rule) = DETAIL_RULES.iter().find(|r| text.contains(r.label)) {
            (rule.apply)(&mut product, &text, rule.label);
            matched_details += 1;
        }
    }

    if product.title.is_none() && product.price.is_none() && matched_details == 0 {
        return None;
    }
    Some(product)
}

/// Parse a whole catalog page.
///
/// Returns the number of listing blocks found alongside the records that
/// parsed successfully.
pub fn parse_listing_page(html: &str) -> (usize, Vec<RawProduct>) {
    let document = Html::parse_document(html);
    let mut blocks = 0usize;
    let mut products = Vec::new();

    for block in document.select(&BLOCK_SELECTOR) {
        blocks += 1;
        match extract_product(block) {
            Some(product) => products.push(product),
            None => warn!(block = blocks, "Listing block has no product markup; skipping"),
        }
    }

    (blocks, products)
}

/// Substitute a page number into the URL template.
pub fn page_url(template: &str, page: u32) -> String {
    template.replacen(PAGE_PLACEHOLDER, &page.to_string(), 1)
}

/// Build the HTTP client used for every page request.
pub fn build_client(settings: &ScrapeSettings) -> Result<Client, Box<dyn Error>> {
    let mut headers = HeaderMap::new();
    headers.insert(USER_AGENT, HeaderValue::from_str(&settings.user_agent)?);

    let client = Client::builder()
        .default_headers(headers)
        .timeout(settings.timeout)
        .build()?;
    Ok(client)
}

fn error_kind(e: &reqwest::Error) -> &'static str {
    if e.is_timeout() {
        "timeout"
    } else if e.is_connect() {
        "connect"
    } else {
        "other"
    }
}

/// Fetch a page body, or the non-200 status that stopped it.
async fn fetch_page(client: &Client, url: &str) -> Result<Result<String, StatusCode>, reqwest::Error> {
    let response = client.get(url).send().await?;
    let status = response.status();
    if status != StatusCode::OK {
        return Ok(Err(status));
    }
    Ok(Ok(response.text().await?))
}

/// Scrape every page in the configured range.
///
/// Pages are fetched one at a time. A failed request, a non-200 status or a
/// page without listing blocks is logged and skipped; the run always goes on
/// to the next page. After each successful page the scraper sleeps for the
/// configured delay.
///
/// # Returns
///
/// All successfully parsed records in page order. May be empty.
#[instrument(level = "info", skip_all, fields(base_url = %settings.base_url, start_page = settings.start_page, max_pages = settings.max_pages))]
pub async fn scrape_products(settings: &ScrapeSettings) -> Vec<RawProduct> {
    let client = match build_client(settings) {
        Ok(client) => client,
        Err(e) => {
            error!(error = %e, "Failed to build HTTP client; nothing scraped");
            return Vec::new();
        }
    };

    let mut products = Vec::new();
    let end_page = settings.start_page.saturating_add(settings.max_pages);

    for page in settings.start_page..end_page {
        let url = page_url(&settings.base_url, page);
        debug!(page, %url, "Fetching page");

        let body = match fetch_page(&client, &url).await {
            Ok(Ok(body)) => body,
            Ok(Err(status)) => {
                warn!(page, %url, status = status.as_u16(), "Failed to retrieve page");
                continue;
            }
            Err(e) => {
                error!(page, %url, kind = error_kind(&e), error = %e, "Request failed");
                continue;
            }
        };

        let (blocks, page_products) = parse_listing_page(&body);
        if blocks == 0 {
            warn!(page, %url, "No products found on page");
            continue;
        }

        info!(
            page,
            blocks,
            parsed = page_products.len(),
            "Scraped page"
        );
        products.extend(page_products);

        if !settings.delay.is_zero() {
            sleep(settings.delay).await;
        }
    }

    if products.is_empty() {
        warn!("Scraping finished without any products");
    } else {
        info!(count = products.len(), "Scraping finished");
    }
    products
}
