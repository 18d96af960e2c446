//! Google Sheets output.
//!
//! Overwrites a named range with the table's header row followed by every
//! data row. Values are sent as-is (`valueInputOption=RAW`): prices and
//! ratings stay numbers, missing fields become empty strings.
//!
//! # Authentication
//!
//! Uses a service-account key file (the JSON downloaded from the Google Cloud
//! console). A short-lived RS256-signed JWT is exchanged at the key's
//! `token_uri` for a bearer token scoped to spreadsheets only.

use crate::models::{ProductTable, COLUMNS};
use crate::utils::truncate_for_log;
use chrono::Utc;
use jsonwebtoken::{Algorithm, EncodingKey, Header};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::error::Error;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info, instrument, warn};

pub const SHEETS_SCOPE: &str = "https://www.googleapis.com/auth/spreadsheets";
pub const SHEETS_API_BASE: &str = "https://sheets.googleapis.com";

const JWT_GRANT_TYPE: &str = "urn:ietf:params:oauth:grant-type:jwt-bearer";
const TOKEN_LIFETIME_SECS: i64 = 3600;

/// The fields of a service-account key file this sink needs.
#[derive(Debug, Deserialize)]
pub struct ServiceAccountKey {
    pub client_email: String,
    pub private_key: String,
    pub token_uri: String,
}

#[derive(Debug, Serialize)]
struct Claims<'a> {
    iss: &'a str,
    scope: &'a str,
    aud: &'a str,
    iat: i64,
    exp: i64,
}

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
}

/// Read and parse a service-account key file.
pub async fn read_service_account(path: &Path) -> Result<ServiceAccountKey, Box<dyn Error>> {
    let text = tokio::fs::read_to_string(path)
        .await
        .map_err(|e| format!("cannot read service account file {}: {e}", path.display()))?;
    let key: ServiceAccountKey = serde_json::from_str(&text)?;
    Ok(key)
}

/// Sign the JWT assertion for the token exchange.
fn signed_assertion(key: &ServiceAccountKey, now: i64) -> Result<String, Box<dyn Error>> {
    let claims = Claims {
        iss: &key.client_email,
        scope: SHEETS_SCOPE,
        aud: &key.token_uri,
        iat: now,
        exp: now + TOKEN_LIFETIME_SECS,
    };
    let encoding_key = EncodingKey::from_rsa_pem(key.private_key.as_bytes())?;
    let token = jsonwebtoken::encode(&Header::new(Algorithm::RS256), &claims, &encoding_key)?;
    Ok(token)
}

async fn fetch_access_token(client: &Client, key: &ServiceAccountKey) -> Result<String, Box<dyn Error>> {
    let assertion = signed_assertion(key, Utc::now().timestamp())?;
    let response = client
        .post(&key.token_uri)
        .form(&[("grant_type", JWT_GRANT_TYPE), ("assertion", assertion.as_str())])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        return Err(format!("token exchange failed with {status}: {}", truncate_for_log(&body, 300)).into());
    }

    let token: TokenResponse = response.json().await?;
    debug!(account = %key.client_email, "Obtained access token");
    Ok(token.access_token)
}

/// Header row plus one row per product, ready for the `values` payload.
pub fn sheet_values(table: &ProductTable) -> Vec<Vec<Value>> {
    let text = |v: &Option<String>| json!(v.as_deref().unwrap_or_default());

    let mut values = Vec::with_capacity(table.len() + 1);
    values.push(COLUMNS.iter().map(|c| json!(c)).collect());
    for p in table {
        values.push(vec![
            json!(p.title),
            json!(p.price),
            json!(p.rating),
            text(&p.color),
            text(&p.size),
            text(&p.gender),
            json!(p.timestamp),
        ]);
    }
    values
}

fn update_url(api_base: &str, spreadsheet_id: &str, range: &str) -> String {
    format!(
        "{}/v4/spreadsheets/{}/values/{}?valueInputOption=RAW",
        api_base.trim_end_matches('/'),
        urlencoding::encode(spreadsheet_id),
        urlencoding::encode(range)
    )
}

async fn update_range(
    table: &ProductTable,
    spreadsheet_id: &str,
    range: &str,
    service_account_file: &Path,
    api_base: &str,
) -> Result<usize, Box<dyn Error>> {
    let key = read_service_account(service_account_file).await?;
    let client = Client::builder().timeout(Duration::from_secs(30)).build()?;
    let token = fetch_access_token(&client, &key).await?;

    let body = json!({
        "range": range,
        "majorDimension": "ROWS",
        "values": sheet_values(table),
    });
    let response = client
        .put(update_url(api_base, spreadsheet_id, range))
        .bearer_auth(token)
        .json(&body)
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        warn!(%status, "Sheets API rejected the update");
        return Err(format!("sheets update failed with {status}: {}", truncate_for_log(&body, 300)).into());
    }

    info!(rows = table.len(), %range, "Updated Google Sheets range");
    Ok(table.len())
}

/// Overwrite `range` of the spreadsheet with the table.
///
/// # Arguments
///
/// * `spreadsheet_id` - The id from the spreadsheet URL
/// * `range` - A1 notation, e.g. `Sheet1!A1`
/// * `service_account_file` - Path to the service-account JSON key
///
/// # Returns
///
/// The number of data rows written (the header row is not counted).
#[instrument(level = "info", skip_all, fields(%spreadsheet_id, %range))]
pub async fn load_to_google_sheets(
    table: &ProductTable,
    spreadsheet_id: &str,
    range: &str,
    service_account_file: &Path,
) -> Result<usize, Box<dyn Error>> {
    update_range(table, spreadsheet_id, range, service_account_file, SHEETS_API_BASE).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Product;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;
    use tokio::sync::mpsc;

    const TEST_KEY: &str = include_str!("../../testdata/sheets_test_key.pem");

    fn table() -> ProductTable {
        ProductTable::from(vec![Product {
            title: "Outerwear 5".to_string(),
            price: 3_200_000,
            rating: 4.2,
            color: Some("3".to_string()),
            size: None,
            gender: Some("Unisex".to_string()),
            timestamp: "2024-01-01 10:00:00".to_string(),
        }])
    }

    fn write_key(dir: &Path, token_uri: &str) -> std::path::PathBuf {
        let path = dir.join("google-sheets-api.json");
        let key = json!({
            "type": "service_account",
            "client_email": "etl@example.iam.gserviceaccount.com",
            "private_key": TEST_KEY,
            "token_uri": token_uri,
        });
        std::fs::write(&path, key.to_string()).unwrap();
        path
    }

    /// Answer each connection with the next canned response and report the request text.
    async fn serve(responses: Vec<(u16, &'static str)>) -> (String, mpsc::UnboundedReceiver<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let (tx, rx) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            for (status, body) in responses {
                let (mut socket, _) = listener.accept().await.unwrap();
                let mut request = Vec::new();
                let mut buf = [0u8; 4096];
                loop {
                    let n = socket.read(&mut buf).await.unwrap();
                    if n == 0 {
                        break;
                    }
                    request.extend_from_slice(&buf[..n]);
                    let text = String::from_utf8_lossy(&request);
                    if let Some(end) = text.find("\r\n\r\n") {
                        let length = text[..end]
                            .lines()
                            .find_map(|l| {
                                let (name, value) = l.split_once(':')?;
                                name.eq_ignore_ascii_case("content-length")
                                    .then(|| value.trim().parse::<usize>().ok())
                                    .flatten()
                            })
                            .unwrap_or(0);
                        if request.len() >= end + 4 + length {
                            break;
                        }
                    }
                }
                tx.send(String::from_utf8_lossy(&request).into_owned()).unwrap();
                let response = format!(
                    "HTTP/1.1 {status} X\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                socket.write_all(response.as_bytes()).await.unwrap();
                socket.shutdown().await.unwrap();
            }
        });
        (format!("http://{addr}"), rx)
    }

    #[test]
    fn test_sheet_values_header_and_rows() {
        let values = sheet_values(&table());
        assert_eq!(values.len(), 2);
        assert_eq!(values[0][0], "Title");
        assert_eq!(values[0][6], "Timestamp");
        assert_eq!(values[1][0], "Outerwear 5");
        assert_eq!(values[1][1], 3_200_000);
        assert_eq!(values[1][2], 4.2);
        assert_eq!(values[1][4], "");
    }

    #[test]
    fn test_sheet_values_empty_table_is_header_only() {
        assert_eq!(sheet_values(&ProductTable::empty()).len(), 1);
    }

    #[test]
    fn test_update_url_encodes_range() {
        assert_eq!(
            update_url("https://sheets.googleapis.com/", "abc123", "Sheet1!A1"),
            "https://sheets.googleapis.com/v4/spreadsheets/abc123/values/Sheet1%21A1?valueInputOption=RAW"
        );
    }

    #[test]
    fn test_signed_assertion_has_three_segments() {
        let key = ServiceAccountKey {
            client_email: "etl@example.iam.gserviceaccount.com".to_string(),
            private_key: TEST_KEY.to_string(),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
        };
        let jwt = signed_assertion(&key, 1_700_000_000).unwrap();
        assert_eq!(jwt.split('.').count(), 3);
    }

    #[test]
    fn test_signed_assertion_rejects_bad_key() {
        let key = ServiceAccountKey {
            client_email: "etl@example.iam.gserviceaccount.com".to_string(),
            private_key: "not a key".to_string(),
            token_uri: "https://oauth2.googleapis.com/token".to_string(),
        };
        assert!(signed_assertion(&key, 1_700_000_000).is_err());
    }

    #[tokio::test]
    async fn test_read_service_account() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_key(dir.path(), "https://oauth2.googleapis.com/token");
        let key = read_service_account(&path).await.unwrap();
        assert_eq!(key.client_email, "etl@example.iam.gserviceaccount.com");
        assert_eq!(key.token_uri, "https://oauth2.googleapis.com/token");

        let err = read_service_account(&dir.path().join("absent.json")).await.unwrap_err();
        assert!(err.to_string().contains("cannot read service account file"));

        let garbled = dir.path().join("garbled.json");
        std::fs::write(&garbled, "{\"type\": ").unwrap();
        assert!(read_service_account(&garbled).await.is_err());
    }

    #[tokio::test]
    async fn test_missing_credentials_file() {
        let dir = tempfile::tempdir().unwrap();
        let result =
            load_to_google_sheets(&table(), "abc123", "Sheet1!A1", &dir.path().join("absent.json")).await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_update_range_against_stub() {
        let (base, mut requests) = serve(vec![
            (200, r#"{"access_token":"tok-123","expires_in":3599,"token_type":"Bearer"}"#),
            (200, r#"{"updatedRows":2}"#),
        ])
        .await;
        let dir = tempfile::tempdir().unwrap();
        let key_path = write_key(dir.path(), &format!("{base}/token"));

        let written = update_range(&table(), "abc123", "Sheet1!A1", &key_path, &base)
            .await
            .unwrap();
        assert_eq!(written, 1);

        let token_request = requests.recv().await.unwrap();
        assert!(token_request.starts_with("POST /token"));
        assert!(token_request.contains("grant_type=urn%3Aietf%3Aparams%3Aoauth%3Agrant-type%3Ajwt-bearer"));

        let update_request = requests.recv().await.unwrap();
        assert!(update_request.starts_with("PUT /v4/spreadsheets/abc123/values/Sheet1%21A1?valueInputOption=RAW"));
        assert!(update_request.to_lowercase().contains("authorization: bearer tok-123"));
        assert!(update_request.contains("Outerwear 5"));
    }

    #[tokio::test]
    async fn test_update_range_api_failure() {
        let (base, _requests) = serve(vec![
            (200, r#"{"access_token":"tok-123"}"#),
            (403, r#"{"error":{"code":403,"message":"The caller does not have permission"}}"#),
        ])
        .await;
        let dir = tempfile::tempdir().unwrap();
        let key_path = write_key(dir.path(), &format!("{base}/token"));

        let err = update_range(&table(), "abc123", "Sheet1!A1", &key_path, &base)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("403"));
    }
}
