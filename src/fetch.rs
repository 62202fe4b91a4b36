// 🌐 Fetcher - obtain the raw payload of one configured source
//
// Network and filesystem access live here and nowhere else. Token
// acquisition is its own step so a bad credential shows up as `Auth`,
// not as a failed data call.

use crate::adapters::RawPayload;
use crate::config::{SourceConfig, SourceSpec};
use crate::context::TimeWindow;
use crate::error::SourceError;
use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use calamine::{open_workbook_auto_from_rs, Data, Reader};
use serde_json::{json, Value};
use std::io::Cursor;
use std::path::Path;
use std::time::Duration;

/// Raw payload plus the status code of the data call (none for files)
#[derive(Debug, Clone, PartialEq)]
pub struct Fetched {
    pub payload: RawPayload,
    pub status: Option<u16>,
}

#[async_trait]
pub trait Fetcher: Send + Sync {
    async fn fetch(&self, source: &SourceConfig, window: &TimeWindow) -> Result<Fetched, SourceError>;
}

/// `Basic <base64(user:pass)>`
pub fn basic_auth_header(user: &str, password: &str) -> String {
    format!("Basic {}", STANDARD.encode(format!("{}:{}", user, password)))
}

/// Pull `OAuthTokenDTO/accessToken` out of Walmart's XML token response
pub fn walmart_token_from_xml(body: &str, source: &str) -> Result<String, SourceError> {
    let doc = roxmltree::Document::parse(body).map_err(|e| SourceError::Auth {
        source_name: source.to_string(),
        status: None,
        message: format!("token response is not XML: {}", e),
    })?;

    doc.descendants()
        .find(|n| n.has_tag_name("accessToken"))
        .and_then(|n| n.text())
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
        .ok_or_else(|| SourceError::Auth {
            source_name: source.to_string(),
            status: None,
            message: "accessToken missing from token response".to_string(),
        })
}

/// GraphQL document for Wayfair's dropship purchase orders
pub fn wayfair_query(limit: u32, from_date: &str) -> String {
    format!(
        r#"query getDropshipPurchaseOrders {{
    getDropshipPurchaseOrders(
        limit: {},
        hasResponse: false,
        fromDate: "{}",
        sortOrder: DESC
    ) {{
        poNumber,
        poDate,
        products {{
            partNumber,
            quantity
        }}
    }}
}}"#,
        limit, from_date
    )
}

/// Extensions decoded as workbooks instead of delimited text
const SPREADSHEET_EXTENSIONS: [&str; 5] = ["xlsx", "xlsm", "xlsb", "xls", "ods"];

fn is_spreadsheet(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| SPREADSHEET_EXTENSIONS.contains(&e.to_ascii_lowercase().as_str()))
        .unwrap_or(false)
}

/// Cell texts of the first worksheet, row by row
pub fn spreadsheet_rows(bytes: Vec<u8>, source: &str) -> Result<Vec<Vec<String>>, SourceError> {
    let mut workbook = open_workbook_auto_from_rs(Cursor::new(bytes))
        .map_err(|e| SourceError::parse(source, format!("not a readable workbook: {}", e)))?;
    let range = workbook
        .worksheet_range_at(0)
        .ok_or_else(|| SourceError::parse(source, "workbook has no worksheet"))?
        .map_err(|e| SourceError::parse(source, format!("unreadable worksheet: {}", e)))?;

    Ok(range
        .rows()
        .map(|row| row.iter().map(|cell: &Data| cell.to_string()).collect())
        .collect())
}

/// Read a flat file; absent or unreadable → `MissingFile`.
/// Workbooks come back as sheet rows. Text bytes that are not UTF-8
/// are replaced rather than rejected.
pub async fn read_flat_file(path: &Path, source: &str) -> Result<RawPayload, SourceError> {
    let bytes = tokio::fs::read(path).await.map_err(|e| {
        tracing::debug!(source, path = %path.display(), error = %e, "flat file not readable");
        SourceError::MissingFile {
            source_name: source.to_string(),
            path: path.display().to_string(),
        }
    })?;

    if is_spreadsheet(path) {
        return Ok(RawPayload::Rows(spreadsheet_rows(bytes, source)?));
    }
    Ok(RawPayload::Delimited(String::from_utf8_lossy(&bytes).into_owned()))
}

// ============================================================================
// HTTP FETCHER
// ============================================================================

pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new(timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create HTTP client: {}", e))?;
        Ok(HttpFetcher { client })
    }

    #[allow(clippy::too_many_arguments)]
    async fn walmart(
        &self,
        source: &SourceConfig,
        window: &TimeWindow,
        token_url: &str,
        orders_url: &str,
        client_id: &str,
        client_secret: &str,
        correlation_id: &str,
        service_name: &str,
    ) -> Result<Fetched, SourceError> {
        let response = self
            .client
            .post(token_url)
            .header("Authorization", basic_auth_header(client_id, client_secret))
            .header("WM_QOS.CORRELATION_ID", correlation_id)
            .header("WM_SVC.NAME", service_name)
            .header("Content-Type", "application/x-www-form-urlencoded")
            .body("grant_type=client_credentials")
            .send()
            .await
            .map_err(|e| auth_error(&source.name, e))?;
        let body = success_text(response, &source.name, Step::Auth).await?;
        let token = walmart_token_from_xml(&body, &source.name)?;

        let response = self
            .client
            .get(orders_url)
            .query(&[("createdStartDate", window.start_date())])
            .header("WM_SEC.ACCESS_TOKEN", token)
            .header("WM_QOS.CORRELATION_ID", correlation_id)
            .header("WM_SVC.NAME", service_name)
            .header("Accept", "application/json")
            .send()
            .await
            .map_err(|e| fetch_error(&source.name, e))?;
        json_payload(response, &source.name).await
    }

    #[allow(clippy::too_many_arguments)]
    async fn wayfair(
        &self,
        source: &SourceConfig,
        window: &TimeWindow,
        auth_url: &str,
        api_url: &str,
        client_id: &str,
        client_secret: &str,
        audience: &str,
        limit: u32,
    ) -> Result<Fetched, SourceError> {
        let response = self
            .client
            .post(auth_url)
            .header("cache-control", "no-cache")
            .json(&json!({
                "grant_type": "client_credentials",
                "client_id": client_id,
                "client_secret": client_secret,
                "audience": audience,
            }))
            .send()
            .await
            .map_err(|e| auth_error(&source.name, e))?;
        let body = success_text(response, &source.name, Step::Auth).await?;
        let token = serde_json::from_str::<Value>(&body)
            .ok()
            .and_then(|v| v.get("access_token").and_then(Value::as_str).map(str::to_string))
            .ok_or_else(|| SourceError::Auth {
                source_name: source.name.clone(),
                status: None,
                message: "access_token missing from token response".to_string(),
            })?;

        let query = wayfair_query(limit, &window.start_iso_utc_offset());
        let response = self
            .client
            .post(api_url)
            .bearer_auth(token)
            .json(&json!({ "query": query }))
            .send()
            .await
            .map_err(|e| fetch_error(&source.name, e))?;
        json_payload(response, &source.name).await
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, source: &SourceConfig, window: &TimeWindow) -> Result<Fetched, SourceError> {
        tracing::debug!(source = %source.name, kind = source.spec.kind().code(), "fetching");

        match &source.spec {
            SourceSpec::Walmart {
                token_url,
                orders_url,
                client_id,
                client_secret,
                correlation_id,
                service_name,
            } => {
                self.walmart(
                    source,
                    window,
                    token_url,
                    orders_url,
                    client_id,
                    client_secret,
                    correlation_id,
                    service_name,
                )
                .await
            }

            SourceSpec::Houzz {
                base_url,
                token,
                user_name,
                app_name,
            } => {
                let response = self
                    .client
                    .get(base_url)
                    .query(&[
                        ("format", "xml".to_string()),
                        ("method", "getOrders".to_string()),
                        ("From", window.start_date()),
                        ("To", window.end_space_utc_offset()),
                    ])
                    .header("X-HOUZZ-API-SSL-TOKEN", token)
                    .header("X-HOUZZ-API-USER-NAME", user_name)
                    .header("X-HOUZZ-API-APP-NAME", app_name)
                    .send()
                    .await
                    .map_err(|e| fetch_error(&source.name, e))?;
                let status = response.status().as_u16();
                let body = success_text(response, &source.name, Step::Data).await?;
                Ok(Fetched {
                    payload: RawPayload::Xml(body),
                    status: Some(status),
                })
            }

            SourceSpec::Faire {
                orders_url,
                access_token,
            } => {
                let response = self
                    .client
                    .get(orders_url)
                    .query(&[("created_at_min", window.start_iso_millis_z())])
                    .header("X-FAIRE-ACCESS-TOKEN", access_token)
                    .send()
                    .await
                    .map_err(|e| fetch_error(&source.name, e))?;
                json_payload(response, &source.name).await
            }

            SourceSpec::WooCommerce { url, user, password } => {
                let response = self
                    .client
                    .get(url)
                    .header("Authorization", basic_auth_header(user, password))
                    .send()
                    .await
                    .map_err(|e| fetch_error(&source.name, e))?;
                json_payload(response, &source.name).await
            }

            SourceSpec::Dsco { base_url, token } => {
                let response = self
                    .client
                    .get(base_url)
                    .query(&[
                        ("ordersCreatedSince", window.start_date()),
                        ("until", window.end_date()),
                    ])
                    .bearer_auth(token)
                    .header("Accept", "application/json")
                    .send()
                    .await
                    .map_err(|e| fetch_error(&source.name, e))?;
                json_payload(response, &source.name).await
            }

            SourceSpec::Mirakl { url, api_key, max } => {
                let response = self
                    .client
                    .get(url)
                    .query(&[
                        ("start_date", window.start_iso()),
                        ("end_date", window.end_iso()),
                        ("max", max.to_string()),
                    ])
                    .header("Authorization", api_key)
                    .send()
                    .await
                    .map_err(|e| fetch_error(&source.name, e))?;
                json_payload(response, &source.name).await
            }

            SourceSpec::Wayfair {
                auth_url,
                api_url,
                client_id,
                client_secret,
                audience,
                limit,
            } => {
                self.wayfair(
                    source,
                    window,
                    auth_url,
                    api_url,
                    client_id,
                    client_secret,
                    audience,
                    *limit,
                )
                .await
            }

            SourceSpec::FlatFile { path, .. } => {
                let payload = read_flat_file(path, &source.name).await?;
                Ok(Fetched {
                    payload,
                    status: None,
                })
            }
        }
    }
}

// ============================================================================
// RESPONSE HELPERS
// ============================================================================

#[derive(Debug, Clone, Copy)]
enum Step {
    Auth,
    Data,
}

fn auth_error(source: &str, err: reqwest::Error) -> SourceError {
    SourceError::Auth {
        source_name: source.to_string(),
        status: err.status().map(|s| s.as_u16()),
        message: err.to_string(),
    }
}

fn fetch_error(source: &str, err: reqwest::Error) -> SourceError {
    SourceError::Fetch {
        source_name: source.to_string(),
        status: err.status().map(|s| s.as_u16()),
        message: err.to_string(),
    }
}

/// Body of a 2xx response; anything else becomes an error for `step`
async fn success_text(response: reqwest::Response, source: &str, step: Step) -> Result<String, SourceError> {
    let status = response.status();
    if !status.is_success() {
        let body = response.text().await.unwrap_or_default();
        let preview: String = body.chars().take(300).collect();
        let message = format!("HTTP {}: {}", status, preview);
        let code = Some(status.as_u16());
        return Err(match step {
            Step::Auth => SourceError::Auth {
                source_name: source.to_string(),
                status: code,
                message,
            },
            Step::Data => SourceError::Fetch {
                source_name: source.to_string(),
                status: code,
                message,
            },
        });
    }

    response.text().await.map_err(|e| match step {
        Step::Auth => auth_error(source, e),
        Step::Data => fetch_error(source, e),
    })
}

async fn json_payload(response: reqwest::Response, source: &str) -> Result<Fetched, SourceError> {
    let status = response.status().as_u16();
    let body = success_text(response, source, Step::Data).await?;
    let value: Value = serde_json::from_str(&body)
        .map_err(|e| SourceError::parse(source, format!("response is not JSON: {}", e)))?;
    Ok(Fetched {
        payload: RawPayload::Json(value),
        status: Some(status),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_basic_auth_header() {
        assert_eq!(basic_auth_header("user", "pass"), "Basic dXNlcjpwYXNz");
    }

    #[test]
    fn test_walmart_token_from_xml() {
        let body = r#"<?xml version="1.0" encoding="UTF-8"?>
<OAuthTokenDTO><accessToken>eyJraWQi</accessToken><tokenType>Bearer</tokenType><expiresIn>900</expiresIn></OAuthTokenDTO>"#;
        assert_eq!(walmart_token_from_xml(body, "Walmart").unwrap(), "eyJraWQi");
    }

    #[test]
    fn test_walmart_token_missing_is_auth_error() {
        let err = walmart_token_from_xml("<OAuthTokenDTO/>", "Walmart").unwrap_err();
        assert_eq!(err.kind(), "auth");

        let err = walmart_token_from_xml("not xml <", "Walmart").unwrap_err();
        assert_eq!(err.kind(), "auth");
    }

    #[test]
    fn test_wayfair_query_carries_limit_and_date() {
        let query = wayfair_query(1000, "2024-03-20T12:00:00+00:00");
        assert!(query.contains("limit: 1000"));
        assert!(query.contains(r#"fromDate: "2024-03-20T12:00:00+00:00""#));
        assert!(query.contains("partNumber"));
    }

    #[tokio::test]
    async fn test_read_flat_file_missing() {
        let dir = TempDir::new().unwrap();
        let err = read_flat_file(&dir.path().join("macys.csv"), "Macys")
            .await
            .unwrap_err();
        assert_eq!(err.kind(), "missing_file");
    }

    #[tokio::test]
    async fn test_read_flat_file_tolerates_non_utf8() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hsn.csv");
        std::fs::write(&path, b"sku,qty\nCAF\xc9-1,2\n").unwrap();

        match read_flat_file(&path, "HSN").await.unwrap() {
            RawPayload::Delimited(text) => assert!(text.starts_with("sku,qty\nCAF")),
            other => panic!("unexpected payload: {}", other.shape()),
        }
    }

    #[tokio::test]
    async fn test_read_flat_file_xlsx_as_rows() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hsn.XLSX");
        let mut workbook = rust_xlsxwriter::Workbook::new();
        let sheet = workbook.add_worksheet();
        sheet.write_string(0, 0, "Supplier Code").unwrap();
        sheet.write_string(0, 1, "QTY").unwrap();
        sheet.write_string(1, 0, "RUG-1").unwrap();
        sheet.write_number(1, 1, 3).unwrap();
        workbook.save(&path).unwrap();

        let payload = read_flat_file(&path, "HSN").await.unwrap();
        assert_eq!(
            payload,
            RawPayload::Rows(vec![
                vec!["Supplier Code".to_string(), "QTY".to_string()],
                vec!["RUG-1".to_string(), "3".to_string()],
            ])
        );
    }

    #[tokio::test]
    async fn test_read_flat_file_corrupt_workbook_is_parse_error() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("rue.xlsx");
        std::fs::write(&path, "sku,qty\nRUG-1,2\n").unwrap();

        let err = read_flat_file(&path, "Rue").await.unwrap_err();
        assert_eq!(err.kind(), "parse");
    }
}
