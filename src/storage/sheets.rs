//! Google Sheets Store
//!
//! Talks to the Sheets v4 REST API with an OAuth2 bearer access token.
//! Appends use `values:append` with `INSERT_ROWS`, so one call lands as one
//! contiguous block of rows.

use std::time::Duration;

use async_trait::async_trait;
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use serde_json::json;
use tracing::{debug, info};
use url::Url;

use super::RowStore;
use crate::config::StorageConfig;
use crate::constants::network::CONNECTION_TIMEOUT_SECS;
use crate::types::{MonitorError, PersistenceError, Result};

const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com/v4/spreadsheets";
const SPREADSHEET_ID_ENV: &str = "GOOGLE_SHEETS_SPREADSHEET_ID";
const ACCESS_TOKEN_ENV: &str = "GOOGLE_SHEETS_ACCESS_TOKEN";

pub struct GoogleSheetsStore {
    spreadsheet_id: String,
    access_token: SecretString,
    api_base: Url,
    client: reqwest::Client,
}

impl std::fmt::Debug for GoogleSheetsStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GoogleSheetsStore")
            .field("spreadsheet_id", &self.spreadsheet_id)
            .field("access_token", &"[REDACTED]")
            .field("api_base", &self.api_base.as_str())
            .finish()
    }
}

impl GoogleSheetsStore {
    pub fn new(
        spreadsheet_id: impl Into<String>,
        access_token: impl Into<String>,
        api_base: Option<&str>,
    ) -> Result<Self> {
        let api_base = Url::parse(api_base.unwrap_or(DEFAULT_API_BASE))
            .map_err(|e| MonitorError::Config(format!("Invalid storage.api_base: {}", e)))?;
        if api_base.cannot_be_a_base() {
            return Err(MonitorError::config("storage.api_base must be an http(s) URL"));
        }

        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(CONNECTION_TIMEOUT_SECS * 2))
            .connect_timeout(Duration::from_secs(CONNECTION_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            spreadsheet_id: spreadsheet_id.into(),
            access_token: SecretString::from(access_token.into()),
            api_base,
            client,
        })
    }

    /// Build from config, falling back to environment variables for the
    /// spreadsheet id and token.
    pub fn from_config(config: &StorageConfig) -> Result<Self> {
        let spreadsheet_id = non_empty(config.spreadsheet_id.clone())
            .or_else(|| non_empty(std::env::var(SPREADSHEET_ID_ENV).ok()))
            .ok_or_else(|| {
                MonitorError::Config(format!(
                    "Spreadsheet id not found. Set {} or storage.spreadsheet_id",
                    SPREADSHEET_ID_ENV
                ))
            })?;
        let token = non_empty(config.access_token.clone())
            .or_else(|| non_empty(std::env::var(ACCESS_TOKEN_ENV).ok()))
            .ok_or_else(|| {
                MonitorError::Config(format!(
                    "Sheets access token not found. Set {} or storage.access_token",
                    ACCESS_TOKEN_ENV
                ))
            })?;

        Self::new(spreadsheet_id, token, config.api_base.as_deref())
    }

    /// `{base}/{spreadsheet_id}/{segments...}`
    fn url(&self, segments: &[&str]) -> Url {
        let mut url = self.api_base.clone();
        if let Ok(mut path) = url.path_segments_mut() {
            path.pop_if_empty().push(&self.spreadsheet_id);
            for segment in segments {
                path.push(segment);
            }
        }
        url
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> std::result::Result<reqwest::Response, PersistenceError> {
        let response = request
            .bearer_auth(self.access_token.expose_secret())
            .send()
            .await?;

        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        Err(PersistenceError::from_http_status(status.as_u16(), &body))
    }

    async fn worksheet_titles(&self) -> std::result::Result<Vec<String>, PersistenceError> {
        let mut url = self.url(&[]);
        url.query_pairs_mut()
            .append_pair("fields", "sheets.properties.title");

        let metadata: SpreadsheetMetadata = self.send(self.client.get(url)).await?.json().await?;
        Ok(metadata
            .sheets
            .into_iter()
            .map(|s| s.properties.title)
            .collect())
    }

    async fn read_range(
        &self,
        range: &str,
    ) -> std::result::Result<Vec<Vec<String>>, PersistenceError> {
        let url = self.url(&["values", range]);
        let values: ValueRange = self.send(self.client.get(url)).await?.json().await?;
        Ok(values.values)
    }
}

/// A1 range on a worksheet; the name is always quoted
fn a1(worksheet: &str, cells: &str) -> String {
    format!("'{}'!{}", worksheet.replace('\'', "''"), cells)
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}

#[async_trait]
impl RowStore for GoogleSheetsStore {
    async fn ensure_worksheet(
        &self,
        worksheet: &str,
        headers: &[&str],
    ) -> std::result::Result<(), PersistenceError> {
        if !self.worksheet_titles().await?.iter().any(|t| t == worksheet) {
            let url = self.url(&[]);
            // `:batchUpdate` is a verb suffix on the spreadsheet id segment
            let url = Url::parse(&format!("{}:batchUpdate", url.as_str().trim_end_matches('/')))
                .map_err(|e| PersistenceError::permanent(format!("invalid sheets url: {}", e)))?;
            let body = json!({
                "requests": [{ "addSheet": { "properties": { "title": worksheet } } }]
            });
            self.send(self.client.post(url).json(&body)).await?;
            info!(worksheet, "Created worksheet");
        }

        let first_row = self.read_range(&a1(worksheet, "1:1")).await?;
        if first_row.first().is_none_or(|row| row.is_empty()) {
            let mut url = self.url(&["values", &a1(worksheet, "A1")]);
            url.query_pairs_mut().append_pair("valueInputOption", "RAW");
            let body = json!({ "values": [headers] });
            self.send(self.client.put(url).json(&body)).await?;
            debug!(worksheet, "Wrote header row");
        }
        Ok(())
    }

    async fn append_rows(
        &self,
        worksheet: &str,
        rows: &[Vec<String>],
    ) -> std::result::Result<(), PersistenceError> {
        let mut url = self.url(&["values", &format!("{}:append", a1(worksheet, "A1"))]);
        url.query_pairs_mut()
            .append_pair("valueInputOption", "RAW")
            .append_pair("insertDataOption", "INSERT_ROWS");

        let body = json!({ "values": rows });
        self.send(self.client.post(url).json(&body)).await?;
        debug!(worksheet, rows = rows.len(), "Appended rows");
        Ok(())
    }

    async fn read_rows(
        &self,
        worksheet: &str,
    ) -> std::result::Result<Vec<Vec<String>>, PersistenceError> {
        let mut rows = self.read_range(&a1(worksheet, "A:Z")).await?;
        if !rows.is_empty() {
            rows.remove(0);
        }
        Ok(rows)
    }

    async fn health_check(&self) -> std::result::Result<(), PersistenceError> {
        let mut url = self.url(&[]);
        url.query_pairs_mut().append_pair("fields", "spreadsheetId");
        self.send(self.client.get(url)).await.map(|_| ())
    }

    fn describe(&self) -> String {
        format!("google-sheets ({})", self.spreadsheet_id)
    }
}

// Response types

#[derive(Debug, Deserialize)]
struct SpreadsheetMetadata {
    #[serde(default)]
    sheets: Vec<SheetEntry>,
}

#[derive(Debug, Deserialize)]
struct SheetEntry {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<String>>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{body_partial_json, header, method, path, path_regex, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn store_for(server: &MockServer) -> GoogleSheetsStore {
        GoogleSheetsStore::new("sheet123", "ya29.token", Some(&server.uri())).unwrap()
    }

    #[tokio::test]
    async fn test_append_rows_posts_values() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/sheet123/values/.*:append$"))
            .and(query_param("insertDataOption", "INSERT_ROWS"))
            .and(header("authorization", "Bearer ya29.token"))
            .and(body_partial_json(json!({ "values": [["a", "b"], ["c", "d"]] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "updates": {} })))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        let rows = vec![
            vec!["a".to_string(), "b".to_string()],
            vec!["c".to_string(), "d".to_string()],
        ];
        store.append_rows("Brand_Monitoring_New", &rows).await.unwrap();
    }

    #[tokio::test]
    async fn test_status_classification() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/sheet123/values/.*:append$"))
            .respond_with(ResponseTemplate::new(503))
            .up_to_n_times(1)
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path_regex(r"^/sheet123/values/.*:append$"))
            .respond_with(ResponseTemplate::new(403).set_body_string("PERMISSION_DENIED"))
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        let rows = vec![vec!["x".to_string()]];
        let first = store.append_rows("S", &rows).await.unwrap_err();
        assert!(first.is_transient());
        let second = store.append_rows("S", &rows).await.unwrap_err();
        assert!(!second.is_transient());
        assert!(second.message.contains("403"));
    }

    #[tokio::test]
    async fn test_ensure_worksheet_creates_sheet_and_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/sheet123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "sheets": [{ "properties": { "title": "Sheet1" } }]
            })))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/sheet123:batchUpdate"))
            .and(body_partial_json(json!({
                "requests": [{ "addSheet": { "properties": { "title": "Results" } } }]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/sheet123/values/.*1:1$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "range": "Results!1:1" })))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .and(path_regex(r"^/sheet123/values/.*A1$"))
            .and(query_param("valueInputOption", "RAW"))
            .and(body_partial_json(json!({ "values": [["timestamp", "query"]] })))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({})))
            .expect(1)
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        store
            .ensure_worksheet("Results", &["timestamp", "query"])
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_read_rows_skips_header() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path_regex(r"^/sheet123/values/.*A:Z$"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "values": [["timestamp", "query"], ["2026-01-01T00:00:00.000Z", "q"]]
            })))
            .mount(&server)
            .await;

        let store = store_for(&server).await;
        let rows = store.read_rows("Results").await.unwrap();
        assert_eq!(rows, vec![vec!["2026-01-01T00:00:00.000Z".to_string(), "q".to_string()]]);
    }

    #[test]
    fn test_a1_quotes_names() {
        assert_eq!(a1("Brand_Monitoring_New", "A1"), "'Brand_Monitoring_New'!A1");
        assert_eq!(a1("Bob's", "1:1"), "'Bob''s'!1:1");
    }
}
