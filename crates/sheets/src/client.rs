//! Google Sheets v4 HTTP client.
//!
//! Blocking reqwest client (no Tokio runtime required).
//! Reads retry on network errors, 429 and 5xx with exponential backoff.
//! Writes are sent once; the engine decides what a rejected write means.

use std::thread;
use std::time::Duration;

use serde::de::DeserializeOwned;
use serde::Deserialize;
use url::Url;

pub const DEFAULT_API_BASE: &str = "https://sheets.googleapis.com";

const MAX_RETRIES: u32 = 3;
const USER_AGENT: &str = concat!("autoreply/", env!("CARGO_PKG_VERSION"));

/// Error type for Sheets operations.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SheetsError {
    /// No access token configured
    NotAuthenticated,
    /// Connection, TLS or timeout failure
    Network(String),
    /// Non-success status with the API's error message
    Http(u16, String),
    /// Response or URL could not be interpreted
    Parse(String),
    /// Spreadsheet has no sheets to read
    NoSheets,
}

impl std::fmt::Display for SheetsError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SheetsError::NotAuthenticated => {
                write!(f, "Not authenticated: no Sheets access token configured")
            }
            SheetsError::Network(msg) => write!(f, "Network error: {}", msg),
            SheetsError::Http(code, msg) => write!(f, "HTTP {}: {}", code, msg),
            SheetsError::Parse(msg) => write!(f, "Parse error: {}", msg),
            SheetsError::NoSheets => write!(f, "Spreadsheet contains no sheets"),
        }
    }
}

impl std::error::Error for SheetsError {}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct SpreadsheetMeta {
    #[serde(default)]
    sheets: Vec<SheetMeta>,
}

#[derive(Debug, Deserialize)]
struct SheetMeta {
    properties: SheetProperties,
}

#[derive(Debug, Deserialize)]
struct SheetProperties {
    title: String,
}

/// `values` is omitted entirely for an empty range.
#[derive(Debug, Deserialize)]
struct ValueRange {
    #[serde(default)]
    values: Vec<Vec<serde_json::Value>>,
}

fn cell_text(value: serde_json::Value) -> String {
    match value {
        serde_json::Value::String(s) => s,
        serde_json::Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Pull `error.message` out of a Google API error body.
fn error_message(body: &str, status: u16) -> String {
    serde_json::from_str::<serde_json::Value>(body)
        .ok()
        .and_then(|v| v["error"]["message"].as_str().map(String::from))
        .unwrap_or_else(|| {
            if body.trim().is_empty() {
                format!("status {}", status)
            } else {
                body.trim().to_string()
            }
        })
}

// ── Client ──────────────────────────────────────────────────────────

/// Sheets API client bound to one spreadsheet (blocking).
#[derive(Clone)]
pub struct SheetsClient {
    http: reqwest::blocking::Client,
    api_base: String,
    spreadsheet_id: String,
    token: String,
    backoff: Duration,
}

impl SheetsClient {
    pub fn new(
        api_base: &str,
        spreadsheet_id: &str,
        token: &str,
        timeout: Duration,
    ) -> Result<Self, SheetsError> {
        if token.trim().is_empty() {
            return Err(SheetsError::NotAuthenticated);
        }

        let http = reqwest::blocking::Client::builder()
            .user_agent(USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| SheetsError::Network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self {
            http,
            api_base: api_base.trim_end_matches('/').to_string(),
            spreadsheet_id: spreadsheet_id.to_string(),
            token: token.trim().to_string(),
            backoff: Duration::from_secs(1),
        })
    }

    /// Initial retry delay, doubled per attempt.
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    pub fn spreadsheet_id(&self) -> &str {
        &self.spreadsheet_id
    }

    /// Title of the first sheet (tab) in the spreadsheet.
    pub fn first_sheet_title(&self) -> Result<String, SheetsError> {
        let url = self.url(&[], &[("fields", "sheets.properties.title")])?;
        let meta: SpreadsheetMeta = self.get_json(url)?;
        meta.sheets
            .into_iter()
            .next()
            .map(|s| s.properties.title)
            .ok_or(SheetsError::NoSheets)
    }

    /// All values in an A1 range, row-major. Rows are ragged as the API
    /// returns them (trailing empty cells omitted).
    pub fn get_values(&self, range: &str) -> Result<Vec<Vec<String>>, SheetsError> {
        let url = self.url(&["values", range], &[])?;
        let body: ValueRange = self.get_json(url)?;
        Ok(body
            .values
            .into_iter()
            .map(|row| row.into_iter().map(cell_text).collect())
            .collect())
    }

    /// Overwrite an A1 range with raw (unparsed) values.
    pub fn update_values(&self, range: &str, values: &[Vec<String>]) -> Result<(), SheetsError> {
        let url = self.url(&["values", range], &[("valueInputOption", "RAW")])?;
        let body = serde_json::json!({
            "range": range,
            "majorDimension": "ROWS",
            "values": values,
        });

        let response = self
            .http
            .put(url)
            .bearer_auth(&self.token)
            .json(&body)
            .send()
            .map_err(|e| SheetsError::Network(e.to_string()))?;

        let status = response.status().as_u16();
        if !response.status().is_success() {
            let text = response.text().unwrap_or_default();
            return Err(SheetsError::Http(status, error_message(&text, status)));
        }
        Ok(())
    }

    // ── Internal helpers ────────────────────────────────────────────

    /// `{api_base}/v4/spreadsheets/{id}/{segments...}?{query}`. Segments
    /// are percent-encoded, so sheet names may contain spaces and `/`.
    fn url(&self, segments: &[&str], query: &[(&str, &str)]) -> Result<Url, SheetsError> {
        let mut url = Url::parse(&self.api_base)
            .map_err(|e| SheetsError::Parse(format!("invalid API base {:?}: {}", self.api_base, e)))?;
        {
            let mut path = url
                .path_segments_mut()
                .map_err(|_| SheetsError::Parse(format!("API base {:?} cannot hold a path", self.api_base)))?;
            path.pop_if_empty()
                .extend(["v4", "spreadsheets", self.spreadsheet_id.as_str()])
                .extend(segments);
        }
        if !query.is_empty() {
            url.query_pairs_mut().extend_pairs(query);
        }
        Ok(url)
    }

    fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T, SheetsError> {
        let mut backoff = self.backoff;
        let mut attempt = 0;

        loop {
            let response = match self.http.get(url.clone()).bearer_auth(&self.token).send() {
                Ok(response) => response,
                Err(e) if attempt < MAX_RETRIES => {
                    attempt += 1;
                    log::warn!(
                        "sheets read retry {}/{} in {:?} ({})",
                        attempt,
                        MAX_RETRIES,
                        backoff,
                        e,
                    );
                    thread::sleep(backoff);
                    backoff *= 2;
                    continue;
                }
                Err(e) => return Err(SheetsError::Network(e.to_string())),
            };

            let status = response.status().as_u16();

            // Retryable: 429, 5xx
            if (status == 429 || status >= 500) && attempt < MAX_RETRIES {
                attempt += 1;
                let wait = if status == 429 {
                    response
                        .headers()
                        .get("retry-after")
                        .and_then(|v| v.to_str().ok())
                        .and_then(|v| v.trim().parse::<u64>().ok())
                        .map(Duration::from_secs)
                        .unwrap_or(backoff)
                } else {
                    backoff
                };

                log::warn!(
                    "sheets read retry {}/{} in {:?} (HTTP {})",
                    attempt,
                    MAX_RETRIES,
                    wait,
                    status,
                );
                thread::sleep(wait);
                backoff *= 2;
                continue;
            }

            if !response.status().is_success() {
                let text = response.text().unwrap_or_default();
                return Err(SheetsError::Http(status, error_message(&text, status)));
            }

            return response.json::<T>().map_err(|e| SheetsError::Parse(e.to_string()));
        }
    }
}
