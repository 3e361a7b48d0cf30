//! External appointments API client
//!
//! The upstream is loosely specified: the login response carries the bearer
//! token under one of several keys (bare or nested under `data`), and the
//! data endpoint returns its rows under `docs`, `data`, or as a bare array.
//! The extractors here accept all observed shapes.
//!
//! Page fetches retry with exponential backoff on transient failures
//! (network errors, 429, 5xx). Authentication never retries; a rejected
//! login fails the batch outright.

use chrono::NaiveDate;
use serde_json::{json, Value};
use std::time::Duration;

use super::SyncError;

/// Start of the first sync window ever run against the upstream.
const DEFAULT_WINDOW_START: &str = "2026-01-01";

/// Records per API page.
pub const DEFAULT_PER_PAGE: u32 = 100;

/// Pages fetched per chain batch.
pub const DEFAULT_PAGES_PER_BATCH: u32 = 20;

/// Rows per bulk upsert during a sync batch.
pub const DEFAULT_UPSERT_CHUNK: usize = 500;

#[derive(Debug, Clone)]
pub struct SyncApiConfig {
    pub login_url: String,
    pub data_url: String,
    pub username: String,
    pub password: String,
    /// `YYYY-MM-DD`; defaults to the fixed window start
    pub from_date: Option<String>,
    /// `YYYY-MM-DD`; defaults to today
    pub to_date: Option<String>,
    pub pages_per_batch: u32,
    pub per_page: u32,
    pub upsert_chunk: usize,
    /// Attempts per page fetch before the batch fails
    pub fetch_attempts: u32,
    /// Base backoff; doubles per attempt
    pub retry_delay: Duration,
}

impl SyncApiConfig {
    pub fn new(
        login_url: impl Into<String>,
        data_url: impl Into<String>,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            login_url: login_url.into(),
            data_url: data_url.into(),
            username: username.into(),
            password: password.into(),
            from_date: None,
            to_date: None,
            pages_per_batch: DEFAULT_PAGES_PER_BATCH,
            per_page: DEFAULT_PER_PAGE,
            upsert_chunk: DEFAULT_UPSERT_CHUNK,
            fetch_attempts: 3,
            retry_delay: Duration::from_secs(2),
        }
    }

    /// Resolve the `[from, to]` window, applying defaults and validating
    /// ordering. A misordered or malformed window is a configuration error
    /// surfaced before any work starts.
    pub fn resolve_window(&self) -> Result<DateWindow, SyncError> {
        let from = parse_window_date(self.from_date.as_deref(), DEFAULT_WINDOW_START)?;
        let to = match self.to_date.as_deref().map(str::trim).filter(|s| !s.is_empty()) {
            Some(raw) => parse_date(raw)?,
            None => chrono::Utc::now().date_naive(),
        };

        if from > to {
            return Err(SyncError::Window(format!(
                "from date {from} cannot be after to date {to}"
            )));
        }

        Ok(DateWindow { from, to })
    }
}

fn parse_window_date(configured: Option<&str>, default: &str) -> Result<NaiveDate, SyncError> {
    match configured.map(str::trim).filter(|s| !s.is_empty()) {
        Some(raw) => parse_date(raw),
        None => parse_date(default),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, SyncError> {
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .map_err(|e| SyncError::Window(format!("bad date {raw:?}: {e}")))
}

/// Resolved sync window
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DateWindow {
    pub from: NaiveDate,
    pub to: NaiveDate,
}

enum FetchFailure {
    Transient(String),
    Fatal(String),
}

/// HTTP client over the upstream API
#[derive(Clone)]
pub struct SyncClient {
    http: reqwest::Client,
    config: SyncApiConfig,
}

impl SyncClient {
    pub fn new(config: SyncApiConfig) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_default();
        Self { http, config }
    }

    pub fn config(&self) -> &SyncApiConfig {
        &self.config
    }

    /// POST credentials, return the bearer token. Not retried.
    pub async fn authenticate(&self) -> Result<String, SyncError> {
        let response = self
            .http
            .post(&self.config.login_url)
            .json(&json!({
                "username": self.config.username,
                "password": self.config.password,
            }))
            .send()
            .await
            .map_err(|e| SyncError::Auth(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(SyncError::Auth(format!("HTTP {status} — {body}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| SyncError::Auth(format!("unreadable login response: {e}")))?;

        extract_token(&body).ok_or_else(|| {
            SyncError::Auth(format!(
                "login succeeded but no token was found in the response: {body}"
            ))
        })
    }

    /// Fetch one page of rows, retrying transient failures with backoff.
    pub async fn fetch_page(
        &self,
        token: &str,
        page: u32,
        window: &DateWindow,
    ) -> Result<Vec<Value>, SyncError> {
        let mut attempt = 1u32;
        loop {
            match self.fetch_page_once(token, page, window).await {
                Ok(rows) => return Ok(rows),
                Err(FetchFailure::Transient(message))
                    if attempt < self.config.fetch_attempts =>
                {
                    let delay = self.config.retry_delay * 2u32.pow(attempt - 1);
                    tracing::warn!(
                        page,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        message,
                        "page fetch failed, backing off"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
                Err(FetchFailure::Transient(message)) | Err(FetchFailure::Fatal(message)) => {
                    return Err(SyncError::Fetch { page, message });
                }
            }
        }
    }

    async fn fetch_page_once(
        &self,
        token: &str,
        page: u32,
        window: &DateWindow,
    ) -> Result<Vec<Value>, FetchFailure> {
        let response = self
            .http
            .get(&self.config.data_url)
            .bearer_auth(token)
            .query(&[
                ("from", window.from.format("%Y-%m-%d").to_string()),
                ("to", window.to.format("%Y-%m-%d").to_string()),
                ("page", page.to_string()),
                ("per_page", self.config.per_page.to_string()),
            ])
            .send()
            .await
            .map_err(|e| FetchFailure::Transient(e.to_string()))?;

        let status = response.status();
        if status.as_u16() == 429 || status.is_server_error() {
            return Err(FetchFailure::Transient(format!("HTTP {status}")));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(FetchFailure::Fatal(format!("HTTP {status} — {body}")));
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| FetchFailure::Fatal(format!("unreadable page body: {e}")))?;

        Ok(extract_rows(&body))
    }
}

const TOKEN_KEYS: &[&str] = &["accessToken", "access_token", "token"];

/// Accept the token wherever the upstream put it this release.
pub(crate) fn extract_token(body: &Value) -> Option<String> {
    let candidates = std::iter::once(body).chain(body.get("data"));
    for value in candidates {
        for key in TOKEN_KEYS {
            if let Some(token) = value.get(key).and_then(Value::as_str) {
                if !token.is_empty() {
                    return Some(token.to_string());
                }
            }
        }
    }
    None
}

/// Rows live under `docs`, `data`, or the body is the array itself.
pub(crate) fn extract_rows(body: &Value) -> Vec<Value> {
    for key in ["docs", "data"] {
        if let Some(rows) = body.get(key).and_then(Value::as_array) {
            return rows.clone();
        }
    }
    body.as_array().cloned().unwrap_or_default()
}
