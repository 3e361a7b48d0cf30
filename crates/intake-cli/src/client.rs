//! HTTP API client for the Intake server

use reqwest::multipart::{Form, Part};
use reqwest::Client;
use serde_json::{json, Value};
use std::path::Path;
use std::time::Duration;

use crate::{CliError, Result, StatusKind};

/// Default timeout for API requests in seconds. Generous: a preview of a
/// large upload parses the whole file server-side before responding.
pub const DEFAULT_API_TIMEOUT_SECS: u64 = 300;

/// Default Intake server URL when not specified via environment variable.
pub const DEFAULT_SERVER_URL: &str = "http://localhost:8000";

/// API client for the Intake server
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    /// Create a new API client
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let timeout_secs = std::env::var("INTAKE_API_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(DEFAULT_API_TIMEOUT_SECS);

        let client = Client::builder()
            .timeout(Duration::from_secs(timeout_secs))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    /// Check server health
    pub async fn health_check(&self) -> bool {
        let url = format!("{}/health", self.base_url);
        match self.client.get(&url).send().await {
            Ok(response) => response.status().is_success(),
            Err(_) => false,
        }
    }

    /// Trigger a sync chain; returns the server's response body.
    pub async fn trigger_sync(&self, start_page: Option<u32>) -> Result<Value> {
        let url = format!("{}/api/v1/sync", self.base_url);
        let body = match start_page {
            Some(page) => json!({ "start_page": page }),
            None => json!({}),
        };

        let response = self.client.post(&url).json(&body).send().await?;
        read_body(response).await
    }

    /// Upload a CSV for preview; returns the classification plus handle.
    pub async fn preview_import(&self, file: &Path, layout: Option<&str>) -> Result<Value> {
        let url = format!("{}/api/v1/imports/preview", self.base_url);
        let form = upload_form(file, layout).await?;

        let response = self.client.post(&url).multipart(form).send().await?;
        read_body(response).await
    }

    /// Upload a CSV for direct commit.
    pub async fn direct_import(&self, file: &Path, layout: Option<&str>) -> Result<Value> {
        let url = format!("{}/api/v1/imports", self.base_url);
        let form = upload_form(file, layout).await?;

        let response = self.client.post(&url).multipart(form).send().await?;
        read_body(response).await
    }

    /// Confirm a previously previewed file.
    pub async fn confirm_import(&self, staged_file: &str, mode: &str) -> Result<Value> {
        let url = format!("{}/api/v1/imports/confirm", self.base_url);
        let body = json!({ "staged_file": staged_file, "mode": mode });

        let response = self.client.post(&url).json(&body).send().await?;
        read_body(response).await
    }

    /// Poll current progress for one ingestion kind.
    pub async fn progress(&self, kind: StatusKind) -> Result<Value> {
        let path = match kind {
            StatusKind::Import => "imports",
            StatusKind::Sync => "sync",
        };
        let url = format!("{}/api/v1/{}/progress", self.base_url, path);

        let response = self.client.get(&url).send().await?;
        read_body(response).await
    }
}

async fn upload_form(file: &Path, layout: Option<&str>) -> Result<Form> {
    let content = tokio::fs::read(file).await?;
    let filename = file
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "import.csv".to_string());

    let mut form = Form::new().part("file", Part::bytes(content).file_name(filename));
    if let Some(layout) = layout {
        form = form.text("layout", layout.to_string());
    }
    Ok(form)
}

async fn read_body(response: reqwest::Response) -> Result<Value> {
    let status = response.status();
    let body: Value = response
        .json()
        .await
        .unwrap_or_else(|_| json!({"error": {"message": "unreadable response"}}));

    if !status.is_success() {
        let message = body
            .pointer("/error/message")
            .and_then(Value::as_str)
            .unwrap_or("request failed");
        return Err(CliError::api(format!("HTTP {status}: {message}")));
    }

    Ok(body)
}
