//! Preview import command
//!
//! Parses an uploaded CSV without committing anything, classifies every row
//! against the store (new / update / skip), and stages the file so a later
//! confirm can re-read it without re-upload. Read-only with respect to the
//! canonical store; safe to repeat.

use mediator::Request;
use serde::{Deserialize, Serialize};

use crate::ingest::diff::{self, DiffReport};
use crate::ingest::normalize::Normalizer;
use crate::ingest::record::AppointmentRecord;
use crate::ingest::staging::{StagedFiles, StagingError};
use crate::ingest::store::{AppointmentStore, StoreError};
use crate::ingest::SourceLayout;

/// Command to preview an uploaded import file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PreviewImportCommand {
    /// Raw CSV bytes from the multipart upload
    #[serde(skip)]
    pub content: Vec<u8>,
    /// Column layout the file is in
    #[serde(default)]
    pub layout: SourceLayout,
}

/// Classified preview plus the handle for the confirm step
#[derive(Debug, Clone, Serialize)]
pub struct PreviewImportResponse {
    /// Handle to the staged file; absent when the file had no usable rows
    pub staged_file: Option<String>,
    #[serde(flatten)]
    pub report: DiffReport,
    /// Rows dropped by the normalizer (blank identity, bad date)
    pub rejected_rows: u64,
}

#[derive(Debug, thiserror::Error)]
pub enum PreviewImportError {
    #[error("Uploaded file is required and cannot be empty")]
    ContentRequired,

    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),

    #[error(transparent)]
    Staging(#[from] StagingError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

impl Request<Result<PreviewImportResponse, PreviewImportError>> for PreviewImportCommand {}

impl PreviewImportCommand {
    pub fn validate(&self) -> Result<(), PreviewImportError> {
        if self.content.is_empty() {
            return Err(PreviewImportError::ContentRequired);
        }
        Ok(())
    }
}

#[tracing::instrument(skip(store, staging, command), fields(bytes = command.content.len(), layout = %command.layout))]
pub async fn handle(
    store: &dyn AppointmentStore,
    staging: &StagedFiles,
    command: PreviewImportCommand,
) -> Result<PreviewImportResponse, PreviewImportError> {
    command.validate()?;

    let normalizer = Normalizer::new(command.layout);
    let mut candidates: Vec<AppointmentRecord> = Vec::new();
    let mut rejected_rows = 0u64;

    let mut reader = csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .from_reader(command.content.as_slice());

    for row in reader.records() {
        let row = row?;
        let cells: Vec<String> = row.iter().map(str::to_string).collect();
        match normalizer.normalize(&cells) {
            Ok(record) => candidates.push(record),
            Err(_) => rejected_rows += 1,
        }
    }

    if candidates.is_empty() {
        return Ok(PreviewImportResponse {
            staged_file: None,
            report: DiffReport::default(),
            rejected_rows,
        });
    }

    let report = diff::preview(store, candidates).await?;

    // Stage last: a failed preview leaves nothing behind on disk.
    let staged = staging.stage(&command.content).await?;

    tracing::info!(
        staged_file = %staged,
        new = report.new_records.len(),
        updates = report.update_records.len(),
        skips = report.skip_count,
        rejected = rejected_rows,
        "import previewed"
    );

    Ok(PreviewImportResponse {
        staged_file: Some(staged.to_string()),
        report,
        rejected_rows,
    })
}
