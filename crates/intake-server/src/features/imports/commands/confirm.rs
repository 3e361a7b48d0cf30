//! Confirm import command
//!
//! Takes the staged-file handle a preview returned plus a mode, and
//! launches the background import run. The preview's classification is not
//! reused; the filtered modes re-check against the live store chunk by
//! chunk.

use mediator::Request;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::features::IngestState;
use crate::ingest::import::{ImportMode, ImportOrchestrator};
use crate::ingest::staging::{StagedFileId, StagingError};
use crate::ingest::{IngestKind, SourceLayout};

/// Command to commit a previously previewed file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmImportCommand {
    /// Handle returned by the preview endpoint
    pub staged_file: String,
    #[serde(default)]
    pub mode: ImportMode,
    #[serde(default)]
    pub layout: SourceLayout,
}

#[derive(Debug, Clone, Serialize)]
pub struct ConfirmImportResponse {
    pub run_id: Uuid,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum ConfirmImportError {
    #[error(transparent)]
    BadHandle(#[from] StagingError),

    #[error("File not found. Please upload again.")]
    FileMissing,
}

impl Request<Result<ConfirmImportResponse, ConfirmImportError>> for ConfirmImportCommand {}

#[tracing::instrument(skip(state, command), fields(staged_file = %command.staged_file, mode = ?command.mode))]
pub async fn handle(
    state: &IngestState,
    command: ConfirmImportCommand,
) -> Result<ConfirmImportResponse, ConfirmImportError> {
    let staged: StagedFileId = command.staged_file.parse()?;

    if !state.staging.exists(staged).await {
        return Err(ConfirmImportError::FileMissing);
    }

    let run_id = state.progress.begin(IngestKind::FileImport).await;

    ImportOrchestrator::new(
        state.store.clone(),
        state.staging.clone(),
        state.progress.clone(),
        state.import_config.clone(),
    )
    .spawn(run_id, staged, command.mode, command.layout);

    tracing::info!(run_id = %run_id, "import run enqueued");

    Ok(ConfirmImportResponse {
        run_id,
        message: "Import started — records are being processed in the background.".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_deserializes_with_defaults() {
        let command: ConfirmImportCommand =
            serde_json::from_str(r#"{"staged_file": "abc"}"#).unwrap();
        assert_eq!(command.mode, ImportMode::All);
        assert_eq!(command.layout, SourceLayout::Auth20);
    }

    #[test]
    fn test_command_deserializes_mode() {
        let command: ConfirmImportCommand = serde_json::from_str(
            r#"{"staged_file": "abc", "mode": "updates_only", "layout": "standard-16"}"#,
        )
        .unwrap();
        assert_eq!(command.mode, ImportMode::UpdatesOnly);
        assert_eq!(command.layout, SourceLayout::Standard16);
    }
}
