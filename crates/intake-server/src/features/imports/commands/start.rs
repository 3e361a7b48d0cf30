//! Direct import command
//!
//! The non-interactive path: stage the upload and launch the run in one
//! step, no preview, mode `all`.

use mediator::Request;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::features::IngestState;
use crate::ingest::import::{ImportMode, ImportOrchestrator};
use crate::ingest::staging::StagingError;
use crate::ingest::{IngestKind, SourceLayout};

/// Command to import an uploaded file without previewing
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StartImportCommand {
    #[serde(skip)]
    pub content: Vec<u8>,
    #[serde(default)]
    pub layout: SourceLayout,
}

#[derive(Debug, Clone, Serialize)]
pub struct StartImportResponse {
    pub run_id: Uuid,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum StartImportError {
    #[error(transparent)]
    Staging(#[from] StagingError),
}

impl Request<Result<StartImportResponse, StartImportError>> for StartImportCommand {}

#[tracing::instrument(skip(state, command), fields(bytes = command.content.len(), layout = %command.layout))]
pub async fn handle(
    state: &IngestState,
    command: StartImportCommand,
) -> Result<StartImportResponse, StartImportError> {
    let staged = state.staging.stage(&command.content).await?;
    let run_id = state.progress.begin(IngestKind::FileImport).await;

    ImportOrchestrator::new(
        state.store.clone(),
        state.staging.clone(),
        state.progress.clone(),
        state.import_config.clone(),
    )
    .spawn(run_id, staged, ImportMode::All, command.layout);

    tracing::info!(run_id = %run_id, staged_file = %staged, "direct import enqueued");

    Ok(StartImportResponse {
        run_id,
        message: "Import started — records are being processed in the background.".to_string(),
    })
}
