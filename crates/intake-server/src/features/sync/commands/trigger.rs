//! Trigger sync command
//!
//! Validates configuration up front (missing endpoints or a misordered
//! date window fail here, before any work starts), then publishes the
//! initial progress state and detaches the chain. Re-triggering while a
//! chain is live is rejected rather than double-started.

use mediator::Request;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::features::IngestState;
use crate::ingest::sync::{SyncClient, SyncError, SyncOrchestrator};
use crate::ingest::IngestKind;

/// Command to start a sync chain
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct TriggerSyncCommand {
    /// Resume page; defaults to the beginning
    #[serde(default)]
    pub start_page: Option<u32>,
}

#[derive(Debug, Clone, Serialize)]
pub struct TriggerSyncResponse {
    pub run_id: Uuid,
    pub message: String,
}

#[derive(Debug, thiserror::Error)]
pub enum TriggerSyncError {
    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error("A sync is already running; wait for it to finish")]
    AlreadyRunning,
}

impl Request<Result<TriggerSyncResponse, TriggerSyncError>> for TriggerSyncCommand {}

#[tracing::instrument(skip(state, command))]
pub async fn handle(
    state: &IngestState,
    command: TriggerSyncCommand,
) -> Result<TriggerSyncResponse, TriggerSyncError> {
    let config = state
        .sync_config
        .clone()
        .ok_or(SyncError::NotConfigured)?;

    // Fatal configuration problems surface before anything is enqueued.
    let window = config.resolve_window()?;

    if state.progress.is_running(IngestKind::ApiSync).await {
        return Err(TriggerSyncError::AlreadyRunning);
    }

    let start_page = command.start_page.unwrap_or(1).max(1);
    let run_id = state.progress.begin(IngestKind::ApiSync).await;
    state
        .progress
        .update(run_id, |p| p.cursor = Some(start_page as u64))
        .await;

    SyncOrchestrator::new(
        state.store.clone(),
        SyncClient::new(config),
        state.progress.clone(),
    )
    .spawn(run_id, window, start_page);

    tracing::info!(run_id = %run_id, start_page, "sync chain enqueued");

    Ok(TriggerSyncResponse {
        run_id,
        message: "Sync started — batches are being processed in the background.".to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command_defaults() {
        let command: TriggerSyncCommand = serde_json::from_str("{}").unwrap();
        assert_eq!(command.start_page, None);
    }

    #[test]
    fn test_command_resume_page() {
        let command: TriggerSyncCommand =
            serde_json::from_str(r#"{"start_page": 41}"#).unwrap();
        assert_eq!(command.start_page, Some(41));
    }
}
