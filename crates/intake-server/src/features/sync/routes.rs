//! Sync routes

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use super::commands::{trigger, TriggerSyncCommand, TriggerSyncError};
use super::queries::progress;
use crate::api::response::ApiResponse;
use crate::error::AppError;
use crate::features::imports::queries::progress::{
    handle_get, GetRunProgressQuery, ProgressQueryError,
};
use crate::features::IngestState;
use crate::ingest::sync::SyncError;

pub fn sync_routes() -> Router<IngestState> {
    Router::new()
        .route("/", post(trigger_sync))
        .route("/progress", get(sync_progress))
        .route("/progress/:run_id", get(sync_run_progress))
}

/// Kick off a sync chain.
///
/// POST /sync
async fn trigger_sync(
    State(state): State<IngestState>,
    command: Option<Json<TriggerSyncCommand>>,
) -> Result<Response, AppError> {
    let command = command.map(|Json(c)| c).unwrap_or_default();

    let response = trigger::handle(&state, command).await.map_err(|e| match e {
        TriggerSyncError::AlreadyRunning => AppError::Conflict(e.to_string()),
        TriggerSyncError::Sync(SyncError::NotConfigured)
        | TriggerSyncError::Sync(SyncError::Window(_)) => AppError::Validation(e.to_string()),
        TriggerSyncError::Sync(other) => AppError::Internal(other.to_string()),
    })?;

    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(response))).into_response())
}

/// Current sync progress, polled by the dashboard.
///
/// GET /sync/progress
async fn sync_progress(State(state): State<IngestState>) -> Response {
    let snapshot = progress::handle_current(&state.progress).await;
    Json(snapshot).into_response()
}

/// One specific sync run.
///
/// GET /sync/progress/:run_id
async fn sync_run_progress(
    State(state): State<IngestState>,
    Path(run_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let progress_state = handle_get(&state.progress, GetRunProgressQuery { run_id })
        .await
        .map_err(|e| match e {
            ProgressQueryError::NotFound(_) => AppError::NotFound(e.to_string()),
        })?;

    Ok(Json(progress_state).into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_build() {
        let _router = sync_routes();
    }
}
