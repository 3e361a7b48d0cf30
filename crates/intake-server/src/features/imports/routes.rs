//! Import routes

use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use uuid::Uuid;

use super::commands::{
    confirm, preview, start, ConfirmImportCommand, ConfirmImportError, PreviewImportCommand,
    PreviewImportError, StartImportCommand, StartImportError,
};
use super::queries::progress::{self, GetRunProgressQuery, ProgressQueryError};
use crate::api::response::ApiResponse;
use crate::error::AppError;
use crate::features::IngestState;
use crate::ingest::staging::StagingError;
use crate::ingest::{IngestKind, SourceLayout};

/// Create import routes. `max_body_bytes` must admit the largest allowed
/// upload plus multipart overhead.
pub fn import_routes(max_body_bytes: usize) -> Router<IngestState> {
    Router::new()
        .route("/", post(direct_import))
        .route("/preview", post(preview_import))
        .route("/confirm", post(confirm_import))
        .layer(DefaultBodyLimit::max(max_body_bytes + 64 * 1024))
        .route("/progress", get(import_progress))
        .route("/progress/:run_id", get(import_run_progress))
}

/// Parsed multipart upload: file bytes plus the optional layout field
struct UploadParts {
    content: Vec<u8>,
    layout: SourceLayout,
}

async fn read_upload(mut multipart: Multipart) -> Result<UploadParts, AppError> {
    let mut content: Option<Vec<u8>> = None;
    let mut layout = SourceLayout::default();

    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| AppError::Validation(format!("Failed to read multipart field: {e}")))?
    {
        match field.name().unwrap_or("") {
            "file" => {
                let data = field
                    .bytes()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read file bytes: {e}")))?;
                content = Some(data.to_vec());
            }
            "layout" => {
                let raw = field
                    .text()
                    .await
                    .map_err(|e| AppError::Validation(format!("Failed to read layout field: {e}")))?;
                layout = raw
                    .parse()
                    .map_err(|e: String| AppError::Validation(e))?;
            }
            _ => {}
        }
    }

    let content =
        content.ok_or_else(|| AppError::Validation("No file field in upload".to_string()))?;

    Ok(UploadParts { content, layout })
}

/// Preview an upload: classify rows without committing.
///
/// POST /imports/preview (multipart: file, layout?)
async fn preview_import(
    State(state): State<IngestState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let upload = read_upload(multipart).await?;

    let command = PreviewImportCommand {
        content: upload.content,
        layout: upload.layout,
    };

    let response = preview::handle(state.store.as_ref(), &state.staging, command)
        .await
        .map_err(preview_error)?;

    Ok((StatusCode::OK, Json(ApiResponse::success(response))).into_response())
}

/// Commit a previewed file.
///
/// POST /imports/confirm {"staged_file": "...", "mode": "new_only"}
async fn confirm_import(
    State(state): State<IngestState>,
    Json(command): Json<ConfirmImportCommand>,
) -> Result<Response, AppError> {
    let response = confirm::handle(&state, command).await.map_err(|e| match e {
        ConfirmImportError::BadHandle(source) => AppError::Validation(source.to_string()),
        missing @ ConfirmImportError::FileMissing => AppError::Validation(missing.to_string()),
    })?;

    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(response))).into_response())
}

/// Direct commit, no preview step.
///
/// POST /imports (multipart: file, layout?)
async fn direct_import(
    State(state): State<IngestState>,
    multipart: Multipart,
) -> Result<Response, AppError> {
    let upload = read_upload(multipart).await?;

    let command = StartImportCommand {
        content: upload.content,
        layout: upload.layout,
    };

    let response = start::handle(&state, command).await.map_err(|e| match e {
        StartImportError::Staging(source) => staging_error(source),
    })?;

    Ok((StatusCode::ACCEPTED, Json(ApiResponse::success(response))).into_response())
}

/// Current import progress, polled by the dashboard.
///
/// GET /imports/progress
async fn import_progress(State(state): State<IngestState>) -> Response {
    let snapshot = progress::handle_current(&state.progress, IngestKind::FileImport).await;
    Json(snapshot).into_response()
}

/// One specific import run.
///
/// GET /imports/progress/:run_id
async fn import_run_progress(
    State(state): State<IngestState>,
    Path(run_id): Path<Uuid>,
) -> Result<Response, AppError> {
    let state = progress::handle_get(&state.progress, GetRunProgressQuery { run_id })
        .await
        .map_err(|e| match e {
            ProgressQueryError::NotFound(_) => AppError::NotFound(e.to_string()),
        })?;

    Ok(Json(state).into_response())
}

fn preview_error(error: PreviewImportError) -> AppError {
    match error {
        PreviewImportError::ContentRequired | PreviewImportError::Csv(_) => {
            AppError::Validation(error.to_string())
        }
        PreviewImportError::Staging(source) => staging_error(source),
        PreviewImportError::Store(source) => AppError::Internal(source.to_string()),
    }
}

fn staging_error(error: StagingError) -> AppError {
    match error {
        StagingError::TooLarge { .. }
        | StagingError::Empty
        | StagingError::InvalidHandle(_)
        | StagingError::NotFound(_) => AppError::Validation(error.to_string()),
        StagingError::Io(e) => AppError::Io(e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_routes_build() {
        let _router = import_routes(1024);
    }
}
