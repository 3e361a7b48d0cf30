//! Feature modules implementing the Intake API
//!
//! Each feature is a vertical slice with its own commands, queries, and
//! routes. Commands and queries implement the mediator `Request` trait and
//! are handled by standalone async functions.
//!
//! - **imports**: CSV upload preview/confirm/direct-commit and progress
//! - **sync**: external-API sync trigger and progress

pub mod imports;
pub mod sync;

use axum::Router;
use std::sync::Arc;

use crate::ingest::import::ImportConfig;
use crate::ingest::staging::StagedFiles;
use crate::ingest::sync::SyncApiConfig;
use crate::ingest::{AppointmentStore, ProgressTracker};

/// Shared state for all feature routes
#[derive(Clone)]
pub struct IngestState {
    /// Canonical appointment store
    pub store: Arc<dyn AppointmentStore>,
    /// Staged upload files
    pub staging: StagedFiles,
    /// Run progress registry
    pub progress: ProgressTracker,
    /// File import tuning
    pub import_config: ImportConfig,
    /// Upstream API endpoints; `None` until configured
    pub sync_config: Option<SyncApiConfig>,
}

/// Creates the API router with all feature routes mounted
pub fn router(state: IngestState) -> Router<()> {
    let max_body = state.staging.max_bytes();
    Router::new()
        .nest(
            "/imports",
            imports::import_routes(max_body).with_state(state.clone()),
        )
        .nest("/sync", sync::sync_routes().with_state(state))
}
