//! External API sync
//!
//! Pulls appointments from the upstream scheduling API: authenticate, page
//! through a date window, map remote records, upsert. One logical sync runs
//! as a sequential chain of bounded batches driven by
//! [`orchestrator::SyncOrchestrator`].

pub mod client;
pub mod orchestrator;
pub mod remote;

pub use client::{DateWindow, SyncApiConfig, SyncClient};
pub use orchestrator::SyncOrchestrator;

use thiserror::Error;

use super::store::StoreError;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error(
        "API sync is not configured; set APPOINTMENTS_API_LOGIN_URL and APPOINTMENTS_API_URL"
    )]
    NotConfigured,

    #[error("Invalid sync window: {0}")]
    Window(String),

    #[error("API login failed: {0}")]
    Auth(String),

    #[error("API data fetch failed (page {page}): {message}")]
    Fetch { page: u32, message: String },

    #[error(transparent)]
    Store(#[from] StoreError),
}
