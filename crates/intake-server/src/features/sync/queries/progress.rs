//! Sync progress query
//!
//! Same polling contract as the import side, over the sync kind. The
//! run-lookup and idle semantics are shared with the import queries.

use crate::features::imports::queries::progress::ProgressSnapshot;
use crate::ingest::{IngestKind, ProgressTracker};

/// Latest sync run; idle when absent or expired.
pub async fn handle_current(progress: &ProgressTracker) -> ProgressSnapshot {
    ProgressSnapshot::from_state(progress.current(IngestKind::ApiSync).await)
}
