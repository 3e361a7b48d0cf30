//! Ingestion progress tracking
//!
//! One tracker shared by every orchestrator. Runs are keyed by run ID, with
//! a latest-run pointer per ingestion kind for the polling endpoints.
//! Starting a new run of a kind replaces (never merges) what the pointer
//! shows. Entries expire after a bounded TTL and are pruned lazily.

use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Default lifetime of a finished run's progress entry.
pub const DEFAULT_PROGRESS_TTL: Duration = Duration::from_secs(3600);

/// The two ingestion kinds the dashboard polls
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum IngestKind {
    FileImport,
    ApiSync,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RunPhase {
    Running,
    Complete,
    Error,
}

/// Snapshot published after every processed unit
#[derive(Debug, Clone, Serialize)]
pub struct ProgressState {
    pub run_id: Uuid,
    pub state: RunPhase,
    /// Chunk number for imports, batch number for syncs
    pub unit: u64,
    pub imported: u64,
    pub skipped: u64,
    /// Next page for a sync chain; absent for imports
    #[serde(skip_serializing_if = "Option::is_none")]
    pub cursor: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    pub started_at: DateTime<Utc>,
}

struct Entry {
    state: ProgressState,
    touched: Instant,
}

#[derive(Default)]
struct Inner {
    runs: HashMap<Uuid, Entry>,
    latest: HashMap<IngestKind, Uuid>,
}

/// Shared, cloneable progress registry
#[derive(Clone)]
pub struct ProgressTracker {
    inner: Arc<RwLock<Inner>>,
    ttl: Duration,
}

impl ProgressTracker {
    pub fn new(ttl: Duration) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Inner::default())),
            ttl,
        }
    }

    /// Start tracking a new run of the given kind. The kind's latest-run
    /// pointer moves to the new run immediately.
    pub async fn begin(&self, kind: IngestKind) -> Uuid {
        let run_id = Uuid::new_v4();
        let state = ProgressState {
            run_id,
            state: RunPhase::Running,
            unit: 0,
            imported: 0,
            skipped: 0,
            cursor: None,
            error: None,
            started_at: Utc::now(),
        };

        let mut inner = self.inner.write().await;
        prune(&mut inner, self.ttl);
        inner.runs.insert(
            run_id,
            Entry {
                state,
                touched: Instant::now(),
            },
        );
        inner.latest.insert(kind, run_id);
        run_id
    }

    /// Mutate a run's state in place.
    pub async fn update<F>(&self, run_id: Uuid, apply: F)
    where
        F: FnOnce(&mut ProgressState),
    {
        let mut inner = self.inner.write().await;
        if let Some(entry) = inner.runs.get_mut(&run_id) {
            apply(&mut entry.state);
            entry.touched = Instant::now();
        }
    }

    pub async fn complete(&self, run_id: Uuid) {
        self.update(run_id, |state| {
            state.state = RunPhase::Complete;
        })
        .await;
    }

    pub async fn fail(&self, run_id: Uuid, message: String) {
        self.update(run_id, |state| {
            state.state = RunPhase::Error;
            state.error = Some(message);
        })
        .await;
    }

    /// Latest run of a kind, if it hasn't expired.
    pub async fn current(&self, kind: IngestKind) -> Option<ProgressState> {
        let inner = self.inner.read().await;
        let run_id = inner.latest.get(&kind)?;
        let entry = inner.runs.get(run_id)?;
        if entry.touched.elapsed() > self.ttl {
            return None;
        }
        Some(entry.state.clone())
    }

    /// Exact run lookup.
    pub async fn get(&self, run_id: Uuid) -> Option<ProgressState> {
        let inner = self.inner.read().await;
        let entry = inner.runs.get(&run_id)?;
        if entry.touched.elapsed() > self.ttl {
            return None;
        }
        Some(entry.state.clone())
    }

    /// Whether the latest run of a kind is still in flight.
    pub async fn is_running(&self, kind: IngestKind) -> bool {
        matches!(
            self.current(kind).await,
            Some(ProgressState {
                state: RunPhase::Running,
                ..
            })
        )
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new(DEFAULT_PROGRESS_TTL)
    }
}

fn prune(inner: &mut Inner, ttl: Duration) {
    inner.runs.retain(|_, entry| entry.touched.elapsed() <= ttl);
    let runs = &inner.runs;
    inner.latest.retain(|_, run_id| runs.contains_key(run_id));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_begin_replaces_latest_pointer() {
        let tracker = ProgressTracker::default();

        let first = tracker.begin(IngestKind::FileImport).await;
        tracker
            .update(first, |s| {
                s.imported = 100;
            })
            .await;

        let second = tracker.begin(IngestKind::FileImport).await;

        // The kind pointer shows the fresh run with zeroed counters.
        let current = tracker.current(IngestKind::FileImport).await.unwrap();
        assert_eq!(current.run_id, second);
        assert_eq!(current.imported, 0);

        // The older run stays reachable by ID.
        let old = tracker.get(first).await.unwrap();
        assert_eq!(old.imported, 100);
    }

    #[tokio::test]
    async fn test_kinds_do_not_interfere() {
        let tracker = ProgressTracker::default();
        let import = tracker.begin(IngestKind::FileImport).await;
        let sync = tracker.begin(IngestKind::ApiSync).await;

        assert_eq!(
            tracker.current(IngestKind::FileImport).await.unwrap().run_id,
            import
        );
        assert_eq!(
            tracker.current(IngestKind::ApiSync).await.unwrap().run_id,
            sync
        );
    }

    #[tokio::test]
    async fn test_complete_and_fail_phases() {
        let tracker = ProgressTracker::default();

        let a = tracker.begin(IngestKind::ApiSync).await;
        tracker.complete(a).await;
        assert_eq!(tracker.get(a).await.unwrap().state, RunPhase::Complete);
        assert!(!tracker.is_running(IngestKind::ApiSync).await);

        let b = tracker.begin(IngestKind::ApiSync).await;
        tracker.fail(b, "boom".to_string()).await;
        let state = tracker.get(b).await.unwrap();
        assert_eq!(state.state, RunPhase::Error);
        assert_eq!(state.error.as_deref(), Some("boom"));
    }

    #[tokio::test]
    async fn test_expired_runs_disappear() {
        let tracker = ProgressTracker::new(Duration::from_millis(10));
        let run_id = tracker.begin(IngestKind::FileImport).await;

        tokio::time::sleep(Duration::from_millis(30)).await;

        assert!(tracker.get(run_id).await.is_none());
        assert!(tracker.current(IngestKind::FileImport).await.is_none());
        assert!(!tracker.is_running(IngestKind::FileImport).await);
    }

    #[tokio::test]
    async fn test_is_running_tracks_live_run() {
        let tracker = ProgressTracker::default();
        assert!(!tracker.is_running(IngestKind::ApiSync).await);

        let run_id = tracker.begin(IngestKind::ApiSync).await;
        assert!(tracker.is_running(IngestKind::ApiSync).await);

        tracker.complete(run_id).await;
        assert!(!tracker.is_running(IngestKind::ApiSync).await);
    }
}
