//! File import orchestrator
//!
//! Drives one staged file end-to-end in a background task with bounded
//! memory: the CSV is streamed in fixed-size chunks, each chunk normalized,
//! optionally filtered by the confirmed mode, upserted, and reflected in
//! the progress tracker. The whole run retries a bounded number of times;
//! replays are idempotent because the upsert is fingerprint-keyed. The
//! staged file is released exactly once, success or failure.

use futures::StreamExt;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use uuid::Uuid;

use super::diff::{disposition, RowDisposition};
use super::layout::SourceLayout;
use super::normalize::Normalizer;
use super::progress::ProgressTracker;
use super::record::AppointmentRecord;
use super::staging::{StagedFileId, StagedFiles};
use super::store::{collapse_batch, AppointmentStore, StoreError, FILE_SOURCE_POLICY};

/// Which previewed classes a confirmed import commits
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ImportMode {
    #[default]
    All,
    NewOnly,
    UpdatesOnly,
}

impl std::str::FromStr for ImportMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "all" => Ok(ImportMode::All),
            "new_only" => Ok(ImportMode::NewOnly),
            "updates_only" => Ok(ImportMode::UpdatesOnly),
            other => Err(format!("unknown import mode: {other}")),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ImportConfig {
    /// Rows per processing chunk
    pub chunk_size: usize,
    /// Whole-run attempts before the run is failed
    pub max_attempts: u32,
    /// Pause between attempts
    pub retry_delay: Duration,
}

impl Default for ImportConfig {
    fn default() -> Self {
        Self {
            chunk_size: 500,
            max_attempts: 3,
            retry_delay: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Error)]
pub enum ImportError {
    #[error("failed to read staged file: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv_async::Error),

    #[error(transparent)]
    Store(#[from] StoreError),
}

#[derive(Debug, Default, Clone, Copy)]
struct RunTotals {
    chunks: u64,
    imported: u64,
    skipped: u64,
    rejected: u64,
}

/// One import run's dependencies
#[derive(Clone)]
pub struct ImportOrchestrator {
    store: Arc<dyn AppointmentStore>,
    staging: StagedFiles,
    progress: ProgressTracker,
    config: ImportConfig,
}

impl ImportOrchestrator {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        staging: StagedFiles,
        progress: ProgressTracker,
        config: ImportConfig,
    ) -> Self {
        Self {
            store,
            staging,
            progress,
            config,
        }
    }

    /// Detach the run as a background task. The trigger path returns as
    /// soon as this is scheduled.
    pub fn spawn(
        &self,
        run_id: Uuid,
        file: StagedFileId,
        mode: ImportMode,
        layout: SourceLayout,
    ) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.run(run_id, file, mode, layout).await })
    }

    /// Run to a terminal progress state, retrying on failure.
    #[tracing::instrument(skip(self), fields(run_id = %run_id, file = %file, mode = ?mode, layout = %layout))]
    pub async fn run(
        &self,
        run_id: Uuid,
        file: StagedFileId,
        mode: ImportMode,
        layout: SourceLayout,
    ) {
        let mut attempt = 1u32;
        let outcome = loop {
            match self.process_file(run_id, file, mode, layout).await {
                Ok(totals) => break Ok(totals),
                Err(error) => {
                    if attempt >= self.config.max_attempts {
                        break Err(error);
                    }
                    tracing::warn!(attempt, error = %error, "import attempt failed, retrying");
                    attempt += 1;
                    // The next attempt re-reads the file from the top, so
                    // the published counters start over with it.
                    self.progress
                        .update(run_id, |p| {
                            p.unit = 0;
                            p.imported = 0;
                            p.skipped = 0;
                        })
                        .await;
                    tokio::time::sleep(self.config.retry_delay).await;
                }
            }
        };

        match outcome {
            Ok(totals) => {
                tracing::info!(
                    chunks = totals.chunks,
                    imported = totals.imported,
                    skipped = totals.skipped,
                    rejected = totals.rejected,
                    "import complete"
                );
                self.progress.complete(run_id).await;
            }
            Err(error) => {
                tracing::error!(error = %error, "import permanently failed");
                self.progress.fail(run_id, error.to_string()).await;
            }
        }

        self.staging.release(file).await;
    }

    /// One pass over the staged file.
    async fn process_file(
        &self,
        run_id: Uuid,
        file: StagedFileId,
        mode: ImportMode,
        layout: SourceLayout,
    ) -> Result<RunTotals, ImportError> {
        let handle = tokio::fs::File::open(self.staging.path(file)).await?;
        let mut reader = csv_async::AsyncReaderBuilder::new()
            .has_headers(true)
            .flexible(true)
            .create_reader(handle);
        let mut rows = reader.records();

        let normalizer = Normalizer::new(layout);
        let mut totals = RunTotals::default();
        let mut chunk: Vec<AppointmentRecord> = Vec::with_capacity(self.config.chunk_size);

        while let Some(row) = rows.next().await {
            let row = row?;
            let cells: Vec<String> = row.iter().map(str::to_string).collect();

            match normalizer.normalize(&cells) {
                Ok(record) => {
                    chunk.push(record);
                    if chunk.len() >= self.config.chunk_size {
                        self.commit_chunk(run_id, std::mem::take(&mut chunk), mode, &mut totals)
                            .await?;
                        chunk.reserve(self.config.chunk_size);
                    }
                }
                Err(reject) => {
                    totals.rejected += 1;
                    tracing::debug!(reason = %reject, "row rejected");
                }
            }
        }

        if !chunk.is_empty() {
            self.commit_chunk(run_id, chunk, mode, &mut totals).await?;
        }

        Ok(totals)
    }

    /// Collapse, filter by mode, upsert, publish progress.
    async fn commit_chunk(
        &self,
        run_id: Uuid,
        records: Vec<AppointmentRecord>,
        mode: ImportMode,
        totals: &mut RunTotals,
    ) -> Result<(), ImportError> {
        let (deduped, collapsed) = collapse_batch(records);
        let mut skipped = collapsed;

        let eligible = match mode {
            ImportMode::All => deduped,
            ImportMode::NewOnly | ImportMode::UpdatesOnly => {
                // Preview state is not reused; the check re-runs per chunk
                // against the live store.
                let fingerprints: Vec<_> =
                    deduped.iter().map(|r| r.fingerprint.clone()).collect();
                let existing = self.store.fetch_modification_markers(&fingerprints).await?;

                let mut kept = Vec::with_capacity(deduped.len());
                for record in deduped {
                    let wanted = match disposition(&record, existing.get(&record.fingerprint)) {
                        RowDisposition::New => mode == ImportMode::NewOnly,
                        RowDisposition::Update => mode == ImportMode::UpdatesOnly,
                        RowDisposition::Skip => false,
                    };
                    if wanted {
                        kept.push(record);
                    } else {
                        skipped += 1;
                    }
                }
                kept
            }
        };

        let outcome = self.store.upsert_batch(eligible, &FILE_SOURCE_POLICY).await?;

        totals.chunks += 1;
        totals.imported += outcome.written;
        totals.skipped += skipped;

        let snapshot = *totals;
        self.progress
            .update(run_id, move |p| {
                p.unit = snapshot.chunks;
                p.imported = snapshot.imported;
                p.skipped = snapshot.skipped;
            })
            .await;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_import_mode_from_str() {
        assert_eq!("all".parse::<ImportMode>(), Ok(ImportMode::All));
        assert_eq!("new_only".parse::<ImportMode>(), Ok(ImportMode::NewOnly));
        assert_eq!(
            "UPDATES_ONLY".parse::<ImportMode>(),
            Ok(ImportMode::UpdatesOnly)
        );
        assert!("everything".parse::<ImportMode>().is_err());
    }

    #[test]
    fn test_default_config_is_bounded() {
        let config = ImportConfig::default();
        assert!(config.chunk_size > 0);
        assert!(config.max_attempts >= 1);
    }
}
