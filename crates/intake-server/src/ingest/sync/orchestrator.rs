//! Sync chain orchestrator
//!
//! One logical sync is a chain of bounded batches, each small enough to
//! fit inside a worker's time limit, driven by
//! an explicit loop inside one spawned task. Batches are strictly
//! sequential; batch *n*+1 starts only after batch *n* finished, carrying
//! the next page cursor forward. The cursor is published with every batch,
//! so a restarted chain can resume from the progress state alone.
//!
//! A failed batch (exhausted fetch retries, rejected login, store error)
//! records an error progress state and stops the chain where it stands;
//! later pages are never skipped over.

use std::sync::Arc;
use uuid::Uuid;

use super::client::{DateWindow, SyncClient};
use super::remote::map_remote;
use super::SyncError;
use crate::ingest::progress::ProgressTracker;
use crate::ingest::record::AppointmentRecord;
use crate::ingest::store::{AppointmentStore, API_SOURCE_POLICY};

/// What one batch accomplished
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BatchOutcome {
    pub imported: u64,
    pub skipped: u64,
    pub pages_fetched: u32,
    pub has_more: bool,
    pub next_page: u32,
}

#[derive(Clone)]
pub struct SyncOrchestrator {
    store: Arc<dyn AppointmentStore>,
    client: SyncClient,
    progress: ProgressTracker,
}

impl SyncOrchestrator {
    pub fn new(
        store: Arc<dyn AppointmentStore>,
        client: SyncClient,
        progress: ProgressTracker,
    ) -> Self {
        Self {
            store,
            client,
            progress,
        }
    }

    /// Detach the chain as a background task.
    pub fn spawn(
        &self,
        run_id: Uuid,
        window: DateWindow,
        start_page: u32,
    ) -> tokio::task::JoinHandle<()> {
        let this = self.clone();
        tokio::spawn(async move { this.run_chain(run_id, window, start_page).await })
    }

    /// Drive batches until the source is exhausted or a batch fails.
    #[tracing::instrument(skip(self), fields(run_id = %run_id))]
    pub async fn run_chain(&self, run_id: Uuid, window: DateWindow, start_page: u32) {
        let mut page = start_page.max(1);
        let mut batch_number = 1u64;

        loop {
            match self.run_batch(page, batch_number, &window).await {
                Ok(batch) => {
                    self.progress
                        .update(run_id, |p| {
                            p.unit = batch_number;
                            p.imported += batch.imported;
                            p.skipped += batch.skipped;
                            p.cursor = Some(batch.next_page as u64);
                        })
                        .await;

                    tracing::info!(
                        batch = batch_number,
                        imported = batch.imported,
                        skipped = batch.skipped,
                        pages = batch.pages_fetched,
                        has_more = batch.has_more,
                        "sync batch complete"
                    );

                    if !batch.has_more {
                        self.progress.complete(run_id).await;
                        tracing::info!(batches = batch_number, "sync chain complete");
                        return;
                    }

                    page = batch.next_page;
                    batch_number += 1;
                }
                Err(error) => {
                    tracing::error!(batch = batch_number, page, error = %error, "sync chain failed");
                    self.progress.fail(run_id, error.to_string()).await;
                    return;
                }
            }
        }
    }

    /// One batch: authenticate, fetch up to `pages_per_batch` pages, map,
    /// upsert. A short page ends the pagination: the source is exhausted.
    pub async fn run_batch(
        &self,
        start_page: u32,
        batch_number: u64,
        window: &DateWindow,
    ) -> Result<BatchOutcome, SyncError> {
        let config = self.client.config().clone();
        let token = self.client.authenticate().await?;

        let mut rows = Vec::new();
        let mut has_more = false;
        let mut pages_fetched = 0u32;
        let mut last_page = start_page;

        for page in start_page..start_page + config.pages_per_batch {
            let page_rows = self.client.fetch_page(&token, page, window).await?;
            pages_fetched += 1;
            last_page = page;

            let full_page = page_rows.len() as u32 >= config.per_page;
            rows.extend(page_rows);

            if !full_page {
                has_more = false;
                break;
            }
            has_more = true;
        }

        tracing::debug!(
            batch = batch_number,
            start_page,
            last_page,
            raw_rows = rows.len(),
            "batch fetched"
        );

        let mut skipped = 0u64;
        let candidates: Vec<AppointmentRecord> = rows
            .into_iter()
            .filter_map(|row| match map_remote(row) {
                Some(record) => Some(record),
                None => {
                    skipped += 1;
                    None
                }
            })
            .collect();

        let mut imported = 0u64;
        for chunk in candidates.chunks(config.upsert_chunk.max(1)) {
            let outcome = self
                .store
                .upsert_batch(chunk.to_vec(), &API_SOURCE_POLICY)
                .await?;
            imported += outcome.written;
            skipped += outcome.collapsed;
        }

        Ok(BatchOutcome {
            imported,
            skipped,
            pages_fetched,
            has_more,
            next_page: last_page + 1,
        })
    }
}
