//! Shared test harness
//!
//! An in-memory [`AppointmentStore`] with the same allow-list semantics as
//! the Postgres store, plus helpers for staging CSV fixtures.
#![allow(dead_code)]

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Mutex;

use intake_server::ingest::modstamp::{self, ModificationMarker};
use intake_server::ingest::record::AppointmentRecord;
use intake_server::ingest::staging::{StagedFileId, StagedFiles};
use intake_server::ingest::store::{
    collapse_batch, AppointmentStore, StoreError, UpsertOutcome, UpsertPolicy,
};
use intake_server::ingest::Fingerprint;

/// One stored row: the source-controlled record plus a few representative
/// operator-entered fields that ingestion must never touch.
#[derive(Debug, Clone, PartialEq)]
pub struct StoredRow {
    pub record: AppointmentRecord,
    pub eligibility_status: Option<String>,
    pub primary_insurance: Option<String>,
    pub notes: Option<String>,
}

#[derive(Default)]
pub struct MemoryStore {
    rows: Mutex<HashMap<Fingerprint, StoredRow>>,
    fail_upserts: Mutex<bool>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.rows.lock().unwrap().len()
    }

    pub fn get(&self, fingerprint: &Fingerprint) -> Option<StoredRow> {
        self.rows.lock().unwrap().get(fingerprint).cloned()
    }

    pub fn snapshot(&self) -> HashMap<Fingerprint, StoredRow> {
        self.rows.lock().unwrap().clone()
    }

    /// Simulate the record-detail form: a human sets operator fields.
    pub fn set_operator_fields(
        &self,
        fingerprint: &Fingerprint,
        insurance: Option<&str>,
        notes: Option<&str>,
    ) {
        let mut rows = self.rows.lock().unwrap();
        let row = rows.get_mut(fingerprint).expect("row must exist");
        row.primary_insurance = insurance.map(str::to_string);
        row.notes = notes.map(str::to_string);
    }

    /// Make every subsequent upsert fail, as a constraint violation would.
    pub fn fail_upserts(&self) {
        *self.fail_upserts.lock().unwrap() = true;
    }
}

#[async_trait]
impl AppointmentStore for MemoryStore {
    async fn upsert_batch(
        &self,
        records: Vec<AppointmentRecord>,
        policy: &UpsertPolicy,
    ) -> Result<UpsertOutcome, StoreError> {
        if *self.fail_upserts.lock().unwrap() {
            return Err(StoreError::Database(sqlx::Error::PoolClosed));
        }

        let (deduped, collapsed) = collapse_batch(records);
        let written = deduped.len() as u64;

        let mut rows = self.rows.lock().unwrap();
        for record in deduped {
            match rows.get_mut(&record.fingerprint) {
                Some(existing) => apply_policy(&mut existing.record, &record, policy),
                None => {
                    rows.insert(
                        record.fingerprint.clone(),
                        StoredRow {
                            record,
                            eligibility_status: Some("Verification Pending".to_string()),
                            primary_insurance: None,
                            notes: None,
                        },
                    );
                }
            }
        }

        Ok(UpsertOutcome { written, collapsed })
    }

    async fn fetch_modification_markers(
        &self,
        fingerprints: &[Fingerprint],
    ) -> Result<HashMap<Fingerprint, ModificationMarker>, StoreError> {
        let rows = self.rows.lock().unwrap();
        Ok(fingerprints
            .iter()
            .filter_map(|fingerprint| {
                rows.get(fingerprint).map(|row| {
                    let marker = modstamp::extract_latest(
                        row.record.modification_history.as_deref().unwrap_or(""),
                    );
                    (fingerprint.clone(), marker)
                })
            })
            .collect())
    }
}

/// Mirror of the SQL `DO UPDATE SET col = EXCLUDED.col` list: copy exactly
/// the policy's columns, nothing else.
fn apply_policy(existing: &mut AppointmentRecord, incoming: &AppointmentRecord, policy: &UpsertPolicy) {
    for column in policy.update_columns {
        match *column {
            "appointment_status" => {
                existing.appointment_status = incoming.appointment_status.clone()
            }
            "patient_email" => existing.patient_email = incoming.patient_email.clone(),
            "patient_external_id" => {
                existing.patient_external_id = incoming.patient_external_id.clone()
            }
            "provider" => existing.provider = incoming.provider.clone(),
            "visit_type" => existing.visit_type = incoming.visit_type.clone(),
            "location" => existing.location = incoming.location.clone(),
            "invoice_no" => existing.invoice_no = incoming.invoice_no.clone(),
            "invoice_status" => existing.invoice_status = incoming.invoice_status.clone(),
            "current_responsibility" => {
                existing.current_responsibility = incoming.current_responsibility.clone()
            }
            "claim_created" => existing.claim_created = incoming.claim_created,
            "charges" => existing.charges = incoming.charges,
            "payments" => existing.payments = incoming.payments,
            "units" => existing.units = incoming.units,
            "created_by" => existing.created_by = incoming.created_by.clone(),
            "cancellation_reason" => {
                existing.cancellation_reason = incoming.cancellation_reason.clone()
            }
            "modification_history" => {
                existing.modification_history = incoming.modification_history.clone()
            }
            "authorization_number" => {
                existing.authorization_number = incoming.authorization_number.clone()
            }
            "scheduled_visits" => existing.scheduled_visits = incoming.scheduled_visits,
            "total_visits" => existing.total_visits = incoming.total_visits,
            "expiration_date" => existing.expiration_date = incoming.expiration_date,
            "authorization_text" => {
                existing.authorization_text = incoming.authorization_text.clone()
            }
            "updated_at" => {}
            other => panic!("policy names a column the store does not know: {other}"),
        }
    }
}

/// Stage CSV content in a fresh temp staging area.
pub async fn stage_csv(content: &str) -> (tempfile::TempDir, StagedFiles, StagedFileId) {
    let dir = tempfile::tempdir().expect("tempdir");
    let staging = StagedFiles::new(dir.path(), 10 * 1024 * 1024);
    staging.init().await.expect("staging init");
    let id = staging.stage(content.as_bytes()).await.expect("stage");
    (dir, staging, id)
}
