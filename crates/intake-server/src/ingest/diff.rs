//! Diff / preview engine
//!
//! Classifies a candidate batch as new / update / skip against the current
//! store before anything is committed. Used by the interactive import path:
//! the preview endpoint shows the operator exactly what a confirm would do,
//! and the confirm modes (`new_only` / `updates_only`) reuse the same
//! per-record rule chunk by chunk.
//!
//! Read-only and safely repeatable: classification never writes.

use serde::Serialize;
use std::collections::HashMap;

use super::fingerprint::Fingerprint;
use super::modstamp::{self, ModificationMarker};
use super::record::AppointmentRecord;
use super::store::{collapse_batch, AppointmentStore, StoreError};

/// What committing one candidate would do
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RowDisposition {
    /// Fingerprint not in the store
    New,
    /// Fingerprint present and the modification marker moved
    Update,
    /// Fingerprint present, marker unchanged (or candidate carries none)
    Skip,
}

/// Per-record classification rule shared by preview and the confirm modes.
///
/// A candidate with no usable marker of its own never counts as an update;
/// an absent marker says nothing about freshness.
pub fn disposition(
    candidate: &AppointmentRecord,
    stored_marker: Option<&ModificationMarker>,
) -> RowDisposition {
    let Some(stored) = stored_marker else {
        return RowDisposition::New;
    };

    let candidate_marker =
        modstamp::extract_latest(candidate.modification_history.as_deref().unwrap_or(""));

    if candidate_marker.is_absent() || candidate_marker == *stored {
        RowDisposition::Skip
    } else {
        RowDisposition::Update
    }
}

/// One row of the preview table
#[derive(Debug, Clone, Serialize)]
pub struct PreviewRow {
    pub patient_external_id: String,
    pub patient_name: String,
    pub date_of_service: Option<chrono::NaiveDate>,
    pub appointment_status: String,
    pub provider: String,
    pub visit_type: String,
    pub location: String,
    pub auth_tag: String,
    pub authorization_number: String,
    pub expiration_date: Option<chrono::NaiveDate>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub existing_modification: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub new_modification: Option<String>,
}

impl PreviewRow {
    fn from_record(record: &AppointmentRecord) -> Self {
        let auth_tag = if record.expiration_date.is_some() {
            "Auth Active"
        } else {
            "For Review"
        };

        Self {
            patient_external_id: record.patient_external_id.clone().unwrap_or_default(),
            patient_name: record.patient_name.clone(),
            date_of_service: record.date_of_service,
            appointment_status: record.appointment_status.clone(),
            provider: record.provider.clone(),
            visit_type: record.visit_type.clone().unwrap_or_default(),
            location: record.location.clone().unwrap_or_default(),
            auth_tag: auth_tag.to_string(),
            authorization_number: record.authorization_number.clone().unwrap_or_default(),
            expiration_date: record.expiration_date,
            existing_modification: None,
            new_modification: None,
        }
    }
}

/// Classification of one candidate batch
#[derive(Debug, Clone, Default, Serialize)]
pub struct DiffReport {
    pub new_records: Vec<PreviewRow>,
    pub update_records: Vec<PreviewRow>,
    pub skip_count: u64,
    /// Deduplicated candidate count
    pub total_rows: u64,
}

/// Pure classification core: deduplicated candidates against a marker map.
/// `collapsed` duplicates from the earlier collapse count toward the skips
/// (collapse-then-check; the commit path collapses the same way).
pub fn classify(
    candidates: &[AppointmentRecord],
    collapsed: u64,
    existing: &HashMap<Fingerprint, ModificationMarker>,
) -> DiffReport {
    let mut report = DiffReport {
        skip_count: collapsed,
        total_rows: candidates.len() as u64,
        ..Default::default()
    };

    for candidate in candidates {
        let stored = existing.get(&candidate.fingerprint);
        match disposition(candidate, stored) {
            RowDisposition::New => report.new_records.push(PreviewRow::from_record(candidate)),
            RowDisposition::Update => {
                let mut row = PreviewRow::from_record(candidate);
                row.existing_modification = stored.map(|m| m.display());
                row.new_modification = Some(
                    modstamp::extract_latest(
                        candidate.modification_history.as_deref().unwrap_or(""),
                    )
                    .display(),
                );
                report.update_records.push(row);
            }
            RowDisposition::Skip => report.skip_count += 1,
        }
    }

    report
}

/// Store-backed preview: collapse, bulk-fetch stored markers in one query,
/// classify.
pub async fn preview(
    store: &dyn AppointmentStore,
    records: Vec<AppointmentRecord>,
) -> Result<DiffReport, StoreError> {
    let (deduped, collapsed) = collapse_batch(records);
    let fingerprints: Vec<Fingerprint> =
        deduped.iter().map(|r| r.fingerprint.clone()).collect();
    let existing = store.fetch_modification_markers(&fingerprints).await?;
    Ok(classify(&deduped, collapsed, &existing))
}
