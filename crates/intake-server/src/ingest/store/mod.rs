//! Appointment store
//!
//! The batch upsert engine and the read side the diff engine needs. The
//! trait seam keeps the orchestrators testable against an in-memory
//! implementation; production uses [`PgAppointmentStore`].

pub mod postgres;

pub use postgres::PgAppointmentStore;

use async_trait::async_trait;
use std::collections::HashMap;
use thiserror::Error;

use super::fingerprint::Fingerprint;
use super::modstamp::ModificationMarker;
use super::record::AppointmentRecord;

/// Which columns an ingestion source may overwrite when a fingerprint is
/// already present. Everything outside the list (all operator-entered
/// columns) is never touched on conflict.
#[derive(Debug, Clone, Copy)]
pub struct UpsertPolicy {
    pub source: &'static str,
    pub update_columns: &'static [&'static str],
}

/// File imports own the modification history and the authorization block.
pub const FILE_SOURCE_POLICY: UpsertPolicy = UpsertPolicy {
    source: "file",
    update_columns: &[
        "appointment_status",
        "provider",
        "visit_type",
        "location",
        "invoice_no",
        "invoice_status",
        "current_responsibility",
        "claim_created",
        "charges",
        "payments",
        "units",
        "created_by",
        "cancellation_reason",
        "modification_history",
        "patient_external_id",
        "authorization_number",
        "scheduled_visits",
        "total_visits",
        "expiration_date",
        "authorization_text",
        "updated_at",
    ],
};

/// The API feed carries patient contact data but no modification history,
/// so it must not blank out what a file import wrote.
pub const API_SOURCE_POLICY: UpsertPolicy = UpsertPolicy {
    source: "api",
    update_columns: &[
        "appointment_status",
        "patient_email",
        "provider",
        "visit_type",
        "location",
        "invoice_no",
        "invoice_status",
        "current_responsibility",
        "claim_created",
        "charges",
        "payments",
        "units",
        "created_by",
        "cancellation_reason",
        "updated_at",
    ],
};

/// Result of one batch upsert
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpsertOutcome {
    /// Rows written (inserted or updated)
    pub written: u64,
    /// In-batch duplicates collapsed before the write
    pub collapsed: u64,
}

/// Store-level failures. A constraint violation unrelated to the
/// fingerprint key surfaces here and fails the whole batch.
#[derive(Debug, Error)]
pub enum StoreError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Canonical appointment persistence
#[async_trait]
pub trait AppointmentStore: Send + Sync {
    /// Apply a batch atomically: insert unseen fingerprints, overwrite only
    /// the policy's columns on seen ones. Duplicate fingerprints within the
    /// batch are collapsed first, last occurrence winning.
    async fn upsert_batch(
        &self,
        records: Vec<AppointmentRecord>,
        policy: &UpsertPolicy,
    ) -> Result<UpsertOutcome, StoreError>;

    /// Bulk-fetch the stored modification markers for the given
    /// fingerprints; absent fingerprints are simply missing from the map.
    async fn fetch_modification_markers(
        &self,
        fingerprints: &[Fingerprint],
    ) -> Result<HashMap<Fingerprint, ModificationMarker>, StoreError>;
}

/// Collapse duplicate fingerprints within one batch, keeping the last
/// occurrence (a source may legitimately list one appointment several times
/// per refresh; the freshest row wins). First-seen order is preserved so
/// batches stay deterministic.
pub fn collapse_batch(records: Vec<AppointmentRecord>) -> (Vec<AppointmentRecord>, u64) {
    let input_len = records.len();
    let mut by_fingerprint: HashMap<Fingerprint, usize> = HashMap::with_capacity(input_len);
    let mut deduped: Vec<AppointmentRecord> = Vec::with_capacity(input_len);

    for record in records {
        match by_fingerprint.get(&record.fingerprint) {
            Some(&slot) => deduped[slot] = record,
            None => {
                by_fingerprint.insert(record.fingerprint.clone(), deduped.len());
                deduped.push(record);
            }
        }
    }

    let collapsed = (input_len - deduped.len()) as u64;
    (deduped, collapsed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn record(name: &str, invoice: &str) -> AppointmentRecord {
        let mut r = AppointmentRecord::new(
            name,
            NaiveDate::from_ymd_opt(2026, 2, 14),
            "Confirmed",
        );
        r.invoice_no = Some(invoice.to_string());
        r
    }

    #[test]
    fn test_collapse_keeps_last_occurrence() {
        let (deduped, collapsed) = collapse_batch(vec![
            record("Jane Doe", "INV-1"),
            record("Jane Doe", "INV-2"),
        ]);

        assert_eq!(collapsed, 1);
        assert_eq!(deduped.len(), 1);
        assert_eq!(deduped[0].invoice_no.as_deref(), Some("INV-2"));
    }

    #[test]
    fn test_collapse_preserves_first_seen_order() {
        let (deduped, collapsed) = collapse_batch(vec![
            record("Alice", "A1"),
            record("Bob", "B1"),
            record("Alice", "A2"),
            record("Carol", "C1"),
        ]);

        assert_eq!(collapsed, 1);
        let names: Vec<_> = deduped.iter().map(|r| r.patient_name.as_str()).collect();
        assert_eq!(names, ["Alice", "Bob", "Carol"]);
        assert_eq!(deduped[0].invoice_no.as_deref(), Some("A2"));
    }

    #[test]
    fn test_collapse_distinct_records_untouched() {
        let (deduped, collapsed) = collapse_batch(vec![
            record("Alice", "A1"),
            record("Bob", "B1"),
        ]);
        assert_eq!(collapsed, 0);
        assert_eq!(deduped.len(), 2);
    }

    #[test]
    fn test_policies_exclude_operator_columns() {
        for policy in [FILE_SOURCE_POLICY, API_SOURCE_POLICY] {
            for operator_column in [
                "eligibility_status",
                "primary_insurance",
                "secondary_insurance",
                "auth_status",
                "referral_status",
                "collection_status",
                "collected_amount",
                "notes",
                "psc_code",
                "psc_description",
            ] {
                assert!(
                    !policy.update_columns.contains(&operator_column),
                    "{} policy must not overwrite {}",
                    policy.source,
                    operator_column
                );
            }
        }
    }

    #[test]
    fn test_api_policy_leaves_modification_history_alone() {
        assert!(!API_SOURCE_POLICY
            .update_columns
            .contains(&"modification_history"));
        assert!(FILE_SOURCE_POLICY
            .update_columns
            .contains(&"modification_history"));
    }
}
