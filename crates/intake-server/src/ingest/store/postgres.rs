//! PostgreSQL appointment store
//!
//! One multi-row `INSERT .. ON CONFLICT (fingerprint) DO UPDATE` per chunk,
//! all chunks inside a single transaction, so a batch either lands whole or
//! not at all. The `DO UPDATE SET` list is generated from the caller's
//! policy; operator-entered columns are simply never in it.

use async_trait::async_trait;
use chrono::Utc;
use sqlx::PgPool;
use std::collections::HashMap;

use super::{
    collapse_batch, AppointmentStore, StoreError, UpsertOutcome, UpsertPolicy,
};
use crate::ingest::fingerprint::Fingerprint;
use crate::ingest::modstamp::{self, ModificationMarker};
use crate::ingest::record::AppointmentRecord;

/// Rows per INSERT statement; bounded well under the Postgres bind limit.
const MAX_UPSERT_ROWS: usize = 500;

/// Operator-field starting point for rows ingestion creates.
const ELIGIBILITY_PENDING: &str = "Verification Pending";

/// Source-controlled + bookkeeping columns, in bind order. Operator columns
/// other than the insert-time eligibility default never appear here.
const INSERT_COLUMNS: &str = "fingerprint, patient_name, patient_external_id, patient_dob, \
     patient_email, date_of_service, appointment_status, provider, visit_type, location, \
     invoice_no, invoice_status, current_responsibility, claim_created, charges, payments, \
     units, authorization_number, scheduled_visits, total_visits, expiration_date, \
     authorization_text, created_by, cancellation_reason, modification_history, \
     eligibility_status, created_at, updated_at";

/// Production store backed by the `appointments` table
#[derive(Clone)]
pub struct PgAppointmentStore {
    pool: PgPool,
}

impl PgAppointmentStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl AppointmentStore for PgAppointmentStore {
    #[tracing::instrument(skip(self, records), fields(source = policy.source, batch = records.len()))]
    async fn upsert_batch(
        &self,
        records: Vec<AppointmentRecord>,
        policy: &UpsertPolicy,
    ) -> Result<UpsertOutcome, StoreError> {
        let (deduped, collapsed) = collapse_batch(records);
        if deduped.is_empty() {
            return Ok(UpsertOutcome { written: 0, collapsed });
        }

        let now = Utc::now();
        let mut written = 0u64;
        let mut tx = self.pool.begin().await?;

        for chunk in deduped.chunks(MAX_UPSERT_ROWS) {
            let mut builder = sqlx::QueryBuilder::new(format!(
                "INSERT INTO appointments ({INSERT_COLUMNS}) "
            ));

            builder.push_values(chunk, |mut b, record| {
                b.push_bind(record.fingerprint.as_str())
                    .push_bind(&record.patient_name)
                    .push_bind(&record.patient_external_id)
                    .push_bind(record.patient_dob)
                    .push_bind(&record.patient_email)
                    .push_bind(record.date_of_service)
                    .push_bind(&record.appointment_status)
                    .push_bind(&record.provider)
                    .push_bind(&record.visit_type)
                    .push_bind(&record.location)
                    .push_bind(&record.invoice_no)
                    .push_bind(&record.invoice_status)
                    .push_bind(&record.current_responsibility)
                    .push_bind(record.claim_created)
                    .push_bind(record.charges)
                    .push_bind(record.payments)
                    .push_bind(record.units)
                    .push_bind(&record.authorization_number)
                    .push_bind(record.scheduled_visits)
                    .push_bind(record.total_visits)
                    .push_bind(record.expiration_date)
                    .push_bind(&record.authorization_text)
                    .push_bind(&record.created_by)
                    .push_bind(&record.cancellation_reason)
                    .push_bind(&record.modification_history)
                    .push_bind(ELIGIBILITY_PENDING)
                    .push_bind(now)
                    .push_bind(now);
            });

            builder.push(" ON CONFLICT (fingerprint) DO UPDATE SET ");
            let mut assignments = builder.separated(", ");
            for column in policy.update_columns {
                assignments.push(format!("{column} = EXCLUDED.{column}"));
            }

            written += builder.build().execute(&mut *tx).await?.rows_affected();
        }

        tx.commit().await?;

        tracing::debug!(written, collapsed, "batch upsert committed");

        Ok(UpsertOutcome { written, collapsed })
    }

    async fn fetch_modification_markers(
        &self,
        fingerprints: &[Fingerprint],
    ) -> Result<HashMap<Fingerprint, ModificationMarker>, StoreError> {
        if fingerprints.is_empty() {
            return Ok(HashMap::new());
        }

        let keys: Vec<String> = fingerprints
            .iter()
            .map(|f| f.as_str().to_string())
            .collect();

        let rows: Vec<(String, Option<String>)> = sqlx::query_as(
            "SELECT fingerprint, modification_history \
             FROM appointments WHERE fingerprint = ANY($1)",
        )
        .bind(&keys)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(fingerprint, history)| {
                let marker = modstamp::extract_latest(history.as_deref().unwrap_or(""));
                (Fingerprint::from(fingerprint), marker)
            })
            .collect())
    }
}
