//! Canonical appointment record
//!
//! The source-agnostic unit moved through the ingestion pipeline. Both the
//! file normalizer and the API record mapper produce this shape; the upsert
//! engine consumes it. Transient per batch; only the store row persists.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::fingerprint::{self, Fingerprint};

/// One normalized appointment, fingerprint pre-attached
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AppointmentRecord {
    // Patient identity
    pub patient_name: String,
    pub patient_external_id: Option<String>,
    pub patient_dob: Option<NaiveDate>,
    pub patient_email: Option<String>,

    // Scheduling
    pub date_of_service: Option<NaiveDate>,
    pub appointment_status: String,
    pub provider: String,
    pub visit_type: Option<String>,
    pub location: Option<String>,

    // Invoice / billing
    pub invoice_no: Option<String>,
    pub invoice_status: Option<String>,
    pub current_responsibility: Option<String>,
    pub claim_created: bool,
    pub charges: f64,
    pub payments: f64,
    pub units: i32,

    // Authorization
    pub authorization_number: Option<String>,
    pub scheduled_visits: Option<i32>,
    pub total_visits: Option<i32>,
    pub expiration_date: Option<NaiveDate>,
    pub authorization_text: Option<String>,

    // Audit text from the source system
    pub created_by: Option<String>,
    pub cancellation_reason: Option<String>,
    pub modification_history: Option<String>,

    pub fingerprint: Fingerprint,
}

impl AppointmentRecord {
    /// Create a record from its natural key, computing the fingerprint.
    /// Everything else starts empty and is filled in by the caller.
    pub fn new(
        patient_name: impl Into<String>,
        date_of_service: Option<NaiveDate>,
        appointment_status: impl Into<String>,
    ) -> Self {
        let patient_name = patient_name.into();
        let appointment_status = appointment_status.into();
        let fingerprint =
            fingerprint::compute(&patient_name, date_of_service, &appointment_status);

        Self {
            patient_name,
            patient_external_id: None,
            patient_dob: None,
            patient_email: None,
            date_of_service,
            appointment_status,
            provider: String::new(),
            visit_type: None,
            location: None,
            invoice_no: None,
            invoice_status: None,
            current_responsibility: None,
            claim_created: false,
            charges: 0.0,
            payments: 0.0,
            units: 0,
            authorization_number: None,
            scheduled_visits: None,
            total_visits: None,
            expiration_date: None,
            authorization_text: None,
            created_by: None,
            cancellation_reason: None,
            modification_history: None,
            fingerprint,
        }
    }
}
