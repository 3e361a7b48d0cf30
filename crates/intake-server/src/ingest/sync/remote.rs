//! Remote record mapping
//!
//! Maps one row from the upstream data endpoint onto the canonical record.
//! Rows with no usable patient identity are dropped (counted as skips by
//! the orchestrator). Numeric fields arrive as numbers or numeric strings
//! depending on the upstream release, so they are accepted as either.

use serde::Deserialize;
use serde_json::Value;

use crate::ingest::normalize::parse_flexible_date;
use crate::ingest::record::AppointmentRecord;

/// Wire shape of one remote appointment. Every field is optional; the
/// upstream omits what it doesn't have.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct RemoteAppointment {
    pub patient_first_name: Option<String>,
    pub patient_last_name: Option<String>,
    pub patient_full_name: Option<String>,
    pub patient_email: Option<String>,
    pub date_of_service: Option<String>,
    pub appointment_status: Option<String>,
    pub provider_name: Option<String>,
    pub service_name: Option<String>,
    pub location_name: Option<String>,
    pub invoice_number: Option<String>,
    pub invoice_status: Option<String>,
    pub current_responsibility: Option<String>,
    pub claim_created_info: Option<String>,
    pub charges: Option<Value>,
    pub payments: Option<Value>,
    pub units: Option<Value>,
    pub created_by: Option<String>,
    pub reason: Option<String>,
}

/// Map one raw row to a canonical record. `None` means the row carried no
/// patient identity (or wasn't an object at all) and must be skipped.
pub fn map_remote(row: Value) -> Option<AppointmentRecord> {
    let remote: RemoteAppointment = serde_json::from_value(row).ok()?;

    let name = patient_name(&remote)?;
    let date_of_service = remote
        .date_of_service
        .as_deref()
        .and_then(parse_flexible_date);
    let status = remote
        .appointment_status
        .clone()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or_else(|| "New".to_string());

    let mut record = AppointmentRecord::new(name, date_of_service, status);
    record.patient_email = remote.patient_email.filter(|s| !s.trim().is_empty());
    record.provider = remote.provider_name.unwrap_or_default();
    record.visit_type = remote.service_name.filter(|s| !s.trim().is_empty());
    record.location = remote.location_name.filter(|s| !s.trim().is_empty());
    record.invoice_no = remote.invoice_number.filter(|s| !s.trim().is_empty());
    record.invoice_status = remote.invoice_status.filter(|s| !s.trim().is_empty());
    record.current_responsibility = remote
        .current_responsibility
        .filter(|s| !s.trim().is_empty());
    record.claim_created = remote
        .claim_created_info
        .map(|s| s.trim().eq_ignore_ascii_case("yes"))
        .unwrap_or(false);
    record.charges = numeric(remote.charges.as_ref());
    record.payments = numeric(remote.payments.as_ref());
    record.units = numeric(remote.units.as_ref()) as i32;
    record.created_by = remote.created_by.filter(|s| !s.trim().is_empty());
    record.cancellation_reason = remote.reason.filter(|s| !s.trim().is_empty());

    Some(record)
}

/// Full name if present, else first + last; empty identity is a skip.
fn patient_name(remote: &RemoteAppointment) -> Option<String> {
    let full = remote
        .patient_full_name
        .as_deref()
        .map(str::trim)
        .unwrap_or("");
    if !full.is_empty() {
        return Some(full.to_string());
    }

    let first = remote
        .patient_first_name
        .as_deref()
        .map(str::trim)
        .unwrap_or("");
    let last = remote
        .patient_last_name
        .as_deref()
        .map(str::trim)
        .unwrap_or("");
    let joined = format!("{first} {last}").trim().to_string();

    if joined.is_empty() {
        None
    } else {
        Some(joined)
    }
}

/// Accept a JSON number or a numeric string; anything else is zero.
fn numeric(value: Option<&Value>) -> f64 {
    match value {
        Some(Value::Number(n)) => n.as_f64().unwrap_or(0.0),
        Some(Value::String(s)) => s.trim().parse().unwrap_or(0.0),
        _ => 0.0,
    }
}
