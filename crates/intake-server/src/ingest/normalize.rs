//! Row normalizer
//!
//! Pure mapping of one raw export row into an [`AppointmentRecord`] or a
//! typed rejection. The column table is resolved once per run from the
//! selected [`SourceLayout`]; no side effects here.

use chrono::{DateTime, NaiveDate};
use thiserror::Error;

use super::layout::{ColumnMap, SourceLayout};
use super::record::AppointmentRecord;

/// Days between 1899-12-30 (the spreadsheet epoch) and 1970-01-01.
const SPREADSHEET_EPOCH_OFFSET_DAYS: f64 = 25569.0;

/// Rows the export pads its totals section with.
const TOTALS_SENTINEL: &str = "total";

/// Free-text date shapes the exports have been seen to produce. Anything
/// else is rejected rather than guessed at.
const DATE_FORMATS: &[&str] = &[
    "%m/%d/%Y",
    "%m/%d/%y",
    "%Y-%m-%d",
    "%d-%b-%Y",
    "%B %d, %Y",
];

const DATETIME_FORMATS: &[&str] = &[
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
];

/// Why a row was dropped before it reached the store
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RowReject {
    #[error("patient name is blank")]
    BlankName,
    #[error("totals row")]
    TotalsRow,
    #[error("date of service is missing")]
    MissingDate,
    #[error("date of service is unparseable: {0}")]
    UnparseableDate(String),
}

/// Per-run row normalizer bound to one layout
#[derive(Debug, Clone, Copy)]
pub struct Normalizer {
    layout: SourceLayout,
    columns: &'static ColumnMap,
}

impl Normalizer {
    pub fn new(layout: SourceLayout) -> Self {
        Self {
            layout,
            columns: layout.columns(),
        }
    }

    pub fn layout(&self) -> SourceLayout {
        self.layout
    }

    /// Map one raw row into a canonical record, or reject it.
    pub fn normalize(&self, cells: &[String]) -> Result<AppointmentRecord, RowReject> {
        let cols = self.columns;

        let name = cell(cells, Some(cols.patient_name));
        if name.is_empty() {
            return Err(RowReject::BlankName);
        }
        if name.eq_ignore_ascii_case(TOTALS_SENTINEL) {
            return Err(RowReject::TotalsRow);
        }

        let raw_date = cell(cells, Some(cols.date_of_service));
        if raw_date.is_empty() {
            return Err(RowReject::MissingDate);
        }
        let date_of_service = parse_flexible_date(raw_date)
            .ok_or_else(|| RowReject::UnparseableDate(raw_date.to_string()))?;

        let status = match cell(cells, Some(cols.appointment_status)) {
            "" => "New",
            s => s,
        };

        let mut record = AppointmentRecord::new(name, Some(date_of_service), status);

        record.patient_external_id = optional(cell(cells, cols.patient_external_id));
        record.provider = cell(cells, cols.provider).to_string();
        record.visit_type = optional(cell(cells, cols.visit_type));
        record.location = optional(cell(cells, cols.location));
        record.invoice_no = optional(cell(cells, cols.invoice_no));
        record.invoice_status = optional(cell(cells, cols.invoice_status));
        record.current_responsibility = optional(cell(cells, cols.current_responsibility));
        record.claim_created = cell(cells, cols.claim_created).eq_ignore_ascii_case("yes");
        record.charges = parse_amount(cell(cells, cols.charges));
        record.payments = parse_amount(cell(cells, cols.payments));
        record.units = parse_count(cell(cells, cols.units));
        record.created_by = optional(cell(cells, cols.created_by));
        record.cancellation_reason = optional(cell(cells, cols.cancellation_reason));
        record.modification_history = optional(cell(cells, cols.modification_history));
        record.authorization_number = optional(cell(cells, cols.authorization_number));
        record.expiration_date = parse_flexible_date(cell(cells, cols.expiration_date));

        let raw_visits = cell(cells, cols.visits);
        (record.scheduled_visits, record.total_visits) = parse_visits(raw_visits);
        record.authorization_text = optional(raw_visits);

        Ok(record)
    }
}

fn cell(cells: &[String], index: Option<usize>) -> &str {
    index
        .and_then(|i| cells.get(i))
        .map(|s| s.trim())
        .unwrap_or("")
}

fn optional(value: &str) -> Option<String> {
    if value.is_empty() {
        None
    } else {
        Some(value.to_string())
    }
}

/// Parse a date cell: numeric spreadsheet serials and the known free-text
/// shapes. Returns None for anything ambiguous or invalid: a bad date must
/// reject the row, never default.
pub(crate) fn parse_flexible_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }

    if let Ok(serial) = raw.parse::<f64>() {
        if serial <= 0.0 {
            return None;
        }
        let unix_secs = ((serial - SPREADSHEET_EPOCH_OFFSET_DAYS) * 86_400.0) as i64;
        return DateTime::from_timestamp(unix_secs, 0).map(|dt| dt.date_naive());
    }

    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(raw, format) {
            return Some(date);
        }
    }
    for format in DATETIME_FORMATS {
        if let Ok(ts) = chrono::NaiveDateTime::parse_from_str(raw, format) {
            return Some(ts.date());
        }
    }

    None
}

fn parse_amount(raw: &str) -> f64 {
    raw.replace(['$', ','], "").trim().parse().unwrap_or(0.0)
}

fn parse_count(raw: &str) -> i32 {
    raw.parse().unwrap_or(0)
}

/// Split a combined `scheduled/total` visits cell. A single number is read
/// as the scheduled count.
fn parse_visits(raw: &str) -> (Option<i32>, Option<i32>) {
    let raw = raw.trim();
    if raw.is_empty() {
        return (None, None);
    }
    match raw.split_once('/') {
        Some((scheduled, total)) => (
            scheduled.trim().parse().ok(),
            total.trim().parse().ok(),
        ),
        None => (raw.parse().ok(), None),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<String> {
        cells.iter().map(|s| s.to_string()).collect()
    }

    fn standard16(cells: &[&str]) -> Result<AppointmentRecord, RowReject> {
        Normalizer::new(SourceLayout::Standard16).normalize(&row(cells))
    }

    #[test]
    fn test_blank_name_rejected() {
        let result = standard16(&["", "02/14/2026", "Confirmed"]);
        assert_eq!(result.unwrap_err(), RowReject::BlankName);
    }

    #[test]
    fn test_totals_row_rejected() {
        let result = standard16(&["Total", "02/14/2026", ""]);
        assert_eq!(result.unwrap_err(), RowReject::TotalsRow);
    }

    #[test]
    fn test_missing_date_rejected() {
        let result = standard16(&["Jane Doe", "", "Confirmed"]);
        assert_eq!(result.unwrap_err(), RowReject::MissingDate);
    }

    #[test]
    fn test_invalid_calendar_date_rejected() {
        let result = standard16(&["Jane Doe", "2/30/2026", "Confirmed"]);
        assert_eq!(
            result.unwrap_err(),
            RowReject::UnparseableDate("2/30/2026".to_string())
        );
    }

    #[test]
    fn test_spreadsheet_serial_date() {
        // 45000 days past 1899-12-30 is 2023-03-15.
        let record = standard16(&["Jane Doe", "45000", "Confirmed"]).unwrap();
        assert_eq!(
            record.date_of_service,
            NaiveDate::from_ymd_opt(2023, 3, 15)
        );
    }

    #[test]
    fn test_negative_serial_rejected() {
        let result = standard16(&["Jane Doe", "-3", "Confirmed"]);
        assert!(matches!(result, Err(RowReject::UnparseableDate(_))));
    }

    #[test]
    fn test_status_defaults_to_new() {
        let record = standard16(&["Jane Doe", "02/14/2026", ""]).unwrap();
        assert_eq!(record.appointment_status, "New");
    }

    #[test]
    fn test_standard16_full_row() {
        let record = standard16(&[
            "Jane Doe",
            "02/14/2026",
            "Checked In",
            "Dr. Patel",
            "PT Evaluation",
            "Main Clinic",
            "INV-1042",
            "Unpaid",
            "Insurance",
            "Yes",
            "$1,250.00",
            "300",
            "4",
            "frontdesk",
            "",
            "Rescheduled by J. Alvarez on 02/10/2026 3:30 PM",
        ])
        .unwrap();

        assert_eq!(record.provider, "Dr. Patel");
        assert_eq!(record.visit_type.as_deref(), Some("PT Evaluation"));
        assert_eq!(record.location.as_deref(), Some("Main Clinic"));
        assert_eq!(record.invoice_no.as_deref(), Some("INV-1042"));
        assert!(record.claim_created);
        assert_eq!(record.charges, 1250.0);
        assert_eq!(record.payments, 300.0);
        assert_eq!(record.units, 4);
        assert!(record.modification_history.is_some());
        assert!(record.patient_external_id.is_none());
    }

    #[test]
    fn test_auth20_authorization_block() {
        let record = Normalizer::new(SourceLayout::Auth20)
            .normalize(&row(&[
                "Jane Doe",
                "PT-000412",
                "02/14/2026",
                "Confirmed",
                "Dr. Patel",
                "PT Follow-up",
                "Main Clinic",
                "INV-1042",
                "Paid",
                "Patient",
                "No",
                "150",
                "150",
                "1",
                "frontdesk",
                "",
                "",
                "AUTH-7781",
                "3/12",
                "06/30/2026",
            ]))
            .unwrap();

        assert_eq!(record.patient_external_id.as_deref(), Some("PT-000412"));
        assert_eq!(record.authorization_number.as_deref(), Some("AUTH-7781"));
        assert_eq!(record.scheduled_visits, Some(3));
        assert_eq!(record.total_visits, Some(12));
        assert_eq!(
            record.expiration_date,
            NaiveDate::from_ymd_opt(2026, 6, 30)
        );
    }

    #[test]
    fn test_legacy10_ignores_missing_columns() {
        let record = Normalizer::new(SourceLayout::Legacy10)
            .normalize(&row(&[
                "Jane Doe",
                "02/14/2026",
                "Confirmed",
                "Dr. Patel",
                "PT Evaluation",
                "INV-1042",
                "Unpaid",
                "450",
                "0",
                "frontdesk",
            ]))
            .unwrap();

        assert_eq!(record.location, None);
        assert_eq!(record.units, 0);
        assert!(!record.claim_created);
        assert_eq!(record.charges, 450.0);
        assert_eq!(record.created_by.as_deref(), Some("frontdesk"));
    }

    #[test]
    fn test_short_row_does_not_panic() {
        let record = standard16(&["Jane Doe", "02/14/2026"]).unwrap();
        assert_eq!(record.appointment_status, "New");
        assert_eq!(record.provider, "");
    }
}
