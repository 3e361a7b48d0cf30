//! Historical export layouts
//!
//! The scheduling system's spreadsheet export has changed shape several
//! times over the years. Each era is a tagged variant carrying its own
//! column-index table; the variant is chosen once per import run, never per
//! row. Rows from one file never mix layouts.
//!
//! Column positions are 0-based into the raw CSV row (headers in row 1,
//! data from row 2).

use serde::{Deserialize, Serialize};

/// Closed set of known export layouts, oldest first
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub enum SourceLayout {
    /// 10 columns: name, date, status, provider, service, invoice no/status,
    /// charges, payments, created-by. Pre-dates location and unit tracking.
    #[serde(rename = "legacy-10")]
    Legacy10,
    /// 12 columns: adds location and units.
    #[serde(rename = "legacy-12")]
    Legacy12,
    /// 14 columns: adds current responsibility and the claim-created flag.
    #[serde(rename = "claims-14")]
    Claims14,
    /// 16 columns: adds cancellation reason and modification history. The
    /// layout most archived exports are in.
    #[serde(rename = "standard-16")]
    Standard16,
    /// 20 columns: adds patient external ID and the authorization block
    /// (auth number, scheduled/total visits, expiration date). Current.
    #[default]
    #[serde(rename = "auth-20")]
    Auth20,
}

/// Column-index table for one layout.
///
/// `patient_name` and `date_of_service` exist in every era; everything else
/// is optional and defaults when the era pre-dates the column.
#[derive(Debug, Clone, Copy)]
pub struct ColumnMap {
    pub patient_name: usize,
    pub patient_external_id: Option<usize>,
    pub date_of_service: usize,
    pub appointment_status: usize,
    pub provider: Option<usize>,
    pub visit_type: Option<usize>,
    pub location: Option<usize>,
    pub invoice_no: Option<usize>,
    pub invoice_status: Option<usize>,
    pub current_responsibility: Option<usize>,
    pub claim_created: Option<usize>,
    pub charges: Option<usize>,
    pub payments: Option<usize>,
    pub units: Option<usize>,
    pub created_by: Option<usize>,
    pub cancellation_reason: Option<usize>,
    pub modification_history: Option<usize>,
    pub authorization_number: Option<usize>,
    /// Combined "scheduled/total" visit counts, e.g. `3/12`.
    pub visits: Option<usize>,
    pub expiration_date: Option<usize>,
}

const LEGACY_10: ColumnMap = ColumnMap {
    patient_name: 0,
    patient_external_id: None,
    date_of_service: 1,
    appointment_status: 2,
    provider: Some(3),
    visit_type: Some(4),
    location: None,
    invoice_no: Some(5),
    invoice_status: Some(6),
    current_responsibility: None,
    claim_created: None,
    charges: Some(7),
    payments: Some(8),
    units: None,
    created_by: Some(9),
    cancellation_reason: None,
    modification_history: None,
    authorization_number: None,
    visits: None,
    expiration_date: None,
};

const LEGACY_12: ColumnMap = ColumnMap {
    patient_name: 0,
    patient_external_id: None,
    date_of_service: 1,
    appointment_status: 2,
    provider: Some(3),
    visit_type: Some(4),
    location: Some(5),
    invoice_no: Some(6),
    invoice_status: Some(7),
    current_responsibility: None,
    claim_created: None,
    charges: Some(8),
    payments: Some(9),
    units: Some(10),
    created_by: Some(11),
    cancellation_reason: None,
    modification_history: None,
    authorization_number: None,
    visits: None,
    expiration_date: None,
};

const CLAIMS_14: ColumnMap = ColumnMap {
    patient_name: 0,
    patient_external_id: None,
    date_of_service: 1,
    appointment_status: 2,
    provider: Some(3),
    visit_type: Some(4),
    location: Some(5),
    invoice_no: Some(6),
    invoice_status: Some(7),
    current_responsibility: Some(8),
    claim_created: Some(9),
    charges: Some(10),
    payments: Some(11),
    units: Some(12),
    created_by: Some(13),
    cancellation_reason: None,
    modification_history: None,
    authorization_number: None,
    visits: None,
    expiration_date: None,
};

const STANDARD_16: ColumnMap = ColumnMap {
    cancellation_reason: Some(14),
    modification_history: Some(15),
    ..CLAIMS_14
};

const AUTH_20: ColumnMap = ColumnMap {
    patient_name: 0,
    patient_external_id: Some(1),
    date_of_service: 2,
    appointment_status: 3,
    provider: Some(4),
    visit_type: Some(5),
    location: Some(6),
    invoice_no: Some(7),
    invoice_status: Some(8),
    current_responsibility: Some(9),
    claim_created: Some(10),
    charges: Some(11),
    payments: Some(12),
    units: Some(13),
    created_by: Some(14),
    cancellation_reason: Some(15),
    modification_history: Some(16),
    authorization_number: Some(17),
    visits: Some(18),
    expiration_date: Some(19),
};

impl SourceLayout {
    /// The column table for this layout
    pub fn columns(&self) -> &'static ColumnMap {
        match self {
            SourceLayout::Legacy10 => &LEGACY_10,
            SourceLayout::Legacy12 => &LEGACY_12,
            SourceLayout::Claims14 => &CLAIMS_14,
            SourceLayout::Standard16 => &STANDARD_16,
            SourceLayout::Auth20 => &AUTH_20,
        }
    }

    /// Stable identifier used in API requests and the CLI
    pub fn id(&self) -> &'static str {
        match self {
            SourceLayout::Legacy10 => "legacy-10",
            SourceLayout::Legacy12 => "legacy-12",
            SourceLayout::Claims14 => "claims-14",
            SourceLayout::Standard16 => "standard-16",
            SourceLayout::Auth20 => "auth-20",
        }
    }
}

impl std::fmt::Display for SourceLayout {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.id())
    }
}

impl std::str::FromStr for SourceLayout {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "legacy-10" => Ok(SourceLayout::Legacy10),
            "legacy-12" => Ok(SourceLayout::Legacy12),
            "claims-14" => Ok(SourceLayout::Claims14),
            "standard-16" => Ok(SourceLayout::Standard16),
            "auth-20" => Ok(SourceLayout::Auth20),
            other => Err(format!("unknown import layout: {other}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_layout_roundtrip_ids() {
        for layout in [
            SourceLayout::Legacy10,
            SourceLayout::Legacy12,
            SourceLayout::Claims14,
            SourceLayout::Standard16,
            SourceLayout::Auth20,
        ] {
            assert_eq!(layout.id().parse::<SourceLayout>(), Ok(layout));
        }
    }

    #[test]
    fn test_default_layout_is_current() {
        assert_eq!(SourceLayout::default(), SourceLayout::Auth20);
    }

    #[test]
    fn test_standard16_extends_claims14() {
        let claims = SourceLayout::Claims14.columns();
        let standard = SourceLayout::Standard16.columns();
        assert_eq!(claims.created_by, standard.created_by);
        assert_eq!(claims.cancellation_reason, None);
        assert_eq!(standard.cancellation_reason, Some(14));
        assert_eq!(standard.modification_history, Some(15));
    }

    #[test]
    fn test_auth20_shifts_after_patient_id() {
        let cols = SourceLayout::Auth20.columns();
        assert_eq!(cols.patient_external_id, Some(1));
        assert_eq!(cols.date_of_service, 2);
        assert_eq!(cols.expiration_date, Some(19));
    }

    #[test]
    fn test_unknown_layout_rejected() {
        assert!("xlsx-2027".parse::<SourceLayout>().is_err());
    }

    #[test]
    fn test_serde_uses_the_same_ids_as_from_str() {
        let json = serde_json::to_string(&SourceLayout::Standard16).unwrap();
        assert_eq!(json, "\"standard-16\"");
        let parsed: SourceLayout = serde_json::from_str("\"auth-20\"").unwrap();
        assert_eq!(parsed, SourceLayout::Auth20);
    }
}
