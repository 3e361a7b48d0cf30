//! Appointment identity fingerprint
//!
//! A deterministic hash over the natural key of an appointment (patient
//! name, date of service, appointment status), used as the store's
//! uniqueness constraint, the upsert conflict target, and the idempotency
//! key for replayed batches. The same real-world appointment collapses to
//! one row regardless of whether it arrived via file import or API sync.
//!
//! The formula is versioned. Changing its inputs requires a one-time
//! backfill and duplicate-collapse migration (see
//! `migrations/20260301000002_rebuild_fingerprint_with_status.sql`, which
//! rebuilt v1 `name|date` into the current v2 `name|date|status`).
//! Fingerprints are never recomputed opportunistically.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Current fingerprint formula version. Bump together with a rebuild
/// migration, never alone.
pub const FINGERPRINT_VERSION: u32 = 2;

/// Sentinel standing in for a missing date of service inside the hashed key.
const NULL_DATE_SENTINEL: &str = "null-date";

/// SHA-256 hex digest identifying one logical appointment
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Fingerprint(String);

impl Fingerprint {
    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_string(self) -> String {
        self.0
    }
}

impl std::fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<String> for Fingerprint {
    fn from(hex: String) -> Self {
        Fingerprint(hex)
    }
}

/// Compute the v2 fingerprint for an appointment's natural key.
///
/// Name and status are trimmed and lowercased so the hash is invariant to
/// the casing/whitespace noise the upstream exports produce; the date is
/// rendered `YYYY-MM-DD` or the null sentinel.
pub fn compute(name: &str, date_of_service: Option<NaiveDate>, status: &str) -> Fingerprint {
    let date = date_of_service
        .map(|d| d.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| NULL_DATE_SENTINEL.to_string());

    let key = format!(
        "{}|{}|{}",
        name.trim().to_lowercase(),
        date,
        status.trim().to_lowercase()
    );

    Fingerprint(hex::encode(Sha256::digest(key.as_bytes())))
}
