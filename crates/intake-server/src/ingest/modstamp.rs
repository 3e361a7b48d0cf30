//! Modification-history marker extraction
//!
//! The export's modification-history cell is free text mixing an actor and
//! one or more timestamps, e.g.
//! `"Rescheduled by J. Alvarez on 02/21/2026 10:15 AM; created 02/01/2026"`.
//! There is no fixed format. The diff engine only cares about the most
//! recent embedded timestamp, so this module pulls every date-looking
//! substring out with a tolerant pattern, parses each, and keeps the
//! latest. The outcome is explicit: a parsed timestamp, the raw trimmed
//! text when nothing parses, or absent for empty input, so callers never have
//! to guess whether unparsed text compared equal by accident.

use chrono::{NaiveDate, NaiveDateTime};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::sync::OnceLock;

/// Extracted modification marker for one record
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum ModificationMarker {
    /// The field was empty
    Absent,
    /// Non-empty text with no recognizable timestamp; trimmed verbatim
    Raw(String),
    /// The most recent timestamp embedded in the text
    Timestamp(NaiveDateTime),
}

impl ModificationMarker {
    pub fn is_absent(&self) -> bool {
        matches!(self, ModificationMarker::Absent)
    }

    /// Human-readable rendering for preview rows
    pub fn display(&self) -> String {
        match self {
            ModificationMarker::Absent => String::new(),
            ModificationMarker::Raw(text) => text.clone(),
            ModificationMarker::Timestamp(ts) => ts.format("%m/%d/%Y %I:%M %p").to_string(),
        }
    }
}

/// Date-looking substrings: `m/d/Y` or `Y-m-d`, optionally followed by a
/// time and meridiem.
fn timestamp_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(
            r"(?ix)
            \b(
                \d{1,2}/\d{1,2}/\d{4} (?: \s+ \d{1,2}:\d{2} (?: :\d{2} )? (?: \s* (?:AM|PM) )? )?
                |
                \d{4}-\d{2}-\d{2} (?: [\ T] \d{2}:\d{2} (?: :\d{2} )? )?
            )",
        )
        .expect("timestamp pattern is valid")
    })
}

const DATETIME_FORMATS: &[&str] = &[
    "%m/%d/%Y %I:%M:%S %p",
    "%m/%d/%Y %I:%M %p",
    "%m/%d/%Y %H:%M:%S",
    "%m/%d/%Y %H:%M",
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M",
];

const DATE_FORMATS: &[&str] = &["%m/%d/%Y", "%Y-%m-%d"];

fn parse_fragment(fragment: &str) -> Option<NaiveDateTime> {
    let fragment = fragment.trim();

    for format in DATETIME_FORMATS {
        if let Ok(ts) = NaiveDateTime::parse_from_str(fragment, format) {
            return Some(ts);
        }
    }
    for format in DATE_FORMATS {
        if let Ok(date) = NaiveDate::parse_from_str(fragment, format) {
            return date.and_hms_opt(0, 0, 0);
        }
    }
    None
}

/// Extract the most recent timestamp from a modification-history cell.
pub fn extract_latest(text: &str) -> ModificationMarker {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return ModificationMarker::Absent;
    }

    let latest = timestamp_pattern()
        .find_iter(trimmed)
        .filter_map(|m| parse_fragment(m.as_str()))
        .max();

    match latest {
        Some(ts) => ModificationMarker::Timestamp(ts),
        None => ModificationMarker::Raw(trimmed.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ts(s: &str) -> NaiveDateTime {
        NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S").unwrap()
    }

    #[test]
    fn test_empty_is_absent() {
        assert_eq!(extract_latest(""), ModificationMarker::Absent);
        assert_eq!(extract_latest("   "), ModificationMarker::Absent);
    }

    #[test]
    fn test_no_timestamp_falls_back_to_raw() {
        assert_eq!(
            extract_latest("  edited by front desk "),
            ModificationMarker::Raw("edited by front desk".to_string())
        );
    }

    #[test]
    fn test_single_us_timestamp() {
        let marker = extract_latest("Rescheduled by J. Alvarez on 02/21/2026 10:15 AM");
        assert_eq!(
            marker,
            ModificationMarker::Timestamp(ts("2026-02-21 10:15:00"))
        );
    }

    #[test]
    fn test_picks_most_recent_of_many() {
        let marker = extract_latest(
            "created 02/01/2026 9:00 AM; confirmed 02/10/2026; rescheduled 02/21/2026 10:15 AM",
        );
        assert_eq!(
            marker,
            ModificationMarker::Timestamp(ts("2026-02-21 10:15:00"))
        );
    }

    #[test]
    fn test_iso_shapes() {
        assert_eq!(
            extract_latest("synced at 2026-02-21T10:15:00 by api"),
            ModificationMarker::Timestamp(ts("2026-02-21 10:15:00"))
        );
        assert_eq!(
            extract_latest("2026-02-21"),
            ModificationMarker::Timestamp(ts("2026-02-21 00:00:00"))
        );
    }

    #[test]
    fn test_pm_meridiem() {
        let marker = extract_latest("updated 2/3/2026 4:05 PM");
        assert_eq!(
            marker,
            ModificationMarker::Timestamp(ts("2026-02-03 16:05:00"))
        );
    }

    #[test]
    fn test_date_only_ranks_below_later_datetime() {
        // A bare date parses to midnight, so a timed entry the same day wins.
        let marker = extract_latest("02/21/2026; also 02/21/2026 08:30 AM");
        assert_eq!(
            marker,
            ModificationMarker::Timestamp(ts("2026-02-21 08:30:00"))
        );
    }
}
