//! Ingestion and reconciliation core
//!
//! Everything between an untrusted source row and the canonical store:
//!
//! - **normalize / layout**: raw export rows → canonical records, per
//!   historical column layout
//! - **fingerprint**: the versioned identity hash both sources share
//! - **store**: the fingerprint-keyed batch upsert engine and its policies
//! - **diff**: new/update/skip classification for the preview path
//! - **import**: the chunked file-import orchestrator
//! - **sync**: the external-API client and chained sync orchestrator
//! - **progress / staging**: run progress slots and staged upload files

pub mod diff;
pub mod fingerprint;
pub mod import;
pub mod layout;
pub mod modstamp;
pub mod normalize;
pub mod progress;
pub mod record;
pub mod staging;
pub mod store;
pub mod sync;

pub use fingerprint::Fingerprint;
pub use layout::SourceLayout;
pub use progress::{IngestKind, ProgressState, ProgressTracker};
pub use record::AppointmentRecord;
pub use store::{AppointmentStore, PgAppointmentStore};
