pub mod trigger;

pub use trigger::{TriggerSyncCommand, TriggerSyncError, TriggerSyncResponse};
