pub mod confirm;
pub mod preview;
pub mod start;

pub use confirm::{ConfirmImportCommand, ConfirmImportError, ConfirmImportResponse};
pub use preview::{PreviewImportCommand, PreviewImportError, PreviewImportResponse};
pub use start::{StartImportCommand, StartImportError, StartImportResponse};
