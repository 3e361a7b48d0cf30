//! Intake Common Library
#![deny(clippy::unwrap_used, clippy::expect_used)]
//!
//! Shared error handling and logging initialization for the Intake
//! workspace. The server and the CLI both build on these pieces:
//!
//! - **Error Handling**: the workspace error type and result alias
//! - **Logging**: tracing subscriber setup (console/file, text/JSON)

pub mod error;
pub mod logging;

pub use error::{IntakeError, Result};
