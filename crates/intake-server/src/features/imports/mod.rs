//! File import feature
//!
//! Upload surface for the scheduling system's CSV exports: preview a file
//! against the store, confirm a previewed file with a mode, direct-commit
//! without preview, and poll run progress.

pub mod commands;
pub mod queries;
pub mod routes;

pub use routes::import_routes;
