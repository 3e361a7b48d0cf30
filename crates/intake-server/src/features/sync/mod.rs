//! API sync feature
//!
//! Trigger surface for the external-API sync chain, plus its progress
//! polling endpoints.

pub mod commands;
pub mod queries;
pub mod routes;

pub use routes::sync_routes;
