//! Intake CLI Library
//!
//! Thin operations console over the Intake server API: trigger a sync
//! chain, push an import file, poll run progress.

pub mod client;
pub mod commands;

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, CliError>;

#[derive(Debug, Error)]
pub enum CliError {
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Server error: {0}")]
    Api(String),
}

impl CliError {
    pub fn api(message: impl Into<String>) -> Self {
        Self::Api(message.into())
    }
}

/// Intake operations console
#[derive(Debug, Parser)]
#[command(name = "intake", about = "Appointment ingestion operations", version)]
pub struct Cli {
    /// Intake server base URL
    #[arg(long, env = "INTAKE_SERVER_URL", default_value = client::DEFAULT_SERVER_URL)]
    pub server: String,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Trigger an API sync chain
    Sync {
        /// Resume from this page instead of the beginning
        #[arg(long)]
        start_page: Option<u32>,
    },

    /// Upload a CSV export and import it
    Import {
        /// Path to the CSV file
        file: PathBuf,

        /// Which previewed classes to commit
        #[arg(long, default_value = "all")]
        mode: String,

        /// Export column layout (legacy-10 .. auth-20)
        #[arg(long)]
        layout: Option<String>,

        /// Preview only; classify without committing
        #[arg(long)]
        preview: bool,
    },

    /// Show current run progress
    Status {
        /// Which ingestion kind to poll
        #[arg(value_enum, default_value_t = StatusKind::Import)]
        kind: StatusKind,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StatusKind {
    Import,
    Sync,
}
