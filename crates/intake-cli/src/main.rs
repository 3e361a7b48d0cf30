//! Intake CLI - Main entry point

use clap::Parser;
use intake_cli::{client::ApiClient, commands, Cli, Commands};
use intake_common::logging::{init_logging, LogConfig, LogLevel};
use std::process;
use tracing::error;

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();

    // Quiet by default; the command output is the interface.
    let base = LogConfig {
        level: if cli.verbose {
            LogLevel::Debug
        } else {
            LogLevel::Warn
        },
        log_file_prefix: "intake-cli".to_string(),
        ..LogConfig::default()
    };
    let log_config = LogConfig::from_env(base).unwrap_or_default();
    let _ = init_logging(&log_config);

    if let Err(e) = execute_command(&cli).await {
        error!(error = %e, "Command failed");
        eprintln!("Error: {}", e);
        process::exit(1);
    }
}

async fn execute_command(cli: &Cli) -> intake_cli::Result<()> {
    let client = ApiClient::new(&cli.server)?;

    match &cli.command {
        Commands::Sync { start_page } => commands::sync(&client, *start_page).await,
        Commands::Import {
            file,
            mode,
            layout,
            preview,
        } => commands::import(&client, file, mode, layout.as_deref(), *preview).await,
        Commands::Status { kind } => commands::status(&client, *kind).await,
    }
}
