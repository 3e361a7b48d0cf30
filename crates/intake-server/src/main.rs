//! Intake Server - Main entry point

use anyhow::Result;
use intake_common::logging::{init_logging, LogConfig};
use tracing::info;

use intake_server::{api, config::Config, db};

#[tokio::main]
async fn main() -> Result<()> {
    // Initialize logging; environment variables win over these defaults.
    let base = LogConfig {
        log_file_prefix: "intake-server".to_string(),
        filter_directives: Some(
            "intake_server=debug,tower_http=debug,sqlx=info".to_string(),
        ),
        ..LogConfig::default()
    };
    let log_config = LogConfig::from_env(base)?;
    init_logging(&log_config)?;

    info!("Starting Intake Server");

    let config = Config::load()?;
    info!(
        "Configuration loaded - server will bind to {}:{}",
        config.server.host, config.server.port
    );

    let db_pool = db::create_pool(&config.database).await?;

    sqlx::migrate!("../../migrations")
        .run(&db_pool)
        .await
        .map_err(|e| anyhow::anyhow!("Failed to run migrations: {}", e))?;

    info!("Database migrations completed");

    api::serve(config, db_pool).await
}
