//! Configuration management

use std::time::Duration;

use crate::ingest::import::ImportConfig;
use crate::ingest::sync::SyncApiConfig;

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8000;

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/intake";

/// Default maximum database connections in the pool.
pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 10;

/// Default minimum database connections in the pool.
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;

/// Default database connection timeout in seconds.
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;

/// Default staging directory for uploaded import files.
pub const DEFAULT_STAGING_DIR: &str = "./storage/imports";

/// Default upload size cap (50 MB).
pub const DEFAULT_MAX_UPLOAD_BYTES: usize = 50 * 1024 * 1024;

/// Server configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub import: ImportSettings,
    /// Absent until the upstream API endpoints are configured; the sync
    /// trigger rejects requests until then.
    pub sync: Option<SyncApiConfig>,
}

/// Server-specific configuration
#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

/// Database configuration
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
}

/// File import settings
#[derive(Debug, Clone)]
pub struct ImportSettings {
    pub staging_dir: String,
    pub max_upload_bytes: usize,
    pub chunk_size: usize,
    pub max_attempts: u32,
}

impl ImportSettings {
    pub fn to_import_config(&self) -> ImportConfig {
        ImportConfig {
            chunk_size: self.chunk_size,
            max_attempts: self.max_attempts,
            ..ImportConfig::default()
        }
    }
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let defaults = ImportConfig::default();
        let config = Config {
            server: ServerConfig {
                host: std::env::var("INTAKE_HOST")
                    .unwrap_or_else(|_| DEFAULT_SERVER_HOST.to_string()),
                port: env_parsed("INTAKE_PORT", DEFAULT_SERVER_PORT),
            },
            database: DatabaseConfig {
                url: std::env::var("DATABASE_URL")
                    .unwrap_or_else(|_| DEFAULT_DATABASE_URL.to_string()),
                max_connections: env_parsed(
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_DATABASE_MAX_CONNECTIONS,
                ),
                min_connections: env_parsed(
                    "DATABASE_MIN_CONNECTIONS",
                    DEFAULT_DATABASE_MIN_CONNECTIONS,
                ),
                connect_timeout_secs: env_parsed(
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                ),
            },
            import: ImportSettings {
                staging_dir: std::env::var("IMPORT_STAGING_DIR")
                    .unwrap_or_else(|_| DEFAULT_STAGING_DIR.to_string()),
                max_upload_bytes: env_parsed("IMPORT_MAX_UPLOAD_BYTES", DEFAULT_MAX_UPLOAD_BYTES),
                chunk_size: env_parsed("IMPORT_CHUNK_SIZE", defaults.chunk_size),
                max_attempts: env_parsed("IMPORT_MAX_ATTEMPTS", defaults.max_attempts),
            },
            sync: load_sync_config(),
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.database.url.is_empty() {
            anyhow::bail!("Database URL cannot be empty");
        }

        if self.database.max_connections == 0 {
            anyhow::bail!("Database max_connections must be greater than 0");
        }

        if self.database.min_connections > self.database.max_connections {
            anyhow::bail!(
                "Database min_connections ({}) cannot be greater than max_connections ({})",
                self.database.min_connections,
                self.database.max_connections
            );
        }

        if self.import.chunk_size == 0 {
            anyhow::bail!("Import chunk size must be greater than 0");
        }

        if self.import.max_attempts == 0 {
            anyhow::bail!("Import max attempts must be at least 1");
        }

        if self.sync.is_none() {
            tracing::warn!(
                "API sync is not configured (APPOINTMENTS_API_LOGIN_URL / APPOINTMENTS_API_URL); \
                 the sync trigger will reject requests"
            );
        }

        Ok(())
    }
}

/// Sync configuration is optional: without both endpoints the feature is
/// off and the trigger endpoint reports it as unconfigured.
fn load_sync_config() -> Option<SyncApiConfig> {
    let login_url = std::env::var("APPOINTMENTS_API_LOGIN_URL").ok()?;
    let data_url = std::env::var("APPOINTMENTS_API_URL").ok()?;
    if login_url.trim().is_empty() || data_url.trim().is_empty() {
        return None;
    }

    let mut sync = SyncApiConfig::new(
        login_url,
        data_url,
        std::env::var("APPOINTMENTS_API_USERNAME").unwrap_or_default(),
        std::env::var("APPOINTMENTS_API_PASSWORD").unwrap_or_default(),
    );

    sync.from_date = std::env::var("APPOINTMENTS_API_FROM_DATE").ok();
    sync.to_date = std::env::var("APPOINTMENTS_API_TO_DATE").ok();
    sync.pages_per_batch = env_parsed("SYNC_PAGES_PER_BATCH", sync.pages_per_batch);
    sync.per_page = env_parsed("SYNC_PER_PAGE", sync.per_page);
    sync.upsert_chunk = env_parsed("SYNC_UPSERT_CHUNK", sync.upsert_chunk);
    sync.fetch_attempts = env_parsed("SYNC_FETCH_ATTEMPTS", sync.fetch_attempts);
    sync.retry_delay = Duration::from_millis(env_parsed(
        "SYNC_RETRY_DELAY_MS",
        sync.retry_delay.as_millis() as u64,
    ));

    Some(sync)
}

fn env_parsed<T: std::str::FromStr>(name: &str, default: T) -> T {
    std::env::var(name)
        .ok()
        .and_then(|s| s.parse().ok())
        .unwrap_or(default)
}

impl Default for Config {
    fn default() -> Self {
        let defaults = ImportConfig::default();
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
            },
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
            },
            import: ImportSettings {
                staging_dir: DEFAULT_STAGING_DIR.to_string(),
                max_upload_bytes: DEFAULT_MAX_UPLOAD_BYTES,
                chunk_size: defaults.chunk_size,
                max_attempts: defaults.max_attempts,
            },
            sync: None,
        }
    }
}
