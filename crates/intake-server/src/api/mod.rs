pub mod response;

use axum::{
    http::StatusCode,
    response::IntoResponse,
    routing::get,
    Json, Router,
};
use serde_json::json;
use sqlx::PgPool;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tower_http::trace::TraceLayer;

use crate::config::Config;
use crate::features::{self, IngestState};
use crate::ingest::staging::StagedFiles;
use crate::ingest::{PgAppointmentStore, ProgressTracker};

/// Build the shared feature state from configuration and a live pool.
pub async fn build_state(config: &Config, db: PgPool) -> anyhow::Result<IngestState> {
    let staging = StagedFiles::new(&config.import.staging_dir, config.import.max_upload_bytes);
    staging.init().await?;

    Ok(IngestState {
        store: Arc::new(PgAppointmentStore::new(db)),
        staging,
        progress: ProgressTracker::default(),
        import_config: config.import.to_import_config(),
        sync_config: config.sync.clone(),
    })
}

/// Bind and serve until shutdown.
pub async fn serve(config: Config, db: PgPool) -> anyhow::Result<()> {
    let state = build_state(&config, db).await?;
    let app = create_router(state);

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port).parse()?;
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    Ok(())
}

pub fn create_router(state: IngestState) -> Router {
    let api_v1 = features::router(state);

    Router::new()
        .route("/", get(root))
        .route("/health", get(health))
        .nest("/api/v1", api_v1)
        .layer(TraceLayer::new_for_http())
}

async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Intake Server",
        "version": env!("CARGO_PKG_VERSION"),
        "status": "running"
    }))
}

async fn health() -> impl IntoResponse {
    (StatusCode::OK, "OK")
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_err() {
        // Without a signal handler the server simply runs until killed.
        std::future::pending::<()>().await;
    }
    tracing::info!("shutdown signal received, draining");
    // Give in-flight background chunks a moment to publish progress.
    tokio::time::sleep(Duration::from_millis(100)).await;
}
