//! Sync chain runs against a mocked upstream API
//!
//! Exercises pagination termination, batch chaining, retry/backoff, fatal
//! authentication failures, and the re-trigger guard.

mod common;

use std::sync::Arc;
use std::time::Duration;

use serde_json::{json, Value};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use common::MemoryStore;
use intake_server::ingest::progress::RunPhase;
use intake_server::ingest::store::AppointmentStore;
use intake_server::ingest::sync::{SyncApiConfig, SyncClient, SyncError, SyncOrchestrator};
use intake_server::ingest::{IngestKind, ProgressTracker};

const LOGIN_PATH: &str = "/auth/token";
const DATA_PATH: &str = "/report/general-visit";

fn config(server: &MockServer, per_page: u32, pages_per_batch: u32) -> SyncApiConfig {
    let mut config = SyncApiConfig::new(
        format!("{}{}", server.uri(), LOGIN_PATH),
        format!("{}{}", server.uri(), DATA_PATH),
        "reports-user",
        "reports-pass",
    );
    config.per_page = per_page;
    config.pages_per_batch = pages_per_batch;
    config.from_date = Some("2026-01-01".to_string());
    config.to_date = Some("2026-03-01".to_string());
    config.retry_delay = Duration::from_millis(10);
    config
}

fn orchestrator(store: &Arc<MemoryStore>, config: SyncApiConfig, progress: &ProgressTracker) -> SyncOrchestrator {
    SyncOrchestrator::new(
        store.clone() as Arc<dyn AppointmentStore>,
        SyncClient::new(config),
        progress.clone(),
    )
}

fn page_rows(count: usize, offset: usize) -> Value {
    let rows: Vec<Value> = (0..count)
        .map(|i| {
            json!({
                "patient_full_name": format!("Patient {}", offset + i),
                "date_of_service": "2026-02-14",
                "appointment_status": "Confirmed",
                "provider_name": "Dr. Patel"
            })
        })
        .collect();
    json!({ "docs": rows })
}

async fn mount_login(server: &MockServer, expected_calls: u64) {
    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": { "access_token": "tok-1" }
        })))
        .expect(expected_calls)
        .mount(server)
        .await;
}

async fn mount_page(server: &MockServer, page: u32, body: Value) {
    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .and(query_param("page", page.to_string()))
        .respond_with(ResponseTemplate::new(200).set_body_json(body))
        .expect(1)
        .mount(server)
        .await;
}

#[tokio::test]
async fn test_pagination_stops_after_first_partial_page() {
    let server = MockServer::start().await;
    // Two full pages then a partial: exactly three fetches, no fourth.
    mount_login(&server, 1).await;
    mount_page(&server, 1, page_rows(3, 0)).await;
    mount_page(&server, 2, page_rows(3, 3)).await;
    mount_page(&server, 3, page_rows(1, 6)).await;

    let store = Arc::new(MemoryStore::new());
    let progress = ProgressTracker::default();
    let config = config(&server, 3, 10);
    let window = config.resolve_window().unwrap();

    let run_id = progress.begin(IngestKind::ApiSync).await;
    orchestrator(&store, config, &progress)
        .run_chain(run_id, window, 1)
        .await;

    let state = progress.get(run_id).await.unwrap();
    assert_eq!(state.state, RunPhase::Complete);
    assert_eq!(state.imported, 7);
    assert_eq!(state.cursor, Some(4));
    assert_eq!(store.len(), 7);

    // Mock expectations (one call per page, none past page 3) are verified
    // when the server drops.
}

#[tokio::test]
async fn test_full_page_chains_a_second_batch_and_no_third() {
    let server = MockServer::start().await;
    // One page per batch: a full first page hands off to batch 2; the short
    // second page ends the chain with no batch 3.
    mount_login(&server, 2).await;
    mount_page(&server, 1, page_rows(5, 0)).await;
    mount_page(&server, 2, page_rows(2, 5)).await;

    let store = Arc::new(MemoryStore::new());
    let progress = ProgressTracker::default();
    let config = config(&server, 5, 1);
    let window = config.resolve_window().unwrap();

    let run_id = progress.begin(IngestKind::ApiSync).await;
    orchestrator(&store, config, &progress)
        .run_chain(run_id, window, 1)
        .await;

    let state = progress.get(run_id).await.unwrap();
    assert_eq!(state.state, RunPhase::Complete);
    assert_eq!(state.unit, 2);
    assert_eq!(state.imported, 7);
    assert_eq!(store.len(), 7);
}

#[tokio::test]
async fn test_auth_failure_fails_the_chain_before_any_fetch() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "message": "bad credentials"
        })))
        .expect(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_rows(0, 0)))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let progress = ProgressTracker::default();
    let config = config(&server, 3, 10);
    let window = config.resolve_window().unwrap();

    let run_id = progress.begin(IngestKind::ApiSync).await;
    orchestrator(&store, config, &progress)
        .run_chain(run_id, window, 1)
        .await;

    let state = progress.get(run_id).await.unwrap();
    assert_eq!(state.state, RunPhase::Error);
    assert!(state.error.as_deref().unwrap().contains("login failed"));
    assert_eq!(store.len(), 0);
}

#[tokio::test]
async fn test_transient_fetch_failure_retries_then_succeeds() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;

    // First hit on page 1 is a 500; the retry gets the real page.
    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .and(query_param("page", "1"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;
    mount_page(&server, 1, page_rows(2, 0)).await;

    let store = Arc::new(MemoryStore::new());
    let progress = ProgressTracker::default();
    let config = config(&server, 5, 10);
    let window = config.resolve_window().unwrap();

    let run_id = progress.begin(IngestKind::ApiSync).await;
    orchestrator(&store, config, &progress)
        .run_chain(run_id, window, 1)
        .await;

    let state = progress.get(run_id).await.unwrap();
    assert_eq!(state.state, RunPhase::Complete);
    assert_eq!(store.len(), 2);
}

#[tokio::test]
async fn test_exhausted_retries_stop_the_chain() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .respond_with(ResponseTemplate::new(503))
        .expect(3)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryStore::new());
    let progress = ProgressTracker::default();
    let config = config(&server, 3, 10);
    let window = config.resolve_window().unwrap();

    let run_id = progress.begin(IngestKind::ApiSync).await;
    orchestrator(&store, config, &progress)
        .run_chain(run_id, window, 1)
        .await;

    let state = progress.get(run_id).await.unwrap();
    assert_eq!(state.state, RunPhase::Error);
    assert!(state.error.as_deref().unwrap().contains("page 1"));
    assert_eq!(store.len(), 0);
}

#[tokio::test]
async fn test_rows_without_identity_are_skipped() {
    let server = MockServer::start().await;
    mount_login(&server, 1).await;
    mount_page(
        &server,
        1,
        json!({
            "docs": [
                {
                    "patient_full_name": "Jane Doe",
                    "date_of_service": "2026-02-14",
                    "appointment_status": "Confirmed"
                },
                { "date_of_service": "2026-02-15" }
            ]
        }),
    )
    .await;

    let store = Arc::new(MemoryStore::new());
    let progress = ProgressTracker::default();
    let config = config(&server, 5, 10);
    let window = config.resolve_window().unwrap();

    let run_id = progress.begin(IngestKind::ApiSync).await;
    orchestrator(&store, config, &progress)
        .run_chain(run_id, window, 1)
        .await;

    let state = progress.get(run_id).await.unwrap();
    assert_eq!(state.state, RunPhase::Complete);
    assert_eq!(state.imported, 1);
    assert_eq!(state.skipped, 1);
    assert_eq!(store.len(), 1);
}

#[tokio::test]
async fn test_retrigger_while_running_is_rejected() {
    use intake_server::features::sync::commands::trigger::{self, TriggerSyncCommand};
    use intake_server::features::IngestState;
    use intake_server::ingest::import::ImportConfig;
    use intake_server::ingest::staging::StagedFiles;

    let server = MockServer::start().await;
    // A slow login keeps the first chain alive while the second trigger
    // arrives.
    Mock::given(method("POST"))
        .and(path(LOGIN_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"token": "tok-1"}))
                .set_delay(Duration::from_millis(500)),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(DATA_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(page_rows(0, 0)))
        .mount(&server)
        .await;

    let staging_dir = tempfile::tempdir().unwrap();
    let staging = StagedFiles::new(staging_dir.path(), 1024);
    staging.init().await.unwrap();

    let state = IngestState {
        store: Arc::new(MemoryStore::new()),
        staging,
        progress: ProgressTracker::default(),
        import_config: ImportConfig::default(),
        sync_config: Some(config(&server, 3, 10)),
    };

    let first = trigger::handle(&state, TriggerSyncCommand::default())
        .await
        .unwrap();

    let second = trigger::handle(&state, TriggerSyncCommand::default()).await;
    assert!(matches!(
        second,
        Err(intake_server::features::sync::commands::trigger::TriggerSyncError::AlreadyRunning)
    ));

    // The first run is still the one the kind pointer shows.
    let current = state
        .progress
        .current(IngestKind::ApiSync)
        .await
        .unwrap();
    assert_eq!(current.run_id, first.run_id);
}

#[tokio::test]
async fn test_unconfigured_sync_is_rejected() {
    use intake_server::features::sync::commands::trigger::{self, TriggerSyncCommand, TriggerSyncError};
    use intake_server::features::IngestState;
    use intake_server::ingest::import::ImportConfig;
    use intake_server::ingest::staging::StagedFiles;

    let staging_dir = tempfile::tempdir().unwrap();
    let staging = StagedFiles::new(staging_dir.path(), 1024);
    staging.init().await.unwrap();

    let state = IngestState {
        store: Arc::new(MemoryStore::new()),
        staging,
        progress: ProgressTracker::default(),
        import_config: ImportConfig::default(),
        sync_config: None,
    };

    let result = trigger::handle(&state, TriggerSyncCommand::default()).await;
    assert!(matches!(
        result,
        Err(TriggerSyncError::Sync(SyncError::NotConfigured))
    ));
}

#[tokio::test]
async fn test_misordered_window_is_fatal_before_any_work() {
    let server = MockServer::start().await;
    let mut config = config(&server, 3, 10);
    config.from_date = Some("2026-03-01".to_string());
    config.to_date = Some("2026-02-01".to_string());

    // resolve_window is the trigger-time gate; the chain never starts.
    assert!(matches!(config.resolve_window(), Err(SyncError::Window(_))));
    assert_eq!(server.received_requests().await.unwrap().len(), 0);
}
