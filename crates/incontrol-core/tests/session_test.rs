#![allow(clippy::unwrap_used)]
// Session lifecycle tests: token handling, discovery, entities and polling.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use incontrol_core::{
    ConnectivityState, CoreError, Entity, EntitySet, MemoryTokenStore, Session, SessionConfig,
    TokenRecord, TokenStore,
};

// ── Helpers ─────────────────────────────────────────────────────────

fn config(server: &MockServer) -> SessionConfig {
    let mut cfg = SessionConfig::new(
        "client-1",
        SecretString::from("secret-1".to_string()),
        "https://home.example/api/incontrol2",
    )
    .unwrap()
    .with_base_url(&Url::parse(&server.uri()).unwrap())
    .unwrap();
    cfg.timeout = Duration::from_secs(2);
    cfg.retries = 0;
    cfg
}

fn token_expiring_in(secs: i64) -> TokenRecord {
    TokenRecord {
        access_token: "stored-access".into(),
        refresh_token: "stored-refresh".into(),
        expires_at: Utc::now().timestamp() + secs,
    }
}

fn ok(body: serde_json::Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

/// One org, one group, one device with a single cellular WAN and no
/// location data.
async fn mount_single_device(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/rest/o"))
        .respond_with(ok(json!({"data": [{"id": "org1", "name": "Fleet", "status": "active"}]})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/o/org1/g"))
        .respond_with(ok(json!({"data": [{"id": 5, "name": "Vans"}]})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/o/org1/g/5/d"))
        .respond_with(ok(json!({"data": [{"id": 77, "name": "Van 7"}]})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/o/org1/g/5/d/77"))
        .respond_with(ok(json!({"data": {
            "name": "Van 7",
            "product_name": "MAX BR1 MK2",
            "fw_ver": "8.3.0",
            "status": "online"
        }})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/o/org1/g/5/d/77/loc"))
        .respond_with(ok(json!({})))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/o/org1/g/5/d/77/info/interfaces"))
        .respond_with(ok(json!({"data": [
            {"id": 1, "name": "Cellular", "type": "cellular", "signal": -68, "signal_bar": 3, "status": "Connected", "is_enable": 1}
        ]})))
        .mount(server)
        .await;
}

// ── Connect ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_connect_without_token_requires_reauthentication() {
    let server = MockServer::start().await;
    let store = Arc::new(MemoryTokenStore::new());

    let result = Session::connect(config(&server), store).await;
    assert!(
        matches!(result, Err(CoreError::ReauthenticationRequired { .. })),
        "expected ReauthenticationRequired"
    );
}

#[tokio::test]
async fn test_end_to_end_single_device() {
    let server = MockServer::start().await;
    mount_single_device(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/oauth2/token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::with_token(token_expiring_in(7200)));
    let session = Session::connect(config(&server), store.clone()).await.unwrap();

    assert_eq!(store.save_count(), 0, "valid token is not rewritten");
    assert_eq!(session.orgs().len(), 1);
    assert_eq!(session.devices().len(), 1);

    let device = session.device("77").unwrap();
    assert_eq!(device.key().to_string(), "org1_5_77");
    assert!(device.location().is_empty());
    assert_eq!(serde_json::to_value(device.location()).unwrap(), json!({}));

    let entities = EntitySet::attach_all(session.registry());
    assert_eq!(entities.len(), 4);

    let wan_status = &entities.wan_statuses[0];
    assert_eq!(wan_status.connectivity(), ConnectivityState::Connected);
    assert_eq!(wan_status.state_text(), "connected");
    assert!(wan_status.enabled_by_default());
    assert_eq!(wan_status.unique_id(), "org1_5_77_wan_status_1");
    assert_eq!(wan_status.name(), "Van 7 Cellular Status");

    let signal = &entities.signals[0];
    assert_eq!(signal.unique_id(), "org1_5_77_wan_1");
    assert_eq!(signal.icon(), "mdi:network-strength-2");
    assert_eq!(signal.unit(), "dB");

    let status = &entities.statuses[0];
    assert!(!status.is_problem());
    assert_eq!(status.name(), "Van 7 Status");
    let info = status.device_info();
    assert_eq!(info.manufacturer, "Peplink");
    assert_eq!(info.model.as_deref(), Some("MAX BR1 MK2"));
    assert_eq!(info.sw_version.as_deref(), Some("8.3.0"));

    let tracker = &entities.trackers[0];
    assert!(tracker.latitude().is_none());
    assert_eq!(tracker.state_text(), "unknown");
}

#[tokio::test]
async fn test_connect_refreshes_expiring_token_and_persists_it() {
    let server = MockServer::start().await;
    mount_single_device(&server).await;
    Mock::given(method("POST"))
        .and(path("/api/oauth2/token"))
        .respond_with(ok(json!({"access_token": "fresh", "expires_in": 86400})))
        .expect(1)
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::with_token(token_expiring_in(120)));
    let session = Session::connect(config(&server), store.clone()).await.unwrap();

    assert_eq!(store.save_count(), 1);
    let saved = store.load().unwrap().unwrap();
    assert_eq!(saved.access_token, "fresh");
    assert_eq!(saved.refresh_token, "stored-refresh");
    assert_eq!(session.token(), saved);
}

#[tokio::test]
async fn test_connect_with_rejected_refresh_requires_reauthentication() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::with_token(token_expiring_in(-60)));
    let result = Session::connect(config(&server), store).await;

    match result {
        Err(err @ CoreError::ReauthenticationRequired { .. }) => assert!(err.is_auth()),
        Err(other) => panic!("expected ReauthenticationRequired, got: {other}"),
        Ok(_) => panic!("expected ReauthenticationRequired, got a session"),
    }
}

#[tokio::test]
async fn test_connect_without_orgs_fails() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/rest/o"))
        .respond_with(ok(json!({"data": []})))
        .mount(&server)
        .await;

    let store = Arc::new(MemoryTokenStore::with_token(token_expiring_in(7200)));
    let result = Session::connect(config(&server), store).await;
    assert!(matches!(result, Err(CoreError::NoOrganizations)));
}

#[tokio::test]
async fn test_unknown_device_lookup() {
    let server = MockServer::start().await;
    mount_single_device(&server).await;

    let store = Arc::new(MemoryTokenStore::with_token(token_expiring_in(7200)));
    let session = Session::connect(config(&server), store).await.unwrap();

    assert!(matches!(
        session.device("nope"),
        Err(CoreError::DeviceNotFound { .. })
    ));
    assert!(session.device("org1_5_77").is_ok());
}

// ── Authorization ───────────────────────────────────────────────────

#[tokio::test]
async fn test_complete_authorization_stores_token() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/oauth2/token"))
        .respond_with(ok(json!({
            "access_token": "first",
            "refresh_token": "first-refresh",
            "expires_in": 7200
        })))
        .expect(1)
        .mount(&server)
        .await;

    let cfg = config(&server);
    let url = Session::authorize_url(&cfg).unwrap();
    assert_eq!(url.path(), "/api/oauth2/auth");

    let store = MemoryTokenStore::new();
    let token = Session::complete_authorization(&cfg, &store, " code-123\n")
        .await
        .unwrap();

    assert_eq!(store.load().unwrap(), Some(token));
}

// ── Polling ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_update_all_skips_throttled_devices() {
    let server = MockServer::start().await;
    mount_single_device(&server).await;

    let store = Arc::new(MemoryTokenStore::with_token(token_expiring_in(7200)));
    let session = Session::connect(config(&server), store).await.unwrap();

    // Discovery just updated the device, so the default window suppresses it.
    let summary = session.update_all().await.unwrap();
    assert_eq!(summary.updated, 0);
    assert_eq!(summary.skipped, 1);
}

#[tokio::test]
async fn test_update_all_refreshes_due_token_first() {
    let server = MockServer::start().await;
    mount_single_device(&server).await;
    // Short-lived tokens stay inside the refresh margin, so every pass refreshes.
    for access in ["short-1", "short-2"] {
        Mock::given(method("POST"))
            .and(path("/api/oauth2/token"))
            .respond_with(ok(json!({"access_token": access, "expires_in": 60})))
            .up_to_n_times(1)
            .expect(1)
            .mount(&server)
            .await;
    }

    let mut cfg = config(&server);
    cfg.min_update_interval = Duration::ZERO;
    let store = Arc::new(MemoryTokenStore::with_token(token_expiring_in(30)));
    let session = Session::connect(cfg, store.clone()).await.unwrap();

    let summary = session.update_all().await.unwrap();
    assert_eq!(summary.updated, 1);
    assert_eq!(store.save_count(), 2);
    assert_eq!(session.token().access_token, "short-2");
}

#[tokio::test]
async fn test_poll_task_runs_until_shutdown() {
    let server = MockServer::start().await;
    mount_single_device(&server).await;

    let mut cfg = config(&server);
    cfg.min_update_interval = Duration::ZERO;
    cfg.scan_interval = Duration::from_millis(50);
    let store = Arc::new(MemoryTokenStore::with_token(token_expiring_in(7200)));
    let session = Session::connect(cfg, store).await.unwrap();

    let entities = EntitySet::attach_all(session.registry());
    session.start_polling();
    tokio::time::sleep(Duration::from_millis(300)).await;
    session.shutdown().await;

    let metadata_hits = server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|r| r.url.path() == "/rest/o/org1/g/5/d/77")
        .count();
    assert!(metadata_hits >= 2, "expected polling, saw {metadata_hits} metadata fetches");
    assert_eq!(entities.statuses[0].state().as_deref(), Some("online"));
}

#[tokio::test]
async fn test_poll_task_stops_when_session_dropped() {
    let server = MockServer::start().await;
    mount_single_device(&server).await;

    let mut cfg = config(&server);
    cfg.min_update_interval = Duration::ZERO;
    cfg.scan_interval = Duration::from_millis(50);
    let store = Arc::new(MemoryTokenStore::with_token(token_expiring_in(7200)));
    let session = Session::connect(cfg, store).await.unwrap();

    session.start_polling();
    tokio::time::sleep(Duration::from_millis(150)).await;
    drop(session);
    // Let an in-flight pass finish before sampling.
    tokio::time::sleep(Duration::from_millis(100)).await;

    let settled = server.received_requests().await.unwrap().len();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(
        server.received_requests().await.unwrap().len(),
        settled,
        "no requests after the session is dropped"
    );
}
