#![allow(clippy::unwrap_used)]
// Integration tests for `ApiConnection` using wiremock.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use reqwest::Method;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_json, header, method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use incontrol_api::{ApiConnection, Error, ResourceId, TokenRecord, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

fn token() -> TokenRecord {
    TokenRecord {
        access_token: "tok-123".into(),
        refresh_token: "ref-123".into(),
        expires_at: i64::MAX / 2,
    }
}

async fn setup() -> (MockServer, ApiConnection) {
    let server = MockServer::start().await;
    let base = Url::parse(&format!("{}/rest/", server.uri())).unwrap();
    let transport = TransportConfig::default().with_timeout(Duration::from_millis(200));
    let conn = ApiConnection::new(&base, token(), &transport).unwrap();
    (server, conn)
}

// ── Request mechanics ───────────────────────────────────────────────

#[tokio::test]
async fn test_request_sends_bearer_and_accept() {
    let (server, conn) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/o"))
        .and(header("authorization", "Bearer tok-123"))
        .and(header("accept", "application/json"))
        .and(query_param("limit", "5"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data":[]}"#))
        .expect(1)
        .mount(&server)
        .await;

    let body = conn
        .request("o", &[("limit", "5")], Method::GET, 3)
        .await
        .unwrap();
    assert_eq!(body, r#"{"data":[]}"#);
}

#[tokio::test]
async fn test_post_sends_params_as_json() {
    let (server, conn) = setup().await;

    Mock::given(method("POST"))
        .and(path("/rest/o/abc/g/1/d/2/reboot"))
        .and(body_json(json!({"reason": "maintenance"})))
        .respond_with(ResponseTemplate::new(200).set_body_string("{}"))
        .expect(1)
        .mount(&server)
        .await;

    conn.request(
        "o/abc/g/1/d/2/reboot",
        &[("reason", "maintenance")],
        Method::POST,
        0,
    )
    .await
    .unwrap();
}

#[tokio::test]
async fn test_permanent_timeout_makes_budget_plus_one_attempts() {
    let (server, conn) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/o"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .expect(3)
        .mount(&server)
        .await;

    let result = conn.request("o", &[], Method::GET, 2).await;
    match result {
        Err(Error::Timeout { attempts, .. }) => assert_eq!(attempts, 3),
        other => panic!("expected Timeout, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_timeout_then_success_recovers() {
    let (server, conn) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/o"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .up_to_n_times(1)
        .expect(1)
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/o"))
        .respond_with(ResponseTemplate::new(200).set_body_string(r#"{"data":[]}"#))
        .expect(1)
        .mount(&server)
        .await;

    let body = conn.request("o", &[], Method::GET, 3).await.unwrap();
    assert_eq!(body, r#"{"data":[]}"#);
}

#[tokio::test]
async fn test_non_200_carries_body() {
    let (server, conn) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/o"))
        .respond_with(ResponseTemplate::new(500).set_body_string("upstream exploded"))
        .expect(1)
        .mount(&server)
        .await;

    match conn.get("o").await {
        Err(Error::Api { status, body }) => {
            assert_eq!(status, 500);
            assert_eq!(body, "upstream exploded");
        }
        other => panic!("expected Api error, got: {other:?}"),
    }
}

#[tokio::test]
async fn test_transport_error_is_not_retried() {
    // Accept every connection and hang up before answering.
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let accepted = Arc::new(AtomicUsize::new(0));
    let counter = Arc::clone(&accepted);
    tokio::spawn(async move {
        while let Ok((stream, _)) = listener.accept().await {
            counter.fetch_add(1, Ordering::SeqCst);
            drop(stream);
        }
    });

    let base = Url::parse(&format!("http://{addr}/rest/")).unwrap();
    let transport = TransportConfig::default().with_timeout(Duration::from_secs(5));
    let conn = ApiConnection::new(&base, token(), &transport).unwrap();

    let result = conn.request("o", &[], Method::GET, 3).await;
    assert!(
        matches!(result, Err(Error::Transport(_))),
        "expected Transport error, got: {result:?}"
    );
    assert_eq!(accepted.load(Ordering::SeqCst), 1, "transport errors use one attempt");
}

#[tokio::test]
async fn test_refused_connection_is_transport_error() {
    let addr = {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
        listener.local_addr().unwrap()
    };
    let base = Url::parse(&format!("http://{addr}/rest/")).unwrap();
    let transport = TransportConfig::default().with_timeout(Duration::from_secs(5));
    let conn = ApiConnection::new(&base, token(), &transport).unwrap();

    let result = conn.get("o").await;
    assert!(
        matches!(result, Err(Error::Transport(ref e)) if e.is_connect()),
        "expected connect error, got: {result:?}"
    );
}

// ── Resource endpoints ──────────────────────────────────────────────

#[tokio::test]
async fn test_list_orgs() {
    let (server, conn) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/o"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [
                {"id": "a1", "name": "Fleet", "status": "active"},
                {"id": "b2", "name": "Depot"}
            ]
        })))
        .mount(&server)
        .await;

    let orgs = conn.list_orgs().await.unwrap();
    assert_eq!(orgs.len(), 2);
    assert_eq!(orgs[0].id.as_str(), "a1");
    assert_eq!(orgs[0].status.as_deref(), Some("active"));
    assert_eq!(orgs[1].name.as_deref(), Some("Depot"));
}

#[tokio::test]
async fn test_device_facets() {
    let (server, conn) = setup().await;
    let (org, group, device) = (
        ResourceId::from("a1"),
        ResourceId::from(7),
        ResourceId::from(42),
    );

    Mock::given(method("GET"))
        .and(path("/rest/o/a1/g/7/d/42"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": {"name": "Van 3", "product_name": "MAX BR1", "fw_ver": "8.1.0", "status": "online"}
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/o/a1/g/7/d/42/loc"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "data": [{"la": 51.5, "lo": -0.12, "at": 11.0, "sp": 0, "ts": "2024-06-15T10:30:00"}]
        })))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path("/rest/o/a1/g/7/d/42/info/interfaces"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": null})))
        .mount(&server)
        .await;

    let meta = conn.get_device(&org, &group, &device).await.unwrap().unwrap();
    assert_eq!(meta.product_name.as_deref(), Some("MAX BR1"));
    assert_eq!(meta.status.as_deref(), Some("online"));

    let fixes = conn.get_location(&org, &group, &device).await.unwrap();
    assert_eq!(fixes.len(), 1);
    assert!(fixes[0].la.is_some());

    let wans = conn.get_interfaces(&org, &group, &device).await.unwrap();
    assert!(wans.is_empty());
}

#[tokio::test]
async fn test_list_entry_without_id_is_skipped() {
    let (server, conn) = setup().await;
    let (org, group, device) = (ResourceId::from("a1"), ResourceId::from(7), ResourceId::from(42));

    Mock::given(method("GET"))
        .and(path("/rest/o/a1/g/7/d/42/info/interfaces"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [
            {"id": 1, "name": "Cellular", "status": "Connected"},
            {"name": "no id"},
            {"id": 3, "name": "Ethernet"}
        ]})))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/rest/o"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"data": [
            {"name": "orphan"},
            {"id": "org9", "name": "Fleet"}
        ]})))
        .mount(&server)
        .await;

    let wans = conn.get_interfaces(&org, &group, &device).await.unwrap();
    let ids: Vec<String> = wans.iter().map(|w| w.id.to_string()).collect();
    assert_eq!(ids, ["1", "3"]);

    let orgs = conn.list_orgs().await.unwrap();
    assert_eq!(orgs.len(), 1);
    assert_eq!(orgs[0].id.as_str(), "org9");
}

#[tokio::test]
async fn test_malformed_body_is_deserialization_error() {
    let (server, conn) = setup().await;

    Mock::given(method("GET"))
        .and(path("/rest/o"))
        .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
        .mount(&server)
        .await;

    let result = conn.list_orgs().await;
    assert!(
        matches!(result, Err(Error::Deserialization { .. })),
        "expected Deserialization error, got: {result:?}"
    );
}
