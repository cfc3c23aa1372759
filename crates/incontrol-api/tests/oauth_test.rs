#![allow(clippy::unwrap_used)]
// Integration tests for `OAuthClient` using wiremock.

use std::time::Duration;

use chrono::Utc;
use pretty_assertions::assert_eq;
use secrecy::SecretString;
use serde_json::json;
use url::Url;
use wiremock::matchers::{body_string_contains, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

use incontrol_api::{Error, OAuthClient, TokenRecord, TransportConfig};

// ── Helpers ─────────────────────────────────────────────────────────

async fn setup() -> (MockServer, OAuthClient) {
    let server = MockServer::start().await;
    let base = Url::parse(&server.uri()).unwrap();
    let transport = TransportConfig::default().with_timeout(Duration::from_millis(250));
    let client = OAuthClient::new(
        "client-1",
        SecretString::from("secret-1".to_string()),
        "https://home.example/api/incontrol2",
        &transport,
    )
    .unwrap()
    .with_endpoints(
        base.join("/api/oauth2/auth").unwrap(),
        base.join("/api/oauth2/token").unwrap(),
    );
    (server, client)
}

fn token_expiring_in(secs: i64) -> TokenRecord {
    TokenRecord {
        access_token: "old-access".into(),
        refresh_token: "old-refresh".into(),
        expires_at: Utc::now().timestamp() + secs,
    }
}

// ── Code exchange ───────────────────────────────────────────────────

#[tokio::test]
async fn test_exchange_code_stamps_expiry() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/oauth2/token"))
        .and(body_string_contains("grant_type=authorization_code"))
        .and(body_string_contains("code=the-code"))
        .and(body_string_contains("client_secret=secret-1"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "new-access",
            "refresh_token": "new-refresh",
            "expires_in": 7200,
            "token_type": "bearer"
        })))
        .expect(1)
        .mount(&server)
        .await;

    let before = Utc::now().timestamp();
    let token = client.exchange_code("the-code").await.unwrap();
    let after = Utc::now().timestamp();

    assert_eq!(token.access_token, "new-access");
    assert_eq!(token.refresh_token, "new-refresh");
    assert!(token.expires_at >= before + 7200 && token.expires_at <= after + 7200);
}

#[tokio::test]
async fn test_exchange_code_rejected() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/oauth2/token"))
        .respond_with(ResponseTemplate::new(400).set_body_string("invalid_grant"))
        .expect(1)
        .mount(&server)
        .await;

    let result = client.exchange_code("stale").await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

#[tokio::test]
async fn test_exchange_code_timeout_is_single_attempt() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_delay(Duration::from_secs(2)))
        .expect(1)
        .mount(&server)
        .await;

    let result = client.exchange_code("slow").await;
    assert!(
        matches!(result, Err(Error::Authentication { .. })),
        "expected Authentication error, got: {result:?}"
    );
}

// ── Refresh ─────────────────────────────────────────────────────────

#[tokio::test]
async fn test_refresh_without_token_is_invalid() {
    let (_server, client) = setup().await;

    let result = client.refresh(None).await;
    assert!(
        matches!(result, Err(Error::InvalidToken)),
        "expected InvalidToken, got: {result:?}"
    );
}

#[tokio::test]
async fn test_refresh_skips_token_outside_margin() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/oauth2/token"))
        .respond_with(ResponseTemplate::new(500))
        .expect(0)
        .mount(&server)
        .await;

    let token = token_expiring_in(3600 + 120);
    let refreshed = client.refresh(Some(token.clone())).await.unwrap();
    assert_eq!(refreshed, token);
}

#[tokio::test]
async fn test_refresh_keeps_refresh_token_when_omitted() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/oauth2/token"))
        .and(body_string_contains("grant_type=refresh_token"))
        .and(body_string_contains("refresh_token=old-refresh"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-access",
            "expires_in": 86400
        })))
        .expect(1)
        .mount(&server)
        .await;

    let refreshed = client
        .refresh(Some(token_expiring_in(600)))
        .await
        .unwrap();

    assert_eq!(refreshed.access_token, "fresh-access");
    assert_eq!(refreshed.refresh_token, "old-refresh");
    assert!(refreshed.expires_at >= Utc::now().timestamp() + 86400 - 5);
}

#[tokio::test]
async fn test_refresh_adopts_rotated_refresh_token() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/oauth2/token"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "access_token": "fresh-access",
            "refresh_token": "rotated",
            "expires_in": 3600
        })))
        .expect(1)
        .mount(&server)
        .await;

    let refreshed = client.refresh(Some(token_expiring_in(-10))).await.unwrap();
    assert_eq!(refreshed.refresh_token, "rotated");
}

#[tokio::test]
async fn test_refresh_rejected() {
    let (server, client) = setup().await;

    Mock::given(method("POST"))
        .and(path("/api/oauth2/token"))
        .respond_with(ResponseTemplate::new(401).set_body_string("revoked"))
        .expect(1)
        .mount(&server)
        .await;

    let result = client.refresh(Some(token_expiring_in(10))).await;
    match result {
        Err(ref err @ Error::Authentication { .. }) => assert!(err.is_auth_failure()),
        other => panic!("expected Authentication error, got: {other:?}"),
    }
}
