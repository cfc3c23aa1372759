// OAuth2 authorization-code flow against the InControl2 token endpoint.
//
// Builds the consent URL, exchanges the returned code for a token, and
// refreshes that token once it is inside the refresh margin. Tokens are
// always stamped with an absolute `expires_at` at the moment they are
// obtained; the raw `expires_in` TTL never leaves this module.

use std::fmt;
use std::time::Duration;

use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use serde::{Deserialize, Serialize};
use tracing::{debug, error, info};
use url::Url;

use crate::error::Error;
use crate::transport::TransportConfig;

/// A token closer than this to expiry is refreshed (one hour).
pub const REFRESH_MARGIN_SECS: i64 = 60 * 60;

// ── Token record ────────────────────────────────────────────────────

/// The persisted OAuth token.
///
/// Replaced wholesale on every exchange or refresh, never patched field
/// by field.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    pub access_token: String,
    pub refresh_token: String,
    /// Absolute expiry, unix seconds.
    pub expires_at: i64,
}

impl TokenRecord {
    /// Stamp a freshly issued token: `expires_at = issued_at + expires_in`.
    pub fn issued(
        access_token: String,
        refresh_token: String,
        expires_in: i64,
        issued_at: i64,
    ) -> Self {
        Self {
            access_token,
            refresh_token,
            expires_at: issued_at.saturating_add(expires_in),
        }
    }

    /// Seconds left before expiry at `now` (negative once expired).
    pub fn remaining_secs_at(&self, now: i64) -> i64 {
        self.expires_at.saturating_sub(now)
    }

    /// Whether the token is inside the refresh margin at `now`.
    pub fn needs_refresh_at(&self, now: i64) -> bool {
        self.remaining_secs_at(now) < REFRESH_MARGIN_SECS
    }

    /// Whether the token is inside the refresh margin right now.
    pub fn needs_refresh(&self) -> bool {
        self.needs_refresh_at(Utc::now().timestamp())
    }
}

impl fmt::Debug for TokenRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TokenRecord")
            .field("access_token", &"[REDACTED]")
            .field("refresh_token", &"[REDACTED]")
            .field("expires_at", &self.expires_at)
            .finish()
    }
}

/// Token endpoint response body.
#[derive(Deserialize)]
struct TokenResponse {
    access_token: String,
    #[serde(default)]
    refresh_token: Option<String>,
    expires_in: i64,
}

// ── Client ──────────────────────────────────────────────────────────

/// OAuth2 client for the InControl2 authorization server.
pub struct OAuthClient {
    http: reqwest::Client,
    client_id: String,
    client_secret: SecretString,
    redirect_uri: String,
    authorize_url: Url,
    token_url: Url,
    timeout: Duration,
}

impl OAuthClient {
    /// Create a client pointed at the production InControl2 endpoints.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: SecretString,
        redirect_uri: impl Into<String>,
        transport: &TransportConfig,
    ) -> Result<Self, Error> {
        Ok(Self {
            http: transport.build_client()?,
            client_id: client_id.into(),
            client_secret,
            redirect_uri: redirect_uri.into(),
            authorize_url: Url::parse(crate::OAUTH_AUTHORIZE_URL)?,
            token_url: Url::parse(crate::OAUTH_TOKEN_URL)?,
            timeout: transport.timeout,
        })
    }

    /// Point the client at different authorize/token endpoints.
    pub fn with_endpoints(mut self, authorize_url: Url, token_url: Url) -> Self {
        self.authorize_url = authorize_url;
        self.token_url = token_url;
        self
    }

    /// Share an existing `reqwest::Client` (and its connection pool).
    pub fn with_http(mut self, http: reqwest::Client) -> Self {
        self.http = http;
        self
    }

    pub fn client_id(&self) -> &str {
        &self.client_id
    }

    pub fn redirect_uri(&self) -> &str {
        &self.redirect_uri
    }

    /// The URL the user visits to grant access.
    ///
    /// `{authorize_url}?client_id=..&response_type=code&redirect_uri=..`
    pub fn build_authorization_url(&self) -> Url {
        let mut url = self.authorize_url.clone();
        url.query_pairs_mut()
            .append_pair("client_id", &self.client_id)
            .append_pair("response_type", "code")
            .append_pair("redirect_uri", &self.redirect_uri);
        url
    }

    /// Exchange an authorization code for a token. Single attempt.
    pub async fn exchange_code(&self, code: &str) -> Result<TokenRecord, Error> {
        debug!("exchanging authorization code");
        let form = [
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("code", code),
            ("client_secret", self.client_secret.expose_secret()),
            ("grant_type", "authorization_code"),
        ];

        let issued_at = Utc::now().timestamp();
        let resp = self.request_token(&form, "get auth token").await?;
        let refresh_token = resp.refresh_token.ok_or_else(|| Error::Authentication {
            message: "token response did not include a refresh_token".into(),
        })?;

        info!("authorization code exchanged");
        Ok(TokenRecord::issued(
            resp.access_token,
            refresh_token,
            resp.expires_in,
            issued_at,
        ))
    }

    /// Refresh `token` if it is inside the refresh margin.
    ///
    /// An absent token is `Error::InvalidToken`. A token with at least
    /// [`REFRESH_MARGIN_SECS`] left is returned unchanged without any
    /// network traffic. Otherwise the refresh grant is issued once; if the
    /// response omits `refresh_token` the previous one is kept.
    pub async fn refresh(&self, token: Option<TokenRecord>) -> Result<TokenRecord, Error> {
        let token = token.ok_or(Error::InvalidToken)?;
        if !token.needs_refresh() {
            debug!(expires_at = token.expires_at, "access token still valid");
            return Ok(token);
        }

        debug!(expires_at = token.expires_at, "refreshing access token");
        let form = [
            ("client_id", self.client_id.as_str()),
            ("redirect_uri", self.redirect_uri.as_str()),
            ("refresh_token", token.refresh_token.as_str()),
            ("client_secret", self.client_secret.expose_secret()),
            ("grant_type", "refresh_token"),
        ];

        let issued_at = Utc::now().timestamp();
        let resp = self.request_token(&form, "refresh access token").await?;
        let refresh_token = resp.refresh_token.unwrap_or(token.refresh_token);

        info!("access token refreshed");
        Ok(TokenRecord::issued(
            resp.access_token,
            refresh_token,
            resp.expires_in,
            issued_at,
        ))
    }

    /// POST a form to the token endpoint under the timeout guard.
    ///
    /// Every failure short of a malformed 200 body is an OAuth failure.
    async fn request_token(
        &self,
        form: &[(&str, &str)],
        action: &str,
    ) -> Result<TokenResponse, Error> {
        let send = self.http.post(self.token_url.clone()).form(form).send();

        let resp = match tokio::time::timeout(self.timeout, send).await {
            Ok(Ok(resp)) => resp,
            Ok(Err(e)) => {
                error!(error = %e, "failed calling InControl2 to {action}");
                return Err(Error::Authentication {
                    message: format!("failed to {action}: {e}"),
                });
            }
            Err(_) => {
                error!("timeout calling InControl2 to {action}");
                return Err(Error::Authentication {
                    message: format!("timed out trying to {action}"),
                });
            }
        };

        let status = resp.status();
        if status != reqwest::StatusCode::OK {
            let body = resp.text().await.unwrap_or_default();
            error!(%status, body = %body, "failed to {action}");
            return Err(Error::Authentication {
                message: format!("failed to {action} (HTTP {status})"),
            });
        }

        let body = resp.text().await.map_err(|e| Error::Authentication {
            message: format!("failed to read token response: {e}"),
        })?;
        serde_json::from_str(&body).map_err(|e| Error::deserialization(&e, &body))
    }
}
