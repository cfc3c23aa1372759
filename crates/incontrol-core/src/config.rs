// ── Runtime session configuration ──
//
// Describes how to talk to InControl2: OAuth client credentials, endpoint
// URLs and polling cadence. Built by the CLI from a config profile and
// handed in; core never reads config files.

use std::time::Duration;

use incontrol_api::{
    API_ENDPOINT, ApiConnection, DEFAULT_RETRIES, OAUTH_AUTHORIZE_URL, OAUTH_TOKEN_URL,
    OAuthClient, TokenRecord, TransportConfig,
};
use secrecy::SecretString;
use url::Url;

use crate::error::CoreError;

/// Default interval between full poll passes.
pub const DEFAULT_SCAN_INTERVAL: Duration = Duration::from_secs(10 * 60);

/// Default minimum spacing between two real updates of one device.
pub const DEFAULT_MIN_UPDATE_INTERVAL: Duration = Duration::from_secs(5 * 60);

/// Configuration for one InControl2 account session.
#[derive(Debug, Clone)]
pub struct SessionConfig {
    /// OAuth client id registered in InControl2.
    pub client_id: String,
    /// OAuth client secret.
    pub client_secret: SecretString,
    /// Redirect URI registered with the OAuth client.
    pub redirect_uri: String,
    /// REST root, normally `https://api.ic.peplink.com/rest/`.
    pub api_url: Url,
    pub authorize_url: Url,
    pub token_url: Url,
    /// Per-request timeout.
    pub timeout: Duration,
    /// Extra attempts after a timed-out REST request.
    pub retries: u32,
    /// Interval of the background poll task. Zero disables polling.
    pub scan_interval: Duration,
    /// Device updates closer together than this are skipped.
    pub min_update_interval: Duration,
}

impl SessionConfig {
    /// Build a config against the production endpoints with default tuning.
    pub fn new(
        client_id: impl Into<String>,
        client_secret: SecretString,
        redirect_uri: impl Into<String>,
    ) -> Result<Self, CoreError> {
        Ok(Self {
            client_id: client_id.into(),
            client_secret,
            redirect_uri: redirect_uri.into(),
            api_url: parse_url(API_ENDPOINT)?,
            authorize_url: parse_url(OAUTH_AUTHORIZE_URL)?,
            token_url: parse_url(OAUTH_TOKEN_URL)?,
            timeout: incontrol_api::transport::DEFAULT_TIMEOUT,
            retries: DEFAULT_RETRIES,
            scan_interval: DEFAULT_SCAN_INTERVAL,
            min_update_interval: DEFAULT_MIN_UPDATE_INTERVAL,
        })
    }

    /// Point both the REST tree and the OAuth endpoints at another host.
    ///
    /// Paths follow the production layout: `rest/`, `api/oauth2/auth` and
    /// `api/oauth2/token` under `base`.
    pub fn with_base_url(mut self, base: &Url) -> Result<Self, CoreError> {
        self.api_url = join(base, "rest/")?;
        self.authorize_url = join(base, "api/oauth2/auth")?;
        self.token_url = join(base, "api/oauth2/token")?;
        Ok(self)
    }

    pub fn transport(&self) -> TransportConfig {
        TransportConfig::default().with_timeout(self.timeout)
    }

    /// OAuth client for this account.
    pub fn oauth_client(&self) -> Result<OAuthClient, CoreError> {
        Ok(OAuthClient::new(
            self.client_id.clone(),
            self.client_secret.clone(),
            self.redirect_uri.clone(),
            &self.transport(),
        )?
        .with_endpoints(self.authorize_url.clone(), self.token_url.clone()))
    }

    /// REST connection authenticated with `token`.
    pub fn connection(&self, token: TokenRecord) -> Result<ApiConnection, CoreError> {
        Ok(ApiConnection::new(&self.api_url, token, &self.transport())?.with_retries(self.retries))
    }
}

fn parse_url(raw: &str) -> Result<Url, CoreError> {
    Url::parse(raw).map_err(|e| CoreError::Config {
        message: format!("invalid URL {raw:?}: {e}"),
    })
}

fn join(base: &Url, path: &str) -> Result<Url, CoreError> {
    let mut base = base.clone();
    if !base.path().ends_with('/') {
        let with_slash = format!("{}/", base.path());
        base.set_path(&with_slash);
    }
    base.join(path).map_err(|e| CoreError::Config {
        message: format!("invalid URL {base}{path}: {e}"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SessionConfig {
        SessionConfig::new("id", SecretString::from("s".to_string()), "https://ha/cb")
            .expect("config")
    }

    #[test]
    fn defaults_match_production_endpoints() {
        let cfg = config();
        assert_eq!(cfg.api_url.as_str(), "https://api.ic.peplink.com/rest/");
        assert_eq!(cfg.token_url.as_str(), "https://api.ic.peplink.com/api/oauth2/token");
        assert_eq!(cfg.retries, 3);
        assert_eq!(cfg.scan_interval, Duration::from_secs(600));
        assert_eq!(cfg.min_update_interval, Duration::from_secs(300));
    }

    #[test]
    fn base_url_override_keeps_layout() {
        let base = Url::parse("http://127.0.0.1:4010").expect("url");
        let cfg = config().with_base_url(&base).expect("override");
        assert_eq!(cfg.api_url.as_str(), "http://127.0.0.1:4010/rest/");
        assert_eq!(cfg.authorize_url.as_str(), "http://127.0.0.1:4010/api/oauth2/auth");
        assert_eq!(cfg.token_url.as_str(), "http://127.0.0.1:4010/api/oauth2/token");
    }
}
