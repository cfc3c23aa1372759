// REST connection to the InControl2 API
//
// Wraps `reqwest::Client` with bearer authentication, a per-request timeout
// guard and an immediate timeout-retry budget. Endpoint methods live in
// `resources.rs` as inherent methods to keep this module about transport.

use std::sync::RwLock;
use std::time::Duration;

use reqwest::Method;
use reqwest::header::ACCEPT;
use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use tracing::{debug, error, trace, warn};
use url::Url;

use crate::error::Error;
use crate::models::DataEnvelope;
use crate::oauth::TokenRecord;
use crate::transport::TransportConfig;

/// Extra attempts made after a timed-out request.
pub const DEFAULT_RETRIES: u32 = 3;

/// Authenticated HTTP connection to the REST tree.
///
/// The bearer token sits behind a lock so a refreshed token can be swapped
/// in while device handles keep sharing the same connection.
pub struct ApiConnection {
    http: reqwest::Client,
    base_url: Url,
    token: RwLock<TokenRecord>,
    timeout: Duration,
    retries: u32,
}

impl ApiConnection {
    /// Create a connection from a transport config.
    ///
    /// `base_url` is the REST root, e.g. `https://api.ic.peplink.com/rest/`.
    pub fn new(base_url: &Url, token: TokenRecord, transport: &TransportConfig) -> Result<Self, Error> {
        let http = transport.build_client()?;
        Ok(Self::with_client(http, base_url, token, transport.timeout))
    }

    /// Create a connection around a pre-built `reqwest::Client`.
    pub fn with_client(
        http: reqwest::Client,
        base_url: &Url,
        token: TokenRecord,
        timeout: Duration,
    ) -> Self {
        Self {
            http,
            base_url: normalize_base_url(base_url),
            token: RwLock::new(token),
            timeout,
            retries: DEFAULT_RETRIES,
        }
    }

    /// Override the default timeout-retry budget.
    pub fn with_retries(mut self, retries: u32) -> Self {
        self.retries = retries;
        self
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn retries(&self) -> u32 {
        self.retries
    }

    // ── Token management ─────────────────────────────────────────────

    /// A copy of the token currently attached to requests.
    pub fn token(&self) -> TokenRecord {
        self.token.read().expect("token lock poisoned").clone()
    }

    /// Replace the token attached to subsequent requests.
    pub fn set_token(&self, token: TokenRecord) {
        debug!(expires_at = token.expires_at, "swapping access token");
        *self.token.write().expect("token lock poisoned") = token;
    }

    fn access_token(&self) -> String {
        self.token
            .read()
            .expect("token lock poisoned")
            .access_token
            .clone()
    }

    // ── Requests ─────────────────────────────────────────────────────

    /// Join a relative resource path (e.g. `"o/abc/g"`) onto the base URL.
    pub fn url(&self, path: &str) -> Result<Url, Error> {
        Ok(self.base_url.join(path.trim_start_matches('/'))?)
    }

    /// Issue an authenticated request and return the raw response body.
    ///
    /// GET sends `params` as the query string, any other method as a JSON
    /// object body. A timed-out attempt is retried immediately while
    /// `retries` lasts, so a permanent timeout costs `retries + 1` attempts
    /// before `Error::Timeout`. Transport errors are not retried; a non-200
    /// status becomes `Error::Api` carrying the body.
    pub async fn request(
        &self,
        path: &str,
        params: &[(&str, &str)],
        method: Method,
        retries: u32,
    ) -> Result<String, Error> {
        let url = self.url(path)?;
        let mut attempts = 0u32;

        loop {
            attempts += 1;
            debug!(%method, %url, attempt = attempts, "InControl2 request");

            let builder = if method == Method::GET {
                self.http.get(url.clone()).query(params)
            } else {
                let body: Map<String, Value> = params
                    .iter()
                    .map(|(k, v)| ((*k).to_owned(), Value::String((*v).to_owned())))
                    .collect();
                self.http.request(method.clone(), url.clone()).json(&body)
            };
            let builder = builder
                .header(ACCEPT, "application/json")
                .bearer_auth(self.access_token());

            match tokio::time::timeout(self.timeout, builder.send()).await {
                Ok(Ok(resp)) => return read_body(resp).await,
                Ok(Err(e)) if !e.is_timeout() => {
                    error!(error = %e, "error sending command to InControl2: {path}");
                    return Err(Error::Transport(e));
                }
                Ok(Err(_)) | Err(_) => {}
            }

            if attempts > retries {
                error!(attempts, "timed out sending command to InControl2: {path}");
                return Err(Error::Timeout {
                    path: path.to_owned(),
                    attempts,
                });
            }
            trace!(remaining = retries + 1 - attempts, "request timed out, retrying");
        }
    }

    /// GET `path` with the connection's retry budget.
    pub async fn get(&self, path: &str) -> Result<String, Error> {
        self.request(path, &[], Method::GET, self.retries).await
    }

    /// GET `path` and unwrap the `data` member of the envelope.
    ///
    /// A missing or null `data` is `Ok(None)`.
    pub(crate) async fn get_data<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>, Error> {
        let body = self.get(path).await?;
        let envelope: DataEnvelope<T> =
            serde_json::from_str(&body).map_err(|e| Error::deserialization(&e, &body))?;
        Ok(envelope.data)
    }

    /// GET `path` and decode the `data` array entry by entry.
    ///
    /// A missing `data` is an empty list. Entries that do not decode (for
    /// example without an `id`) are skipped with a warning instead of
    /// failing their siblings.
    pub(crate) async fn get_list<T: DeserializeOwned>(&self, path: &str) -> Result<Vec<T>, Error> {
        let items: Vec<Value> = self.get_data(path).await?.unwrap_or_default();
        Ok(items
            .into_iter()
            .enumerate()
            .filter_map(|(index, item)| match serde_json::from_value(item) {
                Ok(value) => Some(value),
                Err(e) => {
                    warn!(path, index, error = %e, "skipping malformed list entry");
                    None
                }
            })
            .collect())
    }
}

/// Guarantee a trailing slash so relative joins append instead of replace.
fn normalize_base_url(raw: &Url) -> Url {
    let mut url = raw.clone();
    if !url.path().ends_with('/') {
        let path = format!("{}/", url.path());
        url.set_path(&path);
    }
    url
}

async fn read_body(resp: reqwest::Response) -> Result<String, Error> {
    let status = resp.status();
    if status != reqwest::StatusCode::OK {
        let body = resp.text().await.unwrap_or_default();
        error!(%status, body = %body, "InControl2 request failed");
        return Err(Error::Api {
            status: status.as_u16(),
            body,
        });
    }
    resp.text().await.map_err(Error::Transport)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection(base: &str) -> ApiConnection {
        ApiConnection::with_client(
            reqwest::Client::new(),
            &Url::parse(base).expect("base url"),
            TokenRecord::issued("a".into(), "r".into(), 3600, 0),
            Duration::from_secs(1),
        )
    }

    #[test]
    fn resource_paths_join_under_rest_root() {
        let conn = connection("https://api.ic.peplink.com/rest");
        assert_eq!(
            conn.url("o/abc/g").expect("url").as_str(),
            "https://api.ic.peplink.com/rest/o/abc/g"
        );
        assert_eq!(
            conn.url("/o").expect("url").as_str(),
            "https://api.ic.peplink.com/rest/o"
        );
    }

    #[test]
    fn token_swap_is_visible_to_later_requests() {
        let conn = connection("https://api.ic.peplink.com/rest/");
        conn.set_token(TokenRecord::issued("b".into(), "r2".into(), 60, 0));
        assert_eq!(conn.access_token(), "b");
        assert_eq!(conn.token().refresh_token, "r2");
    }
}
