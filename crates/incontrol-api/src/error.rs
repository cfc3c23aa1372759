use thiserror::Error;

/// Top-level error type for the `incontrol-api` crate.
///
/// Covers every failure mode of the OAuth and REST surfaces.
/// `incontrol-core` maps these into user-facing diagnostics.
#[derive(Debug, Error)]
pub enum Error {
    // ── Authentication ──────────────────────────────────────────────
    /// Authorization code exchange or token refresh was rejected, or the
    /// token endpoint could not be reached.
    #[error("OAuth failure: {message}")]
    Authentication { message: String },

    /// A refresh was requested but no token record exists.
    #[error("No token available -- authorization required")]
    InvalidToken,

    // ── Transport ───────────────────────────────────────────────────
    /// HTTP transport error (connection reset, DNS failure, etc.)
    #[error("HTTP transport error: {0}")]
    Transport(#[from] reqwest::Error),

    /// URL parsing error.
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),

    /// Every attempt in the retry budget timed out.
    #[error("Request to {path} timed out after {attempts} attempt(s)")]
    Timeout { path: String, attempts: u32 },

    // ── API ─────────────────────────────────────────────────────────
    /// Non-200 response from the REST API. The body is kept for diagnostics.
    #[error("InControl2 API error (HTTP {status}): {body}")]
    Api { status: u16, body: String },

    // ── Data ────────────────────────────────────────────────────────
    /// JSON deserialization failed, with the raw body for debugging.
    #[error("Deserialization error: {message}")]
    Deserialization { message: String, body: String },
}

impl Error {
    /// Returns `true` if this error means the account is no longer
    /// authenticated and a new authorization flow is needed.
    pub fn is_auth_failure(&self) -> bool {
        match self {
            Self::Authentication { .. } | Self::InvalidToken => true,
            Self::Api { status, .. } => *status == 401,
            _ => false,
        }
    }

    /// Returns `true` if this is a transient error worth retrying later.
    pub fn is_transient(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_timeout() || e.is_connect(),
            Self::Timeout { .. } => true,
            Self::Api { status, .. } => *status >= 500,
            _ => false,
        }
    }

    /// Build a `Deserialization` error with a bounded body preview.
    pub(crate) fn deserialization(err: &serde_json::Error, body: &str) -> Self {
        let preview: String = body.chars().take(200).collect();
        Self::Deserialization {
            message: format!("{err} (body preview: {preview:?})"),
            body: body.to_owned(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_failures_are_classified() {
        assert!(Error::InvalidToken.is_auth_failure());
        assert!(
            Error::Authentication {
                message: "HTTP 400".into()
            }
            .is_auth_failure()
        );
        assert!(
            Error::Api {
                status: 401,
                body: String::new()
            }
            .is_auth_failure()
        );
        assert!(
            !Error::Api {
                status: 404,
                body: String::new()
            }
            .is_auth_failure()
        );
    }

    #[test]
    fn timeouts_and_server_errors_are_transient() {
        assert!(
            Error::Timeout {
                path: "o".into(),
                attempts: 4
            }
            .is_transient()
        );
        assert!(
            Error::Api {
                status: 503,
                body: String::new()
            }
            .is_transient()
        );
        assert!(!Error::InvalidToken.is_transient());
    }
}
