// ── Core error types ──
//
// User-facing errors from incontrol-core. Consumers never match on HTTP
// details directly; `From<incontrol_api::Error>` folds transport failures
// into domain variants.

use thiserror::Error;

/// Unified error type for the core crate.
#[derive(Debug, Error)]
pub enum CoreError {
    // ── Authentication ───────────────────────────────────────────────
    #[error("Authentication failed: {message}")]
    AuthenticationFailed { message: String },

    /// The stored token is missing or can no longer be refreshed. The user
    /// has to run the authorization flow again.
    #[error("Re-authentication required: {reason}")]
    ReauthenticationRequired { reason: String },

    // ── Connection ───────────────────────────────────────────────────
    #[error("Cannot reach InControl2: {reason}")]
    ConnectionFailed { reason: String },

    #[error("Request to {path} timed out after {attempts} attempt(s)")]
    Timeout { path: String, attempts: u32 },

    // ── Data ─────────────────────────────────────────────────────────
    #[error("No organizations found for this account")]
    NoOrganizations,

    #[error("Device not found: {identifier}")]
    DeviceNotFound { identifier: String },

    #[error("API error (HTTP {status}): {message}")]
    Api { status: u16, message: String },

    // ── Local state ──────────────────────────────────────────────────
    #[error("Token store error: {message}")]
    TokenStore { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CoreError {
    /// Whether the failure calls for a new authorization flow.
    pub fn is_auth(&self) -> bool {
        matches!(
            self,
            Self::AuthenticationFailed { .. } | Self::ReauthenticationRequired { .. }
        )
    }
}

// ── Conversion from transport-layer errors ───────────────────────────

impl From<incontrol_api::Error> for CoreError {
    fn from(err: incontrol_api::Error) -> Self {
        match err {
            incontrol_api::Error::Authentication { message } => {
                CoreError::AuthenticationFailed { message }
            }
            incontrol_api::Error::InvalidToken => CoreError::ReauthenticationRequired {
                reason: "no token stored".into(),
            },
            incontrol_api::Error::Transport(ref e) => CoreError::ConnectionFailed {
                reason: match e.url() {
                    Some(url) => format!("{e} ({url})"),
                    None => e.to_string(),
                },
            },
            incontrol_api::Error::InvalidUrl(e) => CoreError::Config {
                message: format!("Invalid URL: {e}"),
            },
            incontrol_api::Error::Timeout { path, attempts } => {
                CoreError::Timeout { path, attempts }
            }
            incontrol_api::Error::Api { status: 401, body } => CoreError::AuthenticationFailed {
                message: format!("access token rejected: {body}"),
            },
            incontrol_api::Error::Api { status, body } => CoreError::Api {
                status,
                message: body,
            },
            incontrol_api::Error::Deserialization { message, body: _ } => {
                CoreError::Internal(format!("Deserialization error: {message}"))
            }
        }
    }
}
