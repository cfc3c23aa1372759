//! CLI error types with miette diagnostics.
//!
//! Maps `CoreError` and `ConfigError` into user-facing errors with
//! actionable help text and stable exit codes.

use miette::Diagnostic;
use thiserror::Error;

use incontrol_config::ConfigError;
use incontrol_core::CoreError;

/// Process exit codes.
pub mod exit_code {
    pub const GENERAL: i32 = 1;
    pub const USAGE: i32 = 2;
    pub const AUTH: i32 = 3;
    pub const NOT_FOUND: i32 = 4;
    pub const CONNECTION: i32 = 7;
    pub const TIMEOUT: i32 = 8;
}

#[derive(Debug, Error, Diagnostic)]
pub enum CliError {
    // ── Connection ───────────────────────────────────────────────────

    #[error("Could not reach InControl2: {reason}")]
    #[diagnostic(
        code(incontrol::connection_failed),
        help("Check network access to the API, or the profile's api_url.")
    )]
    ConnectionFailed { reason: String },

    #[error("Request to {path} timed out after {attempts} attempt(s)")]
    #[diagnostic(
        code(incontrol::timeout),
        help("Increase the timeout with --timeout or the profile's `timeout` key.")
    )]
    Timeout { path: String, attempts: u32 },

    // ── Authentication ───────────────────────────────────────────────

    #[error("Authentication failed: {message}")]
    #[diagnostic(
        code(incontrol::auth_failed),
        help(
            "Verify the profile's client_id and client secret.\n\
             Run: incontrol config set-secret"
        )
    )]
    AuthFailed { message: String },

    #[error("Re-authorization required: {reason}")]
    #[diagnostic(
        code(incontrol::reauth_required),
        help(
            "The stored token is missing or was rejected.\n\
             Run: incontrol auth url, open it in a browser, then incontrol auth login"
        )
    )]
    ReauthRequired { reason: String },

    #[error("No client secret configured for profile '{profile}'")]
    #[diagnostic(
        code(incontrol::no_credentials),
        help(
            "Store one with: incontrol config set-secret\n\
             Or set the INCONTROL_CLIENT_SECRET environment variable."
        )
    )]
    NoCredentials { profile: String },

    // ── Resources ────────────────────────────────────────────────────

    #[error("{resource_type} '{identifier}' not found")]
    #[diagnostic(
        code(incontrol::not_found),
        help("Run: incontrol {list_command} to see available {resource_type}s")
    )]
    NotFound {
        resource_type: String,
        identifier: String,
        list_command: String,
    },

    #[error("No organizations found for this account")]
    #[diagnostic(
        code(incontrol::no_organizations),
        help("The authorized user must belong to at least one InControl2 organization.")
    )]
    NoOrganizations,

    // ── API ──────────────────────────────────────────────────────────

    #[error("API error (HTTP {status}): {message}")]
    #[diagnostic(code(incontrol::api_error))]
    ApiError { status: u16, message: String },

    // ── Validation ───────────────────────────────────────────────────

    #[error("Invalid value for {field}: {reason}")]
    #[diagnostic(code(incontrol::validation))]
    Validation { field: String, reason: String },

    // ── Configuration ────────────────────────────────────────────────

    #[error("Profile '{name}' not found in configuration")]
    #[diagnostic(
        code(incontrol::profile_not_found),
        help(
            "Available profiles: {available}\n\
             Create one with: incontrol config init"
        )
    )]
    ProfileNotFound { name: String, available: String },

    #[error("Configuration file not found")]
    #[diagnostic(
        code(incontrol::no_config),
        help(
            "Create one with: incontrol config init\n\
             Expected at: {path}"
        )
    )]
    NoConfig { path: String },

    #[error("Configuration error: {message}")]
    #[diagnostic(code(incontrol::config))]
    Config { message: String },

    #[error("Token storage error: {message}")]
    #[diagnostic(
        code(incontrol::token_store),
        help("Delete the token file and authorize again: incontrol auth logout -y")
    )]
    TokenStore { message: String },

    // ── Interactive ──────────────────────────────────────────────────

    #[error("Destructive operation '{action}' requires confirmation")]
    #[diagnostic(
        code(incontrol::confirmation_required),
        help("Use --yes (-y) to skip confirmation in non-interactive contexts.")
    )]
    NonInteractiveRequiresYes { action: String },

    // ── IO / Internal ────────────────────────────────────────────────

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CliError {
    /// Map this error to an exit code for process termination.
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::ConnectionFailed { .. } => exit_code::CONNECTION,
            Self::Timeout { .. } => exit_code::TIMEOUT,
            Self::AuthFailed { .. } | Self::ReauthRequired { .. } | Self::NoCredentials { .. } => {
                exit_code::AUTH
            }
            Self::NotFound { .. } => exit_code::NOT_FOUND,
            Self::Validation { .. } | Self::NonInteractiveRequiresYes { .. } => exit_code::USAGE,
            _ => exit_code::GENERAL,
        }
    }
}

// ── CoreError → CliError mapping ─────────────────────────────────────

impl From<CoreError> for CliError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::AuthenticationFailed { message } => CliError::AuthFailed { message },
            CoreError::ReauthenticationRequired { reason } => CliError::ReauthRequired { reason },
            CoreError::ConnectionFailed { reason } => CliError::ConnectionFailed { reason },
            CoreError::Timeout { path, attempts } => CliError::Timeout { path, attempts },
            CoreError::NoOrganizations => CliError::NoOrganizations,
            CoreError::DeviceNotFound { identifier } => CliError::NotFound {
                resource_type: "device".into(),
                identifier,
                list_command: "devices list".into(),
            },
            CoreError::Api { status, message } => CliError::ApiError { status, message },
            CoreError::TokenStore { message } => CliError::TokenStore { message },
            CoreError::Config { message } => CliError::Config { message },
            CoreError::Internal(message) => CliError::Internal(message),
        }
    }
}

// ── ConfigError → CliError mapping ───────────────────────────────────

impl From<ConfigError> for CliError {
    fn from(err: ConfigError) -> Self {
        match err {
            ConfigError::Validation { field, reason } => CliError::Validation { field, reason },
            ConfigError::NoCredentials { profile } => CliError::NoCredentials { profile },
            ConfigError::ProfileNotFound { name } => CliError::ProfileNotFound {
                name,
                available: String::new(),
            },
            ConfigError::Io(e) => CliError::Io(e),
            other => CliError::Config {
                message: other.to_string(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_errors_share_exit_code() {
        let reauth = CliError::from(CoreError::ReauthenticationRequired {
            reason: "no token".into(),
        });
        let missing = CliError::from(ConfigError::NoCredentials {
            profile: "default".into(),
        });
        assert_eq!(reauth.exit_code(), exit_code::AUTH);
        assert_eq!(missing.exit_code(), exit_code::AUTH);
    }

    #[test]
    fn unknown_device_maps_to_not_found() {
        let err = CliError::from(CoreError::DeviceNotFound {
            identifier: "42".into(),
        });
        assert_eq!(err.exit_code(), exit_code::NOT_FOUND);
        assert_eq!(err.to_string(), "device '42' not found");
    }

    #[test]
    fn transport_failures_have_distinct_codes() {
        let timeout = CliError::from(CoreError::Timeout {
            path: "o".into(),
            attempts: 4,
        });
        let conn = CliError::from(CoreError::ConnectionFailed {
            reason: "refused".into(),
        });
        assert_eq!(timeout.exit_code(), exit_code::TIMEOUT);
        assert_eq!(conn.exit_code(), exit_code::CONNECTION);
        assert_eq!(CliError::NoOrganizations.exit_code(), exit_code::GENERAL);
    }

    #[test]
    fn config_validation_is_usage_error() {
        let err = CliError::from(ConfigError::Validation {
            field: "redirect_uri".into(),
            reason: "invalid URL".into(),
        });
        assert_eq!(err.exit_code(), exit_code::USAGE);
    }
}
