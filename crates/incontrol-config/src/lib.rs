//! Shared configuration for the InControl2 CLI.
//!
//! TOML profiles, client-secret resolution (env + keyring + plaintext),
//! token file locations, and translation to `incontrol_core::SessionConfig`.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::ProjectDirs;
use figment::{
    Figment,
    providers::{Env, Format, Serialized, Toml},
};
use secrecy::SecretString;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;

use incontrol_core::SessionConfig;

/// Keyring service name for stored client secrets.
pub const KEYRING_SERVICE: &str = "incontrol";

/// Environment variable consulted for the client secret after the
/// profile's own `client_secret_env`.
pub const CLIENT_SECRET_ENV: &str = "INCONTROL_CLIENT_SECRET";

// ── Error ───────────────────────────────────────────────────────────

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid {field}: {reason}")]
    Validation { field: String, reason: String },

    #[error("no client secret configured for profile '{profile}'")]
    NoCredentials { profile: String },

    #[error("profile '{name}' not found")]
    ProfileNotFound { name: String },

    #[error("keyring error: {0}")]
    Keyring(#[from] keyring::Error),

    #[error("failed to serialize config: {0}")]
    Serialization(#[from] toml::ser::Error),

    #[error("config loading failed: {0}")]
    Figment(Box<figment::Error>),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<figment::Error> for ConfigError {
    fn from(err: figment::Error) -> Self {
        Self::Figment(Box::new(err))
    }
}

// ── TOML config structs ─────────────────────────────────────────────

/// Top-level TOML configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Profile used when `--profile` is not given.
    pub default_profile: Option<String>,

    #[serde(default)]
    pub defaults: Defaults,

    /// Named account profiles.
    #[serde(default)]
    pub profiles: HashMap<String, Profile>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            default_profile: Some("default".into()),
            defaults: Defaults::default(),
            profiles: HashMap::new(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Defaults {
    #[serde(default = "default_output")]
    pub output: String,

    #[serde(default = "default_color")]
    pub color: String,

    /// Request timeout in seconds.
    #[serde(default = "default_timeout")]
    pub timeout: u64,

    /// Poll interval in seconds.
    #[serde(default = "default_scan_interval")]
    pub scan_interval: u64,
}

impl Default for Defaults {
    fn default() -> Self {
        Self {
            output: default_output(),
            color: default_color(),
            timeout: default_timeout(),
            scan_interval: default_scan_interval(),
        }
    }
}

fn default_output() -> String {
    "table".into()
}
fn default_color() -> String {
    "auto".into()
}
fn default_timeout() -> u64 {
    10
}
fn default_scan_interval() -> u64 {
    600
}

/// A named InControl2 account profile.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct Profile {
    /// OAuth client id.
    pub client_id: String,

    /// OAuth client secret (plaintext -- prefer keyring or env var).
    pub client_secret: Option<String>,

    /// Environment variable name containing the client secret.
    pub client_secret_env: Option<String>,

    /// Redirect URI registered with the OAuth client.
    pub redirect_uri: String,

    /// API host override, e.g. a staging server. REST and OAuth paths are
    /// derived from it.
    pub api_url: Option<String>,

    /// Override request timeout (seconds).
    pub timeout: Option<u64>,

    /// Override poll interval (seconds).
    pub scan_interval: Option<u64>,

    /// Override the per-device minimum update spacing (seconds).
    pub min_update_interval: Option<u64>,

    /// Override the timeout-retry budget.
    pub retries: Option<u32>,
}

// ── Paths ───────────────────────────────────────────────────────────

fn project_dirs() -> Option<ProjectDirs> {
    ProjectDirs::from("com", "incontrol", "incontrol")
}

fn home_fallback(parts: &[&str]) -> PathBuf {
    let mut p = PathBuf::from(std::env::var("HOME").unwrap_or_else(|_| ".".into()));
    p.extend(parts);
    p
}

/// Resolve the config file path via XDG / platform conventions.
pub fn config_path() -> PathBuf {
    project_dirs().map_or_else(
        || home_fallback(&[".config", "incontrol", "config.toml"]),
        |dirs| dirs.config_dir().join("config.toml"),
    )
}

/// Where the OAuth token for `profile_name` is persisted.
pub fn token_path(profile_name: &str) -> PathBuf {
    let file = format!("{profile_name}.token.json");
    project_dirs().map_or_else(
        || home_fallback(&[".local", "share", "incontrol", file.as_str()]),
        |dirs| dirs.data_dir().join(&file),
    )
}

// ── Config loading ──────────────────────────────────────────────────

/// Load the full Config from the canonical file + environment.
pub fn load_config() -> Result<Config, ConfigError> {
    load_config_from(&config_path())
}

/// Load config from `path`, layered over defaults and `INCONTROL_*` env
/// vars (`__` separates nested keys, e.g. `INCONTROL_DEFAULTS__TIMEOUT`).
pub fn load_config_from(path: &Path) -> Result<Config, ConfigError> {
    let figment = Figment::new()
        .merge(Serialized::defaults(Config::default()))
        .merge(Toml::file(path))
        .merge(Env::prefixed("INCONTROL_").split("__"));

    let config: Config = figment.extract()?;
    debug!(path = %path.display(), profiles = config.profiles.len(), "loaded config");
    Ok(config)
}

/// Load config, returning a default if the file doesn't exist.
pub fn load_config_or_default() -> Config {
    load_config().unwrap_or_default()
}

// ── Config saving ───────────────────────────────────────────────────

/// Serialize config to TOML and write to the canonical config path.
pub fn save_config(cfg: &Config) -> Result<(), ConfigError> {
    save_config_to(cfg, &config_path())
}

pub fn save_config_to(cfg: &Config, path: &Path) -> Result<(), ConfigError> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let toml_str = toml::to_string_pretty(cfg)?;
    std::fs::write(path, toml_str)?;
    Ok(())
}

// ── Secret resolution ───────────────────────────────────────────────

fn keyring_account(profile_name: &str) -> String {
    format!("{profile_name}/client-secret")
}

fn keyring_secret(profile_name: &str) -> Option<String> {
    keyring::Entry::new(KEYRING_SERVICE, &keyring_account(profile_name))
        .ok()?
        .get_password()
        .ok()
}

/// Store a client secret in the system keyring.
pub fn store_secret_in_keyring(profile_name: &str, secret: &str) -> Result<(), ConfigError> {
    keyring::Entry::new(KEYRING_SERVICE, &keyring_account(profile_name))?.set_password(secret)?;
    Ok(())
}

/// Resolve the client secret: the profile's `client_secret_env` variable,
/// then `INCONTROL_CLIENT_SECRET`, then the system keyring, then plaintext.
pub fn resolve_client_secret(
    profile: &Profile,
    profile_name: &str,
) -> Result<SecretString, ConfigError> {
    resolve_client_secret_with(
        profile,
        profile_name,
        |name| std::env::var(name).ok(),
        keyring_secret,
    )
}

/// Secret resolution with injectable env and keyring lookups.
pub fn resolve_client_secret_with(
    profile: &Profile,
    profile_name: &str,
    env: impl Fn(&str) -> Option<String>,
    keyring: impl Fn(&str) -> Option<String>,
) -> Result<SecretString, ConfigError> {
    let from_profile_env = profile.client_secret_env.as_deref().and_then(&env);

    from_profile_env
        .or_else(|| env(CLIENT_SECRET_ENV))
        .or_else(|| keyring(profile_name))
        .or_else(|| profile.client_secret.clone())
        .filter(|s| !s.is_empty())
        .map(SecretString::from)
        .ok_or_else(|| ConfigError::NoCredentials {
            profile: profile_name.into(),
        })
}

// ── Translation to SessionConfig ────────────────────────────────────

fn validate(profile: &Profile) -> Result<(), ConfigError> {
    if profile.client_id.trim().is_empty() {
        return Err(ConfigError::Validation {
            field: "client_id".into(),
            reason: "must not be empty".into(),
        });
    }
    if url::Url::parse(&profile.redirect_uri).is_err() {
        return Err(ConfigError::Validation {
            field: "redirect_uri".into(),
            reason: format!("invalid URL: {:?}", profile.redirect_uri),
        });
    }
    Ok(())
}

/// Build a `SessionConfig` from a profile with an already resolved secret.
pub fn build_session_config(
    profile: &Profile,
    client_secret: SecretString,
    defaults: &Defaults,
) -> Result<SessionConfig, ConfigError> {
    validate(profile)?;

    let core_err = |field: &str, e: incontrol_core::CoreError| ConfigError::Validation {
        field: field.into(),
        reason: e.to_string(),
    };

    let mut cfg = SessionConfig::new(
        profile.client_id.clone(),
        client_secret,
        profile.redirect_uri.clone(),
    )
    .map_err(|e| core_err("endpoint", e))?;

    if let Some(ref raw) = profile.api_url {
        let base: url::Url = raw.parse().map_err(|_| ConfigError::Validation {
            field: "api_url".into(),
            reason: format!("invalid URL: {raw}"),
        })?;
        cfg = cfg.with_base_url(&base).map_err(|e| core_err("api_url", e))?;
    }

    cfg.timeout = Duration::from_secs(profile.timeout.unwrap_or(defaults.timeout));
    cfg.scan_interval =
        Duration::from_secs(profile.scan_interval.unwrap_or(defaults.scan_interval));
    if let Some(secs) = profile.min_update_interval {
        cfg.min_update_interval = Duration::from_secs(secs);
    }
    if let Some(retries) = profile.retries {
        cfg.retries = retries;
    }
    Ok(cfg)
}

/// Build a `SessionConfig` from a profile, resolving the secret through
/// the full credential chain.
pub fn profile_to_session_config(
    profile: &Profile,
    profile_name: &str,
    defaults: &Defaults,
) -> Result<SessionConfig, ConfigError> {
    validate(profile)?;
    let secret = resolve_client_secret(profile, profile_name)?;
    build_session_config(profile, secret, defaults)
}
