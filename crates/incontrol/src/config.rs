//! CLI configuration: thin wrapper around `incontrol_config`.
//!
//! Adds profile selection from `GlobalOpts` and the `--timeout` override.

use std::time::Duration;

use incontrol_core::{FileTokenStore, SessionConfig};

use crate::cli::GlobalOpts;
use crate::error::CliError;

// ── Re-exports from shared crate ────────────────────────────────────

pub use incontrol_config::{
    Config, Profile, config_path, load_config_or_default, save_config, token_path,
};

// ── CLI-specific helpers ────────────────────────────────────────────

/// Resolve the active profile name from CLI flags and config.
pub fn active_profile_name(global: &GlobalOpts, config: &Config) -> String {
    global
        .profile
        .clone()
        .or_else(|| config.default_profile.clone())
        .unwrap_or_else(|| "default".into())
}

/// The profile's persisted token store.
pub fn token_store(profile_name: &str) -> FileTokenStore {
    FileTokenStore::new(token_path(profile_name))
}

/// Look up `name`, distinguishing "no config at all" from a missing profile.
pub fn find_profile<'a>(cfg: &'a Config, name: &str) -> Result<&'a Profile, CliError> {
    if cfg.profiles.is_empty() {
        return Err(CliError::NoConfig {
            path: config_path().display().to_string(),
        });
    }
    cfg.profiles
        .get(name)
        .ok_or_else(|| CliError::ProfileNotFound {
            name: name.into(),
            available: available_profiles(cfg),
        })
}

/// Comma-separated sorted profile names, or `(none)`.
pub fn available_profiles(cfg: &Config) -> String {
    let mut names: Vec<_> = cfg.profiles.keys().cloned().collect();
    if names.is_empty() {
        return "(none)".into();
    }
    names.sort();
    names.join(", ")
}

/// Build the `SessionConfig` for the active profile.
///
/// Returns the profile name alongside, since callers need it for the
/// token store.
pub fn resolve_session(global: &GlobalOpts) -> Result<(String, SessionConfig), CliError> {
    let cfg = load_config_or_default();
    let profile_name = active_profile_name(global, &cfg);
    let profile = find_profile(&cfg, &profile_name)?;

    let mut session_config =
        incontrol_config::profile_to_session_config(profile, &profile_name, &cfg.defaults)?;
    if let Some(secs) = global.timeout {
        session_config.timeout = Duration::from_secs(secs);
    }
    Ok((profile_name, session_config))
}
