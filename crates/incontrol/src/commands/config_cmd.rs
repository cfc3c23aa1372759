//! Config subcommand handlers.

use dialoguer::{Input, Select};

use crate::cli::{ConfigArgs, ConfigCommand, GlobalOpts};
use crate::config::{self, Config, Profile};
use crate::error::CliError;
use crate::output;

use super::util::prompt_err;

/// Redirect URI offered by the init wizard.
const DEFAULT_REDIRECT_URI: &str = "http://localhost:8123/api/incontrol2";

const MASK: &str = "****";

// ── Helpers ─────────────────────────────────────────────────────────

/// A copy of the config with plaintext secrets masked.
fn redacted(cfg: &Config) -> Config {
    let mut out = cfg.clone();
    for profile in out.profiles.values_mut() {
        if profile.client_secret.is_some() {
            profile.client_secret = Some(MASK.into());
        }
    }
    out
}

/// TOML-style rendering for the table view.
fn format_config(cfg: &Config) -> String {
    use std::fmt::Write;
    let mut out = String::new();

    if let Some(ref default) = cfg.default_profile {
        let _ = writeln!(out, "default_profile = \"{default}\"");
    }
    let _ = writeln!(out);
    let _ = writeln!(out, "[defaults]");
    let _ = writeln!(out, "output = \"{}\"", cfg.defaults.output);
    let _ = writeln!(out, "color = \"{}\"", cfg.defaults.color);
    let _ = writeln!(out, "timeout = {}", cfg.defaults.timeout);
    let _ = writeln!(out, "scan_interval = {}", cfg.defaults.scan_interval);

    let mut names: Vec<_> = cfg.profiles.keys().collect();
    names.sort();
    for name in names {
        let p = &cfg.profiles[name];
        let _ = writeln!(out);
        let _ = writeln!(out, "[profiles.{name}]");
        let _ = writeln!(out, "client_id = \"{}\"", p.client_id);
        let _ = writeln!(out, "redirect_uri = \"{}\"", p.redirect_uri);
        if let Some(ref secret) = p.client_secret {
            let _ = writeln!(out, "client_secret = \"{secret}\"");
        }
        if let Some(ref env) = p.client_secret_env {
            let _ = writeln!(out, "client_secret_env = \"{env}\"");
        }
        if let Some(ref api) = p.api_url {
            let _ = writeln!(out, "api_url = \"{api}\"");
        }
        for (key, value) in [
            ("timeout", p.timeout),
            ("scan_interval", p.scan_interval),
            ("min_update_interval", p.min_update_interval),
            ("retries", p.retries.map(u64::from)),
        ] {
            if let Some(v) = value {
                let _ = writeln!(out, "{key} = {v}");
            }
        }
    }

    out
}

fn save_config(cfg: &Config) -> Result<(), CliError> {
    config::save_config(cfg)?;
    Ok(())
}

fn parse_number<T: std::str::FromStr>(field: &str, value: &str) -> Result<T, CliError> {
    value.parse().map_err(|_| CliError::Validation {
        field: field.into(),
        reason: format!("must be a non-negative number, got '{value}'"),
    })
}

fn validate_url(field: &str, value: &str) -> Result<(), CliError> {
    url::Url::parse(value).map(drop).map_err(|e| CliError::Validation {
        field: field.into(),
        reason: format!("invalid URL '{value}': {e}"),
    })
}

/// Read a non-empty client secret from the terminal without echo.
fn prompt_secret() -> Result<String, CliError> {
    let secret = rpassword::prompt_password("Client secret: ").map_err(prompt_err)?;
    if secret.is_empty() {
        return Err(CliError::Validation {
            field: "client_secret".into(),
            reason: "client secret cannot be empty".into(),
        });
    }
    Ok(secret)
}

/// Apply `key = value` to a profile.
fn set_profile_key(profile: &mut Profile, key: &str, value: String) -> Result<(), CliError> {
    match key {
        "client_id" | "client-id" => profile.client_id = value,
        "client_secret" | "client-secret" => profile.client_secret = Some(value),
        "client_secret_env" | "client-secret-env" => profile.client_secret_env = Some(value),
        "redirect_uri" | "redirect-uri" => {
            validate_url("redirect_uri", &value)?;
            profile.redirect_uri = value;
        }
        "api_url" | "api-url" => {
            validate_url("api_url", &value)?;
            profile.api_url = Some(value);
        }
        "timeout" => profile.timeout = Some(parse_number("timeout", &value)?),
        "scan_interval" | "scan-interval" => {
            profile.scan_interval = Some(parse_number("scan_interval", &value)?);
        }
        "min_update_interval" | "min-update-interval" => {
            profile.min_update_interval = Some(parse_number("min_update_interval", &value)?);
        }
        "retries" => profile.retries = Some(parse_number("retries", &value)?),
        other => {
            return Err(CliError::Validation {
                field: other.into(),
                reason: format!(
                    "unknown config key '{other}'. Valid keys: client_id, client_secret, \
                     client_secret_env, redirect_uri, api_url, timeout, scan_interval, \
                     min_update_interval, retries"
                ),
            });
        }
    }
    Ok(())
}

// ── Handler ─────────────────────────────────────────────────────────

#[allow(clippy::too_many_lines)]
pub fn handle(args: ConfigArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        // ── Init: interactive wizard ────────────────────────────────
        ConfigCommand::Init => {
            let config_path = config::config_path();
            eprintln!("InControl2 CLI configuration wizard");
            eprintln!("   Config path: {}\n", config_path.display());

            let profile_name: String = Input::new()
                .with_prompt("Profile name")
                .default("default".into())
                .interact_text()
                .map_err(prompt_err)?;

            let client_id: String = Input::new()
                .with_prompt("OAuth client id")
                .interact_text()
                .map_err(prompt_err)?;

            let redirect_uri: String = Input::new()
                .with_prompt("Redirect URI registered for the client")
                .default(DEFAULT_REDIRECT_URI.into())
                .interact_text()
                .map_err(prompt_err)?;
            validate_url("redirect_uri", &redirect_uri)?;

            let secret = prompt_secret()?;
            let choices = &[
                "Store in system keyring (recommended)",
                "Save to config file (plaintext)",
            ];
            let selection = Select::new()
                .with_prompt("Where to store the client secret?")
                .items(choices)
                .default(0)
                .interact()
                .map_err(prompt_err)?;
            let client_secret = if selection == 0 {
                incontrol_config::store_secret_in_keyring(&profile_name, &secret)?;
                eprintln!("   ✓ Client secret stored in system keyring");
                None
            } else {
                Some(secret)
            };

            let mut cfg = config::load_config_or_default();
            cfg.profiles.insert(
                profile_name.clone(),
                Profile {
                    client_id,
                    client_secret,
                    redirect_uri,
                    ..Profile::default()
                },
            );
            cfg.default_profile = Some(profile_name.clone());
            save_config(&cfg)?;

            eprintln!("\n✓ Configuration written to {}", config_path.display());
            eprintln!("  Active profile: {profile_name}");
            eprintln!("\n  Next: incontrol auth login");
            Ok(())
        }

        // ── Show ────────────────────────────────────────────────────
        ConfigCommand::Show => {
            let cfg = redacted(&config::load_config_or_default());
            let out = output::render_single(&global.output, &cfg, format_config, |_| {
                "config".into()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        // ── Set <key> <value> ───────────────────────────────────────
        ConfigCommand::Set { key, value } => {
            let mut cfg = config::load_config_or_default();
            let profile_name = config::active_profile_name(global, &cfg);

            let profile = cfg.profiles.entry(profile_name.clone()).or_default();
            set_profile_key(profile, &key, value)?;

            save_config(&cfg)?;
            if !global.quiet {
                eprintln!("✓ Set {key} on profile '{profile_name}'");
            }
            Ok(())
        }

        // ── Profiles ────────────────────────────────────────────────
        ConfigCommand::Profiles => {
            let cfg = config::load_config_or_default();
            let default = cfg.default_profile.as_deref().unwrap_or("default");
            if cfg.profiles.is_empty() {
                eprintln!("No profiles configured. Run: incontrol config init");
            } else {
                let mut names: Vec<_> = cfg.profiles.keys().collect();
                names.sort();
                for name in names {
                    let marker = if name == default { " *" } else { "" };
                    println!("{name}{marker}");
                }
            }
            Ok(())
        }

        // ── Use <name> ─────────────────────────────────────────────
        ConfigCommand::Use { name } => {
            let mut cfg = config::load_config_or_default();
            if !cfg.profiles.contains_key(&name) {
                return Err(CliError::ProfileNotFound {
                    available: config::available_profiles(&cfg),
                    name,
                });
            }

            cfg.default_profile = Some(name.clone());
            save_config(&cfg)?;
            if !global.quiet {
                eprintln!("✓ Default profile set to '{name}'");
            }
            Ok(())
        }

        // ── SetSecret ───────────────────────────────────────────────
        ConfigCommand::SetSecret { profile } => {
            let cfg = config::load_config_or_default();
            let profile_name = profile.unwrap_or_else(|| config::active_profile_name(global, &cfg));
            config::find_profile(&cfg, &profile_name)?;

            let secret = prompt_secret()?;
            incontrol_config::store_secret_in_keyring(&profile_name, &secret)?;
            if !global.quiet {
                eprintln!("✓ Client secret stored in system keyring for profile '{profile_name}'");
            }
            Ok(())
        }
    }
}
