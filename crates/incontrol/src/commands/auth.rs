//! OAuth authorization flow and stored-token management.

use chrono::Utc;
use dialoguer::Input;
use serde::Serialize;

use incontrol_core::{Session, TokenRecord, TokenStore};

use crate::cli::{AuthArgs, AuthCommand, GlobalOpts};
use crate::config;
use crate::error::CliError;
use crate::output;

use super::util;

// ── Views ───────────────────────────────────────────────────────────

#[derive(Serialize)]
struct AuthUrl {
    profile: String,
    url: String,
}

#[derive(Serialize)]
struct TokenStatus {
    profile: String,
    token_file: String,
    authorized: bool,
    expires_at: Option<String>,
    remaining_secs: Option<i64>,
    refresh_due: Option<bool>,
}

impl TokenStatus {
    fn new(profile: &str, token_file: String, token: Option<&TokenRecord>) -> Self {
        let now = Utc::now().timestamp();
        Self {
            profile: profile.into(),
            token_file,
            authorized: token.is_some(),
            expires_at: token.map(|t| util::format_unix(t.expires_at)),
            remaining_secs: token.map(|t| t.remaining_secs_at(now)),
            refresh_due: token.map(|t| t.needs_refresh_at(now)),
        }
    }

    fn detail(&self) -> String {
        use std::fmt::Write;
        let mut out = String::new();
        let _ = writeln!(out, "Profile:     {}", self.profile);
        let _ = writeln!(out, "Token file:  {}", self.token_file);
        if !self.authorized {
            let _ = write!(out, "Status:      not authorized (run: incontrol auth login)");
            return out;
        }
        let _ = writeln!(out, "Expires at:  {}", output::or_dash(self.expires_at.as_ref()));
        let _ = writeln!(
            out,
            "Remaining:   {}",
            self.remaining_secs
                .map_or_else(|| "-".into(), util::format_remaining)
        );
        let due = if self.refresh_due == Some(true) { "yes" } else { "no" };
        let _ = write!(out, "Refresh due: {due}");
        out
    }
}

// ── Handler ─────────────────────────────────────────────────────────

pub async fn handle(args: AuthArgs, global: &GlobalOpts) -> Result<(), CliError> {
    match args.command {
        AuthCommand::Url => {
            let (profile, session_config) = config::resolve_session(global)?;
            let view = AuthUrl {
                profile,
                url: Session::authorize_url(&session_config)?.to_string(),
            };
            let out = output::render_single(&global.output, &view, |v| v.url.clone(), |v| {
                v.url.clone()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        AuthCommand::Login { code } => {
            let (profile, session_config) = config::resolve_session(global)?;
            let code = match code {
                Some(code) => code,
                None => {
                    let url = Session::authorize_url(&session_config)?;
                    eprintln!("Open this URL, approve access, then paste the `code` parameter");
                    eprintln!("from the redirect:\n\n  {url}\n");
                    Input::new()
                        .with_prompt("Authorization code")
                        .interact_text()
                        .map_err(util::prompt_err)?
                }
            };
            if code.trim().is_empty() {
                return Err(CliError::Validation {
                    field: "code".into(),
                    reason: "authorization code cannot be empty".into(),
                });
            }

            let store = config::token_store(&profile);
            let token = Session::complete_authorization(&session_config, &store, &code).await?;
            if !global.quiet {
                eprintln!(
                    "✓ Authorized profile '{profile}', token valid until {}",
                    util::format_unix(token.expires_at)
                );
            }
            Ok(())
        }

        AuthCommand::Status => {
            let cfg = config::load_config_or_default();
            let profile = config::active_profile_name(global, &cfg);
            let store = config::token_store(&profile);
            let token = store.load()?;

            let status = TokenStatus::new(
                &profile,
                store.path().display().to_string(),
                token.as_ref(),
            );
            let out = output::render_single(&global.output, &status, TokenStatus::detail, |s| {
                s.authorized.to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        AuthCommand::Refresh => {
            let (profile, session_config) = config::resolve_session(global)?;
            let store = config::token_store(&profile);
            let current = store.load()?;

            let refreshed = session_config
                .oauth_client()?
                .refresh(current.clone())
                .await
                .map_err(|e| CliError::ReauthRequired {
                    reason: e.to_string(),
                })?;

            if current.as_ref() == Some(&refreshed) {
                tracing::info!(profile = %profile, "token still valid, not refreshed");
            } else {
                store.save(&refreshed)?;
                if !global.quiet {
                    eprintln!("✓ Token refreshed");
                }
            }

            let status = TokenStatus::new(
                &profile,
                store.path().display().to_string(),
                Some(&refreshed),
            );
            let out = output::render_single(&global.output, &status, TokenStatus::detail, |s| {
                s.authorized.to_string()
            })?;
            output::print_output(&out, global.quiet);
            Ok(())
        }

        AuthCommand::Logout => {
            let cfg = config::load_config_or_default();
            let profile = config::active_profile_name(global, &cfg);
            if !util::confirm(
                &format!("Delete the stored token for profile '{profile}'?"),
                "auth logout",
                global.yes,
            )? {
                return Ok(());
            }
            config::token_store(&profile).clear()?;
            if !global.quiet {
                eprintln!("✓ Token removed for profile '{profile}'");
            }
            Ok(())
        }
    }
}
