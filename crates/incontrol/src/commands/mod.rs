//! Command dispatch: connects a session, then hands it to the handler.

pub mod auth;
pub mod config_cmd;
pub mod devices;
pub mod groups;
pub mod orgs;
pub mod util;
pub mod wans;
pub mod watch;

use std::sync::Arc;

use incontrol_core::{Session, SessionConfig};

use crate::cli::{Command, GlobalOpts};
use crate::config;
use crate::error::CliError;

/// Connect with the active profile's stored token and run discovery.
pub async fn connect(global: &GlobalOpts) -> Result<Session, CliError> {
    let (profile_name, session_config) = config::resolve_session(global)?;
    connect_with(&profile_name, session_config).await
}

pub async fn connect_with(
    profile_name: &str,
    session_config: SessionConfig,
) -> Result<Session, CliError> {
    let store = Arc::new(config::token_store(profile_name));
    tracing::debug!(profile = profile_name, token = %store.path().display(), "connecting");
    Ok(Session::connect(session_config, store).await?)
}

/// Dispatch a session-bound command to the appropriate handler.
pub async fn dispatch(cmd: Command, global: &GlobalOpts) -> Result<(), CliError> {
    match cmd {
        Command::Watch(args) => watch::handle(args, global).await,
        Command::Orgs(args) => orgs::handle(&connect(global).await?, args, global),
        Command::Groups(args) => groups::handle(&connect(global).await?, args, global),
        Command::Devices(args) => devices::handle(&connect(global).await?, args, global),
        Command::Wans(args) => wans::handle(&connect(global).await?, args, global),
        // Handled before dispatch
        Command::Auth(_) | Command::Config(_) | Command::Completions(_) => unreachable!(),
    }
}
