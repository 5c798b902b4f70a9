//! CLI command handlers.

pub mod auth;
pub mod config;
pub mod profile;
pub mod push;
pub mod session;

use anyhow::{Result, bail};
use hexa_core::backend::Session;

use crate::cli::App;

/// Returns the live session, refreshing it if needed.
pub(crate) async fn require_session(app: &App) -> Result<Session> {
    match app.client().get_session().await? {
        Some(session) => Ok(session),
        None => bail!("Not signed in. Run `hexa login` first."),
    }
}
