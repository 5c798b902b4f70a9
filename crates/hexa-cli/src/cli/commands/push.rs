//! Push registration commands.

use anyhow::{Result, bail};
use hexa_core::backend::mask_token;
use hexa_core::push::{LocalNotification, PermissionStatus, PushProvider};
use hexa_core::screens::HomeScreen;

use super::require_session;
use crate::cli::App;

/// A terminal stands in for the device: the token is supplied by the user
/// and local notifications are printed.
struct TerminalDevice {
    token: Option<String>,
}

impl PushProvider for TerminalDevice {
    fn is_physical_device(&self) -> bool {
        true
    }

    async fn permission_status(&self) -> Result<PermissionStatus> {
        Ok(PermissionStatus::Granted)
    }

    async fn request_permission(&self) -> Result<PermissionStatus> {
        Ok(PermissionStatus::Granted)
    }

    async fn push_token(&self, _project_id: Option<&str>) -> Result<String> {
        match &self.token {
            Some(token) => Ok(token.clone()),
            None => bail!("no push token supplied"),
        }
    }

    async fn schedule_local(&self, notification: &LocalNotification) -> Result<()> {
        println!("{}", serde_json::to_string_pretty(notification)?);
        Ok(())
    }
}

pub async fn register(app: &App, token: String) -> Result<()> {
    require_session(app).await?;
    let device = TerminalDevice { token: Some(token) };
    let Some(token) = HomeScreen::new(app.ctx()).register_push(&device).await else {
        bail!("Push registration failed");
    };
    println!("Registered push token {}", mask_token(&token));
    Ok(())
}

pub async fn notify(app: &App) -> Result<()> {
    let device = TerminalDevice { token: None };
    if !HomeScreen::new(app.ctx())
        .send_test_notification(&device)
        .await
    {
        bail!("Notification not delivered");
    }
    Ok(())
}
