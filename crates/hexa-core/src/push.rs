//! Push-notification registration.
//!
//! The device side (permission prompts, token issuance, local delivery) sits
//! behind [`PushProvider`]; this module decides when to ask and where the
//! token is stored. Notifications arriving while the app runs are turned
//! into notices by [`listen_for_notifications`].

use std::future::Future;

use anyhow::Result;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use tokio::sync::broadcast;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;

use crate::backend::{BackendClient, BackendResult, Subscription};
use crate::config::Config;
use crate::notice::{Notice, NoticeSink};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionStatus {
    Granted,
    Denied,
    Undetermined,
}

/// A notification shown on this device without going through a server.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LocalNotification {
    pub title: String,
    pub body: String,
    pub data: Value,
}

impl LocalNotification {
    /// The sample notification sent from the home screen.
    pub fn sample() -> Self {
        Self {
            title: "New notification! 📬".to_string(),
            body: "This is a sample notification from the app".to_string(),
            data: serde_json::json!({ "data": "Some extra data" }),
        }
    }
}

/// A notification reported by the device while the app runs.
#[derive(Debug, Clone, PartialEq)]
pub enum NotificationEvent {
    /// Shown while the app is in the foreground.
    Received(LocalNotification),
    /// The user opened it.
    Tapped(LocalNotification),
}

/// Device notification API.
pub trait PushProvider: Send + Sync {
    /// Push tokens are only issued to real devices.
    fn is_physical_device(&self) -> bool;

    fn permission_status(&self) -> impl Future<Output = Result<PermissionStatus>> + Send;

    /// Prompts the user. Returns the status after the prompt.
    fn request_permission(&self) -> impl Future<Output = Result<PermissionStatus>> + Send;

    fn push_token(&self, project_id: Option<&str>) -> impl Future<Output = Result<String>> + Send;

    /// Delivers a notification immediately.
    fn schedule_local(
        &self,
        notification: &LocalNotification,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Stream of received and tapped notifications, if the device reports them.
    fn notification_events(&self) -> Option<broadcast::Receiver<NotificationEvent>> {
        None
    }
}

/// Forwards device notifications until the returned handle is released.
///
/// Received notifications become info notices; taps are logged. Returns
/// `None` when the provider reports no notification events.
pub fn listen_for_notifications<P: PushProvider>(
    provider: &P,
    notices: &NoticeSink,
) -> Option<Subscription> {
    let mut rx = provider.notification_events()?;
    let notices = notices.clone();
    let token = CancellationToken::new();
    let cancelled = token.clone();

    tokio::spawn(async move {
        loop {
            tokio::select! {
                biased;
                () = cancelled.cancelled() => break,
                event = rx.recv() => match event {
                    Ok(NotificationEvent::Received(notification)) => {
                        tracing::debug!(title = %notification.title, "notification received");
                        notices.push(Notice::info(format!(
                            "{}: {}",
                            notification.title, notification.body
                        )));
                    }
                    Ok(NotificationEvent::Tapped(notification)) => {
                        tracing::info!(title = %notification.title, data = %notification.data, "notification tapped");
                    }
                    Err(RecvError::Lagged(skipped)) => {
                        tracing::warn!(skipped, "notification listener lagged");
                    }
                    Err(RecvError::Closed) => break,
                },
            }
        }
    });

    Some(Subscription::new(token))
}

/// Obtains a push token, asking for permission if needed.
///
/// Returns `Ok(None)` after pushing an error notice when the device cannot
/// receive pushes or the user denies permission.
pub async fn register_for_push<P: PushProvider>(
    provider: &P,
    project_id: Option<&str>,
    notices: &NoticeSink,
) -> Result<Option<String>> {
    if !provider.is_physical_device() {
        notices.push(Notice::error(
            "Must use a physical device for push notifications",
        ));
        return Ok(None);
    }

    let mut status = provider.permission_status().await?;
    if status != PermissionStatus::Granted {
        status = provider.request_permission().await?;
    }
    if status != PermissionStatus::Granted {
        tracing::info!(?status, "push permission not granted");
        notices.push(Notice::error("Failed to get push token for push notification!"));
        return Ok(None);
    }

    let token = provider.push_token(project_id).await?;
    tracing::debug!("push token issued");
    Ok(Some(token))
}

#[derive(Serialize)]
struct PushTokenRow<'a> {
    user_id: &'a str,
    token: &'a str,
    created_at: DateTime<Utc>,
}

/// Stores the token for the signed-in user. Returns `false` when signed out.
pub async fn save_push_token(
    client: &BackendClient,
    table: &str,
    token: &str,
) -> BackendResult<bool> {
    let Some(user) = client.get_user().await? else {
        return Ok(false);
    };
    let row = PushTokenRow {
        user_id: &user.id,
        token,
        created_at: Utc::now(),
    };
    client.upsert(table, &row, None).await?;
    tracing::info!(user_id = %user.id, "push token saved");
    Ok(true)
}

/// Registration flow run once the main tabs are mounted.
#[derive(Clone)]
pub struct PushService {
    client: BackendClient,
    table: String,
    project_id: Option<String>,
}

impl PushService {
    pub fn new(client: BackendClient, table: impl Into<String>, project_id: Option<String>) -> Self {
        Self {
            client,
            table: table.into(),
            project_id,
        }
    }

    pub fn from_config(client: BackendClient, config: &Config) -> Self {
        Self::new(
            client,
            config.tables.push_tokens.clone(),
            config.push.effective_project_id().map(str::to_string),
        )
    }

    /// Registers the device and stores its token.
    ///
    /// Failures are logged, never raised. Returns the token when one was
    /// issued, even if storing it failed.
    pub async fn register<P: PushProvider>(
        &self,
        provider: &P,
        notices: &NoticeSink,
    ) -> Option<String> {
        let token = match register_for_push(provider, self.project_id.as_deref(), notices).await {
            Ok(Some(token)) => token,
            Ok(None) => return None,
            Err(err) => {
                tracing::error!(error = %format!("{err:#}"), "push registration failed");
                return None;
            }
        };

        match save_push_token(&self.client, &self.table, &token).await {
            Ok(true) => {}
            Ok(false) => tracing::warn!("push token not saved: signed out"),
            Err(err) => tracing::error!(error = %err, "failed to save push token"),
        }
        Some(token)
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;

    /// Scriptable device.
    pub struct FakePushProvider {
        pub physical: bool,
        pub status: PermissionStatus,
        pub grant_on_request: bool,
        pub requests: AtomicUsize,
        pub delivered: Mutex<Vec<LocalNotification>>,
        pub fail_delivery: bool,
        pub events: broadcast::Sender<NotificationEvent>,
    }

    impl FakePushProvider {
        pub fn granted() -> Self {
            Self {
                physical: true,
                status: PermissionStatus::Granted,
                grant_on_request: true,
                requests: AtomicUsize::new(0),
                delivered: Mutex::new(Vec::new()),
                fail_delivery: false,
                events: broadcast::channel(16).0,
            }
        }
    }

    impl PushProvider for FakePushProvider {
        fn is_physical_device(&self) -> bool {
            self.physical
        }

        async fn permission_status(&self) -> Result<PermissionStatus> {
            Ok(self.status)
        }

        async fn request_permission(&self) -> Result<PermissionStatus> {
            self.requests.fetch_add(1, Ordering::SeqCst);
            Ok(if self.grant_on_request {
                PermissionStatus::Granted
            } else {
                PermissionStatus::Denied
            })
        }

        async fn push_token(&self, project_id: Option<&str>) -> Result<String> {
            Ok(format!("ExponentPushToken[{}]", project_id.unwrap_or("none")))
        }

        async fn schedule_local(&self, notification: &LocalNotification) -> Result<()> {
            if self.fail_delivery {
                anyhow::bail!("notifications unavailable");
            }
            self.delivered.lock().unwrap().push(notification.clone());
            let _ = self
                .events
                .send(NotificationEvent::Received(notification.clone()));
            Ok(())
        }

        fn notification_events(&self) -> Option<broadcast::Receiver<NotificationEvent>> {
            Some(self.events.subscribe())
        }
    }
}
