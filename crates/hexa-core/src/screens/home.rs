//! Home tab.

use crate::action::{InFlight, ReentryPolicy};
use crate::backend::Subscription;
use crate::notice::NoticeSink;
use crate::push::{self, LocalNotification, PushProvider, PushService};
use crate::screens::ScreenContext;

pub struct HomeScreen {
    push: PushService,
    notices: NoticeSink,
    reentry: ReentryPolicy,
    sending: InFlight,
}

impl HomeScreen {
    pub fn new(ctx: &ScreenContext) -> Self {
        Self {
            push: PushService::from_config(ctx.client.clone(), &ctx.config),
            notices: ctx.notices.clone(),
            reentry: ctx.reentry,
            sending: InFlight::new(),
        }
    }

    pub fn is_sending(&self) -> bool {
        self.sending.is_set()
    }

    /// Registers this device for pushes once the main tabs are shown.
    pub async fn register_push<P: PushProvider>(&self, provider: &P) -> Option<String> {
        self.push.register(provider, &self.notices).await
    }

    /// Surfaces incoming notifications as notices while the handle is held.
    pub fn listen_for_notifications<P: PushProvider>(&self, provider: &P) -> Option<Subscription> {
        push::listen_for_notifications(provider, &self.notices)
    }

    /// Shows the sample notification. Delivery errors are only logged.
    pub async fn send_test_notification<P: PushProvider>(&self, provider: &P) -> bool {
        let notification = LocalNotification::sample();
        self.sending
            .run(
                "send notification",
                self.reentry,
                provider.schedule_local(&notification),
            )
            .await
            .is_some()
    }
}
