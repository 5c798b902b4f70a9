//! Account tab: profile editing plus sign-out.

use crate::action::{InFlight, ReentryPolicy};
use crate::backend::BackendClient;
use crate::notice::{Notice, NoticeSink};
use crate::screens::{ProfileScreen, ScreenContext};

pub struct AccountScreen {
    client: BackendClient,
    notices: NoticeSink,
    reentry: ReentryPolicy,
    signing_out: InFlight,
    profile: ProfileScreen,
}

impl AccountScreen {
    pub fn new(ctx: &ScreenContext) -> Self {
        Self {
            client: ctx.client.clone(),
            notices: ctx.notices.clone(),
            reentry: ctx.reentry,
            signing_out: InFlight::new(),
            profile: ProfileScreen::new(ctx),
        }
    }

    pub fn profile(&self) -> &ProfileScreen {
        &self.profile
    }

    pub fn is_signing_out(&self) -> bool {
        self.signing_out.is_set()
    }

    /// Ends the session. The gate moves to the auth flow through the
    /// resulting auth event, not through this screen.
    pub async fn sign_out(&self) -> bool {
        self.signing_out
            .run("sign out", self.reentry, async {
                self.client
                    .sign_out()
                    .await
                    .inspect_err(|err| self.notices.push(Notice::error(err.message.clone())))
            })
            .await
            .is_some()
    }
}
