//! UI-free screen models.
//!
//! Each screen owns its in-flight flags and reports outcomes through the
//! shared notice sink. Every backend call goes through [`InFlight::run`], so
//! flags always settle and failures never escape a screen.
//!
//! [`InFlight::run`]: crate::action::InFlight::run

mod account;
mod auth;
mod home;
mod password;
mod profile;

pub use account::AccountScreen;
pub use auth::{AuthMode, AuthScreen, LoginForm, RegisterForm};
pub use home::HomeScreen;
pub use password::ChangePasswordForm;
pub use profile::ProfileScreen;

use crate::action::ReentryPolicy;
use crate::backend::BackendClient;
use crate::config::Config;
use crate::notice::NoticeSink;

/// What every screen is built from.
#[derive(Clone)]
pub struct ScreenContext {
    pub client: BackendClient,
    pub notices: NoticeSink,
    pub reentry: ReentryPolicy,
    pub config: Config,
}

impl ScreenContext {
    pub fn new(client: BackendClient, notices: NoticeSink, config: Config) -> Self {
        Self {
            client,
            notices,
            reentry: config.actions.reentry,
            config,
        }
    }
}
