//! Sign-in and sign-up forms.

use crate::action::{InFlight, ReentryPolicy};
use crate::backend::{BackendClient, Session, SignUpOutcome};
use crate::notice::{Notice, NoticeSink};
use crate::screens::ScreenContext;

/// Shown when sign-up succeeds but the account still needs confirming.
pub const VERIFY_EMAIL_NOTICE: &str = "Please check your inbox for email verification!";

pub struct LoginForm {
    client: BackendClient,
    notices: NoticeSink,
    reentry: ReentryPolicy,
    loading: InFlight,
}

impl LoginForm {
    pub fn new(ctx: &ScreenContext) -> Self {
        Self {
            client: ctx.client.clone(),
            notices: ctx.notices.clone(),
            reentry: ctx.reentry,
            loading: InFlight::new(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_set()
    }

    /// Signs in. Rejections become an error notice.
    pub async fn submit(&self, email: &str, password: &str) -> Option<Session> {
        self.loading
            .run("sign in", self.reentry, async {
                self.client
                    .sign_in_with_password(email.trim(), password)
                    .await
                    .inspect_err(|err| self.notices.push(Notice::error(err.message.clone())))
            })
            .await
    }
}

pub struct RegisterForm {
    client: BackendClient,
    notices: NoticeSink,
    reentry: ReentryPolicy,
    loading: InFlight,
}

impl RegisterForm {
    pub fn new(ctx: &ScreenContext) -> Self {
        Self {
            client: ctx.client.clone(),
            notices: ctx.notices.clone(),
            reentry: ctx.reentry,
            loading: InFlight::new(),
        }
    }

    pub fn is_loading(&self) -> bool {
        self.loading.is_set()
    }

    /// Creates an account.
    ///
    /// An outcome without a session is not an error: the user is told to
    /// confirm their email and stays signed out.
    pub async fn submit(&self, email: &str, password: &str) -> Option<SignUpOutcome> {
        self.loading
            .run("sign up", self.reentry, async {
                let outcome = self
                    .client
                    .sign_up(email.trim(), password)
                    .await
                    .inspect_err(|err| self.notices.push(Notice::error(err.message.clone())))?;
                if outcome.session.is_none() {
                    self.notices.push(Notice::info(VERIFY_EMAIL_NOTICE));
                }
                Ok::<_, crate::backend::BackendError>(outcome)
            })
            .await
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    Login,
    Register,
}

/// The auth flow's single screen: one form at a time.
pub struct AuthScreen {
    mode: AuthMode,
    login: LoginForm,
    register: RegisterForm,
}

impl AuthScreen {
    pub fn new(ctx: &ScreenContext) -> Self {
        Self {
            mode: AuthMode::default(),
            login: LoginForm::new(ctx),
            register: RegisterForm::new(ctx),
        }
    }

    pub fn mode(&self) -> AuthMode {
        self.mode
    }

    pub fn toggle(&mut self) -> AuthMode {
        self.mode = match self.mode {
            AuthMode::Login => AuthMode::Register,
            AuthMode::Register => AuthMode::Login,
        };
        self.mode
    }

    pub fn login(&self) -> &LoginForm {
        &self.login
    }

    pub fn register(&self) -> &RegisterForm {
        &self.register
    }
}
