//! Password change form.

use crate::action::{InFlight, ReentryPolicy};
use crate::backend::{BackendClient, UserAttributes};
use crate::notice::{Notice, NoticeSink};
use crate::screens::ScreenContext;

pub const PASSWORD_MISMATCH: &str = "Passwords do not match";

pub struct ChangePasswordForm {
    client: BackendClient,
    notices: NoticeSink,
    reentry: ReentryPolicy,
    loading: InFlight,
}

impl ChangePasswordForm {
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

    /// Changes the password. A mismatched confirmation never reaches the
    /// backend. Returns true on success.
    pub async fn submit(&self, password: &str, confirm: &str) -> bool {
        if password != confirm {
            self.notices.push(Notice::error(PASSWORD_MISMATCH));
            return false;
        }

        let attributes = UserAttributes {
            password: Some(password.to_string()),
            ..UserAttributes::default()
        };
        self.loading
            .run("change password", self.reentry, async {
                match self.client.update_user(&attributes).await {
                    Ok(_) => {
                        self.notices
                            .push(Notice::success("Password changed successfully"));
                        Ok(())
                    }
                    Err(err) => {
                        self.notices.push(Notice::error("Failed to change password"));
                        Err(err)
                    }
                }
            })
            .await
            .is_some()
    }
}

#[cfg(test)]
mod tests {
    use wiremock::matchers::{body_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    use super::*;
    use crate::notice::NoticeLevel;
    use crate::screens::testing::signed_in_context;

    #[tokio::test]
    async fn test_mismatch_never_contacts_backend() {
        let server = MockServer::start().await;
        let (ctx, mut inbox) = signed_in_context(&server, "u1");
        let form = ChangePasswordForm::new(&ctx);

        assert!(!form.submit("secret1", "secret2").await);

        let notices = inbox.drain();
        assert_eq!(notices[0].message, PASSWORD_MISMATCH);
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_success_updates_user() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/auth/v1/user"))
            .and(body_json(serde_json::json!({ "password": "secret9" })))
            .respond_with(ResponseTemplate::new(200).set_body_json(serde_json::json!({
                "id": "u1",
                "email": "u1@example.com"
            })))
            .expect(1)
            .mount(&server)
            .await;

        let (ctx, mut inbox) = signed_in_context(&server, "u1");
        let form = ChangePasswordForm::new(&ctx);

        assert!(form.submit("secret9", "secret9").await);
        assert!(!form.is_loading());
        assert_eq!(inbox.drain()[0].level, NoticeLevel::Success);
    }

    #[tokio::test]
    async fn test_rejection_shows_error_and_settles() {
        let server = MockServer::start().await;
        Mock::given(method("PUT"))
            .and(path("/auth/v1/user"))
            .respond_with(ResponseTemplate::new(422).set_body_json(serde_json::json!({
                "msg": "Password should be at least 6 characters"
            })))
            .mount(&server)
            .await;

        let (ctx, mut inbox) = signed_in_context(&server, "u1");
        let form = ChangePasswordForm::new(&ctx);
        let flag = form.loading.watch();

        assert!(!form.submit("abc", "abc").await);
        assert!(!*flag.borrow());
        let notices = inbox.drain();
        assert_eq!(notices.len(), 1);
        assert_eq!(notices[0].message, "Failed to change password");
    }
}
