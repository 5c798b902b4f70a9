//! Backend-as-a-service client.
//!
//! Talks to the three services behind one base URL:
//! - `auth`: password sign-in/sign-up, token refresh, user updates (`/auth/v1`)
//! - `rest`: table reads and upserts (`/rest/v1`)
//! - `storage`: object upload/download (`/storage/v1`)
//!
//! Every request carries the project's anon key in the `apikey` header and a
//! bearer token: the session's access token when signed in, the anon key
//! otherwise.

mod auth;
mod error;
mod rest;
mod session;
mod storage;

use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use anyhow::{Context, Result};
pub use auth::{AuthChangeEvent, AuthEvent, SignUpOutcome, Subscription, UserAttributes};
pub use error::{BackendError, BackendErrorKind, BackendResult};
use serde::de::DeserializeOwned;
pub use session::{Session, SessionStore, User, mask_token};
#[cfg(test)]
pub(crate) use session::test_session;
pub use storage::{Blob, UploadOptions};
use tokio::sync::broadcast;
use url::Url;

use crate::config::Config;
use crate::gate::GateLease;

/// Capacity of the auth event channel; slow listeners resync on lag.
const AUTH_EVENT_CAPACITY: usize = 32;

/// Runtime settings for [`BackendClient`].
#[derive(Debug, Clone)]
pub struct BackendConfig {
    pub base_url: String,
    pub anon_key: String,
    /// Per-request timeout (`None` disables)
    pub request_timeout: Option<Duration>,
    pub auto_refresh: bool,
    /// Refresh the access token when it expires within this window
    pub refresh_margin: Duration,
    pub store: SessionStore,
}

impl BackendConfig {
    pub fn from_config(config: &Config) -> Self {
        let store = if config.auth.persist_session {
            SessionStore::default_location()
        } else {
            SessionStore::in_memory()
        };
        Self {
            base_url: config.effective_backend_url(),
            anon_key: config.effective_anon_key(),
            request_timeout: config.request_timeout(),
            auto_refresh: config.auth.auto_refresh,
            refresh_margin: Duration::from_secs(config.auth.refresh_margin_secs),
            store,
        }
    }
}

/// Shared handle to the backend. Cheap to clone.
#[derive(Clone)]
pub struct BackendClient {
    inner: Arc<Inner>,
}

struct Inner {
    http: reqwest::Client,
    base_url: Url,
    anon_key: String,
    store: SessionStore,
    session: Mutex<Option<Session>>,
    refresh_lock: tokio::sync::Mutex<()>,
    events: broadcast::Sender<AuthEvent>,
    auto_refresh: bool,
    refresh_margin: Duration,
    gate_lease: GateLease,
}

impl BackendClient {
    /// Creates a client and restores any persisted session.
    ///
    /// A persisted session that cannot be read is discarded with a warning.
    pub fn new(config: BackendConfig) -> Result<Self> {
        let base_url = Url::parse(config.base_url.trim())
            .with_context(|| format!("Invalid backend URL: {}", config.base_url))?;
        if base_url.cannot_be_a_base() {
            anyhow::bail!("Invalid backend URL: {}", config.base_url);
        }

        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout {
            builder = builder.timeout(timeout);
        }
        let http = builder.build().context("Failed to build HTTP client")?;

        let restored = match config.store.load() {
            Ok(session) => session,
            Err(err) => {
                tracing::warn!(error = %format!("{err:#}"), "discarding unreadable session");
                None
            }
        };
        if let Some(session) = &restored {
            tracing::debug!(user_id = %session.user_id(), "restored persisted session");
        }

        let (events, _) = broadcast::channel(AUTH_EVENT_CAPACITY);

        Ok(Self {
            inner: Arc::new(Inner {
                http,
                base_url,
                anon_key: config.anon_key,
                store: config.store,
                session: Mutex::new(restored),
                refresh_lock: tokio::sync::Mutex::new(()),
                events,
                auto_refresh: config.auto_refresh,
                refresh_margin: config.refresh_margin,
                gate_lease: GateLease::default(),
            }),
        })
    }

    /// Builds a client from the loaded configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(BackendConfig::from_config(config))
    }

    /// Returns the mirrored session without refreshing it.
    pub fn current_session(&self) -> Option<Session> {
        self.inner
            .session
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    pub(crate) fn gate_lease(&self) -> &GateLease {
        &self.inner.gate_lease
    }

    /// Builds an endpoint URL below the base URL.
    fn endpoint(&self, segments: &[&str]) -> BackendResult<Url> {
        let mut url = self.inner.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| {
                BackendError::new(BackendErrorKind::Parse, "Backend URL cannot be a base")
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// Attaches the project key and the bearer token.
    fn authorize(&self, builder: reqwest::RequestBuilder, bearer: &str) -> reqwest::RequestBuilder {
        builder
            .header("apikey", &self.inner.anon_key)
            .bearer_auth(bearer)
    }

    /// Sends a request and maps transport and status failures.
    async fn send(&self, builder: reqwest::RequestBuilder) -> BackendResult<reqwest::Response> {
        let request = builder
            .build()
            .map_err(|err| BackendError::parse("Failed to build request", err))?;
        let method = request.method().clone();
        let path = request.url().path().to_string();

        let response = self
            .inner
            .http
            .execute(request)
            .await
            .map_err(|err| BackendError::network(&err))?;

        let status = response.status();
        tracing::debug!(%method, %path, status = status.as_u16(), "backend request");

        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(BackendError::from_status(status.as_u16(), &body));
        }
        Ok(response)
    }

    async fn read_json<T: DeserializeOwned>(
        response: reqwest::Response,
        context: &str,
    ) -> BackendResult<T> {
        let bytes = response
            .bytes()
            .await
            .map_err(|err| BackendError::network(&err))?;
        serde_json::from_slice(&bytes).map_err(|err| BackendError::parse(context, err))
    }
}

#[cfg(test)]
pub(crate) fn test_client(base_url: &str) -> BackendClient {
    BackendClient::new(BackendConfig {
        base_url: base_url.to_string(),
        anon_key: "anon-test-key".to_string(),
        request_timeout: Some(Duration::from_secs(5)),
        auto_refresh: true,
        refresh_margin: Duration::from_secs(60),
        store: SessionStore::in_memory(),
    })
    .unwrap()
}
