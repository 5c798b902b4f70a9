use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Categories of backend errors for consistent error handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendErrorKind {
    /// HTTP status error (4xx, 5xx) that is not an auth rejection
    Http,
    /// The backend rejected the credentials or token (401, 403)
    Auth,
    /// Connection failure or request timeout
    Network,
    /// Failed to parse a response body
    Parse,
    /// The operation requires a signed-in user and there is none
    NotAuthenticated,
}

impl fmt::Display for BackendErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendErrorKind::Http => write!(f, "http"),
            BackendErrorKind::Auth => write!(f, "auth"),
            BackendErrorKind::Network => write!(f, "network"),
            BackendErrorKind::Parse => write!(f, "parse"),
            BackendErrorKind::NotAuthenticated => write!(f, "not_authenticated"),
        }
    }
}

/// Structured error returned by every backend call.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BackendError {
    pub kind: BackendErrorKind,
    /// One-line summary suitable for a user-facing notice
    pub message: String,
    /// HTTP status, when the error came from a response
    pub status: Option<u16>,
    /// Machine-readable code from the auth service (`error_code` or `error`)
    #[serde(default)]
    pub code: Option<String>,
}

impl BackendError {
    pub fn new(kind: BackendErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status: None,
            code: None,
        }
    }

    /// Builds an error from a non-success response.
    ///
    /// Auth, table and storage services use different error bodies; the first
    /// human-readable field found wins.
    pub fn from_status(status: u16, body: &str) -> Self {
        let kind = match status {
            401 | 403 => BackendErrorKind::Auth,
            _ => BackendErrorKind::Http,
        };
        let json = serde_json::from_str::<Value>(body).ok();
        let message = json
            .as_ref()
            .and_then(extract_message)
            .unwrap_or_else(|| format!("HTTP {status}"));
        let code = json.as_ref().and_then(extract_code);
        Self {
            kind,
            message,
            status: Some(status),
            code,
        }
    }

    pub fn network(err: &reqwest::Error) -> Self {
        let message = if err.is_timeout() {
            "Request timed out".to_string()
        } else if err.is_connect() {
            "Could not connect to the backend".to_string()
        } else {
            format!("Request failed: {err}")
        };
        Self::new(BackendErrorKind::Network, message)
    }

    pub fn parse(context: &str, err: impl fmt::Display) -> Self {
        Self::new(BackendErrorKind::Parse, format!("{context}: {err}"))
    }

    pub fn not_authenticated() -> Self {
        Self::new(BackendErrorKind::NotAuthenticated, "Not signed in")
    }

    /// True when the backend refused the session's access token.
    pub fn is_session_rejected(&self) -> bool {
        self.kind == BackendErrorKind::Auth
    }

    /// True when a refresh failed because the refresh token is no longer
    /// valid, as opposed to the backend being unreachable or misconfigured.
    pub fn is_refresh_rejected(&self) -> bool {
        self.is_session_rejected()
            || (self.status == Some(400)
                && self
                    .code
                    .as_deref()
                    .is_some_and(|code| REVOKED_REFRESH_CODES.contains(&code)))
    }
}

/// Auth-service codes meaning the refresh token is dead.
const REVOKED_REFRESH_CODES: &[&str] = &[
    "invalid_grant",
    "refresh_token_not_found",
    "refresh_token_already_used",
    "session_not_found",
    "session_expired",
];

fn extract_code(json: &Value) -> Option<String> {
    ["error_code", "error"]
        .iter()
        .find_map(|key| json.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

fn extract_message(json: &Value) -> Option<String> {
    ["error_description", "msg", "message", "error"]
        .iter()
        .find_map(|key| json.get(*key).and_then(Value::as_str))
        .map(str::to_string)
        .filter(|msg| !msg.trim().is_empty())
}

impl fmt::Display for BackendError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for BackendError {}

/// Result type for backend operations.
pub type BackendResult<T> = std::result::Result<T, BackendError>;
