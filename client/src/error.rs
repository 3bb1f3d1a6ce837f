//! Client error taxonomy.
//!
//! DESIGN
//! ======
//! One enum covers every failure a caller of the REST layer can observe:
//! transport faults, HTTP status classes, response shape mismatches, and the
//! session outcomes of the refresh flow. `error_code` / `retryable` follow the
//! same contract the UI uses to decide between an inline message and a forced
//! navigation.

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;

use crate::storage::StorageError;

/// Errors produced by API client and session operations.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request never produced an HTTP response (DNS, connect, timeout).
    #[error("request failed: {0}")]
    Transport(String),

    /// The server rejected credentials even after one refresh-and-retry.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// The server refused access to the resource.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The server failed with a 5xx status.
    #[error("server error: status {status}: {message}")]
    Server { status: u16, message: String },

    /// Any other non-success status.
    #[error("request rejected: status {status}: {message}")]
    Status { status: u16, message: String },

    /// The response body did not match the expected shape.
    #[error("unexpected response: {0}")]
    Decode(String),

    /// A session request needed a refresh but no refresh token is stored.
    #[error("no refresh token available")]
    NoRefreshToken,

    /// The refresh call failed; the session survives until the retry ceiling.
    #[error("token refresh failed: {0}")]
    RefreshFailed(String),

    /// Refresh failures reached the ceiling; credentials were cleared.
    #[error("session expired: {0}")]
    SessionExpired(String),

    /// A queued request waited too long for the in-flight refresh.
    #[error("request timeout during token refresh")]
    QueueTimeout,

    /// The caller cancelled the operation.
    #[error("request cancelled")]
    Cancelled,

    /// Reading or writing persisted client state failed.
    #[error("storage error: {0}")]
    Storage(#[from] StorageError),
}

impl ApiError {
    /// Stable machine-readable code for this error.
    #[must_use]
    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Transport(_) => "E_TRANSPORT",
            Self::Unauthorized(_) => "E_UNAUTHORIZED",
            Self::Forbidden(_) => "E_FORBIDDEN",
            Self::Server { .. } => "E_SERVER",
            Self::Status { .. } => "E_STATUS",
            Self::Decode(_) => "E_DECODE",
            Self::NoRefreshToken => "E_NO_REFRESH_TOKEN",
            Self::RefreshFailed(_) => "E_REFRESH_FAILED",
            Self::SessionExpired(_) => "E_SESSION_EXPIRED",
            Self::QueueTimeout => "E_QUEUE_TIMEOUT",
            Self::Cancelled => "E_CANCELLED",
            Self::Storage(_) => "E_STORAGE",
        }
    }

    /// Whether retrying the same call later could succeed.
    #[must_use]
    pub fn retryable(&self) -> bool {
        matches!(
            self,
            Self::Transport(_) | Self::Server { .. } | Self::RefreshFailed(_) | Self::QueueTimeout
        )
    }

    /// Whether the error ends the session and forces a login.
    #[must_use]
    pub fn is_session_fatal(&self) -> bool {
        matches!(self, Self::SessionExpired(_))
    }

    /// Whether the error means the caller is not authenticated.
    #[must_use]
    pub fn is_unauthenticated(&self) -> bool {
        matches!(self, Self::Unauthorized(_) | Self::NoRefreshToken | Self::SessionExpired(_))
    }

    /// Message supplied by the backend, if this status failure carried one.
    #[must_use]
    pub fn backend_message(&self) -> Option<&str> {
        let (status, message) = match self {
            Self::Unauthorized(message) => (401, message),
            Self::Forbidden(message) => (403, message),
            Self::Server { status, message } | Self::Status { status, message } => (*status, message),
            _ => return None,
        };
        (*message != status_fallback(status)).then_some(message.as_str())
    }

    /// Map a non-success HTTP status and body to the matching variant.
    #[must_use]
    pub fn from_status(status: u16, body: &serde_json::Value) -> Self {
        let message = server_message(body).unwrap_or_else(|| status_fallback(status));
        match status {
            401 => Self::Unauthorized(message),
            403 => Self::Forbidden(message),
            500..=599 => Self::Server { status, message },
            _ => Self::Status { status, message },
        }
    }
}

/// Extract the backend's human-readable message (`message` or `error`).
#[must_use]
pub fn server_message(body: &serde_json::Value) -> Option<String> {
    ["message", "error"]
        .iter()
        .find_map(|key| body.get(key).and_then(serde_json::Value::as_str))
        .map(ToOwned::to_owned)
}

fn status_fallback(status: u16) -> String {
    format!("HTTP {status}")
}
