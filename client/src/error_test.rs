use super::*;
use serde_json::json;

// =============================================================================
// from_status
// =============================================================================

#[test]
fn from_status_maps_auth_classes() {
    let body = json!({ "message": "Invalid credentials" });
    assert!(matches!(ApiError::from_status(401, &body), ApiError::Unauthorized(m) if m == "Invalid credentials"));
    assert!(matches!(ApiError::from_status(403, &body), ApiError::Forbidden(_)));
}

#[test]
fn from_status_maps_server_faults() {
    let err = ApiError::from_status(502, &json!({ "error": "Internal server error" }));
    assert!(matches!(err, ApiError::Server { status: 502, ref message } if message == "Internal server error"));
    assert!(err.retryable());
}

#[test]
fn from_status_without_message_uses_status_text() {
    let err = ApiError::from_status(404, &serde_json::Value::Null);
    assert!(matches!(err, ApiError::Status { status: 404, ref message } if message == "HTTP 404"));
    assert!(!err.retryable());
}

// =============================================================================
// classification
// =============================================================================

#[test]
fn only_session_expired_is_fatal() {
    assert!(ApiError::SessionExpired("max retries".into()).is_session_fatal());
    assert!(!ApiError::RefreshFailed("boom".into()).is_session_fatal());
    assert!(!ApiError::Unauthorized("no".into()).is_session_fatal());
}

#[test]
fn unauthenticated_covers_missing_credentials() {
    assert!(ApiError::NoRefreshToken.is_unauthenticated());
    assert!(ApiError::Unauthorized("x".into()).is_unauthenticated());
    assert!(!ApiError::Forbidden("x".into()).is_unauthenticated());
}

#[test]
fn error_codes_are_stable() {
    assert_eq!(ApiError::QueueTimeout.error_code(), "E_QUEUE_TIMEOUT");
    assert_eq!(ApiError::Cancelled.error_code(), "E_CANCELLED");
    assert_eq!(ApiError::Decode("x".into()).error_code(), "E_DECODE");
}

#[test]
fn queue_timeout_message_matches_ui_text() {
    assert_eq!(ApiError::QueueTimeout.to_string(), "request timeout during token refresh");
}

#[test]
fn backend_message_ignores_status_fallback() {
    let with_text = ApiError::from_status(401, &json!({ "message": "User not found" }));
    assert_eq!(with_text.backend_message(), Some("User not found"));
    assert_eq!(ApiError::from_status(400, &json!({})).backend_message(), None);
    assert_eq!(ApiError::Transport("refused".into()).backend_message(), None);
}
