use super::*;
use crate::net::test_helpers::{MockTransport, expired_token, valid_token, with_cookies};
use crate::session::{REFRESH_PATH, SessionEvent};
use crate::storage::ACCESS_TOKEN_COOKIE;
use serde_json::json;
use std::time::Duration;

const DATA: &str = "/api/reports/templates";

fn client_with(mock: &Arc<MockTransport>) -> ApiClient {
    let transport: Arc<dyn HttpTransport> = mock.clone();
    ApiClient::with_transport(transport, ClientStorage::in_memory(), &ClientConfig::default())
}

// =============================================================================
// bearer attachment
// =============================================================================

#[tokio::test]
async fn session_request_carries_stored_token() {
    let mock = Arc::new(MockTransport::new());
    mock.always("GET", DATA, 200, json!([]));
    let client = client_with(&mock);
    let token = valid_token("t");
    client.session().store_login_tokens(&token, Some("r")).unwrap();

    client.get(DATA, &CancellationToken::new()).await.unwrap();

    let sent = mock.requests_to("GET", DATA);
    assert_eq!(sent[0].bearer.as_deref(), Some(token.as_str()));
}

#[tokio::test]
async fn public_route_strips_bearer_and_skips_refresh() {
    let mock = Arc::new(MockTransport::new());
    mock.always("GET", DATA, 200, json!([]));
    let client = client_with(&mock);
    client.session().store_login_tokens(&expired_token(), Some("r")).unwrap();
    client.set_public_route(true);

    client.get(DATA, &CancellationToken::new()).await.unwrap();

    assert!(mock.requests_to("GET", DATA)[0].bearer.is_none());
    assert_eq!(mock.count("POST", REFRESH_PATH), 0);
}

#[tokio::test]
async fn anonymous_request_never_carries_bearer() {
    let mock = Arc::new(MockTransport::new());
    mock.always("POST", "/auth/login", 200, json!({}));
    let client = client_with(&mock);
    client.session().store_login_tokens(&valid_token("t"), Some("r")).unwrap();

    client
        .send(ApiRequest::post("/auth/login").json(json!({})).anonymous(), &CancellationToken::new())
        .await
        .unwrap();

    assert!(mock.requests_to("POST", "/auth/login")[0].bearer.is_none());
}

#[tokio::test]
async fn missing_refresh_token_fails_before_dispatch() {
    let mock = Arc::new(MockTransport::new());
    let client = client_with(&mock);

    let err = client.get(DATA, &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, ApiError::NoRefreshToken));
    assert!(mock.requests().is_empty());
}

// =============================================================================
// single-flight refresh
// =============================================================================

#[tokio::test(start_paused = true)]
async fn concurrent_requests_with_expired_token_share_one_refresh() {
    let mock = Arc::new(MockTransport::new());
    let fresh = valid_token("fresh");
    mock.push("POST", REFRESH_PATH, 200, json!({ "access_token": fresh }));
    mock.delay("POST", REFRESH_PATH, Duration::from_millis(300));
    mock.accept_only(&fresh);
    mock.always("GET", DATA, 200, json!({ "ok": true }));
    let client = client_with(&mock);
    client.session().store_login_tokens(&expired_token(), Some("r")).unwrap();

    let cancel = CancellationToken::new();
    let results = futures::future::join_all((0..8).map(|_| client.get(DATA, &cancel))).await;

    assert!(results.iter().all(Result::is_ok));
    assert_eq!(mock.count("POST", REFRESH_PATH), 1);
    let sent = mock.requests_to("GET", DATA);
    assert_eq!(sent.len(), 8);
    assert!(sent.iter().all(|r| r.bearer.as_deref() == Some(fresh.as_str())));
}

#[tokio::test]
async fn concurrent_requests_fail_together_when_refresh_fails() {
    let mock = Arc::new(MockTransport::new());
    mock.push("POST", REFRESH_PATH, 500, json!({ "message": "down" }));
    let client = client_with(&mock);
    client.session().store_login_tokens(&expired_token(), Some("r")).unwrap();

    let cancel = CancellationToken::new();
    let results = futures::future::join_all((0..4).map(|_| client.get(DATA, &cancel))).await;

    assert_eq!(mock.count("POST", REFRESH_PATH), 1);
    assert_eq!(mock.count("GET", DATA), 0);
    assert!(results.iter().all(|r| matches!(r, Err(ApiError::RefreshFailed(_)))));
}

#[tokio::test]
async fn refresh_exhaustion_expires_session_once() {
    let mock = Arc::new(MockTransport::new());
    mock.always("POST", REFRESH_PATH, 401, json!({ "message": "invalid refresh token" }));
    let client = client_with(&mock);
    client.session().store_login_tokens(&expired_token(), Some("r")).unwrap();
    let cancel = CancellationToken::new();

    assert!(matches!(client.get(DATA, &cancel).await, Err(ApiError::RefreshFailed(_))));
    let err = client.get(DATA, &cancel).await.unwrap_err();

    assert!(err.is_session_fatal());
    assert!(client.storage().access_token().is_none());
    assert!(client.storage().refresh_token().is_none());
    let events = client.session().drain_events();
    assert_eq!(events.len(), 1);
    assert!(matches!(events[0], SessionEvent::Expired { .. }));
}

// =============================================================================
// 401 retry
// =============================================================================

#[tokio::test]
async fn unauthorized_response_refreshes_and_retries_once() {
    let mock = Arc::new(MockTransport::new());
    let revoked = valid_token("revoked");
    let fresh = valid_token("fresh");
    mock.push("POST", REFRESH_PATH, 200, json!({ "access_token": fresh }));
    mock.accept_only(&fresh);
    mock.always("GET", DATA, 200, json!({ "templates": [] }));
    let client = client_with(&mock);
    client.session().store_login_tokens(&revoked, Some("r")).unwrap();

    let body = client.get(DATA, &CancellationToken::new()).await.unwrap();

    assert_eq!(body, json!({ "templates": [] }));
    let sent = mock.requests_to("GET", DATA);
    assert_eq!(sent.len(), 2);
    assert_eq!(sent[0].bearer.as_deref(), Some(revoked.as_str()));
    assert_eq!(sent[1].bearer.as_deref(), Some(fresh.as_str()));
    assert_eq!(mock.count("POST", REFRESH_PATH), 1);
}

#[tokio::test]
async fn second_unauthorized_is_not_retried_again() {
    let mock = Arc::new(MockTransport::new());
    mock.push("POST", REFRESH_PATH, 200, json!({ "access_token": valid_token("fresh") }));
    mock.always("GET", DATA, 401, json!({ "message": "Token has been revoked" }));
    let client = client_with(&mock);
    client.session().store_login_tokens(&valid_token("old"), Some("r")).unwrap();

    let err = client.get(DATA, &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, ApiError::Unauthorized(ref m) if m == "Token has been revoked"));
    assert_eq!(mock.count("GET", DATA), 2);
    assert_eq!(mock.count("POST", REFRESH_PATH), 1);
}

#[tokio::test]
async fn unauthorized_on_public_route_is_returned_directly() {
    let mock = Arc::new(MockTransport::new());
    mock.always("GET", DATA, 401, json!({}));
    let client = client_with(&mock);
    client.set_public_route(true);

    let err = client.get(DATA, &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, ApiError::Unauthorized(_)));
    assert_eq!(mock.count("GET", DATA), 1);
    assert_eq!(mock.count("POST", REFRESH_PATH), 0);
}

// =============================================================================
// status mapping
// =============================================================================

#[tokio::test]
async fn forbidden_is_not_retried() {
    let mock = Arc::new(MockTransport::new());
    mock.always("DELETE", "/api/reports/templates/7", 403, json!({ "error": "not your template" }));
    let client = client_with(&mock);
    client.session().store_login_tokens(&valid_token("t"), Some("r")).unwrap();

    let err = client.delete("/api/reports/templates/7", &CancellationToken::new()).await.unwrap_err();

    assert!(matches!(err, ApiError::Forbidden(ref m) if m == "not your template"));
    assert!(!err.retryable());
    assert_eq!(mock.count("DELETE", "/api/reports/templates/7"), 1);
}

#[tokio::test]
async fn server_error_maps_to_retryable_server_variant() {
    let mock = Arc::new(MockTransport::new());
    mock.always("POST", "/reports/generate", 502, json!(null));
    let client = client_with(&mock);
    client.session().store_login_tokens(&valid_token("t"), Some("r")).unwrap();

    let err = client
        .post("/reports/generate", &json!({ "students": [] }), &CancellationToken::new())
        .await
        .unwrap_err();

    assert!(matches!(err, ApiError::Server { status: 502, .. }));
    assert!(err.retryable());
}

#[tokio::test]
async fn transport_failure_surfaces_as_transport_error() {
    let mock = Arc::new(MockTransport::new());
    mock.push_failure("GET", DATA, "connection refused");
    let client = client_with(&mock);
    client.session().store_login_tokens(&valid_token("t"), Some("r")).unwrap();

    let err = client.get(DATA, &CancellationToken::new()).await.unwrap_err();
    assert!(matches!(err, ApiError::Transport(ref m) if m == "connection refused"));
}

#[tokio::test]
async fn send_json_reports_shape_mismatch_as_decode() {
    let mock = Arc::new(MockTransport::new());
    mock.always("GET", DATA, 200, json!({ "unexpected": true }));
    let client = client_with(&mock);
    client.session().store_login_tokens(&valid_token("t"), Some("r")).unwrap();

    let result: Result<Vec<String>, _> = client.send_json(ApiRequest::get(DATA), &CancellationToken::new()).await;
    assert!(matches!(result, Err(ApiError::Decode(_))));
}

// =============================================================================
// cookies
// =============================================================================

#[tokio::test]
async fn credential_cookies_are_captured_and_replayed() {
    let mock = Arc::new(MockTransport::new());
    mock.push_response(
        "POST",
        "/auth/login",
        with_cookies(200, json!({}), &["access_token_cookie=jar-token; Path=/; HttpOnly"]),
    );
    mock.always("GET", DATA, 200, json!([]));
    let client = client_with(&mock);
    let cancel = CancellationToken::new();

    client.send(ApiRequest::post("/auth/login").anonymous(), &cancel).await.unwrap();
    assert_eq!(client.storage().cookies().get(ACCESS_TOKEN_COOKIE).as_deref(), Some("jar-token"));

    client.set_public_route(true);
    client.get(DATA, &cancel).await.unwrap();
    assert_eq!(mock.requests_to("GET", DATA)[0].cookies.as_deref(), Some("access_token_cookie=jar-token"));
}

#[tokio::test]
async fn query_parameters_are_forwarded() {
    let mock = Arc::new(MockTransport::new());
    mock.always("GET", DATA, 200, json!([]));
    let client = client_with(&mock);
    client.session().store_login_tokens(&valid_token("t"), Some("r")).unwrap();

    client
        .send(ApiRequest::get(DATA).query("schoolLevel", "High School"), &CancellationToken::new())
        .await
        .unwrap();

    assert_eq!(
        mock.requests_to("GET", DATA)[0].query,
        vec![("schoolLevel".to_owned(), "High School".to_owned())]
    );
}

// =============================================================================
// cancellation
// =============================================================================

#[tokio::test]
async fn cancelled_before_send_dispatches_nothing() {
    let mock = Arc::new(MockTransport::new());
    let client = client_with(&mock);
    client.session().store_login_tokens(&valid_token("t"), Some("r")).unwrap();
    let cancel = CancellationToken::new();
    cancel.cancel();

    assert!(matches!(client.get(DATA, &cancel).await, Err(ApiError::Cancelled)));
    assert!(mock.requests().is_empty());
}

#[tokio::test(start_paused = true)]
async fn cancelling_one_caller_does_not_abort_shared_refresh() {
    let mock = Arc::new(MockTransport::new());
    let fresh = valid_token("fresh");
    mock.push("POST", REFRESH_PATH, 200, json!({ "access_token": fresh }));
    mock.delay("POST", REFRESH_PATH, Duration::from_secs(1));
    mock.always("GET", DATA, 200, json!([]));
    let client = client_with(&mock);
    client.session().store_login_tokens(&expired_token(), Some("r")).unwrap();

    let doomed = CancellationToken::new();
    let kept = CancellationToken::new();
    let canceller = {
        let doomed = doomed.clone();
        async move {
            tokio::time::sleep(Duration::from_millis(100)).await;
            doomed.cancel();
        }
    };

    let (first, second, ()) = tokio::join!(client.get(DATA, &doomed), client.get(DATA, &kept), canceller);

    assert!(matches!(first, Err(ApiError::Cancelled)));
    assert!(second.is_ok());
    assert_eq!(mock.count("POST", REFRESH_PATH), 1);
    assert_eq!(mock.requests_to("GET", DATA)[0].bearer.as_deref(), Some(fresh.as_str()));
}
