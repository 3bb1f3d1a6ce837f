use super::*;
use crate::config::ClientConfig;

#[test]
fn parse_body_handles_empty_json_and_text() {
    assert_eq!(parse_body(""), Value::Null);
    assert_eq!(parse_body("  \n"), Value::Null);
    assert_eq!(parse_body(r#"{"ok":true}"#), serde_json::json!({ "ok": true }));
    assert_eq!(parse_body("Bad Gateway"), Value::String("Bad Gateway".into()));
}

#[test]
fn credential_cookies_filters_unrelated_cookies() {
    let response = HttpResponse {
        status: 200,
        body: Value::Null,
        set_cookies: vec![
            "access_token_cookie=a1; Path=/; HttpOnly".into(),
            "tracking=xyz; Path=/".into(),
            "refresh_token_cookie=r1; Path=/auth".into(),
        ],
    };
    let cookies: Vec<_> = response.credential_cookies().collect();
    assert_eq!(
        cookies,
        vec![
            ("access_token_cookie".to_owned(), "a1".to_owned()),
            ("refresh_token_cookie".to_owned(), "r1".to_owned()),
        ]
    );
}

#[test]
fn success_range_is_2xx() {
    let mut response = HttpResponse { status: 204, body: Value::Null, set_cookies: Vec::new() };
    assert!(response.is_success());
    response.status = 301;
    assert!(!response.is_success());
    response.status = 199;
    assert!(!response.is_success());
}

#[test]
fn reqwest_transport_trims_base_url() {
    let cfg = ClientConfig::default();
    let transport = ReqwestTransport::new("http://localhost:5000/", cfg.timeouts).unwrap();
    assert_eq!(transport.base_url, "http://localhost:5000");
}

#[tokio::test]
async fn reqwest_transport_reports_connection_failure() {
    let cfg = ClientConfig::default();
    let transport = ReqwestTransport::new("http://127.0.0.1:1", cfg.timeouts).unwrap();
    let err = transport.send(HttpRequest::new(reqwest::Method::GET, "/auth/me")).await.unwrap_err();
    assert!(matches!(err, ApiError::Transport(_)));
}
