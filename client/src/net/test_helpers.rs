//! Scripted in-process backend for client, session and service tests.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;
use std::time::Duration;

use base64::Engine as _;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use serde_json::Value;

use crate::error::ApiError;
use crate::net::transport::{HttpRequest, HttpResponse, HttpTransport};

const UNGATED_PATHS: [&str; 3] = ["/auth/refresh", "/auth/login", "/auth/register"];

type Reply = Result<HttpResponse, String>;

/// Replies are keyed `"METHOD /path"`. Queued replies are consumed first,
/// then the sticky reply for the key, then a 404.
#[derive(Default)]
pub struct MockTransport {
    requests: Mutex<Vec<HttpRequest>>,
    queued: Mutex<HashMap<String, VecDeque<Reply>>>,
    sticky: Mutex<HashMap<String, Reply>>,
    delays: Mutex<HashMap<String, Duration>>,
    accepted_token: Mutex<Option<String>>,
}

fn key(method: &str, path: &str) -> String {
    format!("{method} {path}")
}

impl MockTransport {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue one reply for `method path`.
    pub fn push(&self, method: &str, path: &str, status: u16, body: Value) {
        self.push_response(method, path, json(status, body));
    }

    pub fn push_response(&self, method: &str, path: &str, response: HttpResponse) {
        self.queued.lock().unwrap().entry(key(method, path)).or_default().push_back(Ok(response));
    }

    /// Queue a transport-level failure (no HTTP response).
    pub fn push_failure(&self, method: &str, path: &str, message: &str) {
        self.queued
            .lock()
            .unwrap()
            .entry(key(method, path))
            .or_default()
            .push_back(Err(message.to_owned()));
    }

    /// Reply used whenever the queue for `method path` is empty.
    pub fn always(&self, method: &str, path: &str, status: u16, body: Value) {
        self.sticky.lock().unwrap().insert(key(method, path), Ok(json(status, body)));
    }

    pub fn delay(&self, method: &str, path: &str, delay: Duration) {
        self.delays.lock().unwrap().insert(key(method, path), delay);
    }

    /// Answer 401 to gated paths unless the bearer equals `token`.
    pub fn accept_only(&self, token: &str) {
        *self.accepted_token.lock().unwrap() = Some(token.to_owned());
    }

    pub fn requests(&self) -> Vec<HttpRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, method: &str, path: &str) -> Vec<HttpRequest> {
        self.requests()
            .into_iter()
            .filter(|r| r.method.as_str() == method && r.path == path)
            .collect()
    }

    pub fn count(&self, method: &str, path: &str) -> usize {
        self.requests_to(method, path).len()
    }
}

#[async_trait::async_trait]
impl HttpTransport for MockTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let key = key(request.method.as_str(), &request.path);
        self.requests.lock().unwrap().push(request.clone());

        let delay = self.delays.lock().unwrap().get(&key).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let gate = self.accepted_token.lock().unwrap().clone();
        if let Some(accepted) = gate {
            if !UNGATED_PATHS.contains(&request.path.as_str()) && request.bearer.as_deref() != Some(accepted.as_str()) {
                return Ok(json(401, serde_json::json!({ "message": "Token has expired" })));
            }
        }

        let queued = self.queued.lock().unwrap().get_mut(&key).and_then(VecDeque::pop_front);
        let reply = queued
            .or_else(|| self.sticky.lock().unwrap().get(&key).cloned())
            .unwrap_or_else(|| Ok(json(404, serde_json::json!({ "message": format!("no mock reply for {key}") }))));
        reply.map_err(ApiError::Transport)
    }
}

pub fn json(status: u16, body: Value) -> HttpResponse {
    HttpResponse { status, body, set_cookies: Vec::new() }
}

pub fn with_cookies(status: u16, body: Value, cookies: &[&str]) -> HttpResponse {
    HttpResponse { status, body, set_cookies: cookies.iter().map(|c| (*c).to_owned()).collect() }
}

// =============================================================================
// tokens
// =============================================================================

pub fn token_expiring_at(exp: i64, label: &str) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let body = URL_SAFE_NO_PAD.encode(serde_json::json!({ "sub": label, "exp": exp }).to_string());
    format!("{header}.{body}.sig")
}

pub fn expired_token() -> String {
    token_expiring_at(crate::jwt::now_secs() - 3600, "expired")
}

pub fn valid_token(label: &str) -> String {
    token_expiring_at(crate::jwt::now_secs() + 3600, label)
}
