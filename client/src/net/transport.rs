//! HTTP transport seam.
//!
//! DESIGN
//! ======
//! `HttpTransport` is the only place bytes leave the process. Everything above
//! it (bearer attachment, refresh, retry, cookie capture) operates on plain
//! `HttpRequest`/`HttpResponse` values, so tests script the backend with an
//! in-process transport instead of a live server.

use reqwest::header::{AUTHORIZATION, COOKIE, SET_COOKIE};
use serde_json::Value;

use crate::config::Timeouts;
use crate::error::ApiError;
use crate::storage::{ACCESS_TOKEN_COOKIE, REFRESH_TOKEN_COOKIE, parse_set_cookie};

/// A fully resolved outgoing request.
#[derive(Debug, Clone)]
pub struct HttpRequest {
    pub method: reqwest::Method,
    /// Path relative to the API base URL (e.g. `/auth/me`).
    pub path: String,
    pub query: Vec<(String, String)>,
    /// Bearer credential for the `Authorization` header.
    pub bearer: Option<String>,
    /// Pre-rendered `Cookie` header value.
    pub cookies: Option<String>,
    pub body: Option<Value>,
}

impl HttpRequest {
    #[must_use]
    pub fn new(method: reqwest::Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), query: Vec::new(), bearer: None, cookies: None, body: None }
    }
}

/// A response with its body already decoded.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    /// JSON body, `Value::Null` when empty, `Value::String` when not JSON.
    pub body: Value,
    /// Raw `Set-Cookie` header values.
    pub set_cookies: Vec<String>,
}

impl HttpResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// Credential cookies (`access_token_cookie`, `refresh_token_cookie`) set by this response.
    pub fn credential_cookies(&self) -> impl Iterator<Item = (String, String)> + '_ {
        self.set_cookies
            .iter()
            .filter_map(|header| parse_set_cookie(header))
            .filter(|(name, _)| name == ACCESS_TOKEN_COOKIE || name == REFRESH_TOKEN_COOKIE)
    }
}

#[async_trait::async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send one request and return whatever status the server answered with.
    ///
    /// # Errors
    ///
    /// Returns `ApiError::Transport` only when no HTTP response was received.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError>;
}

// =============================================================================
// REQWEST TRANSPORT
// =============================================================================

pub struct ReqwestTransport {
    http: reqwest::Client,
    base_url: String,
}

impl ReqwestTransport {
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(base_url: impl Into<String>, timeouts: Timeouts) -> Result<Self, ApiError> {
        let http = reqwest::Client::builder()
            .timeout(timeouts.request)
            .connect_timeout(timeouts.connect)
            .build()
            .map_err(|e| ApiError::Transport(format!("http client build failed: {e}")))?;
        Ok(Self { http, base_url: base_url.into().trim_end_matches('/').to_owned() })
    }
}

#[async_trait::async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse, ApiError> {
        let url = format!("{}{}", self.base_url, request.path);
        let mut builder = self.http.request(request.method, &url);
        if !request.query.is_empty() {
            builder = builder.query(&request.query);
        }
        if let Some(token) = &request.bearer {
            builder = builder.header(AUTHORIZATION, format!("Bearer {token}"));
        }
        if let Some(cookies) = &request.cookies {
            builder = builder.header(COOKIE, cookies);
        }
        if let Some(body) = &request.body {
            builder = builder.json(body);
        }

        let response = builder
            .send()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        let status = response.status().as_u16();
        let set_cookies = response
            .headers()
            .get_all(SET_COOKIE)
            .iter()
            .filter_map(|value| value.to_str().ok())
            .map(ToOwned::to_owned)
            .collect();
        let text = response
            .text()
            .await
            .map_err(|e| ApiError::Transport(e.to_string()))?;

        Ok(HttpResponse { status, body: parse_body(&text), set_cookies })
    }
}

fn parse_body(text: &str) -> Value {
    if text.trim().is_empty() {
        return Value::Null;
    }
    serde_json::from_str(text).unwrap_or_else(|_| Value::String(text.to_owned()))
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
