//! Authenticated REST client.
//!
//! REQUEST PATH
//! ============
//! 1. Resolve the bearer: none for anonymous calls or while the current route
//!    is public, otherwise [`SessionManager::valid_token`] (which joins or
//!    starts the single in-flight refresh).
//! 2. Dispatch with the cookie jar attached; capture credential cookies.
//! 3. On a 401 for a session call, refresh past the rejected token and retry
//!    exactly once. A second 401 surfaces as `Unauthorized`.
//!
//! Every call races a caller-supplied [`CancellationToken`]. Cancelling drops
//! only the caller's future; a refresh others are waiting on keeps running.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use reqwest::Method;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio_util::sync::CancellationToken;

use crate::config::ClientConfig;
use crate::error::ApiError;
use crate::net::transport::{HttpRequest, HttpResponse, HttpTransport, ReqwestTransport};
use crate::session::{SessionManager, absorb_cookies};
use crate::storage::ClientStorage;

/// How a request authenticates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    /// Bearer from the session, refreshed as needed, retried once on 401.
    Session,
    /// No bearer and no refresh (login, register).
    Anonymous,
}

/// A request as callers describe it, before credentials are attached.
#[derive(Debug, Clone)]
pub struct ApiRequest {
    pub method: Method,
    pub path: String,
    pub query: Vec<(String, String)>,
    pub body: Option<Value>,
    pub auth: AuthMode,
}

impl ApiRequest {
    #[must_use]
    pub fn new(method: Method, path: impl Into<String>) -> Self {
        Self { method, path: path.into(), query: Vec::new(), body: None, auth: AuthMode::Session }
    }

    #[must_use]
    pub fn get(path: impl Into<String>) -> Self {
        Self::new(Method::GET, path)
    }

    #[must_use]
    pub fn post(path: impl Into<String>) -> Self {
        Self::new(Method::POST, path)
    }

    #[must_use]
    pub fn put(path: impl Into<String>) -> Self {
        Self::new(Method::PUT, path)
    }

    #[must_use]
    pub fn delete(path: impl Into<String>) -> Self {
        Self::new(Method::DELETE, path)
    }

    #[must_use]
    pub fn json(mut self, body: Value) -> Self {
        self.body = Some(body);
        self
    }

    #[must_use]
    pub fn query(mut self, key: &str, value: &str) -> Self {
        self.query.push((key.to_owned(), value.to_owned()));
        self
    }

    #[must_use]
    pub fn anonymous(mut self) -> Self {
        self.auth = AuthMode::Anonymous;
        self
    }
}

/// REST client sharing one session across clones.
#[derive(Clone)]
pub struct ApiClient {
    transport: Arc<dyn HttpTransport>,
    session: SessionManager,
    public_route: Arc<AtomicBool>,
}

impl ApiClient {
    /// Build a client that talks HTTP to `config.base_url`.
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn from_config(config: &ClientConfig, storage: ClientStorage) -> Result<Self, ApiError> {
        let transport = Arc::new(ReqwestTransport::new(config.base_url.clone(), config.timeouts)?);
        Ok(Self::with_transport(transport, storage, config))
    }

    #[must_use]
    pub fn with_transport(transport: Arc<dyn HttpTransport>, storage: ClientStorage, config: &ClientConfig) -> Self {
        let session = SessionManager::new(storage, Arc::clone(&transport), config);
        Self { transport, session, public_route: Arc::new(AtomicBool::new(false)) }
    }

    #[must_use]
    pub fn session(&self) -> &SessionManager {
        &self.session
    }

    #[must_use]
    pub fn storage(&self) -> &ClientStorage {
        self.session.storage()
    }

    /// Mark the current route as public; session requests then go out without a bearer.
    pub fn set_public_route(&self, public: bool) {
        self.public_route.store(public, Ordering::SeqCst);
    }

    #[must_use]
    pub fn is_public_route(&self) -> bool {
        self.public_route.load(Ordering::SeqCst)
    }

    /// Send `request` and return the decoded JSON body.
    ///
    /// # Errors
    ///
    /// Returns `Cancelled` if `cancel` fires first, the refresh outcome if no
    /// valid token could be obtained, or the status mapping of a non-success
    /// response.
    pub async fn send(&self, request: ApiRequest, cancel: &CancellationToken) -> Result<Value, ApiError> {
        tokio::select! {
            biased;
            () = cancel.cancelled() => {
                tracing::debug!(path = %request.path, "request cancelled");
                Err(ApiError::Cancelled)
            }
            result = self.execute(&request) => result,
        }
    }

    /// [`ApiClient::send`] followed by typed decoding of the body.
    ///
    /// # Errors
    ///
    /// Same as [`ApiClient::send`], plus `Decode` when the body does not match `T`.
    pub async fn send_json<T: DeserializeOwned>(
        &self,
        request: ApiRequest,
        cancel: &CancellationToken,
    ) -> Result<T, ApiError> {
        let body = self.send(request, cancel).await?;
        serde_json::from_value(body).map_err(|e| ApiError::Decode(e.to_string()))
    }

    /// # Errors
    ///
    /// Same as [`ApiClient::send`].
    pub async fn get(&self, path: &str, cancel: &CancellationToken) -> Result<Value, ApiError> {
        self.send(ApiRequest::get(path), cancel).await
    }

    /// # Errors
    ///
    /// Same as [`ApiClient::send`], plus `Decode` if `body` cannot be serialized.
    pub async fn post<B: Serialize>(&self, path: &str, body: &B, cancel: &CancellationToken) -> Result<Value, ApiError> {
        self.send(ApiRequest::post(path).json(to_value(body)?), cancel).await
    }

    /// # Errors
    ///
    /// Same as [`ApiClient::post`].
    pub async fn put<B: Serialize>(&self, path: &str, body: &B, cancel: &CancellationToken) -> Result<Value, ApiError> {
        self.send(ApiRequest::put(path).json(to_value(body)?), cancel).await
    }

    /// # Errors
    ///
    /// Same as [`ApiClient::send`].
    pub async fn delete(&self, path: &str, cancel: &CancellationToken) -> Result<Value, ApiError> {
        self.send(ApiRequest::delete(path), cancel).await
    }

    async fn execute(&self, request: &ApiRequest) -> Result<Value, ApiError> {
        let session_auth = request.auth == AuthMode::Session && !self.is_public_route();
        let bearer = if session_auth { Some(self.session.valid_token().await?) } else { None };

        let response = self.dispatch(request, bearer.clone()).await?;
        if response.status != 401 || !session_auth {
            return finish(request, response);
        }

        tracing::warn!(path = %request.path, "authentication failed, refreshing and retrying once");
        let token = self.session.refresh_after_unauthorized(bearer.as_deref()).await?;
        let retried = self.dispatch(request, Some(token)).await?;
        finish(request, retried)
    }

    async fn dispatch(&self, request: &ApiRequest, bearer: Option<String>) -> Result<HttpResponse, ApiError> {
        let storage = self.session.storage();
        let outgoing = HttpRequest {
            method: request.method.clone(),
            path: request.path.clone(),
            query: request.query.clone(),
            bearer,
            cookies: storage.cookie_header(),
            body: request.body.clone(),
        };
        let response = self.transport.send(outgoing).await?;
        absorb_cookies(storage, &response);
        Ok(response)
    }
}

fn finish(request: &ApiRequest, response: HttpResponse) -> Result<Value, ApiError> {
    if response.is_success() {
        return Ok(response.body);
    }
    let err = ApiError::from_status(response.status, &response.body);
    match &err {
        ApiError::Unauthorized(_) => tracing::warn!(path = %request.path, "authentication failed for request"),
        ApiError::Forbidden(_) => tracing::warn!(path = %request.path, "access forbidden"),
        ApiError::Server { status, .. } => tracing::error!(path = %request.path, status, "server error"),
        _ => tracing::debug!(path = %request.path, status = response.status, "request rejected"),
    }
    Err(err)
}

fn to_value<B: Serialize>(body: &B) -> Result<Value, ApiError> {
    serde_json::to_value(body).map_err(|e| ApiError::Decode(format!("request body not serializable: {e}")))
}

#[cfg(test)]
#[path = "client_test.rs"]
mod tests;
