//! Session manager: token validity and single-flight refresh.
//!
//! ARCHITECTURE
//! ============
//! Every caller that needs a fresh access token goes through
//! [`SessionManager::refresh`]. The first caller flips `in_flight` and spawns
//! one refresh task; everyone arriving while it runs is parked in `pending`
//! as a oneshot sender. When the task settles, the whole queue observes the
//! same outcome: the same new token, or the same failure.
//!
//! The refresh runs as a spawned task rather than inside the first caller's
//! future, so a caller cancelling its own request cannot strand the queue.
//!
//! FAILURE POLICY
//! ==============
//! Each failed refresh bumps `failures`. Below the ceiling the queue is
//! rejected with `RefreshFailed` and the session survives. Reaching the
//! ceiling clears tokens and cookies, records exactly one
//! [`SessionEvent::Expired`], and rejects the queue with `SessionExpired`.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;

use serde::Deserialize;
use tokio::sync::oneshot;

use crate::config::ClientConfig;
use crate::error::{ApiError, server_message};
use crate::jwt;
use crate::net::transport::{HttpRequest, HttpResponse, HttpTransport};
use crate::storage::ClientStorage;

pub const REFRESH_PATH: &str = "/auth/refresh";

/// Session-level events the UI layer must react to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// Refresh failures reached the ceiling; credentials are gone.
    Expired { reason: String },
}

#[derive(Debug, Clone)]
enum RefreshFailure {
    Failed(String),
    Exhausted(String),
}

impl From<RefreshFailure> for ApiError {
    fn from(failure: RefreshFailure) -> Self {
        match failure {
            RefreshFailure::Failed(reason) => Self::RefreshFailed(reason),
            RefreshFailure::Exhausted(reason) => Self::SessionExpired(reason),
        }
    }
}

type Waiter = oneshot::Sender<Result<String, RefreshFailure>>;

#[derive(Default)]
struct RefreshState {
    in_flight: bool,
    pending: Vec<Waiter>,
    failures: u32,
    events: VecDeque<SessionEvent>,
}

#[derive(Debug, Deserialize)]
struct RefreshResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
}

struct SessionInner {
    storage: ClientStorage,
    transport: Arc<dyn HttpTransport>,
    max_retries: u32,
    queue_timeout: Duration,
    state: Mutex<RefreshState>,
}

/// Owns the refresh flag, retry counter and pending queue for one client.
#[derive(Clone)]
pub struct SessionManager {
    inner: Arc<SessionInner>,
}

impl SessionManager {
    #[must_use]
    pub fn new(storage: ClientStorage, transport: Arc<dyn HttpTransport>, config: &ClientConfig) -> Self {
        Self {
            inner: Arc::new(SessionInner {
                storage,
                transport,
                max_retries: config.refresh_max_retries.max(1),
                queue_timeout: config.refresh_queue_timeout,
                state: Mutex::new(RefreshState::default()),
            }),
        }
    }

    #[must_use]
    pub fn storage(&self) -> &ClientStorage {
        &self.inner.storage
    }

    #[must_use]
    pub fn is_refreshing(&self) -> bool {
        self.lock().in_flight
    }

    /// Consecutive refresh failures since the last success or reset.
    #[must_use]
    pub fn failure_count(&self) -> u32 {
        self.lock().failures
    }

    /// Take all session events recorded since the last drain.
    pub fn drain_events(&self) -> Vec<SessionEvent> {
        self.lock().events.drain(..).collect()
    }

    /// Persist tokens from a successful login and forget earlier refresh failures.
    ///
    /// # Errors
    ///
    /// Returns an error if the tokens cannot be written.
    pub fn store_login_tokens(&self, access_token: &str, refresh_token: Option<&str>) -> Result<(), ApiError> {
        self.inner.storage.store_tokens(access_token, refresh_token)?;
        self.lock().failures = 0;
        Ok(())
    }

    /// A usable access token: the stored one if unexpired, otherwise a refreshed one.
    ///
    /// # Errors
    ///
    /// Returns `NoRefreshToken` when there is nothing to refresh with, or the
    /// failure of the refresh this call joined.
    pub async fn valid_token(&self) -> Result<String, ApiError> {
        if let Some(token) = self.inner.storage.access_token() {
            if !jwt::is_expired(&token) {
                return Ok(token);
            }
        }
        tracing::warn!("access token expired or missing, attempting refresh");
        self.refresh().await
    }

    /// Refresh after the server rejected `stale` with a 401.
    ///
    /// If another caller already rotated the token past `stale`, that newer
    /// token is returned without a second refresh.
    ///
    /// # Errors
    ///
    /// Same as [`SessionManager::refresh`].
    pub async fn refresh_after_unauthorized(&self, stale: Option<&str>) -> Result<String, ApiError> {
        if let Some(current) = self.inner.storage.access_token() {
            if Some(current.as_str()) != stale && !jwt::is_expired(&current) && !self.is_refreshing() {
                return Ok(current);
            }
        }
        self.refresh().await
    }

    /// Join the in-flight refresh, or start one.
    ///
    /// # Errors
    ///
    /// - `NoRefreshToken` if no refresh is running and no refresh token is stored
    /// - `RefreshFailed` / `SessionExpired` when the shared refresh fails
    /// - `QueueTimeout` if a joined refresh does not settle within the queue timeout
    pub async fn refresh(&self) -> Result<String, ApiError> {
        let (rx, leader) = {
            let mut state = self.lock();
            if !state.in_flight && self.inner.storage.refresh_token().is_none() {
                tracing::warn!("no refresh token found");
                return Err(ApiError::NoRefreshToken);
            }
            let (tx, rx) = oneshot::channel();
            state.pending.push(tx);
            let leader = !state.in_flight;
            state.in_flight = true;
            (rx, leader)
        };

        if leader {
            let manager = self.clone();
            tokio::spawn(async move { manager.run_refresh().await });
            return match rx.await {
                Ok(outcome) => outcome.map_err(ApiError::from),
                Err(_) => Err(ApiError::RefreshFailed("refresh task dropped".into())),
            };
        }

        match tokio::time::timeout(self.inner.queue_timeout, rx).await {
            Ok(Ok(outcome)) => outcome.map_err(ApiError::from),
            Ok(Err(_)) => Err(ApiError::RefreshFailed("refresh task dropped".into())),
            Err(_) => Err(ApiError::QueueTimeout),
        }
    }

    async fn run_refresh(&self) {
        let attempt = self.failure_count() + 1;
        tracing::info!(attempt, "attempting token refresh");
        let outcome = self.exchange_refresh_token().await;

        let (waiters, result) = {
            let mut state = self.lock();
            state.in_flight = false;
            let waiters = std::mem::take(&mut state.pending);
            let result = match outcome {
                Ok(token) => {
                    state.failures = 0;
                    Ok(token)
                }
                Err(reason) => {
                    state.failures += 1;
                    tracing::error!(%reason, failures = state.failures, "token refresh failed");
                    if state.failures >= self.inner.max_retries {
                        state.failures = 0;
                        self.expire(&mut state, &reason);
                        Err(RefreshFailure::Exhausted(reason))
                    } else {
                        Err(RefreshFailure::Failed(reason))
                    }
                }
            };
            (waiters, result)
        };

        for waiter in waiters {
            let _ = waiter.send(result.clone());
        }
    }

    /// Tear down credentials after refresh exhaustion. Runs under the state lock
    /// so no new refresh can start with the old refresh token.
    fn expire(&self, state: &mut RefreshState, reason: &str) {
        tracing::error!(max_retries = self.inner.max_retries, "max refresh retries exceeded");
        let storage = &self.inner.storage;
        if let Err(e) = storage.clear_tokens().and_then(|()| storage.clear_all_cookies()) {
            tracing::warn!(error = %e, "failed to clear credentials after refresh exhaustion");
        }
        state.events.push_back(SessionEvent::Expired { reason: format!("token refresh failed after max retries: {reason}") });
    }

    async fn exchange_refresh_token(&self) -> Result<String, String> {
        let storage = &self.inner.storage;
        let refresh_token = storage.refresh_token().ok_or_else(|| "no refresh token available".to_owned())?;

        let mut request = HttpRequest::new(reqwest::Method::POST, REFRESH_PATH);
        request.bearer = Some(refresh_token);
        request.cookies = storage.cookie_header();
        request.body = Some(serde_json::json!({}));

        let response = self
            .inner
            .transport
            .send(request)
            .await
            .map_err(|e| e.to_string())?;
        absorb_cookies(storage, &response);

        if !response.is_success() {
            let message = server_message(&response.body).unwrap_or_else(|| "refresh rejected".to_owned());
            return Err(format!("status {}: {message}", response.status));
        }

        let body: RefreshResponse =
            serde_json::from_value(response.body).map_err(|e| format!("unexpected refresh response: {e}"))?;
        let access_token = body
            .access_token
            .filter(|t| !t.is_empty())
            .ok_or_else(|| "no new access token received".to_owned())?;
        storage
            .store_tokens(&access_token, body.refresh_token.as_deref())
            .map_err(|e| e.to_string())?;
        Ok(access_token)
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, RefreshState> {
        self.inner.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Persist credential cookies carried by `response`.
pub(crate) fn absorb_cookies(storage: &ClientStorage, response: &HttpResponse) {
    for (name, value) in response.credential_cookies() {
        if let Err(e) = storage.store_cookie(&name, &value) {
            tracing::warn!(error = %e, cookie = %name, "failed to store cookie");
        }
    }
}

#[cfg(test)]
#[path = "session_test.rs"]
mod tests;
