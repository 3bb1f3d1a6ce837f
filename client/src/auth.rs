//! Auth-session state for the current user.
//!
//! SYSTEM CONTEXT
//! ==============
//! Route guards read [`AuthState`]; pages call into [`AuthManager`] for
//! login, logout and the protected-route check. Redirects come back as
//! [`Navigation`] values for the front-end to carry out.
//!
//! ERROR HANDLING
//! ==============
//! Unauthenticated outcomes (401, no refresh token, expired session) redirect
//! to `/login`. Anything else is stored in `AuthState::error` as an inline,
//! recoverable message.

use std::sync::{Mutex, PoisonError};

use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;

use crate::error::ApiError;
use crate::net::client::{ApiClient, ApiRequest};
use crate::routes;
use crate::session::SessionEvent;

pub use crate::routes::Navigation;

pub const LOGIN_ENDPOINT: &str = "/auth/login";
pub const LOGOUT_ENDPOINT: &str = "/auth/logout";
pub const ME_ENDPOINT: &str = "/auth/me";
pub const REGISTER_ENDPOINT: &str = "/auth/register";

const LOGIN_FAILED: &str = "Login failed. Please try again.";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    #[serde(default, alias = "user_id", skip_serializing_if = "Option::is_none")]
    pub id: Option<Value>,
    pub username: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
}

/// Authentication state tracking the current user, loading status and inline error.
#[derive(Clone, Debug, Default, PartialEq, Serialize)]
pub struct AuthState {
    pub user: Option<User>,
    pub loading: bool,
    pub error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct LoginResponse {
    access_token: Option<String>,
    refresh_token: Option<String>,
    user: Option<User>,
}

pub struct AuthManager {
    client: ApiClient,
    state: Mutex<AuthState>,
}

impl AuthManager {
    #[must_use]
    pub fn new(client: ApiClient) -> Self {
        Self { client, state: Mutex::new(AuthState::default()) }
    }

    #[must_use]
    pub fn client(&self) -> &ApiClient {
        &self.client
    }

    /// Snapshot of the current auth state.
    #[must_use]
    pub fn state(&self) -> AuthState {
        self.lock().clone()
    }

    /// Record a route change; requests from public routes go out without a bearer.
    pub fn navigate(&self, location: &str) {
        let public = routes::resolve(location).access.is_public();
        tracing::debug!(location, public, "route changed");
        self.client.set_public_route(public);
    }

    /// Sign in and return where to go next (the `next` parameter of `location`, or `/`).
    ///
    /// # Errors
    ///
    /// Returns the login failure; `AuthState::error` carries the user-facing text.
    pub async fn login(
        &self,
        identifier: &str,
        password: &str,
        location: &str,
        cancel: &CancellationToken,
    ) -> Result<Navigation, ApiError> {
        self.update(|s| {
            s.loading = true;
            s.error = None;
        });

        let request = ApiRequest::post(LOGIN_ENDPOINT)
            .json(json!({ "identifier": identifier, "username": identifier, "password": password }))
            .anonymous();
        let response = match self.client.send_json::<LoginResponse>(request, cancel).await {
            Ok(response) => response,
            Err(e) => {
                let message = e.backend_message().unwrap_or(LOGIN_FAILED).to_owned();
                tracing::error!(error = %e, "login failed");
                self.update(|s| {
                    s.loading = false;
                    s.error = Some(message);
                });
                return Err(e);
            }
        };

        if let Some(access_token) = response.access_token.as_deref().filter(|t| !t.is_empty()) {
            if let Err(e) = self.client.session().store_login_tokens(access_token, response.refresh_token.as_deref()) {
                self.update(|s| {
                    s.loading = false;
                    s.error = Some(e.to_string());
                });
                return Err(e);
            }
        }
        // The login page is public; the follow-up check must carry the new bearer.
        self.client.set_public_route(false);
        tracing::info!(user = ?response.user.as_ref().map(|u| &u.username), "login successful");
        self.update(|s| s.user = response.user);

        let target = match self.check_auth_status(true, cancel).await {
            Some(redirect) => redirect,
            None => Navigation::to(routes::next_target(location)),
        };
        self.navigate(&target.to);
        Ok(target)
    }

    /// Create an account. Returns the backend's confirmation message.
    ///
    /// # Errors
    ///
    /// Returns the registration failure.
    pub async fn register(&self, username: &str, password: &str, cancel: &CancellationToken) -> Result<String, ApiError> {
        let request = ApiRequest::post(REGISTER_ENDPOINT)
            .json(json!({ "username": username, "password": password }))
            .anonymous();
        let body = self.client.send(request, cancel).await?;
        Ok(crate::error::server_message(&body).unwrap_or_else(|| format!("User {username} created successfully")))
    }

    /// Sign out. The server call is best-effort; local credentials are always cleared.
    pub async fn logout(&self, cancel: &CancellationToken) -> Navigation {
        self.update(|s| s.loading = true);
        if let Err(e) = self.client.send(ApiRequest::post(LOGOUT_ENDPOINT), cancel).await {
            tracing::warn!(error = %e, "logout request failed, forcing token reset");
        }

        let storage = self.client.storage();
        if let Err(e) = storage.clear_tokens().and_then(|()| storage.clear_auth_cookies()) {
            tracing::warn!(error = %e, "failed to clear credentials on logout");
        }
        self.update(|s| {
            s.user = None;
            s.loading = false;
            s.error = None;
        });
        Navigation::login()
    }

    /// Fetch `/auth/me`, refreshing the access token first if needed.
    ///
    /// # Errors
    ///
    /// Returns the request failure, or `Decode` if no user is present in the body.
    pub async fn current_user(&self, cancel: &CancellationToken) -> Result<User, ApiError> {
        let body = self.client.send(ApiRequest::get(ME_ENDPOINT), cancel).await?;
        parse_user(body)
    }

    /// Validate the session for a route. Returns a redirect when the user must sign in.
    pub async fn check_auth_status(&self, is_protected: bool, cancel: &CancellationToken) -> Option<Navigation> {
        if !is_protected {
            self.update(|s| s.loading = false);
            return None;
        }

        self.update(|s| {
            s.loading = true;
            s.error = None;
        });

        match self.current_user(cancel).await {
            Ok(user) => {
                self.update(|s| {
                    s.user = Some(user);
                    s.loading = false;
                });
                None
            }
            Err(ApiError::Cancelled) => {
                self.update(|s| s.loading = false);
                None
            }
            Err(e) => {
                tracing::error!(error = %e, code = e.error_code(), "auth check failed");
                if e.is_unauthenticated() || self.client.storage().access_token().is_none() {
                    // An expiry event for this failure would redirect a second time.
                    let superseded = self.client.session().drain_events();
                    tracing::debug!(events = superseded.len(), "session events folded into auth redirect");
                    let reason = match &e {
                        ApiError::Unauthorized(_) => "Unauthorized".to_owned(),
                        other => other.to_string(),
                    };
                    Some(self.redirect_to_login(&reason))
                } else {
                    self.update(|s| {
                        s.user = None;
                        s.loading = false;
                        s.error = Some(e.to_string());
                    });
                    None
                }
            }
        }
    }

    /// Turn pending session-expiry events into a single redirect.
    pub fn drain_session_events(&self) -> Option<Navigation> {
        let events = self.client.session().drain_events();
        let SessionEvent::Expired { reason } = events.into_iter().next()?;
        Some(self.redirect_to_login(&reason))
    }

    /// Forget the user and local tokens, set the redirect message, and navigate to `/login`.
    pub fn redirect_to_login(&self, reason: &str) -> Navigation {
        tracing::info!(%reason, "redirecting to login");
        if let Err(e) = self.client.storage().clear_tokens() {
            tracing::warn!(error = %e, "failed to clear tokens");
        }
        self.update(|s| {
            s.user = None;
            s.loading = false;
            s.error = Some(format!("Authentication failed: {reason}. Redirecting to login..."));
        });
        Navigation::login()
    }

    fn update(&self, f: impl FnOnce(&mut AuthState)) {
        f(&mut self.lock());
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, AuthState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// Accept `{"user": {...}}` or a bare user object.
fn parse_user(body: Value) -> Result<User, ApiError> {
    let value = match body {
        Value::Object(mut map) if map.get("user").is_some_and(Value::is_object) => {
            map.remove("user").unwrap_or_default()
        }
        other => other,
    };
    serde_json::from_value(value).map_err(|e| ApiError::Decode(format!("no user in response: {e}")))
}

#[cfg(test)]
#[path = "auth_test.rs"]
mod tests;
