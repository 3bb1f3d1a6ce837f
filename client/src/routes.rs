//! Route table and navigation guard.
//!
//! SYSTEM CONTEXT
//! ==============
//! Front-ends resolve a location to a [`Page`] and ask [`guard`] whether to
//! render it, show a loading indicator, or redirect. Redirects away from a
//! protected page carry the original location in a `next` query parameter so
//! login can return there.

use reqwest::Url;

use crate::auth::AuthState;

pub const LOGIN_PATH: &str = "/login";
pub const HOME_PATH: &str = "/";
const LOCAL_ORIGIN: &str = "http://client.local";

/// A navigation command for the front-end to carry out.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct Navigation {
    pub to: String,
}

impl Navigation {
    #[must_use]
    pub fn to(path: impl Into<String>) -> Self {
        Self { to: path.into() }
    }

    #[must_use]
    pub fn login() -> Self {
        Self::to(LOGIN_PATH)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Page {
    Dashboard,
    Reports,
    PrimaryReports,
    HighSchoolReports,
    Settings,
    Login,
    Register,
    NotFound,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    /// Requires a signed-in user.
    Protected,
    /// Only for signed-out users (login, register).
    PublicOnly,
    /// Anyone.
    Public,
}

impl Access {
    /// Whether requests made from this route go out without a bearer.
    #[must_use]
    pub fn is_public(self) -> bool {
        !matches!(self, Self::Protected)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Route {
    pub path: &'static str,
    pub page: Page,
    pub access: Access,
}

pub const ROUTES: &[Route] = &[
    Route { path: "/", page: Page::Dashboard, access: Access::Protected },
    Route { path: "/dashboard", page: Page::Dashboard, access: Access::Protected },
    Route { path: "/reports", page: Page::Reports, access: Access::Protected },
    Route { path: "/reports/primary", page: Page::PrimaryReports, access: Access::Protected },
    Route { path: "/reports/high-school", page: Page::HighSchoolReports, access: Access::Protected },
    Route { path: "/settings", page: Page::Settings, access: Access::Protected },
    Route { path: "/login", page: Page::Login, access: Access::PublicOnly },
    Route { path: "/auth/register", page: Page::Register, access: Access::PublicOnly },
];

const NOT_FOUND: Route = Route { path: "*", page: Page::NotFound, access: Access::Public };

/// Resolve a location (path plus optional query) to its route.
#[must_use]
pub fn resolve(location: &str) -> Route {
    let path = path_of(location);
    ROUTES.iter().copied().find(|r| r.path == path).unwrap_or(NOT_FOUND)
}

fn path_of(location: &str) -> &str {
    let path = location.split(['?', '#']).next().unwrap_or_default();
    match path.trim_end_matches('/') {
        "" => "/",
        trimmed => trimmed,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardDecision {
    /// Auth status is still being resolved.
    Loading,
    Render(Page),
    Redirect(Navigation),
}

/// Decide what to show for `location` given the current auth state.
#[must_use]
pub fn guard(location: &str, auth: &AuthState) -> GuardDecision {
    if auth.loading {
        return GuardDecision::Loading;
    }
    let route = resolve(location);
    match (route.access, auth.user.is_some()) {
        (Access::Protected, false) => GuardDecision::Redirect(login_redirect(location)),
        (Access::PublicOnly, true) => GuardDecision::Redirect(Navigation::to(HOME_PATH)),
        _ => GuardDecision::Render(route.page),
    }
}

/// Navigation to the login page remembering `original` as the post-login target.
#[must_use]
pub fn login_redirect(original: &str) -> Navigation {
    let Ok(mut url) = Url::parse(&format!("{LOCAL_ORIGIN}{LOGIN_PATH}")) else {
        return Navigation::login();
    };
    url.query_pairs_mut().append_pair("next", original);
    match url.query() {
        Some(query) => Navigation::to(format!("{LOGIN_PATH}?{query}")),
        None => Navigation::login(),
    }
}

/// The post-login target encoded in `location`'s `next` parameter, or `/`.
///
/// Only same-origin paths are honoured; anything else falls back to `/`.
#[must_use]
pub fn next_target(location: &str) -> String {
    let Ok(url) = Url::parse(LOCAL_ORIGIN).and_then(|base| base.join(location)) else {
        return HOME_PATH.to_owned();
    };
    url.query_pairs()
        .find(|(key, _)| key == "next")
        .map(|(_, value)| value.into_owned())
        .filter(|next| next.starts_with('/') && !next.starts_with("//"))
        .unwrap_or_else(|| HOME_PATH.to_owned())
}

#[cfg(test)]
#[path = "routes_test.rs"]
mod tests;
