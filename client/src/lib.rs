//! # report-client
//!
//! Native client for the AI school report generator backend.
//!
//! This crate contains the session layer (token storage, JWT expiry checks,
//! single-flight access-token refresh), the REST client that rides on it, the
//! auth manager and route guard the UI layer consults on navigation, and the
//! report-building form state with its backend calls.
//!
//! SYSTEM CONTEXT
//! ==============
//! UI (the `report-cli` binary) -> `auth` / `report::service` -> `net::client`
//! -> `session` (refresh) -> `net::transport` -> backend REST API.

pub mod auth;
pub mod config;
pub mod error;
pub mod jwt;
pub mod net;
pub mod report;
pub mod routes;
pub mod session;
pub mod storage;
pub mod theme;

pub use auth::{AuthManager, AuthState, Navigation};
pub use config::ClientConfig;
pub use error::ApiError;
pub use net::client::ApiClient;
pub use session::{SessionEvent, SessionManager};
pub use storage::ClientStorage;
