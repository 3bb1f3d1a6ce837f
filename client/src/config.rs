//! Client configuration parsed from environment variables.

use std::path::PathBuf;
use std::time::Duration;

pub const DEFAULT_API_BASE_URL: &str = "http://localhost:5000";
pub const DEFAULT_REQUEST_TIMEOUT_MS: u64 = 30_000;
pub const DEFAULT_CONNECT_TIMEOUT_MS: u64 = 10_000;
pub const DEFAULT_REFRESH_MAX_RETRIES: u32 = 2;
pub const DEFAULT_REFRESH_QUEUE_TIMEOUT_MS: u64 = 5_000;
pub const DEFAULT_GENERATE_PATH: &str = "/reports/generate";
pub const DEFAULT_TEMPLATES_PATH: &str = "/api/reports/templates";
pub const DEFAULT_STATE_PATH: &str = ".report-client/state.json";

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// A configuration value could not be used.
    #[error("config parse failed: {0}")]
    Parse(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Timeouts {
    pub request: Duration,
    pub connect: Duration,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    pub base_url: String,
    pub timeouts: Timeouts,
    /// Refresh failures tolerated before the session is torn down.
    pub refresh_max_retries: u32,
    /// Upper bound on how long a request queued behind a refresh waits.
    pub refresh_queue_timeout: Duration,
    pub generate_path: String,
    pub templates_path: String,
    pub state_path: PathBuf,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            base_url: DEFAULT_API_BASE_URL.to_owned(),
            timeouts: Timeouts {
                request: Duration::from_millis(DEFAULT_REQUEST_TIMEOUT_MS),
                connect: Duration::from_millis(DEFAULT_CONNECT_TIMEOUT_MS),
            },
            refresh_max_retries: DEFAULT_REFRESH_MAX_RETRIES,
            refresh_queue_timeout: Duration::from_millis(DEFAULT_REFRESH_QUEUE_TIMEOUT_MS),
            generate_path: DEFAULT_GENERATE_PATH.to_owned(),
            templates_path: DEFAULT_TEMPLATES_PATH.to_owned(),
            state_path: PathBuf::from(DEFAULT_STATE_PATH),
        }
    }
}

impl ClientConfig {
    /// Build typed client config from environment variables.
    ///
    /// Optional:
    /// - `REPORT_API_BASE_URL`: default `http://localhost:5000`
    /// - `REPORT_API_TIMEOUT_MS`: default 30000
    /// - `REPORT_API_CONNECT_TIMEOUT_MS`: default 10000
    /// - `REPORT_REFRESH_MAX_RETRIES`: default 2, must be non-zero
    /// - `REPORT_REFRESH_QUEUE_TIMEOUT_MS`: default 5000
    /// - `REPORT_GENERATE_PATH`: default `/reports/generate`
    /// - `REPORT_TEMPLATES_PATH`: default `/api/reports/templates`
    /// - `REPORT_STATE_PATH`: default `.report-client/state.json`
    ///
    /// # Errors
    ///
    /// Returns an error if the retry ceiling is zero or an endpoint path lacks a leading `/`.
    pub fn from_env() -> Result<Self, ConfigError> {
        let base_url = std::env::var("REPORT_API_BASE_URL").unwrap_or_else(|_| DEFAULT_API_BASE_URL.to_owned());
        let timeouts = Timeouts {
            request: Duration::from_millis(env_parse("REPORT_API_TIMEOUT_MS", DEFAULT_REQUEST_TIMEOUT_MS)),
            connect: Duration::from_millis(env_parse("REPORT_API_CONNECT_TIMEOUT_MS", DEFAULT_CONNECT_TIMEOUT_MS)),
        };
        let refresh_max_retries = env_parse("REPORT_REFRESH_MAX_RETRIES", DEFAULT_REFRESH_MAX_RETRIES);
        let refresh_queue_timeout =
            Duration::from_millis(env_parse("REPORT_REFRESH_QUEUE_TIMEOUT_MS", DEFAULT_REFRESH_QUEUE_TIMEOUT_MS));
        let generate_path = std::env::var("REPORT_GENERATE_PATH").unwrap_or_else(|_| DEFAULT_GENERATE_PATH.to_owned());
        let templates_path =
            std::env::var("REPORT_TEMPLATES_PATH").unwrap_or_else(|_| DEFAULT_TEMPLATES_PATH.to_owned());
        let state_path = std::env::var("REPORT_STATE_PATH").map_or_else(|_| PathBuf::from(DEFAULT_STATE_PATH), PathBuf::from);

        Self {
            base_url,
            timeouts,
            refresh_max_retries,
            refresh_queue_timeout,
            generate_path,
            templates_path,
            state_path,
        }
        .validated()
    }

    /// Normalize URLs and reject unusable values.
    ///
    /// # Errors
    ///
    /// Returns an error if the retry ceiling is zero or an endpoint path lacks a leading `/`.
    pub fn validated(mut self) -> Result<Self, ConfigError> {
        self.base_url = self.base_url.trim_end_matches('/').to_owned();
        if self.refresh_max_retries == 0 {
            return Err(ConfigError::Parse("REPORT_REFRESH_MAX_RETRIES must be at least 1".into()));
        }
        for path in [&self.generate_path, &self.templates_path] {
            if !path.starts_with('/') {
                return Err(ConfigError::Parse(format!("endpoint path must start with '/': {path}")));
            }
        }
        self.templates_path = self.templates_path.trim_end_matches('/').to_owned();
        Ok(self)
    }
}

fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
