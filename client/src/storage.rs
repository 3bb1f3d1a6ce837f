//! Durable client-side key-value storage.
//!
//! DESIGN
//! ======
//! Two namespaces mirror what a browser client owns: `local` (persistent
//! key-value storage holding tokens and preferences) and `cookies` (the
//! credential cookies the backend sets). Both sit behind `KeyValueStore` so
//! tests use `MemoryStore` while the CLI persists to disk with `FileStore`.
//!
//! TRADE-OFFS
//! ==========
//! `FileStore` writes through on every mutation. Token churn is low (login,
//! refresh, logout), so a full rewrite of a small JSON document is fine. The
//! rewrite goes to a `.tmp` sibling that is renamed over the state file, so
//! readers never see a half-written document.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use cookie::Cookie;
use serde::{Deserialize, Serialize};

pub const ACCESS_TOKEN_KEY: &str = "access_token";
pub const REFRESH_TOKEN_KEY: &str = "refresh_token";
pub const THEME_KEY: &str = "theme";
pub const ACCESS_TOKEN_COOKIE: &str = "access_token_cookie";
pub const REFRESH_TOKEN_COOKIE: &str = "refresh_token_cookie";

#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    #[error("storage io failed for {path}: {message}")]
    Io { path: String, message: String },
    #[error("storage file {path} is corrupt: {message}")]
    Corrupt { path: String, message: String },
}

/// Minimal synchronous key-value store.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;

    /// # Errors
    ///
    /// Returns an error if the value cannot be persisted.
    fn set(&self, key: &str, value: &str) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns an error if the removal cannot be persisted.
    fn remove(&self, key: &str) -> Result<(), StorageError>;

    /// # Errors
    ///
    /// Returns an error if the cleared state cannot be persisted.
    fn clear(&self) -> Result<(), StorageError>;

    fn keys(&self) -> Vec<String>;
}

// =============================================================================
// MEMORY STORE
// =============================================================================

/// Process-lifetime store. Used by tests and ephemeral sessions.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.to_owned(), value.to_owned());
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key);
        Ok(())
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        Ok(())
    }

    fn keys(&self) -> Vec<String> {
        self.entries
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .keys()
            .cloned()
            .collect()
    }
}

// =============================================================================
// FILE STORE
// =============================================================================

#[derive(Debug, Default, Serialize, Deserialize)]
struct StateFile {
    #[serde(default)]
    local: BTreeMap<String, String>,
    #[serde(default)]
    cookies: BTreeMap<String, String>,
}

#[derive(Debug, Clone, Copy)]
enum Namespace {
    Local,
    Cookies,
}

/// JSON-file-backed store shared by both namespaces of one state file.
#[derive(Debug)]
struct FileBacking {
    path: PathBuf,
    state: Mutex<StateFile>,
}

impl FileBacking {
    fn open(path: &Path) -> Result<Self, StorageError> {
        let state = match std::fs::read_to_string(path) {
            Ok(raw) if raw.trim().is_empty() => StateFile::default(),
            Ok(raw) => serde_json::from_str(&raw).map_err(|e| StorageError::Corrupt {
                path: path.display().to_string(),
                message: e.to_string(),
            })?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => StateFile::default(),
            Err(e) => return Err(io_error(path, &e)),
        };
        Ok(Self { path: path.to_owned(), state: Mutex::new(state) })
    }

    fn mutate(&self, ns: Namespace, f: impl FnOnce(&mut BTreeMap<String, String>)) -> Result<(), StorageError> {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match ns {
            Namespace::Local => f(&mut state.local),
            Namespace::Cookies => f(&mut state.cookies),
        }
        self.flush(&state)
    }

    fn read<T>(&self, ns: Namespace, f: impl FnOnce(&BTreeMap<String, String>) -> T) -> T {
        let state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        match ns {
            Namespace::Local => f(&state.local),
            Namespace::Cookies => f(&state.cookies),
        }
    }

    fn flush(&self, state: &StateFile) -> Result<(), StorageError> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| io_error(parent, &e))?;
        }
        let raw = serde_json::to_string_pretty(state).map_err(|e| StorageError::Corrupt {
            path: self.path.display().to_string(),
            message: e.to_string(),
        })?;
        let mut staging = self.path.clone().into_os_string();
        staging.push(".tmp");
        let staging = PathBuf::from(staging);
        std::fs::write(&staging, raw).map_err(|e| io_error(&staging, &e))?;
        std::fs::rename(&staging, &self.path).map_err(|e| io_error(&self.path, &e))
    }
}

fn io_error(path: &Path, e: &std::io::Error) -> StorageError {
    StorageError::Io { path: path.display().to_string(), message: e.to_string() }
}

/// One namespace of an on-disk state file.
#[derive(Debug, Clone)]
pub struct FileStore {
    backing: Arc<FileBacking>,
    ns: Namespace,
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        self.backing.read(self.ns, |m| m.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.backing.mutate(self.ns, |m| {
            m.insert(key.to_owned(), value.to_owned());
        })
    }

    fn remove(&self, key: &str) -> Result<(), StorageError> {
        self.backing.mutate(self.ns, |m| {
            m.remove(key);
        })
    }

    fn clear(&self) -> Result<(), StorageError> {
        self.backing.mutate(self.ns, BTreeMap::clear)
    }

    fn keys(&self) -> Vec<String> {
        self.backing.read(self.ns, |m| m.keys().cloned().collect())
    }
}

// =============================================================================
// CLIENT STORAGE
// =============================================================================

/// Token, cookie and preference storage for one client.
#[derive(Clone)]
pub struct ClientStorage {
    local: Arc<dyn KeyValueStore>,
    cookies: Arc<dyn KeyValueStore>,
}

impl ClientStorage {
    #[must_use]
    pub fn new(local: Arc<dyn KeyValueStore>, cookies: Arc<dyn KeyValueStore>) -> Self {
        Self { local, cookies }
    }

    /// Fresh in-memory storage.
    #[must_use]
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryStore::new()), Arc::new(MemoryStore::new()))
    }

    /// Open (or lazily create) a JSON state file holding both namespaces.
    ///
    /// # Errors
    ///
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn open_file(path: &Path) -> Result<Self, StorageError> {
        let backing = Arc::new(FileBacking::open(path)?);
        let local = FileStore { backing: Arc::clone(&backing), ns: Namespace::Local };
        let cookies = FileStore { backing, ns: Namespace::Cookies };
        Ok(Self::new(Arc::new(local), Arc::new(cookies)))
    }

    #[must_use]
    pub fn local(&self) -> &dyn KeyValueStore {
        self.local.as_ref()
    }

    #[must_use]
    pub fn cookies(&self) -> &dyn KeyValueStore {
        self.cookies.as_ref()
    }

    /// Access token from local storage, falling back to the cookie.
    #[must_use]
    pub fn access_token(&self) -> Option<String> {
        non_empty(self.local.get(ACCESS_TOKEN_KEY)).or_else(|| non_empty(self.cookies.get(ACCESS_TOKEN_COOKIE)))
    }

    /// Refresh token from local storage, falling back to the cookie.
    #[must_use]
    pub fn refresh_token(&self) -> Option<String> {
        non_empty(self.local.get(REFRESH_TOKEN_KEY)).or_else(|| non_empty(self.cookies.get(REFRESH_TOKEN_COOKIE)))
    }

    /// Persist a new access token and, when rotated, a new refresh token.
    ///
    /// # Errors
    ///
    /// Returns an error if either write fails.
    pub fn store_tokens(&self, access_token: &str, refresh_token: Option<&str>) -> Result<(), StorageError> {
        self.local.set(ACCESS_TOKEN_KEY, access_token)?;
        if let Some(refresh) = refresh_token.filter(|t| !t.is_empty()) {
            self.local.set(REFRESH_TOKEN_KEY, refresh)?;
        }
        Ok(())
    }

    /// Remove both tokens from local storage.
    ///
    /// # Errors
    ///
    /// Returns an error if either removal fails.
    pub fn clear_tokens(&self) -> Result<(), StorageError> {
        self.local.remove(ACCESS_TOKEN_KEY)?;
        self.local.remove(REFRESH_TOKEN_KEY)
    }

    /// Expire the two credential cookies.
    ///
    /// # Errors
    ///
    /// Returns an error if either removal fails.
    pub fn clear_auth_cookies(&self) -> Result<(), StorageError> {
        self.cookies.remove(ACCESS_TOKEN_COOKIE)?;
        self.cookies.remove(REFRESH_TOKEN_COOKIE)
    }

    /// Expire every cookie in the jar.
    ///
    /// # Errors
    ///
    /// Returns an error if the cleared jar cannot be persisted.
    pub fn clear_all_cookies(&self) -> Result<(), StorageError> {
        self.cookies.clear()
    }

    /// Record a cookie received from the backend.
    ///
    /// # Errors
    ///
    /// Returns an error if the jar cannot be persisted.
    pub fn store_cookie(&self, name: &str, value: &str) -> Result<(), StorageError> {
        if value.is_empty() { self.cookies.remove(name) } else { self.cookies.set(name, value) }
    }

    /// `Cookie` header value for outgoing requests, if the jar is non-empty.
    #[must_use]
    pub fn cookie_header(&self) -> Option<String> {
        let pairs: Vec<String> = self
            .cookies
            .keys()
            .into_iter()
            .filter_map(|name| self.cookies.get(&name).map(|value| format!("{name}={value}")))
            .collect();
        (!pairs.is_empty()).then(|| pairs.join("; "))
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.is_empty())
}

/// Parse a `Set-Cookie` header into its name and value.
///
/// Cookies the server is expiring (`Max-Age` of zero or less, or an
/// `Expires` date already past) come back with an empty value.
#[must_use]
pub fn parse_set_cookie(header: &str) -> Option<(String, String)> {
    let cookie = Cookie::parse(header).ok()?;
    let expired = cookie.max_age().is_some_and(|age| age <= time::Duration::ZERO)
        || cookie.expires_datetime().is_some_and(|at| at <= time::OffsetDateTime::now_utc());
    let value = if expired { String::new() } else { cookie.value_trimmed().to_owned() };
    Some((cookie.name().to_owned(), value))
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
