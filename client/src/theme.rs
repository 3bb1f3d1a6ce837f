//! Light/dark theme preference.
//!
//! Persisted in local storage under `theme` as `"light"` or `"dark"`. A
//! missing or unrecognized value reads as light.

use std::fmt;

use crate::storage::{ClientStorage, StorageError, THEME_KEY};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    #[default]
    Light,
    Dark,
}

impl Theme {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Light => "light",
            Self::Dark => "dark",
        }
    }

    #[must_use]
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim() {
            "light" => Some(Self::Light),
            "dark" => Some(Self::Dark),
            _ => None,
        }
    }

    #[must_use]
    pub fn toggled(self) -> Self {
        match self {
            Self::Light => Self::Dark,
            Self::Dark => Self::Light,
        }
    }
}

impl fmt::Display for Theme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Read the stored preference.
#[must_use]
pub fn load(storage: &ClientStorage) -> Theme {
    storage.local().get(THEME_KEY).as_deref().and_then(Theme::parse).unwrap_or_default()
}

/// Persist `theme`.
///
/// # Errors
///
/// Returns an error if the preference cannot be written.
pub fn store(storage: &ClientStorage, theme: Theme) -> Result<(), StorageError> {
    storage.local().set(THEME_KEY, theme.as_str())
}

/// Flip the stored preference and return the new one.
///
/// # Errors
///
/// Returns an error if the preference cannot be written.
pub fn toggle(storage: &ClientStorage) -> Result<Theme, StorageError> {
    let next = load(storage).toggled();
    store(storage, next)?;
    Ok(next)
}

#[cfg(test)]
#[path = "theme_test.rs"]
mod tests;
