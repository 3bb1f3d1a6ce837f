//! Report-generation responses and their normalization.
//!
//! The backend has answered generate calls with a `{reports: [...]}` batch,
//! a bare array, a single `{name, report}` object, and other ad-hoc objects.
//! [`ReportResponse::normalize`] folds all of them into one list of entries;
//! anything unrecognized is kept raw and rendered with placeholders.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::form::UNNAMED_STUDENT;
use crate::error::ApiError;

pub const NO_REPORT: &str = "No report generated";

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(untagged)]
pub enum ReportResponse {
    Batch { reports: Vec<Value> },
    List(Vec<Value>),
    Single { name: String, report: String },
    Other(Value),
}

/// One normalized report.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ReportEntry {
    Generated { name: String, report: String },
    /// A response object with no usable `{name, report}` pair, kept as received.
    Unrecognized(Value),
}

impl ReportEntry {
    fn from_value(value: Value) -> Self {
        let name = value.get("name").and_then(Value::as_str);
        let report = value.get("report").and_then(Value::as_str);
        match (name, report) {
            (Some(name), Some(report)) if !name.is_empty() && !report.is_empty() => {
                Self::Generated { name: name.to_owned(), report: report.to_owned() }
            }
            _ => Self::Unrecognized(value),
        }
    }

    /// Student name, or a placeholder.
    #[must_use]
    pub fn name(&self) -> &str {
        match self {
            Self::Generated { name, .. } => name,
            Self::Unrecognized(raw) => text_field(raw, "name").unwrap_or(UNNAMED_STUDENT),
        }
    }

    /// Report text, or a placeholder.
    #[must_use]
    pub fn report(&self) -> &str {
        match self {
            Self::Generated { report, .. } => report,
            Self::Unrecognized(raw) => text_field(raw, "report").unwrap_or(NO_REPORT),
        }
    }
}

fn text_field<'a>(raw: &'a Value, key: &str) -> Option<&'a str> {
    raw.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

impl ReportResponse {
    /// Decode a raw body. Unknown objects become `Other`.
    ///
    /// # Errors
    ///
    /// Returns `Decode` when the body is not a JSON object or array.
    pub fn from_body(body: Value) -> Result<Self, ApiError> {
        match serde_json::from_value(body) {
            Ok(Self::Other(raw)) if !raw.is_object() => {
                Err(ApiError::Decode(format!("invalid response format from server: {raw}")))
            }
            Ok(response) => Ok(response),
            Err(e) => Err(ApiError::Decode(e.to_string())),
        }
    }

    #[must_use]
    pub fn normalize(self) -> Vec<ReportEntry> {
        match self {
            Self::Batch { reports } | Self::List(reports) => reports.into_iter().map(ReportEntry::from_value).collect(),
            Self::Single { name, report } => {
                vec![ReportEntry::from_value(serde_json::json!({ "name": name, "report": report }))]
            }
            Self::Other(raw) => vec![ReportEntry::Unrecognized(raw)],
        }
    }
}

/// Decode and normalize in one step.
///
/// # Errors
///
/// Same as [`ReportResponse::from_body`].
pub fn normalize(body: Value) -> Result<Vec<ReportEntry>, ApiError> {
    Ok(ReportResponse::from_body(body)?.normalize())
}

#[cfg(test)]
#[path = "response_test.rs"]
mod tests;
