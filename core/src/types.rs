//! Structured error payloads reported by the server.
//!
//! # Design
//! Servers report failures as `{"errors":[{"title":..,"code":..,"status":..}]}`
//! with every entry field optional. A body that does not parse into this shape,
//! or parses into an empty list, is not treated as structured; the executor
//! falls back to the raw status and body text instead.

use std::fmt;

use serde::{Deserialize, Serialize};

/// A single server-reported error.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrorEntry {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status: Option<String>,
}

impl fmt::Display for ApiErrorEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.title.as_deref().unwrap_or("unknown error"))?;
        match (&self.code, &self.status) {
            (Some(code), Some(status)) => write!(f, " (code={code}, status={status})"),
            (Some(code), None) => write!(f, " (code={code})"),
            (None, Some(status)) => write!(f, " (status={status})"),
            (None, None) => Ok(()),
        }
    }
}

/// The collection of errors decoded from an error response body.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApiErrors {
    #[serde(default)]
    pub errors: Vec<ApiErrorEntry>,
}

impl ApiErrors {
    /// Decode a response body, returning `None` when it is not a non-empty
    /// error collection.
    pub fn parse(body: &[u8]) -> Option<Self> {
        serde_json::from_slice::<Self>(body)
            .ok()
            .filter(|parsed| !parsed.errors.is_empty())
    }

    pub fn len(&self) -> usize {
        self.errors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ApiErrorEntry> {
        self.errors.iter()
    }
}

impl fmt::Display for ApiErrors {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (index, entry) in self.errors.iter().enumerate() {
            if index > 0 {
                f.write_str("; ")?;
            }
            write!(f, "{entry}")?;
        }
        Ok(())
    }
}
