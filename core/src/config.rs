//! Executor configuration.
//!
//! # Design
//! Configuration is plain data, fixed once an `Executor` is built. It can be
//! assembled in code with the `with_*` methods or deserialized from JSON
//! supplied by the generated client's own config loading. The backoff unit is
//! read from `backoff_unit_ms`.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Deserializer};

/// Default backoff unit: attempts wait 1s, 2s, 3s, ...
pub const DEFAULT_BACKOFF_UNIT: Duration = Duration::from_secs(1);

/// An opaque, pre-formatted `Authorization` header value.
///
/// `Debug` output is redacted so credentials never reach logs.
#[derive(Clone, PartialEq, Eq, Deserialize)]
#[serde(transparent)]
pub struct Credential(String);

impl Credential {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn bearer(token: &str) -> Self {
        Self(format!("Bearer {token}"))
    }

    pub fn expose(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Credential(<redacted>)")
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Base address relative request URLs are resolved against.
    pub base_url: Option<String>,
    pub credential: Option<Credential>,
    /// Sent as `X-Originator`.
    pub originator: Option<String>,
    /// Extra attempts after the first. 0 means exactly one attempt.
    pub retry_count: u32,
    #[serde(rename = "backoff_unit_ms", deserialize_with = "duration_from_millis")]
    pub backoff_unit: Duration,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            base_url: None,
            credential: None,
            originator: None,
            retry_count: 0,
            backoff_unit: DEFAULT_BACKOFF_UNIT,
        }
    }
}

impl ExecutorConfig {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: Some(base_url.to_string()),
            ..Self::default()
        }
    }

    pub fn with_credential(mut self, credential: Credential) -> Self {
        self.credential = Some(credential);
        self
    }

    pub fn with_originator(mut self, originator: impl Into<String>) -> Self {
        self.originator = Some(originator.into());
        self
    }

    pub fn with_retry_count(mut self, retry_count: u32) -> Self {
        self.retry_count = retry_count;
        self
    }

    pub fn with_backoff_unit(mut self, unit: Duration) -> Self {
        self.backoff_unit = unit;
        self
    }

    pub fn from_json(raw: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(raw)
    }

    /// Total transport sends allowed per call.
    pub fn total_attempts(&self) -> u32 {
        self.retry_count.saturating_add(1)
    }
}

fn duration_from_millis<'de, D>(deserializer: D) -> Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    u64::deserialize(deserializer).map(Duration::from_millis)
}
