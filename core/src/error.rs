//! Error types for the request executor.
//!
//! # Design
//! `ExecuteError` is what callers see. Every variant produced after the first
//! send carries the number of attempts made and the last observed status, so
//! a caller can tell a request that never reached the server (synthetic 503
//! with a transport or body-read cause) from one the server rejected (an
//! `Api` or `Raw` cause) from one whose successful body could not be decoded
//! (`Decode`).
//!
//! `AttemptError` is the failure recorded for a single attempt; the last one
//! is wrapped by the final `ExecuteError`.

use std::io;

use thiserror::Error;

use crate::transport::TransportError;
use crate::types::ApiErrors;

/// Failure observed on a single attempt.
#[derive(Debug, Error)]
pub enum AttemptError {
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),

    #[error("failed to read response body: {0}")]
    BodyRead(#[source] io::Error),

    /// The server returned a structured error payload.
    #[error("HTTP {status}: {errors}")]
    Api { status: u16, errors: ApiErrors },

    /// The server returned an error status with an unstructured body.
    #[error("HTTP {status}: {body}")]
    Raw { status: u16, body: String },
}

impl AttemptError {
    /// Whether the server never produced a readable response.
    pub fn is_transport(&self) -> bool {
        matches!(self, AttemptError::Transport(_) | AttemptError::BodyRead(_))
    }
}

/// Errors returned by `Executor`.
#[derive(Debug, Error)]
pub enum ExecuteError {
    /// The request could not be sent at all. No attempt was made.
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The request payload could not be serialized to JSON.
    #[error("failed to serialize request body: {0}")]
    Serialization(#[source] serde_json::Error),

    /// The request body reader failed while being buffered.
    #[error("failed to buffer request body: {0}")]
    RequestBody(#[source] io::Error),

    /// A successful response body did not match the expected type.
    #[error("failed to decode response after {attempts} attempts (status {status}): {source}")]
    Decode {
        attempts: u32,
        status: u16,
        #[source]
        source: serde_json::Error,
    },

    /// The call context was cancelled or its deadline passed.
    #[error("request cancelled after {attempts} attempts")]
    Cancelled {
        attempts: u32,
        status: Option<u16>,
        #[source]
        last: Option<AttemptError>,
    },

    /// Attempts stopped on a client error or ran out on retryable failures.
    #[error("request failed after {attempts} attempts (last status {status}): {source}")]
    Failed {
        attempts: u32,
        status: u16,
        #[source]
        source: AttemptError,
    },
}

impl ExecuteError {
    /// Number of transport sends made before the error was returned.
    pub fn attempts(&self) -> u32 {
        match self {
            ExecuteError::Decode { attempts, .. }
            | ExecuteError::Cancelled { attempts, .. }
            | ExecuteError::Failed { attempts, .. } => *attempts,
            _ => 0,
        }
    }

    /// Last observed status code. Transport failures report 503.
    pub fn status(&self) -> Option<u16> {
        match self {
            ExecuteError::Decode { status, .. } | ExecuteError::Failed { status, .. } => {
                Some(*status)
            }
            ExecuteError::Cancelled { status, .. } => *status,
            _ => None,
        }
    }

    /// The last attempt's failure, if any attempt failed.
    pub fn last_attempt(&self) -> Option<&AttemptError> {
        match self {
            ExecuteError::Failed { source, .. } => Some(source),
            ExecuteError::Cancelled { last, .. } => last.as_ref(),
            _ => None,
        }
    }

    pub fn api_errors(&self) -> Option<&ApiErrors> {
        match self.last_attempt() {
            Some(AttemptError::Api { errors, .. }) => Some(errors),
            _ => None,
        }
    }

    /// Whether the failure was transient, so the call may succeed later.
    pub fn is_retryable(&self) -> bool {
        match self {
            ExecuteError::Failed { status, source, .. } => {
                source.is_transport() || *status >= 500
            }
            ExecuteError::Cancelled { .. } => true,
            _ => false,
        }
    }
}
