//! The transport capability the executor sends requests through.
//!
//! # Design
//! `Transport` is injected into the executor as a shared trait object so
//! tests can substitute scripted doubles and one connection pool can serve
//! many concurrent calls. A transport returns the status and headers with an
//! unread body stream; the executor reads the body itself so that a failure
//! mid-body is handled like any other transport failure.
//!
//! `UreqTransport` is the production implementation. Error statuses are
//! returned as data, never as `Err`, and the call context's deadline becomes
//! the request's global timeout.

use std::fmt;
use std::io::{self, Read};

use bytes::Bytes;
use thiserror::Error;

use crate::context::CallContext;
use crate::http::PreparedRequest;

type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Sends a prepared request and returns the unread response.
///
/// Implementations must be safe to share across threads. They should honor
/// the context's deadline where the underlying client supports it.
pub trait Transport: Send + Sync {
    fn send(
        &self,
        request: &PreparedRequest,
        ctx: &CallContext,
    ) -> Result<TransportResponse, TransportError>;
}

/// Status, headers and an unread body stream.
pub struct TransportResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Box<dyn Read>,
}

impl TransportResponse {
    pub fn new(status: u16, headers: Vec<(String, String)>, body: impl Read + 'static) -> Self {
        Self {
            status,
            headers,
            body: Box::new(body),
        }
    }

    /// A response whose body is already in memory.
    pub fn buffered(status: u16, body: impl Into<Bytes>) -> Self {
        Self::new(status, Vec::new(), io::Cursor::new(body.into()))
    }
}

impl fmt::Debug for TransportResponse {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TransportResponse")
            .field("status", &self.status)
            .field("headers", &self.headers)
            .finish_non_exhaustive()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum TransportErrorKind {
    Dns,
    Connect,
    Tls,
    Timeout,
    Read,
    Other,
}

impl fmt::Display for TransportErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            TransportErrorKind::Dns => "dns",
            TransportErrorKind::Connect => "connect",
            TransportErrorKind::Tls => "tls",
            TransportErrorKind::Timeout => "timeout",
            TransportErrorKind::Read => "read",
            TransportErrorKind::Other => "other",
        };
        f.write_str(text)
    }
}

/// A failure before any response was received.
#[derive(Debug, Error)]
#[error("{kind} error: {message}")]
pub struct TransportError {
    pub kind: TransportErrorKind,
    pub message: String,
    #[source]
    source: Option<BoxError>,
}

impl TransportError {
    pub fn new(kind: TransportErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(
        kind: TransportErrorKind,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self {
            kind,
            message: source.to_string(),
            source: Some(Box::new(source)),
        }
    }
}

impl From<ureq::Error> for TransportError {
    fn from(error: ureq::Error) -> Self {
        let kind = classify_ureq_error(&error);
        TransportError::with_source(kind, error)
    }
}

fn classify_ureq_error(error: &ureq::Error) -> TransportErrorKind {
    match error {
        ureq::Error::HostNotFound => TransportErrorKind::Dns,
        ureq::Error::Tls(_) => TransportErrorKind::Tls,
        ureq::Error::ConnectionFailed | ureq::Error::ConnectProxyFailed(_) => {
            TransportErrorKind::Connect
        }
        ureq::Error::Timeout(_) => TransportErrorKind::Timeout,
        ureq::Error::Io(source) => match source.kind() {
            io::ErrorKind::TimedOut | io::ErrorKind::WouldBlock => TransportErrorKind::Timeout,
            io::ErrorKind::NotFound => TransportErrorKind::Dns,
            io::ErrorKind::ConnectionRefused
            | io::ErrorKind::ConnectionAborted
            | io::ErrorKind::NotConnected
            | io::ErrorKind::AddrNotAvailable => TransportErrorKind::Connect,
            io::ErrorKind::ConnectionReset
            | io::ErrorKind::BrokenPipe
            | io::ErrorKind::UnexpectedEof => TransportErrorKind::Read,
            _ => TransportErrorKind::Other,
        },
        _ => TransportErrorKind::Other,
    }
}

/// Blocking transport backed by a `ureq` agent.
#[derive(Debug, Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }

    /// Use a preconfigured agent. It must be built with
    /// `http_status_as_error(false)` so error statuses reach the executor.
    pub fn with_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }

    fn run<S: ureq::AsSendBody>(
        &self,
        request: ureq::http::Request<S>,
        ctx: &CallContext,
    ) -> Result<TransportResponse, TransportError> {
        let mut configured = self.agent.configure_request(request);
        if let Some(remaining) = ctx.remaining() {
            configured = configured.timeout_global(Some(remaining));
        }
        let response = self.agent.run(configured.build())?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect();
        let body = response.into_body().into_reader();
        Ok(TransportResponse::new(status, headers, body))
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn send(
        &self,
        request: &PreparedRequest,
        ctx: &CallContext,
    ) -> Result<TransportResponse, TransportError> {
        let mut builder = ureq::http::Request::builder()
            .method(request.method.as_str())
            .uri(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let build_error =
            |e: ureq::http::Error| TransportError::with_source(TransportErrorKind::Other, e);
        match &request.body {
            Some(body) => {
                let http_request = builder.body(body.to_vec()).map_err(build_error)?;
                self.run(http_request, ctx)
            }
            None => {
                let http_request = builder.body(()).map_err(build_error)?;
                self.run(http_request, ctx)
            }
        }
    }
}
