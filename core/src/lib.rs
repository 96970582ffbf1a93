//! Request execution core for generated REST API clients.
//!
//! # Overview
//! Generated endpoint code prepares an `HttpRequest` and hands it to an
//! `Executor` together with the type to decode into. The executor attaches
//! credentials and tracing metadata, sends the request through an injected
//! `Transport` with bounded retries and linear backoff, and returns either the
//! decoded value or an `ExecuteError`.
//!
//! # Design
//! - `Executor` is immutable after construction and safe to share between
//!   threads; the transport is the only shared resource.
//! - Classification (`retry::classify`) and the backoff schedule
//!   (`retry::Backoff`) are pure and tested on their own.
//! - Trace ids, deadlines and cancellation travel in an explicit
//!   `CallContext` rather than ambient state.
//! - Request bodies are buffered once so every attempt sends identical bytes.

pub mod config;
pub mod context;
pub mod error;
pub mod executor;
pub mod http;
pub mod retry;
pub mod transport;
pub mod types;

pub use config::{Credential, ExecutorConfig};
pub use context::{CallContext, CancellationToken};
pub use error::{AttemptError, ExecuteError};
pub use executor::{Executor, AUTHORIZATION_HEADER, ORIGINATOR_HEADER, TRACE_ID_HEADER};
pub use http::{HttpMethod, HttpRequest, HttpResponse, PreparedRequest, RequestBody};
pub use retry::{classify, Backoff, Classification};
pub use transport::{Transport, TransportError, TransportErrorKind, TransportResponse, UreqTransport};
pub use types::{ApiErrorEntry, ApiErrors};
