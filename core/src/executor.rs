//! The request executor: one logical API call with bounded retries.
//!
//! # Design
//! `Executor` holds only its immutable `ExecutorConfig` and a shared
//! `Transport`, so concurrent calls on one instance need no locking. Each call
//! resolves the request URL, injects `Authorization`, `X-Originator` and
//! `X-Trace-Id`, buffers the body once, then runs the attempt loop:
//!
//! - transport and body-read failures are recorded with a synthetic 503 and
//!   retried;
//! - 5xx responses are retried;
//! - 4xx responses stop the loop at once;
//! - anything below 400 ends the loop with the response.
//!
//! Between retries the call sleeps 1, 2, 3, ... backoff units. Sleeps wake on
//! cancellation and never run past the call's deadline.

use std::io::Read;
use std::sync::Arc;

use bytes::Bytes;
use serde::de::DeserializeOwned;
use tracing::{debug, field, instrument, warn, Span};
use url::Url;

use crate::config::ExecutorConfig;
use crate::context::CallContext;
use crate::error::{AttemptError, ExecuteError};
use crate::http::{set_header, HttpRequest, HttpResponse, PreparedRequest, RequestBody};
use crate::retry::{classify, Backoff, Classification, SERVICE_UNAVAILABLE};
use crate::transport::{Transport, TransportResponse};
use crate::types::ApiErrors;

pub const AUTHORIZATION_HEADER: &str = "Authorization";
pub const ORIGINATOR_HEADER: &str = "X-Originator";
pub const TRACE_ID_HEADER: &str = "X-Trace-Id";

/// Executes prepared requests against a transport with bounded retries.
#[derive(Clone)]
pub struct Executor {
    config: ExecutorConfig,
    transport: Arc<dyn Transport>,
}

/// Result of a single attempt.
enum Attempt {
    Delivered(HttpResponse),
    Failed {
        status: u16,
        error: AttemptError,
        retryable: bool,
    },
}

/// A successful response and the number of sends it took.
struct Delivered {
    attempts: u32,
    response: HttpResponse,
}

impl Executor {
    pub fn new(config: ExecutorConfig, transport: impl Transport + 'static) -> Self {
        Self::with_shared_transport(config, Arc::new(transport))
    }

    pub fn with_shared_transport(config: ExecutorConfig, transport: Arc<dyn Transport>) -> Self {
        Self { config, transport }
    }

    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Execute `request` and decode a successful JSON body into `T`.
    ///
    /// A body that does not decode is returned as `ExecuteError::Decode`
    /// without retrying.
    pub fn execute<T: DeserializeOwned>(
        &self,
        ctx: &CallContext,
        request: HttpRequest,
    ) -> Result<T, ExecuteError> {
        let Delivered { attempts, response } = self.run(ctx, request)?;
        serde_json::from_slice(&response.body).map_err(|source| ExecuteError::Decode {
            attempts,
            status: response.status,
            source,
        })
    }

    /// Execute `request` for an endpoint with no response payload.
    pub fn execute_empty(
        &self,
        ctx: &CallContext,
        request: HttpRequest,
    ) -> Result<(), ExecuteError> {
        self.run(ctx, request).map(|_| ())
    }

    /// Execute `request` and return the successful response undecoded.
    pub fn execute_raw(
        &self,
        ctx: &CallContext,
        request: HttpRequest,
    ) -> Result<HttpResponse, ExecuteError> {
        self.run(ctx, request).map(|delivered| delivered.response)
    }

    #[instrument(
        name = "api_request",
        skip_all,
        fields(
            http.method = %request.method,
            http.url = field::Empty,
            http.status_code = field::Empty,
            attempts = field::Empty,
        )
    )]
    fn run(&self, ctx: &CallContext, request: HttpRequest) -> Result<Delivered, ExecuteError> {
        let prepared = self.prepare(ctx, request)?;
        Span::current().record("http.url", prepared.url.as_str());

        let total_attempts = self.config.total_attempts();
        let mut backoff = Backoff::new(self.config.backoff_unit);
        let mut attempts = 0;
        let mut last: Option<(u16, AttemptError)> = None;

        loop {
            if ctx.is_done() {
                return Err(cancelled(attempts, last));
            }
            attempts += 1;
            debug!(attempt = attempts, total_attempts, "sending request");

            let (status, error, retryable) = match self.attempt(&prepared, ctx) {
                Attempt::Delivered(response) => {
                    let span = Span::current();
                    span.record("http.status_code", response.status);
                    span.record("attempts", attempts);
                    debug!(attempt = attempts, status = response.status, "request succeeded");
                    return Ok(Delivered { attempts, response });
                }
                Attempt::Failed {
                    status,
                    error,
                    retryable,
                } => (status, error, retryable),
            };

            if !retryable || attempts >= total_attempts {
                let span = Span::current();
                span.record("http.status_code", status);
                span.record("attempts", attempts);
                debug!(attempt = attempts, status, retryable, error = %error, "giving up");
                return Err(ExecuteError::Failed {
                    attempts,
                    status,
                    source: error,
                });
            }

            let delay = backoff.next_delay();
            warn!(
                attempt = attempts,
                status,
                delay_ms = delay.as_millis() as u64,
                error = %error,
                "attempt failed, retrying after backoff"
            );
            last = Some((status, error));
            if !ctx.wait(delay) {
                return Err(cancelled(attempts, last));
            }
        }
    }

    fn prepare(
        &self,
        ctx: &CallContext,
        request: HttpRequest,
    ) -> Result<PreparedRequest, ExecuteError> {
        let url = resolve_url(self.config.base_url.as_deref(), &request.url)?;

        let mut headers = request.headers;
        if let Some(credential) = &self.config.credential {
            set_header(
                &mut headers,
                AUTHORIZATION_HEADER.to_string(),
                credential.expose().to_string(),
            );
        }
        if let Some(originator) = &self.config.originator {
            set_header(&mut headers, ORIGINATOR_HEADER.to_string(), originator.clone());
        }
        if let Some(trace_id) = ctx.trace_id() {
            set_header(&mut headers, TRACE_ID_HEADER.to_string(), trace_id.to_string());
        }

        let body = request
            .body
            .map(RequestBody::into_bytes)
            .transpose()
            .map_err(ExecuteError::RequestBody)?;

        Ok(PreparedRequest {
            method: request.method,
            url,
            headers,
            body,
        })
    }

    fn attempt(&self, request: &PreparedRequest, ctx: &CallContext) -> Attempt {
        let response = match self.transport.send(request, ctx) {
            Ok(response) => response,
            Err(err) => {
                return Attempt::Failed {
                    status: SERVICE_UNAVAILABLE,
                    error: AttemptError::Transport(err),
                    retryable: true,
                }
            }
        };
        let response = match read_response(response) {
            Ok(response) => response,
            Err(err) => {
                return Attempt::Failed {
                    status: SERVICE_UNAVAILABLE,
                    error: AttemptError::BodyRead(err),
                    retryable: true,
                }
            }
        };

        match classify(response.status) {
            Classification::Success => Attempt::Delivered(response),
            classification => Attempt::Failed {
                status: response.status,
                error: decode_error(&response),
                retryable: classification == Classification::Retryable,
            },
        }
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

/// Read the whole body. The stream is dropped, and so closed, on return.
fn read_response(mut response: TransportResponse) -> std::io::Result<HttpResponse> {
    let mut body = Vec::new();
    response.body.read_to_end(&mut body)?;
    Ok(HttpResponse {
        status: response.status,
        headers: response.headers,
        body: Bytes::from(body),
    })
}

fn decode_error(response: &HttpResponse) -> AttemptError {
    match ApiErrors::parse(&response.body) {
        Some(errors) => AttemptError::Api {
            status: response.status,
            errors,
        },
        None => AttemptError::Raw {
            status: response.status,
            body: response.text().into_owned(),
        },
    }
}

fn cancelled(attempts: u32, last: Option<(u16, AttemptError)>) -> ExecuteError {
    let (status, last) = match last {
        Some((status, error)) => (Some(status), Some(error)),
        None => (None, None),
    };
    ExecuteError::Cancelled {
        attempts,
        status,
        last,
    }
}

/// Resolve `target` against `base`. Targets carrying a scheme are used as-is,
/// provided the scheme is `http` or `https`.
fn resolve_url(base: Option<&str>, target: &str) -> Result<String, ExecuteError> {
    let target = target.trim();
    if target.is_empty() {
        return Err(ExecuteError::InvalidRequest("request url is empty".to_string()));
    }

    match Url::parse(target) {
        Ok(url) => return check_http_scheme(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => {}
        Err(e) => {
            return Err(ExecuteError::InvalidRequest(format!(
                "invalid url `{target}`: {e}"
            )));
        }
    }

    match base.map(str::trim).filter(|base| !base.is_empty()) {
        Some(base) => parse_http_url(&format!(
            "{}/{}",
            base.trim_end_matches('/'),
            target.trim_start_matches('/')
        )),
        None => Err(ExecuteError::InvalidRequest(format!(
            "relative url `{target}` requires a base address"
        ))),
    }
}

fn parse_http_url(raw: &str) -> Result<String, ExecuteError> {
    let url = Url::parse(raw)
        .map_err(|e| ExecuteError::InvalidRequest(format!("invalid url `{raw}`: {e}")))?;
    check_http_scheme(url)
}

fn check_http_scheme(url: Url) -> Result<String, ExecuteError> {
    match url.scheme() {
        "http" | "https" => Ok(url.into()),
        scheme => Err(ExecuteError::InvalidRequest(format!(
            "unsupported url scheme `{scheme}`"
        ))),
    }
}
