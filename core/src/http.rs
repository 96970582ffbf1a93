//! HTTP request and response types exchanged with callers and transports.
//!
//! # Design
//! Requests and responses are plain data. Generated endpoint code builds an
//! `HttpRequest`; the executor resolves its URL, injects metadata and buffers
//! the body into a `PreparedRequest`, which is what a `Transport` sees on every
//! attempt. Because the prepared body is an immutable `Bytes`, each attempt
//! replays exactly the same payload.
//!
//! Headers are kept as an ordered list of `(name, value)` pairs. Lookups and
//! replacements are case-insensitive on the name.

use std::borrow::Cow;
use std::fmt;
use std::io::{self, Read};

use bytes::Bytes;
use serde::Serialize;

use crate::error::ExecuteError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HttpMethod {
    Get,
    Post,
    Put,
    Patch,
    Delete,
    Head,
}

impl HttpMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
        }
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Body of an outbound request.
///
/// A `Reader` body can only be consumed once; the executor drains it before
/// the first attempt so retries can replay it.
pub enum RequestBody {
    Bytes(Bytes),
    Reader(Box<dyn Read + Send>),
}

impl RequestBody {
    pub(crate) fn into_bytes(self) -> io::Result<Bytes> {
        match self {
            RequestBody::Bytes(bytes) => Ok(bytes),
            RequestBody::Reader(mut reader) => {
                let mut buffer = Vec::new();
                reader.read_to_end(&mut buffer)?;
                Ok(Bytes::from(buffer))
            }
        }
    }
}

impl fmt::Debug for RequestBody {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RequestBody::Bytes(bytes) => f.debug_tuple("Bytes").field(&bytes.len()).finish(),
            RequestBody::Reader(_) => f.write_str("Reader(..)"),
        }
    }
}

/// An outbound HTTP request as prepared by endpoint code.
///
/// `url` is either absolute (`http://` / `https://`) or a path resolved
/// against the executor's base address.
#[derive(Debug)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<RequestBody>,
}

impl HttpRequest {
    pub fn new(method: HttpMethod, url: impl Into<String>) -> Self {
        Self {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
        }
    }

    pub fn get(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Get, url)
    }

    pub fn post(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Post, url)
    }

    pub fn put(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Put, url)
    }

    pub fn patch(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Patch, url)
    }

    pub fn delete(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Delete, url)
    }

    pub fn head(url: impl Into<String>) -> Self {
        Self::new(HttpMethod::Head, url)
    }

    /// Set a header, replacing any existing header with the same name.
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        set_header(&mut self.headers, name.into(), value.into());
        self
    }

    pub fn with_body(mut self, body: impl Into<Bytes>) -> Self {
        self.body = Some(RequestBody::Bytes(body.into()));
        self
    }

    /// Use a one-shot reader as the body. It is drained once, before the
    /// first attempt.
    pub fn with_reader(mut self, reader: impl Read + Send + 'static) -> Self {
        self.body = Some(RequestBody::Reader(Box::new(reader)));
        self
    }

    /// Serialize `value` as the JSON body and set `content-type`.
    pub fn with_json<T: Serialize + ?Sized>(self, value: &T) -> Result<Self, ExecuteError> {
        let body = serde_json::to_vec(value).map_err(ExecuteError::Serialization)?;
        Ok(self
            .with_header("content-type", "application/json")
            .with_body(body))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// A request ready to be sent: URL resolved, metadata injected, body buffered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PreparedRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
}

impl PreparedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }
}

/// A fully read HTTP response.
#[derive(Debug, Clone)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Bytes,
}

impl HttpResponse {
    pub fn header(&self, name: &str) -> Option<&str> {
        find_header(&self.headers, name)
    }

    /// Body as text, replacing invalid UTF-8 sequences.
    pub fn text(&self) -> Cow<'_, str> {
        String::from_utf8_lossy(&self.body)
    }
}

pub(crate) fn find_header<'a>(headers: &'a [(String, String)], name: &str) -> Option<&'a str> {
    headers
        .iter()
        .find(|(key, _)| key.eq_ignore_ascii_case(name))
        .map(|(_, value)| value.as_str())
}

pub(crate) fn set_header(headers: &mut Vec<(String, String)>, name: String, value: String) {
    headers.retain(|(key, _)| !key.eq_ignore_ascii_case(&name));
    headers.push((name, value));
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn with_header_replaces_case_insensitively() {
        let req = HttpRequest::get("/todos")
            .with_header("Authorization", "Bearer a")
            .with_header("authorization", "Bearer b");
        assert_eq!(req.headers, vec![("authorization".to_string(), "Bearer b".to_string())]);
        assert_eq!(req.header("AUTHORIZATION"), Some("Bearer b"));
    }

    #[test]
    fn with_json_sets_content_type_and_body() {
        let req = HttpRequest::post("/todos")
            .with_json(&serde_json::json!({"title": "Buy milk"}))
            .unwrap();
        assert_eq!(req.method, HttpMethod::Post);
        assert_eq!(req.header("content-type"), Some("application/json"));
        let body = match req.body {
            Some(RequestBody::Bytes(bytes)) => bytes,
            other => panic!("unexpected body: {other:?}"),
        };
        let value: serde_json::Value = serde_json::from_slice(&body).unwrap();
        assert_eq!(value["title"], "Buy milk");
    }

    #[test]
    fn reader_body_is_drained_into_bytes() {
        let body = RequestBody::Reader(Box::new(io::Cursor::new(b"payload".to_vec())));
        assert_eq!(body.into_bytes().unwrap(), Bytes::from_static(b"payload"));
    }

    #[test]
    fn response_text_is_lossy() {
        let response = HttpResponse {
            status: 200,
            headers: vec![("Content-Type".to_string(), "text/plain".to_string())],
            body: Bytes::from_static(b"ok\xff"),
        };
        assert_eq!(response.text(), "ok\u{fffd}");
        assert_eq!(response.header("content-type"), Some("text/plain"));
    }

    #[test]
    fn method_display_matches_wire_name() {
        assert_eq!(HttpMethod::Patch.to_string(), "PATCH");
        assert_eq!(HttpMethod::Delete.as_str(), "DELETE");
    }

    #[test]
    fn constructors_set_method() {
        let cases = [
            (HttpRequest::get("/t"), HttpMethod::Get),
            (HttpRequest::post("/t"), HttpMethod::Post),
            (HttpRequest::put("/t"), HttpMethod::Put),
            (HttpRequest::patch("/t"), HttpMethod::Patch),
            (HttpRequest::delete("/t"), HttpMethod::Delete),
            (HttpRequest::head("/t"), HttpMethod::Head),
        ];
        for (request, method) in cases {
            assert_eq!(request.method, method);
            assert_eq!(request.url, "/t");
            assert!(request.body.is_none());
        }
        assert_eq!(HttpMethod::Head.as_str(), "HEAD");
    }
}
