use std::{collections::VecDeque, sync::Arc};

use axum::{
    body::Bytes,
    extract::State,
    http::{HeaderMap, HeaderName, HeaderValue, Method, StatusCode, Uri},
    response::{IntoResponse, Response},
    Router,
};
use serde::Deserialize;
use tokio::{net::TcpListener, sync::RwLock};

/// One scripted reply.
#[derive(Clone, Debug, PartialEq, Eq, Deserialize)]
pub struct MockResponse {
    pub status: u16,
    #[serde(default)]
    pub body: String,
    #[serde(default)]
    pub headers: Vec<(String, String)>,
}

impl MockResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
            headers: Vec::new(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Parse a response script: either a JSON array of responses or a status
    /// list accepted by [`MockResponse::parse_list`].
    pub fn parse_script(raw: &str) -> Result<Vec<MockResponse>, String> {
        if raw.trim_start().starts_with('[') {
            serde_json::from_str(raw).map_err(|e| format!("invalid response script: {e}"))
        } else {
            Self::parse_list(raw)
        }
    }

    /// Parse a comma-separated status list such as `503,503,200`.
    pub fn parse_list(raw: &str) -> Result<Vec<MockResponse>, String> {
        raw.split(',')
            .map(str::trim)
            .filter(|token| !token.is_empty())
            .map(|token| {
                let status: u16 = token
                    .parse()
                    .map_err(|_| format!("invalid status code: {token}"))?;
                let reason = StatusCode::from_u16(status)
                    .ok()
                    .and_then(|code| code.canonical_reason())
                    .unwrap_or("");
                let body = if status < 400 {
                    serde_json::json!({ "status": "ok" }).to_string()
                } else {
                    serde_json::json!({
                        "errors": [{ "title": reason, "status": status.to_string() }]
                    })
                    .to_string()
                };
                Ok(MockResponse::new(status, body).with_header("content-type", "application/json"))
            })
            .collect()
    }
}

/// A request as the server received it.
#[derive(Clone, Debug)]
pub struct CapturedRequest {
    pub method: String,
    pub path: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl CapturedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }
}

/// Script and request log shared by all handlers.
///
/// Responses are served in order; once one remains it is repeated forever.
/// An empty script answers `200` with an empty body.
#[derive(Clone, Debug, Default)]
pub struct MockState {
    script: Arc<RwLock<VecDeque<MockResponse>>>,
    captured: Arc<RwLock<Vec<CapturedRequest>>>,
}

impl MockState {
    pub fn new(responses: Vec<MockResponse>) -> Self {
        Self {
            script: Arc::new(RwLock::new(responses.into())),
            captured: Arc::default(),
        }
    }

    pub async fn requests(&self) -> Vec<CapturedRequest> {
        self.captured.read().await.clone()
    }

    /// Snapshot of the request log for callers outside the runtime.
    pub fn requests_blocking(&self) -> Vec<CapturedRequest> {
        self.captured.blocking_read().clone()
    }

    async fn next_response(&self) -> MockResponse {
        let mut script = self.script.write().await;
        if script.len() > 1 {
            if let Some(response) = script.pop_front() {
                return response;
            }
        }
        script
            .front()
            .cloned()
            .unwrap_or_else(|| MockResponse::new(200, ""))
    }
}

pub fn app(state: MockState) -> Router {
    Router::new().fallback(respond).with_state(state)
}

pub async fn run(listener: TcpListener, state: MockState) -> Result<(), std::io::Error> {
    axum::serve(listener, app(state)).await
}

async fn respond(
    State(state): State<MockState>,
    method: Method,
    uri: Uri,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let captured = CapturedRequest {
        method: method.to_string(),
        path: uri
            .path_and_query()
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| uri.path().to_string()),
        headers: headers
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.as_str().to_string(), value.to_string()))
            })
            .collect(),
        body: body.to_vec(),
    };
    state.captured.write().await.push(captured);

    let scripted = state.next_response().await;
    let status =
        StatusCode::from_u16(scripted.status).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
    let mut response = (status, scripted.body).into_response();
    for (name, value) in scripted.headers {
        if let (Ok(name), Ok(value)) = (HeaderName::try_from(name), HeaderValue::try_from(value)) {
            response.headers_mut().insert(name, value);
        }
    }
    response
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_list_builds_json_bodies() {
        let responses = MockResponse::parse_list("503, 200").unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[0].status, 503);
        let body: serde_json::Value = serde_json::from_str(&responses[0].body).unwrap();
        assert_eq!(body["errors"][0]["title"], "Service Unavailable");
        assert_eq!(body["errors"][0]["status"], "503");
        let body: serde_json::Value = serde_json::from_str(&responses[1].body).unwrap();
        assert_eq!(body["status"], "ok");
    }

    #[test]
    fn parse_list_rejects_garbage() {
        assert!(MockResponse::parse_list("200,abc").is_err());
    }

    #[test]
    fn parse_list_ignores_empty_tokens() {
        let responses = MockResponse::parse_list("404,,").unwrap();
        assert_eq!(responses.len(), 1);
        assert_eq!(responses[0].status, 404);
    }

    #[test]
    fn script_accepts_json_responses() {
        let responses = MockResponse::parse_script(
            r#"[{"status":429,"body":"slow down","headers":[["retry-after","1"]]},{"status":204}]"#,
        )
        .unwrap();
        assert_eq!(
            responses,
            vec![
                MockResponse::new(429, "slow down").with_header("retry-after", "1"),
                MockResponse::new(204, ""),
            ]
        );
    }

    #[test]
    fn script_falls_back_to_status_list() {
        let responses = MockResponse::parse_script("503,200").unwrap();
        assert_eq!(responses.len(), 2);
        assert_eq!(responses[1].status, 200);
        assert!(MockResponse::parse_script("[{\"body\":\"no status\"}]").is_err());
    }
}
