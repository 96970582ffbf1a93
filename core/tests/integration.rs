//! Executor behavior over real HTTP against the scripted mock server.
//!
//! # Design
//! Each test starts the mock server on a random port with its own response
//! script, runs the executor through `UreqTransport`, then inspects what the
//! server actually received.

use std::time::Duration;

use executor_core::{
    AttemptError, CallContext, Credential, ExecuteError, Executor, ExecutorConfig, HttpRequest,
    UreqTransport,
};
use mock_server::{MockResponse, MockState};
use serde::{Deserialize, Serialize};

#[derive(Debug, Deserialize)]
struct Status {
    status: String,
}

#[derive(Debug, Serialize)]
struct CreateTodo<'a> {
    title: &'a str,
    completed: bool,
}

/// Start the mock server on a random port and return its base URL.
fn start(responses: Vec<MockResponse>) -> (String, MockState) {
    let std_listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    let addr = std_listener.local_addr().unwrap();
    std_listener.set_nonblocking(true).unwrap();

    let state = MockState::new(responses);
    let server_state = state.clone();
    std::thread::spawn(move || {
        let rt = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()
            .unwrap();
        rt.block_on(async {
            let listener = tokio::net::TcpListener::from_std(std_listener).unwrap();
            mock_server::run(listener, server_state).await
        })
        .unwrap();
    });

    (format!("http://{addr}"), state)
}

fn executor(base_url: &str, retry_count: u32) -> Executor {
    let config = ExecutorConfig::new(base_url)
        .with_retry_count(retry_count)
        .with_backoff_unit(Duration::from_millis(5));
    Executor::new(config, UreqTransport::new())
}

#[test]
fn retries_server_errors_until_success() {
    let (base_url, state) = start(vec![
        MockResponse::new(503, "busy"),
        MockResponse::new(502, "bad gateway"),
        MockResponse::new(200, r#"{"status":"ok"}"#),
    ]);
    let input = CreateTodo {
        title: "Integration test",
        completed: false,
    };
    let request = HttpRequest::post("/todos").with_json(&input).unwrap();

    let status: Status = executor(&base_url, 2)
        .execute(&CallContext::new(), request)
        .unwrap();
    assert_eq!(status.status, "ok");

    let requests = state.requests_blocking();
    assert_eq!(requests.len(), 3);
    for captured in &requests {
        assert_eq!(captured.method, "POST");
        assert_eq!(captured.path, "/todos");
        assert_eq!(captured.body, requests[0].body);
    }
    let body: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
    assert_eq!(body["title"], "Integration test");
}

#[test]
fn persistent_503_exhausts_every_attempt() {
    let (base_url, state) = start(vec![MockResponse::new(503, "still busy")]);

    let err = executor(&base_url, 3)
        .execute::<Status>(&CallContext::new(), HttpRequest::get("/status"))
        .unwrap_err();

    assert_eq!(state.requests_blocking().len(), 4);
    assert!(err.to_string().contains("4 attempts"), "{err}");
    assert_eq!(err.status(), Some(503));
}

#[test]
fn not_found_is_returned_without_retry() {
    let (base_url, state) = start(vec![MockResponse::new(404, "todo 7 does not exist")]);

    let err = executor(&base_url, 1)
        .execute::<Status>(&CallContext::new(), HttpRequest::get("/todos/7"))
        .unwrap_err();

    assert_eq!(state.requests_blocking().len(), 1);
    assert_eq!(err.status(), Some(404));
    match err.last_attempt() {
        Some(AttemptError::Raw { status: 404, body }) => {
            assert_eq!(body, "todo 7 does not exist");
        }
        other => panic!("unexpected cause: {other:?}"),
    }
}

#[test]
fn structured_error_body_is_decoded() {
    let (base_url, _state) = start(MockResponse::parse_list("422").unwrap());

    let err = executor(&base_url, 0)
        .execute_empty(&CallContext::new(), HttpRequest::post("/todos"))
        .unwrap_err();

    let errors = err.api_errors().unwrap();
    assert_eq!(errors.errors[0].title.as_deref(), Some("Unprocessable Entity"));
    assert_eq!(errors.errors[0].status.as_deref(), Some("422"));
}

#[test]
fn single_attempt_success() {
    let (base_url, state) = start(vec![MockResponse::new(200, r#"{"status":"ok"}"#)]);

    let status: Status = executor(&base_url, 0)
        .execute(&CallContext::new(), HttpRequest::get("/status"))
        .unwrap();

    assert_eq!(status.status, "ok");
    assert_eq!(state.requests_blocking().len(), 1);
}

#[test]
fn injected_headers_reach_the_server() {
    let (base_url, state) = start(vec![MockResponse::new(204, "")]);
    let config = ExecutorConfig::new(&base_url)
        .with_credential(Credential::bearer("secret-token"))
        .with_originator("integration-suite");
    let exec = Executor::new(config, UreqTransport::new());
    let ctx = CallContext::new().with_trace_id("trace-abc");

    exec.execute_empty(&ctx, HttpRequest::delete("/todos/1"))
        .unwrap();

    let requests = state.requests_blocking();
    let captured = &requests[0];
    assert_eq!(captured.method, "DELETE");
    assert_eq!(captured.header("authorization"), Some("Bearer secret-token"));
    assert_eq!(captured.header("x-originator"), Some("integration-suite"));
    assert_eq!(captured.header("x-trace-id"), Some("trace-abc"));
}

#[test]
fn non_json_success_is_a_decode_error() {
    let (base_url, state) = start(vec![MockResponse::new(200, "<html>maintenance</html>")]);

    let err = executor(&base_url, 2)
        .execute::<Status>(&CallContext::new(), HttpRequest::get("/status"))
        .unwrap_err();

    assert!(matches!(err, ExecuteError::Decode { attempts: 1, status: 200, .. }));
    assert_eq!(state.requests_blocking().len(), 1);
}

#[test]
fn unreachable_server_is_a_transport_failure() {
    // Bind then drop to find a port nobody listens on.
    let addr = std::net::TcpListener::bind("127.0.0.1:0")
        .unwrap()
        .local_addr()
        .unwrap();

    let err = executor(&format!("http://{addr}"), 1)
        .execute_empty(&CallContext::new(), HttpRequest::get("/status"))
        .unwrap_err();

    assert_eq!(err.attempts(), 2);
    assert_eq!(err.status(), Some(503));
    assert!(matches!(
        err,
        ExecuteError::Failed {
            source: AttemptError::Transport(_),
            ..
        }
    ));
}
