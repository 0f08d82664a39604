//! HttpTransport against a local server

mod common;

use std::time::Duration;

use qpsbench_core::{FailureKind, Request, Transport, TransportError};
use qpsbench_transport::{HttpTransport, HttpTransportConfig};

fn transport() -> HttpTransport {
    HttpTransport::new(HttpTransportConfig::default().with_connect_timeout(Duration::from_secs(2)))
        .unwrap()
}

#[tokio::test]
async fn test_get_returns_complete_response() {
    let addr = common::spawn_server().await;
    let request = Request::new(format!("http://{addr}/ok"), Duration::from_secs(5));

    let response = transport().execute(&request).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, b"hello");
    assert_eq!(response.headers["x-server"], "test");
}

#[tokio::test]
async fn test_error_status_is_still_a_response() {
    let addr = common::spawn_server().await;
    let request = Request::new(format!("http://{addr}/unavailable"), Duration::from_secs(5));

    let response = transport().execute(&request).await.unwrap();
    assert_eq!(response.status, 503);
    assert_eq!(response.body, b"try later");
}

#[tokio::test]
async fn test_method_headers_and_body_are_sent() {
    let addr = common::spawn_server().await;
    let request = Request::new(format!("http://{addr}/echo"), Duration::from_secs(5))
        .with_method("PUT")
        .with_header("x-custom", "42")
        .with_body(r#"{"k":1}"#);

    let response = transport().execute(&request).await.unwrap();
    assert_eq!(response.status, 200);
    assert_eq!(response.body, br#"{"k":1}"#);
    assert_eq!(response.headers["x-echo-custom"], "42");
}

#[tokio::test]
async fn test_streamed_body_is_fully_consumed() {
    let addr = common::spawn_server().await;
    let request = Request::new(format!("http://{addr}/stream"), Duration::from_secs(5));

    let response = transport().execute(&request).await.unwrap();
    let body = String::from_utf8(response.body).unwrap();
    assert!(body.starts_with("data: one"));
    assert!(body.ends_with("data: [DONE]\n\n"));
}

#[tokio::test]
async fn test_timeout_is_classified() {
    let addr = common::spawn_server().await;
    let request = Request::new(format!("http://{addr}/slow"), Duration::from_millis(200));

    let err = transport().execute(&request).await.unwrap_err();
    assert_eq!(err, TransportError::Timeout(Duration::from_millis(200)));
    assert_eq!(err.to_failure_kind(), FailureKind::Timeout);
}

#[tokio::test]
async fn test_connection_refused_is_classified() {
    let addr = common::closed_port().await;
    let request = Request::new(format!("http://{addr}/ok"), Duration::from_secs(5));

    let err = transport().execute(&request).await.unwrap_err();
    assert_eq!(err.to_failure_kind(), FailureKind::ConnectError, "{err}");
}

#[tokio::test]
async fn test_invalid_url_is_protocol_error() {
    let request = Request::new("not a url", Duration::from_secs(1));
    let err = transport().execute(&request).await.unwrap_err();
    assert_eq!(err.to_failure_kind(), FailureKind::ProtocolError, "{err}");
}
