//! Local axum server shared by the integration tests

use std::net::SocketAddr;
use std::time::Duration;

use axum::body::{Body, Bytes};
use axum::http::{HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{any, get};
use axum::Router;

async fn ok() -> impl IntoResponse {
    ([("x-server", "test")], "hello")
}

async fn unavailable() -> impl IntoResponse {
    (StatusCode::SERVICE_UNAVAILABLE, "try later")
}

async fn slow() -> &'static str {
    tokio::time::sleep(Duration::from_secs(3)).await;
    "finally"
}

async fn echo(headers: HeaderMap, body: Bytes) -> impl IntoResponse {
    let custom = headers
        .get("x-custom")
        .and_then(|v| v.to_str().ok())
        .unwrap_or("")
        .to_string();
    ([("x-echo-custom", custom)], body)
}

async fn stream() -> Body {
    let chunks = ["data: one\n\n", "data: two\n\n", "data: [DONE]\n\n"]
        .into_iter()
        .map(Ok::<_, std::convert::Infallible>);
    Body::from_stream(futures::stream::iter(chunks))
}

/// Start the test server on an ephemeral port
pub async fn spawn_server() -> SocketAddr {
    let app = Router::new()
        .route("/ok", get(ok))
        .route("/unavailable", get(unavailable))
        .route("/slow", get(slow))
        .route("/echo", any(echo))
        .route("/stream", get(stream));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    addr
}

/// An address with nothing listening on it
pub async fn closed_port() -> SocketAddr {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    addr
}
