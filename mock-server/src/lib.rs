//! HTTP fixture server for the dispatcher's integration tests.
//!
//! Every route is stateless. `/echo` reflects the request back as JSON so a
//! test can see exactly what went over the wire; the other routes return a
//! fixed status or body format.

use std::time::Duration;

use axum::{
    extract::Path,
    http::{header, HeaderMap, Method, StatusCode, Uri},
    response::{Html, IntoResponse, Response},
    routing::{any, get},
    Json, Router,
};
use serde::{Deserialize, Serialize};
use tokio::net::TcpListener;

/// What `/echo` saw.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Echo {
    pub method: String,
    pub path: String,
    pub query: Option<String>,
    pub content_type: Option<String>,
    pub body: String,
}

pub fn app() -> Router {
    Router::new()
        .route("/echo", any(echo))
        .route("/status/{code}", any(status))
        .route("/json", get(json_document))
        .route("/text", get(text_document))
        .route("/html", get(html_document))
        .route("/bytes", get(bytes_document))
        .route("/malformed", get(malformed_document))
        .route("/empty", get(empty_document))
        .route("/delay/{ms}", get(delayed))
}

pub async fn run(listener: TcpListener) -> Result<(), std::io::Error> {
    axum::serve(listener, app()).await
}

async fn echo(method: Method, uri: Uri, headers: HeaderMap, body: String) -> Json<Echo> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string);
    tracing::debug!(%method, %uri, "echo");
    Json(Echo {
        method: method.to_string(),
        path: uri.path().to_string(),
        query: uri.query().map(str::to_string),
        content_type,
        body,
    })
}

async fn status(Path(code): Path<u16>) -> Response {
    match StatusCode::from_u16(code) {
        Ok(code) => (code, code.canonical_reason().unwrap_or_default().to_string()).into_response(),
        Err(_) => StatusCode::BAD_REQUEST.into_response(),
    }
}

async fn json_document() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "a": 1 }))
}

async fn text_document() -> &'static str {
    "hello from peque"
}

async fn html_document() -> Html<&'static str> {
    Html("<ul id=\"series\"><li>The Rookie</li></ul>")
}

async fn bytes_document() -> impl IntoResponse {
    (
        [(header::CONTENT_TYPE, "application/octet-stream")],
        vec![0u8, 159, 146, 150, 255],
    )
}

async fn malformed_document() -> impl IntoResponse {
    ([(header::CONTENT_TYPE, "application/json")], "{\"a\": ")
}

async fn empty_document() -> StatusCode {
    StatusCode::NO_CONTENT
}

async fn delayed(Path(ms): Path<u64>) -> Json<serde_json::Value> {
    tokio::time::sleep(Duration::from_millis(ms)).await;
    Json(serde_json::json!({ "delayed_ms": ms }))
}
