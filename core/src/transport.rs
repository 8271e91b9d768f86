//! The seam between plain-data requests and the network.
//!
//! # Design
//! `Transport` performs exactly one round-trip per call and reports either an
//! `HttpResponse` (any status, 4xx/5xx included) or a `TransportError` when no
//! response arrived. It never retries and never interprets the status; that
//! is the dispatcher's job. Implementations must be `Send + Sync` because the
//! event loop runs asynchronous requests on worker threads.

use tracing::debug;

use crate::error::TransportError;
use crate::http::{HttpRequest, HttpResponse};
use crate::payload::Payload;

/// Executes one HTTP round-trip.
pub trait Transport: Send + Sync {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError>;
}

/// Render a payload for the wire: a JSON object when the content type names
/// JSON, form encoding otherwise.
pub fn render_body(payload: &Payload, content_type: Option<&str>) -> Result<String, TransportError> {
    let wants_json = content_type
        .map(|ct| ct.to_ascii_lowercase().contains("json"))
        .unwrap_or(false);
    if wants_json {
        Ok(serde_json::to_string(payload)?)
    } else {
        Ok(payload.to_query_string())
    }
}

/// Blocking transport backed by a `ureq::Agent`.
#[derive(Clone)]
pub struct UreqTransport {
    agent: ureq::Agent,
}

impl UreqTransport {
    /// Build an agent that returns 4xx/5xx responses as data rather than as
    /// errors, so status interpretation stays with the dispatcher.
    pub fn new() -> Self {
        let agent = ureq::Agent::config_builder()
            .http_status_as_error(false)
            .build()
            .new_agent();
        Self { agent }
    }

    /// Use a caller-configured agent. It should have `http_status_as_error`
    /// disabled, otherwise error statuses surface as transport failures.
    pub fn with_agent(agent: ureq::Agent) -> Self {
        Self { agent }
    }
}

impl Default for UreqTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl Transport for UreqTransport {
    fn execute(&self, request: &HttpRequest) -> Result<HttpResponse, TransportError> {
        debug!(method = %request.method, url = %request.url, "sending request");

        let mut builder = ureq::http::Request::builder()
            .method(request.method.as_str())
            .uri(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = match &request.body {
            Some(payload) => {
                let body = render_body(payload, request.content_type())?;
                let request = builder
                    .body(body)
                    .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
                self.agent.run(request)?
            }
            None => {
                let request = builder
                    .body(())
                    .map_err(|e| TransportError::InvalidRequest(e.to_string()))?;
                self.agent.run(request)?
            }
        };

        into_response(response)
    }
}

fn into_response(
    mut response: ureq::http::Response<ureq::Body>,
) -> Result<HttpResponse, TransportError> {
    let status = response.status();
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
    let body = response.body_mut().read_to_vec()?;

    Ok(HttpResponse {
        status: status.as_u16(),
        status_text: status.canonical_reason().unwrap_or("").to_string(),
        headers,
        body,
    })
}
