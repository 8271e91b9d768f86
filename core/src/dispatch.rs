//! The request dispatcher: validate, normalize, send once, resolve once.
//!
//! # Design
//! Dispatch is split at the I/O boundary. `prepare` turns an address and a
//! `RequestConfig` into a `PreparedRequest`: a plain-data `HttpRequest` plus
//! the callbacks that will receive its result. `PreparedRequest::complete`
//! takes the transport's result, classifies it and fires exactly one
//! callback. Between the two, the caller (or the event loop) performs the
//! round-trip.
//!
//! `complete` consumes the prepared request and the callbacks are `FnOnce`,
//! so a request cannot resolve twice and a callback cannot fire twice.

use tracing::{debug, warn};

use crate::config::{ErrorCallback, RequestConfig, ResponseFormat, SuccessCallback};
use crate::error::{DispatchError, TransportError};
use crate::http::{HttpMethod, HttpRequest, HttpResponse};
use crate::payload::Payload;
use crate::transport::Transport;

/// Status text reported to the error callback when a body cannot be decoded.
pub const PARSE_ERROR_TEXT: &str = "parsererror";

/// A decoded response body.
#[derive(Debug, Clone, PartialEq)]
pub enum Body {
    Json(serde_json::Value),
    Text(String),
    Raw(Vec<u8>),
}

impl Body {
    pub fn as_json(&self) -> Option<&serde_json::Value> {
        match self {
            Body::Json(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_text(&self) -> Option<&str> {
        match self {
            Body::Text(text) => Some(text),
            _ => None,
        }
    }

    pub fn as_bytes(&self) -> Option<&[u8]> {
        match self {
            Body::Raw(bytes) => Some(bytes),
            _ => None,
        }
    }
}

/// Why a dispatched request ended on the error path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Failure {
    /// No response was received.
    Transport { message: String },
    /// The response status was outside `[200, 400)`.
    Status { status: u16, status_text: String },
    /// The status was successful but the body did not decode.
    Decode { status: u16, message: String },
}

impl Failure {
    /// Status handed to the error callback. `0` when no response arrived.
    pub fn status(&self) -> u16 {
        match self {
            Failure::Transport { .. } => 0,
            Failure::Status { status, .. } | Failure::Decode { status, .. } => *status,
        }
    }

    /// Status text handed to the error callback.
    pub fn status_text(&self) -> &str {
        match self {
            Failure::Transport { .. } => "",
            Failure::Status { status_text, .. } => status_text,
            Failure::Decode { .. } => PARSE_ERROR_TEXT,
        }
    }
}

/// Terminal state of a dispatched request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Succeeded,
    Failed(Failure),
}

impl Outcome {
    pub fn is_success(&self) -> bool {
        matches!(self, Outcome::Succeeded)
    }
}

/// The callbacks of a sent request, waiting for its result.
pub struct Completion {
    response_format: ResponseFormat,
    on_success: SuccessCallback,
    on_error: Option<ErrorCallback>,
}

impl Completion {
    pub fn response_format(&self) -> ResponseFormat {
        self.response_format
    }

    /// Classify the transport result and fire exactly one callback.
    pub fn resolve(self, result: Result<HttpResponse, TransportError>) -> Outcome {
        let failure = match result {
            Err(err) => {
                warn!(error = %err, "request failed before a response was received");
                Failure::Transport {
                    message: err.to_string(),
                }
            }
            Ok(response) if !response.is_success() => {
                debug!(status = response.status, "request completed with error status");
                Failure::Status {
                    status: response.status,
                    status_text: response.status_text,
                }
            }
            Ok(response) => match decode(self.response_format, response.body) {
                Ok(body) => {
                    debug!(status = response.status, "request succeeded");
                    (self.on_success)(body);
                    return Outcome::Succeeded;
                }
                Err(err) => {
                    warn!(status = response.status, error = %err, "response body did not decode");
                    Failure::Decode {
                        status: response.status,
                        message: err.to_string(),
                    }
                }
            },
        };

        if let Some(on_error) = self.on_error {
            on_error(failure.status(), failure.status_text().to_string());
        }
        Outcome::Failed(failure)
    }
}

/// A validated request that has not been sent yet.
pub struct PreparedRequest {
    request: HttpRequest,
    asynchronous: bool,
    completion: Completion,
}

impl PreparedRequest {
    pub fn request(&self) -> &HttpRequest {
        &self.request
    }

    pub fn is_asynchronous(&self) -> bool {
        self.asynchronous
    }

    /// Resolve with the result of sending `request()`.
    pub fn complete(self, result: Result<HttpResponse, TransportError>) -> Outcome {
        self.completion.resolve(result)
    }

    /// Separate the data that goes to the transport from the callbacks that
    /// stay with the caller.
    pub fn into_parts(self) -> (HttpRequest, Completion) {
        (self.request, self.completion)
    }
}

/// Validate and normalize a request.
///
/// Fails without side effects when the address is empty, the configuration
/// is missing, it has no success callback, or its method is not a supported
/// verb. Defaults: `GET`, asynchronous, JSON response, form content type.
pub fn prepare(url: &str, config: Option<RequestConfig>) -> Result<PreparedRequest, DispatchError> {
    if url.is_empty() {
        return Err(DispatchError::MissingUrl);
    }
    let config = config.ok_or(DispatchError::MissingOptions)?;
    let on_success = config
        .on_success
        .ok_or(DispatchError::MissingSuccessCallback)?;

    let method = match config.method.as_deref() {
        None => HttpMethod::Get,
        Some(name) => name.parse()?,
    };
    let asynchronous = config.asynchronous.unwrap_or(true);
    let response_format = config.response_format.unwrap_or_default();
    let content_type = config.content_type.resolve();

    let (url, body) = match config.payload {
        Some(payload) if method.is_read_only() => (with_query(url, &payload), None),
        payload => (url.to_string(), payload),
    };

    let mut headers = Vec::new();
    if let Some(content_type) = content_type {
        headers.push(("Content-Type".to_string(), content_type));
    }

    debug!(%method, %url, asynchronous, "prepared request");

    Ok(PreparedRequest {
        request: HttpRequest {
            method,
            url,
            headers,
            body,
        },
        asynchronous,
        completion: Completion {
            response_format,
            on_success,
            on_error: config.on_error,
        },
    })
}

/// Prepare, send through `transport` and resolve, blocking the caller.
///
/// The `asynchronous` option is ignored here: the caller asked for a
/// blocking round-trip. Use `EventLoop::ajax` to honour it.
pub fn send<T>(transport: &T, url: &str, config: Option<RequestConfig>) -> Result<Outcome, DispatchError>
where
    T: Transport + ?Sized,
{
    let prepared = prepare(url, config)?;
    let result = transport.execute(prepared.request());
    Ok(prepared.complete(result))
}

/// Append the encoded payload to `url`. An empty payload leaves the address
/// untouched; an existing query is extended with `&`. Fragments stay last.
fn with_query(url: &str, payload: &Payload) -> String {
    let query = payload.to_query_string();
    if query.is_empty() {
        return url.to_string();
    }
    let (base, fragment) = match url.split_once('#') {
        Some((base, fragment)) => (base, Some(fragment)),
        None => (url, None),
    };
    let separator = if !base.contains('?') {
        "?"
    } else if base.ends_with('?') || base.ends_with('&') {
        ""
    } else {
        "&"
    };
    let mut out = format!("{base}{separator}{query}");
    if let Some(fragment) = fragment {
        out.push('#');
        out.push_str(fragment);
    }
    out
}

/// Decode a successful body. An empty body under `Json` decodes to `null`.
fn decode(format: ResponseFormat, body: Vec<u8>) -> Result<Body, serde_json::Error> {
    match format {
        ResponseFormat::Json if body.iter().all(u8::is_ascii_whitespace) => {
            Ok(Body::Json(serde_json::Value::Null))
        }
        ResponseFormat::Json => serde_json::from_slice(&body).map(Body::Json),
        ResponseFormat::Text | ResponseFormat::Html => {
            Ok(Body::Text(String::from_utf8_lossy(&body).into_owned()))
        }
        ResponseFormat::Raw => Ok(Body::Raw(body)),
    }
}
