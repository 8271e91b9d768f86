//! Per-request configuration.
//!
//! A `RequestConfig` is built fresh for every call and consumed by it. Every
//! option is optional; defaults are filled in when the request is prepared,
//! not here, so the builder records exactly what the caller asked for.

use std::fmt;
use std::str::FromStr;

use crate::dispatch::Body;
use crate::payload::Payload;

/// Content type sent when the caller does not choose one.
pub const DEFAULT_CONTENT_TYPE: &str = "application/x-www-form-urlencoded; charset=UTF-8";

/// Invoked with the decoded body when the request succeeds.
pub type SuccessCallback = Box<dyn FnOnce(Body)>;

/// Invoked with `(status, status_text)` when the request fails. Transport
/// failures report status `0` and an empty text.
pub type ErrorCallback = Box<dyn FnOnce(u16, String)>;

/// Content-type policy for a request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum ContentType {
    /// Use `DEFAULT_CONTENT_TYPE`.
    #[default]
    Default,
    Custom(String),
    /// Send no content-type header at all.
    Omitted,
}

impl ContentType {
    pub(crate) fn resolve(self) -> Option<String> {
        match self {
            ContentType::Default => Some(DEFAULT_CONTENT_TYPE.to_string()),
            ContentType::Custom(value) => Some(value),
            ContentType::Omitted => None,
        }
    }
}

/// How the response body is decoded before it reaches the success callback.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum ResponseFormat {
    #[default]
    Json,
    Text,
    Html,
    /// Untouched bytes.
    Raw,
}

impl FromStr for ResponseFormat {
    type Err = std::convert::Infallible;

    /// Unknown names fall back to `Raw`.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s.to_ascii_lowercase().as_str() {
            "json" => ResponseFormat::Json,
            "text" => ResponseFormat::Text,
            "html" => ResponseFormat::Html,
            _ => ResponseFormat::Raw,
        })
    }
}

/// Options for a single request.
#[derive(Default)]
pub struct RequestConfig {
    pub(crate) method: Option<String>,
    pub(crate) asynchronous: Option<bool>,
    pub(crate) content_type: ContentType,
    pub(crate) response_format: Option<ResponseFormat>,
    pub(crate) payload: Option<Payload>,
    pub(crate) on_success: Option<SuccessCallback>,
    pub(crate) on_error: Option<ErrorCallback>,
}

impl RequestConfig {
    pub fn new() -> Self {
        Self::default()
    }

    /// HTTP verb, any case. Defaults to `GET`.
    pub fn method(mut self, method: impl Into<String>) -> Self {
        self.method = Some(method.into());
        self
    }

    /// Whether the request resolves later on the event loop (`true`, the
    /// default) or blocks the caller until it resolves.
    ///
    /// Blocking requests stall the calling thread for the whole round-trip
    /// and are discouraged.
    pub fn asynchronous(mut self, asynchronous: bool) -> Self {
        self.asynchronous = Some(asynchronous);
        self
    }

    pub fn content_type(mut self, content_type: impl Into<String>) -> Self {
        self.content_type = ContentType::Custom(content_type.into());
        self
    }

    /// Send no content-type header.
    pub fn omit_content_type(mut self) -> Self {
        self.content_type = ContentType::Omitted;
        self
    }

    pub fn response_format(mut self, format: ResponseFormat) -> Self {
        self.response_format = Some(format);
        self
    }

    pub fn payload(mut self, payload: Payload) -> Self {
        self.payload = Some(payload);
        self
    }

    pub fn on_success<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(Body) + 'static,
    {
        self.on_success = Some(Box::new(callback));
        self
    }

    pub fn on_error<F>(mut self, callback: F) -> Self
    where
        F: FnOnce(u16, String) + 'static,
    {
        self.on_error = Some(Box::new(callback));
        self
    }
}

impl fmt::Debug for RequestConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RequestConfig")
            .field("method", &self.method)
            .field("asynchronous", &self.asynchronous)
            .field("content_type", &self.content_type)
            .field("response_format", &self.response_format)
            .field("payload", &self.payload)
            .field("on_success", &self.on_success.is_some())
            .field("on_error", &self.on_error.is_some())
            .finish()
    }
}
