//! Error types for the request dispatcher.
//!
//! # Design
//! Two families of failure exist and they never mix. `DispatchError` covers
//! precondition failures: the request is rejected before any network call and
//! no callback fires. `TransportError` covers a round-trip that never produced
//! an HTTP response; it is routed to the error callback with status `0`.
//! Unsuccessful HTTP statuses are not errors at this level: they are ordinary
//! responses that the dispatcher classifies (see `dispatch::Failure`).

use thiserror::Error;

/// Reasons a request is rejected before it is sent.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The target address was empty.
    #[error("no target address given")]
    MissingUrl,

    /// No request configuration was supplied.
    #[error("no request configuration given")]
    MissingOptions,

    /// The configuration has no success callback.
    #[error("request configuration has no success callback")]
    MissingSuccessCallback,

    /// The method is not one of the supported HTTP verbs.
    #[error("unsupported HTTP method: {0}")]
    UnsupportedMethod(String),
}

/// A network round-trip that ended without an HTTP response.
#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request failed: {0}")]
    Ureq(#[from] ureq::Error),

    /// The request could not be described to the transport (bad URI, bad
    /// header value).
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    /// The payload could not be rendered as a request body.
    #[error("request body could not be encoded: {0}")]
    Body(#[from] serde_json::Error),

    /// Any other network failure, used by transports that are not backed by
    /// ureq.
    #[error("network error: {0}")]
    Network(String),
}
