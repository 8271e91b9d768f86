//! Single-shot HTTP request dispatcher with success/error callbacks.
//!
//! # Overview
//! Give it a target address and a `RequestConfig`; it normalizes defaults,
//! serializes the payload, sends exactly one request and invokes exactly one
//! of the configured callbacks with the result.
//!
//! # Design
//! - `prepare` and `PreparedRequest::complete` are pure: the request exists
//!   as plain data (`HttpRequest`) before any I/O, and a result is classified
//!   without I/O. Hosts that do their own networking drive these directly.
//! - `Transport` is the single I/O seam; `UreqTransport` is the blocking
//!   production implementation.
//! - `send` performs one blocking round-trip. `EventLoop` honours the
//!   `asynchronous` option and fires callbacks when its owner drains it.
//! - Precondition failures are `DispatchError` values; nothing in this crate
//!   panics on bad input.

pub mod config;
pub mod dispatch;
pub mod error;
pub mod event_loop;
pub mod http;
pub mod payload;
pub mod transport;

pub use config::{ContentType, RequestConfig, ResponseFormat, DEFAULT_CONTENT_TYPE};
pub use dispatch::{prepare, send, Body, Completion, Failure, Outcome, PreparedRequest};
pub use error::{DispatchError, TransportError};
pub use event_loop::{EventLoop, RequestId, Ticket};
pub use http::{HttpMethod, HttpRequest, HttpResponse};
pub use payload::{Payload, Scalar};
pub use transport::{Transport, UreqTransport};
