//! Asynchronous dispatch onto a caller-owned queue.
//!
//! # Design
//! An asynchronous request sends its `HttpRequest` to a short-lived worker
//! thread and keeps its callbacks here, keyed by `RequestId`. The worker posts
//! the transport result back over a channel. Callbacks only fire when the
//! owner drains the queue with `poll` or `run`, so they always run on the
//! thread that dispatched them and never need to be `Send`.
//!
//! Synchronous requests bypass the queue: they block, fire their callback
//! and return the outcome directly.

use std::cell::Cell;
use std::collections::HashMap;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::rc::Rc;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Arc;
use std::thread;

use tracing::{debug, warn};

use crate::config::RequestConfig;
use crate::dispatch::{self, Body, Completion, Outcome};
use crate::error::{DispatchError, TransportError};
use crate::http::HttpResponse;
use crate::payload::Payload;
use crate::transport::Transport;

/// Identifies an asynchronous request until it resolves.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RequestId(u64);

impl fmt::Display for RequestId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// What `EventLoop::ajax` hands back.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Ticket {
    /// Sent; the callback fires on a later `poll` or `run`.
    Pending(RequestId),
    /// Synchronous request, already resolved.
    Completed(Outcome),
}

type Resolution = (RequestId, Result<HttpResponse, TransportError>);

/// Owns a transport and the queue asynchronous requests resolve onto.
pub struct EventLoop<T: Transport + 'static> {
    transport: Arc<T>,
    sender: Sender<Resolution>,
    receiver: Receiver<Resolution>,
    pending: HashMap<RequestId, Completion>,
    next_id: u64,
}

impl<T: Transport + 'static> EventLoop<T> {
    pub fn new(transport: T) -> Self {
        let (sender, receiver) = mpsc::channel();
        Self {
            transport: Arc::new(transport),
            sender,
            receiver,
            pending: HashMap::new(),
            next_id: 0,
        }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Number of requests sent but not yet resolved.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    /// Dispatch one request.
    ///
    /// Precondition failures return `Err` without touching the network.
    /// Otherwise an asynchronous request returns `Ticket::Pending` at once,
    /// and a synchronous one blocks and returns `Ticket::Completed`.
    pub fn ajax(&mut self, url: &str, config: Option<RequestConfig>) -> Result<Ticket, DispatchError> {
        let prepared = dispatch::prepare(url, config)?;

        if !prepared.is_asynchronous() {
            let result = self.transport.execute(prepared.request());
            return Ok(Ticket::Completed(prepared.complete(result)));
        }

        let id = RequestId(self.next_id);
        self.next_id += 1;

        let (request, completion) = prepared.into_parts();
        let transport = Arc::clone(&self.transport);
        let sender = self.sender.clone();
        let spawned = thread::Builder::new()
            .name(format!("peque-request-{id}"))
            .spawn(move || {
                // A panicking transport still has to resolve its request.
                let result = catch_unwind(AssertUnwindSafe(|| transport.execute(&request)))
                    .unwrap_or_else(|_| Err(TransportError::Network("transport panicked".to_string())));
                // The loop may have been dropped; nobody is left to notify.
                let _ = sender.send((id, result));
            });

        if let Err(err) = spawned {
            warn!(%id, error = %err, "could not start request worker");
            // The receiver lives in `self`, so this send cannot fail.
            let _ = self
                .sender
                .send((id, Err(TransportError::Network(err.to_string()))));
        }

        debug!(%id, "request pending");
        self.pending.insert(id, completion);
        Ok(Ticket::Pending(id))
    }

    /// Shorthand for a `GET` request with an optional payload.
    ///
    /// `callback` receives `Some(body)` on success and `None` on any failure.
    pub fn get<F>(&mut self, url: &str, payload: Option<Payload>, callback: F) -> Result<Ticket, DispatchError>
    where
        F: FnOnce(Option<Body>) + 'static,
    {
        let mut config = RequestConfig::new().method("GET");
        if let Some(payload) = payload {
            config = config.payload(payload);
        }
        self.ajax(url, Some(with_shared_callback(config, callback)))
    }

    /// Shorthand for a `POST` request. Same callback contract as `get`.
    pub fn post<F>(&mut self, url: &str, payload: Payload, callback: F) -> Result<Ticket, DispatchError>
    where
        F: FnOnce(Option<Body>) + 'static,
    {
        let config = RequestConfig::new().method("POST").payload(payload);
        self.ajax(url, Some(with_shared_callback(config, callback)))
    }

    /// Fire the callbacks of every request that has resolved so far, without
    /// blocking.
    pub fn poll(&mut self) -> Vec<(RequestId, Outcome)> {
        let mut fired = Vec::new();
        while let Ok((id, result)) = self.receiver.try_recv() {
            if let Some(outcome) = self.resolve(id, result) {
                fired.push((id, outcome));
            }
        }
        fired
    }

    /// Block until every pending request has resolved, firing callbacks in
    /// completion order.
    pub fn run(&mut self) -> Vec<(RequestId, Outcome)> {
        let mut fired = Vec::new();
        while !self.pending.is_empty() {
            let Ok((id, result)) = self.receiver.recv() else {
                break;
            };
            if let Some(outcome) = self.resolve(id, result) {
                fired.push((id, outcome));
            }
        }
        fired
    }

    fn resolve(&mut self, id: RequestId, result: Result<HttpResponse, TransportError>) -> Option<Outcome> {
        let Some(completion) = self.pending.remove(&id) else {
            warn!(%id, "resolution for unknown request");
            return None;
        };
        Some(completion.resolve(result))
    }
}

impl<T: Transport + Default + 'static> Default for EventLoop<T> {
    fn default() -> Self {
        Self::new(T::default())
    }
}

/// Wire one callback to both terminal paths. Only one path runs, so the
/// callback is taken out exactly once.
fn with_shared_callback<F>(config: RequestConfig, callback: F) -> RequestConfig
where
    F: FnOnce(Option<Body>) + 'static,
{
    let slot = Rc::new(Cell::new(Some(callback)));
    let on_error = Rc::clone(&slot);
    config
        .on_success(move |body| {
            if let Some(callback) = slot.take() {
                callback(Some(body));
            }
        })
        .on_error(move |_, _| {
            if let Some(callback) = on_error.take() {
                callback(None);
            }
        })
}
