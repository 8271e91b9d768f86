//! C-ABI wrapper around `peque-core`.
//!
//! # Overview
//! Exposes the request dispatcher through `extern "C"` functions so any
//! language with a C FFI can send requests and receive exactly one callback
//! per request, without linking to Rust's threading or serde directly.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - The caller owns an `FfiEventLoop` handle. Asynchronous requests resolve
//!   onto it and their callbacks fire inside `peque_loop_poll` or
//!   `peque_loop_run`, on the caller's thread.
//! - Precondition failures come back as an `FfiDispatchCode` and fire no
//!   callback, mirroring `DispatchError` one to one.
//! - Nothing is returned that the caller must free except the loop itself.

pub mod types;

use std::ffi::{c_void, CString};
use std::os::raw::c_char;
use std::panic::{catch_unwind, AssertUnwindSafe};

use peque_core::{Body, DispatchError, EventLoop, Payload, RequestConfig, ResponseFormat, Ticket, UreqTransport};

use types::*;

// ---------------------------------------------------------------------------
// Loop lifecycle
// ---------------------------------------------------------------------------

/// Create an event loop backed by a blocking HTTP agent.
///
/// Returns null if an internal panic occurs.
/// The caller must free the returned pointer with `peque_loop_free`.
#[unsafe(no_mangle)]
pub extern "C" fn peque_loop_new() -> *mut FfiEventLoop {
    catch_unwind(|| {
        let event_loop = FfiEventLoop {
            inner: EventLoop::new(UreqTransport::new()),
        };
        Box::into_raw(Box::new(event_loop))
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a loop created by `peque_loop_new`. Safe to call with null.
///
/// Callbacks of requests still pending are dropped without firing.
#[unsafe(no_mangle)]
pub extern "C" fn peque_loop_free(event_loop: *mut FfiEventLoop) {
    if !event_loop.is_null() {
        let _ = catch_unwind(AssertUnwindSafe(|| {
            drop(unsafe { Box::from_raw(event_loop) });
        }));
    }
}

// ---------------------------------------------------------------------------
// Dispatch
// ---------------------------------------------------------------------------

/// Dispatch one request.
///
/// `url` null or empty yields `MissingUrl`, `options` null yields
/// `MissingOptions`, and `on_success` null yields `MissingSuccessCallback`;
/// none of these touch the network. `on_error` may be null, in which case
/// failures are dropped. `user_data` is passed back to whichever callback
/// fires.
#[unsafe(no_mangle)]
pub extern "C" fn peque_ajax(
    event_loop: *mut FfiEventLoop,
    url: *const c_char,
    options: *const FfiRequestOptions,
    on_success: FfiSuccessCallback,
    on_error: FfiErrorCallback,
    user_data: *mut c_void,
) -> FfiDispatchCode {
    catch_unwind(AssertUnwindSafe(|| {
        if event_loop.is_null() {
            return FfiDispatchCode::NullLoop;
        }
        let event_loop = unsafe { &mut (*event_loop).inner };
        let url = match unsafe { opt_str(url) } {
            Ok(url) => url.unwrap_or(""),
            Err(code) => return code,
        };
        let config = if options.is_null() {
            None
        } else {
            match build_config(unsafe { &*options }) {
                Ok(config) => Some(with_callbacks(config, on_success, on_error, UserData(user_data))),
                Err(code) => return code,
            }
        };
        to_code(event_loop.ajax(url, config))
    }))
    .unwrap_or(FfiDispatchCode::Panic)
}

/// `GET` shorthand. `payload_json` may be null. `callback` receives a body
/// on success and null on failure; it may itself be null.
#[unsafe(no_mangle)]
pub extern "C" fn peque_get(
    event_loop: *mut FfiEventLoop,
    url: *const c_char,
    payload_json: *const c_char,
    callback: FfiResponseCallback,
    user_data: *mut c_void,
) -> FfiDispatchCode {
    catch_unwind(AssertUnwindSafe(|| {
        if event_loop.is_null() {
            return FfiDispatchCode::NullLoop;
        }
        let event_loop = unsafe { &mut (*event_loop).inner };
        let url = match unsafe { opt_str(url) } {
            Ok(url) => url.unwrap_or(""),
            Err(code) => return code,
        };
        let payload = match unsafe { opt_payload(payload_json) } {
            Ok(payload) => payload,
            Err(code) => return code,
        };
        let user_data = UserData(user_data);
        to_code(event_loop.get(url, payload, move |body| respond(callback, user_data, body)))
    }))
    .unwrap_or(FfiDispatchCode::Panic)
}

/// `POST` shorthand. Unlike `peque_get`, the payload and the callback are
/// both required.
#[unsafe(no_mangle)]
pub extern "C" fn peque_post(
    event_loop: *mut FfiEventLoop,
    url: *const c_char,
    payload_json: *const c_char,
    callback: FfiResponseCallback,
    user_data: *mut c_void,
) -> FfiDispatchCode {
    catch_unwind(AssertUnwindSafe(|| {
        if event_loop.is_null() {
            return FfiDispatchCode::NullLoop;
        }
        let event_loop = unsafe { &mut (*event_loop).inner };
        let url = match unsafe { opt_str(url) } {
            Ok(Some(url)) if !url.is_empty() => url,
            Ok(_) => return FfiDispatchCode::MissingUrl,
            Err(code) => return code,
        };
        let payload = match unsafe { opt_payload(payload_json) } {
            Ok(Some(payload)) => payload,
            Ok(None) => return FfiDispatchCode::MissingOptions,
            Err(code) => return code,
        };
        if callback.is_none() {
            return FfiDispatchCode::MissingSuccessCallback;
        }
        let user_data = UserData(user_data);
        to_code(event_loop.post(url, payload, move |body| respond(callback, user_data, body)))
    }))
    .unwrap_or(FfiDispatchCode::Panic)
}

// ---------------------------------------------------------------------------
// Driving the loop
// ---------------------------------------------------------------------------

/// Fire the callbacks of requests that have already resolved. Never blocks.
/// Returns how many callbacks fired.
#[unsafe(no_mangle)]
pub extern "C" fn peque_loop_poll(event_loop: *mut FfiEventLoop) -> u32 {
    catch_unwind(AssertUnwindSafe(|| {
        if event_loop.is_null() {
            return 0;
        }
        let event_loop = unsafe { &mut (*event_loop).inner };
        event_loop.poll().len() as u32
    }))
    .unwrap_or(0)
}

/// Block until every pending request has resolved and its callback fired.
/// Returns how many callbacks fired.
#[unsafe(no_mangle)]
pub extern "C" fn peque_loop_run(event_loop: *mut FfiEventLoop) -> u32 {
    catch_unwind(AssertUnwindSafe(|| {
        if event_loop.is_null() {
            return 0;
        }
        let event_loop = unsafe { &mut (*event_loop).inner };
        event_loop.run().len() as u32
    }))
    .unwrap_or(0)
}

/// Number of requests sent but not yet resolved.
#[unsafe(no_mangle)]
pub extern "C" fn peque_loop_pending(event_loop: *const FfiEventLoop) -> u32 {
    if event_loop.is_null() {
        return 0;
    }
    catch_unwind(AssertUnwindSafe(|| unsafe { &*event_loop }.inner.pending() as u32)).unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn to_code(result: Result<Ticket, DispatchError>) -> FfiDispatchCode {
    match result {
        Ok(Ticket::Pending(_)) => FfiDispatchCode::Pending,
        Ok(Ticket::Completed(_)) => FfiDispatchCode::Completed,
        Err(err) => FfiDispatchCode::from(&err),
    }
}

/// Translate C options into a `RequestConfig` without callbacks.
fn build_config(options: &FfiRequestOptions) -> Result<RequestConfig, FfiDispatchCode> {
    let mut config = RequestConfig::new();
    if let Some(method) = unsafe { opt_str(options.method) }? {
        config = config.method(method);
    }
    match options.asynchronous {
        0 => config = config.asynchronous(false),
        1 => config = config.asynchronous(true),
        _ => {}
    }
    if options.omit_content_type {
        config = config.omit_content_type();
    } else if let Some(content_type) = unsafe { opt_str(options.content_type) }? {
        config = config.content_type(content_type);
    }
    if let Some(format) = unsafe { opt_str(options.response_format) }? {
        let format: ResponseFormat = format.parse().unwrap_or_default();
        config = config.response_format(format);
    }
    if let Some(payload) = unsafe { opt_payload(options.payload_json) }? {
        config = config.payload(payload);
    }
    Ok(config)
}

/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
unsafe fn opt_payload(ptr: *const c_char) -> Result<Option<Payload>, FfiDispatchCode> {
    match unsafe { opt_str(ptr) }? {
        None => Ok(None),
        Some(json) => Payload::from_json_str(json)
            .map(Some)
            .map_err(|_| FfiDispatchCode::InvalidPayload),
    }
}

fn with_callbacks(
    mut config: RequestConfig,
    on_success: FfiSuccessCallback,
    on_error: FfiErrorCallback,
    user_data: UserData,
) -> RequestConfig {
    if let Some(on_success) = on_success {
        config = config.on_success(move |body: Body| {
            with_ffi_body(&body, |ffi_body| on_success(user_data.0, ffi_body));
        });
    }
    if let Some(on_error) = on_error {
        config = config.on_error(move |status, status_text| {
            let status_text = CString::new(status_text).unwrap_or_default();
            on_error(user_data.0, status, status_text.as_ptr());
        });
    }
    config
}

fn respond(callback: FfiResponseCallback, user_data: UserData, body: Option<Body>) {
    let Some(callback) = callback else {
        return;
    };
    match body {
        Some(body) => with_ffi_body(&body, |ffi_body| callback(user_data.0, ffi_body)),
        None => callback(user_data.0, std::ptr::null()),
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
