//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Options arrive as a C struct whose string fields may be null, meaning
//! "not set", so the defaults of the Rust API apply unchanged. Callbacks are
//! nullable function pointers that receive the caller's `user_data` back.
//! Bodies handed to a success callback are borrowed for the duration of the
//! call only; the C side copies what it wants to keep.

use std::ffi::{c_void, CStr};
use std::os::raw::c_char;

use peque_core::{Body, DispatchError, EventLoop, UreqTransport};

/// Opaque handle to an event loop. C callers receive a pointer to this and
/// pass it back into every dispatch function.
pub struct FfiEventLoop {
    pub(crate) inner: EventLoop<UreqTransport>,
}

/// Request options. Null strings and `asynchronous == -1` mean "not set".
#[repr(C)]
pub struct FfiRequestOptions {
    /// HTTP verb, any case. Null means `GET`.
    pub method: *const c_char,
    /// Tri-state: -1 = default (asynchronous), 0 = blocking, 1 = asynchronous.
    pub asynchronous: i32,
    /// Null means the default form content type, unless
    /// `omit_content_type` is set.
    pub content_type: *const c_char,
    pub omit_content_type: bool,
    /// `json`, `text`, `html`; anything else is raw. Null means `json`.
    pub response_format: *const c_char,
    /// JSON object of scalar values, or null for no payload.
    pub payload_json: *const c_char,
}

/// Which decoding produced an `FfiBody`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiBodyKind {
    /// `data` holds compact JSON text.
    Json = 0,
    Text = 1,
    Raw = 2,
}

/// A decoded response body, borrowed for the duration of a callback.
/// `data` is not NUL-terminated; use `len`.
#[repr(C)]
pub struct FfiBody {
    pub kind: FfiBodyKind,
    pub data: *const u8,
    pub len: usize,
}

/// Called with the decoded body on success.
pub type FfiSuccessCallback = Option<extern "C" fn(user_data: *mut c_void, body: *const FfiBody)>;

/// Called with `(status, status_text)` on failure. Transport failures report
/// status 0 and an empty text.
pub type FfiErrorCallback =
    Option<extern "C" fn(user_data: *mut c_void, status: u16, status_text: *const c_char)>;

/// Shorthand callback: `body` is non-null on success and null on failure.
pub type FfiResponseCallback = Option<extern "C" fn(user_data: *mut c_void, body: *const FfiBody)>;

/// Result of a dispatch call.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiDispatchCode {
    /// Sent; the callback fires during `peque_loop_poll` or `peque_loop_run`.
    Pending = 0,
    /// Blocking request; the callback has already fired.
    Completed = 1,
    NullLoop = 2,
    MissingUrl = 3,
    MissingOptions = 4,
    MissingSuccessCallback = 5,
    UnsupportedMethod = 6,
    InvalidPayload = 7,
    InvalidString = 8,
    Panic = 9,
}

impl From<&DispatchError> for FfiDispatchCode {
    fn from(err: &DispatchError) -> Self {
        match err {
            DispatchError::MissingUrl => FfiDispatchCode::MissingUrl,
            DispatchError::MissingOptions => FfiDispatchCode::MissingOptions,
            DispatchError::MissingSuccessCallback => FfiDispatchCode::MissingSuccessCallback,
            DispatchError::UnsupportedMethod(_) => FfiDispatchCode::UnsupportedMethod,
        }
    }
}

/// A raw pointer that is only dereferenced on the thread that created it.
/// Callbacks never leave the dispatching thread, so this stays sound.
#[derive(Clone, Copy)]
pub(crate) struct UserData(pub(crate) *mut c_void);

/// Read an optional C string. `Ok(None)` for null, `Err` for invalid UTF-8.
///
/// # Safety
/// `ptr` must be null or point to a NUL-terminated string.
pub(crate) unsafe fn opt_str<'a>(ptr: *const c_char) -> Result<Option<&'a str>, FfiDispatchCode> {
    if ptr.is_null() {
        return Ok(None);
    }
    unsafe { CStr::from_ptr(ptr) }
        .to_str()
        .map(Some)
        .map_err(|_| FfiDispatchCode::InvalidString)
}

/// Call `f` with a borrowed C view of `body`.
pub(crate) fn with_ffi_body<R>(body: &Body, f: impl FnOnce(&FfiBody) -> R) -> R {
    match body {
        Body::Json(value) => {
            let text = value.to_string();
            f(&FfiBody {
                kind: FfiBodyKind::Json,
                data: text.as_ptr(),
                len: text.len(),
            })
        }
        Body::Text(text) => f(&FfiBody {
            kind: FfiBodyKind::Text,
            data: text.as_ptr(),
            len: text.len(),
        }),
        Body::Raw(bytes) => f(&FfiBody {
            kind: FfiBodyKind::Raw,
            data: bytes.as_ptr(),
            len: bytes.len(),
        }),
    }
}
