//! `#[repr(C)]` types for the FFI boundary.
//!
//! # Design
//! Handles wrap core values opaquely; everything the library hands back is a
//! plain C struct made of C strings, integers and pointer/length arrays.
//! Arrays are allocated as boxed slices so `dweb_free_result` can release
//! them with the exact length they were created with.

use std::ffi::{c_void, CString};
use std::os::raw::c_char;

use dynaweb_core::{Response, ResponseStatus, WebError};

/// Opaque handle to a `Client`.
pub struct FfiClient {
    pub(crate) inner: dynaweb_core::Client,
}

/// Opaque handle to a `Request`.
pub struct FfiRequest {
    pub(crate) inner: dynaweb_core::Request,
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Error codes returned by setters and in `FfiWebResult`.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiErrorCode {
    Ok = 0,
    InvalidArgument = 1,
    InvalidUrl = 2,
    LocalUriRejected = 3,
    MalformedUrl = 4,
    InvalidOperation = 5,
    DuplicateParameter = 6,
    NullRequest = 7,
    Network = 8,
    Timeout = 9,
    Aborted = 10,
    Deserialization = 11,
    Serialization = 12,
    DepthExceeded = 13,
    Panic = 14,
    NullArg = 15,
}

impl From<&WebError> for FfiErrorCode {
    fn from(err: &WebError) -> Self {
        match err {
            WebError::InvalidArgument(_) => FfiErrorCode::InvalidArgument,
            WebError::InvalidUrl { .. } => FfiErrorCode::InvalidUrl,
            WebError::LocalUriRejected(_) => FfiErrorCode::LocalUriRejected,
            WebError::MalformedUrl(_) => FfiErrorCode::MalformedUrl,
            WebError::InvalidOperation(_) => FfiErrorCode::InvalidOperation,
            WebError::DuplicateParameter { .. } => FfiErrorCode::DuplicateParameter,
            WebError::NullRequest => FfiErrorCode::NullRequest,
            WebError::Network(_) => FfiErrorCode::Network,
            WebError::Timeout(_) => FfiErrorCode::Timeout,
            WebError::Aborted(_) => FfiErrorCode::Aborted,
            WebError::Deserialization(_) => FfiErrorCode::Deserialization,
            WebError::Serialization(_) => FfiErrorCode::Serialization,
            WebError::DepthExceeded { .. } => FfiErrorCode::DepthExceeded,
        }
    }
}

/// Tag that tells `dweb_free_result` what `FfiWebResult::data` points to.
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiDataTag {
    None = 0,
    Response = 1,
    /// `data` is a NUL-terminated string.
    Text = 2,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FfiResponseStatus {
    None = 0,
    Completed = 1,
    Error = 2,
    TimedOut = 3,
    Aborted = 4,
}

impl From<ResponseStatus> for FfiResponseStatus {
    fn from(s: ResponseStatus) -> Self {
        match s {
            ResponseStatus::None => FfiResponseStatus::None,
            ResponseStatus::Completed => FfiResponseStatus::Completed,
            ResponseStatus::Error => FfiResponseStatus::Error,
            ResponseStatus::TimedOut => FfiResponseStatus::TimedOut,
            ResponseStatus::Aborted => FfiResponseStatus::Aborted,
        }
    }
}

#[repr(C)]
pub struct FfiHeader {
    pub name: *mut c_char,
    pub value: *mut c_char,
}

#[repr(C)]
pub struct FfiCookie {
    pub name: *mut c_char,
    pub value: *mut c_char,
    /// RFC 3339.
    pub timestamp: *mut c_char,
}

/// Snapshot of a `Response`. Optional strings are null when absent.
#[repr(C)]
pub struct FfiResponse {
    pub status_code: u16,
    pub status_description: *mut c_char,
    pub response_status: FfiResponseStatus,
    pub content: *mut c_char,
    pub content_type: *mut c_char,
    pub content_length: u64,
    pub content_encoding: *mut c_char,
    pub response_uri: *mut c_char,
    pub server: *mut c_char,
    pub error_message: *mut c_char,
    pub headers: *mut FfiHeader,
    pub headers_len: u32,
    pub cookies: *mut FfiCookie,
    pub cookies_len: u32,
    pub elapsed_ms: u64,
}

impl FfiResponse {
    fn from_core(resp: &Response) -> Self {
        let (headers, headers_len) = into_raw_array(
            resp.headers()
                .iter()
                .map(|(name, value)| FfiHeader {
                    name: to_c_string(name),
                    value: to_c_string(value),
                })
                .collect(),
        );
        let (cookies, cookies_len) = into_raw_array(
            resp.cookie_rows()
                .into_iter()
                .map(|[name, value, timestamp]| FfiCookie {
                    name: to_c_string(&name),
                    value: to_c_string(&value),
                    timestamp: to_c_string(&timestamp),
                })
                .collect(),
        );
        FfiResponse {
            status_code: resp.status_code(),
            status_description: to_c_string(resp.status_description()),
            response_status: resp.response_status().into(),
            content: to_c_string(resp.content()),
            content_type: opt_c_string(resp.content_type()),
            content_length: resp.content_length(),
            content_encoding: opt_c_string(resp.content_encoding()),
            response_uri: to_c_string(resp.response_uri()),
            server: opt_c_string(resp.server()),
            error_message: opt_c_string(resp.error_message()),
            headers,
            headers_len,
            cookies,
            cookies_len,
            elapsed_ms: resp.elapsed().as_millis() as u64,
        }
    }

    /// Release every allocation owned by `self` (but not `self`).
    ///
    /// # Safety
    /// `self` must have been built by `from_core` and not freed before.
    pub(crate) unsafe fn free_fields(&mut self) {
        for s in [
            self.status_description,
            self.content,
            self.content_type,
            self.content_encoding,
            self.response_uri,
            self.server,
            self.error_message,
        ] {
            free_c_string(s);
        }
        for h in from_raw_array(self.headers, self.headers_len).iter() {
            free_c_string(h.name);
            free_c_string(h.value);
        }
        for c in from_raw_array(self.cookies, self.cookies_len).iter() {
            free_c_string(c.name);
            free_c_string(c.value);
            free_c_string(c.timestamp);
        }
    }
}

/// Result envelope for execution and text-producing calls.
///
/// On success `error_code` is `Ok`, `error_message` is null and `data`
/// points to the payload tagged by `data_tag`. On failure `data` is null.
#[repr(C)]
pub struct FfiWebResult {
    pub error_code: FfiErrorCode,
    pub error_message: *mut c_char,
    pub data_tag: FfiDataTag,
    pub data: *mut c_void,
}

impl FfiWebResult {
    fn boxed(error_code: FfiErrorCode, message: Option<&str>, data_tag: FfiDataTag, data: *mut c_void) -> *mut Self {
        Box::into_raw(Box::new(FfiWebResult {
            error_code,
            error_message: opt_c_string(message),
            data_tag,
            data,
        }))
    }

    pub(crate) fn ok_response(resp: &Response) -> *mut Self {
        let data = Box::into_raw(Box::new(FfiResponse::from_core(resp)));
        Self::boxed(FfiErrorCode::Ok, None, FfiDataTag::Response, data as *mut c_void)
    }

    pub(crate) fn ok_text(text: &str) -> *mut Self {
        Self::boxed(FfiErrorCode::Ok, None, FfiDataTag::Text, to_c_string(text) as *mut c_void)
    }

    pub(crate) fn from_error(err: &WebError) -> *mut Self {
        Self::boxed(err.into(), Some(&err.to_string()), FfiDataTag::None, std::ptr::null_mut())
    }

    pub(crate) fn null_arg(name: &str) -> *mut Self {
        let msg = format!("null argument: {name}");
        Self::boxed(FfiErrorCode::NullArg, Some(&msg), FfiDataTag::None, std::ptr::null_mut())
    }

    pub(crate) fn panic(msg: &str) -> *mut Self {
        Self::boxed(FfiErrorCode::Panic, Some(msg), FfiDataTag::None, std::ptr::null_mut())
    }
}

// ---------------------------------------------------------------------------
// Allocation helpers
// ---------------------------------------------------------------------------

/// Heap C string for `s`. Interior NUL bytes are dropped.
pub(crate) fn to_c_string(s: &str) -> *mut c_char {
    let bytes: Vec<u8> = s.bytes().filter(|&b| b != 0).collect();
    CString::new(bytes).unwrap_or_default().into_raw()
}

pub(crate) fn opt_c_string(s: Option<&str>) -> *mut c_char {
    s.map_or(std::ptr::null_mut(), to_c_string)
}

/// # Safety
/// `s` must be null or come from `to_c_string`.
pub(crate) unsafe fn free_c_string(s: *mut c_char) {
    if !s.is_null() {
        drop(unsafe { CString::from_raw(s) });
    }
}

fn into_raw_array<T>(items: Vec<T>) -> (*mut T, u32) {
    if items.is_empty() {
        return (std::ptr::null_mut(), 0);
    }
    let len = items.len() as u32;
    (Box::into_raw(items.into_boxed_slice()) as *mut T, len)
}

/// # Safety
/// `ptr`/`len` must come from `into_raw_array` and not be freed twice.
unsafe fn from_raw_array<T>(ptr: *mut T, len: u32) -> Box<[T]> {
    if ptr.is_null() || len == 0 {
        return Box::new([]);
    }
    unsafe { Box::from_raw(std::ptr::slice_from_raw_parts_mut(ptr, len as usize)) }
}
