//! C-ABI wrapper around `dynaweb-core`.
//!
//! # Overview
//! Exposes clients, requests and execution through `extern "C"` functions so
//! a host application with a C FFI can configure and run HTTP calls without
//! knowing anything about Rust types.
//!
//! # Design
//! - Every `extern "C"` function wraps its body in `catch_unwind` so panics
//!   never cross the FFI boundary.
//! - Clients and requests are opaque handles; enum-valued settings (method,
//!   parameter kind, data format) are passed as strings and parsed by core.
//! - Setters return an `FfiErrorCode`; execution and text-producing calls
//!   return a heap-allocated `FfiWebResult` envelope.
//! - The C caller owns all returned pointers and must call the matching
//!   `dweb_*_free` / `dweb_free_*` function to release them.

pub mod types;

use std::ffi::CStr;
use std::os::raw::c_char;
use std::panic::catch_unwind;
use std::sync::OnceLock;
use std::time::Duration;

use dynaweb_core::{json, Client, ClientConfig, DataFormat, Executor, ParameterKind, Request, WebError};

use types::*;

/// Shared so agents and their connections are reused across calls.
fn executor() -> &'static Executor {
    static EXECUTOR: OnceLock<Executor> = OnceLock::new();
    EXECUTOR.get_or_init(Executor::new)
}

/// Read a C string; `None` for null. Invalid UTF-8 is replaced.
fn read(ptr: *const c_char) -> Option<String> {
    if ptr.is_null() {
        return None;
    }
    Some(unsafe { CStr::from_ptr(ptr) }.to_string_lossy().into_owned())
}

fn code(result: Result<(), WebError>) -> FfiErrorCode {
    match result {
        Ok(()) => FfiErrorCode::Ok,
        Err(e) => FfiErrorCode::from(&e),
    }
}

// ---------------------------------------------------------------------------
// Client lifecycle
// ---------------------------------------------------------------------------

/// Create a `Client` for `base_url`. `token` may be null.
///
/// Returns null if `base_url` is null or not an absolute http/https URL.
/// The caller must free the returned pointer with `dweb_client_free`.
#[unsafe(no_mangle)]
pub extern "C" fn dweb_client_new(base_url: *const c_char, token: *const c_char) -> *mut FfiClient {
    catch_unwind(|| {
        let Some(url) = read(base_url) else {
            return std::ptr::null_mut();
        };
        let token = read(token).unwrap_or_default();
        match Client::new(&url, &token) {
            Ok(client) => Box::into_raw(Box::new(FfiClient { inner: client })),
            Err(_) => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Create a `Client` from a JSON `ClientConfig`. Returns null on any error.
#[unsafe(no_mangle)]
pub extern "C" fn dweb_client_from_config(config_json: *const c_char) -> *mut FfiClient {
    catch_unwind(|| {
        let Some(json) = read(config_json) else {
            return std::ptr::null_mut();
        };
        match ClientConfig::from_json(&json).and_then(|c| Client::from_config(&c)) {
            Ok(client) => Box::into_raw(Box::new(FfiClient { inner: client })),
            Err(_) => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a `Client` handle. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn dweb_client_free(client: *mut FfiClient) {
    if !client.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(client) });
        });
    }
}

#[unsafe(no_mangle)]
pub extern "C" fn dweb_client_set_user_agent(client: *mut FfiClient, user_agent: *const c_char) -> FfiErrorCode {
    catch_unwind(|| {
        if client.is_null() || user_agent.is_null() {
            return FfiErrorCode::NullArg;
        }
        let client = unsafe { &mut *client };
        let ua = read(user_agent).unwrap_or_default();
        code(client.inner.set_user_agent(&ua).map(|_| ()))
    })
    .unwrap_or(FfiErrorCode::Panic)
}

#[unsafe(no_mangle)]
pub extern "C" fn dweb_client_set_timeout_ms(client: *mut FfiClient, timeout_ms: u64) -> FfiErrorCode {
    catch_unwind(|| {
        if client.is_null() {
            return FfiErrorCode::NullArg;
        }
        let client = unsafe { &mut *client };
        code(client.inner.set_timeout(Duration::from_millis(timeout_ms)).map(|_| ()))
    })
    .unwrap_or(FfiErrorCode::Panic)
}

#[unsafe(no_mangle)]
pub extern "C" fn dweb_client_set_follow_redirects(client: *mut FfiClient, follow: bool) -> FfiErrorCode {
    catch_unwind(|| {
        if client.is_null() {
            return FfiErrorCode::NullArg;
        }
        let client = unsafe { &mut *client };
        client.inner.set_follow_redirects(follow);
        FfiErrorCode::Ok
    })
    .unwrap_or(FfiErrorCode::Panic)
}

#[unsafe(no_mangle)]
pub extern "C" fn dweb_client_set_max_redirects(client: *mut FfiClient, max: u32) -> FfiErrorCode {
    catch_unwind(|| {
        if client.is_null() {
            return FfiErrorCode::NullArg;
        }
        let client = unsafe { &mut *client };
        code(client.inner.set_max_redirects(max).map(|_| ()))
    })
    .unwrap_or(FfiErrorCode::Panic)
}

#[unsafe(no_mangle)]
pub extern "C" fn dweb_client_set_json_root(client: *mut FfiClient, root: *const c_char) -> FfiErrorCode {
    catch_unwind(|| {
        if client.is_null() || root.is_null() {
            return FfiErrorCode::NullArg;
        }
        let client = unsafe { &mut *client };
        let root = read(root).unwrap_or_default();
        code(client.inner.set_json_root_override(&root).map(|_| ()))
    })
    .unwrap_or(FfiErrorCode::Panic)
}

// ---------------------------------------------------------------------------
// Request lifecycle
// ---------------------------------------------------------------------------

/// Create a GET `Request` for an absolute URL. Returns null on failure.
#[unsafe(no_mangle)]
pub extern "C" fn dweb_request_new(url: *const c_char) -> *mut FfiRequest {
    catch_unwind(|| {
        let Some(url) = read(url) else {
            return std::ptr::null_mut();
        };
        match Request::new(&url) {
            Ok(req) => Box::into_raw(Box::new(FfiRequest { inner: req })),
            Err(_) => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Create a GET `Request` for a resource relative to a client's base URL.
#[unsafe(no_mangle)]
pub extern "C" fn dweb_request_by_endpoint(resource: *const c_char) -> *mut FfiRequest {
    catch_unwind(|| {
        let Some(resource) = read(resource) else {
            return std::ptr::null_mut();
        };
        match Request::by_endpoint(&resource) {
            Ok(req) => Box::into_raw(Box::new(FfiRequest { inner: req })),
            Err(_) => std::ptr::null_mut(),
        }
    })
    .unwrap_or(std::ptr::null_mut())
}

/// Free a `Request` handle. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn dweb_request_free(request: *mut FfiRequest) {
    if !request.is_null() {
        let _ = catch_unwind(|| {
            drop(unsafe { Box::from_raw(request) });
        });
    }
}

/// Set the method by name (`"GET"`, `"post"`, `"MERGE"`, ...).
#[unsafe(no_mangle)]
pub extern "C" fn dweb_request_set_method(request: *mut FfiRequest, method: *const c_char) -> FfiErrorCode {
    catch_unwind(|| {
        if request.is_null() || method.is_null() {
            return FfiErrorCode::NullArg;
        }
        let request = unsafe { &mut *request };
        let method = read(method).unwrap_or_default();
        code(method.parse().and_then(|m| request.inner.set_method(m).map(|_| ())))
    })
    .unwrap_or(FfiErrorCode::Panic)
}

/// Set the body format by name (`"json"` or `"xml"`).
#[unsafe(no_mangle)]
pub extern "C" fn dweb_request_set_format(request: *mut FfiRequest, format: *const c_char) -> FfiErrorCode {
    catch_unwind(|| {
        if request.is_null() || format.is_null() {
            return FfiErrorCode::NullArg;
        }
        let request = unsafe { &mut *request };
        let format = read(format).unwrap_or_default();
        code(format.parse::<DataFormat>().map(|f| {
            request.inner.set_request_format(f);
        }))
    })
    .unwrap_or(FfiErrorCode::Panic)
}

#[unsafe(no_mangle)]
pub extern "C" fn dweb_request_set_force_security_protocol(request: *mut FfiRequest, force: bool) -> FfiErrorCode {
    catch_unwind(|| {
        if request.is_null() {
            return FfiErrorCode::NullArg;
        }
        let request = unsafe { &mut *request };
        request.inner.set_force_security_protocol(force);
        FfiErrorCode::Ok
    })
    .unwrap_or(FfiErrorCode::Panic)
}

/// Add a parameter; `kind` names a parameter kind (`"Header"`,
/// `"QueryString"`, `"GetOrPost"`, `"UrlSegment"`, `"Cookie"`, `"Body"`).
#[unsafe(no_mangle)]
pub extern "C" fn dweb_request_add_parameter(
    request: *mut FfiRequest,
    name: *const c_char,
    value: *const c_char,
    kind: *const c_char,
) -> FfiErrorCode {
    catch_unwind(|| {
        if request.is_null() || name.is_null() || value.is_null() || kind.is_null() {
            return FfiErrorCode::NullArg;
        }
        let request = unsafe { &mut *request };
        let (name, value, kind) = (
            read(name).unwrap_or_default(),
            read(value).unwrap_or_default(),
            read(kind).unwrap_or_default(),
        );
        code(
            kind.parse::<ParameterKind>()
                .and_then(|k| request.inner.add_parameter(&name, value, k).map(|_| ())),
        )
    })
    .unwrap_or(FfiErrorCode::Panic)
}

#[unsafe(no_mangle)]
pub extern "C" fn dweb_request_add_header(
    request: *mut FfiRequest,
    name: *const c_char,
    value: *const c_char,
) -> FfiErrorCode {
    catch_unwind(|| {
        if request.is_null() || name.is_null() || value.is_null() {
            return FfiErrorCode::NullArg;
        }
        let request = unsafe { &mut *request };
        let name = read(name).unwrap_or_default();
        let value = read(value).unwrap_or_default();
        code(request.inner.add_header(&name, value).map(|_| ()))
    })
    .unwrap_or(FfiErrorCode::Panic)
}

/// Attach `json` (any JSON text) as the request body.
#[unsafe(no_mangle)]
pub extern "C" fn dweb_request_add_json_body(request: *mut FfiRequest, json: *const c_char) -> FfiErrorCode {
    catch_unwind(|| {
        if request.is_null() || json.is_null() {
            return FfiErrorCode::NullArg;
        }
        let request = unsafe { &mut *request };
        let text = read(json).unwrap_or_default();
        code(
            serde_json::from_str::<serde_json::Value>(&text)
                .map_err(|e| WebError::Deserialization(e.to_string()))
                .and_then(|value| request.inner.add_json_body(&value).map(|_| ())),
        )
    })
    .unwrap_or(FfiErrorCode::Panic)
}

/// Serialize the JSON document `json` as XML under the element `root`.
#[unsafe(no_mangle)]
pub extern "C" fn dweb_request_add_xml_body(
    request: *mut FfiRequest,
    root: *const c_char,
    json: *const c_char,
) -> FfiErrorCode {
    catch_unwind(|| {
        if request.is_null() || root.is_null() || json.is_null() {
            return FfiErrorCode::NullArg;
        }
        let request = unsafe { &mut *request };
        let root = read(root).unwrap_or_default();
        let text = read(json).unwrap_or_default();
        code(
            serde_json::from_str::<serde_json::Value>(&text)
                .map_err(|e| WebError::Deserialization(e.to_string()))
                .and_then(|value| request.inner.add_xml_body_with_root(&root, &value).map(|_| ())),
        )
    })
    .unwrap_or(FfiErrorCode::Panic)
}

#[unsafe(no_mangle)]
pub extern "C" fn dweb_request_add_raw_body(
    request: *mut FfiRequest,
    content: *const c_char,
    content_type: *const c_char,
) -> FfiErrorCode {
    catch_unwind(|| {
        if request.is_null() || content.is_null() || content_type.is_null() {
            return FfiErrorCode::NullArg;
        }
        let request = unsafe { &mut *request };
        let content = read(content).unwrap_or_default();
        let content_type = read(content_type).unwrap_or_default();
        code(request.inner.add_raw_body(content, &content_type).map(|_| ()))
    })
    .unwrap_or(FfiErrorCode::Panic)
}

/// Attach the file at `path` under the form field `name`.
#[unsafe(no_mangle)]
pub extern "C" fn dweb_request_add_file(
    request: *mut FfiRequest,
    name: *const c_char,
    path: *const c_char,
) -> FfiErrorCode {
    catch_unwind(|| {
        if request.is_null() || name.is_null() || path.is_null() {
            return FfiErrorCode::NullArg;
        }
        let request = unsafe { &mut *request };
        let name = read(name).unwrap_or_default();
        let path = read(path).unwrap_or_default();
        code(request.inner.add_file(&name, path).map(|_| ()))
    })
    .unwrap_or(FfiErrorCode::Panic)
}

/// Number of executions of `request` that reached the transport; 0 for null.
#[unsafe(no_mangle)]
pub extern "C" fn dweb_request_attempts(request: *const FfiRequest) -> u32 {
    catch_unwind(|| {
        if request.is_null() {
            return 0;
        }
        unsafe { &*request }.inner.attempts()
    })
    .unwrap_or(0)
}

// ---------------------------------------------------------------------------
// Execution
// ---------------------------------------------------------------------------

/// Execute `request`, through `client` when it is not null.
///
/// `method` may be null to keep the request's method; otherwise it is parsed
/// case-insensitively and unknown names fall back to GET. On success
/// `data_tag` is `Response` and `data` points to an `FfiResponse`.
#[unsafe(no_mangle)]
pub extern "C" fn dweb_execute(
    client: *const FfiClient,
    request: *mut FfiRequest,
    method: *const c_char,
) -> *mut FfiWebResult {
    catch_unwind(|| {
        if request.is_null() {
            return FfiWebResult::from_error(&WebError::NullRequest);
        }
        let client = (!client.is_null()).then(|| &unsafe { &*client }.inner);
        let request = unsafe { &mut *request };
        let outcome = match read(method) {
            Some(m) => executor().execute_method(client, &mut request.inner, &m),
            None => executor().execute(client, &mut request.inner),
        };
        match outcome {
            Ok(resp) => FfiWebResult::ok_response(&resp),
            Err(e) => FfiWebResult::from_error(&e),
        }
    })
    .unwrap_or_else(|_| FfiWebResult::panic("panic during execution"))
}

/// Final URL `client` would send `request` to. `data_tag` is `Text`.
#[unsafe(no_mangle)]
pub extern "C" fn dweb_build_uri(client: *const FfiClient, request: *const FfiRequest) -> *mut FfiWebResult {
    catch_unwind(|| {
        if client.is_null() {
            return FfiWebResult::null_arg("client");
        }
        if request.is_null() {
            return FfiWebResult::null_arg("request");
        }
        let client = unsafe { &*client };
        let request = unsafe { &*request };
        match client.inner.build_uri(&request.inner) {
            Ok(url) => FfiWebResult::ok_text(&url),
            Err(e) => FfiWebResult::from_error(&e),
        }
    })
    .unwrap_or_else(|_| FfiWebResult::panic("panic while building URI"))
}

// ---------------------------------------------------------------------------
// JSON helpers
// ---------------------------------------------------------------------------

/// Flatten `json` and return its normalized text. `data_tag` is `Text`.
#[unsafe(no_mangle)]
pub extern "C" fn dweb_flatten_json(json: *const c_char) -> *mut FfiWebResult {
    catch_unwind(|| {
        let Some(text) = read(json) else {
            return FfiWebResult::null_arg("json");
        };
        match json::flatten(&text).and_then(|v| v.to_json_string()) {
            Ok(normalized) => FfiWebResult::ok_text(&normalized),
            Err(e) => FfiWebResult::from_error(&e),
        }
    })
    .unwrap_or_else(|_| FfiWebResult::panic("panic while flattening JSON"))
}

/// Select the node at `path` (e.g. `data.items[0]`) in `json`.
#[unsafe(no_mangle)]
pub extern "C" fn dweb_select_json_root(json: *const c_char, path: *const c_char) -> *mut FfiWebResult {
    catch_unwind(|| {
        let Some(text) = read(json) else {
            return FfiWebResult::null_arg("json");
        };
        let Some(path) = read(path) else {
            return FfiWebResult::null_arg("path");
        };
        match json::select_root(&text, &path) {
            Ok(node) => FfiWebResult::ok_text(&node),
            Err(e) => FfiWebResult::from_error(&e),
        }
    })
    .unwrap_or_else(|_| FfiWebResult::panic("panic while selecting JSON root"))
}

// ---------------------------------------------------------------------------
// Free functions
// ---------------------------------------------------------------------------

/// Free an `FfiWebResult`. Safe to call with null. Uses `data_tag` to
/// determine what `data` points to.
#[unsafe(no_mangle)]
pub extern "C" fn dweb_free_result(result: *mut FfiWebResult) {
    if result.is_null() {
        return;
    }
    let _ = catch_unwind(|| {
        let result = unsafe { Box::from_raw(result) };
        unsafe { free_c_string(result.error_message) };
        if result.data.is_null() {
            return;
        }
        match result.data_tag {
            FfiDataTag::Response => {
                let mut resp = unsafe { Box::from_raw(result.data as *mut FfiResponse) };
                unsafe { resp.free_fields() };
            }
            FfiDataTag::Text => unsafe { free_c_string(result.data as *mut c_char) },
            FfiDataTag::None => {}
        }
    });
}

/// Free a C string allocated by this library. Safe to call with null.
#[unsafe(no_mangle)]
pub extern "C" fn dweb_free_string(s: *mut c_char) {
    if !s.is_null() {
        let _ = catch_unwind(|| unsafe { free_c_string(s) });
    }
}

// ---------------------------------------------------------------------------
// Unit tests
// ---------------------------------------------------------------------------
