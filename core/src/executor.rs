//! Runs a `Request` against a `Client`.
//!
//! # Design
//! Execution is one blocking call with no retries:
//! resolve the URL (pure, see [`Client::build_uri`]), prepare a plain
//! [`HttpRequest`], hand it to the [`Transport`], then map the transport
//! outcome. Only a `Completed` outcome produces a [`Response`]; every other
//! outcome is an error and leaves the request's last response untouched.

use std::sync::Arc;
use std::time::Instant;

use chrono::Utc;
use uuid::Uuid;

use crate::client::Client;
use crate::error::{Result, WebError};
use crate::http::{HttpMethod, HttpRequest, ResponseStatus};
use crate::policy;
use crate::request::{ParameterKind, Request};
use crate::response::Response;
use crate::transport::{Transport, UreqTransport};
use crate::uri;

pub struct Executor<T: Transport = UreqTransport> {
    transport: T,
}

impl Executor {
    pub fn new() -> Self {
        Self::with_transport(UreqTransport::new())
    }
}

impl Default for Executor {
    fn default() -> Self {
        Self::new()
    }
}

impl<T: Transport> Executor<T> {
    pub fn with_transport(transport: T) -> Self {
        Executor { transport }
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    /// Execute `request` through `client`.
    ///
    /// Without a client the request must carry an absolute URL; it is sent
    /// with default client settings and its resource is cleared.
    pub fn execute(&self, client: Option<&Client>, request: &mut Request) -> Result<Arc<Response>> {
        let standalone;
        let client = match client {
            Some(client) => client,
            None => {
                let url = request.url().cloned().ok_or_else(|| {
                    WebError::invalid_url(request.resource(), "request has no URL and no client")
                        .into_malformed()
                })?;
                standalone = Client::by_url(url.as_str()).map_err(WebError::into_malformed)?;
                request.clear_resource();
                &standalone
            }
        };

        let url = client.build_uri(request).map_err(WebError::into_malformed)?;
        uri::validate(&url).map_err(WebError::into_malformed)?;

        if request.force_security_protocol() {
            policy::ensure_strict();
        }

        let prepared = prepare(client, request, url);
        request.record_attempt();
        tracing::debug!(
            method = %prepared.method,
            url = %prepared.url,
            attempt = request.attempts(),
            "executing request"
        );

        let started = Instant::now();
        let raw = self.transport.send(&prepared);
        let elapsed = started.elapsed();

        let message = || raw.error_message.clone().unwrap_or_default();
        let failure = match raw.status {
            ResponseStatus::Completed => None,
            ResponseStatus::TimedOut => Some(WebError::Timeout(message())),
            ResponseStatus::Aborted => Some(WebError::Aborted(message())),
            ResponseStatus::None | ResponseStatus::Error => Some(WebError::Network(message())),
        };
        if let Some(err) = failure {
            tracing::warn!(
                url = %prepared.url,
                status = %raw.status,
                error = %err,
                "request failed"
            );
            return Err(err);
        }

        let response = Arc::new(Response::from_http(
            raw,
            elapsed,
            client.json_root_override().map(str::to_string),
            Utc::now(),
        ));
        request.record_response(Arc::clone(&response), elapsed);
        tracing::debug!(
            url = %prepared.url,
            status = response.status_code(),
            elapsed_ms = elapsed.as_millis() as u64,
            "request completed"
        );
        Ok(response)
    }

    /// Execute with the method named by `method`; empty or unknown names
    /// fall back to GET.
    pub fn execute_method(
        &self,
        client: Option<&Client>,
        request: &mut Request,
        method: &str,
    ) -> Result<Arc<Response>> {
        let method = method.parse().unwrap_or(HttpMethod::Get);
        self.execute_as(method, client, request)
    }

    pub fn get(&self, client: Option<&Client>, request: &mut Request) -> Result<Arc<Response>> {
        self.execute_as(HttpMethod::Get, client, request)
    }

    pub fn post(&self, client: Option<&Client>, request: &mut Request) -> Result<Arc<Response>> {
        self.execute_as(HttpMethod::Post, client, request)
    }

    pub fn put(&self, client: Option<&Client>, request: &mut Request) -> Result<Arc<Response>> {
        self.execute_as(HttpMethod::Put, client, request)
    }

    pub fn delete(&self, client: Option<&Client>, request: &mut Request) -> Result<Arc<Response>> {
        self.execute_as(HttpMethod::Delete, client, request)
    }

    pub fn head(&self, client: Option<&Client>, request: &mut Request) -> Result<Arc<Response>> {
        self.execute_as(HttpMethod::Head, client, request)
    }

    pub fn options(&self, client: Option<&Client>, request: &mut Request) -> Result<Arc<Response>> {
        self.execute_as(HttpMethod::Options, client, request)
    }

    pub fn patch(&self, client: Option<&Client>, request: &mut Request) -> Result<Arc<Response>> {
        self.execute_as(HttpMethod::Patch, client, request)
    }

    pub fn merge(&self, client: Option<&Client>, request: &mut Request) -> Result<Arc<Response>> {
        self.execute_as(HttpMethod::Merge, client, request)
    }

    fn execute_as(
        &self,
        method: HttpMethod,
        client: Option<&Client>,
        request: &mut Request,
    ) -> Result<Arc<Response>> {
        request.set_method(method)?;
        self.execute(client, request)
    }
}

/// Lay out headers, cookies and body for the wire.
fn prepare(client: &Client, request: &Request, url: String) -> HttpRequest {
    let mut headers = Vec::new();
    if !request.headers().any(|(name, _)| name.eq_ignore_ascii_case("user-agent")) {
        headers.push(("User-Agent".to_string(), client.user_agent().to_string()));
    }
    headers.extend(
        request
            .headers()
            .map(|(name, value)| (name.to_string(), value.to_string())),
    );

    let cookie = request
        .parameters_of(ParameterKind::Cookie)
        .map(|p| format!("{}={}", p.name, p.value))
        .collect::<Vec<_>>()
        .join("; ");
    if !cookie.is_empty() {
        headers.push(("Cookie".to_string(), cookie));
    }

    let has_content_type = request
        .headers()
        .any(|(name, _)| name.eq_ignore_ascii_case("content-type"));
    let body = if !request.files().is_empty() {
        if request.body().is_some() {
            tracing::warn!("request body is not sent alongside file attachments");
        }
        let boundary = format!("dynaweb-{}", Uuid::new_v4().simple());
        if !has_content_type {
            headers.push((
                "Content-Type".to_string(),
                format!("multipart/form-data; boundary={boundary}"),
            ));
        }
        Some(multipart(request, &boundary))
    } else if let Some(body) = request.body() {
        if !has_content_type {
            headers.push(("Content-Type".to_string(), body.content_type().to_string()));
        }
        Some(body.content().as_bytes().to_vec())
    } else if request.sends_form_body() {
        let mut form = url::form_urlencoded::Serializer::new(String::new());
        let mut any = false;
        for p in request.parameters_of(ParameterKind::PostOrForm) {
            form.append_pair(&p.name, &p.value);
            any = true;
        }
        if any {
            if !has_content_type {
                headers.push((
                    "Content-Type".to_string(),
                    "application/x-www-form-urlencoded".to_string(),
                ));
            }
            Some(form.finish().into_bytes())
        } else {
            None
        }
    } else {
        None
    };

    HttpRequest {
        method: request.method(),
        url,
        headers,
        body,
        timeout: client.timeout(),
        max_redirects: client.redirect_limit(),
    }
}

fn multipart(request: &Request, boundary: &str) -> Vec<u8> {
    let mut out = Vec::new();
    for p in request.parameters_of(ParameterKind::PostOrForm) {
        out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        out.extend_from_slice(
            format!("Content-Disposition: form-data; name=\"{}\"\r\n\r\n", quote(&p.name)).as_bytes(),
        );
        out.extend_from_slice(p.value.as_bytes());
        out.extend_from_slice(b"\r\n");
    }
    for file in request.files() {
        out.extend_from_slice(format!("--{boundary}\r\n").as_bytes());
        out.extend_from_slice(
            format!(
                "Content-Disposition: form-data; name=\"{}\"; filename=\"{}\"\r\n",
                quote(&file.name),
                quote(&file.file_name)
            )
            .as_bytes(),
        );
        out.extend_from_slice(format!("Content-Type: {}\r\n\r\n", file.content_type).as_bytes());
        out.extend_from_slice(&file.data);
        out.extend_from_slice(b"\r\n");
    }
    out.extend_from_slice(format!("--{boundary}--\r\n").as_bytes());
    out
}

fn quote(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}
