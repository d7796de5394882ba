//! Request builder.
//!
//! # Design
//! A `Request` is mutable until it is executed. Every builder method checks
//! its input and returns `&mut Self`, so configuration chains with `?`:
//!
//! ```no_run
//! # use dynaweb_core::{Request, WebError};
//! let mut req = Request::by_endpoint("repos/{owner}")?;
//! req.add_url_segment("owner", "DynamoDS")?
//!     .add_query_parameter("per_page", "10")?
//!     .add_header("Accept", "application/json")?;
//! # Ok::<(), WebError>(())
//! ```
//!
//! Headers and cookies are stored as parameters of their own kind, so one
//! ordered list drives both duplicate detection and wire preparation.
//! The body/method invariants (no body on GET, files only on POST/PUT) are
//! enforced both when attaching and when changing the method afterwards.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use url::Url;

use crate::error::{Result, WebError};
use crate::http::{DataFormat, HttpMethod};
use crate::response::Response;
use crate::uri;

/// Where a parameter ends up on the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ParameterKind {
    Cookie,
    /// Form body for POST/PUT/PATCH/MERGE without an explicit body, query
    /// string otherwise.
    PostOrForm,
    Header,
    QueryString,
    /// Raw body; the parameter name is the content type.
    Body,
    /// Replaces `{name}` in the resource.
    UrlSegment,
}

impl fmt::Display for ParameterKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ParameterKind::Cookie => "Cookie",
            ParameterKind::PostOrForm => "PostOrForm",
            ParameterKind::Header => "Header",
            ParameterKind::QueryString => "QueryString",
            ParameterKind::Body => "Body",
            ParameterKind::UrlSegment => "UrlSegment",
        };
        f.write_str(name)
    }
}

impl FromStr for ParameterKind {
    type Err = WebError;

    /// Case-insensitive. `GetOrPost`, `HttpHeader` and `RequestBody` are
    /// accepted as aliases.
    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cookie" => Ok(ParameterKind::Cookie),
            "postorform" | "getorpost" => Ok(ParameterKind::PostOrForm),
            "header" | "httpheader" => Ok(ParameterKind::Header),
            "querystring" => Ok(ParameterKind::QueryString),
            "body" | "requestbody" => Ok(ParameterKind::Body),
            "urlsegment" => Ok(ParameterKind::UrlSegment),
            _ => Err(WebError::InvalidArgument(format!("unknown parameter kind {s:?}"))),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Parameter {
    pub name: String,
    pub value: String,
    pub kind: ParameterKind,
}

/// Request payload, already serialized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RequestBody {
    Raw { content: String, content_type: String },
    Json(String),
    Xml(String),
}

impl RequestBody {
    pub fn content_type(&self) -> &str {
        match self {
            RequestBody::Raw { content_type, .. } => content_type,
            RequestBody::Json(_) => DataFormat::Json.content_type(),
            RequestBody::Xml(_) => DataFormat::Xml.content_type(),
        }
    }

    pub fn content(&self) -> &str {
        match self {
            RequestBody::Raw { content, .. } => content,
            RequestBody::Json(text) | RequestBody::Xml(text) => text,
        }
    }
}

/// A file sent as a multipart/form-data part.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileAttachment {
    /// Form field name.
    pub name: String,
    pub file_name: String,
    pub content_type: String,
    pub data: Vec<u8>,
}

/// Description of a single HTTP call.
#[derive(Debug, Clone, Default)]
pub struct Request {
    url: Option<Url>,
    resource: String,
    method: HttpMethod,
    parameters: Vec<Parameter>,
    body: Option<RequestBody>,
    files: Vec<FileAttachment>,
    force_security_protocol: bool,
    request_format: DataFormat,
    attempts: u32,
    last_response: Option<Arc<Response>>,
    elapsed: Option<Duration>,
}

impl Request {
    /// A GET request to an absolute http/https URL.
    pub fn new(url: &str) -> Result<Self> {
        let mut request = Request::default();
        request.set_url(url)?;
        Ok(request)
    }

    /// A GET request to a path relative to the executing client's base URL.
    pub fn by_endpoint(resource: &str) -> Result<Self> {
        let mut request = Request::default();
        request.set_resource(resource)?;
        Ok(request)
    }

    // -- configuration ----------------------------------------------------

    pub fn set_url(&mut self, url: &str) -> Result<&mut Self> {
        self.url = Some(uri::parse(url)?);
        Ok(self)
    }

    pub fn set_resource(&mut self, resource: &str) -> Result<&mut Self> {
        self.resource = required(resource, "resource")?;
        Ok(self)
    }

    /// Fails with `InvalidOperation` when the new method cannot carry the
    /// body or files already attached.
    pub fn set_method(&mut self, method: HttpMethod) -> Result<&mut Self> {
        if method == HttpMethod::Get && self.body.is_some() {
            return Err(WebError::InvalidOperation(
                "cannot switch to GET while a body is attached".to_string(),
            ));
        }
        if !method.accepts_files() && !self.files.is_empty() {
            return Err(WebError::InvalidOperation(format!(
                "cannot switch to {method} while files are attached"
            )));
        }
        self.method = method;
        Ok(self)
    }

    pub fn set_request_format(&mut self, format: DataFormat) -> &mut Self {
        self.request_format = format;
        self
    }

    /// Ask for the process-wide strict transport policy on execution.
    pub fn set_force_security_protocol(&mut self, force: bool) -> &mut Self {
        self.force_security_protocol = force;
        self
    }

    // -- parameters -------------------------------------------------------

    /// `Body` parameters become a raw body whose content type is `name`.
    pub fn add_parameter(
        &mut self,
        name: &str,
        value: impl Into<String>,
        kind: ParameterKind,
    ) -> Result<&mut Self> {
        if kind == ParameterKind::Body {
            return self.add_raw_body(value, name);
        }
        let name = required(name, "parameter name")?;
        let clash = self.parameters.iter().any(|p| {
            p.kind == kind
                && if kind == ParameterKind::Header {
                    p.name.eq_ignore_ascii_case(&name)
                } else {
                    p.name == name
                }
        });
        if clash {
            return Err(WebError::DuplicateParameter { name, kind });
        }
        self.parameters.push(Parameter {
            name,
            value: value.into(),
            kind,
        });
        Ok(self)
    }

    pub fn add_header(&mut self, name: &str, value: impl Into<String>) -> Result<&mut Self> {
        self.add_parameter(name, value, ParameterKind::Header)
    }

    pub fn add_cookie(&mut self, name: &str, value: impl Into<String>) -> Result<&mut Self> {
        self.add_parameter(name, value, ParameterKind::Cookie)
    }

    pub fn add_query_parameter(&mut self, name: &str, value: impl Into<String>) -> Result<&mut Self> {
        self.add_parameter(name, value, ParameterKind::QueryString)
    }

    pub fn add_url_segment(&mut self, name: &str, value: impl Into<String>) -> Result<&mut Self> {
        self.add_parameter(name, value, ParameterKind::UrlSegment)
    }

    // -- body -------------------------------------------------------------

    /// Serialize `value` with the request format (XML unless changed).
    /// Replaces any body already attached.
    pub fn add_body<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<&mut Self> {
        match self.request_format {
            DataFormat::Json => self.add_json_body(value),
            DataFormat::Xml => self.add_xml_body(value),
        }
    }

    pub fn add_json_body<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<&mut Self> {
        self.ensure_body_allowed()?;
        let text = serde_json::to_string(value).map_err(|e| WebError::Serialization(e.to_string()))?;
        self.body = Some(RequestBody::Json(text));
        Ok(self)
    }

    pub fn add_xml_body<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<&mut Self> {
        self.ensure_body_allowed()?;
        let text = quick_xml::se::to_string(value).map_err(|e| WebError::Serialization(e.to_string()))?;
        self.body = Some(RequestBody::Xml(text));
        Ok(self)
    }

    /// Like [`add_xml_body`](Self::add_xml_body), with an explicit root
    /// element for values that carry no type name (maps, `serde_json::Value`).
    pub fn add_xml_body_with_root<T: Serialize + ?Sized>(&mut self, root: &str, value: &T) -> Result<&mut Self> {
        self.ensure_body_allowed()?;
        let root = required(root, "XML root element")?;
        let text =
            quick_xml::se::to_string_with_root(&root, value).map_err(|e| WebError::Serialization(e.to_string()))?;
        self.body = Some(RequestBody::Xml(text));
        Ok(self)
    }

    /// Attach already-serialized content.
    pub fn add_raw_body(&mut self, content: impl Into<String>, content_type: &str) -> Result<&mut Self> {
        self.ensure_body_allowed()?;
        let content_type = required(content_type, "content type")?;
        self.body = Some(RequestBody::Raw {
            content: content.into(),
            content_type,
        });
        Ok(self)
    }

    // -- files ------------------------------------------------------------

    /// Read `path` and attach it under the form field `name`.
    pub fn add_file(&mut self, name: &str, path: impl AsRef<Path>) -> Result<&mut Self> {
        self.ensure_files_allowed()?;
        let path = path.as_ref();
        let data = std::fs::read(path)
            .map_err(|e| WebError::InvalidArgument(format!("cannot read {}: {e}", path.display())))?;
        let file_name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| name.to_string());
        self.add_file_bytes(name, &file_name, data, None)
    }

    /// Attach in-memory content; `content_type` defaults to
    /// `application/octet-stream`.
    pub fn add_file_bytes(
        &mut self,
        name: &str,
        file_name: &str,
        data: Vec<u8>,
        content_type: Option<&str>,
    ) -> Result<&mut Self> {
        self.ensure_files_allowed()?;
        let name = required(name, "file field name")?;
        let file_name = required(file_name, "file name")?;
        self.files.push(FileAttachment {
            name,
            file_name,
            content_type: content_type
                .filter(|c| !c.trim().is_empty())
                .unwrap_or("application/octet-stream")
                .to_string(),
            data,
        });
        Ok(self)
    }

    // -- accessors --------------------------------------------------------

    pub fn url(&self) -> Option<&Url> {
        self.url.as_ref()
    }

    pub fn resource(&self) -> &str {
        &self.resource
    }

    pub fn method(&self) -> HttpMethod {
        self.method
    }

    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    pub fn parameters_of(&self, kind: ParameterKind) -> impl Iterator<Item = &Parameter> {
        self.parameters.iter().filter(move |p| p.kind == kind)
    }

    /// Header name/value pairs in insertion order.
    pub fn headers(&self) -> impl Iterator<Item = (&str, &str)> {
        self.parameters_of(ParameterKind::Header)
            .map(|p| (p.name.as_str(), p.value.as_str()))
    }

    pub fn body(&self) -> Option<&RequestBody> {
        self.body.as_ref()
    }

    pub fn files(&self) -> &[FileAttachment] {
        &self.files
    }

    pub fn force_security_protocol(&self) -> bool {
        self.force_security_protocol
    }

    pub fn request_format(&self) -> DataFormat {
        self.request_format
    }

    /// Executions that reached the transport.
    pub fn attempts(&self) -> u32 {
        self.attempts
    }

    /// Response of the last successful execution.
    pub fn last_response(&self) -> Option<&Arc<Response>> {
        self.last_response.as_ref()
    }

    /// Round-trip time of the last successful execution.
    pub fn elapsed(&self) -> Option<Duration> {
        self.elapsed
    }

    /// Whether `PostOrForm` parameters travel in the body, either
    /// urlencoded or as multipart fields next to attached files.
    pub(crate) fn sends_form_body(&self) -> bool {
        self.method.sends_form() && (self.body.is_none() || !self.files.is_empty())
    }

    /// Parameters that end up in the query string, in insertion order.
    pub(crate) fn query_parameters(&self) -> impl Iterator<Item = &Parameter> {
        let form_in_query = !self.sends_form_body();
        self.parameters.iter().filter(move |p| {
            p.kind == ParameterKind::QueryString || (form_in_query && p.kind == ParameterKind::PostOrForm)
        })
    }

    // -- executor bookkeeping ---------------------------------------------

    pub(crate) fn clear_resource(&mut self) {
        self.resource.clear();
    }

    pub(crate) fn record_attempt(&mut self) {
        self.attempts = self.attempts.saturating_add(1);
    }

    pub(crate) fn record_response(&mut self, response: Arc<Response>, elapsed: Duration) {
        self.last_response = Some(response);
        self.elapsed = Some(elapsed);
    }

    fn ensure_body_allowed(&self) -> Result<()> {
        if self.method == HttpMethod::Get {
            return Err(WebError::InvalidOperation(
                "a body cannot be attached to a GET request".to_string(),
            ));
        }
        Ok(())
    }

    fn ensure_files_allowed(&self) -> Result<()> {
        if !self.method.accepts_files() {
            return Err(WebError::InvalidOperation(format!(
                "files can only be attached to POST or PUT requests, not {}",
                self.method
            )));
        }
        Ok(())
    }
}

fn required(value: &str, what: &str) -> Result<String> {
    if value.trim().is_empty() {
        return Err(WebError::InvalidArgument(format!("{what} must not be empty")));
    }
    Ok(value.to_string())
}
