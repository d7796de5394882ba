//! HTTP transport types for the executor/transport boundary.
//!
//! # Design
//! These types describe a fully prepared HTTP call and its raw outcome as
//! plain data. The executor turns a `Client` + `Request` pair into an
//! `HttpRequest`, hands it to a [`Transport`](crate::transport::Transport),
//! and receives an `HttpResponse` back. Transport failures are data too
//! (`ResponseStatus`), so the executor alone decides how they map to errors
//! and a fake transport can stand in for the network in tests.
//!
//! All fields use owned types (`String`, `Vec`) so values can cross the FFI
//! boundary without lifetime concerns.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use crate::error::WebError;

/// HTTP method for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum HttpMethod {
    #[default]
    Get,
    Post,
    Put,
    Delete,
    Head,
    Options,
    Patch,
    Merge,
}

impl HttpMethod {
    pub const ALL: [HttpMethod; 8] = [
        HttpMethod::Get,
        HttpMethod::Post,
        HttpMethod::Put,
        HttpMethod::Delete,
        HttpMethod::Head,
        HttpMethod::Options,
        HttpMethod::Patch,
        HttpMethod::Merge,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            HttpMethod::Get => "GET",
            HttpMethod::Post => "POST",
            HttpMethod::Put => "PUT",
            HttpMethod::Delete => "DELETE",
            HttpMethod::Head => "HEAD",
            HttpMethod::Options => "OPTIONS",
            HttpMethod::Patch => "PATCH",
            HttpMethod::Merge => "MERGE",
        }
    }

    /// Methods that send `PostOrForm` parameters as a form body instead of
    /// the query string.
    pub fn sends_form(&self) -> bool {
        matches!(
            self,
            HttpMethod::Post | HttpMethod::Put | HttpMethod::Patch | HttpMethod::Merge
        )
    }

    /// Methods that may carry file attachments.
    pub fn accepts_files(&self) -> bool {
        matches!(self, HttpMethod::Post | HttpMethod::Put)
    }
}

impl fmt::Display for HttpMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for HttpMethod {
    type Err = WebError;

    /// Case-insensitive; surrounding whitespace is ignored.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim();
        HttpMethod::ALL
            .into_iter()
            .find(|m| m.as_str().eq_ignore_ascii_case(wanted))
            .ok_or_else(|| WebError::InvalidArgument(format!("unknown HTTP method {s:?}")))
    }
}

/// Serialization format for request bodies and typed response decoding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum DataFormat {
    Json,
    #[default]
    Xml,
}

impl DataFormat {
    pub fn content_type(&self) -> &'static str {
        match self {
            DataFormat::Json => "application/json",
            DataFormat::Xml => "application/xml",
        }
    }
}

impl fmt::Display for DataFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DataFormat::Json => f.write_str("Json"),
            DataFormat::Xml => f.write_str("Xml"),
        }
    }
}

impl FromStr for DataFormat {
    type Err = WebError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(DataFormat::Json),
            "xml" => Ok(DataFormat::Xml),
            _ => Err(WebError::InvalidArgument(format!("unknown data format {s:?}"))),
        }
    }
}

/// Transport-level outcome of a call.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ResponseStatus {
    /// The transport produced no outcome at all.
    #[default]
    None,
    /// A full response (any status code) was received.
    Completed,
    Error,
    TimedOut,
    Aborted,
}

impl fmt::Display for ResponseStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ResponseStatus::None => "None",
            ResponseStatus::Completed => "Completed",
            ResponseStatus::Error => "Error",
            ResponseStatus::TimedOut => "TimedOut",
            ResponseStatus::Aborted => "Aborted",
        };
        f.write_str(name)
    }
}

/// A fully resolved HTTP call described as plain data.
///
/// Built by the executor from a `Client` and a `Request`; `url` has already
/// been validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpRequest {
    pub method: HttpMethod,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Vec<u8>>,
    pub timeout: Option<Duration>,
    /// 0 means redirects are not followed.
    pub max_redirects: u32,
}

impl HttpRequest {
    /// First header value whose name matches case-insensitively.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }
}

/// Raw outcome of an `HttpRequest` as reported by a transport.
#[derive(Debug, Clone, Default)]
pub struct HttpResponse {
    pub status: ResponseStatus,
    pub status_code: u16,
    pub status_description: String,
    /// Final URL after redirects.
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
    pub error_message: Option<String>,
}

impl HttpResponse {
    /// A response for a call that never produced an HTTP status.
    pub fn failed(status: ResponseStatus, url: &str, message: impl Into<String>) -> Self {
        HttpResponse {
            status,
            url: url.to_string(),
            error_message: Some(message.into()),
            ..HttpResponse::default()
        }
    }
}
