//! Immutable snapshot of an executed call.
//!
//! Built once by the executor from the transport's [`HttpResponse`]; every
//! accessor is a plain read.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::de::DeserializeOwned;

use crate::error::Result;
use crate::http::{DataFormat, HttpResponse, ResponseStatus};
use crate::json::{self, GenericValue};

/// A cookie set by the server.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cookie {
    pub name: String,
    pub value: String,
    /// When the response carrying the cookie was received.
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct Response {
    content: String,
    content_type: Option<String>,
    content_length: u64,
    content_encoding: Option<String>,
    raw_bytes: Vec<u8>,
    status_code: u16,
    status_description: String,
    response_uri: String,
    server: Option<String>,
    headers: Vec<(String, String)>,
    cookies: Vec<Cookie>,
    response_status: ResponseStatus,
    error_message: Option<String>,
    elapsed: Duration,
    json_root: Option<String>,
}

impl Response {
    pub(crate) fn from_http(
        raw: HttpResponse,
        elapsed: Duration,
        json_root: Option<String>,
        received_at: DateTime<Utc>,
    ) -> Self {
        let find = |name: &str| {
            raw.headers
                .iter()
                .find(|(k, _)| k.eq_ignore_ascii_case(name))
                .map(|(_, v)| v.clone())
        };
        let content_type = find("content-type");
        let content_encoding = find("content-encoding");
        let server = find("server");
        let content_length = find("content-length")
            .and_then(|v| v.trim().parse().ok())
            .unwrap_or(raw.body.len() as u64);
        let cookies = raw
            .headers
            .iter()
            .filter(|(k, _)| k.eq_ignore_ascii_case("set-cookie"))
            .filter_map(|(_, v)| parse_set_cookie(v, received_at))
            .collect();

        Response {
            content: String::from_utf8_lossy(&raw.body).into_owned(),
            content_type,
            content_length,
            content_encoding,
            raw_bytes: raw.body,
            status_code: raw.status_code,
            status_description: raw.status_description,
            response_uri: raw.url,
            server,
            headers: raw.headers,
            cookies,
            response_status: raw.status,
            error_message: raw.error_message,
            elapsed,
            json_root,
        }
    }

    /// Body decoded as UTF-8; invalid sequences are replaced.
    pub fn content(&self) -> &str {
        &self.content
    }

    pub fn content_type(&self) -> Option<&str> {
        self.content_type.as_deref()
    }

    /// `Content-Length` when the server sent one, the body size otherwise.
    pub fn content_length(&self) -> u64 {
        self.content_length
    }

    pub fn content_encoding(&self) -> Option<&str> {
        self.content_encoding.as_deref()
    }

    pub fn raw_bytes(&self) -> &[u8] {
        &self.raw_bytes
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn status_description(&self) -> &str {
        &self.status_description
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status_code)
    }

    /// Final URL after redirects.
    pub fn response_uri(&self) -> &str {
        &self.response_uri
    }

    pub fn server(&self) -> Option<&str> {
        self.server.as_deref()
    }

    /// Header pairs in the order the transport returned them.
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn header_names(&self) -> Vec<&str> {
        self.headers.iter().map(|(k, _)| k.as_str()).collect()
    }

    pub fn header_values(&self) -> Vec<&str> {
        self.headers.iter().map(|(_, v)| v.as_str()).collect()
    }

    pub fn cookies(&self) -> &[Cookie] {
        &self.cookies
    }

    /// `[name, value, timestamp]` per cookie, timestamp in RFC 3339.
    pub fn cookie_rows(&self) -> Vec<[String; 3]> {
        self.cookies
            .iter()
            .map(|c| [c.name.clone(), c.value.clone(), c.timestamp.to_rfc3339()])
            .collect()
    }

    pub fn response_status(&self) -> ResponseStatus {
        self.response_status
    }

    pub fn error_message(&self) -> Option<&str> {
        self.error_message.as_deref()
    }

    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }

    /// JSON root selected by the client that produced this response.
    pub fn json_root(&self) -> Option<&str> {
        self.json_root.as_deref()
    }

    /// Content as a generic JSON tree.
    pub fn flatten(&self) -> Result<GenericValue> {
        json::flatten(&self.content)
    }

    /// Content decoded into `T`. JSON decoding starts at the client's JSON
    /// root when one was configured.
    pub fn deserialize_as<T: DeserializeOwned>(&self, format: DataFormat) -> Result<T> {
        match (format, &self.json_root) {
            (DataFormat::Json, Some(root)) => json::deserialize_json_at(&self.content, root),
            _ => json::deserialize_as(&self.content, format),
        }
    }
}

fn parse_set_cookie(header: &str, received_at: DateTime<Utc>) -> Option<Cookie> {
    let pair = header.split(';').next()?;
    let (name, value) = pair.split_once('=')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some(Cookie {
        name: name.to_string(),
        value: value.trim().trim_matches('"').to_string(),
        timestamp: received_at,
    })
}

#[cfg(test)]
mod tests {
    use serde::Deserialize;

    use super::*;

    fn raw(headers: &[(&str, &str)], body: &str) -> HttpResponse {
        HttpResponse {
            status: ResponseStatus::Completed,
            status_code: 200,
            status_description: "OK".to_string(),
            url: "http://localhost:3000/json".to_string(),
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: body.as_bytes().to_vec(),
            error_message: None,
        }
    }

    fn response(headers: &[(&str, &str)], body: &str) -> Response {
        Response::from_http(raw(headers, body), Duration::from_millis(12), None, Utc::now())
    }

    #[test]
    fn projects_the_raw_response() {
        let resp = response(
            &[
                ("content-type", "application/json"),
                ("server", "mock"),
                ("content-encoding", "identity"),
            ],
            r#"{"a":1}"#,
        );
        assert_eq!(resp.content(), r#"{"a":1}"#);
        assert_eq!(resp.raw_bytes(), br#"{"a":1}"#);
        assert_eq!(resp.content_type(), Some("application/json"));
        assert_eq!(resp.content_encoding(), Some("identity"));
        assert_eq!(resp.server(), Some("mock"));
        assert_eq!(resp.content_length(), 7);
        assert_eq!(resp.status_code(), 200);
        assert_eq!(resp.status_description(), "OK");
        assert_eq!(resp.response_uri(), "http://localhost:3000/json");
        assert_eq!(resp.response_status().to_string(), "Completed");
        assert_eq!(resp.elapsed(), Duration::from_millis(12));
        assert!(resp.is_success());
    }

    #[test]
    fn content_length_header_wins_over_body_size() {
        let resp = response(&[("Content-Length", "1024")], "");
        assert_eq!(resp.content_length(), 1024);
    }

    #[test]
    fn headers_keep_transport_order() {
        let resp = response(&[("b", "2"), ("a", "1"), ("b", "3")], "");
        assert_eq!(resp.header_names(), ["b", "a", "b"]);
        assert_eq!(resp.header_values(), ["2", "1", "3"]);
        assert_eq!(resp.header("B"), Some("2"));
    }

    #[test]
    fn cookies_are_parsed_from_set_cookie_headers() {
        let resp = response(
            &[
                ("set-cookie", "session=abc123; Path=/; HttpOnly"),
                ("x-other", "1"),
                ("Set-Cookie", "theme=\"dark\""),
                ("set-cookie", "=orphan"),
            ],
            "",
        );
        let names: Vec<&str> = resp.cookies().iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, ["session", "theme"]);
        assert_eq!(resp.cookies()[1].value, "dark");
        let rows = resp.cookie_rows();
        assert_eq!(rows[0][0], "session");
        assert_eq!(rows[0][1], "abc123");
        assert!(DateTime::parse_from_rfc3339(&rows[0][2]).is_ok());
    }

    #[test]
    fn invalid_utf8_is_replaced_in_content_only() {
        let mut raw = raw(&[], "");
        raw.body = vec![0x66, 0x6f, 0xff];
        let resp = Response::from_http(raw, Duration::ZERO, None, Utc::now());
        assert_eq!(resp.content(), "fo\u{fffd}");
        assert_eq!(resp.raw_bytes(), &[0x66, 0x6f, 0xff]);
    }

    #[test]
    fn flatten_reads_the_content() {
        let resp = response(&[], r#"{"a":1,"b":[true,null]}"#);
        let value = resp.flatten().unwrap();
        assert_eq!(value.get("a").and_then(GenericValue::as_i64), Some(1));
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct User {
        login: String,
    }

    #[test]
    fn deserialize_honors_the_json_root() {
        let resp = Response::from_http(
            raw(&[], r#"{"data":{"user":{"login":"ada"}}}"#),
            Duration::ZERO,
            Some("data.user".to_string()),
            Utc::now(),
        );
        let user: User = resp.deserialize_as(DataFormat::Json).unwrap();
        assert_eq!(user.login, "ada");
    }

    #[test]
    fn deserialize_without_root_reads_the_whole_document() {
        let resp = response(&[], r#"{"login":"grace"}"#);
        let user: User = resp.deserialize_as(DataFormat::Json).unwrap();
        assert_eq!(user.login, "grace");
    }
}
