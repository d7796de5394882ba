//! Endpoint configuration shared by many requests.
//!
//! # Design
//! `Client` holds the base URL and connection settings; it carries no
//! network state and performs no I/O. [`Client::build_uri`] is the pure
//! part of an execution: it combines the base URL with a request's
//! resource, URL segments and query parameters so the final URL can be
//! inspected without sending anything.

use std::fmt;
use std::time::Duration;

use url::form_urlencoded;
use url::Url;

use crate::config::ClientConfig;
use crate::error::{Result, WebError};
use crate::request::{ParameterKind, Request};
use crate::uri;

pub const DEFAULT_USER_AGENT: &str = "DynamoDS";

/// Reusable HTTP endpoint configuration.
#[derive(Clone)]
pub struct Client {
    base_url: Url,
    user_agent: String,
    timeout: Option<Duration>,
    follow_redirects: bool,
    max_redirects: Option<u32>,
    auth_token: String,
    json_root_override: Option<String>,
}

impl Client {
    /// `token` is stored as-is and may be empty.
    pub fn new(base_url: &str, token: &str) -> Result<Self> {
        Ok(Self {
            base_url: uri::parse(base_url)?,
            user_agent: DEFAULT_USER_AGENT.to_string(),
            timeout: None,
            follow_redirects: true,
            max_redirects: Some(1),
            auth_token: token.to_string(),
            json_root_override: None,
        })
    }

    pub fn by_url(base_url: &str) -> Result<Self> {
        Self::new(base_url, "")
    }

    pub fn from_config(config: &ClientConfig) -> Result<Self> {
        let mut client = Self::new(&config.base_url, &config.token)?;
        client.set_user_agent(&config.user_agent)?;
        if let Some(ms) = config.timeout_ms {
            client.set_timeout(Duration::from_millis(ms))?;
        }
        client.set_follow_redirects(config.follow_redirects);
        if let Some(max) = config.max_redirects {
            client.set_max_redirects(max)?;
        }
        if let Some(root) = &config.json_root {
            client.set_json_root_override(root)?;
        }
        Ok(client)
    }

    /// Final URL for `request`, without executing it.
    ///
    /// A request resource is appended to the base URL with exactly one `/`
    /// between them; without a resource the request's own absolute URL is
    /// used, and without either the base URL. URL segments fill `{name}`
    /// placeholders in the resource and query parameters are appended in
    /// insertion order.
    pub fn build_uri(&self, request: &Request) -> Result<String> {
        let mut target = if !request.resource().is_empty() {
            let resource = expand_segments(request)?;
            format!(
                "{}/{}",
                self.base_url.as_str().trim_end_matches('/'),
                resource.trim_start_matches('/')
            )
        } else if let Some(url) = request.url() {
            url.to_string()
        } else {
            self.base_url.to_string()
        };

        let mut query = form_urlencoded::Serializer::new(String::new());
        let mut has_query = false;
        for p in request.query_parameters() {
            query.append_pair(&p.name, &p.value);
            has_query = true;
        }
        if has_query {
            target.push(if target.contains('?') { '&' } else { '?' });
            target.push_str(&query.finish());
        }

        uri::parse(&target)?;
        tracing::trace!(url = %target, "resolved request URL");
        Ok(target)
    }

    // -- setters ------------------------------------------------------------

    pub fn set_base_url(&mut self, base_url: &str) -> Result<&mut Self> {
        let url = uri::parse(base_url)?;
        uri::is_external(&url)?;
        self.base_url = url;
        Ok(self)
    }

    pub fn set_user_agent(&mut self, user_agent: &str) -> Result<&mut Self> {
        if user_agent.trim().is_empty() {
            return Err(WebError::InvalidArgument("user agent must not be empty".to_string()));
        }
        self.user_agent = user_agent.to_string();
        Ok(self)
    }

    pub fn set_timeout(&mut self, timeout: Duration) -> Result<&mut Self> {
        if timeout.is_zero() {
            return Err(WebError::InvalidArgument("timeout must be positive".to_string()));
        }
        self.timeout = Some(timeout);
        Ok(self)
    }

    /// Turning redirects on restores a limit of 1 when none was set.
    pub fn set_follow_redirects(&mut self, follow: bool) -> &mut Self {
        self.follow_redirects = follow;
        if follow && self.max_redirects.is_none() {
            self.max_redirects = Some(1);
        }
        self
    }

    pub fn set_max_redirects(&mut self, max: u32) -> Result<&mut Self> {
        if max == 0 {
            return Err(WebError::InvalidArgument("max redirects must be positive".to_string()));
        }
        self.max_redirects = Some(max);
        Ok(self)
    }

    pub fn set_json_root_override(&mut self, root: &str) -> Result<&mut Self> {
        if root.trim().is_empty() {
            return Err(WebError::InvalidArgument("JSON root must not be empty".to_string()));
        }
        self.json_root_override = Some(root.to_string());
        Ok(self)
    }

    // -- accessors ----------------------------------------------------------

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    pub fn user_agent(&self) -> &str {
        &self.user_agent
    }

    pub fn timeout(&self) -> Option<Duration> {
        self.timeout
    }

    pub fn follow_redirects(&self) -> bool {
        self.follow_redirects
    }

    /// `None` whenever redirects are not followed.
    pub fn max_redirects(&self) -> Option<u32> {
        if self.follow_redirects {
            self.max_redirects
        } else {
            None
        }
    }

    pub fn auth_token(&self) -> &str {
        &self.auth_token
    }

    pub fn json_root_override(&self) -> Option<&str> {
        self.json_root_override.as_deref()
    }

    /// Redirect budget handed to the transport; 0 disables following.
    pub(crate) fn redirect_limit(&self) -> u32 {
        self.max_redirects().unwrap_or(0)
    }
}

impl fmt::Debug for Client {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Client")
            .field("base_url", &self.base_url.as_str())
            .field("user_agent", &self.user_agent)
            .field("timeout", &self.timeout)
            .field("follow_redirects", &self.follow_redirects)
            .field("max_redirects", &self.max_redirects())
            .field("auth_token", &if self.auth_token.is_empty() { "" } else { "<redacted>" })
            .field("json_root_override", &self.json_root_override)
            .finish()
    }
}

fn expand_segments(request: &Request) -> Result<String> {
    let mut resource = request.resource().to_string();
    for segment in request.parameters_of(ParameterKind::UrlSegment) {
        let placeholder = format!("{{{}}}", segment.name);
        if !resource.contains(&placeholder) {
            return Err(WebError::InvalidArgument(format!(
                "resource {:?} has no {placeholder} placeholder",
                request.resource()
            )));
        }
        resource = resource.replace(&placeholder, &encode_segment(&segment.value));
    }
    Ok(resource)
}

// form_urlencoded writes spaces as '+', which a path would keep literally.
fn encode_segment(value: &str) -> String {
    form_urlencoded::byte_serialize(value.as_bytes())
        .collect::<String>()
        .replace('+', "%20")
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;

    fn client() -> Client {
        Client::by_url("http://example.com").unwrap()
    }

    #[test]
    fn defaults() {
        let c = client();
        assert_eq!(c.user_agent(), "DynamoDS");
        assert_eq!(c.timeout(), None);
        assert!(c.follow_redirects());
        assert_eq!(c.max_redirects(), Some(1));
        assert_eq!(c.auth_token(), "");
        assert_eq!(c.json_root_override(), None);
    }

    #[test]
    fn new_rejects_invalid_base_urls() {
        for raw in ["", "example.com", "ftp://example.com", "file:///tmp"] {
            assert!(matches!(Client::by_url(raw), Err(WebError::InvalidUrl { .. })), "{raw}");
        }
    }

    #[test]
    fn token_is_kept() {
        let c = Client::new("https://api.example.com", "s3cret").unwrap();
        assert_eq!(c.auth_token(), "s3cret");
        assert!(!format!("{c:?}").contains("s3cret"));
    }

    #[test]
    fn build_uri_joins_base_and_resource() {
        let req = Request::by_endpoint("users").unwrap();
        assert_eq!(client().build_uri(&req).unwrap(), "http://example.com/users");
    }

    #[test]
    fn build_uri_collapses_slashes() {
        let c = Client::by_url("http://example.com/api/").unwrap();
        let req = Request::by_endpoint("/users").unwrap();
        assert_eq!(c.build_uri(&req).unwrap(), "http://example.com/api/users");
    }

    #[test]
    fn build_uri_uses_the_request_url_without_a_resource() {
        let req = Request::new("https://other.example.org/feed").unwrap();
        assert_eq!(client().build_uri(&req).unwrap(), "https://other.example.org/feed");
    }

    #[test]
    fn build_uri_falls_back_to_the_base_url() {
        let req = Request::default();
        assert_eq!(client().build_uri(&req).unwrap(), "http://example.com/");
    }

    #[test]
    fn build_uri_fills_url_segments() {
        let mut req = Request::by_endpoint("repos/{owner}/{repo}").unwrap();
        req.add_url_segment("owner", "Dynamo DS").unwrap();
        req.add_url_segment("repo", "a/b").unwrap();
        assert_eq!(
            client().build_uri(&req).unwrap(),
            "http://example.com/repos/Dynamo%20DS/a%2Fb"
        );
    }

    #[test]
    fn build_uri_rejects_unknown_segments() {
        let mut req = Request::by_endpoint("users").unwrap();
        req.add_url_segment("id", "1").unwrap();
        assert!(matches!(client().build_uri(&req), Err(WebError::InvalidArgument(_))));
    }

    #[test]
    fn build_uri_appends_query_parameters_in_order() {
        let mut req = Request::by_endpoint("search").unwrap();
        req.add_query_parameter("q", "rust lang").unwrap();
        req.add_parameter("page", "2", ParameterKind::PostOrForm).unwrap();
        assert_eq!(
            client().build_uri(&req).unwrap(),
            "http://example.com/search?q=rust+lang&page=2"
        );
    }

    #[test]
    fn build_uri_extends_an_existing_query() {
        let mut req = Request::new("http://example.com/search?lang=en").unwrap();
        req.add_query_parameter("q", "x").unwrap();
        assert_eq!(
            client().build_uri(&req).unwrap(),
            "http://example.com/search?lang=en&q=x"
        );
    }

    #[test]
    fn build_uri_keeps_form_parameters_out_of_the_query_for_post() {
        let mut req = Request::by_endpoint("login").unwrap();
        req.set_method(HttpMethod::Post).unwrap();
        req.add_parameter("user", "ada", ParameterKind::PostOrForm).unwrap();
        assert_eq!(client().build_uri(&req).unwrap(), "http://example.com/login");
    }

    #[test]
    fn setters_validate_and_chain() {
        let mut c = client();
        c.set_user_agent("Dynamo2.0")
            .unwrap()
            .set_timeout(Duration::from_millis(1500))
            .unwrap()
            .set_max_redirects(5)
            .unwrap()
            .set_json_root_override("data")
            .unwrap();
        assert_eq!(c.user_agent(), "Dynamo2.0");
        assert_eq!(c.timeout(), Some(Duration::from_millis(1500)));
        assert_eq!(c.max_redirects(), Some(5));
        assert_eq!(c.json_root_override(), Some("data"));

        assert!(matches!(c.set_user_agent(""), Err(WebError::InvalidArgument(_))));
        assert!(matches!(c.set_timeout(Duration::ZERO), Err(WebError::InvalidArgument(_))));
        assert!(matches!(c.set_max_redirects(0), Err(WebError::InvalidArgument(_))));
        assert!(matches!(c.set_json_root_override(" "), Err(WebError::InvalidArgument(_))));
    }

    #[test]
    fn max_redirects_is_hidden_when_not_following() {
        let mut c = client();
        c.set_max_redirects(4).unwrap();
        c.set_follow_redirects(false);
        assert_eq!(c.max_redirects(), None);
        assert_eq!(c.redirect_limit(), 0);
        c.set_follow_redirects(true);
        assert_eq!(c.max_redirects(), Some(4));
    }

    #[test]
    fn set_base_url_validates() {
        let mut c = client();
        c.set_base_url("https://api.example.com/v2").unwrap();
        assert_eq!(c.base_url().as_str(), "https://api.example.com/v2");
        assert!(matches!(c.set_base_url("nope"), Err(WebError::InvalidUrl { .. })));
    }

    #[test]
    fn from_config_applies_every_field() {
        let config = ClientConfig {
            base_url: "https://api.example.com".to_string(),
            token: "t".to_string(),
            user_agent: "Host/1.0".to_string(),
            timeout_ms: Some(250),
            follow_redirects: false,
            max_redirects: Some(3),
            json_root: Some("payload".to_string()),
        };
        let c = Client::from_config(&config).unwrap();
        assert_eq!(c.user_agent(), "Host/1.0");
        assert_eq!(c.timeout(), Some(Duration::from_millis(250)));
        assert!(!c.follow_redirects());
        assert_eq!(c.max_redirects(), None);
        assert_eq!(c.auth_token(), "t");
        assert_eq!(c.json_root_override(), Some("payload"));
    }
}
