//! URL validation.
//!
//! Every execution resolves its final URL and runs it through [`validate`]
//! before any I/O happens.

use url::Url;

use crate::error::{Result, WebError};

/// Parse `raw` into an absolute http/https URL.
pub fn parse(raw: &str) -> Result<Url> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(WebError::invalid_url(raw, "URL is empty"));
    }
    let url = Url::parse(trimmed).map_err(|e| WebError::invalid_url(raw, e.to_string()))?;
    match url.scheme() {
        "http" | "https" => Ok(url),
        other => Err(WebError::invalid_url(
            raw,
            format!("scheme {other:?} is not http or https"),
        )),
    }
}

/// Reject URLs that point at the local machine's file system or at a
/// network share; otherwise report whether the scheme name is well formed.
pub fn is_external(url: &Url) -> Result<bool> {
    let unc_host = url.host_str().is_some_and(|h| h.starts_with('\\'));
    if url.scheme() == "file" || url.host().is_none() || unc_host {
        return Err(WebError::LocalUriRejected(url.to_string()));
    }
    Ok(is_scheme_name(url.scheme()))
}

/// [`parse`] followed by [`is_external`].
pub fn validate(raw: &str) -> Result<Url> {
    let url = parse(raw)?;
    if !is_external(&url)? {
        return Err(WebError::invalid_url(raw, "scheme name is not well formed"));
    }
    Ok(url)
}

// RFC 3986: ALPHA *( ALPHA / DIGIT / "+" / "-" / "." )
fn is_scheme_name(scheme: &str) -> bool {
    let mut chars = scheme.chars();
    chars.next().is_some_and(|c| c.is_ascii_alphabetic())
        && chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_http_and_https() {
        assert_eq!(parse("http://example.com").unwrap().host_str(), Some("example.com"));
        assert_eq!(parse("https://example.com/a?b=c").unwrap().path(), "/a");
    }

    #[test]
    fn surrounding_whitespace_is_ignored() {
        assert_eq!(parse("  https://example.com  ").unwrap().as_str(), "https://example.com/");
    }

    #[test]
    fn empty_is_invalid() {
        assert!(matches!(parse(""), Err(WebError::InvalidUrl { .. })));
        assert!(matches!(parse("   "), Err(WebError::InvalidUrl { .. })));
    }

    #[test]
    fn relative_is_invalid() {
        assert!(matches!(parse("users/1"), Err(WebError::InvalidUrl { .. })));
        assert!(matches!(parse("not a url"), Err(WebError::InvalidUrl { .. })));
    }

    #[test]
    fn other_schemes_are_invalid() {
        for raw in ["ftp://example.com/file", "file:///etc/hosts", "mailto:someone@example.com"] {
            let err = parse(raw).unwrap_err();
            assert!(matches!(err, WebError::InvalidUrl { .. }), "{raw}");
        }
    }

    #[test]
    fn file_urls_are_local() {
        let url = Url::parse("file:///etc/hosts").unwrap();
        assert!(matches!(is_external(&url), Err(WebError::LocalUriRejected(_))));
    }

    #[test]
    fn network_share_urls_are_local() {
        let url = Url::parse("file://fileserver/share/report.txt").unwrap();
        assert!(matches!(is_external(&url), Err(WebError::LocalUriRejected(_))));
    }

    #[test]
    fn hostless_urls_are_local() {
        let url = Url::parse("data:text/plain,hello").unwrap();
        assert!(matches!(is_external(&url), Err(WebError::LocalUriRejected(_))));
    }

    #[test]
    fn web_urls_are_external() {
        let url = Url::parse("https://dynamobim.org").unwrap();
        assert!(is_external(&url).unwrap());
    }

    #[test]
    fn scheme_names() {
        assert!(is_scheme_name("http"));
        assert!(is_scheme_name("svn+ssh"));
        assert!(!is_scheme_name("1http"));
        assert!(!is_scheme_name(""));
    }

    #[test]
    fn validate_combines_both_checks() {
        assert!(validate("http://localhost:3000/items").is_ok());
        assert!(matches!(validate("file:///tmp/x"), Err(WebError::InvalidUrl { .. })));
    }
}
