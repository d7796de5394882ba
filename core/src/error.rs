//! Error types for the web client.
//!
//! # Design
//! One flat enum covers every failure the library reports. Caller mistakes
//! (`InvalidArgument`, `InvalidOperation`, `DuplicateParameter`) are kept
//! apart from URL problems and from transport outcomes so the host can
//! decide which ones are worth surfacing to a user. `MalformedUrl` wraps
//! whatever went wrong while resolving the final URL of an execution.

use thiserror::Error;

use crate::request::ParameterKind;

/// Errors returned by every fallible operation in this crate.
#[derive(Debug, Error)]
pub enum WebError {
    /// Bad caller input: empty name, non-positive value, unknown enum string.
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    /// The string is not an absolute http/https URL.
    #[error("invalid URL {url:?}: {reason}")]
    InvalidUrl { url: String, reason: String },

    /// The URL addresses a local file or an unqualified network share.
    #[error("URL {0:?} addresses a local resource")]
    LocalUriRejected(String),

    /// The final URL of an execution could not be built or validated.
    #[error("malformed URL: {0}")]
    MalformedUrl(#[source] Box<WebError>),

    /// A body or file was attached to a method that cannot carry it.
    #[error("invalid operation: {0}")]
    InvalidOperation(String),

    /// A parameter with the same name already exists for this kind.
    #[error("duplicate {kind} parameter {name:?}")]
    DuplicateParameter { name: String, kind: ParameterKind },

    /// No request was supplied to an execution.
    #[error("no request supplied")]
    NullRequest,

    /// The transport reported an error, or no status at all.
    #[error("network error: {0}")]
    Network(String),

    #[error("request timed out: {0}")]
    Timeout(String),

    #[error("request aborted: {0}")]
    Aborted(String),

    /// A body does not match the requested shape.
    #[error("deserialization failed: {0}")]
    Deserialization(String),

    /// A value could not be serialized into a request body.
    #[error("serialization failed: {0}")]
    Serialization(String),

    /// JSON nesting went past the configured limit.
    #[error("JSON nesting exceeds the maximum depth of {max}")]
    DepthExceeded { max: usize },
}

impl WebError {
    pub(crate) fn invalid_url(url: &str, reason: impl Into<String>) -> Self {
        WebError::InvalidUrl {
            url: url.to_string(),
            reason: reason.into(),
        }
    }

    /// Wrap `self` as the cause of a `MalformedUrl`.
    pub(crate) fn into_malformed(self) -> Self {
        match self {
            WebError::MalformedUrl(_) => self,
            other => WebError::MalformedUrl(Box::new(other)),
        }
    }

    /// Returns `true` for failures reported by the transport after the
    /// request left the process.
    pub fn is_transport(&self) -> bool {
        matches!(
            self,
            WebError::Network(_) | WebError::Timeout(_) | WebError::Aborted(_)
        )
    }
}

pub type Result<T> = std::result::Result<T, WebError>;
