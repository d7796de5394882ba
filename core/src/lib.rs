//! Synchronous HTTP client core for parametric design hosts.
//!
//! # Overview
//! Three abstractions cover the whole surface: a [`Client`] (endpoint
//! configuration), a [`Request`] (mutable builder) and a [`Response`]
//! (immutable snapshot). An [`Executor`] runs a request through a
//! [`Transport`]; the default transport is blocking `ureq`.
//!
//! # Design
//! - URL resolution is pure: [`Client::build_uri`] shows the final URL of a
//!   request without sending anything.
//! - The transport sees only plain data ([`HttpRequest`] in,
//!   [`HttpResponse`] out), so execution is testable without a network.
//! - Response bodies can be flattened into a [`GenericValue`] tree or
//!   deserialized into any serde type.
//! - Every fallible call returns [`WebError`]; nothing panics on caller
//!   input.
//! - The library emits `tracing` events and never installs a subscriber.

pub mod client;
pub mod config;
pub mod error;
pub mod executor;
pub mod http;
pub mod json;
pub mod policy;
pub mod request;
pub mod response;
pub mod transport;
pub mod uri;

pub use client::{Client, DEFAULT_USER_AGENT};
pub use config::ClientConfig;
pub use error::{Result, WebError};
pub use executor::Executor;
pub use http::{DataFormat, HttpMethod, HttpRequest, HttpResponse, ResponseStatus};
pub use json::{FlattenOptions, GenericValue};
pub use policy::TransportPolicy;
pub use request::{FileAttachment, Parameter, ParameterKind, Request, RequestBody};
pub use response::{Cookie, Response};
pub use transport::{Transport, UreqTransport};
