//! The network seam.
//!
//! # Design
//! The executor turns a `Client` and a `Request` into a plain
//! [`HttpRequest`] and hands it to a [`Transport`]. Transports never fail
//! with an error value: every outcome, including connection failures and
//! timeouts, comes back as an [`HttpResponse`] whose
//! [`ResponseStatus`] tells the executor what happened. Tests swap in a
//! recording transport; production uses [`UreqTransport`].

use std::collections::HashMap;
use std::io;
use std::sync::Mutex;
use std::time::Duration;

use ureq::http;
use ureq::ResponseExt;

use crate::http::{HttpRequest, HttpResponse, ResponseStatus};
use crate::policy::{self, TransportPolicy};

pub trait Transport {
    fn send(&self, request: &HttpRequest) -> HttpResponse;
}

/// Agents are cached per timeout, redirect budget and policy so
/// connections are pooled across calls that share them.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
struct AgentKey {
    timeout: Option<Duration>,
    max_redirects: u32,
    policy: Option<TransportPolicy>,
}

/// Blocking transport backed by `ureq`.
#[derive(Debug, Default)]
pub struct UreqTransport {
    agents: Mutex<HashMap<AgentKey, ureq::Agent>>,
}

impl UreqTransport {
    pub fn new() -> Self {
        Self::default()
    }

    fn agent(&self, request: &HttpRequest) -> ureq::Agent {
        let key = AgentKey {
            timeout: request.timeout,
            max_redirects: request.max_redirects,
            policy: policy::current(),
        };
        // A poisoned cache only holds agents, which stay usable.
        let mut agents = self.agents.lock().unwrap_or_else(|e| e.into_inner());
        agents.entry(key).or_insert_with(|| build_agent(key)).clone()
    }
}

impl Transport for UreqTransport {
    fn send(&self, request: &HttpRequest) -> HttpResponse {
        let method = match http::Method::from_bytes(request.method.as_str().as_bytes()) {
            Ok(m) => m,
            Err(e) => return HttpResponse::failed(ResponseStatus::Error, &request.url, e.to_string()),
        };
        let mut builder = http::Request::builder().method(method).uri(request.url.as_str());
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let agent = self.agent(request);
        let outcome = match &request.body {
            Some(body) => builder.body(body.clone()).map(|req| agent.run(req)),
            None => builder.body(()).map(|req| agent.run(req)),
        };

        match outcome {
            Ok(Ok(response)) => completed(response),
            Ok(Err(e)) => {
                let status = classify(&e);
                HttpResponse::failed(status, &request.url, e.to_string())
            }
            Err(e) => HttpResponse::failed(ResponseStatus::Error, &request.url, e.to_string()),
        }
    }
}

fn build_agent(key: AgentKey) -> ureq::Agent {
    let mut config = ureq::Agent::config_builder()
        .http_status_as_error(false)
        .allow_non_standard_methods(true)
        .max_redirects(key.max_redirects)
        .timeout_global(key.timeout);
    if let Some(policy) = key.policy {
        config = config
            .max_idle_connections_per_host(policy.connection_limit)
            .max_idle_connections(policy.connection_limit.max(10));
        if policy.enforce_modern_tls {
            config = config.tls_config(
                ureq::tls::TlsConfig::builder()
                    .provider(ureq::tls::TlsProvider::Rustls)
                    .build(),
            );
        }
    }
    config.build().new_agent()
}

fn completed(mut response: http::Response<ureq::Body>) -> HttpResponse {
    let status = response.status();
    let url = response.get_uri().to_string();
    let headers = response
        .headers()
        .iter()
        .map(|(name, value)| {
            (
                name.as_str().to_string(),
                String::from_utf8_lossy(value.as_bytes()).into_owned(),
            )
        })
        .collect();
    // ureq caps bodies at 10 MiB unless told otherwise.
    match response.body_mut().with_config().limit(u64::MAX).read_to_vec() {
        Ok(body) => HttpResponse {
            status: ResponseStatus::Completed,
            status_code: status.as_u16(),
            status_description: status.canonical_reason().unwrap_or_default().to_string(),
            url,
            headers,
            body,
            error_message: None,
        },
        Err(e) => {
            let outcome = classify(&e);
            HttpResponse::failed(outcome, &url, e.to_string())
        }
    }
}

fn classify(error: &ureq::Error) -> ResponseStatus {
    match error {
        ureq::Error::Timeout(_) => ResponseStatus::TimedOut,
        ureq::Error::Io(e) => match e.kind() {
            io::ErrorKind::TimedOut => ResponseStatus::TimedOut,
            io::ErrorKind::ConnectionAborted | io::ErrorKind::ConnectionReset => {
                ResponseStatus::Aborted
            }
            _ => ResponseStatus::Error,
        },
        _ => ResponseStatus::Error,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::HttpMethod;

    fn request(url: &str) -> HttpRequest {
        HttpRequest {
            method: HttpMethod::Get,
            url: url.to_string(),
            headers: Vec::new(),
            body: None,
            timeout: Some(Duration::from_millis(500)),
            max_redirects: 1,
        }
    }

    #[test]
    fn refused_connection_is_an_error_status() {
        // Port 9 (discard) is closed on test machines.
        let raw = UreqTransport::new().send(&request("http://127.0.0.1:9/"));
        assert_eq!(raw.status, ResponseStatus::Error);
        assert_eq!(raw.status_code, 0);
        assert!(raw.error_message.is_some());
    }

    #[test]
    fn invalid_header_is_an_error_status() {
        let mut req = request("http://127.0.0.1:9/");
        req.headers.push(("bad header".to_string(), "x".to_string()));
        let raw = UreqTransport::new().send(&req);
        assert_eq!(raw.status, ResponseStatus::Error);
    }

    #[test]
    fn agents_are_reused_per_setting() {
        // Pin the global policy so the cache key is stable across tests.
        policy::ensure_strict();
        let transport = UreqTransport::new();
        let req = request("http://127.0.0.1:9/");
        transport.agent(&req);
        transport.agent(&req);
        let mut other = req.clone();
        other.max_redirects = 0;
        transport.agent(&other);
        assert_eq!(transport.agents.lock().unwrap().len(), 2);
    }

    #[test]
    fn timeouts_and_resets_are_classified() {
        let timed_out = ureq::Error::Io(io::Error::new(io::ErrorKind::TimedOut, "slow"));
        assert_eq!(classify(&timed_out), ResponseStatus::TimedOut);
        let reset = ureq::Error::Io(io::Error::new(io::ErrorKind::ConnectionReset, "reset"));
        assert_eq!(classify(&reset), ResponseStatus::Aborted);
        let other = ureq::Error::Io(io::Error::other("boom"));
        assert_eq!(classify(&other), ResponseStatus::Error);
    }
}
