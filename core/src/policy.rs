//! Process-wide transport policy.
//!
//! # Design
//! Some hosts talk to servers that refuse anything below TLS 1.2 and run
//! many calls against the same host. The policy is installed at most once
//! per process; every transport built afterwards picks it up. Hosts should
//! call [`install`] at startup. A request with `force_security_protocol`
//! installs [`TransportPolicy::strict`] on its first execution when nothing
//! was installed yet.

use std::sync::OnceLock;

/// Idle connections ureq keeps per host by default.
const DEFAULT_IDLE_PER_HOST: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TransportPolicy {
    /// Pin the rustls provider, which negotiates TLS 1.2 or newer only.
    pub enforce_modern_tls: bool,
    /// Idle connections kept per host.
    pub connection_limit: usize,
}

impl TransportPolicy {
    /// Modern TLS with ten times ureq's default of 3 idle connections per
    /// host.
    ///
    /// ureq already defaults to rustls, so the TLS half only pins that
    /// provider explicitly; the behavior change is the connection ceiling.
    pub fn strict() -> Self {
        TransportPolicy {
            enforce_modern_tls: true,
            connection_limit: DEFAULT_IDLE_PER_HOST * 10,
        }
    }
}

static POLICY: OnceLock<TransportPolicy> = OnceLock::new();

/// Install `policy` for the rest of the process.
///
/// Returns `false` when a policy was already installed; the first one stays
/// in effect.
pub fn install(policy: TransportPolicy) -> bool {
    let installed = POLICY.set(policy).is_ok();
    if installed {
        tracing::info!(
            enforce_modern_tls = policy.enforce_modern_tls,
            connection_limit = policy.connection_limit,
            "transport policy installed"
        );
    }
    installed
}

pub fn current() -> Option<TransportPolicy> {
    POLICY.get().copied()
}

pub(crate) fn ensure_strict() {
    if POLICY.get().is_none() {
        install(TransportPolicy::strict());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    // The policy is global to the test binary, so everything that touches it
    // lives in this one test.
    #[test]
    fn first_install_wins() {
        ensure_strict();
        let strict = TransportPolicy::strict();
        assert_eq!(current(), Some(strict));
        assert!(strict.enforce_modern_tls);
        assert_eq!(strict.connection_limit, 30);

        let relaxed = TransportPolicy {
            enforce_modern_tls: false,
            connection_limit: 1,
        };
        assert!(!install(relaxed));
        assert_eq!(current(), Some(strict));

        ensure_strict();
        assert_eq!(current(), Some(strict));
    }
}
