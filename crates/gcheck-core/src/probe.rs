//! Probe and resolver capabilities
//!
//! The engine never talks to the network itself. It drives a
//! [`ProbeBackend`] for every target in a round and uses a
//! [`TargetResolver`] once before the run to pin every host to an address.

use crate::target::Target;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{info, warn};

/// Status reported when the server answered with a response the client
/// rejected as malformed, which is what some DPI boxes inject
pub const BLOCKED_STATUS: u16 = 418;

/// Result of one probe
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "kind", content = "code")]
pub enum ProbeOutcome {
    /// The server answered with this status
    Success(u16),
    /// A protocol answer arrived but was mangled in transit
    Blocked,
    /// No answer within the timeout, or the answer was rejected
    Failure,
    /// The probe could not be carried out at all
    TransportError,
}

impl ProbeOutcome {
    /// Whether the outcome counts towards a round's successes
    pub fn is_success(&self) -> bool {
        matches!(self, ProbeOutcome::Success(_) | ProbeOutcome::Blocked)
    }

    /// Status code, if any
    pub fn code(&self) -> Option<u16> {
        match self {
            ProbeOutcome::Success(code) => Some(*code),
            ProbeOutcome::Blocked => Some(BLOCKED_STATUS),
            ProbeOutcome::Failure | ProbeOutcome::TransportError => None,
        }
    }
}

impl fmt::Display for ProbeOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProbeOutcome::Success(code) => write!(f, "[CODE: {code}] SUCCESS"),
            ProbeOutcome::Blocked => write!(f, "[CODE: {BLOCKED_STATUS}] SUCCESS"),
            ProbeOutcome::Failure => write!(f, "[CODE: 000] FAILURE"),
            ProbeOutcome::TransportError => write!(f, "[CODE: ERR] ERROR  "),
        }
    }
}

/// One target as handed to a backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeRequest {
    /// URL to fetch
    pub address: String,
    /// Address to connect to instead of resolving the host
    pub pinned: Option<IpAddr>,
}

impl ProbeRequest {
    /// Snapshot every target for a round
    pub fn from_targets(targets: &[Target]) -> Vec<Self> {
        targets
            .iter()
            .map(|t| Self {
                address: t.address.clone(),
                pinned: t.pinned,
            })
            .collect()
    }
}

/// Performs network probes.
///
/// Implementations must be safe to call concurrently for distinct targets
/// and must never fail: every problem is reported as an outcome.
#[async_trait]
pub trait ProbeBackend: Send + Sync {
    /// Short backend name for logs
    fn name(&self) -> &'static str;

    /// Probe `address`, connecting to `pinned` instead of resolving the host
    async fn probe(&self, address: &str, pinned: Option<IpAddr>, timeout: Duration) -> ProbeOutcome;

    /// Probe a whole round at once, with at most `max_parallel` requests in
    /// flight.
    ///
    /// Returns one outcome per request in request order, or `None` when the
    /// backend has no batch mode and each target must be probed on its own.
    async fn probe_batch(
        &self,
        _requests: &[ProbeRequest],
        _timeout: Duration,
        _max_parallel: usize,
    ) -> Option<Vec<ProbeOutcome>> {
        None
    }
}

/// Maps host names to addresses ahead of probing
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TargetResolver: Send + Sync {
    /// Resolver description for logs and the report
    fn describe(&self) -> String;

    /// Resolve one host, `None` if it has no usable address
    async fn resolve(&self, host: &str) -> Option<IpAddr>;
}

/// Pin every target to an address, dropping the ones that do not resolve
pub async fn resolve_targets(resolver: &dyn TargetResolver, targets: Vec<Target>) -> Vec<Target> {
    let total = targets.len();
    let mut resolved = Vec::with_capacity(total);

    for mut target in targets {
        match resolver.resolve(target.host()).await {
            Some(addr) => {
                info!(address = %target.address, ip = %addr, "Resolved");
                target.pinned = Some(addr);
                resolved.push(target);
            }
            None => warn!(address = %target.address, "Can't resolve, removing from the list"),
        }
    }

    info!(
        resolver = %resolver.describe(),
        resolved = resolved.len(),
        total,
        "Target resolution finished"
    );
    resolved
}

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::eq;
    use std::net::Ipv4Addr;

    #[test]
    fn test_outcome_success_classes() {
        assert!(ProbeOutcome::Success(200).is_success());
        assert!(ProbeOutcome::Success(404).is_success());
        assert!(ProbeOutcome::Blocked.is_success());
        assert!(!ProbeOutcome::Failure.is_success());
        assert!(!ProbeOutcome::TransportError.is_success());
    }

    #[test]
    fn test_outcome_display() {
        assert_eq!(ProbeOutcome::Success(301).to_string(), "[CODE: 301] SUCCESS");
        assert_eq!(ProbeOutcome::Blocked.to_string(), "[CODE: 418] SUCCESS");
        assert_eq!(ProbeOutcome::Failure.to_string(), "[CODE: 000] FAILURE");
        assert_eq!(ProbeOutcome::Blocked.code(), Some(BLOCKED_STATUS));
        assert_eq!(ProbeOutcome::Failure.code(), None);
    }

    #[tokio::test]
    async fn test_resolve_targets_drops_unresolved() {
        let mut resolver = MockTargetResolver::new();
        resolver
            .expect_resolve()
            .with(eq("good.example"))
            .returning(|_| Some(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))));
        resolver
            .expect_resolve()
            .with(eq("gone.example"))
            .returning(|_| None);
        resolver.expect_describe().returning(|| "mock".to_string());

        let targets = vec![
            Target::new("https://good.example"),
            Target::new("https://gone.example"),
        ];
        let resolved = resolve_targets(&resolver, targets).await;

        assert_eq!(resolved.len(), 1);
        assert_eq!(resolved[0].address, "https://good.example");
        assert_eq!(resolved[0].pinned, Some(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))));
    }
}
