//! Probe targets and their per-run bookkeeping

use crate::probe::ProbeOutcome;
use serde::Serialize;
use std::net::IpAddr;

/// Port every target is probed on
pub const TARGET_PORT: u16 = 443;

/// Best strategy recorded for a target
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BestStrategy {
    /// Index into the strategy list
    pub index: usize,
    /// Strategy score when it was recorded
    pub score: usize,
}

/// A probe destination
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Target {
    /// Normalized address, `https://<host>`
    pub address: String,
    /// Address the host resolved to before probing
    pub pinned: Option<IpAddr>,
    /// Outcome of the most recent probe
    pub last_outcome: Option<ProbeOutcome>,
    /// Any probe during the run succeeded
    pub has_successes: bool,
    /// Best strategy seen so far
    pub best: Option<BestStrategy>,
}

impl Target {
    /// Create a target for a normalized address
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            pinned: None,
            last_outcome: None,
            has_successes: false,
            best: None,
        }
    }

    /// Host part of the address
    pub fn host(&self) -> &str {
        host_of(&self.address)
    }

    /// Store a probe outcome. Successes are remembered for the whole run.
    pub fn record_outcome(&mut self, outcome: ProbeOutcome) {
        self.last_outcome = Some(outcome);
        if outcome.is_success() {
            self.has_successes = true;
        }
    }

    /// Whether the most recent probe succeeded
    pub fn last_succeeded(&self) -> bool {
        self.last_outcome.is_some_and(|o| o.is_success())
    }

    /// Offer a finished strategy as this target's best.
    ///
    /// Only the outcome of the strategy's final round is consulted: a target
    /// that succeeded in earlier rounds but failed the last one does not
    /// credit the strategy. Equal scores keep the incumbent.
    pub fn offer_best(&mut self, index: usize, score: usize) -> bool {
        if !self.last_succeeded() {
            return false;
        }
        if self.best.is_some_and(|best| best.score >= score) {
            return false;
        }
        self.best = Some(BestStrategy { index, score });
        true
    }
}

/// Host part of an `http(s)://host[:port]/path` address
pub fn host_of(address: &str) -> &str {
    let rest = address
        .split_once("://")
        .map_or(address, |(_, rest)| rest);
    let end = rest.find(&['/', '?', '#'][..]).unwrap_or(rest.len());
    let authority = &rest[..end];

    if authority.starts_with('[') {
        return authority
            .find(']')
            .map_or(authority, |close| &authority[1..close]);
    }
    authority.split(':').next().unwrap_or(authority)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_host_of() {
        assert_eq!(host_of("https://example.com"), "example.com");
        assert_eq!(host_of("https://example.com:8443/path"), "example.com");
        assert_eq!(host_of("example.com/a/b"), "example.com");
        assert_eq!(host_of("https://[2001:db8::1]:443/"), "2001:db8::1");
    }

    #[test]
    fn test_success_flag_is_sticky() {
        let mut target = Target::new("https://example.com");
        target.record_outcome(ProbeOutcome::Success(200));
        target.record_outcome(ProbeOutcome::Failure);
        assert!(target.has_successes);
        assert!(!target.last_succeeded());
    }

    #[test]
    fn test_blocked_counts_as_success() {
        let mut target = Target::new("https://example.com");
        target.record_outcome(ProbeOutcome::Blocked);
        assert!(target.has_successes);
        assert!(target.last_succeeded());
    }

    #[test]
    fn test_offer_best_strictly_greater() {
        let mut target = Target::new("https://example.com");
        target.record_outcome(ProbeOutcome::Success(200));

        assert!(target.offer_best(0, 2));
        assert!(!target.offer_best(1, 2));
        assert!(!target.offer_best(2, 1));
        assert!(target.offer_best(3, 3));
        assert_eq!(target.best, Some(BestStrategy { index: 3, score: 3 }));
    }

    #[test]
    fn test_offer_best_requires_last_success() {
        let mut target = Target::new("https://example.com");
        target.record_outcome(ProbeOutcome::Success(200));
        target.record_outcome(ProbeOutcome::TransportError);
        assert!(!target.offer_best(0, 5));
        assert!(target.best.is_none());
    }
}
