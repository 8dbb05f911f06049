//! Strategy lists and their compiled form
//!
//! A strategy list is a line-oriented text file:
//!
//! ```text
//! / comment
//! #PROTO=TCP
//! #IPV=4
//! #PROXY=
//! #KEY#--split-pos=1;--split-pos=2#
//! #KEY#ttl#--ttl=4;--ttl=5#
//! #ENDGROUP#
//! ```
//!
//! Every `#KEY#` line declares a parameter group, and `#ENDGROUP#` expands
//! the groups declared since the previous terminator into the cartesian
//! product of their alternatives. Compiled strategies are normalized and
//! deduplicated; see [`compile`].

mod expand;
mod parser;
mod substitution;

pub use parser::{compile, compile_file};
pub use substitution::SubstitutionTable;

use serde::{Deserialize, Serialize};
use std::fmt;

/// Transport protocol probed by a strategy list
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum Protocol {
    /// TCP (HTTPS over TLS)
    Tcp,
    /// UDP (HTTP/3 over QUIC)
    Udp,
}

impl fmt::Display for Protocol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Protocol::Tcp => write!(f, "TCP"),
            Protocol::Udp => write!(f, "UDP"),
        }
    }
}

/// IP family used for resolution and probing
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum IpVersion {
    /// IPv4
    #[default]
    V4,
    /// IPv6
    V6,
}

impl IpVersion {
    /// Numeric version, 4 or 6
    pub fn number(self) -> u8 {
        match self {
            IpVersion::V4 => 4,
            IpVersion::V6 => 6,
        }
    }

    /// Whether an address belongs to this family
    pub fn matches(self, addr: &std::net::IpAddr) -> bool {
        match self {
            IpVersion::V4 => addr.is_ipv4(),
            IpVersion::V6 => addr.is_ipv6(),
        }
    }
}

impl fmt::Display for IpVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.number())
    }
}

/// One independently varying axis of a strategy
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ParameterGroup {
    /// Optional label from the `#KEY#name#...#` form
    pub name: Option<String>,
    /// Alternative tokens, never empty
    pub alternatives: Vec<String>,
}

/// Evaluation progress of a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StrategyState {
    /// Not run yet
    #[default]
    Pending,
    /// All rounds finished
    Completed,
    /// The run was stopped while this strategy was active
    Interrupted,
}

/// One concrete, deduplicated set of invocation tokens
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Strategy {
    /// Tokens passed to the external program, in order
    pub tokens: Vec<String>,
    /// Pessimistic score; `None` until the first round is measured
    pub score: Option<usize>,
    /// Score stayed above zero across all rounds
    pub has_successes: bool,
    /// Evaluation progress
    pub state: StrategyState,
}

impl Strategy {
    /// Create an unmeasured strategy
    pub fn new(tokens: Vec<String>) -> Self {
        Self {
            tokens,
            score: None,
            has_successes: false,
            state: StrategyState::Pending,
        }
    }

    /// Whether at least one round has been scored
    pub fn is_measured(&self) -> bool {
        self.score.is_some()
    }

    /// Fold one round's success count into the score.
    ///
    /// The score only ever moves down. Returns `true` if it changed.
    pub fn record_round(&mut self, successes: usize) -> bool {
        match self.score {
            Some(current) if current <= successes => false,
            _ => {
                self.score = Some(successes);
                true
            }
        }
    }

    /// Tokens joined the way they appear on a command line
    pub fn command_line(&self) -> String {
        self.tokens.join(" ")
    }
}

impl fmt::Display for Strategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.tokens.join(" "))
    }
}

/// Result of compiling a strategy list
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StrategySet {
    /// Probed protocol
    pub protocol: Protocol,
    /// IP family, IPv4 unless declared
    pub ip_version: IpVersion,
    /// Proxy address, `None` for direct connections
    pub proxy: Option<String>,
    /// Surviving strategies in generation order
    pub strategies: Vec<Strategy>,
}

impl StrategySet {
    /// Transport label such as `tcp4` or `udp6`
    pub fn transport(&self) -> &'static str {
        match (self.protocol, self.ip_version) {
            (Protocol::Tcp, IpVersion::V4) => "tcp4",
            (Protocol::Tcp, IpVersion::V6) => "tcp6",
            (Protocol::Udp, IpVersion::V4) => "udp4",
            (Protocol::Udp, IpVersion::V6) => "udp6",
        }
    }

    /// Number of strategies
    pub fn len(&self) -> usize {
        self.strategies.len()
    }

    /// Whether no strategies survived
    pub fn is_empty(&self) -> bool {
        self.strategies.is_empty()
    }
}
