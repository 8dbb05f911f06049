//! Probe backends
//!
//! - [`NativeBackend`]: in-process HTTPS and HTTP/3 client (reqwest)
//! - [`CurlBackend`]: one curl subprocess per round, needed for proxies

mod curl;
mod native;

pub use curl::CurlBackend;
pub use native::NativeBackend;

use gcheck_core::strategy::{IpVersion, Protocol, StrategySet};

/// Connection parameters shared by both backends
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProbeOptions {
    /// Probed protocol
    pub protocol: Protocol,
    /// IP family to connect over
    pub ip_version: IpVersion,
    /// Proxy every probe goes through
    pub proxy: Option<String>,
    /// Skip certificate verification
    pub insecure: bool,
}

impl ProbeOptions {
    /// Options matching a compiled strategy list
    pub fn for_set(set: &StrategySet, insecure: bool) -> Self {
        Self {
            protocol: set.protocol,
            ip_version: set.ip_version,
            proxy: set.proxy.clone(),
            insecure,
        }
    }

    /// Same options with certificate verification disabled
    pub fn insecure(&self) -> Self {
        Self {
            insecure: true,
            ..self.clone()
        }
    }
}
