//! Target resolvers
//!
//! [`DohResolver`] asks a DNS-over-HTTPS server (RFC 8484, POST with an
//! `application/dns-message` body) and is the default. [`SystemResolver`]
//! uses the operating system's resolver.

use crate::dns_wire;
use crate::error::{PlatformError, Result};
use async_trait::async_trait;
use gcheck_core::probe::TargetResolver;
use gcheck_core::strategy::IpVersion;
use gcheck_core::target::TARGET_PORT;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use reqwest::Client;
use std::net::IpAddr;
use std::time::Duration;
use tracing::{debug, info, warn};

const DNS_MESSAGE: &str = "application/dns-message";

/// Resolver backed by the operating system
#[derive(Debug, Clone)]
pub struct SystemResolver {
    version: IpVersion,
}

impl SystemResolver {
    /// Resolve addresses of the given family only
    pub fn new(version: IpVersion) -> Self {
        Self { version }
    }
}

#[async_trait]
impl TargetResolver for SystemResolver {
    fn describe(&self) -> String {
        "system resolver".to_string()
    }

    async fn resolve(&self, host: &str) -> Option<IpAddr> {
        if let Some(literal) = literal_address(host, self.version) {
            return literal;
        }
        match tokio::net::lookup_host((host, TARGET_PORT)).await {
            Ok(addrs) => addrs.map(|a| a.ip()).find(|ip| self.version.matches(ip)),
            Err(e) => {
                debug!(host, error = %e, "System lookup failed");
                None
            }
        }
    }
}

/// DNS-over-HTTPS resolver
#[derive(Debug, Clone)]
pub struct DohResolver {
    url: String,
    client: Client,
    version: IpVersion,
    retries: u32,
}

impl DohResolver {
    /// Create a resolver for one DoH endpoint
    pub fn new(
        url: impl Into<String>,
        version: IpVersion,
        timeout: Duration,
        retries: u32,
        insecure: bool,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(insecure)
            .build()?;
        Ok(Self {
            url: url.into(),
            client,
            version,
            retries,
        })
    }

    /// Endpoint URL
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Look a host up, retrying failed exchanges
    pub async fn lookup(&self, host: &str) -> Result<Option<IpAddr>> {
        if let Some(literal) = literal_address(host, self.version) {
            return Ok(literal);
        }

        let mut attempts_left = self.retries;
        loop {
            match self.exchange(host).await {
                Ok(addr) => return Ok(addr),
                Err(e) if attempts_left > 0 => {
                    debug!(host, resolver = %self.url, attempts_left, error = %e, "Lookup failed, retrying");
                    attempts_left -= 1;
                }
                Err(e) => return Err(e),
            }
        }
    }

    async fn exchange(&self, host: &str) -> Result<Option<IpAddr>> {
        let qtype = dns_wire::query_type(self.version);
        // RFC 8484 recommends id 0 for cache friendliness
        let query = dns_wire::encode_query(0, host, qtype)?;

        let body = self
            .client
            .post(&self.url)
            .header(CONTENT_TYPE, DNS_MESSAGE)
            .header(ACCEPT, DNS_MESSAGE)
            .body(query)
            .send()
            .await?
            .error_for_status()?
            .bytes()
            .await?;

        dns_wire::first_address(&body, qtype)
    }
}

#[async_trait]
impl TargetResolver for DohResolver {
    fn describe(&self) -> String {
        format!("DoH {}", self.url)
    }

    async fn resolve(&self, host: &str) -> Option<IpAddr> {
        match self.lookup(host).await {
            Ok(addr) => addr,
            Err(e) => {
                debug!(host, resolver = %self.url, error = %e, "Can't resolve");
                None
            }
        }
    }
}

/// Pick the first DoH endpoint that resolves `probe_host` to an address of
/// the wanted family
pub async fn select_doh_resolver(
    candidates: &[String],
    probe_host: &str,
    version: IpVersion,
    timeout: Duration,
    retries: u32,
    insecure: bool,
) -> Result<DohResolver> {
    for url in candidates {
        info!(resolver = %url, host = probe_host, "Trying DoH resolver");
        let resolver = match DohResolver::new(url.as_str(), version, timeout, retries, insecure) {
            Ok(resolver) => resolver,
            Err(e) => {
                warn!(resolver = %url, error = %e, "Can't set up resolver");
                continue;
            }
        };
        match resolver.lookup(probe_host).await {
            Ok(Some(addr)) => {
                info!(resolver = %url, %addr, "Resolver works");
                return Ok(resolver);
            }
            Ok(None) => warn!(resolver = %url, "No address of the wanted family"),
            Err(e) => warn!(resolver = %url, error = %e, "Resolver failed"),
        }
    }

    Err(PlatformError::Dns(
        "none of the configured DoH resolvers answered".into(),
    ))
}

/// `Some` if the host is already an IP literal: the address when it has the
/// wanted family, `None` otherwise
fn literal_address(host: &str, version: IpVersion) -> Option<Option<IpAddr>> {
    let ip: IpAddr = host.parse().ok()?;
    Some(version.matches(&ip).then_some(ip))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::Ipv4Addr;

    #[test]
    fn test_literal_address() {
        assert_eq!(literal_address("example.com", IpVersion::V4), None);
        assert_eq!(
            literal_address("192.0.2.1", IpVersion::V4),
            Some(Some(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))))
        );
        assert_eq!(literal_address("192.0.2.1", IpVersion::V6), Some(None));
    }

    #[tokio::test]
    async fn test_system_resolver_literal() {
        let resolver = SystemResolver::new(IpVersion::V4);
        assert_eq!(
            resolver.resolve("127.0.0.1").await,
            Some(IpAddr::V4(Ipv4Addr::LOCALHOST))
        );
        assert_eq!(resolver.resolve("::1").await, None);
    }

    #[tokio::test]
    async fn test_select_with_no_candidates() {
        let result = select_doh_resolver(
            &[],
            "www.w3.org",
            IpVersion::V4,
            Duration::from_secs(1),
            0,
            false,
        )
        .await;
        assert!(matches!(result, Err(PlatformError::Dns(_))));
    }
}
