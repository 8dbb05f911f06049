//! In-process HTTPS probes, HTTP/3 included

use super::ProbeOptions;
use async_trait::async_trait;
use gcheck_core::probe::{ProbeBackend, ProbeOutcome};
use gcheck_core::strategy::{IpVersion, Protocol};
use gcheck_core::target::{host_of, TARGET_PORT};
use reqwest::redirect::{Attempt, Policy};
use reqwest::{Client, Proxy, Version};
use std::error::Error as StdError;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::time::Duration;
use tracing::{debug, trace, warn};

/// Error texts produced when a response carries headers the client refuses,
/// which is how DPI-injected answers usually look
const HEADER_REJECTIONS: &[&str] = &[
    "invalid header",
    "malformed",
    "connection-specific",
    "protocol error",
];

/// Probe backend using reqwest.
///
/// A fresh client is built for every probe so the pinned address applies
/// and no connection is reused between strategies.
#[derive(Debug, Clone)]
pub struct NativeBackend {
    options: ProbeOptions,
}

impl NativeBackend {
    /// Create a backend
    pub fn new(options: ProbeOptions) -> Self {
        Self { options }
    }

    fn client_for(&self, host: &str, pinned: Option<IpAddr>, timeout: Duration) -> reqwest::Result<Client> {
        let local = match self.options.ip_version {
            IpVersion::V4 => IpAddr::V4(Ipv4Addr::UNSPECIFIED),
            IpVersion::V6 => IpAddr::V6(Ipv6Addr::UNSPECIFIED),
        };

        let mut builder = Client::builder()
            .timeout(timeout)
            .danger_accept_invalid_certs(self.options.insecure)
            .pool_max_idle_per_host(0)
            .local_address(local)
            .redirect(redirect_policy());

        match (&self.options.proxy, pinned) {
            (Some(proxy), _) => builder = builder.proxy(Proxy::all(proxy.as_str())?),
            (None, Some(ip)) => builder = builder.resolve(host, SocketAddr::new(ip, TARGET_PORT)),
            (None, None) => {}
        }
        if self.http_version().is_some() {
            builder = builder.http3_prior_knowledge();
        }

        builder.build()
    }

    /// Version forced on every request, `None` lets TLS negotiation decide
    fn http_version(&self) -> Option<Version> {
        match self.options.protocol {
            Protocol::Udp => Some(Version::HTTP_3),
            Protocol::Tcp => None,
        }
    }
}

#[async_trait]
impl ProbeBackend for NativeBackend {
    fn name(&self) -> &'static str {
        "native"
    }

    async fn probe(&self, address: &str, pinned: Option<IpAddr>, timeout: Duration) -> ProbeOutcome {
        let client = match self.client_for(host_of(address), pinned, timeout) {
            Ok(client) => client,
            Err(e) => {
                warn!(address, error = %e, "Can't build HTTP client");
                return ProbeOutcome::TransportError;
            }
        };

        let mut request = client.get(address);
        if let Some(version) = self.http_version() {
            request = request.version(version);
        }

        match request.send().await {
            Ok(response) => ProbeOutcome::Success(response.status().as_u16()),
            Err(e) if is_header_rejection(&e) => {
                debug!(address, error = %e, "Response rejected");
                ProbeOutcome::Blocked
            }
            Err(e) => {
                trace!(address, error = %e, "Request failed");
                ProbeOutcome::Failure
            }
        }
    }
}

/// Follow nothing: a redirect within the same second-level domain ends the
/// probe with the redirect response, any other redirect fails it
fn redirect_policy() -> Policy {
    Policy::custom(|attempt: Attempt| {
        let from = attempt
            .previous()
            .first()
            .map(|url| url.as_str().to_string())
            .unwrap_or_default();
        let to = attempt.url().as_str().to_string();
        let from_domain = attempt
            .previous()
            .first()
            .and_then(|url| url.host_str())
            .map(|host| second_level_label(host).to_string());
        let to_domain = attempt.url().host_str().map(|host| second_level_label(host).to_string());

        if from_domain.is_some() && from_domain == to_domain {
            debug!(%from, %to, "Safe redirection");
            attempt.stop()
        } else {
            warn!(%from, %to, "Suspicious redirection, treating as failure");
            attempt.error("bad redirection")
        }
    })
}

/// `example` for `www.example.com`
fn second_level_label(host: &str) -> &str {
    let labels: Vec<&str> = host.trim_end_matches('.').split('.').collect();
    if labels.len() >= 2 {
        labels[labels.len() - 2]
    } else {
        host
    }
}

fn is_header_rejection(err: &reqwest::Error) -> bool {
    let mut source: Option<&(dyn StdError + 'static)> = Some(err);
    while let Some(e) = source {
        let text = e.to_string().to_lowercase();
        if HEADER_REJECTIONS.iter().any(|needle| text.contains(needle)) {
            return true;
        }
        source = e.source();
    }
    false
}
