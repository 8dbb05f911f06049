//! Pre-flight network checks

use crate::error::Result;
use gcheck_core::checklist::{cluster_codename, google_cache_url};
use gcheck_core::probe::ProbeBackend;
use reqwest::Client;
use std::net::{IpAddr, Ipv4Addr};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Probe the connectivity-test URL. Any answer counts.
pub async fn check_connectivity(backend: &dyn ProbeBackend, url: &str, timeout: Duration) -> bool {
    info!(url, backend = backend.name(), "Checking connectivity");
    let outcome = backend.probe(url, None, timeout).await;
    if outcome.is_success() {
        info!(%outcome, "Connection seems ok");
        true
    } else {
        warn!(%outcome, "No connection");
        false
    }
}

/// Address of the nearest googlevideo cache node.
///
/// Mapping endpoints are asked in order until one answers with a cluster
/// codename.
pub async fn google_cache_target(mapping_urls: &[String], timeout: Duration, insecure: bool) -> Result<Option<String>> {
    let client = Client::builder()
        .timeout(timeout)
        .danger_accept_invalid_certs(insecure)
        .local_address(IpAddr::V4(Ipv4Addr::UNSPECIFIED))
        .build()?;

    for url in mapping_urls {
        info!(url = %url, "Extracting cluster codename");
        let body = match fetch_text(&client, url).await {
            Ok(body) => body,
            Err(e) => {
                debug!(url = %url, error = %e, "Mapping request failed");
                continue;
            }
        };
        if let Some(codename) = cluster_codename(&body) {
            let target = google_cache_url(codename);
            info!(codename, %target, "Found googlevideo cluster");
            return Ok(Some(target));
        }
        debug!(url = %url, "No codename in the mapping response");
    }

    warn!("Can't determine the googlevideo cluster");
    Ok(None)
}

async fn fetch_text(client: &Client, url: &str) -> reqwest::Result<String> {
    client.get(url).send().await?.error_for_status()?.text().await
}
