//! Probes through a curl subprocess

use super::ProbeOptions;
use async_trait::async_trait;
use gcheck_core::probe::{ProbeBackend, ProbeOutcome, ProbeRequest};
use gcheck_core::strategy::{IpVersion, Protocol};
use gcheck_core::target::{host_of, TARGET_PORT};
use std::net::IpAddr;
use std::path::PathBuf;
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, trace};

#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x08000000;

#[cfg(windows)]
const NULL_DEVICE: &str = "NUL";
#[cfg(not(windows))]
const NULL_DEVICE: &str = "/dev/null";

/// Connections curl keeps open at once in parallel mode
const CURL_PARALLEL_MAX: usize = 300;

/// Probe backend driving a curl subprocess, one process per round
#[derive(Debug, Clone)]
pub struct CurlBackend {
    executable: PathBuf,
    basic_keys: Vec<String>,
    options: ProbeOptions,
}

impl CurlBackend {
    /// Create a backend for the curl executable at `executable`
    pub fn new(executable: impl Into<PathBuf>, basic_keys: Vec<String>, options: ProbeOptions) -> Self {
        Self {
            executable: executable.into(),
            basic_keys,
            options,
        }
    }

    /// Command-line arguments for one probe
    pub fn arguments(&self, address: &str, pinned: Option<IpAddr>, timeout: Duration) -> Vec<String> {
        let mut args = self.common_arguments(timeout);
        args.push("-w".into());
        args.push("%{response_code}".into());
        args.push("-o".into());
        args.push(NULL_DEVICE.into());
        self.push_resolve(&mut args, address, pinned);
        args.push(address.to_string());
        args
    }

    /// Command-line arguments for a whole round in one process.
    ///
    /// Every transfer writes `index$code@` so the output can be matched
    /// back to the requests.
    pub fn batch_arguments(
        &self,
        requests: &[ProbeRequest],
        timeout: Duration,
        max_parallel: usize,
    ) -> Vec<String> {
        let mut args = self.common_arguments(timeout);
        args.push("-w".into());
        args.push("%{urlnum}$%{response_code}@".into());
        if requests.len() > 1 {
            args.push("-Z".into());
            args.push("--parallel-immediate".into());
            args.push("--parallel-max".into());
            args.push(max_parallel.clamp(1, CURL_PARALLEL_MAX).to_string());
        }

        for request in requests {
            args.push(request.address.clone());
            args.push("-o".into());
            args.push(NULL_DEVICE.into());
            self.push_resolve(&mut args, &request.address, request.pinned);
        }
        args
    }

    fn common_arguments(&self, timeout: Duration) -> Vec<String> {
        let mut args = self.basic_keys.clone();
        args.push("-m".into());
        args.push(timeout.as_secs_f64().to_string());
        args.push(
            match self.options.ip_version {
                IpVersion::V4 => "-4",
                IpVersion::V6 => "-6",
            }
            .into(),
        );
        if let Some(proxy) = &self.options.proxy {
            args.push("--proxy".into());
            args.push(proxy.clone());
        }
        if self.options.protocol == Protocol::Udp {
            args.push("--http3-only".into());
        }
        if self.options.insecure {
            args.push("--insecure".into());
        }
        args
    }

    fn push_resolve(&self, args: &mut Vec<String>, address: &str, pinned: Option<IpAddr>) {
        if let (None, Some(ip)) = (&self.options.proxy, pinned) {
            let ip = match ip {
                IpAddr::V4(v4) => v4.to_string(),
                IpAddr::V6(v6) => format!("[{v6}]"),
            };
            args.push("--resolve".into());
            args.push(format!("{}:{}:{}", host_of(address), TARGET_PORT, ip));
        }
    }

    async fn execute(&self, args: Vec<String>) -> std::io::Result<String> {
        let mut cmd = Command::new(&self.executable);
        cmd.args(args)
            .stdin(Stdio::null())
            .stderr(Stdio::null())
            .kill_on_drop(true);

        #[cfg(windows)]
        {
            cmd.creation_flags(CREATE_NO_WINDOW);
        }

        let output = cmd.output().await?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        trace!(status = %output.status, stdout = %stdout, "curl finished");
        Ok(stdout)
    }
}

#[async_trait]
impl ProbeBackend for CurlBackend {
    fn name(&self) -> &'static str {
        "curl"
    }

    async fn probe(&self, address: &str, pinned: Option<IpAddr>, timeout: Duration) -> ProbeOutcome {
        match self.execute(self.arguments(address, pinned, timeout)).await {
            Ok(stdout) => parse_response_code(&stdout),
            Err(e) => {
                debug!(address, error = %e, "Can't run curl");
                ProbeOutcome::TransportError
            }
        }
    }

    async fn probe_batch(
        &self,
        requests: &[ProbeRequest],
        timeout: Duration,
        max_parallel: usize,
    ) -> Option<Vec<ProbeOutcome>> {
        if requests.is_empty() {
            return Some(Vec::new());
        }

        let args = self.batch_arguments(requests, timeout, max_parallel);
        let outcomes = match self.execute(args).await {
            Ok(stdout) => parse_batch_output(&stdout, requests.len()),
            Err(e) => {
                debug!(error = %e, "Can't run curl");
                vec![ProbeOutcome::TransportError; requests.len()]
            }
        };
        Some(outcomes)
    }
}

/// Interpret curl's `%{response_code}` output
fn parse_response_code(stdout: &str) -> ProbeOutcome {
    match stdout.trim().trim_matches('"').parse::<u16>() {
        Ok(0) => ProbeOutcome::Failure,
        Ok(code) => ProbeOutcome::Success(code),
        Err(_) => ProbeOutcome::TransportError,
    }
}

/// Interpret the `index$code@` records of a batched run.
///
/// Transfers curl never reported stay transport errors; records pointing
/// past the last request are ignored.
fn parse_batch_output(stdout: &str, count: usize) -> Vec<ProbeOutcome> {
    let mut outcomes = vec![ProbeOutcome::TransportError; count];

    for record in stdout.split('@') {
        let record = record.trim().trim_matches('"');
        let Some((index, code)) = record.split_once('$') else {
            continue;
        };
        let (Ok(index), Ok(code)) = (index.parse::<usize>(), code.parse::<u16>()) else {
            trace!(record, "Skipping malformed curl record");
            continue;
        };
        if let Some(slot) = outcomes.get_mut(index) {
            *slot = match code {
                0 => ProbeOutcome::Failure,
                code => ProbeOutcome::Success(code),
            };
        }
    }
    outcomes
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::net::{Ipv4Addr, Ipv6Addr};

    fn backend(protocol: Protocol, ip_version: IpVersion, proxy: Option<&str>) -> CurlBackend {
        CurlBackend::new(
            "curl",
            vec!["-s".to_string()],
            ProbeOptions {
                protocol,
                ip_version,
                proxy: proxy.map(str::to_string),
                insecure: false,
            },
        )
    }

    #[test]
    fn test_arguments_pin_address() {
        let args = backend(Protocol::Tcp, IpVersion::V4, None).arguments(
            "https://example.com",
            Some(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))),
            Duration::from_secs(2),
        );
        assert_eq!(
            args,
            vec![
                "-s",
                "-m",
                "2",
                "-4",
                "-w",
                "%{response_code}",
                "-o",
                NULL_DEVICE,
                "--resolve",
                "example.com:443:192.0.2.1",
                "https://example.com",
            ]
        );
    }

    #[test]
    fn test_arguments_v6_and_http3() {
        let args = backend(Protocol::Udp, IpVersion::V6, None).arguments(
            "https://example.com",
            Some(IpAddr::V6(Ipv6Addr::LOCALHOST)),
            Duration::from_millis(1500),
        );
        assert!(args.contains(&"-6".to_string()));
        assert!(args.contains(&"--http3-only".to_string()));
        assert!(args.contains(&"1.5".to_string()));
        assert!(args.contains(&"example.com:443:[::1]".to_string()));
    }

    #[test]
    fn test_arguments_with_proxy_skip_resolve() {
        let args = backend(Protocol::Tcp, IpVersion::V4, Some("socks5://127.0.0.1:1080")).arguments(
            "https://example.com",
            Some(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))),
            Duration::from_secs(2),
        );
        assert!(args.windows(2).any(|w| w == ["--proxy", "socks5://127.0.0.1:1080"]));
        assert!(!args.contains(&"--resolve".to_string()));
    }

    #[test]
    fn test_parse_response_code() {
        assert_eq!(parse_response_code("200"), ProbeOutcome::Success(200));
        assert_eq!(parse_response_code("\"301\"\n"), ProbeOutcome::Success(301));
        assert_eq!(parse_response_code("000"), ProbeOutcome::Failure);
        assert_eq!(parse_response_code(""), ProbeOutcome::TransportError);
    }

    #[tokio::test]
    async fn test_missing_curl_is_transport_error() {
        let backend = CurlBackend::new(
            "/definitely/not/curl",
            Vec::new(),
            backend(Protocol::Tcp, IpVersion::V4, None).options,
        );
        let outcome = backend
            .probe("https://example.com", None, Duration::from_secs(1))
            .await;
        assert_eq!(outcome, ProbeOutcome::TransportError);
    }

    // =========== Batch Tests ===========

    fn requests() -> Vec<ProbeRequest> {
        vec![
            ProbeRequest {
                address: "https://a.example".to_string(),
                pinned: Some(IpAddr::V4(Ipv4Addr::new(192, 0, 2, 1))),
            },
            ProbeRequest {
                address: "https://b.example/path".to_string(),
                pinned: None,
            },
        ]
    }

    #[test]
    fn test_batch_arguments() {
        let args = backend(Protocol::Tcp, IpVersion::V4, None).batch_arguments(
            &requests(),
            Duration::from_secs(2),
            1000,
        );
        assert_eq!(
            args,
            vec![
                "-s",
                "-m",
                "2",
                "-4",
                "-w",
                "%{urlnum}$%{response_code}@",
                "-Z",
                "--parallel-immediate",
                "--parallel-max",
                "300",
                "https://a.example",
                "-o",
                NULL_DEVICE,
                "--resolve",
                "a.example:443:192.0.2.1",
                "https://b.example/path",
                "-o",
                NULL_DEVICE,
            ]
        );
    }

    #[test]
    fn test_batch_arguments_single_request_runs_serially() {
        let args = backend(Protocol::Udp, IpVersion::V4, Some("socks5://127.0.0.1:1080"))
            .batch_arguments(&requests()[..1], Duration::from_secs(2), 8);
        assert!(!args.contains(&"-Z".to_string()));
        assert!(!args.contains(&"--resolve".to_string()));
        assert!(args.contains(&"--http3-only".to_string()));
    }

    #[test]
    fn test_parse_batch_output() {
        let outcomes = parse_batch_output("1$200@0$000@7$204@garbage@", 3);
        assert_eq!(
            outcomes,
            vec![
                ProbeOutcome::Failure,
                ProbeOutcome::Success(200),
                ProbeOutcome::TransportError,
            ]
        );
        assert_eq!(parse_batch_output("", 2), vec![ProbeOutcome::TransportError; 2]);
    }

    #[tokio::test]
    async fn test_missing_curl_fails_whole_batch() {
        let backend = CurlBackend::new(
            "/definitely/not/curl",
            Vec::new(),
            backend(Protocol::Tcp, IpVersion::V4, None).options,
        );
        let outcomes = backend
            .probe_batch(&requests(), Duration::from_secs(1), 4)
            .await;
        assert_eq!(outcomes, Some(vec![ProbeOutcome::TransportError; 2]));
        assert_eq!(backend.probe_batch(&[], Duration::from_secs(1), 4).await, Some(Vec::new()));
    }
}
