//! Settings management for GoodCheck
//!
//! A strongly-typed settings file with TOML support. Every section falls
//! back to the built-in defaults, so an empty file is a valid configuration.

mod program;

pub use program::{ProgramConfig, ProgramKind};

use crate::error::{Error, Result};
use crate::strategy::SubstitutionTable;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use std::time::Duration;

/// Largest accepted `general.max_parallel_probes`
pub const MAX_PARALLEL_PROBES: usize = 4096;

/// Main settings structure
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// General evaluation settings
    pub general: GeneralConfig,

    /// Target resolution settings
    pub resolver: ResolverConfig,

    /// Placeholder substitution table for strategy lists
    pub payloads: PayloadsConfig,

    /// Fooling programs
    pub programs: ProgramsConfig,

    /// Curl executable used by the subprocess probe backend
    pub curl: CurlConfig,

    /// Process and service cleanup
    pub lifecycle: LifecycleConfig,
}

impl Settings {
    /// Load settings from a TOML file
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|_| Error::SettingsNotFound {
            path: path.display().to_string(),
        })?;
        Self::from_toml(&content)
    }

    /// Parse settings from TOML string
    pub fn from_toml(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(Error::from)
    }

    /// Serialize to TOML string
    pub fn to_toml(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Settings(e.to_string()))
    }

    /// Validate the settings
    pub fn validate(&self) -> Result<()> {
        if self.general.connection_timeout_secs == 0 {
            return Err(Error::settings_value(
                "general.connection_timeout_secs",
                "Must be greater than 0",
            ));
        }
        if self.general.internal_timeout_ms == 0 {
            return Err(Error::settings_value(
                "general.internal_timeout_ms",
                "Must be greater than 0",
            ));
        }
        if self.general.max_parallel_probes == 0 {
            return Err(Error::settings_value(
                "general.max_parallel_probes",
                "Must be greater than 0",
            ));
        }
        if self.general.max_parallel_probes > MAX_PARALLEL_PROBES {
            return Err(Error::settings_value(
                "general.max_parallel_probes",
                format!("Must be at most {MAX_PARALLEL_PROBES}"),
            ));
        }
        if self.resolver.use_doh && self.resolver.doh_resolvers.is_empty() {
            return Err(Error::settings_value(
                "resolver.doh_resolvers",
                "At least one resolver is required when use_doh is enabled",
            ));
        }

        let mut masks = HashSet::new();
        for (key, placeholder) in self.payloads.entries() {
            if placeholder.mask.is_empty() {
                return Err(Error::settings_value(format!("payloads.{key}.mask"), "Mask is empty"));
            }
            if !masks.insert(placeholder.mask.as_str()) {
                return Err(Error::settings_value(
                    format!("payloads.{key}.mask"),
                    format!("Mask '{}' is used more than once", placeholder.mask),
                ));
            }
        }
        hex::decode(&self.payloads.fake_hex_stream_tcp.value)?;
        hex::decode(&self.payloads.fake_hex_stream_udp.value)?;

        for kind in ProgramKind::ALL {
            if self.programs.get(kind).executable.is_empty() {
                return Err(Error::settings_value(
                    format!("programs.{}.executable", kind.name()),
                    "Executable name is empty",
                ));
            }
        }

        Ok(())
    }

    /// Per-probe timeout
    pub fn connection_timeout(&self) -> Duration {
        Duration::from_secs(self.general.connection_timeout_secs)
    }

    /// Settle delay between program launch and probing, also the jitter bound
    pub fn internal_timeout(&self) -> Duration {
        Duration::from_millis(self.general.internal_timeout_ms)
    }
}

/// General evaluation settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GeneralConfig {
    /// Per-probe timeout in seconds
    pub connection_timeout_secs: u64,
    /// Settle delay and jitter upper bound in milliseconds
    pub internal_timeout_ms: u64,
    /// Maximum probes in flight within one round
    pub max_parallel_probes: usize,
    /// Check basic connectivity before the run
    pub connectivity_test: bool,
    /// URL used by the connectivity check
    pub connectivity_test_url: String,
    /// Disable certificate verification for probes
    pub skip_cert_verify: bool,
    /// Add the nearest googlevideo cache node as a target
    pub auto_google_cache: bool,
    /// Endpoints reporting the googlevideo cluster mapping
    pub mapping_urls: Vec<String>,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            connection_timeout_secs: 2,
            internal_timeout_ms: 100,
            max_parallel_probes: 200,
            connectivity_test: true,
            connectivity_test_url: "https://www.w3.org".to_string(),
            skip_cert_verify: false,
            auto_google_cache: true,
            mapping_urls: vec![
                "https://redirector.gvt1.com/report_mapping?di=no".to_string(),
                "https://redirector.googlevideo.com/report_mapping?di=no".to_string(),
            ],
        }
    }
}

/// Target resolution settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ResolverConfig {
    /// Resolve targets through DNS-over-HTTPS
    pub use_doh: bool,
    /// Candidate DoH resolvers, tried in order
    pub doh_resolvers: Vec<String>,
    /// Per-query timeout in seconds
    pub timeout_secs: u64,
    /// Additional attempts after a failed query
    pub retries: u32,
}

impl Default for ResolverConfig {
    fn default() -> Self {
        Self {
            use_doh: true,
            doh_resolvers: [
                "https://dns.comss.one/dns-query",
                "https://one.one.one.one/dns-query",
                "https://1.1.1.2/dns-query",
                "https://dns.google/dns-query",
                "https://mozilla.cloudflare-dns.com/dns-query",
                "https://dns10.quad9.net/dns-query",
                "https://dns.controld.com/comss",
                "https://freedns.controld.com/p0",
            ]
            .iter()
            .map(|s| (*s).to_string())
            .collect(),
            timeout_secs: 2,
            retries: 2,
        }
    }
}

/// One placeholder mask and the literal it expands to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placeholder {
    /// Text searched for in strategy tokens
    pub mask: String,
    /// Replacement text
    pub value: String,
}

impl Placeholder {
    fn new(mask: &str, value: &str) -> Self {
        Self {
            mask: mask.to_string(),
            value: value.to_string(),
        }
    }
}

/// Placeholder substitution table
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PayloadsConfig {
    /// Fake SNI host name
    pub fake_sni: Placeholder,
    /// Fake TLS ClientHello as a hex stream
    pub fake_hex_stream_tcp: Placeholder,
    /// Fake QUIC Initial as a hex stream
    pub fake_hex_stream_udp: Placeholder,
    /// Fake TLS ClientHello as escaped bytes
    pub fake_hex_bytes_tcp: Placeholder,
    /// Fake QUIC Initial as escaped bytes
    pub fake_hex_bytes_udp: Placeholder,
    /// Path to the TCP payload file
    pub payload_tcp: Placeholder,
    /// Path to the UDP payload file
    pub payload_udp: Placeholder,
}

impl Default for PayloadsConfig {
    fn default() -> Self {
        Self {
            fake_sni: Placeholder::new("FAKESNI", "www.google.com"),
            fake_hex_stream_tcp: Placeholder::new(
                "FAKEHEXSTREAMTCP",
                "1603030135010001310303424143facf5c983ac8ff20b819cfd634cbf5143c0005b2b8b142a6cd335012c220008969b6b387683dedb4114d466ca90be3212b2bde0c4f56261a9801",
            ),
            fake_hex_stream_udp: Placeholder::new(
                "FAKEHEXSTREAMUDP",
                "c200000001142ee3e35f6bbb23a8e65da97821cfc2724c8fc45e14232336e9c50386557b4c7aa7e19f321903124424008000047c0dfcfa1dcd73ba2a9093b3eef743c585daff453c02305bbae9437cc89b07f6bcf4dd447ab0c6903c0049ef59a8e418f8e091d371f7257b180f85d878484e63ea2306f35e445701d95ae90c70bb372f25d683efa453f174105f07",
            ),
            fake_hex_bytes_tcp: Placeholder::new(
                "FAKEHEXBYTESTCP",
                r":\x16\x03\x03\x01\x3b\x01\x00\x01\x37\x03\x03\xad\xe3\x84\x4a\xd1\x64\xc3\x78\xdd\xe2\x42\xb6\x7a\x17\x74\xe6\x4b\xc0\x2a\xcb\x4a\x2f\x74\x74\x23\xf0\x43\x8d\x61\x2a\x7b\x10\x20\x43\x7d\xae\x47\x24\xba\x27\xfe\x70\x27\x80\x75\xd1\xa5\x33\x60\x29\x78\xb2\xca\xe7\x3e\x19\xb6\x87\x8d\xe5\x38\xdf\xab\x1b\x2b\x00\x5c\x13\x02\x13\x03\x13\x01\xc0\x30\xc0\x2c\xc0\x28\xc0\x24\xc0\x14\xc0\x0a\x00\x9f\x00\x6b\x00\x39\xcc\xa9\xcc\xa8\xcc\xaa\x00\xc4\x00\x88\x00\x9d\x00\x3d\x00\x35\x00\xc0\x00\x84\xc0\x2f\xc0\x2b\xc0\x27\xc0\x23\xc0\x13\xc0\x09\x00\x9e\x00\x67\x00\x33\x00\xbe\x00\x45\x00\x9c\x00\x3c\x00\x2f\x00\xba\x00\x41\xc0\x11\xc0\x07\x00\x05\xc0\x12\xc0\x08\x00\x16\x00\x0a\x00\xff\x01\x00\x00\x92\x00\x0a\x00\x0a\x00\x08\x00\x1d\x00\x17\x00\x18\x00\x19\x00\x00\x00\x19\x00\x17\x00\x00\x14\x74\x72\x61\x6e\x73\x6c\x61\x74\x65\x2e\x67\x6f\x6f\x67\x6c\x65\x2e\x63\x6f\x6d\x00\x0b\x00\x02\x01\x00\x00\x10\x00\x0e\x00\x0c\x02\x68\x32\x08\x68\x74\x74\x70\x2f\x31\x2e\x31\x00\x0d\x00\x18\x00\x16\x08\x06\x06\x01\x06\x03\x08\x05\x05\x01\x05\x03\x08\x04\x04\x01\x04\x03\x02\x01\x02\x03\x00\x2b\x00\x05\x04\x03\x04\x03\x03\x00\x33\x00\x26\x00\x24\x00\x1d\x00\x20\x43\xc9\xea\x84\x67\x5a\x9f\xcb\x6f\x02\xb9\x78\x44\x1e\xa9\x07\x77\xbd\xcb\x62\xdc\x87\x23\x3b\x1c\xae\x71\x19\xa3\xa6\x80\x0d",
            ),
            fake_hex_bytes_udp: Placeholder::new(
                "FAKEHEXBYTESUDP",
                r":\xc2\x00\x00\x00\x01\x14\x2e\xe3\xe3\x5f\x6b\xbb\x23\xa8\xe6\x5d\xa9\x78\x21\xcf\xc2\x72\x4c\x8f\xc4\x5e\x14\x23\x23\x36\xe9\xc5\x03\x86\x55\x7b\x4c\x7a\xa7\xe1\x9f\x32\x19\x03\x12\x44\x24\x00\x80\x00\x04\x7c\x0d\xfc\xfa\x1d\xcd\x73\xba\x2a\x90\x93\xb3\xee\xf7\x43\xc5\x85\xda\xff\x45\x3c\x02\x30\x5b\xba\xe9\x43\x7c\xc8\x9b\x07\xf6\xbc\xf4\xdd\x44\x7a\xb0\xc6\x90\x3c\x00\x49\xef\x59\xa8\xe4\x18\xf8\xe0\x91\xd3\x71\xf7\x25\x7b\x18\x0f\x85\xd8\x78\x48\x4e\x63\xea\x23\x06\xf3\x5e\x44\x57\x01\xd9\x5a\xe9\x0c\x70\xbb\x37\x2f\x25\xd6\x83\xef\xa4\x53\xf1\x74\x10\x5f\x07",
            ),
            payload_tcp: Placeholder::new("PAYLOADTCP", "Payloads/default_tcp.bin"),
            payload_udp: Placeholder::new("PAYLOADUDP", "Payloads/default_udp.bin"),
        }
    }
}

impl PayloadsConfig {
    /// Entries in substitution order, keyed by their settings name
    pub fn entries(&self) -> [(&'static str, &Placeholder); 7] {
        [
            ("fake_sni", &self.fake_sni),
            ("fake_hex_stream_tcp", &self.fake_hex_stream_tcp),
            ("fake_hex_stream_udp", &self.fake_hex_stream_udp),
            ("fake_hex_bytes_tcp", &self.fake_hex_bytes_tcp),
            ("fake_hex_bytes_udp", &self.fake_hex_bytes_udp),
            ("payload_tcp", &self.payload_tcp),
            ("payload_udp", &self.payload_udp),
        ]
    }

    /// Payload file paths referenced by the table
    pub fn payload_files(&self) -> [&str; 2] {
        [&self.payload_tcp.value, &self.payload_udp.value]
    }

    /// Build the substitution table used by the strategy compiler
    pub fn substitution_table(&self) -> SubstitutionTable {
        let mut table = SubstitutionTable::new();
        for (_, placeholder) in self.entries() {
            table.push(&placeholder.mask, &placeholder.value);
        }
        table
    }
}

/// Fooling program settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ProgramsConfig {
    /// GoodbyeDPI
    pub goodbyedpi: ProgramConfig,
    /// Zapret
    pub zapret: ProgramConfig,
    /// ByeDPI
    pub byedpi: ProgramConfig,
}

impl Default for ProgramsConfig {
    fn default() -> Self {
        Self {
            goodbyedpi: ProgramKind::GoodbyeDpi.default_config(),
            zapret: ProgramKind::Zapret.default_config(),
            byedpi: ProgramKind::ByeDpi.default_config(),
        }
    }
}

impl ProgramsConfig {
    /// Settings for one program
    pub fn get(&self, kind: ProgramKind) -> &ProgramConfig {
        match kind {
            ProgramKind::GoodbyeDpi => &self.goodbyedpi,
            ProgramKind::Zapret => &self.zapret,
            ProgramKind::ByeDpi => &self.byedpi,
        }
    }

    /// Executable names of every known program
    pub fn executables(&self) -> Vec<String> {
        ProgramKind::ALL
            .iter()
            .map(|kind| self.get(*kind).executable.clone())
            .collect()
    }

    /// Service names of every known program
    pub fn service_names(&self) -> Vec<String> {
        ProgramKind::ALL
            .iter()
            .flat_map(|kind| self.get(*kind).service_names.iter().cloned())
            .collect()
    }
}

/// Curl settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CurlConfig {
    /// Folder to look for curl in
    pub folder: String,
    /// Executable file name
    pub executable: String,
    /// Arguments passed to every curl invocation
    pub basic_keys: Vec<String>,
}

impl Default for CurlConfig {
    fn default() -> Self {
        Self {
            folder: "Curl".to_string(),
            executable: if cfg!(windows) { "curl.exe" } else { "curl" }.to_string(),
            basic_keys: vec!["-s".to_string()],
        }
    }
}

/// Process and service cleanup settings
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LifecycleConfig {
    /// Packet interception driver services to stop
    pub interception_service_names: Vec<String>,
    /// Do not kill fooling program processes
    pub skip_task_kill: bool,
    /// Do not stop and delete services
    pub skip_service_kill: bool,
}

impl Default for LifecycleConfig {
    fn default() -> Self {
        Self {
            interception_service_names: vec!["WinDivert".to_string(), "WinDivert14".to_string()],
            skip_task_kill: false,
            skip_service_kill: false,
        }
    }
}
