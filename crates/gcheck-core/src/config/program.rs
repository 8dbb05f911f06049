//! Known traffic-shaping ("fooling") programs
//!
//! Each program has its own executable, the service names it may register
//! itself under, and whether it works as a local proxy instead of
//! intercepting traffic transparently.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};

/// The fooling programs the evaluator knows how to drive
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgramKind {
    /// GoodbyeDPI
    GoodbyeDpi,
    /// Zapret (winws)
    Zapret,
    /// ByeDPI (ciadpi), a SOCKS proxy
    ByeDpi,
}

impl ProgramKind {
    /// All known programs
    pub const ALL: [ProgramKind; 3] = [ProgramKind::GoodbyeDpi, ProgramKind::Zapret, ProgramKind::ByeDpi];

    /// Short name used on the command line
    pub fn name(&self) -> &'static str {
        match self {
            ProgramKind::GoodbyeDpi => "gdpi",
            ProgramKind::Zapret => "zapret",
            ProgramKind::ByeDpi => "ciadpi",
        }
    }

    /// Human readable name
    pub fn display_name(&self) -> &'static str {
        match self {
            ProgramKind::GoodbyeDpi => "GoodbyeDPI",
            ProgramKind::Zapret => "Zapret",
            ProgramKind::ByeDpi => "ByeDPI",
        }
    }

    /// Default settings for this program
    pub fn default_config(self) -> ProgramConfig {
        let (folder, executable, services, works_as_proxy): (&str, &str, &[&str], bool) = match self {
            ProgramKind::GoodbyeDpi => (
                "GoodbyeDPI",
                "goodbyedpi.exe",
                &["GoodbyeDPI", "goodbyedpi"],
                false,
            ),
            ProgramKind::Zapret => (
                "Zapret",
                "winws.exe",
                &["winws", "winws1", "winws2", "Zapret", "zapret"],
                false,
            ),
            ProgramKind::ByeDpi => ("ByeDPI", "ciadpi.exe", &["ciadpi", "ByeDPI", "byedpi"], true),
        };

        ProgramConfig {
            folder: folder.to_string(),
            executable: executable.to_string(),
            service_names: services.iter().map(|s| (*s).to_string()).collect(),
            works_as_proxy,
        }
    }
}

impl std::fmt::Display for ProgramKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.display_name())
    }
}

impl std::str::FromStr for ProgramKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "gdpi" | "goodbyedpi" => Ok(ProgramKind::GoodbyeDpi),
            "zapret" | "winws" => Ok(ProgramKind::Zapret),
            "ciadpi" | "byedpi" => Ok(ProgramKind::ByeDpi),
            _ => Err(Error::settings_value("program", format!("Unknown program: {s}"))),
        }
    }
}

/// Per-program settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgramConfig {
    /// Folder to look for the executable in
    pub folder: String,
    /// Executable file name
    pub executable: String,
    /// Service names the program may be installed under
    pub service_names: Vec<String>,
    /// Program works as a proxy rather than intercepting traffic
    pub works_as_proxy: bool,
}
