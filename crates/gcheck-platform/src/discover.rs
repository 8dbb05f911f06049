//! Executable discovery
//!
//! Programs are looked up in their configured folder, a subfolder of it,
//! the working directory and the same subfolder of the working directory,
//! in that order. Curl is additionally looked up on the `PATH`.

use crate::error::{PlatformError, Result};
use gcheck_core::config::{CurlConfig, ProgramConfig, ProgramKind};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

/// Architecture subfolder used by the GoodbyeDPI and curl distributions
pub fn arch_subfolder() -> &'static str {
    if cfg!(target_pointer_width = "64") {
        "x86_64"
    } else {
        "x86"
    }
}

/// Subfolder a program's distribution keeps its executable in
pub fn program_subfolder(kind: ProgramKind) -> Option<&'static str> {
    match kind {
        ProgramKind::GoodbyeDpi => Some(arch_subfolder()),
        ProgramKind::Zapret => Some("zapret-winws"),
        ProgramKind::ByeDpi => None,
    }
}

/// Candidate directories in search order
pub fn search_dirs(folder: &Path, subfolder: Option<&str>, cwd: &Path) -> Vec<PathBuf> {
    let mut dirs = vec![folder.to_path_buf()];
    if let Some(sub) = subfolder {
        dirs.push(folder.join(sub));
    }
    dirs.push(cwd.to_path_buf());
    if let Some(sub) = subfolder {
        dirs.push(cwd.join(sub));
    }
    dirs
}

/// First existing `dir/name`
pub fn find_in(dirs: &[PathBuf], name: &str) -> Result<PathBuf> {
    for dir in dirs {
        let candidate = dir.join(name);
        if candidate.is_file() {
            info!(executable = name, dir = %dir.display(), "Found executable");
            return Ok(candidate);
        }
        debug!(executable = name, dir = %dir.display(), "Executable not here");
    }

    Err(PlatformError::ExecutableNotFound {
        name: name.to_string(),
        searched: dirs
            .iter()
            .map(|d| d.display().to_string())
            .collect::<Vec<_>>()
            .join(", "),
    })
}

/// Locate a fooling program
pub fn find_program(kind: ProgramKind, config: &ProgramConfig) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    let dirs = search_dirs(Path::new(&config.folder), program_subfolder(kind), &cwd);
    find_in(&dirs, &config.executable)
}

/// Locate curl, falling back to the `PATH`
pub fn find_curl(config: &CurlConfig) -> Result<PathBuf> {
    let cwd = std::env::current_dir()?;
    let mut dirs = search_dirs(Path::new(&config.folder), Some(arch_subfolder()), &cwd);
    if let Some(path) = std::env::var_os("PATH") {
        dirs.extend(std::env::split_paths(&path));
    }
    find_in(&dirs, &config.executable)
}
