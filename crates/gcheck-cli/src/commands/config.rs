//! Config command - settings management

use anyhow::{bail, Context, Result};
use clap::{Args, Subcommand};
use gcheck_core::Settings;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

const APP_NAME: &str = "goodcheck";
const FILE_NAMES: [&str; 2] = ["goodcheck.toml", "config.toml"];

/// Config command arguments
#[derive(Args, Debug)]
pub struct ConfigArgs {
    #[command(subcommand)]
    pub action: ConfigAction,
}

/// Config subcommands
#[derive(Subcommand, Debug)]
pub enum ConfigAction {
    /// Show the effective settings
    Show {
        /// Settings file to show (default: detect, then built-in defaults)
        #[arg(short, long)]
        file: Option<PathBuf>,
    },

    /// Write the default settings to a file
    Generate {
        /// Output file path
        #[arg(short, long, default_value = "goodcheck.toml")]
        output: PathBuf,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Validate a settings file
    Validate {
        /// Settings file to validate
        file: PathBuf,
    },

    /// Show settings file locations
    Paths,
}

/// Execute config command
pub fn execute(args: ConfigArgs, global: Option<&Path>) -> Result<()> {
    match args.action {
        ConfigAction::Show { file } => show_settings(file.as_deref().or(global)),
        ConfigAction::Generate { output, force } => generate_settings(&output, force),
        ConfigAction::Validate { file } => validate_settings(&file),
        ConfigAction::Paths => show_paths(),
    }
}

/// Load the settings the commands work with.
///
/// An explicit path must exist. Without one the usual locations are
/// searched and the built-in defaults apply when nothing is found.
pub fn load_settings(explicit: Option<&Path>) -> Result<Settings> {
    let path = match explicit {
        Some(path) => Some(path.to_path_buf()),
        None => find_config_file(),
    };

    let settings = match path {
        Some(path) => {
            let settings = Settings::load(&path)
                .with_context(|| format!("Failed to load settings from {}", path.display()))?;
            info!(path = %path.display(), "Loaded settings");
            settings
        }
        None => {
            debug!("No settings file found, using defaults");
            Settings::default()
        }
    };

    settings.validate().context("Settings validation failed")?;
    Ok(settings)
}

fn show_settings(file: Option<&Path>) -> Result<()> {
    let settings = load_settings(file)?;
    let toml_str = settings.to_toml().context("Failed to serialize settings")?;
    println!("{}", toml_str);
    Ok(())
}

fn generate_settings(output: &Path, force: bool) -> Result<()> {
    if output.exists() && !force {
        bail!("{} already exists, use --force to overwrite", output.display());
    }

    let toml_str = Settings::default()
        .to_toml()
        .context("Failed to serialize settings")?;

    let content = format!(
        "# GoodCheck settings\n\
         # Every key is optional, missing ones take the values below\n\n\
         {}",
        toml_str
    );

    std::fs::write(output, content)
        .with_context(|| format!("Failed to write settings to {}", output.display()))?;

    info!(path = %output.display(), "Generated settings file");
    println!("Settings file generated: {}", output.display());
    Ok(())
}

fn validate_settings(file: &Path) -> Result<()> {
    let settings = Settings::load(file)
        .with_context(|| format!("Failed to load settings from {}", file.display()))?;

    settings.validate().context("Settings validation failed")?;

    println!("✓ Settings are valid");
    println!("  Connection timeout: {:?}", settings.connection_timeout());
    println!("  Parallel probes: {}", settings.general.max_parallel_probes);
    println!("  DoH: {}", settings.resolver.use_doh);
    println!("  Connectivity test: {}", settings.general.connectivity_test);

    Ok(())
}

fn show_paths() -> Result<()> {
    println!("Settings file search paths:");
    println!();

    for (i, name) in FILE_NAMES.iter().enumerate() {
        println!("  {}. ./{}", i + 1, name);
    }

    if let Some(dir) = user_config_dir() {
        println!("  {}. {}", FILE_NAMES.len() + 1, dir.join("config.toml").display());
    }

    Ok(())
}

fn find_config_file() -> Option<PathBuf> {
    for name in FILE_NAMES {
        let path = PathBuf::from(name);
        if path.exists() {
            return Some(path);
        }
    }

    let path = user_config_dir()?.join("config.toml");
    path.exists().then_some(path)
}

fn user_config_dir() -> Option<PathBuf> {
    directories::ProjectDirs::from("", "", APP_NAME).map(|dirs| dirs.config_dir().to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_load_explicit_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let result = load_settings(Some(&dir.path().join("nope.toml")));
        assert!(result.is_err());
    }

    #[test]
    fn test_load_explicit_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("goodcheck.toml");
        std::fs::write(&path, "[general]\nmax_parallel_probes = 8\n").unwrap();

        let settings = load_settings(Some(&path)).unwrap();
        assert_eq!(settings.general.max_parallel_probes, 8);
        assert!(settings.resolver.use_doh);
    }

    #[test]
    fn test_generate_refuses_overwrite() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("goodcheck.toml");
        std::fs::write(&path, "").unwrap();

        assert!(generate_settings(&path, false).is_err());
        generate_settings(&path, true).unwrap();
        assert!(Settings::load(&path).is_ok());
    }
}
