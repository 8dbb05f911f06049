//! Command-line arguments

use clap::{ArgAction, Parser, ValueEnum};
use std::path::PathBuf;

use crate::commands::Command;

/// Find the DPI circumvention strategy that works best on this network
#[derive(Parser, Debug)]
#[command(name = "goodcheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
pub struct Args {
    #[command(subcommand)]
    pub command: Command,

    /// Increase log verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Only log errors
    #[arg(short, long, global = true, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Log output format
    #[arg(long, value_enum, default_value_t = LogFormat::Text, global = true)]
    pub log_format: LogFormat,

    /// Also write logs to this file
    #[arg(long, value_name = "FILE", global = true)]
    pub log_file: Option<PathBuf>,

    /// Settings file (default: search the usual locations)
    #[arg(short, long, value_name = "FILE", global = true, env = "GOODCHECK_CONFIG")]
    pub config: Option<PathBuf>,
}

/// Log output formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum LogFormat {
    /// Human readable
    Text,
    /// One JSON object per line
    Json,
    /// Single-line human readable
    Compact,
}
