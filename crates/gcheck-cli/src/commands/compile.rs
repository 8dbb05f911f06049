//! Compile command - expand a strategy list without running anything

use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use gcheck_core::strategy;
use std::path::{Path, PathBuf};

use super::config::load_settings;

/// Compile command arguments
#[derive(Args, Debug)]
pub struct CompileArgs {
    /// Strategy list file
    pub file: PathBuf,

    /// Print only the number of configurations
    #[arg(long)]
    pub count: bool,
}

/// Execute compile command
pub fn execute(args: CompileArgs, config: Option<&Path>) -> Result<()> {
    let settings = load_settings(config)?;
    let table = settings.payloads.substitution_table();

    let set = strategy::compile_file(&args.file, &table)
        .with_context(|| format!("Failed to compile {}", args.file.display()))?;

    if args.count {
        println!("{}", set.len());
        return Ok(());
    }

    println!("{} {}", "Transport:".bold(), set.transport());
    match set.proxy {
        Some(ref proxy) => println!("{} {}", "Proxy:".bold(), proxy),
        None => println!("{} none", "Proxy:".bold()),
    }
    println!("{} {}", "Configurations:".bold(), set.len());
    println!();

    let width = set.len().to_string().len();
    for (i, strategy) in set.strategies.iter().enumerate() {
        let number = format!("{:>width$}", i + 1, width = width);
        println!("  {}  {}", number.dimmed(), strategy.command_line());
    }

    Ok(())
}
