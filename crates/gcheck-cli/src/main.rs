//! GoodCheck - find the DPI circumvention strategy that works on this network

mod args;
mod commands;
mod logging;
mod render;

use anyhow::Result;
use clap::Parser;
use colored::Colorize;
use tracing::error;

use args::Args;
use commands::Command;

fn main() {
    let args = Args::parse();

    let _guard = match logging::init(&args) {
        Ok(guard) => guard,
        Err(e) => {
            eprintln!("Failed to initialize logging: {e:#}");
            std::process::exit(1);
        }
    };

    if let Err(e) = run(args) {
        error!("Fatal error: {:#}", e);
        std::process::exit(1);
    }
}

fn run(args: Args) -> Result<()> {
    let Args {
        command,
        config,
        quiet,
        ..
    } = args;

    match command {
        Command::Run(run_args) => {
            if !quiet {
                print_banner();
            }
            commands::run::execute(run_args, config.as_deref())
        }
        Command::Compile(compile_args) => commands::compile::execute(compile_args, config.as_deref()),
        Command::Config(config_args) => commands::config::execute(config_args, config.as_deref()),
        Command::Completions(completions_args) => commands::completions::execute(completions_args),
    }
}

fn print_banner() {
    println!();
    println!("{}", "  GoodCheck".bold().cyan());
    println!("  {} {}", "version".dimmed(), env!("CARGO_PKG_VERSION").dimmed());
    println!();
}
