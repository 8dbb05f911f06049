//! CLI commands

pub mod compile;
pub mod completions;
pub mod config;
pub mod run;

use clap::Subcommand;

/// CLI commands
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Evaluate every strategy of a list against a checklist (main command)
    Run(run::RunArgs),

    /// Compile a strategy list and print the resulting configurations
    Compile(compile::CompileArgs),

    /// Settings management
    Config(config::ConfigArgs),

    /// Generate shell completions
    Completions(completions::CompletionsArgs),
}
