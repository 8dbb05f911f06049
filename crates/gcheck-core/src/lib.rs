//! # GoodCheck Core
//!
//! Platform-independent core of the GoodCheck strategy evaluator.
//!
//! ## Overview
//!
//! GoodCheck finds out which invocation of a DPI circumvention program
//! (GoodbyeDPI, Zapret or ByeDPI) lets the most sites through. It compiles
//! a strategy list into concrete argument sets, launches the program with
//! each one in turn and probes a checklist of sites while it runs.
//!
//! This crate holds everything that does not touch the operating system:
//!
//! - [`strategy`]: the strategy list compiler
//! - [`engine`]: the sequential evaluation loop and its probe rounds
//! - [`checklist`] and [`target`]: probe destinations
//! - [`report`]: the end-of-run summary
//! - [`config`]: the settings file
//!
//! Network probes, name resolution and process control are reached through
//! the [`ProbeBackend`], [`TargetResolver`] and [`LifecycleController`]
//! traits and implemented elsewhere.
//!
//! ## Example
//!
//! ```no_run
//! use gcheck_core::config::Settings;
//! use gcheck_core::strategy;
//!
//! let settings = Settings::default();
//! let set = strategy::compile_file("strategies.txt", &settings.payloads.substitution_table())?;
//! println!("{} strategies over {}", set.len(), set.transport());
//! # Ok::<(), gcheck_core::Error>(())
//! ```

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod checklist;
pub mod config;
pub mod engine;
pub mod error;
pub mod lifecycle;
pub mod probe;
pub mod report;
pub mod strategy;
pub mod target;

pub use config::Settings;
pub use engine::{CancelToken, EngineConfig, Evaluation, Evaluator, RunStatus};
pub use error::{Error, Result};
pub use lifecycle::LifecycleController;
pub use probe::{ProbeBackend, ProbeOutcome, ProbeRequest, TargetResolver};
pub use report::Report;
pub use strategy::{Strategy, StrategySet};
pub use target::Target;
