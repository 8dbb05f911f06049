//! Strategy evaluation engine
//!
//! Strategies are evaluated one at a time. For each one the external
//! program is launched with the strategy's tokens, every target is probed
//! for a number of passes, and the program is stopped again before the
//! next strategy starts. Inside a pass the probes run in parallel and the
//! pass ends only when all of them have returned.
//!
//! A strategy's score is the lowest success count over its passes. Once a
//! strategy finishes, every target whose last probe succeeded may record it
//! as its best strategy.

mod cancel;
mod round;

pub use cancel::CancelToken;

use crate::config::{Settings, MAX_PARALLEL_PROBES};
use crate::lifecycle::LifecycleController;
use crate::probe::{ProbeBackend, ProbeRequest};
use crate::strategy::{Strategy, StrategyState};
use crate::target::Target;
use serde::Serialize;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, error, info, warn};

/// Fixed per-pass overhead used in the duration estimate
const PASS_OVERHEAD: Duration = Duration::from_millis(100);

/// Engine timing and concurrency parameters
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineConfig {
    /// Probe rounds per strategy
    pub passes: usize,
    /// Timeout handed to the probe backend
    pub probe_timeout: Duration,
    /// Pause after launching and after stopping the program
    pub settle_delay: Duration,
    /// Upper bound of the random delay before each probe
    pub jitter_max: Duration,
    /// Probes allowed in flight at once
    pub max_parallel: usize,
}

impl EngineConfig {
    /// Build the engine parameters from settings and a pass count
    pub fn from_settings(settings: &Settings, passes: usize) -> Self {
        Self {
            passes: passes.max(1),
            probe_timeout: settings.connection_timeout(),
            settle_delay: settings.internal_timeout(),
            jitter_max: settings.internal_timeout(),
            max_parallel: settings.general.max_parallel_probes.clamp(1, MAX_PARALLEL_PROBES),
        }
    }

    /// Rough wall-clock estimate for evaluating `strategies` strategies
    pub fn estimate(&self, strategies: usize) -> Duration {
        let per_pass = self.probe_timeout + self.settle_delay * 2 + PASS_OVERHEAD;
        let passes = strategies.saturating_mul(self.passes);
        per_pass.saturating_mul(u32::try_from(passes).unwrap_or(u32::MAX))
    }
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default(), 1)
    }
}

/// How a run ended
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case", tag = "status")]
pub enum RunStatus {
    /// Every strategy was evaluated
    Completed,
    /// The operator interrupted the run
    Interrupted {
        /// Strategy being measured at the time, `None` between strategies
        strategy: Option<usize>,
    },
    /// The program could not be launched
    Aborted {
        /// Strategy that failed to launch
        strategy: usize,
        /// Launch error
        reason: String,
    },
}

/// Final state of a run
#[derive(Debug, Clone)]
pub struct Evaluation {
    /// Strategies with their scores and states
    pub strategies: Vec<Strategy>,
    /// Targets with their outcomes and best strategies
    pub targets: Vec<Target>,
    /// How the run ended
    pub status: RunStatus,
}

impl Evaluation {
    /// Whether the run went through every strategy
    pub fn is_complete(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// Drives the program through every strategy and scores the results
pub struct Evaluator<L> {
    config: EngineConfig,
    program: PathBuf,
    backend: Arc<dyn ProbeBackend>,
    lifecycle: L,
    cancel: CancelToken,
}

impl<L: LifecycleController> Evaluator<L> {
    /// Create an evaluator for the given program executable
    pub fn new(
        config: EngineConfig,
        program: impl Into<PathBuf>,
        backend: Arc<dyn ProbeBackend>,
        lifecycle: L,
    ) -> Self {
        Self {
            config,
            program: program.into(),
            backend,
            lifecycle,
            cancel: CancelToken::default(),
        }
    }

    /// Attach an interrupt token
    pub fn with_cancellation(mut self, cancel: CancelToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Replace the probe backend, e.g. after falling back to insecure TLS
    pub fn with_backend(mut self, backend: Arc<dyn ProbeBackend>) -> Self {
        self.backend = backend;
        self
    }

    /// Engine parameters
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Lifecycle controller in use
    pub fn lifecycle(&self) -> &L {
        &self.lifecycle
    }

    /// Clear competing programs and services off the host.
    ///
    /// Must happen before any network activity of the run, resolution and
    /// connectivity checks included.
    pub async fn prepare(&self) {
        info!("Stopping competing programs and services...");
        self.lifecycle.stop_competitors().await;
    }

    /// Evaluate every strategy against every target
    pub async fn run(&self, mut strategies: Vec<Strategy>, mut targets: Vec<Target>) -> Evaluation {
        let mut cancel = self.cancel.clone();
        let total = strategies.len();
        let mut status = RunStatus::Completed;

        info!(
            program = %self.program.display(),
            backend = self.backend.name(),
            strategies = total,
            targets = targets.len(),
            passes = self.config.passes,
            "Starting evaluation"
        );

        for (index, strategy) in strategies.iter_mut().enumerate() {
            if cancel.is_cancelled() {
                status = RunStatus::Interrupted { strategy: None };
                break;
            }

            info!(
                "Launching '{}', strategy {}/{}: {}",
                self.program.display(),
                index + 1,
                total,
                strategy.command_line()
            );
            let handle = match self.lifecycle.launch(&self.program, &strategy.tokens).await {
                Ok(handle) => handle,
                Err(e) => {
                    error!(strategy = index + 1, error = %e, "Can't launch the program");
                    status = RunStatus::Aborted {
                        strategy: index,
                        reason: e.to_string(),
                    };
                    break;
                }
            };

            let finished = self.measure(strategy, &mut targets, &mut cancel).await;
            if finished {
                credit(index, strategy, &mut targets);
                strategy.state = StrategyState::Completed;
            } else {
                strategy.state = StrategyState::Interrupted;
            }

            info!("Terminating program...");
            if let Err(e) = self.lifecycle.terminate(handle).await {
                warn!(strategy = index + 1, error = %e, "Teardown failed, continuing");
            }

            if !finished {
                warn!(strategy = index + 1, "Evaluation interrupted");
                status = RunStatus::Interrupted {
                    strategy: Some(index),
                };
                break;
            }

            tokio::select! {
                _ = tokio::time::sleep(self.config.settle_delay) => {}
                _ = cancel.cancelled() => {}
            }
        }

        self.lifecycle.final_cleanup().await;
        info!(status = ?status, "Evaluation finished");

        Evaluation {
            strategies,
            targets,
            status,
        }
    }

    /// Run every pass for one launched strategy. Returns `false` if
    /// interrupted.
    async fn measure(
        &self,
        strategy: &mut Strategy,
        targets: &mut [Target],
        cancel: &mut CancelToken,
    ) -> bool {
        let requests = ProbeRequest::from_targets(targets);
        let passes = self.config.passes;

        for pass in 1..=passes {
            tokio::select! {
                _ = tokio::time::sleep(self.config.settle_delay) => {}
                _ = cancel.cancelled() => return false,
            }

            info!("Making requests, pass {}/{}...", pass, passes);
            let outcomes = tokio::select! {
                outcomes = round::run(&self.backend, &requests, &self.config) => outcomes,
                _ = cancel.cancelled() => return false,
            };

            let successes = round::apply(&outcomes, targets);
            info!("Successes: {}/{}", successes, targets.len());

            if strategy.record_round(successes) {
                info!(
                    "Writing it down, worst result for this strategy so far: {}/{}",
                    successes,
                    targets.len()
                );
            } else {
                debug!(successes, score = ?strategy.score, "Keeping the previous worst result");
            }
        }

        true
    }
}

/// Hand a finished strategy's score to the targets it worked for.
///
/// Only a target's outcome from the last pass is consulted (see
/// [`Target::offer_best`]): a target that failed in that pass is never
/// credited, even if it succeeded in every earlier one.
fn credit(index: usize, strategy: &mut Strategy, targets: &mut [Target]) {
    match strategy.score {
        Some(score) if score > 0 => {
            strategy.has_successes = true;
            for target in targets.iter_mut() {
                if target.offer_best(index, score) {
                    debug!(address = %target.address, strategy = index + 1, score, "New best strategy");
                }
            }
        }
        _ => info!("This strategy has no successes"),
    }
}
