//! End-of-run summary

use crate::engine::{Evaluation, RunStatus};
use crate::error::{Error, Result};
use crate::strategy::{Strategy, StrategyState};
use serde::Serialize;
use std::collections::BTreeMap;
use std::net::IpAddr;

/// A strategy as it appears in the report
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StrategySummary {
    /// Position in the strategy list
    pub index: usize,
    /// Invocation tokens
    pub tokens: Vec<String>,
}

impl StrategySummary {
    fn of(index: usize, strategy: &Strategy) -> Self {
        Self {
            index,
            tokens: strategy.tokens.clone(),
        }
    }

    /// Tokens joined for display
    pub fn command_line(&self) -> String {
        self.tokens.join(" ")
    }
}

/// A target that never succeeded
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UnreachableTarget {
    /// Target address
    pub address: String,
    /// Address it was probed at
    pub pinned: Option<IpAddr>,
}

/// A target that succeeded at least once
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReachableTarget {
    /// Target address
    pub address: String,
    /// Address it was probed at
    pub pinned: Option<IpAddr>,
    /// Best strategy, if one was ever credited
    pub best: Option<StrategySummary>,
    /// Score the best strategy was credited with
    pub best_score: Option<usize>,
}

/// Summary of an evaluation
#[derive(Debug, Clone, Serialize)]
pub struct Report {
    /// How the run ended
    #[serde(flatten)]
    pub status: RunStatus,
    /// Number of compiled strategies
    pub total_strategies: usize,
    /// Number of strategies that finished every pass
    pub completed_strategies: usize,
    /// Number of probed targets
    pub total_targets: usize,
    /// Targets with no success in the whole run
    pub unreachable: Vec<UnreachableTarget>,
    /// Targets with at least one success
    pub reachable: Vec<ReachableTarget>,
    /// Completed strategies grouped by score
    pub by_score: BTreeMap<usize, Vec<StrategySummary>>,
    /// Strategy that was active when the run was interrupted
    pub interrupted: Option<StrategySummary>,
}

impl Report {
    /// Summarize an evaluation
    pub fn build(evaluation: &Evaluation) -> Self {
        let strategies = &evaluation.strategies;
        let mut by_score: BTreeMap<usize, Vec<StrategySummary>> = BTreeMap::new();
        let mut completed_strategies = 0;
        let mut interrupted = None;

        for (index, strategy) in strategies.iter().enumerate() {
            match strategy.state {
                StrategyState::Completed => {
                    completed_strategies += 1;
                    if let Some(score) = strategy.score {
                        by_score
                            .entry(score)
                            .or_default()
                            .push(StrategySummary::of(index, strategy));
                    }
                }
                StrategyState::Interrupted => {
                    interrupted = Some(StrategySummary::of(index, strategy));
                }
                StrategyState::Pending => {}
            }
        }

        let mut unreachable = Vec::new();
        let mut reachable = Vec::new();
        for target in &evaluation.targets {
            if !target.has_successes {
                unreachable.push(UnreachableTarget {
                    address: target.address.clone(),
                    pinned: target.pinned,
                });
                continue;
            }
            let best = target
                .best
                .and_then(|b| strategies.get(b.index).map(|s| StrategySummary::of(b.index, s)));
            reachable.push(ReachableTarget {
                address: target.address.clone(),
                pinned: target.pinned,
                best,
                best_score: target.best.map(|b| b.score),
            });
        }

        Self {
            status: evaluation.status.clone(),
            total_strategies: strategies.len(),
            completed_strategies,
            total_targets: evaluation.targets.len(),
            unreachable,
            reachable,
            by_score,
            interrupted,
        }
    }

    /// Score groups from best to worst
    pub fn ranked(&self) -> impl Iterator<Item = (&usize, &Vec<StrategySummary>)> {
        self.by_score.iter().rev()
    }

    /// Pretty-printed JSON
    pub fn to_json(&self) -> Result<String> {
        serde_json::to_string_pretty(self).map_err(|e| Error::Internal(e.to_string()))
    }
}
