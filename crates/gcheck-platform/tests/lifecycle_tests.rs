//! Evaluation runs against real child processes

#![cfg(unix)]

use async_trait::async_trait;
use gcheck_core::config::{ProgramKind, Settings};
use gcheck_core::engine::{EngineConfig, Evaluator, RunStatus};
use gcheck_core::probe::{ProbeBackend, ProbeOutcome};
use gcheck_core::{Strategy, Target};
use gcheck_platform::ProcessController;
use std::net::IpAddr;
use std::sync::Arc;
use std::time::Duration;

struct AlwaysUp;

#[async_trait]
impl ProbeBackend for AlwaysUp {
    fn name(&self) -> &'static str {
        "always-up"
    }

    async fn probe(&self, _: &str, _: Option<IpAddr>, _: Duration) -> ProbeOutcome {
        ProbeOutcome::Success(200)
    }
}

fn config() -> EngineConfig {
    EngineConfig {
        passes: 2,
        probe_timeout: Duration::from_secs(1),
        settle_delay: Duration::from_millis(10),
        jitter_max: Duration::ZERO,
        max_parallel: 8,
    }
}

fn controller() -> ProcessController {
    // Never touch real processes or services from tests
    ProcessController::new(&Settings::default(), ProgramKind::GoodbyeDpi).with_skips(true, true)
}

#[tokio::test]
async fn test_sleep_program_is_launched_and_stopped() {
    let evaluator = Evaluator::new(config(), "sleep", Arc::new(AlwaysUp), controller());
    let strategies = vec![Strategy::new(vec!["30".into()]), Strategy::new(vec!["31".into()])];
    let targets = vec![Target::new("https://a.example"), Target::new("https://b.example")];

    let result = evaluator.run(strategies, targets).await;

    assert_eq!(result.status, RunStatus::Completed);
    assert!(result.strategies.iter().all(|s| s.score == Some(2)));
    assert!(result.targets.iter().all(|t| t.best.map(|b| b.index) == Some(0)));
}

#[tokio::test]
async fn test_missing_program_aborts() {
    let evaluator = Evaluator::new(
        config(),
        "/definitely/not/goodbyedpi.exe",
        Arc::new(AlwaysUp),
        controller(),
    );
    let result = evaluator
        .run(vec![Strategy::new(vec!["-5".into()])], vec![Target::new("https://a.example")])
        .await;

    assert!(matches!(result.status, RunStatus::Aborted { strategy: 0, .. }));
}
