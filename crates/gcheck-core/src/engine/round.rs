//! One probe round: every target, bounded parallelism, join barrier

use super::EngineConfig;
use crate::probe::{ProbeBackend, ProbeOutcome, ProbeRequest};
use crate::target::Target;
use rand::Rng;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{info, instrument, warn};

/// Extra time a backend gets beyond its own timeout before the round gives up on it
const PROBE_GRACE: Duration = Duration::from_secs(1);

/// Probe every request and return the outcomes in request order.
///
/// Resolves only after every target has an outcome. A backend with a batch
/// mode gets the whole round in one call; otherwise each target is probed
/// in its own task. A probe that exceeds the timeout counts as a failure;
/// one that dies counts as a transport error.
#[instrument(skip_all, fields(targets = requests.len()))]
pub(crate) async fn run(
    backend: &Arc<dyn ProbeBackend>,
    requests: &[ProbeRequest],
    config: &EngineConfig,
) -> Vec<ProbeOutcome> {
    let permits = config.max_parallel.clamp(1, Semaphore::MAX_PERMITS);
    if let Some(outcomes) = batched(backend.as_ref(), requests, config, permits).await {
        return outcomes;
    }

    let semaphore = Arc::new(Semaphore::new(permits));
    let mut tasks = JoinSet::new();

    for (slot, request) in requests.iter().enumerate() {
        let backend = Arc::clone(backend);
        let semaphore = Arc::clone(&semaphore);
        let address = request.address.clone();
        let pinned = request.pinned;
        let delay = jitter(config.jitter_max);
        let timeout = config.probe_timeout;

        tasks.spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return (slot, ProbeOutcome::TransportError);
            };
            tokio::time::sleep(delay).await;

            let probe = backend.probe(&address, pinned, timeout);
            let outcome = tokio::time::timeout(timeout + PROBE_GRACE, probe)
                .await
                .unwrap_or(ProbeOutcome::Failure);
            (slot, outcome)
        });
    }

    let mut outcomes = vec![ProbeOutcome::TransportError; requests.len()];
    while let Some(joined) = tasks.join_next().await {
        match joined {
            Ok((slot, outcome)) => outcomes[slot] = outcome,
            Err(e) => warn!(error = %e, "Probe task failed"),
        }
    }
    outcomes
}

/// Hand the round to the backend's batch mode, `None` if it has none
async fn batched(
    backend: &dyn ProbeBackend,
    requests: &[ProbeRequest],
    config: &EngineConfig,
    permits: usize,
) -> Option<Vec<ProbeOutcome>> {
    let waves = u32::try_from(requests.len().div_ceil(permits)).unwrap_or(u32::MAX);
    let deadline = config.probe_timeout.saturating_mul(waves.max(1)) + PROBE_GRACE;

    let batch = backend.probe_batch(requests, config.probe_timeout, permits);
    match tokio::time::timeout(deadline, batch).await {
        Ok(None) => None,
        Ok(Some(outcomes)) if outcomes.len() == requests.len() => Some(outcomes),
        Ok(Some(outcomes)) => {
            warn!(
                expected = requests.len(),
                got = outcomes.len(),
                "Batch returned a wrong number of outcomes"
            );
            Some(vec![ProbeOutcome::TransportError; requests.len()])
        }
        Err(_) => {
            warn!(deadline = ?deadline, "Batched round timed out");
            Some(vec![ProbeOutcome::Failure; requests.len()])
        }
    }
}

/// Store a round's outcomes on the targets and count the successes
pub(crate) fn apply(outcomes: &[ProbeOutcome], targets: &mut [Target]) -> usize {
    let mut successes = 0;
    for (target, outcome) in targets.iter_mut().zip(outcomes) {
        target.record_outcome(*outcome);
        if outcome.is_success() {
            successes += 1;
        }
        info!("{}\t{}", outcome, target.address);
    }
    successes
}

fn jitter(max: Duration) -> Duration {
    let max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
    if max_ms == 0 {
        return Duration::ZERO;
    }
    Duration::from_millis(rand::thread_rng().gen_range(0..max_ms))
}
