//! Scenario retries with exponential backoff.

use stepwise_types::{ContextualizedFeature, Scenario, ScenarioResult};
use tracing::{info, warn};

use super::{RunConfig, attempt::run_attempt};
use crate::{error::RunError, registry::StepRegistry};

/// Runs `scenario` until an attempt passes or the retry budget is spent.
///
/// Attempt `k >= 2` is preceded by `min(initial_delay * 2^(k-2), max_delay)`
/// milliseconds of sleep. The result reflects the final attempt only.
pub(crate) async fn run_scenario(
    registry: &StepRegistry,
    config: &RunConfig,
    feature: &ContextualizedFeature,
    scenario: &Scenario,
) -> Result<ScenarioResult, RunError> {
    let retry_configuration = config.retry.for_scenario(scenario);
    let max_attempts = retry_configuration.map_or(1, |retry| retry.max_attempts());

    let mut attempt = 0u32;
    let outcome = loop {
        attempt += 1;
        if let Some(retry) = &retry_configuration {
            let delay = retry.delay_before(attempt);
            if !delay.is_zero() {
                info!(
                    scenario = %scenario.name,
                    attempt,
                    delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
                    "waiting before retry"
                );
                tokio::time::sleep(delay).await;
            }
        }

        let outcome = run_attempt(registry, config, feature, scenario, attempt).await?;
        if outcome.error.is_none() || attempt >= max_attempts {
            break outcome;
        }
        warn!(
            feature = %feature.name(),
            scenario = %scenario.name,
            attempt,
            max_attempts,
            "scenario attempt failed, retrying"
        );
    };

    let success = outcome.error.is_none();
    info!(
        feature = %feature.name(),
        scenario = %scenario.name,
        success,
        tries = attempt,
        "scenario finished"
    );
    Ok(ScenarioResult {
        name: scenario.name.clone(),
        success,
        skipped: false,
        tries: attempt,
        retry_configuration,
        error: outcome.error.map(|error| error.to_failure(attempt)),
        steps: outcome.steps,
    })
}
