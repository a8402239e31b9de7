//! A single attempt of a scenario.

use std::time::Instant;

use serde_json::Value;
use stepwise_types::{ContextualizedFeature, FlightRecorder, Scenario, Step, StepResult, StepStatus};
use tracing::{debug, warn};

use super::{RunConfig, RunnerHandle};
use crate::{
    error::{RunError, StepError},
    interpolate::interpolate_step,
    registry::StepRegistry,
};

/// Step results of one attempt and the error that ended it, if any.
pub(crate) struct AttemptOutcome {
    pub steps: Vec<StepResult>,
    pub error: Option<StepError>,
}

/// Runs background and scenario steps once with a fresh store and flight
/// recorder, then unwinds the cleanup stack.
pub(crate) async fn run_attempt(
    registry: &StepRegistry,
    config: &RunConfig,
    feature: &ContextualizedFeature,
    scenario: &Scenario,
    attempt: u32,
) -> Result<AttemptOutcome, RunError> {
    let mut store = config.store.clone();
    for (key, value) in &feature.context {
        store.insert(key.clone(), value.clone());
    }
    let mut runner = RunnerHandle::new(store, &config.world, &feature.context, &config.reporters);
    let mut flight_recorder = FlightRecorder::default();

    let mut steps = Vec::new();
    let mut error: Option<StepError> = None;
    for step in feature.feature.steps_for(scenario) {
        if error.is_some() {
            steps.push(step_result(step, step.text.clone(), StepStatus::Skipped, Value::Null, 0));
            continue;
        }

        let started = Instant::now();
        let (text, outcome) = execute_step(registry, step, &mut runner, &mut flight_recorder, attempt).await;
        let elapsed = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
        match outcome {
            Ok(value) => steps.push(step_result(step, text, StepStatus::Passed, value, elapsed)),
            Err(step_error) => {
                warn!(
                    feature = %feature.name(),
                    scenario = %scenario.name,
                    attempt,
                    error = %step_error,
                    "step failed"
                );
                steps.push(step_result(step, text, StepStatus::Failed, Value::Null, elapsed));
                error = Some(step_error);
            }
        }
    }

    let cleanup_error = runner.run_cleanups().await;
    if let Some(reporter_error) = runner.take_reporter_error() {
        return Err(RunError::Reporter(reporter_error));
    }
    if let Some(source) = cleanup_error {
        return Err(RunError::Cleanup {
            scenario: scenario.name.clone(),
            source,
        });
    }

    Ok(AttemptOutcome { steps, error })
}

/// Interpolates, matches and runs one step. Returns the text that was matched
/// (the raw text when interpolation failed) with the outcome.
async fn execute_step(
    registry: &StepRegistry,
    step: &Step,
    runner: &mut RunnerHandle<'_>,
    flight_recorder: &mut FlightRecorder,
    attempt: u32,
) -> (String, Result<Value, StepError>) {
    let interpolated = match interpolate_step(step, &runner.scope()) {
        Ok(interpolated) => interpolated,
        Err(error) => return (step.text.clone(), Err(error)),
    };
    let (handler, captures) = match registry.find(&interpolated.text) {
        Ok(found) => found,
        Err(error) => return (interpolated.text, Err(error)),
    };
    debug!(step = %interpolated.text, attempt, "step started");
    let outcome = handler
        .run(captures, &interpolated, runner, flight_recorder)
        .await
        .map_err(|source| StepError::Execution {
            step: interpolated.text.clone(),
            attempt,
            source,
        });
    (interpolated.text, outcome)
}

fn step_result(step: &Step, text: String, status: StepStatus, result: Value, duration_ms: u64) -> StepResult {
    StepResult {
        keyword: step.keyword.clone(),
        text,
        status,
        result,
        duration_ms,
    }
}
