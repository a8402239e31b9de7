//! Results reported for steps, scenarios, features and whole runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{feature::Context, retry::RetryConfiguration};

/// Outcome of one step within the final attempt of a scenario.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Passed,
    Failed,
    /// Not executed because an earlier step of the attempt failed.
    Skipped,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StepResult {
    pub keyword: String,
    /// Step text after interpolation, or the raw text if interpolation failed.
    pub text: String,
    pub status: StepStatus,
    /// Value returned by the handler.
    #[serde(default)]
    pub result: Value,
    pub duration_ms: u64,
}

/// Classification of a scenario-local failure.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepFailureKind {
    /// No registered handler matched the step text.
    Undefined,
    /// A placeholder referenced by the step could not be resolved.
    Interpolation,
    /// The handler returned an error.
    Execution,
}

/// Failure recorded against the failing step of the final attempt.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct StepFailure {
    pub kind: StepFailureKind,
    /// Literal step text the failure refers to.
    pub step: String,
    /// 1-based attempt number.
    pub attempt: u32,
    pub message: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ScenarioResult {
    pub name: String,
    pub success: bool,
    pub skipped: bool,
    pub tries: u32,
    /// Retry configuration applied to the scenario, echoed verbatim.
    pub retry_configuration: Option<RetryConfiguration>,
    pub error: Option<StepFailure>,
    /// Step results of the final attempt.
    #[serde(default)]
    pub steps: Vec<StepResult>,
}

impl ScenarioResult {
    pub fn skipped(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            success: true,
            skipped: true,
            tries: 0,
            retry_configuration: None,
            error: None,
            steps: Vec::new(),
        }
    }
}

/// Why a feature was not executed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum SkipReason {
    /// `@Skip`, or not selected while `@Only` is in use.
    Tagged,
    /// A feature it depends on failed.
    FailedDependency(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct FeatureResult {
    pub name: String,
    #[serde(default)]
    pub context: Context,
    pub success: bool,
    pub skipped: bool,
    pub skip_reason: Option<SkipReason>,
    pub scenario_results: Vec<ScenarioResult>,
}

impl FeatureResult {
    /// Aggregates scenario results: AND over every non-skipped scenario.
    pub fn from_scenarios(name: impl Into<String>, context: Context, scenario_results: Vec<ScenarioResult>) -> Self {
        let success = scenario_results.iter().filter(|result| !result.skipped).all(|result| result.success);
        Self {
            name: name.into(),
            context,
            success,
            skipped: false,
            skip_reason: None,
            scenario_results,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunResult {
    pub success: bool,
    pub feature_results: Vec<FeatureResult>,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
}

impl RunResult {
    /// Aggregates feature results: AND over every non-skipped feature.
    pub fn from_features(feature_results: Vec<FeatureResult>, started_at: DateTime<Utc>) -> Self {
        let success = feature_results.iter().filter(|result| !result.skipped).all(|result| result.success);
        Self {
            success,
            feature_results,
            started_at,
            finished_at: Utc::now(),
        }
    }
}

/// Passed/failed/skipped tallies used by summaries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Tally {
    pub passed: usize,
    pub failed: usize,
    pub skipped: usize,
}

impl Tally {
    pub fn total(&self) -> usize {
        self.passed + self.failed + self.skipped
    }

    pub fn features(result: &RunResult) -> Self {
        result.feature_results.iter().fold(Self::default(), |tally, feature| {
            tally.count(feature.skipped, feature.success)
        })
    }

    pub fn scenarios(result: &RunResult) -> Self {
        result
            .feature_results
            .iter()
            .flat_map(|feature| feature.scenario_results.iter())
            .fold(Self::default(), |tally, scenario| tally.count(scenario.skipped, scenario.success))
    }

    fn count(mut self, skipped: bool, success: bool) -> Self {
        if skipped {
            self.skipped += 1;
        } else if success {
            self.passed += 1;
        } else {
            self.failed += 1;
        }
        self
    }
}
