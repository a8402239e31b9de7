//! Execution engine: runs resolved features sequentially, scenario by
//! scenario, and aggregates their results.
//!
//! - `config` holds the run configuration and retry policy
//! - `handle::RunnerHandle` is what step handlers see of the running attempt
//! - `attempt` executes one attempt with fresh per-attempt state
//! - `retry` drives attempts with exponential backoff
//!
//! Features, scenarios and steps never run concurrently; a scenario's
//! attempts, and the cleanups of each attempt, are strictly sequential.

mod attempt;
mod config;
mod handle;
mod retry;

use std::collections::HashSet;

use chrono::Utc;
use stepwise_types::{ContextualizedFeature, FeatureResult, RunResult, ScenarioResult, SkipReason};
use tracing::info;

pub use config::{DEFAULT_FEATURE_EXTENSION, RetryPolicy, RunConfig};
pub use handle::RunnerHandle;

use crate::{
    error::RunError,
    registry::{StepHandler, StepRegistry},
    reporter::notify_all,
    resolver::load_features,
};

/// Loads features from the configured directory and executes them.
pub struct FeatureRunner {
    config: RunConfig,
    registry: StepRegistry,
}

impl FeatureRunner {
    /// Runner with the built-in steps registered.
    pub fn new(config: RunConfig) -> Self {
        Self {
            config,
            registry: StepRegistry::with_builtin_steps(),
        }
    }

    /// Appends a step module's handlers after those already registered.
    pub fn add_step_handlers<I>(mut self, handlers: I) -> Self
    where
        I: IntoIterator<Item = Box<dyn StepHandler>>,
    {
        self.registry.extend(handlers);
        self
    }

    pub fn config(&self) -> &RunConfig {
        &self.config
    }

    pub fn registry(&self) -> &StepRegistry {
        &self.registry
    }

    /// Loads, resolves and runs every feature in the configured directory.
    ///
    /// Parse and load errors abort before any step executes. Otherwise a
    /// complete [`RunResult`] is returned, failures included, unless a
    /// reporter or cleanup callback fails.
    pub async fn run(&self) -> Result<RunResult, RunError> {
        let features = load_features(&self.config.feature_dir, &self.config.extension)?;
        self.run_features(&features).await
    }

    /// Runs already resolved feature instances in the given order.
    pub async fn run_features(&self, features: &[ContextualizedFeature]) -> Result<RunResult, RunError> {
        let started_at = Utc::now();
        info!(features = features.len(), handlers = self.registry.len(), "run started");

        let mut failed: HashSet<String> = HashSet::new();
        let mut results = Vec::with_capacity(features.len());
        for feature in features {
            let result = self.run_feature(feature, &failed).await?;
            let dependency_failed = matches!(result.skip_reason, Some(SkipReason::FailedDependency(_)));
            if dependency_failed || (!result.skipped && !result.success) {
                failed.insert(result.name.clone());
            }
            notify_all(&self.config.reporters, |reporter| reporter.feature_finished(&result))?;
            results.push(result);
        }

        let run = RunResult::from_features(results, started_at);
        notify_all(&self.config.reporters, |reporter| reporter.run_finished(&run))?;
        info!(
            success = run.success,
            features = run.feature_results.len(),
            failed = failed.len(),
            "run finished"
        );
        Ok(run)
    }

    async fn run_feature(&self, feature: &ContextualizedFeature, failed: &HashSet<String>) -> Result<FeatureResult, RunError> {
        let reporters = &self.config.reporters;
        notify_all(reporters, |reporter| reporter.feature_started(feature))?;

        if let Some(reason) = self.skip_reason(feature, failed) {
            info!(feature = %feature.name(), reason = ?reason, "feature skipped");
            let mut scenario_results = Vec::with_capacity(feature.feature.scenarios.len());
            for scenario in &feature.feature.scenarios {
                let result = ScenarioResult::skipped(scenario.name.clone());
                notify_all(reporters, |reporter| reporter.scenario_finished(feature, &result))?;
                scenario_results.push(result);
            }
            return Ok(FeatureResult {
                name: feature.name().to_string(),
                context: feature.context.clone(),
                success: true,
                skipped: true,
                skip_reason: Some(reason),
                scenario_results,
            });
        }

        info!(
            feature = %feature.name(),
            context = ?feature.context,
            scenarios = feature.feature.scenarios.len(),
            "feature started"
        );
        let mut scenario_results = Vec::with_capacity(feature.feature.scenarios.len());
        for scenario in &feature.feature.scenarios {
            let result = retry::run_scenario(&self.registry, &self.config, feature, scenario).await?;
            notify_all(reporters, |reporter| reporter.scenario_finished(feature, &result))?;
            scenario_results.push(result);
        }

        let result = FeatureResult::from_scenarios(feature.name(), feature.context.clone(), scenario_results);
        info!(feature = %feature.name(), success = result.success, "feature finished");
        Ok(result)
    }

    fn skip_reason(&self, feature: &ContextualizedFeature, failed: &HashSet<String>) -> Option<SkipReason> {
        if feature.feature.skip {
            return Some(SkipReason::Tagged);
        }
        if !self.config.skip_dependents_of_failed {
            return None;
        }
        feature
            .feature
            .depends_on
            .iter()
            .find(|dependency| failed.contains(dependency.as_str()))
            .map(|dependency| SkipReason::FailedDependency(dependency.clone()))
    }
}
