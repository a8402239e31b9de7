//! Reporter contract.
//!
//! Reporters observe a run; they never influence it. Every callback defaults
//! to a no-op so implementations override only what they render. An error
//! returned by any callback aborts the run with [`RunError::Reporter`].

mod console;

use std::sync::Arc;

use anyhow::Result;
use stepwise_types::{ContextualizedFeature, FeatureResult, RunResult, ScenarioResult};

pub use console::{ConsoleReporter, ConsoleReporterConfig};

use crate::error::RunError;

pub trait Reporter: Send + Sync {
    /// Human-visible trace of an in-flight operation emitted by a step.
    fn progress(&self, _label: &str, _detail: &str) -> Result<()> {
        Ok(())
    }

    fn feature_started(&self, _feature: &ContextualizedFeature) -> Result<()> {
        Ok(())
    }

    fn scenario_finished(&self, _feature: &ContextualizedFeature, _result: &ScenarioResult) -> Result<()> {
        Ok(())
    }

    fn feature_finished(&self, _result: &FeatureResult) -> Result<()> {
        Ok(())
    }

    fn run_finished(&self, _result: &RunResult) -> Result<()> {
        Ok(())
    }
}

/// Invokes `callback` on every reporter, stopping at the first failure.
pub(crate) fn notify_all<F>(reporters: &[Arc<dyn Reporter>], callback: F) -> Result<(), RunError>
where
    F: Fn(&dyn Reporter) -> Result<()>,
{
    for reporter in reporters {
        callback(reporter.as_ref()).map_err(RunError::Reporter)?;
    }
    Ok(())
}
