//! Error types surfaced by the engine.
//!
//! Parse and load errors abort a run before any step executes. Step errors are
//! scenario-local and end up in a [`ScenarioResult`](stepwise_types::ScenarioResult);
//! they only become fatal through retries running out. Reporter and cleanup
//! failures are promoted to [`RunError`] so they are never silently lost.

use std::path::PathBuf;

use stepwise_types::{RetryTagError, StepFailure, StepFailureKind};
use thiserror::Error;

/// A feature document could not be parsed.
#[derive(Debug, Error)]
#[error("failed to parse feature document {}: {message}", display_path(path))]
pub struct ParseError {
    pub path: Option<PathBuf>,
    pub message: String,
}

fn display_path(path: &Option<PathBuf>) -> String {
    path.as_ref()
        .map(|path| path.display().to_string())
        .unwrap_or_else(|| "<inline>".to_string())
}

/// The feature set could not be discovered, resolved or ordered.
#[derive(Debug, Error)]
pub enum LoadError {
    #[error("No features found in directory {}", .0.display())]
    NoFeatures(PathBuf),

    #[error("failed to read {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("The feature {dependency} that {feature} wants to run after does not exist!")]
    UnknownDependency { feature: String, dependency: String },

    #[error("dependency cycle detected between features involving: {}", participants.join(", "))]
    Cycle { participants: Vec<String> },

    #[error("duplicate feature name detected: '{0}'")]
    DuplicateFeature(String),

    #[error("feature '{feature}' has an invalid retry tag: {source}")]
    Retry {
        feature: String,
        #[source]
        source: RetryTagError,
    },
}

/// Scenario-local failure of a single step.
#[derive(Debug, Error)]
pub enum StepError {
    #[error("Undefined step: {step}")]
    Undefined { step: String },

    #[error("unresolved placeholder <{placeholder}> in step \"{step}\"")]
    Interpolation { step: String, placeholder: String },

    #[error("step \"{step}\" failed on attempt {attempt}: {source:#}")]
    Execution {
        step: String,
        attempt: u32,
        #[source]
        source: anyhow::Error,
    },
}

impl StepError {
    /// Literal step text the error refers to.
    pub fn step(&self) -> &str {
        match self {
            Self::Undefined { step } | Self::Interpolation { step, .. } | Self::Execution { step, .. } => step,
        }
    }

    pub fn kind(&self) -> StepFailureKind {
        match self {
            Self::Undefined { .. } => StepFailureKind::Undefined,
            Self::Interpolation { .. } => StepFailureKind::Interpolation,
            Self::Execution { .. } => StepFailureKind::Execution,
        }
    }

    /// Serializable record of this error for the scenario result.
    pub fn to_failure(&self, attempt: u32) -> StepFailure {
        StepFailure {
            kind: self.kind(),
            step: self.step().to_string(),
            attempt,
            message: self.to_string(),
        }
    }
}

/// Fatal error that aborts the whole run.
#[derive(Debug, Error)]
pub enum RunError {
    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error(transparent)]
    Load(#[from] LoadError),

    #[error("reporter failed: {0:#}")]
    Reporter(anyhow::Error),

    #[error("cleanup callback failed in scenario \"{scenario}\": {source:#}")]
    Cleanup { scenario: String, source: anyhow::Error },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn undefined_step_message_carries_the_text() {
        let error = StepError::Undefined {
            step: "I do something nobody implemented".into(),
        };
        let failure = error.to_failure(1);
        assert_eq!(failure.kind, StepFailureKind::Undefined);
        assert_eq!(failure.step, "I do something nobody implemented");
        assert!(failure.message.contains("I do something nobody implemented"));
    }

    #[test]
    fn cycle_lists_participants() {
        let error = LoadError::Cycle {
            participants: vec!["A".into(), "B".into()],
        };
        assert_eq!(error.to_string(), "dependency cycle detected between features involving: A, B");
    }
}
