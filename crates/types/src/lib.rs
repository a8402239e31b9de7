//! Shared type definitions for the Stepwise feature runner.
//!
//! The models here are consumed by the engine, the bundled step modules and the
//! command line front-end. They are serde-serializable so results can be
//! exported as JSON by reporters.

pub mod feature;
pub mod result;
pub mod retry;
pub mod state;

pub use feature::{Context, ContextualizedFeature, Feature, Scenario, Step, StepArgument, TAG_LAST, TAG_ONLY, TAG_SKIP, normalize_tag};
pub use result::{FeatureResult, RunResult, ScenarioResult, SkipReason, StepFailure, StepFailureKind, StepResult, StepStatus, Tally};
pub use retry::{RetryConfiguration, RetryTag, RetryTagError};
pub use state::{FlightRecorder, Store, World};
