//! # Stepwise Engine
//!
//! Loads Gherkin feature documents, orders them by their declared run-after
//! dependencies and executes their scenarios against a registry of step
//! handlers.
//!
//! ## Pipeline
//!
//! 1. [`document`] parses feature files into the shared model
//! 2. [`resolver`] orders features, applies `@Last`/`@Only`/`@Skip` and
//!    expands `Contexts:` tables
//! 3. [`executor`] runs each scenario with retries, per-attempt state and
//!    cleanup callbacks
//! 4. [`reporter`] implementations observe progress and results
//!
//! ## Usage
//!
//! ```rust,no_run
//! use std::sync::Arc;
//!
//! use stepwise_engine::{ConsoleReporter, ConsoleReporterConfig, FeatureRunner, RunConfig};
//!
//! # async fn run() -> Result<(), stepwise_engine::RunError> {
//! let config = RunConfig::new("features").with_reporter(Arc::new(ConsoleReporter::new(ConsoleReporterConfig::default())));
//! let result = FeatureRunner::new(config).run().await?;
//! println!("success: {}", result.success);
//! # Ok(())
//! # }
//! ```

pub mod document;
pub mod error;
pub mod executor;
pub mod interpolate;
pub mod registry;
pub mod reporter;
pub mod resolver;
pub mod value_path;

pub use document::parse_feature;
pub use error::{LoadError, ParseError, RunError, StepError};
pub use executor::{DEFAULT_FEATURE_EXTENSION, FeatureRunner, RetryPolicy, RunConfig, RunnerHandle};
pub use interpolate::{InterpolatedStep, InterpolationScope, interpolate, interpolate_step};
pub use registry::{Captures, RegexStep, StepHandler, StepRegistry, builtin_steps, regex_step};
pub use reporter::{ConsoleReporter, ConsoleReporterConfig, Reporter};
pub use resolver::{contextualize, load_features, parse_contexts, resolve_features};
pub use value_path::{render_value, select_path};
