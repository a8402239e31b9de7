//! Step handler modules bundled with Stepwise.
//!
//! Each module exposes a constructor returning its handlers in registration
//! order; register them on a runner with
//! [`FeatureRunner::add_step_handlers`](stepwise_engine::FeatureRunner::add_step_handlers).

pub mod encoding;
pub mod json_query;
pub mod random;
pub mod rest;
pub mod storage;

use std::sync::Arc;

use regex::Regex;
use stepwise_engine::StepHandler;

pub use encoding::Codecs;
pub use random::{RandomGenerators, random_steps};
pub use rest::{RestClient, RestResponse, rest_steps};
pub use storage::storage_steps;

/// Every bundled module with default settings: REST, storage, random.
pub fn default_steps(client: Arc<RestClient>) -> Vec<Box<dyn StepHandler>> {
    let mut handlers = rest_steps(client);
    handlers.extend(storage_steps(Codecs::default()));
    handlers.extend(random_steps(RandomGenerators::default()));
    handlers
}

/// Compiles a step pattern written as a literal in this crate.
pub(crate) fn step_pattern(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|error| panic!("invalid step pattern {pattern}: {error}"))
}
