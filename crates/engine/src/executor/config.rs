//! Run configuration.

use std::{path::PathBuf, sync::Arc};

use stepwise_types::{RetryConfiguration, RetryTag, Scenario, Store, World};

use crate::reporter::Reporter;

/// File extension of feature documents picked up by default.
pub const DEFAULT_FEATURE_EXTENSION: &str = "feature";

/// How scenarios are retried.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// When false every scenario runs once, whatever its tags say.
    pub enabled: bool,
    /// Configuration for untagged scenarios and fallback for partially
    /// specified tags. `None` runs untagged scenarios once.
    pub default: Option<RetryConfiguration>,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            enabled: true,
            default: None,
        }
    }
}

impl RetryPolicy {
    pub fn disabled() -> Self {
        Self {
            enabled: false,
            default: None,
        }
    }

    /// Retry configuration applied to `scenario`; `None` means a single attempt.
    pub fn for_scenario(&self, scenario: &Scenario) -> Option<RetryConfiguration> {
        if !self.enabled {
            return None;
        }
        match scenario.retry {
            Some(RetryTag::Disabled) => None,
            Some(tag) => tag.resolve(&self.default.unwrap_or_default()),
            None => self.default,
        }
    }
}

/// Everything a run needs besides the step handlers.
#[derive(Clone)]
pub struct RunConfig {
    pub feature_dir: PathBuf,
    /// Extension (without dot) of the documents to load.
    pub extension: String,
    pub reporters: Vec<Arc<dyn Reporter>>,
    pub retry: RetryPolicy,
    /// Seed for every attempt's store.
    pub store: Store,
    pub world: World,
    /// Skip features whose dependency failed instead of running them.
    pub skip_dependents_of_failed: bool,
}

impl RunConfig {
    pub fn new(feature_dir: impl Into<PathBuf>) -> Self {
        Self {
            feature_dir: feature_dir.into(),
            extension: DEFAULT_FEATURE_EXTENSION.to_string(),
            reporters: Vec::new(),
            retry: RetryPolicy::default(),
            store: Store::new(),
            world: World::default(),
            skip_dependents_of_failed: true,
        }
    }

    pub fn with_reporter(mut self, reporter: Arc<dyn Reporter>) -> Self {
        self.reporters.push(reporter);
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_store(mut self, store: Store) -> Self {
        self.store = store;
        self
    }

    pub fn with_world(mut self, world: World) -> Self {
        self.world = world;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(retry: Option<RetryTag>) -> Scenario {
        Scenario {
            name: "s".into(),
            retry,
            ..Default::default()
        }
    }

    #[test]
    fn untagged_scenarios_use_the_run_default() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.for_scenario(&scenario(None)), None);

        let configured = RetryPolicy {
            enabled: true,
            default: Some(RetryConfiguration::default()),
        };
        assert_eq!(configured.for_scenario(&scenario(None)), Some(RetryConfiguration::default()));
    }

    #[test]
    fn disabled_policy_ignores_tags() {
        let tag = RetryTag::Configured {
            initial_delay: Some(1),
            max_delay: Some(2),
            fail_after: Some(3),
        };
        assert_eq!(RetryPolicy::disabled().for_scenario(&scenario(Some(tag))), None);
        assert_eq!(
            RetryPolicy::default().for_scenario(&scenario(Some(tag))),
            Some(RetryConfiguration {
                initial_delay: 1,
                max_delay: 2,
                fail_after: 3,
            })
        );
        assert_eq!(RetryPolicy::default().for_scenario(&scenario(Some(RetryTag::Disabled))), None);
    }
}
