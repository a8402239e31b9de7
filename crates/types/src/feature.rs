//! Feature document model shared by the parser, the resolver and the engine.
//!
//! A [`Feature`] is created by the document parser and annotated exactly once by
//! the dependency resolver (`skip`, `depends_on`, scenario retry tags). After
//! resolution it is wrapped in an `Arc` and never mutated again; every
//! [`ContextualizedFeature`] produced from it shares the same instance.

use std::{path::PathBuf, sync::Arc};

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::retry::RetryTag;

/// Moves a feature behind every feature that does not carry it.
pub const TAG_LAST: &str = "Last";
/// Restricts the run to the features carrying it.
pub const TAG_ONLY: &str = "Only";
/// Skips a feature without executing any of its steps.
pub const TAG_SKIP: &str = "Skip";

/// Values bound to one row of a feature's `Contexts:` table, keyed by header.
pub type Context = IndexMap<String, String>;

/// Returns the tag name without its leading `@`.
pub fn normalize_tag(tag: &str) -> &str {
    tag.trim().trim_start_matches('@')
}

fn tags_contain(tags: &[String], name: &str) -> bool {
    tags.iter().any(|tag| normalize_tag(tag) == name)
}

/// Argument attached to a step, before interpolation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum StepArgument {
    /// Multi-line doc-string body.
    DocString(String),
    /// Data table, one vector of cells per row.
    Table(Vec<Vec<String>>),
}

/// A single Given/When/Then line.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Step {
    /// Keyword as written in the document (`Given`, `And`, ...).
    pub keyword: String,
    /// Step text without the keyword.
    pub text: String,
    /// Optional doc-string or table.
    #[serde(default)]
    pub argument: Option<StepArgument>,
}

impl Step {
    /// Convenience constructor for a step without argument.
    pub fn new(keyword: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            keyword: keyword.into(),
            text: text.into(),
            argument: None,
        }
    }

    /// Attaches a doc-string argument.
    pub fn with_doc_string(mut self, doc_string: impl Into<String>) -> Self {
        self.argument = Some(StepArgument::DocString(doc_string.into()));
        self
    }
}

/// One test case within a feature.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Scenario {
    pub name: String,
    /// Tag names without the leading `@`.
    #[serde(default)]
    pub tags: Vec<String>,
    pub steps: Vec<Step>,
    /// Retry tag found on the scenario or, failing that, on its feature.
    #[serde(default)]
    pub retry: Option<RetryTag>,
}

impl Scenario {
    pub fn has_tag(&self, name: &str) -> bool {
        tags_contain(&self.tags, name)
    }
}

/// A named, tagged test specification.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq, Eq)]
pub struct Feature {
    pub name: String,
    /// Free text written between the `Feature:` line and the first block.
    #[serde(default)]
    pub description: String,
    /// Tag names without the leading `@`.
    #[serde(default)]
    pub tags: Vec<String>,
    /// Steps prepended to every scenario.
    #[serde(default)]
    pub background: Vec<Step>,
    pub scenarios: Vec<Scenario>,
    /// File the feature was read from, when loaded from disk.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Set by the resolver: the feature is reported without execution.
    #[serde(default)]
    pub skip: bool,
    /// Set by the resolver: names of features with a direct edge into this one.
    #[serde(default)]
    pub depends_on: Vec<String>,
}

impl Feature {
    pub fn has_tag(&self, name: &str) -> bool {
        tags_contain(&self.tags, name)
    }

    /// Steps of `scenario` with this feature's background prepended.
    pub fn steps_for<'a>(&'a self, scenario: &'a Scenario) -> impl Iterator<Item = &'a Step> + 'a {
        self.background.iter().chain(scenario.steps.iter())
    }
}

/// A resolved feature paired with one row of its `Contexts:` table.
///
/// A feature without a table yields exactly one instance with an empty context.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ContextualizedFeature {
    pub feature: Arc<Feature>,
    #[serde(default)]
    pub context: Context,
}

impl ContextualizedFeature {
    pub fn new(feature: Arc<Feature>, context: Context) -> Self {
        Self { feature, context }
    }

    pub fn name(&self) -> &str {
        &self.feature.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tags_match_with_or_without_prefix() {
        let feature = Feature {
            name: "Tagged".into(),
            tags: vec!["@Skip".into(), "Last".into()],
            ..Default::default()
        };
        assert!(feature.has_tag(TAG_SKIP));
        assert!(feature.has_tag(TAG_LAST));
        assert!(!feature.has_tag(TAG_ONLY));
    }

    #[test]
    fn background_steps_come_first() {
        let scenario = Scenario {
            name: "s".into(),
            steps: vec![Step::new("When", "I act")],
            ..Default::default()
        };
        let feature = Feature {
            name: "f".into(),
            background: vec![Step::new("Given", "a precondition")],
            scenarios: vec![scenario.clone()],
            ..Default::default()
        };
        let texts: Vec<&str> = feature.steps_for(&scenario).map(|step| step.text.as_str()).collect();
        assert_eq!(texts, vec!["a precondition", "I act"]);
    }
}
