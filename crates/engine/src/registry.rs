//! Step handler contract and the ordered handler registry.
//!
//! Handlers are consulted in registration order and the first one whose
//! predicate matches the interpolated step text wins, so specific patterns
//! must be registered ahead of generic fallbacks.

use anyhow::{Result, anyhow};
use async_trait::async_trait;
use indexmap::IndexMap;
use regex::Regex;
use serde_json::Value;
use stepwise_types::FlightRecorder;
use tracing::debug;

use crate::{
    error::StepError,
    executor::RunnerHandle,
    interpolate::InterpolatedStep,
    resolver::RUN_AFTER,
};

/// Values captured from the step text by a handler's predicate.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Captures {
    positional: Vec<Option<String>>,
    named: IndexMap<String, String>,
}

impl Captures {
    /// Captures from a regex match. Group 0 (the whole match) is not included.
    pub fn from_regex(regex: &Regex, captures: &regex::Captures<'_>) -> Self {
        let positional = captures
            .iter()
            .skip(1)
            .map(|group| group.map(|value| value.as_str().to_string()))
            .collect();
        let named = regex
            .capture_names()
            .flatten()
            .filter_map(|name| captures.name(name).map(|value| (name.to_string(), value.as_str().to_string())))
            .collect();
        Self { positional, named }
    }

    /// Positional capture `index` (0-based), if the group participated.
    pub fn get(&self, index: usize) -> Option<&str> {
        self.positional.get(index).and_then(|value| value.as_deref())
    }

    /// Named capture, if the group participated.
    pub fn name(&self, name: &str) -> Option<&str> {
        self.named.get(name).map(String::as_str)
    }

    pub fn require(&self, index: usize) -> Result<&str> {
        self.get(index).ok_or_else(|| anyhow!("capture group {} did not match", index + 1))
    }

    pub fn require_name(&self, name: &str) -> Result<&str> {
        self.name(name).ok_or_else(|| anyhow!("named capture '{name}' did not match"))
    }

    pub fn len(&self) -> usize {
        self.positional.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty()
    }
}

/// Recognizes and executes one kind of step.
#[async_trait]
pub trait StepHandler: Send + Sync {
    /// Returns captures when this handler accepts `text`.
    fn try_match(&self, text: &str) -> Option<Captures>;

    /// Executes the step. The returned value is recorded in the step result.
    async fn run(
        &self,
        captures: Captures,
        step: &InterpolatedStep,
        runner: &mut RunnerHandle<'_>,
        flight_recorder: &mut FlightRecorder,
    ) -> Result<Value>;

    /// Short description used in debug logs.
    fn describe(&self) -> String {
        "step handler".to_string()
    }
}

/// Ordered collection of step handlers.
#[derive(Default)]
pub struct StepRegistry {
    handlers: Vec<Box<dyn StepHandler>>,
}

impl StepRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the engine's built-in steps.
    pub fn with_builtin_steps() -> Self {
        let mut registry = Self::new();
        registry.extend(builtin_steps());
        registry
    }

    pub fn register(&mut self, handler: Box<dyn StepHandler>) {
        self.handlers.push(handler);
    }

    /// Appends a module's handlers after the ones already registered.
    pub fn extend<I>(&mut self, handlers: I)
    where
        I: IntoIterator<Item = Box<dyn StepHandler>>,
    {
        self.handlers.extend(handlers);
    }

    /// Finds the first handler accepting `text`.
    pub fn find(&self, text: &str) -> Result<(&dyn StepHandler, Captures), StepError> {
        for handler in &self.handlers {
            if let Some(captures) = handler.try_match(text) {
                debug!(step = %text, handler = %handler.describe(), "step matched");
                return Ok((handler.as_ref(), captures));
            }
        }
        Err(StepError::Undefined { step: text.to_string() })
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

/// Handler backed by a regex predicate and a synchronous closure.
pub struct RegexStep<F> {
    pattern: Regex,
    handler: F,
}

/// Builds a boxed [`RegexStep`].
pub fn regex_step<F>(pattern: Regex, handler: F) -> Box<dyn StepHandler>
where
    F: Fn(&Captures, &InterpolatedStep, &mut RunnerHandle<'_>, &mut FlightRecorder) -> Result<Value> + Send + Sync + 'static,
{
    Box::new(RegexStep { pattern, handler })
}

#[async_trait]
impl<F> StepHandler for RegexStep<F>
where
    F: Fn(&Captures, &InterpolatedStep, &mut RunnerHandle<'_>, &mut FlightRecorder) -> Result<Value> + Send + Sync + 'static,
{
    fn try_match(&self, text: &str) -> Option<Captures> {
        self.pattern
            .captures(text)
            .map(|captures| Captures::from_regex(&self.pattern, &captures))
    }

    async fn run(
        &self,
        captures: Captures,
        step: &InterpolatedStep,
        runner: &mut RunnerHandle<'_>,
        flight_recorder: &mut FlightRecorder,
    ) -> Result<Value> {
        (self.handler)(&captures, step, runner, flight_recorder)
    }

    fn describe(&self) -> String {
        self.pattern.as_str().to_string()
    }
}

/// Steps every run understands, registered ahead of user handlers.
pub fn builtin_steps() -> Vec<Box<dyn StepHandler>> {
    vec![regex_step(RUN_AFTER.clone(), |captures, _, _, _| {
        Ok(Value::String(format!("runs after {}", captures.require(0)?)))
    })]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn literal(pattern: &str, tag: &'static str) -> Box<dyn StepHandler> {
        regex_step(Regex::new(pattern).expect("pattern"), move |_, _, _, _| Ok(Value::String(tag.into())))
    }

    #[test]
    fn first_registered_match_wins() {
        let mut registry = StepRegistry::new();
        registry.register(literal("^I GET /special$", "specific"));
        registry.register(literal("^I GET (.+)$", "generic"));

        let (handler, _) = registry.find("I GET /special").expect("matched");
        assert_eq!(handler.describe(), "^I GET /special$");
        let (handler, captures) = registry.find("I GET /other").expect("matched");
        assert_eq!(handler.describe(), "^I GET (.+)$");
        assert_eq!(captures.get(0), Some("/other"));
    }

    #[test]
    fn unmatched_text_is_undefined() {
        let registry = StepRegistry::with_builtin_steps();
        match registry.find("I do something nobody implemented") {
            Err(StepError::Undefined { step }) => assert_eq!(step, "I do something nobody implemented"),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected undefined step"),
        }
    }

    #[test]
    fn named_and_positional_captures() {
        let regex = Regex::new(r"^(?P<method>GET|POST) (?P<path>\S+)( quietly)?$").expect("pattern");
        let matched = regex.captures("POST /items").expect("match");
        let captures = Captures::from_regex(&regex, &matched);
        assert_eq!(captures.name("method"), Some("POST"));
        assert_eq!(captures.get(1), Some("/items"));
        assert_eq!(captures.get(2), None);
        assert_eq!(captures.len(), 3);
        assert!(captures.require(2).is_err());
    }

    #[test]
    fn builtin_sentinel_is_registered() {
        let registry = StepRegistry::with_builtin_steps();
        assert!(registry.find(r#"I am run after the "Setup" feature"#).is_ok());
    }
}
