//! `<name>` placeholder substitution for step text and step arguments.
//!
//! Lookup precedence is context, then store, then world: the most specific
//! source wins. Names may address nested JSON with the path syntax of
//! [`value_path`](crate::value_path), e.g. `<user.ids[0]>`. A name that matches
//! the whole key is preferred over path navigation, so store keys containing
//! dots keep working. Any placeholder left unresolved fails the step.

use anyhow::{Context as _, Result, anyhow};
use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use stepwise_types::{Context, Step, StepArgument, Store, World};

use crate::{
    error::StepError,
    value_path::{render_value, select_path},
};

static PLACEHOLDER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"<([A-Za-z_$][A-Za-z0-9_$.\-\[\]]*)>").expect("placeholder pattern is valid"));

/// Read-only view of the values a step may reference.
#[derive(Debug, Clone, Copy)]
pub struct InterpolationScope<'a> {
    pub context: &'a Context,
    pub store: &'a Store,
    pub world: &'a World,
}

impl<'a> InterpolationScope<'a> {
    pub fn new(context: &'a Context, store: &'a Store, world: &'a World) -> Self {
        Self { context, store, world }
    }

    /// Resolves `name` honoring context > store > world.
    pub fn lookup(&self, name: &str) -> Option<Value> {
        if let Some(value) = self.context.get(name) {
            return Some(Value::String(value.clone()));
        }
        lookup_in(|key| self.store.get(key), name)
            .or_else(|| lookup_in(|key| self.world.get(key), name))
            .cloned()
    }
}

fn lookup_in<'v>(get: impl Fn(&str) -> Option<&'v Value>, name: &str) -> Option<&'v Value> {
    if let Some(value) = get(name) {
        return Some(value);
    }
    let split = name.find(['.', '['])?;
    let (head, rest) = name.split_at(split);
    select_path(get(head)?, rest)
}

/// Placeholder that could not be resolved against any source.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnresolvedPlaceholder(pub String);

/// Substitutes every `<name>` occurrence in `text`.
pub fn interpolate(text: &str, scope: &InterpolationScope<'_>) -> Result<String, UnresolvedPlaceholder> {
    let mut output = String::with_capacity(text.len());
    let mut last_end = 0;
    for captures in PLACEHOLDER.captures_iter(text) {
        let (Some(whole), Some(name)) = (captures.get(0), captures.get(1)) else {
            continue;
        };
        let value = scope
            .lookup(name.as_str())
            .ok_or_else(|| UnresolvedPlaceholder(name.as_str().to_string()))?;
        output.push_str(&text[last_end..whole.start()]);
        output.push_str(&render_value(&value));
        last_end = whole.end();
    }
    output.push_str(&text[last_end..]);
    Ok(output)
}

/// A step after placeholder substitution, as handed to step handlers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InterpolatedStep {
    pub keyword: String,
    /// Text after substitution; handlers match against this.
    pub text: String,
    /// Text as written in the document.
    pub raw_text: String,
    pub argument: Option<StepArgument>,
}

impl InterpolatedStep {
    pub fn doc_string(&self) -> Option<&str> {
        match &self.argument {
            Some(StepArgument::DocString(body)) => Some(body),
            _ => None,
        }
    }

    pub fn table(&self) -> Option<&[Vec<String>]> {
        match &self.argument {
            Some(StepArgument::Table(rows)) => Some(rows),
            _ => None,
        }
    }

    /// Parses the doc-string argument as JSON.
    pub fn doc_string_json(&self) -> Result<Value> {
        let body = self
            .doc_string()
            .ok_or_else(|| anyhow!("step \"{}\" requires a doc-string argument", self.text))?;
        serde_json::from_str(body.trim()).with_context(|| format!("doc-string of step \"{}\" is not valid JSON", self.text))
    }
}

/// Interpolates a step's text and argument.
pub fn interpolate_step(step: &Step, scope: &InterpolationScope<'_>) -> Result<InterpolatedStep, StepError> {
    let to_error = |UnresolvedPlaceholder(placeholder)| StepError::Interpolation {
        step: step.text.clone(),
        placeholder,
    };
    let text = interpolate(&step.text, scope).map_err(to_error)?;
    let argument = match &step.argument {
        None => None,
        Some(StepArgument::DocString(body)) => Some(StepArgument::DocString(interpolate(body, scope).map_err(to_error)?)),
        Some(StepArgument::Table(rows)) => {
            let rows = rows
                .iter()
                .map(|row| row.iter().map(|cell| interpolate(cell, scope)).collect::<Result<Vec<_>, _>>())
                .collect::<Result<Vec<_>, _>>()
                .map_err(to_error)?;
            Some(StepArgument::Table(rows))
        }
    };
    Ok(InterpolatedStep {
        keyword: step.keyword.clone(),
        text,
        raw_text: step.text.clone(),
        argument,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn world() -> World {
        World::new(
            json!({"host": "world-host", "user": {"name": "ada"}})
                .as_object()
                .cloned()
                .unwrap_or_default(),
        )
    }

    #[test]
    fn context_overrides_store_overrides_world() {
        let mut context = Context::new();
        context.insert("host".into(), "context-host".into());
        let mut store = Store::new();
        store.insert("host", "store-host");
        store.insert("port", 8080);
        let world = world();

        let scope = InterpolationScope::new(&context, &store, &world);
        assert_eq!(interpolate("<host>:<port>", &scope).expect("resolved"), "context-host:8080");

        let empty = Context::new();
        let scope = InterpolationScope::new(&empty, &store, &world);
        assert_eq!(interpolate("<host>", &scope).expect("resolved"), "store-host");

        let store = Store::new();
        let scope = InterpolationScope::new(&empty, &store, &world);
        assert_eq!(interpolate("<host>", &scope).expect("resolved"), "world-host");
    }

    #[test]
    fn nested_paths_are_resolved() {
        let context = Context::new();
        let mut store = Store::new();
        store.insert("ids", json!([4, 5]));
        let world = world();
        let scope = InterpolationScope::new(&context, &store, &world);
        assert_eq!(
            interpolate("/users/<user.name>/items/<ids[1]>", &scope).expect("resolved"),
            "/users/ada/items/5"
        );
    }

    #[test]
    fn unresolved_placeholder_fails_the_step() {
        let context = Context::new();
        let store = Store::new();
        let world = World::default();
        let scope = InterpolationScope::new(&context, &store, &world);
        let step = Step::new("When", "I GET /things/<thingId>");
        match interpolate_step(&step, &scope) {
            Err(StepError::Interpolation { step, placeholder }) => {
                assert_eq!(placeholder, "thingId");
                assert_eq!(step, "I GET /things/<thingId>");
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn doc_string_arguments_are_interpolated() {
        let mut context = Context::new();
        context.insert("name".into(), "widget".into());
        let store = Store::new();
        let world = World::default();
        let scope = InterpolationScope::new(&context, &store, &world);
        let step = Step::new("When", "I POST to /items with this JSON").with_doc_string(r#"{"name": "<name>"}"#);
        let interpolated = interpolate_step(&step, &scope).expect("interpolated");
        assert_eq!(interpolated.doc_string_json().expect("json"), json!({"name": "widget"}));
        assert_eq!(interpolated.raw_text, "I POST to /items with this JSON");
    }
}
