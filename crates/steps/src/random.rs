//! Random value generators.

use std::sync::Arc;

use anyhow::anyhow;
use indexmap::IndexMap;
use serde_json::Value;
use stepwise_engine::{StepHandler, regex_step};
use uuid::Uuid;

use crate::step_pattern;

pub type Generator = Arc<dyn Fn() -> String + Send + Sync>;

/// Generators by the name used in step text. The default set has `UUID`.
#[derive(Clone)]
pub struct RandomGenerators(IndexMap<String, Generator>);

impl Default for RandomGenerators {
    fn default() -> Self {
        Self(IndexMap::new()).with("UUID", || Uuid::new_v4().to_string())
    }
}

impl RandomGenerators {
    pub fn with<F>(mut self, name: impl Into<String>, generator: F) -> Self
    where
        F: Fn() -> String + Send + Sync + 'static,
    {
        self.0.insert(name.into(), Arc::new(generator));
        self
    }

    pub fn generate(&self, name: &str) -> Option<String> {
        self.0.get(name).map(|generator| generator())
    }
}

pub fn random_steps(generators: RandomGenerators) -> Vec<Box<dyn StepHandler>> {
    vec![regex_step(
        step_pattern(r#"^I have a random (?P<generatorId>[^ ]+) in "(?P<storeName>[^"]+)"$"#),
        move |captures, _, runner, _| {
            let generator_id = captures.require_name("generatorId")?;
            let value = generators
                .generate(generator_id)
                .ok_or_else(|| anyhow!("Unknown random string generator \"{generator_id}\"!"))?;
            runner.store_mut().insert(captures.require_name("storeName")?, value.clone());
            Ok(Value::String(value))
        },
    )]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_generator_produces_uuids() {
        let value = RandomGenerators::default().generate("UUID").expect("uuid generator");
        assert!(Uuid::parse_str(&value).is_ok());
        assert!(RandomGenerators::default().generate("Nope").is_none());
    }
}
