//! Store assertions, transformations and encoders.
//!
//! Expressions are evaluated against the attempt's store viewed as a JSON
//! object, e.g. `"user.ids[0]" should equal 4`.

use std::sync::Arc;

use anyhow::{Result, anyhow, bail, ensure};
use rand::Rng;
use serde_json::{Value, json};
use stepwise_engine::{Captures, InterpolatedStep, StepHandler, regex_step};

use crate::{
    encoding::Codecs,
    json_query::{ensure_matches, require},
    step_pattern,
};

/// Storage step handlers using `codecs` for the encode/decode step.
pub fn storage_steps(codecs: Codecs) -> Vec<Box<dyn StepHandler>> {
    let codecs = Arc::new(codecs);
    vec![
        regex_step(
            step_pattern(
                r#"^"(?P<exp>[^"]+)" should (?P<equalOrMatch>equal|be|match) (?:(?P<jsonMatch>this JSON)|"(?P<stringMatch>[^"]+)"|(?P<numMatch>[0-9]+)|(?P<boolMatch>true|false))$"#,
            ),
            |captures, step, runner, _| {
                let expected = expected_value(captures, step)?;
                let store = runner.store().to_value();
                let fragment = require(&store, captures.require_name("exp")?)?;
                ensure_matches(fragment, &expected, captures.require_name("equalOrMatch")? == "match")?;
                Ok(fragment.clone())
            },
        ),
        regex_step(
            step_pattern(r#"^I parse "(?P<exp>[^"]+)" into "(?P<storeName>[^"]+)"$"#),
            |captures, _, runner, _| {
                let store = runner.store().to_value();
                let source = require(&store, captures.require_name("exp")?)?;
                let text = source
                    .as_str()
                    .ok_or_else(|| anyhow!("can only parse strings, got {source}"))?;
                let parsed: Value = serde_json::from_str(text)?;
                runner.store_mut().insert(captures.require_name("storeName")?, parsed.clone());
                Ok(parsed)
            },
        ),
        regex_step(
            step_pattern(r#"^I store "(?P<exp>[^"]+)" into "(?P<storeName>[^"]+)"$"#),
            |captures, _, runner, _| {
                let store = runner.store().to_value();
                let value = require(&store, captures.require_name("exp")?)?.clone();
                runner.store_mut().insert(captures.require_name("storeName")?, value.clone());
                Ok(value)
            },
        ),
        regex_step(
            step_pattern(
                r#"^I (?P<encodeOrDecode>encode|decode) (?:"(?P<exp>[^"]+)"|this payload) into "(?P<storeName>[^"]+)" using (?P<encoding>[a-zA-Z0-9]+)$"#,
            ),
            move |captures, step, runner, _| {
                let data = match captures.name("exp") {
                    Some(expression) => require(&runner.store().to_value(), expression)?.clone(),
                    None => Value::String(
                        step.doc_string()
                            .ok_or_else(|| anyhow!("step \"{}\" requires a doc-string argument", step.text))?
                            .to_string(),
                    ),
                };
                let encoding = captures.require_name("encoding")?;
                let converted = if captures.require_name("encodeOrDecode")? == "encode" {
                    codecs.encode(encoding, &data)?
                } else {
                    codecs.decode(encoding, &data)?
                };
                runner
                    .store_mut()
                    .insert(captures.require_name("storeName")?, converted.clone());
                Ok(json!([data, converted]))
            },
        ),
        regex_step(
            step_pattern(
                r#"^I store a random number between (?P<minInclusive>[0-9]+) and (?P<maxInclusive>[0-9]+) into "(?P<storeName>[^"]+)"$"#,
            ),
            |captures, _, runner, _| {
                let min: u64 = captures.require_name("minInclusive")?.parse()?;
                let max: u64 = captures.require_name("maxInclusive")?.parse()?;
                if max <= min {
                    bail!("max inclusive {max} must be greater than {min}!");
                }
                let number = rand::thread_rng().gen_range(min..=max);
                runner.store_mut().insert(captures.require_name("storeName")?, number);
                Ok(json!(number))
            },
        ),
    ]
}

fn expected_value(captures: &Captures, step: &InterpolatedStep) -> Result<Value> {
    if captures.name("jsonMatch").is_some() {
        return step.doc_string_json();
    }
    if let Some(text) = captures.name("stringMatch") {
        return Ok(Value::String(text.to_string()));
    }
    if let Some(number) = captures.name("numMatch") {
        return Ok(json!(number.parse::<u64>()?));
    }
    let flag = captures
        .name("boolMatch")
        .ok_or_else(|| anyhow!("step \"{}\" has no expected value", step.text))?;
    ensure!(flag == "true" || flag == "false", "invalid boolean {flag}");
    Ok(Value::Bool(flag == "true"))
}
