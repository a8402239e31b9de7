//! Gherkin document parsing.
//!
//! Converts the `gherkin` crate's syntax tree into the engine's [`Feature`]
//! model. Tags lose their leading `@`; backgrounds are flattened into a step
//! list. Rules and scenario outlines are not expanded.

use std::path::Path;

use gherkin::GherkinEnv;
use stepwise_types::{Feature, Scenario, Step, StepArgument, normalize_tag};
use tracing::debug;

use crate::error::ParseError;

/// Parses one feature document. `path` is recorded on the feature and in errors.
pub fn parse_feature(text: &str, path: Option<&Path>) -> Result<Feature, ParseError> {
    let document = gherkin::Feature::parse(text, GherkinEnv::default()).map_err(|error| ParseError {
        path: path.map(Path::to_path_buf),
        message: error.to_string(),
    })?;

    let feature = Feature {
        name: document.name.trim().to_string(),
        description: match document.description {
            Some(_) => raw_description(text, &document.keyword),
            None => String::new(),
        },
        tags: convert_tags(&document.tags),
        background: document
            .background
            .as_ref()
            .map(|background| background.steps.iter().map(convert_step).collect())
            .unwrap_or_default(),
        scenarios: document.scenarios.iter().map(convert_scenario).collect(),
        path: path.map(Path::to_path_buf),
        ..Default::default()
    };
    debug!(
        feature = %feature.name,
        scenarios = feature.scenarios.len(),
        background_steps = feature.background.len(),
        "parsed feature document"
    );
    Ok(feature)
}

/// Description block as written, blank lines included.
///
/// The parser collapses runs of newlines inside descriptions, but a
/// `Contexts:` table is only recognized when a blank line follows its marker.
fn raw_description(text: &str, keyword: &str) -> String {
    let marker = format!("{}:", keyword.trim());
    let lines: Vec<&str> = text
        .lines()
        .skip_while(|line| !line.trim_start().starts_with(&marker))
        .skip(1)
        .map(str::trim)
        .filter(|line| !line.starts_with('#'))
        .take_while(|line| !starts_block(line))
        .collect();
    let start = lines.iter().position(|line| !line.is_empty()).unwrap_or(lines.len());
    let end = lines.iter().rposition(|line| !line.is_empty()).map_or(start, |index| index + 1);
    lines[start..end].join("\n")
}

fn starts_block(line: &str) -> bool {
    const BLOCK_KEYWORDS: [&str; 6] = ["Background:", "Scenario:", "Scenario Outline:", "Scenario Template:", "Example:", "Rule:"];
    line.starts_with('@') || BLOCK_KEYWORDS.iter().any(|keyword| line.starts_with(keyword))
}

fn convert_tags(tags: &[String]) -> Vec<String> {
    tags.iter().map(|tag| normalize_tag(tag).to_string()).collect()
}

fn convert_scenario(scenario: &gherkin::Scenario) -> Scenario {
    Scenario {
        name: scenario.name.trim().to_string(),
        tags: convert_tags(&scenario.tags),
        steps: scenario.steps.iter().map(convert_step).collect(),
        retry: None,
    }
}

fn convert_step(step: &gherkin::Step) -> Step {
    let argument = match (&step.docstring, &step.table) {
        (Some(doc_string), _) => Some(StepArgument::DocString(doc_string.clone())),
        (None, Some(table)) => Some(StepArgument::Table(table.rows.clone())),
        (None, None) => None,
    };
    Step {
        keyword: step.keyword.trim().to_string(),
        text: step.value.trim().to_string(),
        argument,
    }
}
