//! Feature discovery, dependency resolution and context expansion.
//!
//! Loading runs in a fixed sequence:
//! 1. discover `*.<extension>` files in the feature directory (non-recursive,
//!    sorted by file name) and parse them
//! 2. move `@Last` features behind all others, keeping relative order
//! 3. collect run-after edges from background sentinel steps
//! 4. order the features topologically
//! 5. mark skipped features (`@Only` / `@Skip`) and record `depends_on`
//! 6. attach retry tags to scenarios
//! 7. expand `Contexts:` tables
//!
//! Any failure aborts before a single step executes.

mod contexts;
mod planning;

use std::{
    collections::HashSet,
    fs,
    path::{Path, PathBuf},
    sync::Arc,
};

use once_cell::sync::Lazy;
use regex::Regex;
use stepwise_types::{ContextualizedFeature, Feature, RetryTag, TAG_LAST, TAG_ONLY, TAG_SKIP};
use tracing::{debug, info};

pub use contexts::{contextualize, parse_contexts};

use crate::{
    document::parse_feature,
    error::{LoadError, RunError},
};

/// Background step declaring that the feature runs after another one.
pub(crate) static RUN_AFTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r#"^I am run after the "([^"]+)" feature$"#).expect("run-after pattern is valid"));

/// Name of the feature a step declares a run-after dependency on.
pub fn run_after_target(step_text: &str) -> Option<&str> {
    RUN_AFTER
        .captures(step_text.trim())
        .and_then(|captures| captures.get(1))
        .map(|target| target.as_str())
}

/// Discovers, parses, orders and expands every feature in `directory`.
pub fn load_features(directory: &Path, extension: &str) -> Result<Vec<ContextualizedFeature>, RunError> {
    let features = parse_directory(directory, extension)?;
    let resolved = resolve_features(features)?;
    let expanded: Vec<ContextualizedFeature> = resolved.into_iter().flat_map(contextualize).collect();
    info!(
        directory = %directory.display(),
        features = expanded.len(),
        skipped = expanded.iter().filter(|instance| instance.feature.skip).count(),
        "features loaded"
    );
    Ok(expanded)
}

/// Lists feature files directly inside `directory`, sorted by file name.
pub fn discover_feature_files(directory: &Path, extension: &str) -> Result<Vec<PathBuf>, LoadError> {
    let io_error = |source| LoadError::Io {
        path: directory.to_path_buf(),
        source,
    };
    let mut files = Vec::new();
    for entry in fs::read_dir(directory).map_err(io_error)? {
        let path = entry.map_err(io_error)?.path();
        let matches_extension = path
            .extension()
            .and_then(|value| value.to_str())
            .is_some_and(|value| value == extension);
        if matches_extension && path.is_file() {
            files.push(path);
        }
    }
    if files.is_empty() {
        return Err(LoadError::NoFeatures(directory.to_path_buf()));
    }
    files.sort();
    Ok(files)
}

/// Parses every feature file in `directory`, in discovery order.
pub fn parse_directory(directory: &Path, extension: &str) -> Result<Vec<Feature>, RunError> {
    let files = discover_feature_files(directory, extension)?;
    let mut features = Vec::with_capacity(files.len());
    for path in files {
        let text = fs::read_to_string(&path).map_err(|source| LoadError::Io {
            path: path.clone(),
            source,
        })?;
        features.push(parse_feature(&text, Some(&path))?);
    }
    Ok(features)
}

/// Orders `features` and annotates them with skip flags, dependencies and
/// retry tags. The returned features are frozen.
pub fn resolve_features(features: Vec<Feature>) -> Result<Vec<Arc<Feature>>, LoadError> {
    let (mut features, last): (Vec<Feature>, Vec<Feature>) =
        features.into_iter().partition(|feature| !feature.has_tag(TAG_LAST));
    features.extend(last);

    let edges = collect_edges(&features)?;
    let names: Vec<String> = features.iter().map(|feature| feature.name.clone()).collect();
    let order = planning::order_features(&names, &edges)?;

    let mut slots: Vec<Option<Feature>> = features.into_iter().map(Some).collect();
    let mut ordered: Vec<Feature> = order.into_iter().filter_map(|position| slots[position].take()).collect();

    let only_mode = ordered.iter().any(|feature| feature.has_tag(TAG_ONLY));
    for feature in &mut ordered {
        feature.skip = if only_mode {
            !feature.has_tag(TAG_ONLY) || feature.has_tag(TAG_SKIP)
        } else {
            feature.has_tag(TAG_SKIP)
        };
        feature.depends_on = edges
            .iter()
            .filter(|(_, dependent)| *dependent == feature.name)
            .map(|(dependency, _)| dependency.clone())
            .collect();
        attach_retry_tags(feature)?;
        debug!(
            feature = %feature.name,
            skip = feature.skip,
            depends_on = ?feature.depends_on,
            "feature resolved"
        );
    }

    Ok(ordered.into_iter().map(Arc::new).collect())
}

/// Run-after edges as `(dependency, dependent)` pairs, deduplicated.
fn collect_edges(features: &[Feature]) -> Result<Vec<(String, String)>, LoadError> {
    let known: HashSet<&str> = features.iter().map(|feature| feature.name.as_str()).collect();
    let mut edges: Vec<(String, String)> = Vec::new();
    for feature in features {
        for step in &feature.background {
            let Some(target) = run_after_target(&step.text) else {
                continue;
            };
            if !known.contains(target) {
                return Err(LoadError::UnknownDependency {
                    feature: feature.name.clone(),
                    dependency: target.to_string(),
                });
            }
            let edge = (target.to_string(), feature.name.clone());
            if !edges.contains(&edge) {
                edges.push(edge);
            }
        }
    }
    Ok(edges)
}

fn attach_retry_tags(feature: &mut Feature) -> Result<(), LoadError> {
    let to_error = |source| LoadError::Retry {
        feature: feature.name.clone(),
        source,
    };
    let feature_tag = RetryTag::from_tags(&feature.tags).map_err(to_error)?;
    let mut retries = Vec::with_capacity(feature.scenarios.len());
    for scenario in &feature.scenarios {
        retries.push(RetryTag::from_tags(&scenario.tags).map_err(to_error)?.or(feature_tag));
    }
    for (scenario, retry) in feature.scenarios.iter_mut().zip(retries) {
        scenario.retry = retry;
    }
    Ok(())
}
