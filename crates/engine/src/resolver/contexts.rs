//! `Contexts:` tables embedded in feature descriptions.
//!
//! ```text
//! Feature: Devices
//!   Contexts:
//!
//!   | deviceType | firmware |
//!   | sensor     | 1.0.0    |
//!   | gateway    | 2.1.3    |
//! ```
//!
//! Each data row becomes one run of the feature with the header names bound to
//! the row's cells.

use std::sync::Arc;

use once_cell::sync::Lazy;
use regex::Regex;
use stepwise_types::{Context, ContextualizedFeature, Feature};
use tracing::{debug, warn};

const CONTEXTS_MARKER: &str = "Contexts:";

static TABLE_ROW: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\|([^|]+\|)+$").expect("table row pattern is valid"));

/// Extracts the rows of the `Contexts:` table in `description`.
///
/// The marker must be followed by a blank line; otherwise, or without a
/// marker, the result is empty. The table ends at the first line that is not
/// a row. Rows whose cell count differs from the header are dropped.
pub fn parse_contexts(description: &str) -> Vec<Context> {
    let mut lines = description.lines().map(str::trim);
    if !lines.any(|line| line == CONTEXTS_MARKER) {
        return Vec::new();
    }
    if lines.next() != Some("") {
        debug!("Contexts marker not followed by a blank line");
        return Vec::new();
    }

    let mut rows = Vec::new();
    for line in lines.skip_while(|line| line.is_empty()) {
        if !TABLE_ROW.is_match(line) {
            break;
        }
        rows.push(split_cells(line));
    }

    let mut rows = rows.into_iter();
    let Some(header) = rows.next() else {
        return Vec::new();
    };
    rows.filter_map(|cells| {
        if cells.len() != header.len() {
            warn!(
                expected = header.len(),
                found = cells.len(),
                "ignoring Contexts row with mismatched cell count"
            );
            return None;
        }
        Some(header.iter().cloned().zip(cells).collect::<Context>())
    })
    .collect()
}

fn split_cells(line: &str) -> Vec<String> {
    line[1..line.len() - 1].split('|').map(|cell| cell.trim().to_string()).collect()
}

/// Expands a resolved feature into one instance per context row, or a single
/// instance with an empty context when the feature declares none.
pub fn contextualize(feature: Arc<Feature>) -> Vec<ContextualizedFeature> {
    let contexts = parse_contexts(&feature.description);
    if contexts.is_empty() {
        return vec![ContextualizedFeature::new(feature, Context::new())];
    }
    debug!(feature = %feature.name, contexts = contexts.len(), "feature expanded by Contexts table");
    contexts
        .into_iter()
        .map(|context| ContextualizedFeature::new(Arc::clone(&feature), context))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_header_and_rows() {
        let description = "Some introduction\n  Contexts:\n\n  | deviceType | firmware |\n  | sensor | 1.0.0 |\n  | gateway | 2.1.3 |\n";
        let contexts = parse_contexts(description);
        assert_eq!(contexts.len(), 2);
        assert_eq!(contexts[0].get("deviceType").map(String::as_str), Some("sensor"));
        assert_eq!(contexts[1].get("firmware").map(String::as_str), Some("2.1.3"));
        let headers: Vec<&str> = contexts[0].keys().map(String::as_str).collect();
        assert_eq!(headers, vec!["deviceType", "firmware"]);
    }

    #[test]
    fn missing_marker_yields_no_contexts() {
        assert!(parse_contexts("| a | b |\n| 1 | 2 |").is_empty());
        assert!(parse_contexts("").is_empty());
    }

    #[test]
    fn table_ends_at_first_non_row_line() {
        let description = "Contexts:\n\n| name |\n| one |\nNot a row\n| two |";
        let contexts = parse_contexts(description);
        assert_eq!(contexts.len(), 1);
        assert_eq!(contexts[0].get("name").map(String::as_str), Some("one"));
    }

    #[test]
    fn marker_without_blank_line_yields_no_contexts() {
        assert!(parse_contexts("Contexts:\n| a |\n| 1 |").is_empty());
        assert!(parse_contexts("Contexts:").is_empty());
    }

    #[test]
    fn header_only_table_yields_no_contexts() {
        assert!(parse_contexts("Contexts:\n\n| name |").is_empty());
    }

    #[test]
    fn contextualize_shares_the_feature() {
        let feature = Arc::new(Feature {
            name: "Devices".into(),
            description: "Contexts:\n\n| kind |\n| a |\n| b |".into(),
            ..Default::default()
        });
        let instances = contextualize(Arc::clone(&feature));
        assert_eq!(instances.len(), 2);
        assert!(instances.iter().all(|instance| Arc::ptr_eq(&instance.feature, &feature)));

        let plain = Arc::new(Feature {
            name: "Plain".into(),
            ..Default::default()
        });
        let instances = contextualize(plain);
        assert_eq!(instances.len(), 1);
        assert!(instances[0].context.is_empty());
    }
}
