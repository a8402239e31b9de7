//! Path queries and structural comparisons over JSON documents.

use anyhow::{Result, anyhow, ensure};
use serde_json::Value;
use stepwise_engine::select_path;

/// Evaluates `expression` against `document`. Missing values and `null`
/// are both reported as absent.
pub fn query<'a>(document: &'a Value, expression: &str) -> Option<&'a Value> {
    select_path(document, expression).filter(|value| !value.is_null())
}

/// Like [`query`], failing when nothing matches.
pub fn require<'a>(document: &'a Value, expression: &str) -> Result<&'a Value> {
    query(document, expression).ok_or_else(|| anyhow!("\"{expression}\" did not match anything in {document}"))
}

/// True when every field and array item of `expected` has a counterpart in
/// `actual`. Array items may match any item on the other side.
pub fn contains_subset(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(actual), Value::Object(expected)) => expected.iter().all(|(key, expected_value)| {
            actual
                .get(key)
                .is_some_and(|actual_value| contains_subset(actual_value, expected_value))
        }),
        (Value::Array(actual), Value::Array(expected)) => expected
            .iter()
            .all(|expected_item| actual.iter().any(|actual_item| contains_subset(actual_item, expected_item))),
        (Value::Number(actual), Value::Number(expected)) => actual.as_f64() == expected.as_f64(),
        _ => actual == expected,
    }
}

/// Structural equality with numbers compared by value, so `2` equals `2.0`.
pub fn values_equal(actual: &Value, expected: &Value) -> bool {
    match (actual, expected) {
        (Value::Object(actual), Value::Object(expected)) => {
            actual.len() == expected.len()
                && expected.iter().all(|(key, expected_value)| {
                    actual
                        .get(key)
                        .is_some_and(|actual_value| values_equal(actual_value, expected_value))
                })
        }
        (Value::Array(actual), Value::Array(expected)) => {
            actual.len() == expected.len()
                && actual
                    .iter()
                    .zip(expected)
                    .all(|(actual_item, expected_item)| values_equal(actual_item, expected_item))
        }
        (Value::Number(actual), Value::Number(expected)) => actual.as_f64() == expected.as_f64(),
        _ => actual == expected,
    }
}

/// Asserts equality, or subset containment when `subset` is set.
pub fn ensure_matches(actual: &Value, expected: &Value, subset: bool) -> Result<()> {
    if subset {
        ensure!(
            contains_subset(actual, expected),
            "expected {actual} to contain {expected}"
        );
    } else {
        ensure!(values_equal(actual, expected), "expected {expected}, got {actual}");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn subset_matching_ignores_extra_fields_and_items() {
        let actual = json!({"id": 1, "tags": ["a", "b"], "owner": {"name": "ada", "age": 36}});
        assert!(contains_subset(&actual, &json!({"owner": {"name": "ada"}})));
        assert!(contains_subset(&actual, &json!({"tags": ["b"]})));
        assert!(!contains_subset(&actual, &json!({"owner": {"name": "bob"}})));
        assert!(!contains_subset(&actual, &json!({"missing": true})));
    }

    #[test]
    fn numbers_compare_by_value_in_subsets() {
        assert!(contains_subset(&json!({"n": 1.0}), &json!({"n": 1})));
    }

    #[test]
    fn require_reports_the_expression() {
        let document = json!({"a": null});
        let error = require(&document, "a").expect_err("null is absent");
        assert!(error.to_string().contains("\"a\" did not match"));
        assert_eq!(require(&json!({"a": [1]}), "a[0]").expect("present"), &json!(1));
    }

    #[test]
    fn ensure_matches_distinguishes_equal_and_match() {
        let actual = json!({"a": 1, "b": 2});
        assert!(ensure_matches(&actual, &json!({"a": 1}), true).is_ok());
        assert!(ensure_matches(&actual, &json!({"a": 1}), false).is_err());
        assert!(ensure_matches(&actual, &json!({"b": 2, "a": 1}), false).is_ok());
    }

    #[test]
    fn equality_compares_numbers_by_value() {
        assert!(ensure_matches(&json!({"n": 2.0, "items": [1, 2.5]}), &json!({"n": 2, "items": [1.0, 2.5]}), false).is_ok());
        assert!(ensure_matches(&json!(2.0), &json!(2), false).is_ok());
        assert!(ensure_matches(&json!([1, 2]), &json!([2, 1]), false).is_err());
        assert!(ensure_matches(&json!({"n": 2}), &json!({"n": 2, "m": 3}), false).is_err());
    }
}
