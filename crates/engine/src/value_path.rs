//! Minimal JSON path selection used by interpolation and step assertions.
//!
//! Paths are dot separated with optional numeric indices: `a`, `a.b`,
//! `items[0].id`. A leading `$` (or a path consisting solely of `$`) refers
//! to the root value.

use serde_json::Value;

/// Select a nested value by path. Returns `None` when any segment is missing
/// or applied to the wrong JSON type.
pub fn select_path<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let trimmed = path.trim();
    let trimmed = trimmed.strip_prefix('$').unwrap_or(trimmed);
    let trimmed = trimmed.strip_prefix('.').unwrap_or(trimmed);

    let mut current = value;
    for segment in trimmed.split('.') {
        if segment.is_empty() {
            continue;
        }
        let (key, indices) = split_indices(segment)?;
        if !key.is_empty() {
            current = current.get(key)?;
        }
        for index in indices {
            current = current.get(index)?;
        }
    }
    Some(current)
}

/// Splits `items[0][1]` into `("items", [0, 1])`. Malformed brackets yield `None`.
fn split_indices(segment: &str) -> Option<(&str, Vec<usize>)> {
    let Some(bracket) = segment.find('[') else {
        return Some((segment, Vec::new()));
    };
    let key = &segment[..bracket];
    let mut indices = Vec::new();
    let mut rest = &segment[bracket..];
    while !rest.is_empty() {
        let inner = rest.strip_prefix('[')?;
        let close = inner.find(']')?;
        indices.push(inner[..close].trim().parse::<usize>().ok()?);
        rest = &inner[close + 1..];
    }
    Some((key, indices))
}

/// Renders a value for substitution into step text: strings verbatim,
/// everything else as compact JSON.
pub fn render_value(value: &Value) -> String {
    match value {
        Value::String(text) => text.clone(),
        other => other.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn selects_nested_fields_and_indices() {
        let value = json!({"user": {"orders": [{"id": 7}, {"id": 9}]}});
        assert_eq!(select_path(&value, "user.orders[1].id"), Some(&json!(9)));
        assert_eq!(select_path(&value, "$.user.orders[0]"), Some(&json!({"id": 7})));
        assert_eq!(select_path(&value, "$"), Some(&value));
    }

    #[test]
    fn missing_segments_return_none() {
        let value = json!({"a": [1, 2]});
        assert_eq!(select_path(&value, "a[5]"), None);
        assert_eq!(select_path(&value, "b"), None);
        assert_eq!(select_path(&value, "a[x]"), None);
    }

    #[test]
    fn renders_strings_without_quotes() {
        assert_eq!(render_value(&json!("plain")), "plain");
        assert_eq!(render_value(&json!({"a": 1})), r#"{"a":1}"#);
        assert_eq!(render_value(&json!(3)), "3");
    }
}
