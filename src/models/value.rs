//! Helpers over resource configuration values
//!
//! Configuration blobs are recursive JSON values. These helpers give them
//! structural equality with integer/float canonicalisation, dotted-path
//! lookup and a compact single-line rendering for text formats.

use serde_json::Value;

/// Structural equality where `1` and `1.0` compare equal
pub fn values_equal(a: &Value, b: &Value) -> bool {
    match (a, b) {
        (Value::Number(x), Value::Number(y)) => numbers_equal(x, y),
        (Value::Array(xs), Value::Array(ys)) => {
            xs.len() == ys.len() && xs.iter().zip(ys).all(|(x, y)| values_equal(x, y))
        }
        (Value::Object(xm), Value::Object(ym)) => {
            xm.len() == ym.len()
                && xm
                    .iter()
                    .all(|(k, xv)| ym.get(k).map_or(false, |yv| values_equal(xv, yv)))
        }
        _ => a == b,
    }
}

fn numbers_equal(x: &serde_json::Number, y: &serde_json::Number) -> bool {
    if let (Some(a), Some(b)) = (x.as_i64(), y.as_i64()) {
        return a == b;
    }
    if let (Some(a), Some(b)) = (x.as_u64(), y.as_u64()) {
        return a == b;
    }
    match (x.as_f64(), y.as_f64()) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

/// Join a parent path and a mapping key with a dot
pub fn child_path(parent: &str, key: &str) -> String {
    if parent.is_empty() {
        key.to_string()
    } else {
        format!("{}.{}", parent, key)
    }
}

/// Append a sequence index to a path
pub fn index_path(parent: &str, index: usize) -> String {
    format!("{}[{}]", parent, index)
}

/// Resolve a dotted path such as `network.interfaces[0].subnet`
pub fn lookup_path<'a>(root: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = root;
    for segment in path.split('.') {
        if segment.is_empty() {
            return None;
        }
        let (key, indices) = split_indices(segment)?;
        if !key.is_empty() {
            current = current.as_object()?.get(key)?;
        }
        for index in indices {
            current = current.as_array()?.get(index)?;
        }
    }
    Some(current)
}

fn split_indices(segment: &str) -> Option<(&str, Vec<usize>)> {
    let Some(open) = segment.find('[') else {
        return Some((segment, Vec::new()));
    };
    let key = &segment[..open];
    let mut indices = Vec::new();
    let mut rest = &segment[open..];
    while let Some(stripped) = rest.strip_prefix('[') {
        let close = stripped.find(']')?;
        indices.push(stripped[..close].parse().ok()?);
        rest = &stripped[close + 1..];
    }
    if rest.is_empty() {
        Some((key, indices))
    } else {
        None
    }
}

/// Render a value on one line: strings unquoted, everything else as JSON
pub fn display_value(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => "null".to_string(),
        other => other.to_string(),
    }
}

/// Render an optional value, using `-` for absent
pub fn display_optional(value: Option<&Value>) -> String {
    value.map(display_value).unwrap_or_else(|| "-".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_integer_and_float_are_equal() {
        assert!(values_equal(&json!(1), &json!(1.0)));
        assert!(values_equal(&json!({"a": [1, 2.0]}), &json!({"a": [1.0, 2]})));
        assert!(!values_equal(&json!(1), &json!(1.5)));
        assert!(!values_equal(&json!(1), &json!("1")));
    }

    #[test]
    fn test_object_key_order_is_irrelevant() {
        let a: Value = serde_json::from_str(r#"{"x": 1, "y": 2}"#).unwrap();
        let b: Value = serde_json::from_str(r#"{"y": 2, "x": 1}"#).unwrap();
        assert!(values_equal(&a, &b));
    }

    #[test]
    fn test_sequences_compare_positionally() {
        assert!(!values_equal(&json!(["a", "b"]), &json!(["b", "a"])));
    }

    #[test]
    fn test_lookup_path() {
        let root = json!({
            "network": {"interfaces": [{"subnet": "s-1"}, {"subnet": "s-2"}]},
            "matrix": [[1, 2], [3, 4]]
        });
        assert_eq!(lookup_path(&root, "network.interfaces[1].subnet"), Some(&json!("s-2")));
        assert_eq!(lookup_path(&root, "matrix[1][0]"), Some(&json!(3)));
        assert_eq!(lookup_path(&root, "network.missing"), None);
        assert_eq!(lookup_path(&root, "network..interfaces"), None);
        assert_eq!(lookup_path(&root, "matrix[x]"), None);
    }

    #[test]
    fn test_display_value() {
        assert_eq!(display_value(&json!("t3.micro")), "t3.micro");
        assert_eq!(display_value(&json!(3)), "3");
        assert_eq!(display_value(&json!(["a"])), "[\"a\"]");
        assert_eq!(display_optional(None), "-");
    }
}
