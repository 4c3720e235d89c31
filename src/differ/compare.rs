//! Leaf-level comparison of two versions of a resource
//!
//! Mapping keys are compared as sets, so key order never matters. Sequences
//! compare positionally; sequences of different lengths yield a single
//! change at the sequence path. A missing field and an explicit `null`
//! compare equal.

use serde_json::Value;
use std::collections::BTreeSet;

use crate::models::value::{child_path, index_path, values_equal};
use crate::models::Resource;

/// An unclassified leaf difference
#[derive(Debug, Clone, PartialEq)]
pub struct RawChange {
    pub path: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
}

/// Every leaf difference between `old` and `new`, ordered by path
pub fn compare_resources(old: &Resource, new: &Resource) -> Vec<RawChange> {
    let mut changes = Vec::new();

    if old.name != new.name {
        changes.push(RawChange {
            path: "name".to_string(),
            old_value: Some(Value::String(old.name.clone())),
            new_value: Some(Value::String(new.name.clone())),
        });
    }
    compare_optional_text("region", old.region.as_deref(), new.region.as_deref(), &mut changes);
    compare_optional_text("namespace", old.namespace.as_deref(), new.namespace.as_deref(), &mut changes);

    let tag_keys: BTreeSet<&String> = old.tags.keys().chain(new.tags.keys()).collect();
    for key in tag_keys {
        let before = old.tags.get(key);
        let after = new.tags.get(key);
        if before != after {
            changes.push(RawChange {
                path: child_path("tags", key),
                old_value: before.map(|v| Value::String(v.clone())),
                new_value: after.map(|v| Value::String(v.clone())),
            });
        }
    }

    let config_keys: BTreeSet<&String> = old
        .configuration
        .keys()
        .chain(new.configuration.keys())
        .collect();
    for key in config_keys {
        compare_values(
            key,
            old.configuration.get(key),
            new.configuration.get(key),
            &mut changes,
        );
    }

    changes.sort_by(|a, b| a.path.cmp(&b.path));
    changes
}

/// Whether two resources carry identical configuration
pub fn same_configuration(old: &Resource, new: &Resource) -> bool {
    let keys: BTreeSet<&String> = old
        .configuration
        .keys()
        .chain(new.configuration.keys())
        .collect();
    keys.into_iter().all(|key| {
        let mut scratch = Vec::new();
        compare_values(key, old.configuration.get(key), new.configuration.get(key), &mut scratch);
        scratch.is_empty()
    })
}

fn compare_optional_text(path: &str, old: Option<&str>, new: Option<&str>, out: &mut Vec<RawChange>) {
    if old != new {
        out.push(RawChange {
            path: path.to_string(),
            old_value: old.map(|s| Value::String(s.to_string())),
            new_value: new.map(|s| Value::String(s.to_string())),
        });
    }
}

/// Recursive structural comparison at `path`
pub fn compare_values(path: &str, old: Option<&Value>, new: Option<&Value>, out: &mut Vec<RawChange>) {
    let old_present = old.filter(|v| !v.is_null());
    let new_present = new.filter(|v| !v.is_null());

    match (old_present, new_present) {
        (None, None) => {}
        (Some(Value::Object(a)), Some(Value::Object(b))) => {
            let keys: BTreeSet<&String> = a.keys().chain(b.keys()).collect();
            for key in keys {
                compare_values(&child_path(path, key), a.get(key), b.get(key), out);
            }
        }
        (Some(Value::Array(a)), Some(Value::Array(b))) if a.len() == b.len() => {
            for (i, (x, y)) in a.iter().zip(b).enumerate() {
                compare_values(&index_path(path, i), Some(x), Some(y), out);
            }
        }
        (Some(a), Some(b)) if values_equal(a, b) => {}
        (a, b) => out.push(RawChange {
            path: path.to_string(),
            old_value: a.cloned(),
            new_value: b.cloned(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn vm() -> Resource {
        Resource::new("i-1", "instance", "web", "aws")
    }

    fn paths(changes: &[RawChange]) -> Vec<&str> {
        changes.iter().map(|c| c.path.as_str()).collect()
    }

    #[test]
    fn test_identical_resources_have_no_changes() {
        let a = vm().with_config("instance_type", json!("t3.micro")).with_tag("env", "dev");
        assert!(compare_resources(&a, &a.clone()).is_empty());
    }

    #[test]
    fn test_integer_and_float_compare_equal() {
        let a = vm().with_config("count", json!(2));
        let b = vm().with_config("count", json!(2.0));
        assert!(compare_resources(&a, &b).is_empty());
    }

    #[test]
    fn test_nested_paths_and_key_order() {
        let a = vm().with_config("network", json!({"vpc": "a", "subnet": "s1"}));
        let b = vm().with_config("network", json!({"subnet": "s2", "vpc": "a"}));
        let changes = compare_resources(&a, &b);
        assert_eq!(paths(&changes), vec!["network.subnet"]);
        assert_eq!(changes[0].old_value, Some(json!("s1")));
    }

    #[test]
    fn test_sequences_compare_positionally() {
        let a = vm().with_config("rules", json!(["a", "b"]));
        let reordered = vm().with_config("rules", json!(["b", "a"]));
        assert_eq!(paths(&compare_resources(&a, &reordered)), vec!["rules[0]", "rules[1]"]);

        let longer = vm().with_config("rules", json!(["a", "b", "c"]));
        let changes = compare_resources(&a, &longer);
        assert_eq!(paths(&changes), vec!["rules"]);
        assert_eq!(changes[0].new_value, Some(json!(["a", "b", "c"])));
    }

    #[test]
    fn test_tags_name_region_and_missing_fields() {
        let a = vm().with_tag("env", "dev").with_config("gone", json!(1));
        let b = Resource::new("i-1", "instance", "web-2", "aws")
            .with_region("us-east-1")
            .with_tag("env", "prod")
            .with_tag("owner", "ops");
        let changes = compare_resources(&a, &b);
        assert_eq!(paths(&changes), vec!["gone", "name", "region", "tags.env", "tags.owner"]);

        let gone = &changes[0];
        assert_eq!(gone.old_value, Some(json!(1)));
        assert_eq!(gone.new_value, None);
    }

    #[test]
    fn test_null_and_missing_compare_equal() {
        let a = vm().with_config("optional", Value::Null);
        assert!(compare_resources(&a, &vm()).is_empty());
        assert!(same_configuration(&a, &vm()));
    }
}
