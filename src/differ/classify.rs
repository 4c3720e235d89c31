//! Severity, category and risk classification of changes
//!
//! Categories come from two regex tables, one over field paths and one over
//! resource types. Severity comes from an ordered substring rule table over
//! the lower-cased field path, falling back to the category.

use regex::Regex;
use serde_json::Value;

use crate::error::{Error, Result};
use crate::models::{Category, ChangeType, Resource, Severity};

const FIELD_CATEGORIES: &[(&str, Category)] = &[
    (r"security_group|iam|policy|public|acl", Category::Security),
    (r"instance_type|size|count|storage_size", Category::Cost),
    (r"subnet|vpc|network|cidr|load_balancer", Category::Network),
    (r"storage|volume|disk|bucket|snapshot|backup|encrypt", Category::Storage),
    (r"cpu|memory|replicas|image|ami|runtime|kernel", Category::Compute),
];

const TYPE_CATEGORIES: &[(&str, Category)] = &[
    (r"security_group|firewall|iam|role|policy|acl|kms|secret", Category::Security),
    (r"vpc|subnet|network|route|gateway|load_balancer|dns|lb", Category::Network),
    (r"bucket|volume|disk|storage|s3|database|db|rds|sql", Category::Storage),
    (r"instance|vm|function|lambda|container|pod|deployment|cluster|node", Category::Compute),
];

/// First substring match wins
const SEVERITY_RULES: &[(&str, Severity)] = &[
    ("iam_role", Severity::Critical),
    ("security_groups", Severity::Critical),
    ("vpc_security_group", Severity::High),
    ("network_acl", Severity::High),
    ("subnet_id", Severity::High),
    ("vpc_id", Severity::High),
    ("instance_type", Severity::High),
    ("load_balancer", Severity::Medium),
    ("storage_size", Severity::Medium),
    ("storage_type", Severity::Medium),
    ("volume_size", Severity::Medium),
    ("instance_count", Severity::Medium),
    ("cpu", Severity::Medium),
    ("memory", Severity::Medium),
    ("replicas", Severity::Medium),
    ("tags", Severity::Low),
    ("name", Severity::Low),
    ("description", Severity::Low),
];

/// Fields that describe a resource rather than configure it
const DESCRIPTIVE_FIELDS: &[&str] = &["name", "description"];

const OPEN_CIDRS: &[&str] = &["0.0.0.0/0", "::/0"];

const INSTANCE_OR_DATABASE: &[&str] = &["instance", "vm", "database", "db", "rds", "sql"];

const BREADTH_ADJUSTMENT: f64 = 0.05;
const REMOVED_CRITICAL_ADJUSTMENT: f64 = 0.1;

/// Classification of one field change
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldClass {
    pub severity: Severity,
    pub category: Category,
    /// Per-field risk, used to pick the representative change on severity ties
    pub weight: f64,
}

/// Compiled classification tables
#[derive(Debug, Clone)]
pub struct Classifier {
    field_rules: Vec<(Regex, Category)>,
    type_rules: Vec<(Regex, Category)>,
}

impl Classifier {
    pub fn new() -> Result<Self> {
        Ok(Self {
            field_rules: compile(FIELD_CATEGORIES)?,
            type_rules: compile(TYPE_CATEGORIES)?,
        })
    }

    /// Category implied by a field path alone
    pub fn field_category(&self, path: &str) -> Category {
        first_match(&self.field_rules, &path.to_ascii_lowercase())
    }

    /// Category implied by a resource type alone
    pub fn type_category(&self, resource_type: &str) -> Category {
        first_match(&self.type_rules, &resource_type.to_ascii_lowercase())
    }

    /// Category of a change to `path` on a resource of `resource_type`.
    /// Unclassified configuration fields inherit the resource type's category;
    /// tags and descriptive fields stay `config`.
    pub fn change_category(&self, path: &str, resource_type: &str) -> Category {
        if is_descriptive(path) {
            return Category::Config;
        }
        match self.field_category(path) {
            Category::Config => self.type_category(resource_type),
            category => category,
        }
    }

    /// Classify a modification of `path` whose new value is `new_value`
    pub fn classify_field(&self, path: &str, resource_type: &str, new_value: Option<&Value>) -> FieldClass {
        let category = self.change_category(path, resource_type);
        let lower = path.to_ascii_lowercase();

        let mut severity = if is_descriptive(path) {
            Severity::Low
        } else {
            SEVERITY_RULES
                .iter()
                .find(|(needle, _)| lower.contains(needle))
                .map(|(_, severity)| *severity)
                .unwrap_or_else(|| category_severity(category))
        };

        let security_context = category == Category::Security
            || self.type_category(resource_type) == Category::Security;
        if security_context && new_value.map_or(false, opens_to_world) {
            severity = Severity::Critical;
        }

        let breadth = if category == Category::Config { 0.0 } else { BREADTH_ADJUSTMENT };
        FieldClass {
            severity,
            category,
            weight: clamp_unit(severity.base_risk() + breadth),
        }
    }

    /// Severity of a resource that appeared in the current snapshot
    pub fn added_severity(&self, resource: &Resource) -> Severity {
        let category = self.type_category(&resource.resource_type);
        if category == Category::Security && config_opens_to_world(resource) {
            return Severity::Critical;
        }
        if is_instance_or_database(&resource.resource_type) {
            return Severity::High;
        }
        match category {
            Category::Security => Severity::Medium,
            Category::Config if resource.tags.is_empty() => Severity::Low,
            _ => Severity::Medium,
        }
    }

    /// Severity of a resource that disappeared from the current snapshot
    pub fn removed_severity(&self, resource: &Resource) -> Severity {
        if resource.is_production() {
            return Severity::Critical;
        }
        if is_instance_or_database(&resource.resource_type)
            || self.type_category(&resource.resource_type) == Category::Security
        {
            return Severity::High;
        }
        Severity::Medium
    }

    /// Whether losing a resource of this type is high impact
    pub fn is_critical_type(&self, resource_type: &str) -> bool {
        is_instance_or_database(resource_type)
            || self.type_category(resource_type) == Category::Security
    }

    /// `clamp(base[severity] + adjustments, 0, 1)`
    pub fn risk_score(
        &self,
        severity: Severity,
        distinct_categories: usize,
        kind: ChangeType,
        resource_type: &str,
    ) -> f64 {
        let mut score = severity.base_risk();
        score += BREADTH_ADJUSTMENT * distinct_categories.saturating_sub(1) as f64;
        if kind == ChangeType::Removed && self.is_critical_type(resource_type) {
            score += REMOVED_CRITICAL_ADJUSTMENT;
        }
        clamp_unit(score)
    }
}

fn compile(table: &[(&str, Category)]) -> Result<Vec<(Regex, Category)>> {
    table
        .iter()
        .map(|(pattern, category)| {
            Regex::new(pattern)
                .map(|re| (re, *category))
                .map_err(|e| Error::Internal(format!("invalid classifier pattern {}: {}", pattern, e)))
        })
        .collect()
}

fn first_match(rules: &[(Regex, Category)], haystack: &str) -> Category {
    rules
        .iter()
        .find(|(re, _)| re.is_match(haystack))
        .map(|(_, category)| *category)
        .unwrap_or(Category::Config)
}

fn is_descriptive(path: &str) -> bool {
    path.starts_with("tags.") || path == "tags" || DESCRIPTIVE_FIELDS.contains(&path)
}

fn category_severity(category: Category) -> Severity {
    match category {
        Category::Security => Severity::High,
        Category::Config => Severity::Low,
        _ => Severity::Medium,
    }
}

fn is_instance_or_database(resource_type: &str) -> bool {
    let lower = resource_type.to_ascii_lowercase();
    INSTANCE_OR_DATABASE.iter().any(|needle| lower.contains(needle))
}

/// Whether any string inside `value` grants access from anywhere
pub fn opens_to_world(value: &Value) -> bool {
    match value {
        Value::String(s) => OPEN_CIDRS.iter().any(|cidr| s.contains(cidr)),
        Value::Array(items) => items.iter().any(opens_to_world),
        Value::Object(map) => map.values().any(opens_to_world),
        _ => false,
    }
}

fn config_opens_to_world(resource: &Resource) -> bool {
    resource.configuration.values().any(opens_to_world)
}

fn clamp_unit(value: f64) -> f64 {
    value.clamp(0.0, 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn classifier() -> Classifier {
        Classifier::new().unwrap()
    }

    #[test]
    fn test_field_categories() {
        let c = classifier();
        assert_eq!(c.field_category("security_groups[0]"), Category::Security);
        assert_eq!(c.field_category("instance_type"), Category::Cost);
        assert_eq!(c.field_category("network.subnet_id"), Category::Network);
        assert_eq!(c.field_category("root_volume.encrypted"), Category::Storage);
        assert_eq!(c.field_category("image"), Category::Compute);
        assert_eq!(c.field_category("monitoring"), Category::Config);
    }

    #[test]
    fn test_unclassified_field_inherits_type_category() {
        let c = classifier();
        assert_eq!(c.change_category("ingress", "security_group"), Category::Security);
        assert_eq!(c.change_category("tags.env", "security_group"), Category::Config);
        assert_eq!(c.change_category("monitoring", "widget"), Category::Config);
    }

    #[test]
    fn test_severity_rules_first_match_wins() {
        let c = classifier();
        assert_eq!(c.classify_field("iam_role", "instance", None).severity, Severity::Critical);
        assert_eq!(c.classify_field("vpc_security_group_ids", "instance", None).severity, Severity::High);
        assert_eq!(c.classify_field("instance_type", "instance", None).severity, Severity::High);
        assert_eq!(c.classify_field("replicas", "deployment", None).severity, Severity::Medium);
        assert_eq!(c.classify_field("tags.instance_type", "instance", None).severity, Severity::Low);
        assert_eq!(c.classify_field("description", "instance", None).severity, Severity::Low);
    }

    #[test]
    fn test_category_fallback_severity() {
        let c = classifier();
        assert_eq!(c.classify_field("public_access", "bucket", None).severity, Severity::High);
        assert_eq!(c.classify_field("monitoring", "widget", None).severity, Severity::Low);
        assert_eq!(c.classify_field("monitoring", "instance", None).severity, Severity::Medium);
    }

    #[test]
    fn test_open_cidr_on_security_resource_is_critical() {
        let c = classifier();
        let rules = json!(["10.0.0.0/8:443", "0.0.0.0/0:22"]);
        let class = c.classify_field("ingress", "security_group", Some(&rules));
        assert_eq!(class.severity, Severity::Critical);
        assert_eq!(class.category, Category::Security);

        // Same value on a non-security field of a non-security type stays normal
        let class = c.classify_field("notes", "widget", Some(&rules));
        assert_eq!(class.severity, Severity::Low);
    }

    #[test]
    fn test_added_and_removed_severity() {
        let c = classifier();
        let vm = Resource::new("i-1", "instance", "web", "aws");
        assert_eq!(c.added_severity(&vm), Severity::High);

        let sg = Resource::new("sg-1", "security_group", "web", "aws");
        assert_eq!(c.added_severity(&sg), Severity::Medium);
        assert_eq!(c.removed_severity(&sg), Severity::High);

        let open = sg.clone().with_config("ingress", json!(["0.0.0.0/0:22"]));
        assert_eq!(c.added_severity(&open), Severity::Critical);

        let widget = Resource::new("w-1", "widget", "w", "custom");
        assert_eq!(c.added_severity(&widget), Severity::Low);
        assert_eq!(c.added_severity(&widget.clone().with_tag("team", "a")), Severity::Medium);

        let prod = Resource::new("b-1", "bucket", "logs", "aws").with_tag("env", "production");
        assert_eq!(c.removed_severity(&prod), Severity::Critical);
    }

    #[test]
    fn test_risk_score_adjustments() {
        let c = classifier();
        let base = c.risk_score(Severity::Medium, 1, ChangeType::Modified, "widget");
        assert!((base - 0.5).abs() < 1e-9);
        let broad = c.risk_score(Severity::Medium, 3, ChangeType::Modified, "widget");
        assert!((broad - 0.6).abs() < 1e-9);
        let removed = c.risk_score(Severity::Critical, 1, ChangeType::Removed, "instance");
        assert_eq!(removed, 1.0);
    }
}
