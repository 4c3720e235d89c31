//! Drift differ
//!
//! Compares a baseline snapshot with a current snapshot and produces a
//! [`DriftReport`]:
//! - resources are matched on `(type, id)`
//! - matched pairs are compared leaf by leaf (see [`compare`])
//! - every change is classified by severity, category and risk (see [`classify`])
//! - removed/added pairs can optionally be folded into moves (see [`matcher`])
//!
//! Output is deterministic: diffs are sorted by severity (most severe
//! first), then type, then id; field changes are sorted by path.

pub mod classify;
pub mod compare;
pub mod matcher;

use chrono::Utc;
use glob::Pattern;
use log::{debug, Level};
use serde_json::json;
use std::collections::{BTreeMap, BTreeSet};

use crate::error::{Error, Result};
use crate::logging::{event, log_structured};
use crate::models::{
    Category, ChangeType, DriftReport, DriftSummary, FieldChange, Resource, ResourceDiff,
    Severity, Snapshot,
};
use classify::Classifier;
use compare::{compare_resources, RawChange};

/// Knobs for a comparison
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DiffOptions {
    /// Field paths to ignore; exact paths or glob patterns (`tags.*`)
    pub ignore_fields: Vec<String>,
    /// Fold removed/added pairs that look like one resource into `moved` diffs
    pub detect_moves: bool,
}

/// Check if a filter string contains glob pattern characters
fn is_glob_pattern(filter: &str) -> bool {
    filter.contains('*') || filter.contains('?') || filter.contains('[')
}

/// Compiled ignore-field filter. A pattern ignores a path when it matches
/// the path itself or any of its dotted ancestors.
#[derive(Debug, Clone, Default)]
struct FieldFilter {
    exact: Vec<String>,
    globs: Vec<Pattern>,
}

impl FieldFilter {
    fn new(filters: &[String]) -> Result<Self> {
        let mut filter = FieldFilter::default();
        for raw in filters {
            if is_glob_pattern(raw) {
                let pattern = Pattern::new(raw).map_err(|e| {
                    Error::validation(format!("invalid ignore pattern '{}': {}", raw, e))
                })?;
                filter.globs.push(pattern);
            } else {
                filter.exact.push(raw.clone());
            }
        }
        Ok(filter)
    }

    fn is_empty(&self) -> bool {
        self.exact.is_empty() && self.globs.is_empty()
    }

    fn ignores(&self, path: &str) -> bool {
        path_and_ancestors(path).any(|candidate| {
            self.exact.iter().any(|e| e == candidate)
                || self.globs.iter().any(|g| g.matches(candidate))
        })
    }
}

/// `a.b[0].c` yields `a.b[0].c`, `a.b[0]`, `a.b`, `a`
fn path_and_ancestors(path: &str) -> impl Iterator<Item = &str> {
    let cuts = path
        .char_indices()
        .filter(|(_, c)| *c == '.' || *c == '[')
        .map(|(i, _)| i)
        .collect::<Vec<_>>();
    std::iter::once(path).chain(cuts.into_iter().rev().map(move |i| &path[..i]))
}

/// Snapshot comparer
#[derive(Debug, Clone)]
pub struct Differ {
    options: DiffOptions,
    filter: FieldFilter,
    classifier: Classifier,
}

impl Differ {
    pub fn new(options: DiffOptions) -> Result<Self> {
        Ok(Self {
            filter: FieldFilter::new(&options.ignore_fields)?,
            classifier: Classifier::new()?,
            options,
        })
    }

    pub fn options(&self) -> &DiffOptions {
        &self.options
    }

    /// Produce the drift report of `current` against `baseline`.
    ///
    /// Fails only when either snapshot is invalid.
    pub fn compare(&self, baseline: &Snapshot, current: &Snapshot) -> Result<DriftReport> {
        baseline.validate()?;
        current.validate()?;

        let before: BTreeMap<(String, String), &Resource> =
            baseline.resources.iter().map(|r| (r.key(), r)).collect();
        let after: BTreeMap<(String, String), &Resource> =
            current.resources.iter().map(|r| (r.key(), r)).collect();
        let keys: BTreeSet<&(String, String)> = before.keys().chain(after.keys()).collect();
        let total_resources = keys.len();

        let mut diffs = Vec::new();
        let mut added = Vec::new();
        let mut removed = Vec::new();
        for key in keys {
            match (before.get(key), after.get(key)) {
                (Some(old), Some(new)) => {
                    if let Some(diff) = self.modified_diff(old, new) {
                        diffs.push(diff);
                    }
                }
                (None, Some(new)) => added.push(*new),
                (Some(old), None) => removed.push(*old),
                (None, None) => {}
            }
        }

        if self.options.detect_moves {
            let pairs = matcher::match_moves(&removed, &added);
            let mut moved_removed = vec![false; removed.len()];
            let mut moved_added = vec![false; added.len()];
            for (ri, ai) in pairs {
                moved_removed[ri] = true;
                moved_added[ai] = true;
                diffs.push(self.moved_diff(removed[ri], added[ai]));
            }
            removed = keep_unflagged(removed, &moved_removed);
            added = keep_unflagged(added, &moved_added);
        }

        diffs.extend(added.into_iter().map(|r| self.added_diff(r)));
        diffs.extend(removed.into_iter().map(|r| self.removed_diff(r)));
        sort_diffs(&mut diffs);

        let summary = DriftSummary::from_diffs(total_resources, &diffs);
        let report = DriftReport {
            id: report_id(),
            baseline_id: baseline.id.clone(),
            current_id: current.id.clone(),
            timestamp: Utc::now(),
            summary,
            resource_changes: diffs,
        };

        log_structured(
            Level::Info,
            &format!(
                "Compared {} against {}: {} changed resources",
                current.id, baseline.id, report.summary.changed_resources
            ),
            &event(
                "drift_computed",
                json!({
                    "report_id": report.id,
                    "baseline_id": report.baseline_id,
                    "current_id": report.current_id,
                    "changed": report.summary.changed_resources,
                    "overall_risk": report.summary.overall_risk,
                }),
            ),
        );
        Ok(report)
    }

    fn classify(&self, resource_type: &str, raw: RawChange) -> (FieldChange, f64) {
        let class = self
            .classifier
            .classify_field(&raw.path, resource_type, raw.new_value.as_ref());
        let change = FieldChange {
            path: raw.path,
            old_value: raw.old_value,
            new_value: raw.new_value,
            severity: class.severity,
            category: class.category,
        };
        (change, class.weight)
    }

    fn modified_diff(&self, old: &Resource, new: &Resource) -> Option<ResourceDiff> {
        let raw: Vec<RawChange> = compare_resources(old, new)
            .into_iter()
            .filter(|c| self.filter.is_empty() || !self.filter.ignores(&c.path))
            .collect();
        if raw.is_empty() {
            return None;
        }

        let classified: Vec<(FieldChange, f64)> = raw
            .into_iter()
            .map(|c| self.classify(&new.resource_type, c))
            .collect();
        let description = format!(
            "{} field(s) changed: {}",
            classified.len(),
            classified
                .iter()
                .map(|(c, _)| c.path.as_str())
                .collect::<Vec<_>>()
                .join(", ")
        );
        debug!("{} {}: {}", new.resource_type, new.id, description);
        Some(self.field_diff(new, ChangeType::Modified, description, classified))
    }

    fn moved_diff(&self, old: &Resource, new: &Resource) -> ResourceDiff {
        let moved_fields = ["name", "region", "namespace"];
        let classified: Vec<(FieldChange, f64)> = compare_resources(old, new)
            .into_iter()
            .filter(|c| moved_fields.contains(&c.path.as_str()))
            .map(|c| self.classify(&new.resource_type, c))
            .collect();
        let description = format!("Resource moved: {} -> {}", old.id, new.id);
        self.field_diff(new, ChangeType::Moved, description, classified)
    }

    /// Build a diff whose severity and category come from its field changes.
    /// The representative change is the most severe; ties go to the higher
    /// per-field risk, then to the earlier path.
    fn field_diff(
        &self,
        resource: &Resource,
        kind: ChangeType,
        description: String,
        classified: Vec<(FieldChange, f64)>,
    ) -> ResourceDiff {
        let representative = classified.iter().fold(None::<&(FieldChange, f64)>, |best, item| {
            match best {
                Some(b) if (b.0.severity, b.1) >= (item.0.severity, item.1) => Some(b),
                _ => Some(item),
            }
        });
        let (severity, category) = representative
            .map(|(c, _)| (c.severity, c.category))
            .unwrap_or((Severity::Low, Category::Config));
        let categories: BTreeSet<Category> = classified.iter().map(|(c, _)| c.category).collect();

        let mut changes: Vec<FieldChange> = classified.into_iter().map(|(c, _)| c).collect();
        changes.sort_by(|a, b| a.path.cmp(&b.path));

        ResourceDiff {
            resource_id: resource.id.clone(),
            resource_type: resource.resource_type.clone(),
            drift_type: kind,
            severity,
            category,
            risk_score: self.classifier.risk_score(
                severity,
                categories.len().max(1),
                kind,
                &resource.resource_type,
            ),
            description,
            changes,
        }
    }

    fn added_diff(&self, resource: &Resource) -> ResourceDiff {
        let severity = self.classifier.added_severity(resource);
        self.whole_resource_diff(
            resource,
            ChangeType::Added,
            severity,
            format!("Resource added: {} {}", resource.resource_type, resource.id),
        )
    }

    fn removed_diff(&self, resource: &Resource) -> ResourceDiff {
        let severity = self.classifier.removed_severity(resource);
        self.whole_resource_diff(
            resource,
            ChangeType::Removed,
            severity,
            format!("Resource removed: {} {}", resource.resource_type, resource.id),
        )
    }

    fn whole_resource_diff(
        &self,
        resource: &Resource,
        kind: ChangeType,
        severity: Severity,
        description: String,
    ) -> ResourceDiff {
        ResourceDiff {
            resource_id: resource.id.clone(),
            resource_type: resource.resource_type.clone(),
            drift_type: kind,
            severity,
            category: self.classifier.type_category(&resource.resource_type),
            risk_score: self
                .classifier
                .risk_score(severity, 1, kind, &resource.resource_type),
            description,
            changes: Vec::new(),
        }
    }
}

/// Compare with default options
pub fn compare(baseline: &Snapshot, current: &Snapshot) -> Result<DriftReport> {
    Differ::new(DiffOptions::default())?.compare(baseline, current)
}

fn keep_unflagged<'a>(resources: Vec<&'a Resource>, flags: &[bool]) -> Vec<&'a Resource> {
    resources
        .into_iter()
        .zip(flags)
        .filter(|(_, flagged)| !**flagged)
        .map(|(r, _)| r)
        .collect()
}

/// Severity descending, then type, then id
pub fn sort_diffs(diffs: &mut [ResourceDiff]) {
    diffs.sort_by(|a, b| {
        b.severity
            .cmp(&a.severity)
            .then_with(|| a.resource_type.cmp(&b.resource_type))
            .then_with(|| a.resource_id.cmp(&b.resource_id))
    });
}

/// `drift-<unix seconds>-<8 hex>`
fn report_id() -> String {
    let suffix = uuid::Uuid::new_v4().simple().to_string();
    format!("drift-{}-{}", Utc::now().timestamp(), &suffix[..8])
}
