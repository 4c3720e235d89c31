use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use super::timestamp;
use crate::error::Error;

/// Four-level severity, ordered from least to most severe
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Low,
    Medium,
    High,
    Critical,
}

impl Severity {
    /// All levels, most severe first
    pub const DESCENDING: [Severity; 4] = [
        Severity::Critical,
        Severity::High,
        Severity::Medium,
        Severity::Low,
    ];

    /// Base risk score for the level
    pub fn base_risk(self) -> f64 {
        match self {
            Severity::Low => 0.2,
            Severity::Medium => 0.5,
            Severity::High => 0.7,
            Severity::Critical => 0.95,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Severity::Low => "low",
            Severity::Medium => "medium",
            Severity::High => "high",
            Severity::Critical => "critical",
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Severity {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(Severity::Low),
            "medium" => Ok(Severity::Medium),
            "high" => Ok(Severity::High),
            "critical" => Ok(Severity::Critical),
            other => Err(Error::validation(format!("unknown severity: {}", other))),
        }
    }
}

/// Dimension of impact of a change
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Category {
    Security,
    Cost,
    Network,
    Storage,
    Compute,
    Config,
}

impl Category {
    pub fn as_str(self) -> &'static str {
        match self {
            Category::Security => "security",
            Category::Cost => "cost",
            Category::Network => "network",
            Category::Storage => "storage",
            Category::Compute => "compute",
            Category::Config => "config",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Kind of change a resource underwent
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeType {
    Added,
    Removed,
    Modified,
    Moved,
}

impl ChangeType {
    pub fn as_str(self) -> &'static str {
        match self {
            ChangeType::Added => "added",
            ChangeType::Removed => "removed",
            ChangeType::Modified => "modified",
            ChangeType::Moved => "moved",
        }
    }
}

impl fmt::Display for ChangeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A single leaf difference inside a resource
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldChange {
    /// Dotted field path, e.g. `tags.env` or `rules[0].cidr`
    pub path: String,
    pub old_value: Option<Value>,
    pub new_value: Option<Value>,
    pub severity: Severity,
    pub category: Category,
}

/// Per-resource component of a drift report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResourceDiff {
    pub resource_id: String,
    pub resource_type: String,
    pub drift_type: ChangeType,
    pub severity: Severity,
    pub category: Category,
    pub risk_score: f64,
    pub description: String,
    #[serde(default)]
    pub changes: Vec<FieldChange>,
}

/// Aggregate view of a drift report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftSummary {
    pub total_resources: usize,
    pub changed_resources: usize,
    pub added_resources: usize,
    pub removed_resources: usize,
    pub modified_resources: usize,
    #[serde(default)]
    pub moved_resources: usize,
    #[serde(default)]
    pub changes_by_severity: BTreeMap<Severity, usize>,
    #[serde(default)]
    pub changes_by_category: BTreeMap<Category, usize>,
    pub overall_risk: Severity,
    pub risk_score: f64,
}

impl DriftSummary {
    /// Reduce a diff sequence into a summary
    pub fn from_diffs(total_resources: usize, diffs: &[ResourceDiff]) -> Self {
        let mut summary = DriftSummary {
            total_resources,
            changed_resources: diffs.len(),
            added_resources: 0,
            removed_resources: 0,
            modified_resources: 0,
            moved_resources: 0,
            changes_by_severity: BTreeMap::new(),
            changes_by_category: BTreeMap::new(),
            overall_risk: Severity::Low,
            risk_score: 0.0,
        };

        for diff in diffs {
            match diff.drift_type {
                ChangeType::Added => summary.added_resources += 1,
                ChangeType::Removed => summary.removed_resources += 1,
                ChangeType::Modified => summary.modified_resources += 1,
                ChangeType::Moved => summary.moved_resources += 1,
            }
            *summary.changes_by_severity.entry(diff.severity).or_insert(0) += 1;
            *summary.changes_by_category.entry(diff.category).or_insert(0) += 1;
            summary.overall_risk = summary.overall_risk.max(diff.severity);
            summary.risk_score = summary.risk_score.max(diff.risk_score);
        }
        summary
    }
}

/// Result of comparing a baseline snapshot to a current snapshot.
///
/// Header fields precede `resource_changes` so listings can read them
/// from the start of the document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DriftReport {
    pub id: String,
    pub baseline_id: String,
    pub current_id: String,
    #[serde(with = "timestamp")]
    pub timestamp: DateTime<Utc>,
    pub summary: DriftSummary,
    #[serde(default)]
    pub resource_changes: Vec<ResourceDiff>,
}

impl DriftReport {
    /// Whether any resource drifted; drives the CLI exit code
    pub fn has_drift(&self) -> bool {
        !self.resource_changes.is_empty()
    }

    /// Total number of field-level changes across all diffs
    pub fn field_change_count(&self) -> usize {
        self.resource_changes.iter().map(|d| d.changes.len()).sum()
    }
}
