//! Markdown output

use std::collections::BTreeMap;
use std::fmt::Write as _;

use super::Formatter;
use crate::error::Result;
use crate::models::value::display_optional;
use crate::models::{
    timestamp, Baseline, BaselineInfo, DriftReport, DriftReportInfo, ResourceDiff, Severity,
    Snapshot, SnapshotInfo,
};

#[derive(Debug, Clone, Copy, Default)]
pub struct MarkdownFormatter;

pub fn risk_emoji(severity: Severity) -> &'static str {
    match severity {
        Severity::Critical => "🔴",
        Severity::High => "🟠",
        Severity::Medium => "🟡",
        Severity::Low => "🟢",
    }
}

/// First letter upper-cased
pub fn title(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// Escape characters that would break a table cell
fn cell(text: &str) -> String {
    text.replace('|', "\\|").replace('\n', " ")
}

fn write_diff(out: &mut String, diff: &ResourceDiff) {
    let _ = writeln!(out, "#### {} ({})\n", diff.resource_id, diff.resource_type);
    let _ = writeln!(out, "- **Change Type:** {}", title(diff.drift_type.as_str()));
    let _ = writeln!(out, "- **Category:** {}", title(diff.category.as_str()));
    let _ = writeln!(out, "- **Risk Score:** {:.2}", diff.risk_score);
    let _ = writeln!(out, "- **Description:** {}\n", diff.description);

    if !diff.changes.is_empty() {
        out.push_str("**Field Changes:**\n\n");
        for change in &diff.changes {
            let _ = writeln!(
                out,
                "- **{}:** `{}` → `{}`",
                change.path,
                display_optional(change.old_value.as_ref()),
                display_optional(change.new_value.as_ref())
            );
        }
        out.push('\n');
    }
}

impl Formatter for MarkdownFormatter {
    fn drift_report(&self, report: &DriftReport) -> Result<String> {
        let s = &report.summary;
        let mut out = String::from("# Infrastructure Drift Report\n\n");
        let _ = writeln!(out, "**Generated:** {}", timestamp::format(&report.timestamp));
        let _ = writeln!(out, "**Baseline ID:** {}", report.baseline_id);
        let _ = writeln!(out, "**Current ID:** {}", report.current_id);
        let _ = writeln!(out, "**Overall Risk:** {} ({:.2})\n", s.overall_risk, s.risk_score);

        out.push_str("## Summary\n\n");
        let _ = writeln!(out, "- **Total Resources:** {}", s.total_resources);
        let _ = writeln!(out, "- **Changed Resources:** {}", s.changed_resources);
        let _ = writeln!(out, "- **Added Resources:** {}", s.added_resources);
        let _ = writeln!(out, "- **Removed Resources:** {}", s.removed_resources);
        let _ = writeln!(out, "- **Modified Resources:** {}", s.modified_resources);
        if s.moved_resources > 0 {
            let _ = writeln!(out, "- **Moved Resources:** {}", s.moved_resources);
        }
        out.push('\n');

        if !s.changes_by_severity.is_empty() {
            out.push_str("### Changes by Severity\n\n");
            for severity in Severity::DESCENDING {
                if let Some(count) = s.changes_by_severity.get(&severity).filter(|c| **c > 0) {
                    let _ = writeln!(
                        out,
                        "- {} **{}:** {}",
                        risk_emoji(severity),
                        title(severity.as_str()),
                        count
                    );
                }
            }
            out.push('\n');
        }

        if !report.resource_changes.is_empty() {
            out.push_str("## Detailed Changes\n\n");
            for severity in Severity::DESCENDING {
                let group: Vec<&ResourceDiff> = report
                    .resource_changes
                    .iter()
                    .filter(|d| d.severity == severity)
                    .collect();
                if group.is_empty() {
                    continue;
                }
                let _ = writeln!(
                    out,
                    "### {} {} Risk Changes\n",
                    risk_emoji(severity),
                    title(severity.as_str())
                );
                for diff in group {
                    write_diff(&mut out, diff);
                }
            }
        }
        Ok(out)
    }

    fn snapshot(&self, snapshot: &Snapshot) -> Result<String> {
        let mut out = String::from("# Infrastructure Snapshot\n\n");
        let _ = writeln!(out, "**ID:** {}", snapshot.id);
        let _ = writeln!(out, "**Provider:** {}", snapshot.provider);
        let _ = writeln!(out, "**Timestamp:** {}", timestamp::format(&snapshot.timestamp));
        let _ = writeln!(out, "**Resource Count:** {}\n", snapshot.resources.len());

        let mut by_type: BTreeMap<&str, Vec<_>> = BTreeMap::new();
        for resource in &snapshot.resources {
            by_type.entry(resource.resource_type.as_str()).or_default().push(resource);
        }

        out.push_str("## Resources by Type\n\n");
        for (resource_type, mut resources) in by_type {
            resources.sort_by(|a, b| a.id.cmp(&b.id));
            let _ = writeln!(out, "### {} ({})\n", resource_type, resources.len());
            for resource in resources {
                let _ = write!(out, "- **{}** (`{}`)", resource.name, resource.id);
                if let Some(region) = &resource.region {
                    let _ = write!(out, " - Region: {}", region);
                }
                out.push('\n');
            }
            out.push('\n');
        }
        Ok(out)
    }

    fn baseline(&self, baseline: &Baseline) -> Result<String> {
        let mut out = format!("# Baseline {}\n\n", baseline.name);
        let _ = writeln!(out, "**ID:** {}", baseline.id);
        let _ = writeln!(out, "**Snapshot:** {}", baseline.snapshot_id);
        let _ = writeln!(out, "**Created:** {}", timestamp::format(&baseline.created_at));
        let _ = writeln!(out, "**Version:** {}", baseline.version);
        if !baseline.description.is_empty() {
            let _ = writeln!(out, "\n{}", baseline.description);
        }
        if baseline.dangling {
            out.push_str("\n> **Warning:** the referenced snapshot no longer exists.\n");
        }
        Ok(out)
    }

    fn snapshot_list(&self, items: &[SnapshotInfo]) -> Result<String> {
        let mut out = String::from("| ID | Timestamp | Provider | Resources |\n|---|---|---|---|\n");
        for info in items {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} |",
                cell(&info.id),
                timestamp::format(&info.timestamp),
                cell(&info.provider),
                info.resource_count
            );
        }
        Ok(out)
    }

    fn baseline_list(&self, items: &[BaselineInfo]) -> Result<String> {
        let mut out = String::from("| ID | Name | Snapshot | Created |\n|---|---|---|---|\n");
        for info in items {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} |",
                cell(&info.id),
                cell(&info.name),
                cell(&info.snapshot_id),
                timestamp::format(&info.created_at)
            );
        }
        Ok(out)
    }

    fn report_list(&self, items: &[DriftReportInfo]) -> Result<String> {
        let mut out = String::from("| ID | Baseline | Current | Changes | Risk |\n|---|---|---|---|---|\n");
        for info in items {
            let _ = writeln!(
                out,
                "| {} | {} | {} | {} | {} {} |",
                cell(&info.id),
                cell(&info.baseline_id),
                cell(&info.current_id),
                info.change_count,
                risk_emoji(info.overall_risk),
                info.overall_risk
            );
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, ChangeType, DriftSummary, FieldChange, Resource};
    use chrono::{TimeZone, Utc};
    use serde_json::json;

    fn report() -> DriftReport {
        let diffs = vec![ResourceDiff {
            resource_id: "i-1".to_string(),
            resource_type: "instance".to_string(),
            drift_type: ChangeType::Modified,
            severity: Severity::High,
            category: Category::Cost,
            risk_score: 0.75,
            description: "1 field(s) changed: instance_type".to_string(),
            changes: vec![FieldChange {
                path: "instance_type".to_string(),
                old_value: Some(json!("t3.micro")),
                new_value: Some(json!("t3.large")),
                severity: Severity::High,
                category: Category::Cost,
            }],
        }];
        DriftReport {
            id: "drift-1".to_string(),
            baseline_id: "base".to_string(),
            current_id: "cur".to_string(),
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            summary: DriftSummary::from_diffs(2, &diffs),
            resource_changes: diffs,
        }
    }

    #[test]
    fn test_drift_report_markdown() {
        let text = MarkdownFormatter.drift_report(&report()).unwrap();
        assert!(text.starts_with("# Infrastructure Drift Report\n"));
        assert!(text.contains("**Generated:** 2024-01-01T00:00:00.000000000Z"));
        assert!(text.contains("- 🟠 **High:** 1"));
        assert!(text.contains("### 🟠 High Risk Changes"));
        assert!(text.contains("#### i-1 (instance)"));
        assert!(text.contains("- **instance_type:** `t3.micro` → `t3.large`"));
        assert!(!text.contains("Critical Risk Changes"));
    }

    #[test]
    fn test_snapshot_groups_by_type() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let snapshot = Snapshot::new("snap-1", "aws", ts).with_resources(vec![
            Resource::new("vol-1", "volume", "data", "aws"),
            Resource::new("i-2", "instance", "api", "aws").with_region("us-east-1"),
            Resource::new("i-1", "instance", "web", "aws"),
        ]);
        let text = MarkdownFormatter.snapshot(&snapshot).unwrap();
        let instance = text.find("### instance (2)").unwrap();
        let volume = text.find("### volume (1)").unwrap();
        assert!(instance < volume);
        assert!(text.find("`i-1`").unwrap() < text.find("`i-2`").unwrap());
        assert!(text.contains("- **api** (`i-2`) - Region: us-east-1"));
    }
}
