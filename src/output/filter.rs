//! Severity filtering applied before rendering

use crate::models::{DriftReport, DriftSummary, Severity};

/// Copy of `report` keeping only diffs at or above `min_severity`
///
/// The summary is recomputed from the kept diffs; the resource total is
/// carried over because it describes the compared snapshots.
pub fn filter_by_severity(report: &DriftReport, min_severity: Severity) -> DriftReport {
    let resource_changes: Vec<_> = report
        .resource_changes
        .iter()
        .filter(|d| d.severity >= min_severity)
        .cloned()
        .collect();
    let summary = DriftSummary::from_diffs(report.summary.total_resources, &resource_changes);
    DriftReport {
        id: report.id.clone(),
        baseline_id: report.baseline_id.clone(),
        current_id: report.current_id.clone(),
        timestamp: report.timestamp,
        summary,
        resource_changes,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, ChangeType, ResourceDiff};
    use chrono::Utc;

    fn diff(id: &str, severity: Severity) -> ResourceDiff {
        ResourceDiff {
            resource_id: id.to_string(),
            resource_type: "instance".to_string(),
            drift_type: ChangeType::Modified,
            severity,
            category: Category::Compute,
            risk_score: severity.base_risk(),
            description: "1 field(s) changed: cpu".to_string(),
            changes: Vec::new(),
        }
    }

    #[test]
    fn test_filter_recomputes_summary() {
        let diffs = vec![diff("a", Severity::Low), diff("b", Severity::High), diff("c", Severity::Critical)];
        let report = DriftReport {
            id: "drift-1".to_string(),
            baseline_id: "base".to_string(),
            current_id: "cur".to_string(),
            timestamp: Utc::now(),
            summary: DriftSummary::from_diffs(7, &diffs),
            resource_changes: diffs,
        };

        let filtered = filter_by_severity(&report, Severity::High);
        assert_eq!(filtered.resource_changes.len(), 2);
        assert_eq!(filtered.summary.total_resources, 7);
        assert_eq!(filtered.summary.changed_resources, 2);
        assert_eq!(filtered.summary.changes_by_severity.get(&Severity::Low), None);
        assert_eq!(filtered.summary.overall_risk, Severity::Critical);

        let none = filter_by_severity(&report, Severity::Low);
        assert_eq!(none.resource_changes.len(), 3);
    }
}
