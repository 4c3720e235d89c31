//! CSV output (RFC 4180 quoting)

use super::Formatter;
use crate::error::Result;
use crate::models::{
    timestamp, BaselineInfo, DriftReport, DriftReportInfo, Resource, ResourceDiff, Snapshot,
    SnapshotInfo,
};

pub const DRIFT_HEADER: &str = "ResourceID,ResourceType,ChangeType,Severity,Category,RiskScore,Description";
pub const SNAPSHOT_HEADER: &str = "ID,Type,Name,Provider,Region,Namespace";

#[derive(Debug, Clone, Copy, Default)]
pub struct CsvFormatter;

/// Quote a field when it contains a separator, quote or line break
pub fn escape(field: &str) -> String {
    if field.contains([',', '"', '\n', '\r']) {
        format!("\"{}\"", field.replace('"', "\"\""))
    } else {
        field.to_string()
    }
}

fn record<S: AsRef<str>>(fields: &[S]) -> String {
    let mut line = fields
        .iter()
        .map(|f| escape(f.as_ref()))
        .collect::<Vec<_>>()
        .join(",");
    line.push('\n');
    line
}

pub fn diff_record(diff: &ResourceDiff) -> String {
    record(&[
        diff.resource_id.as_str(),
        diff.resource_type.as_str(),
        diff.drift_type.as_str(),
        diff.severity.as_str(),
        diff.category.as_str(),
        format!("{:.2}", diff.risk_score).as_str(),
        diff.description.as_str(),
    ])
}

pub fn resource_record(resource: &Resource) -> String {
    record(&[
        resource.id.as_str(),
        resource.resource_type.as_str(),
        resource.name.as_str(),
        resource.provider.as_str(),
        resource.region.as_deref().unwrap_or(""),
        resource.namespace.as_deref().unwrap_or(""),
    ])
}

impl Formatter for CsvFormatter {
    fn drift_report(&self, report: &DriftReport) -> Result<String> {
        let mut out = format!("{}\n", DRIFT_HEADER);
        for diff in &report.resource_changes {
            out.push_str(&diff_record(diff));
        }
        Ok(out)
    }

    fn snapshot(&self, snapshot: &Snapshot) -> Result<String> {
        let mut out = format!("{}\n", SNAPSHOT_HEADER);
        for resource in &snapshot.resources {
            out.push_str(&resource_record(resource));
        }
        Ok(out)
    }

    fn snapshot_list(&self, items: &[SnapshotInfo]) -> Result<String> {
        let mut out = String::from("ID,Timestamp,Provider,Resources,Bytes\n");
        for info in items {
            out.push_str(&record(&[
                info.id.clone(),
                timestamp::format(&info.timestamp),
                info.provider.clone(),
                info.resource_count.to_string(),
                info.file_size.to_string(),
            ]));
        }
        Ok(out)
    }

    fn baseline_list(&self, items: &[BaselineInfo]) -> Result<String> {
        let mut out = String::from("ID,Name,SnapshotID,Created,Description\n");
        for info in items {
            out.push_str(&record(&[
                info.id.clone(),
                info.name.clone(),
                info.snapshot_id.clone(),
                timestamp::format(&info.created_at),
                info.description.clone(),
            ]));
        }
        Ok(out)
    }

    fn report_list(&self, items: &[DriftReportInfo]) -> Result<String> {
        let mut out = String::from("ID,BaselineID,CurrentID,Timestamp,Changes,OverallRisk\n");
        for info in items {
            out.push_str(&record(&[
                info.id.clone(),
                info.baseline_id.clone(),
                info.current_id.clone(),
                timestamp::format(&info.timestamp),
                info.change_count.to_string(),
                info.overall_risk.to_string(),
            ]));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Category, ChangeType, Severity};

    #[test]
    fn test_escape() {
        assert_eq!(escape("plain"), "plain");
        assert_eq!(escape("a,b"), "\"a,b\"");
        assert_eq!(escape("say \"hi\""), "\"say \"\"hi\"\"\"");
        assert_eq!(escape("two\nlines"), "\"two\nlines\"");
    }

    #[test]
    fn test_diff_record() {
        let diff = ResourceDiff {
            resource_id: "sg-1".to_string(),
            resource_type: "security_group".to_string(),
            drift_type: ChangeType::Modified,
            severity: Severity::Critical,
            category: Category::Security,
            risk_score: 1.0,
            description: "2 field(s) changed: ingress, tags.env".to_string(),
            changes: Vec::new(),
        };
        assert_eq!(
            diff_record(&diff),
            "sg-1,security_group,modified,critical,security,1.00,\"2 field(s) changed: ingress, tags.env\"\n"
        );
    }

    #[test]
    fn test_resource_record_blank_optionals() {
        let resource = Resource::new("i-1", "instance", "web", "aws");
        assert_eq!(resource_record(&resource), "i-1,instance,web,aws,,\n");
    }
}
