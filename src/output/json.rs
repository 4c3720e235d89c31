//! JSON output

use serde::Serialize;

use super::Formatter;
use crate::error::Result;
use crate::models::{Baseline, BaselineInfo, DriftReport, DriftReportInfo, Snapshot, SnapshotInfo};
use crate::timeline::TimelineAnalyzer;

/// Serializes documents as JSON, two-space indented when `pretty`
#[derive(Debug, Clone, Copy)]
pub struct JsonFormatter {
    pretty: bool,
}

impl JsonFormatter {
    pub fn new(pretty: bool) -> Self {
        Self { pretty }
    }

    fn encode<T: Serialize + ?Sized>(&self, value: &T) -> Result<String> {
        let mut out = if self.pretty {
            serde_json::to_string_pretty(value)?
        } else {
            serde_json::to_string(value)?
        };
        out.push('\n');
        Ok(out)
    }
}

impl Formatter for JsonFormatter {
    fn drift_report(&self, report: &DriftReport) -> Result<String> {
        self.encode(report)
    }

    fn snapshot(&self, snapshot: &Snapshot) -> Result<String> {
        self.encode(snapshot)
    }

    fn baseline(&self, baseline: &Baseline) -> Result<String> {
        self.encode(baseline)
    }

    fn snapshot_list(&self, items: &[SnapshotInfo]) -> Result<String> {
        self.encode(items)
    }

    fn baseline_list(&self, items: &[BaselineInfo]) -> Result<String> {
        self.encode(items)
    }

    fn report_list(&self, items: &[DriftReportInfo]) -> Result<String> {
        self.encode(items)
    }

    fn timeline(&self, analysis: &TimelineAnalyzer) -> Result<String> {
        self.encode(analysis)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Resource;
    use chrono::{TimeZone, Utc};
    use serde_json::Value;

    #[test]
    fn test_compact_and_pretty() {
        let ts = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
        let snapshot = Snapshot::new("snap-1", "aws", ts)
            .with_resources(vec![Resource::new("i-1", "instance", "web", "aws")]);

        let compact = JsonFormatter::new(false).snapshot(&snapshot).unwrap();
        assert_eq!(compact.lines().count(), 1);
        let pretty = JsonFormatter::new(true).snapshot(&snapshot).unwrap();
        assert!(pretty.contains("\n  \"id\": \"snap-1\""));

        let parsed: Value = serde_json::from_str(&compact).unwrap();
        assert_eq!(parsed["timestamp"], "2024-01-01T00:00:00.000000000Z");
        assert_eq!(parsed["resources"][0]["id"], "i-1");
    }
}
