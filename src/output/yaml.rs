//! YAML output

use serde::Serialize;

use super::Formatter;
use crate::error::{Error, Result};
use crate::models::{Baseline, BaselineInfo, DriftReport, DriftReportInfo, Snapshot, SnapshotInfo};
use crate::timeline::TimelineAnalyzer;

#[derive(Debug, Clone, Copy, Default)]
pub struct YamlFormatter;

fn encode<T: Serialize + ?Sized>(value: &T) -> Result<String> {
    serde_yaml::to_string(value).map_err(|e| Error::Internal(format!("failed to encode YAML: {}", e)))
}

impl Formatter for YamlFormatter {
    fn drift_report(&self, report: &DriftReport) -> Result<String> {
        encode(report)
    }

    fn snapshot(&self, snapshot: &Snapshot) -> Result<String> {
        encode(snapshot)
    }

    fn baseline(&self, baseline: &Baseline) -> Result<String> {
        encode(baseline)
    }

    fn snapshot_list(&self, items: &[SnapshotInfo]) -> Result<String> {
        encode(items)
    }

    fn baseline_list(&self, items: &[BaselineInfo]) -> Result<String> {
        encode(items)
    }

    fn report_list(&self, items: &[DriftReportInfo]) -> Result<String> {
        encode(items)
    }

    fn timeline(&self, analysis: &TimelineAnalyzer) -> Result<String> {
        encode(analysis)
    }
}
