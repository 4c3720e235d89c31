//! Integration tests for report rendering
//!
//! Renders one realistic drift report through every format and checks the
//! parts downstream tools depend on.

mod helpers;

use helpers::*;
use std::fs;

use vaino::cancel::CancellationToken;
use vaino::differ::compare;
use vaino::models::{DriftReport, Severity};
use vaino::output::{
    filter_by_severity, formatter_for, render_to_file, Format, RenderOptions, StreamFormat,
    StreamRenderer,
};
use vaino::storage::AtomicWriter;

fn plain() -> RenderOptions {
    RenderOptions {
        no_color: true,
        ..RenderOptions::default()
    }
}

/// One modified instance and one added world-open security group
fn sample_report() -> DriftReport {
    let baseline = snapshot("snap-1", 0, vec![instance("i-1", "t3.micro")]);
    let current = snapshot(
        "snap-2",
        1,
        vec![instance("i-1", "t3.large"), security_group("sg-1", &["0.0.0.0/0:22"])],
    );
    compare(&baseline, &current).unwrap()
}

fn render(format: Format, report: &DriftReport) -> String {
    formatter_for(format, &plain()).drift_report(report).unwrap()
}

// ==================== Drift report formats ====================

#[test]
fn test_json_output_round_trips() {
    let report = sample_report();
    let text = render(Format::Json, &report);
    let parsed: DriftReport = serde_json::from_str(&text).unwrap();
    assert_eq!(parsed, report);
}

#[test]
fn test_yaml_output_is_structured() {
    let text = render(Format::Yaml, &sample_report());
    let value: serde_yaml::Value = serde_yaml::from_str(&text).unwrap();
    assert_eq!(value["baseline_id"].as_str(), Some("snap-1"));
    assert_eq!(value["summary"]["overall_risk"].as_str(), Some("critical"));
}

#[test]
fn test_markdown_groups_by_risk() {
    let text = render(Format::Markdown, &sample_report());
    assert!(text.starts_with("# Infrastructure Drift Report"));
    assert!(text.contains("## Detailed Changes"));
    let critical = text.find("Critical Risk Changes").unwrap();
    let high = text.find("High Risk Changes").unwrap();
    assert!(critical < high);
    assert!(text.contains("#### i-1 (instance)"));
    assert!(text.contains("- **instance_type:** `t3.micro` → `t3.large`"));
}

#[test]
fn test_csv_has_header_and_one_row_per_diff() {
    let text = render(Format::Csv, &sample_report());
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines[0],
        "ResourceID,ResourceType,ChangeType,Severity,Category,RiskScore,Description"
    );
    assert_eq!(lines.len(), 3);
    assert!(lines[1].starts_with("sg-1,security_group,added,critical,security,"));
}

#[test]
fn test_unix_formats() {
    let report = sample_report();

    let diff = render(Format::Unix, &report);
    assert!(diff.contains("--- /dev/null\n+++ security_group/sg-1\n"));
    assert!(diff.contains("@@ instance_type @@\n-instance_type: t3.micro\n+instance_type: t3.large\n"));
    assert!(diff.ends_with("1 additions, 0 deletions, 1 modifications\n"));
    assert!(!diff.contains('\u{1b}'));

    let names = render(Format::NameOnly, &report);
    assert_eq!(names, "security_group/sg-1\ninstance/i-1\n");

    let stat = render(Format::Stat, &report);
    assert!(stat.contains(" instance/i-1 | 1 change\n"));
    assert!(stat.ends_with(" 2 resources changed, 1 modification\n"));
}

#[test]
fn test_html_escapes_values() {
    let baseline = snapshot("snap-1", 0, vec![instance("i-1", "t3.micro")]);
    let current = snapshot("snap-2", 1, vec![instance("i-1", "<script>")]);
    let report = compare(&baseline, &current).unwrap();

    let text = render(Format::Html, &report);
    assert!(text.contains("<!DOCTYPE html>"));
    assert!(text.contains("&lt;script&gt;"));
    assert!(!text.contains("<script>"));
}

#[test]
fn test_table_respects_width() {
    let options = RenderOptions {
        no_color: true,
        max_width: 60,
        ..RenderOptions::default()
    };
    let text = formatter_for(Format::Table, &options)
        .drift_report(&sample_report())
        .unwrap();
    assert!(text.contains("sg-1"));
    let table_lines: Vec<&str> = text
        .lines()
        .filter(|l| l.starts_with(['┌', '│', '├', '└']))
        .collect();
    assert!(!table_lines.is_empty());
    for line in table_lines {
        assert!(line.chars().count() <= 60, "line too wide: {}", line);
    }
}

// ==================== Filtering and files ====================

#[test]
fn test_severity_filter_before_rendering() {
    let report = sample_report();
    let filtered = filter_by_severity(&report, Severity::Critical);

    assert_eq!(filtered.resource_changes.len(), 1);
    assert_eq!(filtered.summary.changed_resources, 1);
    assert_eq!(filtered.summary.total_resources, report.summary.total_resources);
    assert_eq!(render(Format::NameOnly, &filtered), "security_group/sg-1\n");
}

#[test]
fn test_render_to_file_is_atomic() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("reports").join("drift.md");
    let text = render(Format::Markdown, &sample_report());

    render_to_file(&AtomicWriter::new(), &path, &text).unwrap();
    assert_eq!(fs::read_to_string(&path).unwrap(), text);
}

#[test]
fn test_stream_rendering_of_stored_snapshot() {
    let env = TestStore::new().unwrap();
    env.store
        .save_snapshot(&numbered_snapshot("snap-big", "aws", 0, 250))
        .unwrap();

    let renderer = StreamRenderer::new(StreamFormat::try_from(Format::Json).unwrap());
    let mut out = Vec::new();
    let count = renderer
        .render_stored(&env.store, "snap-big", &CancellationToken::new(), &mut out)
        .unwrap();

    assert_eq!(count, 250);
    let text = String::from_utf8(out).unwrap();
    assert_eq!(text.lines().count(), 250);
    let first: serde_json::Value = serde_json::from_str(text.lines().next().unwrap()).unwrap();
    assert_eq!(first["id"], "i-00000");

    assert!(StreamFormat::try_from(Format::Html).is_err());
}
