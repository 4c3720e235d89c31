//! Standalone HTML drift report

use std::fmt::Write as _;

use super::markdown::title;
use super::Formatter;
use crate::error::Result;
use crate::models::value::display_optional;
use crate::models::{timestamp, DriftReport, Snapshot};

const STYLE: &str = r#"    <style>
        body { font-family: Arial, sans-serif; margin: 20px; }
        .header { background: #f5f5f5; padding: 20px; border-radius: 5px; }
        .summary { margin: 20px 0; }
        .changes { margin: 20px 0; }
        .change-item { margin: 10px 0; padding: 15px; border-left: 4px solid; }
        .critical { border-color: #d32f2f; background: #ffebee; }
        .high { border-color: #f57c00; background: #fff3e0; }
        .medium { border-color: #1976d2; background: #e3f2fd; }
        .low { border-color: #388e3c; background: #e8f5e9; }
        .risk-badge { padding: 2px 8px; border-radius: 3px; color: white; font-size: 12px; }
        .risk-critical { background: #d32f2f; }
        .risk-high { background: #f57c00; }
        .risk-medium { background: #1976d2; }
        .risk-low { background: #388e3c; }
        table { width: 100%; border-collapse: collapse; }
        th, td { padding: 8px; text-align: left; border-bottom: 1px solid #ddd; }
        th { background-color: #f5f5f5; }
    </style>
"#;

#[derive(Debug, Clone, Copy, Default)]
pub struct HtmlFormatter;

/// Escape text for element content and attribute values
pub fn escape(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            other => out.push(other),
        }
    }
    out
}

fn open_document(out: &mut String, page_title: &str) {
    out.push_str("<!DOCTYPE html>\n<html>\n<head>\n    <meta charset=\"utf-8\">\n");
    let _ = writeln!(out, "    <title>{}</title>", escape(page_title));
    out.push_str(STYLE);
    out.push_str("</head>\n<body>\n");
}

fn close_document(out: &mut String) {
    out.push_str("</body>\n</html>\n");
}

impl Formatter for HtmlFormatter {
    fn drift_report(&self, report: &DriftReport) -> Result<String> {
        let s = &report.summary;
        let mut out = String::new();
        open_document(&mut out, "Infrastructure Drift Report");

        let _ = write!(
            out,
            r#"    <div class="header">
        <h1>Infrastructure Drift Report</h1>
        <p><strong>Generated:</strong> {}</p>
        <p><strong>Baseline ID:</strong> {}</p>
        <p><strong>Current ID:</strong> {}</p>
        <p><strong>Overall Risk:</strong> <span class="risk-badge risk-{}">{}</span> ({:.2})</p>
    </div>
"#,
            timestamp::format(&report.timestamp),
            escape(&report.baseline_id),
            escape(&report.current_id),
            s.overall_risk,
            s.overall_risk.as_str().to_uppercase(),
            s.risk_score
        );

        let _ = write!(
            out,
            r#"    <div class="summary">
        <h2>Summary</h2>
        <table>
            <tr><th>Metric</th><th>Count</th></tr>
            <tr><td>Total Resources</td><td>{}</td></tr>
            <tr><td>Changed Resources</td><td>{}</td></tr>
            <tr><td>Added Resources</td><td>{}</td></tr>
            <tr><td>Removed Resources</td><td>{}</td></tr>
            <tr><td>Modified Resources</td><td>{}</td></tr>
            <tr><td>Moved Resources</td><td>{}</td></tr>
        </table>
    </div>
"#,
            s.total_resources,
            s.changed_resources,
            s.added_resources,
            s.removed_resources,
            s.modified_resources,
            s.moved_resources
        );

        if !report.resource_changes.is_empty() {
            out.push_str("    <div class=\"changes\">\n        <h2>Detailed Changes</h2>\n");
            for diff in &report.resource_changes {
                let class = diff.severity.as_str();
                let _ = write!(
                    out,
                    r#"        <div class="change-item {class}">
            <h3>{} <span class="risk-badge risk-{class}">{}</span></h3>
            <p><strong>Type:</strong> {}</p>
            <p><strong>Change:</strong> {}</p>
            <p><strong>Category:</strong> {}</p>
            <p><strong>Risk Score:</strong> {:.2}</p>
            <p><strong>Description:</strong> {}</p>
"#,
                    escape(&diff.resource_id),
                    class.to_uppercase(),
                    escape(&diff.resource_type),
                    title(diff.drift_type.as_str()),
                    title(diff.category.as_str()),
                    diff.risk_score,
                    escape(&diff.description),
                    class = class,
                );
                if !diff.changes.is_empty() {
                    out.push_str("            <table>\n                <tr><th>Field</th><th>Old</th><th>New</th></tr>\n");
                    for change in &diff.changes {
                        let _ = writeln!(
                            out,
                            "                <tr><td>{}</td><td><code>{}</code></td><td><code>{}</code></td></tr>",
                            escape(&change.path),
                            escape(&display_optional(change.old_value.as_ref())),
                            escape(&display_optional(change.new_value.as_ref()))
                        );
                    }
                    out.push_str("            </table>\n");
                }
                out.push_str("        </div>\n");
            }
            out.push_str("    </div>\n");
        }

        close_document(&mut out);
        Ok(out)
    }

    fn snapshot(&self, snapshot: &Snapshot) -> Result<String> {
        let mut out = String::new();
        open_document(&mut out, "Infrastructure Snapshot");
        let _ = write!(
            out,
            r#"    <div class="header">
        <h1>Infrastructure Snapshot</h1>
        <p><strong>ID:</strong> {}</p>
        <p><strong>Provider:</strong> {}</p>
        <p><strong>Timestamp:</strong> {}</p>
        <p><strong>Resource Count:</strong> {}</p>
    </div>
"#,
            escape(&snapshot.id),
            escape(&snapshot.provider),
            timestamp::format(&snapshot.timestamp),
            snapshot.resources.len()
        );
        out.push_str("    <table>\n        <tr><th>ID</th><th>Type</th><th>Name</th><th>Region</th></tr>\n");
        for r in &snapshot.resources {
            let _ = writeln!(
                out,
                "        <tr><td>{}</td><td>{}</td><td>{}</td><td>{}</td></tr>",
                escape(&r.id),
                escape(&r.resource_type),
                escape(&r.name),
                escape(r.region.as_deref().unwrap_or(""))
            );
        }
        out.push_str("    </table>\n");
        close_document(&mut out);
        Ok(out)
    }
}
