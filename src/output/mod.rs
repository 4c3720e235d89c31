//! Output formatting module
//!
//! Handles:
//! - Format selection from a user supplied tag
//! - Rendering of drift reports, snapshots, baselines and listings
//! - Severity filtering before rendering
//! - Streaming rendering of large snapshot files
//! - Atomic writes of rendered output to files

use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;

use crate::constants::{DEFAULT_MAX_WIDTH, DOCUMENT_MODE};
use crate::error::{Error, Result};
use crate::models::info::human_size;
use crate::models::{
    timestamp, Baseline, BaselineInfo, DriftReport, DriftReportInfo, Snapshot, SnapshotInfo,
};
use crate::storage::AtomicWriter;
use crate::timeline::TimelineAnalyzer;

pub mod csv;
pub mod filter;
pub mod html;
pub mod json;
pub mod markdown;
pub mod stream;
pub mod style;
pub mod table;
pub mod unix;
pub mod yaml;

pub use filter::filter_by_severity;
pub use stream::{StreamFormat, StreamRenderer};
pub use style::Style;

/// Output format selected by tag
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Format {
    Json,
    Yaml,
    Markdown,
    Csv,
    Html,
    Table,
    Unix,
    NameOnly,
    Stat,
}

impl Format {
    pub fn as_str(self) -> &'static str {
        match self {
            Format::Json => "json",
            Format::Yaml => "yaml",
            Format::Markdown => "markdown",
            Format::Csv => "csv",
            Format::Html => "html",
            Format::Table => "table",
            Format::Unix => "unix",
            Format::NameOnly => "name-only",
            Format::Stat => "stat",
        }
    }
}

impl FromStr for Format {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "json" => Ok(Format::Json),
            "yaml" | "yml" => Ok(Format::Yaml),
            "markdown" | "md" => Ok(Format::Markdown),
            "csv" => Ok(Format::Csv),
            "html" => Ok(Format::Html),
            "table" => Ok(Format::Table),
            "unix" | "diff" => Ok(Format::Unix),
            "name-only" => Ok(Format::NameOnly),
            "stat" => Ok(Format::Stat),
            other => Err(Error::validation(format!(
                "unsupported output format: {} (expected json, yaml, markdown, csv, html, table, unix, name-only or stat)",
                other
            ))),
        }
    }
}

/// Knobs shared by every formatter
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RenderOptions {
    /// Indented JSON
    pub pretty: bool,
    pub no_color: bool,
    pub max_width: usize,
}

impl Default for RenderOptions {
    fn default() -> Self {
        Self {
            pretty: true,
            no_color: false,
            max_width: DEFAULT_MAX_WIDTH,
        }
    }
}

/// Renders store documents as text
///
/// Only drift reports are mandatory; the other methods fall back to short
/// plain renderings.
pub trait Formatter {
    fn drift_report(&self, report: &DriftReport) -> Result<String>;

    fn snapshot(&self, snapshot: &Snapshot) -> Result<String> {
        Ok(plain_snapshot(snapshot))
    }

    fn baseline(&self, baseline: &Baseline) -> Result<String> {
        Ok(plain_baseline(baseline))
    }

    fn snapshot_list(&self, items: &[SnapshotInfo]) -> Result<String> {
        let mut out = String::new();
        for info in items {
            let _ = writeln!(
                out,
                "{}\t{}\t{}\t{} resources\t{}",
                info.id,
                timestamp::format(&info.timestamp),
                info.provider,
                info.resource_count,
                human_size(info.file_size)
            );
        }
        Ok(out)
    }

    fn baseline_list(&self, items: &[BaselineInfo]) -> Result<String> {
        let mut out = String::new();
        for info in items {
            let _ = writeln!(out, "{}\t{}\t{}", info.id, info.name, info.snapshot_id);
        }
        Ok(out)
    }

    fn report_list(&self, items: &[DriftReportInfo]) -> Result<String> {
        let mut out = String::new();
        for info in items {
            let _ = writeln!(
                out,
                "{}\t{} -> {}\t{} changes\t{}",
                info.id, info.baseline_id, info.current_id, info.change_count, info.overall_risk
            );
        }
        Ok(out)
    }

    fn timeline(&self, analysis: &TimelineAnalyzer) -> Result<String> {
        let mut out = String::new();
        for event in analysis.events() {
            let _ = writeln!(
                out,
                "{} [{}] {}: {}",
                timestamp::format(&event.timestamp),
                event.severity,
                event.provider,
                event.description
            );
        }
        for trend in analysis.trends() {
            let _ = writeln!(
                out,
                "{}: {} (slope {:.2}, confidence {:.2})",
                trend.provider, trend.trend_type, trend.slope, trend.confidence
            );
        }
        Ok(out)
    }
}

fn plain_snapshot(snapshot: &Snapshot) -> String {
    let mut out = format!(
        "Snapshot {} ({}, {}, {} resources)\n",
        snapshot.id,
        snapshot.provider,
        timestamp::format(&snapshot.timestamp),
        snapshot.resources.len()
    );
    for r in &snapshot.resources {
        let _ = writeln!(out, "{}/{}\t{}", r.resource_type, r.id, r.name);
    }
    out
}

fn plain_baseline(baseline: &Baseline) -> String {
    let mut out = format!("Baseline {} ({})\n", baseline.name, baseline.id);
    let _ = writeln!(out, "Snapshot: {}", baseline.snapshot_id);
    let _ = writeln!(out, "Created: {}", timestamp::format(&baseline.created_at));
    if !baseline.description.is_empty() {
        let _ = writeln!(out, "Description: {}", baseline.description);
    }
    if baseline.dangling {
        out.push_str("Warning: referenced snapshot is missing\n");
    }
    out
}

/// Formatter for `format` configured by `options`
pub fn formatter_for(format: Format, options: &RenderOptions) -> Box<dyn Formatter> {
    let style = Style::new(options.no_color);
    match format {
        Format::Json => Box::new(json::JsonFormatter::new(options.pretty)),
        Format::Yaml => Box::new(yaml::YamlFormatter),
        Format::Markdown => Box::new(markdown::MarkdownFormatter),
        Format::Csv => Box::new(csv::CsvFormatter),
        Format::Html => Box::new(html::HtmlFormatter),
        Format::Table => Box::new(table::TableFormatter::new(style, options.max_width)),
        Format::Unix => Box::new(unix::UnixFormatter::new(style)),
        Format::NameOnly => Box::new(unix::NameOnlyFormatter),
        Format::Stat => Box::new(unix::StatFormatter),
    }
}

/// Write rendered output to `path` through the atomic writer
pub fn render_to_file(writer: &AtomicWriter, path: &Path, contents: &str) -> Result<()> {
    writer.write(path, contents.as_bytes(), DOCUMENT_MODE)
}

/// Exit-code predicate: true when the rendered report contains any diff
pub fn has_drift(report: &DriftReport) -> bool {
    report.has_drift()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_tags() {
        assert_eq!("json".parse::<Format>().unwrap(), Format::Json);
        assert_eq!("YML".parse::<Format>().unwrap(), Format::Yaml);
        assert_eq!("md".parse::<Format>().unwrap(), Format::Markdown);
        assert_eq!("name-only".parse::<Format>().unwrap(), Format::NameOnly);
        assert_eq!(Format::Stat.as_str(), "stat");

        let err = "xml".parse::<Format>().unwrap_err();
        assert_eq!(err.kind(), crate::error::ErrorKind::Validation);
    }

    #[test]
    fn test_render_to_file_is_atomic_and_readable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("out").join("report.md");
        let writer = AtomicWriter::new();
        render_to_file(&writer, &path, "# Report\n").unwrap();
        assert_eq!(std::fs::read_to_string(&path).unwrap(), "# Report\n");
    }
}
