//! Box-drawing tables for terminal output
//!
//! Column widths are computed from the content, then the widest columns are
//! narrowed until the table fits the width budget. Cells that no longer fit
//! are truncated with an ellipsis. Colour is applied after padding so escape
//! codes never affect alignment.

use crossterm::style::Color;
use std::fmt::Write as _;

use super::style::{change_color, output_width, Style};
use super::Formatter;
use crate::error::Result;
use crate::models::info::human_size;
use crate::models::{
    timestamp, Baseline, BaselineInfo, DriftReport, DriftReportInfo, Severity, Snapshot,
    SnapshotInfo,
};
use crate::timeline::TimelineAnalyzer;

const MIN_COLUMN_WIDTH: usize = 4;
const ELLIPSIS: char = '…';

/// One table cell with an optional colour
#[derive(Debug, Clone)]
pub struct Cell {
    text: String,
    color: Option<Color>,
}

impl Cell {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            color: None,
        }
    }

    pub fn colored(text: impl Into<String>, color: Color) -> Self {
        Self {
            text: text.into(),
            color: Some(color),
        }
    }
}

impl From<String> for Cell {
    fn from(text: String) -> Self {
        Cell::new(text)
    }
}

impl From<&str> for Cell {
    fn from(text: &str) -> Self {
        Cell::new(text)
    }
}

/// Table under construction
#[derive(Debug, Clone, Default)]
pub struct Table {
    headers: Vec<String>,
    rows: Vec<Vec<Cell>>,
}

impl Table {
    pub fn new<I, S>(headers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            headers: headers.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn row(&mut self, cells: Vec<Cell>) {
        self.rows.push(cells);
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// Column widths fitted to `max_width` including borders
    pub fn widths(&self, max_width: usize) -> Vec<usize> {
        let columns = self.headers.len();
        let mut widths: Vec<usize> = self.headers.iter().map(|h| text_width(h)).collect();
        for row in &self.rows {
            for (i, cell) in row.iter().enumerate().take(columns) {
                widths[i] = widths[i].max(text_width(&cell.text));
            }
        }

        // Borders: one leading bar plus " x |" per column
        let overhead = 1 + 3 * columns;
        while widths.iter().sum::<usize>() + overhead > max_width {
            let Some((widest, width)) = widths
                .iter()
                .copied()
                .enumerate()
                .max_by_key(|(i, w)| (*w, usize::MAX - i))
            else {
                break;
            };
            if width <= MIN_COLUMN_WIDTH {
                break;
            }
            widths[widest] -= 1;
        }
        widths
    }

    pub fn render(&self, max_width: usize, style: &Style) -> String {
        let widths = self.widths(max_width);
        let mut out = String::new();

        out.push_str(&border('┌', '┬', '┐', &widths));
        let headers: Vec<String> = self
            .headers
            .iter()
            .zip(&widths)
            .map(|(h, w)| style.bold(&pad(&truncate(h, *w), *w)))
            .collect();
        out.push_str(&line(&headers));
        out.push_str(&border('├', '┼', '┤', &widths));

        for row in &self.rows {
            let cells: Vec<String> = widths
                .iter()
                .enumerate()
                .map(|(i, w)| {
                    let cell = row.get(i);
                    let text = pad(&truncate(cell.map_or("", |c| c.text.as_str()), *w), *w);
                    match cell.and_then(|c| c.color) {
                        Some(color) => style.paint(&text, color),
                        None => text,
                    }
                })
                .collect();
            out.push_str(&line(&cells));
        }
        out.push_str(&border('└', '┴', '┘', &widths));
        out
    }
}

fn text_width(text: &str) -> usize {
    text.chars().count()
}

/// Shorten `text` to `width` characters, marking the cut with an ellipsis
pub fn truncate(text: &str, width: usize) -> String {
    // Cells are single-line
    let text = text.replace('\n', " ");
    if text_width(&text) <= width {
        return text;
    }
    if width == 0 {
        return String::new();
    }
    let mut cut: String = text.chars().take(width - 1).collect();
    cut.push(ELLIPSIS);
    cut
}

fn pad(text: &str, width: usize) -> String {
    let fill = width.saturating_sub(text_width(text));
    format!("{}{}", text, " ".repeat(fill))
}

fn border(left: char, mid: char, right: char, widths: &[usize]) -> String {
    let segments: Vec<String> = widths.iter().map(|w| "─".repeat(w + 2)).collect();
    format!("{}{}{}\n", left, segments.join(&mid.to_string()), right)
}

fn line(cells: &[String]) -> String {
    format!("│ {} │\n", cells.join(" │ "))
}

/// Human tables with colour
#[derive(Debug, Clone)]
pub struct TableFormatter {
    style: Style,
    max_width: usize,
}

impl TableFormatter {
    pub fn new(style: Style, max_width: usize) -> Self {
        Self {
            style,
            max_width: output_width(max_width),
        }
    }

    fn severity_cell(&self, severity: Severity) -> Cell {
        Cell::colored(severity.as_str().to_uppercase(), super::style::severity_color(severity))
    }
}

impl Formatter for TableFormatter {
    fn drift_report(&self, report: &DriftReport) -> Result<String> {
        let s = &report.summary;
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} {} -> {}",
            self.style.bold("Drift report"),
            report.baseline_id,
            report.current_id
        );
        let _ = writeln!(
            out,
            "Overall risk: {} ({:.2})",
            self.style.severity(&s.overall_risk.as_str().to_uppercase(), s.overall_risk),
            s.risk_score
        );
        let _ = writeln!(
            out,
            "Resources: {} total, {} changed ({} added, {} removed, {} modified, {} moved)",
            s.total_resources,
            s.changed_resources,
            s.added_resources,
            s.removed_resources,
            s.modified_resources,
            s.moved_resources
        );

        if report.resource_changes.is_empty() {
            out.push_str("\nNo drift detected.\n");
            return Ok(out);
        }

        let mut diffs: Vec<_> = report.resource_changes.iter().collect();
        diffs.sort_by(|a, b| b.severity.cmp(&a.severity).then_with(|| a.category.cmp(&b.category)));

        let mut table = Table::new(["Severity", "Category", "Type", "Resource", "Change", "Risk", "Description"]);
        for diff in diffs {
            table.row(vec![
                self.severity_cell(diff.severity),
                diff.category.as_str().into(),
                diff.resource_type.as_str().into(),
                diff.resource_id.as_str().into(),
                Cell::colored(diff.drift_type.as_str(), change_color(diff.drift_type)),
                format!("{:.2}", diff.risk_score).into(),
                diff.description.as_str().into(),
            ]);
        }
        out.push('\n');
        out.push_str(&table.render(self.max_width, &self.style));
        Ok(out)
    }

    fn snapshot(&self, snapshot: &Snapshot) -> Result<String> {
        let mut out = String::new();
        let _ = writeln!(
            out,
            "{} {} ({}, {}, {} resources)",
            self.style.bold("Snapshot"),
            snapshot.id,
            snapshot.provider,
            timestamp::format(&snapshot.timestamp),
            snapshot.resources.len()
        );
        let mut table = Table::new(["Type", "ID", "Name", "Region", "Namespace"]);
        for r in &snapshot.resources {
            table.row(vec![
                r.resource_type.as_str().into(),
                r.id.as_str().into(),
                r.name.as_str().into(),
                r.region.clone().unwrap_or_default().into(),
                r.namespace.clone().unwrap_or_default().into(),
            ]);
        }
        out.push_str(&table.render(self.max_width, &self.style));
        Ok(out)
    }

    fn baseline(&self, baseline: &Baseline) -> Result<String> {
        let mut table = Table::new(["Field", "Value"]);
        table.row(vec!["ID".into(), baseline.id.as_str().into()]);
        table.row(vec!["Name".into(), baseline.name.as_str().into()]);
        table.row(vec!["Description".into(), baseline.description.as_str().into()]);
        let snapshot = if baseline.dangling {
            Cell::colored(format!("{} (missing)", baseline.snapshot_id), Color::Red)
        } else {
            Cell::new(baseline.snapshot_id.as_str())
        };
        table.row(vec!["Snapshot".into(), snapshot]);
        table.row(vec!["Created".into(), timestamp::format(&baseline.created_at).into()]);
        table.row(vec!["Version".into(), baseline.version.as_str().into()]);
        Ok(table.render(self.max_width, &self.style))
    }

    fn snapshot_list(&self, items: &[SnapshotInfo]) -> Result<String> {
        if items.is_empty() {
            return Ok("No snapshots found.\n".to_string());
        }
        let mut table = Table::new(["ID", "Timestamp", "Provider", "Resources", "Size"]);
        for info in items {
            table.row(vec![
                info.id.as_str().into(),
                timestamp::format(&info.timestamp).into(),
                info.provider.as_str().into(),
                info.resource_count.to_string().into(),
                human_size(info.file_size).into(),
            ]);
        }
        Ok(table.render(self.max_width, &self.style))
    }

    fn baseline_list(&self, items: &[BaselineInfo]) -> Result<String> {
        if items.is_empty() {
            return Ok("No baselines found.\n".to_string());
        }
        let mut table = Table::new(["ID", "Name", "Snapshot", "Created", "Description"]);
        for info in items {
            table.row(vec![
                info.id.as_str().into(),
                info.name.as_str().into(),
                info.snapshot_id.as_str().into(),
                timestamp::format(&info.created_at).into(),
                info.description.as_str().into(),
            ]);
        }
        Ok(table.render(self.max_width, &self.style))
    }

    fn report_list(&self, items: &[DriftReportInfo]) -> Result<String> {
        if items.is_empty() {
            return Ok("No drift reports found.\n".to_string());
        }
        let mut table = Table::new(["ID", "Baseline", "Current", "Timestamp", "Changes", "Risk"]);
        for info in items {
            table.row(vec![
                info.id.as_str().into(),
                info.baseline_id.as_str().into(),
                info.current_id.as_str().into(),
                timestamp::format(&info.timestamp).into(),
                info.change_count.to_string().into(),
                self.severity_cell(info.overall_risk),
            ]);
        }
        Ok(table.render(self.max_width, &self.style))
    }

    fn timeline(&self, analysis: &TimelineAnalyzer) -> Result<String> {
        let mut out = String::new();

        let _ = writeln!(out, "{}", self.style.bold("Events"));
        if analysis.events().is_empty() {
            out.push_str("No events detected.\n");
        } else {
            let mut table = Table::new(["Timestamp", "Provider", "Type", "Severity", "Description"]);
            for e in analysis.events() {
                table.row(vec![
                    timestamp::format(&e.timestamp).into(),
                    e.provider.as_str().into(),
                    e.event_type.as_str().into(),
                    e.severity.to_string().into(),
                    e.description.as_str().into(),
                ]);
            }
            out.push_str(&table.render(self.max_width, &self.style));
        }

        let _ = writeln!(out, "\n{}", self.style.bold("Trends"));
        if analysis.trends().is_empty() {
            out.push_str("Not enough snapshots per provider to detect trends.\n");
        } else {
            let mut table = Table::new(["Provider", "Trend", "Slope", "Confidence", "Next"]);
            for t in analysis.trends() {
                let next = t
                    .predictions
                    .first()
                    .map(|p| format!("{:.0} @ {}", p.predicted_value, timestamp::format(&p.timestamp)))
                    .unwrap_or_default();
                table.row(vec![
                    t.provider.as_str().into(),
                    t.trend_type.to_string().into(),
                    format!("{:.2}", t.slope).into(),
                    format!("{:.2}", t.confidence).into(),
                    next.into(),
                ]);
            }
            out.push_str(&table.render(self.max_width, &self.style));
        }

        if !analysis.correlations().is_empty() {
            let _ = writeln!(out, "\n{}", self.style.bold("Correlations"));
            let mut table = Table::new(["Providers", "Correlation", "Relationship", "Confidence", "Example"]);
            for c in analysis.correlations() {
                let example = c.examples.first().map(|e| e.description.clone()).unwrap_or_default();
                table.row(vec![
                    format!("{} / {}", c.provider_a, c.provider_b).into(),
                    format!("{:.2}", c.correlation).into(),
                    c.relationship.to_string().into(),
                    format!("{:.2}", c.confidence).into(),
                    example.into(),
                ]);
            }
            out.push_str(&table.render(self.max_width, &self.style));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_with_ellipsis() {
        assert_eq!(truncate("abcdef", 10), "abcdef");
        assert_eq!(truncate("abcdef", 4), "abc…");
        assert_eq!(truncate("a\nb", 5), "a b");
    }

    #[test]
    fn test_render_aligns_columns() {
        let mut table = Table::new(["A", "Long header"]);
        table.row(vec!["x".into(), "y".into()]);
        let text = table.render(80, &Style::plain());
        let lines: Vec<&str> = text.lines().collect();
        assert_eq!(lines.len(), 5);
        assert!(lines[0].starts_with('┌') && lines[0].ends_with('┐'));
        let widths: Vec<usize> = lines.iter().map(|l| l.chars().count()).collect();
        assert!(widths.iter().all(|w| *w == widths[0]));
    }

    #[test]
    fn test_widths_clamp_to_budget() {
        let mut table = Table::new(["ID", "Description"]);
        table.row(vec!["id-1".into(), "x".repeat(200).into()]);
        let widths = table.widths(60);
        assert!(widths.iter().sum::<usize>() + 1 + 3 * widths.len() <= 60);
        let text = table.render(60, &Style::plain());
        assert!(text.contains('…'));
        assert!(text.lines().all(|l| l.chars().count() <= 60));
    }
}
