//! Unix diff style output
//!
//! Three flavours for drift reports: hunks (`--- / +++ / @@`), changed
//! resource names only, and per-resource change counts. A report without
//! changes renders as nothing at all so scripts can test for empty output.

use std::fmt::Write as _;

use super::style::Style;
use super::Formatter;
use crate::error::Result;
use crate::models::value::display_value;
use crate::models::{ChangeType, DriftReport, ResourceDiff};

use crossterm::style::Color;

const DEV_NULL: &str = "/dev/null";

fn resource_key(diff: &ResourceDiff) -> String {
    format!("{}/{}", diff.resource_type, diff.resource_id)
}

fn plural(count: usize, singular: &str) -> String {
    if count == 1 {
        singular.to_string()
    } else {
        format!("{}s", singular)
    }
}

/// `--- / +++ / @@` hunks per changed resource
#[derive(Debug, Clone, Copy)]
pub struct UnixFormatter {
    style: Style,
}

impl UnixFormatter {
    pub fn new(style: Style) -> Self {
        Self { style }
    }
}

impl Formatter for UnixFormatter {
    fn drift_report(&self, report: &DriftReport) -> Result<String> {
        let mut out = String::new();
        if report.resource_changes.is_empty() {
            return Ok(out);
        }

        for diff in &report.resource_changes {
            let key = resource_key(diff);
            let (old, new) = match diff.drift_type {
                ChangeType::Added => (DEV_NULL, key.as_str()),
                ChangeType::Removed => (key.as_str(), DEV_NULL),
                ChangeType::Modified | ChangeType::Moved => (key.as_str(), key.as_str()),
            };
            let _ = writeln!(out, "{}", self.style.bold(&format!("--- {}", old)));
            let _ = writeln!(out, "{}", self.style.bold(&format!("+++ {}", new)));

            for change in &diff.changes {
                let _ = writeln!(out, "{}", self.style.paint(&format!("@@ {} @@", change.path), Color::Cyan));
                if let Some(value) = &change.old_value {
                    let line = format!("-{}: {}", change.path, display_value(value));
                    let _ = writeln!(out, "{}", self.style.paint(&line, Color::Red));
                }
                if let Some(value) = &change.new_value {
                    let line = format!("+{}: {}", change.path, display_value(value));
                    let _ = writeln!(out, "{}", self.style.paint(&line, Color::Green));
                }
            }
            out.push('\n');
        }

        let s = &report.summary;
        let _ = writeln!(
            out,
            "{} additions, {} deletions, {} modifications",
            s.added_resources,
            s.removed_resources,
            s.modified_resources + s.moved_resources
        );
        Ok(out)
    }
}

/// One `type/id` line per changed resource
#[derive(Debug, Clone, Copy, Default)]
pub struct NameOnlyFormatter;

impl Formatter for NameOnlyFormatter {
    fn drift_report(&self, report: &DriftReport) -> Result<String> {
        let mut out = String::new();
        for diff in &report.resource_changes {
            out.push_str(&resource_key(diff));
            out.push('\n');
        }
        Ok(out)
    }
}

/// Per-resource change counts followed by a total line
#[derive(Debug, Clone, Copy, Default)]
pub struct StatFormatter;

impl Formatter for StatFormatter {
    fn drift_report(&self, report: &DriftReport) -> Result<String> {
        let mut out = String::new();
        if report.resource_changes.is_empty() {
            return Ok(out);
        }

        for diff in &report.resource_changes {
            let count = diff.changes.len();
            let _ = writeln!(out, " {} | {} {}", resource_key(diff), count, plural(count, "change"));
        }
        let resources = report.resource_changes.len();
        let changes = report.field_change_count();
        let _ = writeln!(
            out,
            " {} {} changed, {} {}",
            resources,
            plural(resources, "resource"),
            changes,
            plural(changes, "modification")
        );
        Ok(out)
    }
}
