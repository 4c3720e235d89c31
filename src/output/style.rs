//! Terminal colours and width
//!
//! `NO_COLOR` is consulted every time colour is decided, never cached.

use crossterm::style::{Color, Stylize};
use std::io::IsTerminal;

use crate::constants::MIN_MAX_WIDTH;
use crate::models::{ChangeType, Severity};

/// Whether coloured output is allowed given the config flag and `NO_COLOR`
pub fn color_enabled(no_color: bool) -> bool {
    if no_color {
        return false;
    }
    std::env::var_os("NO_COLOR").map_or(true, |v| v.is_empty())
}

/// Palette applied to rendered text; a disabled style passes text through
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Style {
    enabled: bool,
}

impl Style {
    pub fn new(no_color: bool) -> Self {
        Self {
            enabled: color_enabled(no_color),
        }
    }

    pub fn plain() -> Self {
        Self { enabled: false }
    }

    pub fn is_enabled(&self) -> bool {
        self.enabled
    }

    pub fn paint(&self, text: &str, color: Color) -> String {
        if self.enabled {
            text.with(color).to_string()
        } else {
            text.to_string()
        }
    }

    pub fn bold(&self, text: &str) -> String {
        if self.enabled {
            text.bold().to_string()
        } else {
            text.to_string()
        }
    }

    pub fn severity(&self, text: &str, severity: Severity) -> String {
        self.paint(text, severity_color(severity))
    }
}

pub fn severity_color(severity: Severity) -> Color {
    match severity {
        Severity::Critical => Color::Red,
        Severity::High => Color::Yellow,
        Severity::Medium => Color::Blue,
        Severity::Low => Color::Green,
    }
}

pub fn change_color(kind: ChangeType) -> Color {
    match kind {
        ChangeType::Added => Color::Green,
        ChangeType::Removed => Color::Red,
        ChangeType::Modified => Color::Yellow,
        ChangeType::Moved => Color::Cyan,
    }
}

/// Usable output width: the terminal width when stdout is a terminal,
/// never more than `max_width` and never less than the minimum
pub fn output_width(max_width: usize) -> usize {
    let width = if std::io::stdout().is_terminal() {
        crossterm::terminal::size()
            .map(|(cols, _)| cols as usize)
            .unwrap_or(max_width)
            .min(max_width)
    } else {
        max_width
    };
    width.max(MIN_MAX_WIDTH)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plain_style_passes_text_through() {
        let style = Style::plain();
        assert_eq!(style.paint("x", Color::Red), "x");
        assert_eq!(style.bold("x"), "x");
        assert!(!Style::new(true).is_enabled());
    }

    #[test]
    fn test_output_width_never_below_minimum() {
        assert!(output_width(10) >= MIN_MAX_WIDTH);
    }
}
