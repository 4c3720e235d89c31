//! Plain and styled rendering of actionable errors

use crossterm::style::Color;
use std::fmt::Write as _;
use std::io::{IsTerminal, Write};

use super::{ActionableError, ErrorType};
use crate::output::Style;

fn type_color(error_type: ErrorType) -> Color {
    match error_type {
        ErrorType::Authentication | ErrorType::Permission => Color::Red,
        ErrorType::Configuration | ErrorType::Validation => Color::Yellow,
        ErrorType::Provider => Color::Magenta,
        ErrorType::FileSystem => Color::Blue,
        ErrorType::Network => Color::Cyan,
    }
}

/// Uncoloured rendering for logs and CI
///
/// The second line is `Type: <type>/<provider>` so log scrapers can pick
/// errors out of build output.
pub fn render_plain(err: &ActionableError) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "Error: {}", err.message);
    let _ = writeln!(out, "Type: {}/{}", err.error_type, err.provider);
    if let Some(cause) = &err.cause {
        let _ = writeln!(out, "Cause: {}", cause);
    }
    let _ = writeln!(out, "Environment: {}", err.environment);

    if !err.solutions.is_empty() {
        out.push_str("\nSolutions:\n");
        for (i, solution) in err.solutions.iter().enumerate() {
            let _ = writeln!(out, "  {}. {}", i + 1, solution);
        }
    }
    if let Some(verify) = &err.verify {
        let _ = writeln!(out, "\nVerify: {}", verify);
    }
    if let Some(help) = &err.help {
        let _ = writeln!(out, "Help: {}", help);
    }
    out
}

/// Coloured rendering for terminals; degrades to uncoloured text when the
/// style is disabled
pub fn render_styled(err: &ActionableError, style: &Style) -> String {
    let mut out = String::new();
    let _ = writeln!(
        out,
        "\n{}",
        style.bold(&style.paint(&err.message, type_color(err.error_type)))
    );
    if let Some(cause) = &err.cause {
        let _ = writeln!(
            out,
            "   {} {}",
            style.paint("Cause:", Color::Yellow),
            style.paint(cause, Color::DarkGrey)
        );
    }
    let _ = writeln!(
        out,
        "   {} {}",
        style.paint("Environment:", Color::Cyan),
        style.paint(err.environment.as_str(), Color::DarkGrey)
    );

    if !err.solutions.is_empty() {
        let _ = writeln!(out, "\n   {}", style.paint("Solutions:", Color::Green));
        for (i, solution) in err.solutions.iter().enumerate() {
            let _ = writeln!(
                out,
                "   {} {}",
                style.paint(&format!("{}.", i + 1), Color::DarkGrey),
                solution
            );
        }
    }
    if let Some(verify) = &err.verify {
        let _ = writeln!(
            out,
            "\n   {} {}",
            style.paint("Verify:", Color::Blue),
            style.paint(verify, Color::White)
        );
    }
    if let Some(help) = &err.help {
        let _ = writeln!(
            out,
            "   {} {}",
            style.paint("Help:", Color::Magenta),
            style.paint(help, Color::White)
        );
    }
    out
}

/// Print `err` to stderr: styled on a terminal, plain otherwise
pub fn display_error(err: &ActionableError, no_color: bool) {
    let stderr = std::io::stderr();
    let text = if stderr.is_terminal() {
        render_styled(err, &Style::new(no_color))
    } else {
        render_plain(err)
    };
    let mut handle = stderr.lock();
    let _ = handle.write_all(text.as_bytes());
    let _ = handle.flush();
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actionable::{Environment, Provider};

    fn sample() -> ActionableError {
        ActionableError::new(ErrorType::Configuration, Provider::Aws, "AWS region not specified")
            .with_cause("no region in profile")
            .with_solutions(["export AWS_REGION=us-east-1", "aws configure set region us-east-1"])
            .with_verify("aws configure get region")
            .with_help("vaino configure aws")
            .with_environment(Environment::Ci)
    }

    #[test]
    fn test_plain_rendering() {
        let text = render_plain(&sample());
        let expected = "Error: AWS region not specified\n\
                        Type: Configuration/AWS\n\
                        Cause: no region in profile\n\
                        Environment: CI/CD\n\
                        \n\
                        Solutions:\n  \
                        1. export AWS_REGION=us-east-1\n  \
                        2. aws configure set region us-east-1\n\
                        \n\
                        Verify: aws configure get region\n\
                        Help: vaino configure aws\n";
        assert_eq!(text, expected);
    }

    #[test]
    fn test_styled_without_colour_has_no_escapes() {
        let text = render_styled(&sample(), &Style::plain());
        assert!(!text.contains('\u{1b}'));
        assert!(text.contains("   1. export AWS_REGION=us-east-1"));
        assert!(text.contains("Verify: aws configure get region"));
    }
}
