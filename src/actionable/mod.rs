//! Actionable errors
//!
//! Every error shown to a user carries a type, the provider it concerns, a
//! message, and where possible a cause, numbered remediation steps, a
//! command that verifies the fix and a pointer to further help. The detected
//! environment is recorded so remediation can be tailored to CI or a
//! workstation.

pub mod display;
pub mod environment;
pub mod providers;

use serde::Serialize;
use std::fmt;

use crate::constants::{
    APP_NAME, EXIT_CONFIG, EXIT_GENERAL, EXIT_NO_INPUT, EXIT_NO_PERMISSION, EXIT_UNAVAILABLE,
};
use crate::error::{Error, ErrorKind};

pub use display::{display_error, render_plain, render_styled};
pub use environment::Environment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum ErrorType {
    Authentication,
    Configuration,
    Provider,
    FileSystem,
    Network,
    Permission,
    Validation,
}

impl ErrorType {
    pub fn as_str(self) -> &'static str {
        match self {
            ErrorType::Authentication => "Authentication",
            ErrorType::Configuration => "Configuration",
            ErrorType::Provider => "Provider",
            ErrorType::FileSystem => "FileSystem",
            ErrorType::Network => "Network",
            ErrorType::Permission => "Permission",
            ErrorType::Validation => "Validation",
        }
    }

    /// sysexits-style process exit code
    pub fn exit_code(self) -> i32 {
        match self {
            ErrorType::Authentication | ErrorType::Permission => EXIT_NO_PERMISSION,
            ErrorType::Configuration => EXIT_CONFIG,
            ErrorType::FileSystem => EXIT_NO_INPUT,
            ErrorType::Network => EXIT_UNAVAILABLE,
            ErrorType::Provider | ErrorType::Validation => EXIT_GENERAL,
        }
    }
}

impl fmt::Display for ErrorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Provider {
    Aws,
    Gcp,
    Kubernetes,
    Terraform,
    Unknown,
}

impl Provider {
    pub fn as_str(self) -> &'static str {
        match self {
            Provider::Aws => "AWS",
            Provider::Gcp => "GCP",
            Provider::Kubernetes => "Kubernetes",
            Provider::Terraform => "Terraform",
            Provider::Unknown => "Unknown",
        }
    }
}

impl fmt::Display for Provider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// User-facing error with remediation guidance
#[derive(Debug, Clone, PartialEq, Serialize, thiserror::Error)]
#[error("{message}")]
pub struct ActionableError {
    pub error_type: ErrorType,
    pub provider: Provider,
    pub message: String,
    pub cause: Option<String>,
    pub solutions: Vec<String>,
    pub verify: Option<String>,
    pub help: Option<String>,
    pub environment: Environment,
}

impl ActionableError {
    pub fn new(error_type: ErrorType, provider: Provider, message: impl Into<String>) -> Self {
        Self {
            error_type,
            provider,
            message: message.into(),
            cause: None,
            solutions: Vec::new(),
            verify: None,
            help: None,
            environment: Environment::detect(),
        }
    }

    pub fn with_cause(mut self, cause: impl Into<String>) -> Self {
        self.cause = Some(cause.into());
        self
    }

    /// Append remediation steps, keeping their order
    pub fn with_solutions<I, S>(mut self, solutions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.solutions.extend(solutions.into_iter().map(Into::into));
        self
    }

    pub fn with_verify(mut self, command: impl Into<String>) -> Self {
        self.verify = Some(command.into());
        self
    }

    pub fn with_help(mut self, help: impl Into<String>) -> Self {
        self.help = Some(help.into());
        self
    }

    pub fn with_environment(mut self, environment: Environment) -> Self {
        self.environment = environment;
        self
    }

    pub fn exit_code(&self) -> i32 {
        self.error_type.exit_code()
    }
}

impl From<&Error> for ActionableError {
    fn from(err: &Error) -> Self {
        match err {
            Error::Batch { first, failed, total, action } => {
                let inner = ActionableError::from(first.as_ref());
                let message = format!("failed to {} {} of {} items: {}", action, failed, total, inner.message);
                ActionableError { message, ..inner }
            }
            Error::Io { source, path, .. } if source.kind() == std::io::ErrorKind::PermissionDenied => {
                providers::permission(Provider::Unknown, &path.display().to_string())
                    .with_cause(err.to_string())
            }
            Error::NotFound { what, id } => {
                let list = match *what {
                    "baseline" => "baselines",
                    "drift report" => "reports",
                    _ => "snapshots",
                };
                ActionableError::new(ErrorType::FileSystem, Provider::Unknown, err.to_string())
                    .with_solutions([
                        format!("Check the {} id or name: {}", what, id),
                        format!("List what is stored: {} list {}", APP_NAME, list),
                        "Point at the right store with --base-dir".to_string(),
                    ])
                    .with_verify(format!("{} list {}", APP_NAME, list))
            }
            Error::FileTooLarge { .. } => {
                ActionableError::new(ErrorType::FileSystem, Provider::Unknown, "Document too large to load")
                    .with_cause(err.to_string())
                    .with_solutions([
                        format!("Stream the snapshot instead: {} show <id> --stream", APP_NAME),
                        "Split the inventory into several snapshots".to_string(),
                    ])
            }
            Error::Cancelled => {
                ActionableError::new(ErrorType::Provider, Provider::Unknown, "Operation cancelled")
            }
            _ => match err.kind() {
                ErrorKind::Validation => providers::validation(err.to_string()),
                ErrorKind::NotFound | ErrorKind::Io | ErrorKind::Integrity => {
                    let location = err
                        .path()
                        .map(|p| p.display().to_string())
                        .unwrap_or_else(|| "the store".to_string());
                    providers::filesystem(&location, &err.to_string())
                }
                ErrorKind::Cancelled | ErrorKind::Internal => {
                    ActionableError::new(ErrorType::Provider, Provider::Unknown, err.to_string())
                        .with_solutions(["Re-run with -vv and report the log output"])
                }
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Phase;
    use std::io;

    #[test]
    fn test_exit_codes() {
        assert_eq!(ErrorType::Authentication.exit_code(), 77);
        assert_eq!(ErrorType::Permission.exit_code(), 77);
        assert_eq!(ErrorType::Configuration.exit_code(), 78);
        assert_eq!(ErrorType::FileSystem.exit_code(), 66);
        assert_eq!(ErrorType::Network.exit_code(), 69);
        assert_eq!(ErrorType::Validation.exit_code(), 1);
        assert_eq!(ErrorType::Provider.exit_code(), 1);
    }

    #[test]
    fn test_builder_keeps_solution_order() {
        let err = ActionableError::new(ErrorType::Network, Provider::Aws, "unreachable")
            .with_solutions(["first", "second"])
            .with_solutions(["third"])
            .with_environment(Environment::Workstation);
        assert_eq!(err.solutions, vec!["first", "second", "third"]);
        assert_eq!(err.to_string(), "unreachable");
    }

    #[test]
    fn test_from_taxonomy() {
        let validation = ActionableError::from(&Error::validation("bad id"));
        assert_eq!(validation.error_type, ErrorType::Validation);

        let missing = ActionableError::from(&Error::NotFound {
            what: "snapshot",
            id: "snap-9".to_string(),
        });
        assert_eq!(missing.error_type, ErrorType::FileSystem);
        assert_eq!(missing.exit_code(), 66);

        let denied = ActionableError::from(&Error::io(
            Phase::WriteTemp,
            "/store/x.json",
            io::Error::new(io::ErrorKind::PermissionDenied, "denied"),
        ));
        assert_eq!(denied.error_type, ErrorType::Permission);

        let internal = ActionableError::from(&Error::Internal("boom".to_string()));
        assert_eq!(internal.error_type, ErrorType::Provider);
        assert_eq!(internal.provider, Provider::Unknown);
        assert_eq!(internal.exit_code(), 1);
    }

    #[test]
    fn test_batch_uses_first_error_type() {
        let err = Error::Batch {
            action: "save",
            failed: 2,
            total: 5,
            first: Box::new(Error::validation("duplicate resource id")),
        };
        let actionable = ActionableError::from(&err);
        assert_eq!(actionable.error_type, ErrorType::Validation);
        assert!(actionable.message.starts_with("failed to save 2 of 5 items"));
    }
}
