//! Error taxonomy for the store, differ and output layers
//!
//! Every low-level failure is converted into one of six kinds at the
//! component boundary:
//! - Validation: bad identifier, invalid snapshot, unsupported format
//! - NotFound: missing document, no backup to recover from
//! - Io: disk error, rename failure, size cap exceeded
//! - Integrity: hash mismatch after write
//! - Cancelled: cancellation token fired
//! - Internal: encoding failures and broken invariants

use serde::Serialize;
use std::fmt;
use std::path::PathBuf;

/// Result alias used throughout the library
pub type Result<T> = std::result::Result<T, Error>;

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Validation,
    NotFound,
    Io,
    Integrity,
    Cancelled,
    Internal,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            ErrorKind::Validation => "validation",
            ErrorKind::NotFound => "not_found",
            ErrorKind::Io => "io",
            ErrorKind::Integrity => "integrity",
            ErrorKind::Cancelled => "cancelled",
            ErrorKind::Internal => "internal",
        };
        f.write_str(name)
    }
}

/// Phase of an I/O operation, named in error messages
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    CreateDir,
    Backup,
    WriteTemp,
    Sync,
    Verify,
    Rename,
    Read,
    Stat,
    List,
    Remove,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::CreateDir => "create directory",
            Phase::Backup => "backup",
            Phase::WriteTemp => "write temp file",
            Phase::Sync => "sync",
            Phase::Verify => "verify",
            Phase::Rename => "rename",
            Phase::Read => "read",
            Phase::Stat => "stat",
            Phase::List => "list directory",
            Phase::Remove => "remove",
        };
        f.write_str(name)
    }
}

/// Library error
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("validation failed: {message}")]
    Validation { message: String },

    #[error("{what} not found: {id}")]
    NotFound { what: &'static str, id: String },

    #[error("{phase} failed for {}: {source}", path.display())]
    Io {
        phase: Phase,
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("{} is {size} bytes, exceeding the {limit} byte limit", path.display())]
    FileTooLarge { path: PathBuf, size: u64, limit: u64 },

    #[error("integrity check failed for {}: expected sha256 {expected}, found {actual}", path.display())]
    Integrity {
        path: PathBuf,
        expected: String,
        actual: String,
    },

    #[error("operation cancelled")]
    Cancelled,

    #[error("failed to decode {}: {source}", path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("failed to {action} {failed} of {total}: {first}")]
    Batch {
        action: &'static str,
        failed: usize,
        total: usize,
        first: Box<Error>,
    },

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Build a validation error from any displayable message
    pub fn validation(message: impl Into<String>) -> Self {
        Error::Validation {
            message: message.into(),
        }
    }

    /// Build an I/O error for the given phase and path
    pub fn io(phase: Phase, path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Error::Io {
            phase,
            path: path.into(),
            source,
        }
    }

    /// Taxonomy kind of this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Validation { .. } => ErrorKind::Validation,
            Error::NotFound { .. } => ErrorKind::NotFound,
            Error::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound => {
                ErrorKind::NotFound
            }
            Error::Io { .. } | Error::FileTooLarge { .. } => ErrorKind::Io,
            Error::Integrity { .. } => ErrorKind::Integrity,
            Error::Cancelled => ErrorKind::Cancelled,
            // A document that cannot be decoded is treated as invalid input
            Error::Decode { .. } => ErrorKind::Validation,
            Error::Batch { first, .. } => first.kind(),
            Error::Internal(_) => ErrorKind::Internal,
        }
    }

    /// Path involved in the failure, when there is one
    pub fn path(&self) -> Option<&std::path::Path> {
        match self {
            Error::Io { path, .. }
            | Error::FileTooLarge { path, .. }
            | Error::Integrity { path, .. }
            | Error::Decode { path, .. } => Some(path),
            Error::Batch { first, .. } => first.path(),
            _ => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }

    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }
}

impl From<serde_json::Error> for Error {
    fn from(err: serde_json::Error) -> Self {
        Error::Internal(format!("json encoding failed: {}", err))
    }
}
