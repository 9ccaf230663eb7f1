//! Centralized error types for mboxpress.

use std::path::PathBuf;
use thiserror::Error;

/// All errors produced by the mboxpress library.
///
/// Per-message problems (missing `Date` header, multipart message with no
/// text part) are not errors: they are absorbed as silent skips inside the
/// normalizer. Only archive-level failures surface here.
#[derive(Error, Debug)]
pub enum ArchiveError {
    /// I/O error with the associated file path.
    #[error("I/O error reading '{path}': {source}")]
    Io {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The archive path does not exist.
    #[error("archive not found: {0}")]
    NotFound(PathBuf),

    /// The path exists but is not a valid mbox file or maildir container.
    #[error("unreadable archive '{path}': {reason}")]
    Unreadable { path: PathBuf, reason: String },
}

/// Convenience alias for `Result<T, ArchiveError>`.
pub type Result<T> = std::result::Result<T, ArchiveError>;

impl ArchiveError {
    /// Create an `Io` variant from a path and an `io::Error`.
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }

    /// Create an `Unreadable` variant from a path and a reason.
    pub fn unreadable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        Self::Unreadable {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
