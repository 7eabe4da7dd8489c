//! Core types and error definitions for termpilot.
//!
//! This crate provides the foundational types shared across all termpilot crates,
//! including error handling, the per-session execution context, and atomic
//! JSON storage used by every persisted table.
//!
//! # Main types
//!
//! - [`TermError`]: Unified error enum for storage and infrastructure faults.
//! - [`TermResult`]: Convenience alias for `Result<T, TermError>`.
//! - [`CommandError`]: Typed failure of a single executed command.
//! - [`CommandResult`]: Textual output or a [`CommandError`].
//! - [`ExecContext`]: Session id and working directory a command runs in.

/// Collaborator traits for interactive path selection and line editing.
pub mod picker;
/// Atomic, cross-process JSON file storage.
pub mod storage;

use std::io;
use std::path::{Path, PathBuf};

// --- Error types ---

/// Top-level error type for termpilot infrastructure.
///
/// Each variant corresponds to a subsystem that can produce errors.
#[derive(Debug, thiserror::Error)]
pub enum TermError {
    /// An error related to session persistence or lookup.
    #[error("Session error: {0}")]
    Session(String),

    /// An error from the resource lock table.
    #[error("Lock error: {0}")]
    Lock(String),

    /// An error in configuration parsing or validation.
    #[error("Config error: {0}")]
    Config(String),

    /// An error from an outbound HTTP request (e.g. LLM API call).
    #[error("HTTP error: {0}")]
    Http(String),

    /// An error from the natural-language resolver.
    #[error("Resolver error: {0}")]
    Resolver(String),

    /// A JSON serialization or deserialization error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// A standard I/O error.
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
}

/// A convenience `Result` alias using [`TermError`].
pub type TermResult<T> = Result<T, TermError>;

/// Failure of a single command. Rendered to the user as plain text; never fatal.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CommandError {
    /// The named path does not exist.
    #[error("{0} does not exist")]
    NotFound(String),

    /// The path exists but is not a regular file.
    #[error("{0} is not a file")]
    NotAFile(String),

    /// The path exists but is not a directory.
    #[error("{0} is not a directory")]
    NotADirectory(String),

    /// The OS refused access to the path.
    #[error("Permission denied: {0}")]
    PermissionDenied(String),

    /// The command did not finish within its time budget.
    #[error("Command timed out after {0}s")]
    TimedOut(u64),

    /// No builtin and no host program with that name.
    #[error("Command not found: {0}")]
    CommandNotFound(String),

    /// Another session holds a live lock on the path.
    #[error("Resource is being used by another session ({path}). Wait.")]
    Busy {
        /// The contended resource path.
        path: String,
    },

    /// Missing or malformed arguments.
    #[error("Usage: {0}")]
    Usage(String),

    /// Any other I/O failure.
    #[error("{0}")]
    Io(String),

    /// A host program exited unsuccessfully.
    #[error("exit code {code}: {stderr}")]
    Failed {
        /// Exit code, or -1 when terminated by a signal.
        code: i32,
        /// Captured standard error.
        stderr: String,
    },

    /// The user aborted an interactive step.
    #[error("{0}")]
    Cancelled(String),
}

impl CommandError {
    /// Map an I/O error on `path` to the closest typed variant.
    pub fn from_io(err: io::Error, path: impl AsRef<Path>) -> Self {
        let shown = path.as_ref().display().to_string();
        match err.kind() {
            io::ErrorKind::NotFound => CommandError::NotFound(shown),
            io::ErrorKind::PermissionDenied => CommandError::PermissionDenied(shown),
            _ => CommandError::Io(format!("{shown}: {err}")),
        }
    }

    /// Whether the error comes from lock contention and may succeed on retry.
    pub fn is_busy(&self) -> bool {
        matches!(self, CommandError::Busy { .. })
    }
}

/// Textual output of a command, or the typed reason it failed.
pub type CommandResult = Result<String, CommandError>;

// --- Execution context ---

/// The session a command runs on behalf of, and that session's working directory.
///
/// Builtins resolve relative paths against [`ExecContext::cwd`] rather than the
/// process-global directory; `cd` mutates it in place.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExecContext {
    /// Session id used as the lock holder identity.
    pub session_id: String,
    /// Absolute working directory of the session.
    pub cwd: PathBuf,
}

impl ExecContext {
    /// Creates a context for `session_id` rooted at `cwd`.
    pub fn new(session_id: impl Into<String>, cwd: impl Into<PathBuf>) -> Self {
        Self {
            session_id: session_id.into(),
            cwd: cwd.into(),
        }
    }

    /// Joins `raw` onto the working directory unless it is already absolute.
    pub fn resolve(&self, raw: impl AsRef<Path>) -> PathBuf {
        let raw = raw.as_ref();
        if raw.is_absolute() {
            raw.to_path_buf()
        } else {
            self.cwd.join(raw)
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_busy_message_mentions_other_session() {
        let err = CommandError::Busy {
            path: "/tmp/x".to_string(),
        };
        let text = err.to_string();
        assert!(text.contains("being used by another session"));
        assert!(text.contains("/tmp/x"));
        assert!(err.is_busy());
    }

    #[test]
    fn test_from_io_maps_kinds() {
        let nf = io::Error::new(io::ErrorKind::NotFound, "gone");
        assert_eq!(
            CommandError::from_io(nf, "a.txt"),
            CommandError::NotFound("a.txt".to_string())
        );

        let pd = io::Error::new(io::ErrorKind::PermissionDenied, "nope");
        assert_eq!(
            CommandError::from_io(pd, "/root/x"),
            CommandError::PermissionDenied("/root/x".to_string())
        );

        let other = io::Error::new(io::ErrorKind::Other, "disk on fire");
        let mapped = CommandError::from_io(other, "b");
        assert!(matches!(mapped, CommandError::Io(ref m) if m.contains("disk on fire")));
    }

    #[test]
    fn test_context_resolve() {
        let ctx = ExecContext::new("s1", "/home/user");
        assert_eq!(ctx.resolve("notes.txt"), PathBuf::from("/home/user/notes.txt"));
        assert_eq!(ctx.resolve("/etc/hosts"), PathBuf::from("/etc/hosts"));
    }
}
