//! Interactive collaborators used when a command is missing its path
//! arguments or needs the user to type file contents.
//!
//! These traits live in `termpilot-core` so the executor (which calls them) and
//! the CLI (which wires up the terminal-backed implementations) can share them.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// What the picker is being asked to produce.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PickRequest {
    /// A new file or folder to create.
    Create {
        /// `true` for a folder, `false` for a file.
        is_dir: bool,
    },
    /// An existing file or folder to operate on.
    Select {
        /// Prompt shown to the user.
        prompt: String,
    },
    /// Where to copy or move `source` to.
    Destination {
        /// The already-selected source.
        source: PathBuf,
        /// `"copy"` or `"move"`.
        operation: String,
    },
}

/// Result of a pick: `(success, resolved_path, message)`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PickOutcome {
    pub success: bool,
    pub path: Option<PathBuf>,
    pub message: String,
}

impl PickOutcome {
    pub fn picked(path: impl Into<PathBuf>, message: impl Into<String>) -> Self {
        Self {
            success: true,
            path: Some(path.into()),
            message: message.into(),
        }
    }

    pub fn cancelled(message: impl Into<String>) -> Self {
        Self {
            success: false,
            path: None,
            message: message.into(),
        }
    }

    /// The path, only when the pick succeeded.
    pub fn resolved(&self) -> Option<&Path> {
        if self.success {
            self.path.as_deref()
        } else {
            None
        }
    }
}

/// Resolves a path interactively (dialog, textual browser, scripted answers).
#[async_trait]
pub trait PathPicker: Send + Sync {
    /// `cwd` is the session's working directory, used as the starting point.
    async fn pick(&self, request: PickRequest, cwd: &Path) -> PickOutcome;
}

/// Collects replacement contents for a file being edited.
#[async_trait]
pub trait LineEditor: Send + Sync {
    /// Returns the new lines, or `None` if the user aborted the edit.
    async fn edit(&self, path: &Path, current: &str) -> Option<Vec<String>>;
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_resolved_only_on_success() {
        let ok = PickOutcome::picked("/tmp/a", "picked");
        assert_eq!(ok.resolved(), Some(Path::new("/tmp/a")));

        let mut odd = PickOutcome::cancelled("nothing chosen");
        odd.path = Some("/tmp/b".into());
        assert!(odd.resolved().is_none());
    }

    #[test]
    fn test_request_serializes_tagged() {
        let json = serde_json::to_value(PickRequest::Create { is_dir: true }).unwrap();
        assert_eq!(json["kind"], "create");
        assert_eq!(json["is_dir"], true);
    }
}
