use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Persisted metadata for one session, stored in `session_info.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionRecord {
    pub working_directory: PathBuf,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    /// Set for sessions created automatically for a process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_id: Option<u32>,
}

impl SessionRecord {
    pub fn new(working_directory: PathBuf, process_id: Option<u32>) -> Self {
        let now = Utc::now();
        Self {
            working_directory,
            created_at: now,
            last_accessed: now,
            process_id,
        }
    }

    pub fn touch(&mut self) {
        self.last_accessed = Utc::now();
    }
}

/// A session's metadata as reported to callers, with derived fields.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SessionInfo {
    pub id: String,
    /// Recorded directory, or the process's current directory when the
    /// recorded one no longer exists.
    pub working_directory: PathBuf,
    pub working_directory_valid: bool,
    pub created_at: DateTime<Utc>,
    pub last_accessed: DateTime<Utc>,
    pub process_id: Option<u32>,
    /// Number of entries in the session's history.
    pub command_count: usize,
}

/// Aggregate numbers across every known session.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SessionStats {
    pub total: usize,
    /// Sessions accessed within the last hour.
    pub active: usize,
    pub total_commands: usize,
    /// Id of the session with the earliest `created_at`.
    pub oldest: Option<String>,
    /// Id of the session with the latest `created_at`.
    pub newest: Option<String>,
}
