use parking_lot::Mutex;
use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::{Path, PathBuf};
use std::time::SystemTime;
use termpilot_core::storage::AtomicJsonFile;
use termpilot_core::TermResult;
use termpilot_security::Sanitizer;
use tracing::debug;

// ---------------------------------------------------------------------------
// HistoryStore
// ---------------------------------------------------------------------------

/// Ordered command log per session, one JSON array per file in `sessions/`.
///
/// Appends are locked read-modify-writes so concurrent processes sharing a
/// session never drop each other's entries.
pub struct HistoryStore {
    dir: PathBuf,
    cache: Mutex<Option<CommandCache>>,
}

struct CommandCache {
    dir_modified: Option<SystemTime>,
    commands: Vec<String>,
}

impl HistoryStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            cache: Mutex::new(None),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn file(&self, session_id: &str) -> AtomicJsonFile<Vec<String>> {
        AtomicJsonFile::new(self.path_of(session_id))
    }

    pub fn path_of(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{session_id}.json"))
    }

    pub fn exists(&self, session_id: &str) -> bool {
        self.path_of(session_id).is_file()
    }

    /// Create an empty history for `session_id` unless one already exists.
    pub fn init(&self, session_id: &str) -> TermResult<()> {
        if !self.exists(session_id) {
            self.file(session_id).save(&Vec::new())?;
            self.invalidate();
        }
        Ok(())
    }

    /// Append `command` unless it equals the last recorded entry.
    /// Returns whether an entry was written.
    pub fn append(&self, session_id: &str, command: &str) -> TermResult<bool> {
        let appended = self.file(session_id).update(|history| {
            if history.last().map(String::as_str) == Some(command) {
                false
            } else {
                history.push(command.to_string());
                true
            }
        })?;
        self.invalidate();
        Ok(appended)
    }

    /// Full history, oldest first. Missing or corrupt storage reads as empty.
    pub fn load(&self, session_id: &str) -> Vec<String> {
        self.file(session_id).load_or_default()
    }

    /// The last `limit` entries, oldest first.
    pub fn recent(&self, session_id: &str, limit: usize) -> Vec<String> {
        let history = self.load(session_id);
        let skip = history.len().saturating_sub(limit);
        history.into_iter().skip(skip).collect()
    }

    pub fn remove(&self, session_id: &str) -> TermResult<()> {
        let path = self.path_of(session_id);
        if path.exists() {
            fs::remove_file(&path)?;
        }
        let _ = fs::remove_file(path.with_extension("lock"));
        self.invalidate();
        Ok(())
    }

    /// Ids of every session that has a history file, sorted.
    pub fn session_ids(&self) -> TermResult<Vec<String>> {
        if !self.dir.exists() {
            return Ok(Vec::new());
        }
        let mut ids = Vec::new();
        for entry in fs::read_dir(&self.dir)? {
            let entry = entry?;
            if let Some(name) = entry.file_name().to_str() {
                if let Some(stem) = name.strip_suffix(".json") {
                    if Sanitizer::is_valid_session_id(stem) {
                        ids.push(stem.to_string());
                    }
                }
            }
        }
        ids.sort();
        Ok(ids)
    }

    /// Every distinct command across all sessions, sorted.
    ///
    /// Cached until the sessions directory's modification time advances or a
    /// command is appended through this store.
    pub fn all_commands(&self) -> Vec<String> {
        let dir_modified = fs::metadata(&self.dir).and_then(|m| m.modified()).ok();

        let mut cache = self.cache.lock();
        if let Some(cached) = cache.as_ref() {
            if dir_modified <= cached.dir_modified {
                return cached.commands.clone();
            }
        }

        let mut unique = BTreeSet::new();
        for id in self.session_ids().unwrap_or_default() {
            unique.extend(self.load(&id));
        }
        let commands: Vec<String> = unique.into_iter().collect();
        debug!(count = commands.len(), "Rebuilt command cache");

        *cache = Some(CommandCache {
            dir_modified,
            commands: commands.clone(),
        });
        commands
    }

    /// Number of distinct commands per base command (first word).
    pub fn command_stats(&self) -> BTreeMap<String, usize> {
        let mut stats = BTreeMap::new();
        for command in self.all_commands() {
            if let Some(base) = command.split_whitespace().next() {
                *stats.entry(base.to_string()).or_insert(0) += 1;
            }
        }
        stats
    }

    fn invalidate(&self) {
        *self.cache.lock() = None;
    }
}
