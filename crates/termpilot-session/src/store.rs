use crate::history::HistoryStore;
use crate::session::{SessionInfo, SessionRecord, SessionStats};
use chrono::{DateTime, Duration, Utc};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use termpilot_core::storage::{write_atomic, AtomicJsonFile};
use termpilot_core::{TermError, TermResult};
use termpilot_security::Sanitizer;
use tracing::{debug, info, warn};

type SessionTable = BTreeMap<String, SessionRecord>;

const SESSION_INFO_FILE: &str = "session_info.json";
const CURRENT_SESSION_FILE: &str = "current_session.txt";

/// File-based session store shared by every termpilot process using the same
/// data directory.
///
/// Layout under `data_dir`:
/// - `sessions/<id>.json`: command history (see [`HistoryStore`])
/// - `session_info.json`: metadata for every session
/// - `current_session.txt`: the globally current session
/// - `process_<pid>_session.txt`: which session a running process is bound to
pub struct FileSessionStore {
    data_dir: PathBuf,
    info: AtomicJsonFile<SessionTable>,
    history: HistoryStore,
    sync_process_cwd: bool,
}

impl FileSessionStore {
    pub fn new(data_dir: impl Into<PathBuf>) -> TermResult<Self> {
        let data_dir = data_dir.into();
        let sessions_dir = data_dir.join("sessions");
        fs::create_dir_all(&sessions_dir)?;
        Ok(Self {
            info: AtomicJsonFile::new(data_dir.join(SESSION_INFO_FILE)),
            history: HistoryStore::new(sessions_dir),
            data_dir,
            sync_process_cwd: true,
        })
    }

    /// Keep [`switch`](Self::switch) from changing the process working
    /// directory. For embedding the store in a host that manages its own cwd.
    pub fn without_process_chdir(mut self) -> Self {
        self.sync_process_cwd = false;
        self
    }

    pub fn data_dir(&self) -> &Path {
        &self.data_dir
    }

    pub fn history(&self) -> &HistoryStore {
        &self.history
    }

    fn binding_path(&self, process_id: u32) -> PathBuf {
        self.data_dir.join(format!("process_{process_id}_session.txt"))
    }

    /// Session bound to `process_id`, creating and binding a new one on first use.
    pub fn get_current(&self, process_id: u32) -> TermResult<String> {
        let binding = self.binding_path(process_id);
        if let Ok(raw) = fs::read_to_string(&binding) {
            let id = raw.trim();
            if Sanitizer::is_valid_session_id(id) {
                self.ensure_record(id, Some(process_id))?;
                return Ok(id.to_string());
            }
            warn!(path = %binding.display(), "Ignoring malformed process binding");
        }

        let id = format!("session_{process_id}_{}", Utc::now().timestamp());
        self.ensure_record(&id, Some(process_id))?;
        write_atomic(&binding, id.as_bytes())?;
        info!(session = %id, pid = process_id, "Created session for process");
        Ok(id)
    }

    fn ensure_record(&self, id: &str, process_id: Option<u32>) -> TermResult<()> {
        self.history.init(id)?;
        let cwd = process_cwd();
        self.info.update(|table| {
            table
                .entry(id.to_string())
                .or_insert_with(|| SessionRecord::new(cwd, process_id));
        })
    }

    /// Allocate the next free `session_N` and make it the globally current session.
    pub fn create_new(&self) -> TermResult<String> {
        let _lock = self.info.lock()?;
        let mut table = self.info.load_or_default();
        let existing = self.history.session_ids()?;

        let mut n = existing.len() + 1;
        let id = loop {
            let candidate = format!("session_{n}");
            if !existing.contains(&candidate) && !table.contains_key(&candidate) {
                break candidate;
            }
            n += 1;
        };

        self.history.init(&id)?;
        table.insert(id.clone(), SessionRecord::new(process_cwd(), None));
        self.info.save(&table)?;
        self.set_current(&id)?;
        info!(session = %id, "Created new session");
        Ok(id)
    }

    /// Every session id with a history file, sorted.
    pub fn list(&self) -> TermResult<Vec<String>> {
        self.history.session_ids()
    }

    /// Metadata plus derived fields. The working directory is revalidated:
    /// if it no longer exists the reported directory falls back to the
    /// process's current directory and `working_directory_valid` is false.
    pub fn get_details(&self, id: &str) -> TermResult<Option<SessionInfo>> {
        let table = self.info.load_or_default();
        let Some(record) = table.get(id) else {
            return Ok(None);
        };

        let valid = record.working_directory.is_dir();
        let working_directory = if valid {
            record.working_directory.clone()
        } else {
            process_cwd()
        };

        Ok(Some(SessionInfo {
            id: id.to_string(),
            working_directory,
            working_directory_valid: valid,
            created_at: record.created_at,
            last_accessed: record.last_accessed,
            process_id: record.process_id,
            command_count: self.history.load(id).len(),
        }))
    }

    /// Make `id` current. Returns `false` (and changes nothing) if the session
    /// does not exist. Moving the process into the session's directory is
    /// best-effort.
    pub fn switch(&self, id: &str) -> TermResult<bool> {
        if !Sanitizer::is_valid_session_id(id) || !self.history.exists(id) {
            return Ok(false);
        }

        self.info.update(|table| {
            if let Some(record) = table.get_mut(id) {
                record.touch();
            }
        })?;

        if self.sync_process_cwd {
            if let Some(details) = self.get_details(id)? {
                if details.working_directory_valid {
                    if let Err(e) = std::env::set_current_dir(&details.working_directory) {
                        debug!(dir = %details.working_directory.display(), error = %e, "Could not enter session directory");
                    }
                }
            }
        }

        self.set_current(id)?;
        info!(session = %id, "Switched session");
        Ok(true)
    }

    /// Record a new working directory for `id`. Unknown ids are ignored.
    pub fn update_working_directory(&self, id: &str, dir: &Path) -> TermResult<()> {
        self.info.update(|table| {
            if let Some(record) = table.get_mut(id) {
                record.working_directory = dir.to_path_buf();
                record.touch();
            }
        })
    }

    /// Mark `id` as used now, keeping it clear of the expiry sweep.
    /// Unknown ids are ignored.
    pub fn touch(&self, id: &str) -> TermResult<()> {
        self.info.update(|table| {
            if let Some(record) = table.get_mut(id) {
                record.touch();
            }
        })
    }

    /// Recorded working directory, or the process's current directory.
    pub fn working_directory(&self, id: &str) -> PathBuf {
        self.info
            .load_or_default()
            .get(id)
            .map(|r| r.working_directory.clone())
            .unwrap_or_else(process_cwd)
    }

    /// Remove sessions not accessed for `max_age_days`. Returns how many.
    pub fn cleanup_expired(&self, max_age_days: u32) -> TermResult<usize> {
        self.cleanup_expired_at(Utc::now(), max_age_days)
    }

    /// [`cleanup_expired`](Self::cleanup_expired) with an explicit clock.
    pub fn cleanup_expired_at(&self, now: DateTime<Utc>, max_age_days: u32) -> TermResult<usize> {
        let cutoff = now - Duration::days(i64::from(max_age_days));

        let _lock = self.info.lock()?;
        let mut table = self.info.load_or_default();
        let expired: Vec<String> = table
            .iter()
            .filter(|(_, record)| record.last_accessed < cutoff)
            .map(|(id, _)| id.clone())
            .collect();

        for id in &expired {
            self.history.remove(id)?;
            table.remove(id);
        }
        if !expired.is_empty() {
            self.info.save(&table)?;
            info!(removed = expired.len(), max_age_days, "Cleaned up expired sessions");
        }
        Ok(expired.len())
    }

    pub fn stats(&self) -> TermResult<SessionStats> {
        self.stats_at(Utc::now())
    }

    /// [`stats`](Self::stats) with an explicit clock.
    pub fn stats_at(&self, now: DateTime<Utc>) -> TermResult<SessionStats> {
        let table = self.info.load_or_default();
        let active_since = now - Duration::hours(1);

        let mut stats = SessionStats {
            total: table.len(),
            ..SessionStats::default()
        };
        for (id, record) in &table {
            stats.total_commands += self.history.load(id).len();
            if record.last_accessed > active_since {
                stats.active += 1;
            }
        }
        stats.oldest = table
            .iter()
            .min_by_key(|(_, r)| r.created_at)
            .map(|(id, _)| id.clone());
        stats.newest = table
            .iter()
            .max_by_key(|(_, r)| r.created_at)
            .map(|(id, _)| id.clone());
        Ok(stats)
    }

    /// Remove the process binding on shutdown. Never fails.
    pub fn cleanup_process_binding(&self, process_id: u32) {
        let binding = self.binding_path(process_id);
        match fs::remove_file(&binding) {
            Ok(()) => debug!(pid = process_id, "Removed process binding"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => debug!(pid = process_id, error = %e, "Could not remove process binding"),
        }
    }

    /// The globally current session, as last set by `create_new` or `switch`.
    pub fn current_session(&self) -> Option<String> {
        fs::read_to_string(self.data_dir.join(CURRENT_SESSION_FILE))
            .ok()
            .map(|s| s.trim().to_string())
            .filter(|s| Sanitizer::is_valid_session_id(s))
    }

    fn set_current(&self, id: &str) -> TermResult<()> {
        write_atomic(&self.data_dir.join(CURRENT_SESSION_FILE), id.as_bytes())
    }

    /// Session id from user input, rejected early if it cannot name a file.
    pub fn validate_id(id: &str) -> TermResult<&str> {
        if Sanitizer::is_valid_session_id(id) {
            Ok(id)
        } else {
            Err(TermError::Session(format!("Invalid session id '{id}'")))
        }
    }
}

fn process_cwd() -> PathBuf {
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("/"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn store() -> (TempDir, FileSessionStore) {
        let dir = TempDir::new().unwrap();
        let store = FileSessionStore::new(dir.path().join("data"))
            .unwrap()
            .without_process_chdir();
        (dir, store)
    }

    #[test]
    fn test_get_current_is_stable_per_process() {
        let (_dir, store) = store();
        let first = store.get_current(4242).unwrap();
        let again = store.get_current(4242).unwrap();
        let other = store.get_current(4343).unwrap();

        assert_eq!(first, again);
        assert_ne!(first, other);
        assert!(first.starts_with("session_4242_"));
        assert_eq!(store.list().unwrap().len(), 2);

        let details = store.get_details(&first).unwrap().unwrap();
        assert_eq!(details.process_id, Some(4242));
        assert_eq!(details.command_count, 0);
    }

    #[test]
    fn test_get_current_recreates_missing_record() {
        let (_dir, store) = store();
        let id = store.get_current(7).unwrap();
        fs::remove_file(store.data_dir().join(SESSION_INFO_FILE)).unwrap();

        assert_eq!(store.get_current(7).unwrap(), id);
        assert!(store.get_details(&id).unwrap().is_some());
    }

    #[test]
    fn test_create_new_is_sequential_and_sets_current() {
        let (_dir, store) = store();
        assert_eq!(store.create_new().unwrap(), "session_1");
        assert_eq!(store.create_new().unwrap(), "session_2");
        assert_eq!(store.current_session().as_deref(), Some("session_2"));
        assert_eq!(store.list().unwrap(), vec!["session_1", "session_2"]);
    }

    #[test]
    fn test_create_new_skips_taken_ids() {
        let (_dir, store) = store();
        store.create_new().unwrap();
        store.create_new().unwrap();
        store.history().remove("session_1").unwrap();

        // One history file left, so N starts at 2, which is taken.
        let id = store.create_new().unwrap();
        assert_eq!(id, "session_3");
    }

    #[test]
    fn test_switch_unknown_leaves_current_unchanged() {
        let (_dir, store) = store();
        store.create_new().unwrap();
        assert!(!store.switch("session_99").unwrap());
        assert!(!store.switch("../escape").unwrap());
        assert_eq!(store.current_session().as_deref(), Some("session_1"));
    }

    #[test]
    fn test_switch_updates_pointer_and_access_time() {
        let (_dir, store) = store();
        store.create_new().unwrap();
        store.create_new().unwrap();
        let before = store.get_details("session_1").unwrap().unwrap().last_accessed;

        assert!(store.switch("session_1").unwrap());
        assert_eq!(store.current_session().as_deref(), Some("session_1"));
        let after = store.get_details("session_1").unwrap().unwrap().last_accessed;
        assert!(after >= before);
    }

    #[test]
    fn test_details_revalidate_working_directory() {
        let (dir, store) = store();
        let id = store.create_new().unwrap();
        let gone = dir.path().join("gone");
        fs::create_dir(&gone).unwrap();
        store.update_working_directory(&id, &gone).unwrap();

        let details = store.get_details(&id).unwrap().unwrap();
        assert!(details.working_directory_valid);
        assert_eq!(details.working_directory, gone);

        fs::remove_dir(&gone).unwrap();
        let details = store.get_details(&id).unwrap().unwrap();
        assert!(!details.working_directory_valid);
        assert_ne!(details.working_directory, gone);
        // The reset is reported, not persisted.
        assert_eq!(store.working_directory(&id), gone);
    }

    #[test]
    fn test_details_unknown_is_none() {
        let (_dir, store) = store();
        assert!(store.get_details("session_404").unwrap().is_none());
    }

    #[test]
    fn test_command_count_tracks_history() {
        let (_dir, store) = store();
        let id = store.create_new().unwrap();
        store.history().append(&id, "ls").unwrap();
        store.history().append(&id, "pwd").unwrap();
        assert_eq!(store.get_details(&id).unwrap().unwrap().command_count, 2);
    }

    #[test]
    fn test_cleanup_expired_removes_only_old_sessions() {
        let (_dir, store) = store();
        let old = store.create_new().unwrap();
        let fresh = store.create_new().unwrap();

        let later = Utc::now() + Duration::days(31);
        // Make `fresh` look recently used at `later`.
        store
            .info
            .update(|t| t.get_mut(&fresh).unwrap().last_accessed = later)
            .unwrap();

        assert_eq!(store.cleanup_expired_at(later, 30).unwrap(), 1);
        assert_eq!(store.list().unwrap(), vec![fresh.clone()]);
        assert!(store.get_details(&old).unwrap().is_none());
        assert_eq!(store.cleanup_expired_at(later, 30).unwrap(), 0);
    }

    #[test]
    fn test_touch_refreshes_last_accessed() {
        let (_dir, store) = store();
        let id = store.create_new().unwrap();
        let long_ago = Utc::now() - Duration::days(40);
        store
            .info
            .update(|t| t.get_mut(&id).unwrap().last_accessed = long_ago)
            .unwrap();

        store.touch(&id).unwrap();
        store.touch("ghost").unwrap();

        let details = store.get_details(&id).unwrap().unwrap();
        assert!(details.last_accessed > long_ago);
        assert_eq!(store.cleanup_expired(30).unwrap(), 0);
        assert!(store.get_details("ghost").unwrap().is_none());
    }

    #[test]
    fn test_stats() {
        let (_dir, store) = store();
        assert_eq!(store.stats().unwrap(), SessionStats::default());

        let first = store.create_new().unwrap();
        let second = store.create_new().unwrap();
        store.history().append(&first, "ls").unwrap();
        store.history().append(&second, "pwd").unwrap();
        store.history().append(&second, "date").unwrap();

        let stats = store.stats().unwrap();
        assert_eq!(stats.total, 2);
        assert_eq!(stats.active, 2);
        assert_eq!(stats.total_commands, 3);
        assert_eq!(stats.oldest.as_deref(), Some(first.as_str()));
        assert_eq!(stats.newest.as_deref(), Some(second.as_str()));

        let much_later = Utc::now() + Duration::hours(2);
        assert_eq!(store.stats_at(much_later).unwrap().active, 0);
    }

    #[test]
    fn test_cleanup_process_binding() {
        let (_dir, store) = store();
        let id = store.get_current(99).unwrap();
        store.cleanup_process_binding(99);
        store.cleanup_process_binding(99);

        // Rebinding never deletes the session that was bound before.
        let next = store.get_current(99).unwrap();
        assert!(store.list().unwrap().contains(&id));
        assert!(store.list().unwrap().contains(&next));
    }

    #[test]
    fn test_validate_id() {
        assert!(FileSessionStore::validate_id("session_1").is_ok());
        assert!(FileSessionStore::validate_id("a/b").is_err());
    }
}
