//! Advisory locks on filesystem resources, shared by every session on the host.
//!
//! The lock table lives in `resource_locks.json` and maps a resolved resource
//! path to the session holding it. A lock is live while its age is below the
//! expiry (300 s by default); older entries are purged on the next acquire.
//! Mutating commands take locks through [`LockManager::guard`], which releases
//! them when the returned [`LockGuard`] is dropped.

use chrono::Utc;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use termpilot_core::storage::AtomicJsonFile;
use termpilot_core::{CommandError, TermError, TermResult};
use tracing::{debug, warn};

/// Locks older than this are treated as abandoned.
pub const DEFAULT_LOCK_EXPIRY: Duration = Duration::from_secs(300);

/// File name of the lock table inside the data directory.
pub const LOCK_TABLE_FILE: &str = "resource_locks.json";

/// One held lock, keyed in the table by normalized resource path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LockEntry {
    pub session_id: String,
    /// Acquisition time in fractional Unix seconds.
    pub timestamp: f64,
}

type LockTable = BTreeMap<String, LockEntry>;

/// Behaviour when the lock table cannot be locked or written.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistPolicy {
    /// Log the failure and return the decision computed in memory.
    #[default]
    Optimistic,
    /// Fail the acquisition.
    Strict,
}

/// Exclusive, time-bounded advisory locks on filesystem paths, shared by all
/// sessions on the host through a single JSON table.
///
/// Every call is a whole-table read-modify-write performed under an exclusive
/// file lock, so acquisitions from different processes are linearized: of two
/// sessions racing for the same path exactly one wins. There is no queueing.
pub struct LockManager {
    table: AtomicJsonFile<LockTable>,
    expiry: Duration,
    policy: PersistPolicy,
    gate: Mutex<()>,
}

impl LockManager {
    /// Lock table at `path` with the default expiry and optimistic policy.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            table: AtomicJsonFile::new(path),
            expiry: DEFAULT_LOCK_EXPIRY,
            policy: PersistPolicy::default(),
            gate: Mutex::new(()),
        }
    }

    /// Lock table stored as `resource_locks.json` inside `data_dir`.
    pub fn in_data_dir(data_dir: &Path) -> Self {
        Self::new(data_dir.join(LOCK_TABLE_FILE))
    }

    pub fn with_expiry(mut self, expiry: Duration) -> Self {
        self.expiry = expiry;
        self
    }

    pub fn with_policy(mut self, policy: PersistPolicy) -> Self {
        self.policy = policy;
        self
    }

    pub fn policy(&self) -> PersistPolicy {
        self.policy
    }

    /// Try to take `resource` for `session_id`. Returns `false` iff another
    /// session holds a live lock on it (or, under [`PersistPolicy::Strict`],
    /// the table could not be persisted).
    pub fn acquire(&self, session_id: &str, resource: &Path) -> bool {
        self.acquire_at(session_id, resource, now_secs())
    }

    /// [`acquire`](Self::acquire) with an explicit clock.
    pub fn acquire_at(&self, session_id: &str, resource: &Path, now: f64) -> bool {
        match self.try_acquire_at(session_id, resource, now) {
            Ok(acquired) => acquired,
            Err(e) => {
                warn!(session = %session_id, resource = %resource.display(), error = %e, "Lock acquisition failed");
                false
            }
        }
    }

    fn try_acquire_at(&self, session_id: &str, resource: &Path, now: f64) -> TermResult<bool> {
        let key = key_of(resource);
        let _gate = self.gate.lock();
        let _file_lock = match self.table.lock() {
            Ok(lock) => Some(lock),
            Err(e) => {
                self.persist_failed(&e)?;
                None
            }
        };

        let mut table = self.table.load_or_default();
        let before = table.len();
        table.retain(|_, entry| self.is_live(entry, now));
        if table.len() != before {
            debug!(purged = before - table.len(), "Purged expired locks");
        }

        if let Some(holder) = table.get(&key) {
            if holder.session_id != session_id {
                debug!(resource = %key, holder = %holder.session_id, requester = %session_id, "Lock held by another session");
                return Ok(false);
            }
        }

        table.insert(
            key.clone(),
            LockEntry {
                session_id: session_id.to_string(),
                timestamp: now,
            },
        );
        if let Err(e) = self.table.save(&table) {
            self.persist_failed(&e)?;
        }
        debug!(resource = %key, session = %session_id, "Lock acquired");
        Ok(true)
    }

    /// Drop the lock on `resource` if `session_id` holds it. Never fails.
    pub fn release(&self, session_id: &str, resource: &Path) {
        let key = key_of(resource);
        let _gate = self.gate.lock();
        let _file_lock = self.table.lock().ok();

        let mut table = self.table.load_or_default();
        let held_by_caller = table
            .get(&key)
            .is_some_and(|entry| entry.session_id == session_id);
        if !held_by_caller {
            return;
        }
        table.remove(&key);
        match self.table.save(&table) {
            Ok(()) => debug!(resource = %key, session = %session_id, "Lock released"),
            Err(e) => warn!(resource = %key, error = %e, "Failed to persist lock release"),
        }
    }

    /// The session holding a live lock on `resource`, if it is not `session_id`.
    pub fn check(&self, session_id: &str, resource: &Path) -> Option<String> {
        self.check_at(session_id, resource, now_secs())
    }

    /// [`check`](Self::check) with an explicit clock.
    pub fn check_at(&self, session_id: &str, resource: &Path, now: f64) -> Option<String> {
        let table = self.table.load_or_default();
        table
            .get(&key_of(resource))
            .filter(|entry| entry.session_id != session_id && self.is_live(entry, now))
            .map(|entry| entry.session_id.clone())
    }

    /// Lock every path in `resources` for `session_id`, following the
    /// check → acquire protocol used by mutating commands.
    ///
    /// Fails with [`CommandError::Busy`] naming the first contended path.
    /// Locks taken before a failure are released before returning.
    pub fn guard<'a>(
        &'a self,
        session_id: &str,
        resources: &[PathBuf],
    ) -> Result<LockGuard<'a>, CommandError> {
        let mut unique: Vec<&PathBuf> = Vec::with_capacity(resources.len());
        for path in resources {
            if !unique.contains(&path) {
                unique.push(path);
            }
        }

        for path in &unique {
            if self.check(session_id, path).is_some() {
                return Err(busy(path));
            }
        }

        let mut guard = LockGuard {
            manager: self,
            session_id: session_id.to_string(),
            held: Vec::with_capacity(unique.len()),
        };
        for path in unique {
            match self.try_acquire_at(session_id, path, now_secs()) {
                Ok(true) => guard.held.push(path.clone()),
                // Dropping `guard` releases whatever was already taken.
                Ok(false) => return Err(busy(path)),
                Err(e) => {
                    return Err(CommandError::Io(format!("lock table unavailable: {e}")));
                }
            }
        }
        Ok(guard)
    }

    fn is_live(&self, entry: &LockEntry, now: f64) -> bool {
        now - entry.timestamp < self.expiry.as_secs_f64()
    }

    fn persist_failed(&self, err: &TermError) -> TermResult<()> {
        match self.policy {
            PersistPolicy::Optimistic => {
                warn!(table = %self.table.path().display(), error = %err, "Lock table not persisted, proceeding");
                Ok(())
            }
            PersistPolicy::Strict => Err(TermError::Lock(err.to_string())),
        }
    }
}

/// Locks held on behalf of one command; released when dropped.
#[must_use = "locks are released as soon as the guard is dropped"]
pub struct LockGuard<'a> {
    manager: &'a LockManager,
    session_id: String,
    held: Vec<PathBuf>,
}

impl std::fmt::Debug for LockGuard<'_> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LockGuard")
            .field("session_id", &self.session_id)
            .field("held", &self.held)
            .finish_non_exhaustive()
    }
}

impl LockGuard<'_> {
    pub fn paths(&self) -> &[PathBuf] {
        &self.held
    }
}

impl Drop for LockGuard<'_> {
    fn drop(&mut self) {
        for path in self.held.drain(..).rev() {
            self.manager.release(&self.session_id, &path);
        }
    }
}

fn busy(path: &Path) -> CommandError {
    CommandError::Busy {
        path: path.display().to_string(),
    }
}

fn key_of(resource: &Path) -> String {
    resource.to_string_lossy().into_owned()
}

fn now_secs() -> f64 {
    Utc::now().timestamp_millis() as f64 / 1000.0
}
