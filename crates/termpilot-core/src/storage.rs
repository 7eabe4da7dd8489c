//! Whole-file JSON tables shared between termpilot processes.
//!
//! Every table (lock table, session metadata, per-session history) is a single
//! JSON document rewritten wholesale. Writes go through a temporary file and an
//! atomic rename so readers never observe a torn file, and read-modify-write
//! cycles run under an exclusive advisory lock on a sidecar `.lock` file so two
//! processes cannot lose each other's updates.

use crate::{TermError, TermResult};
use fs2::FileExt;
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::marker::PhantomData;
use std::path::{Path, PathBuf};
use tracing::warn;

/// A JSON document on disk with atomic save and locked update.
pub struct AtomicJsonFile<T> {
    path: PathBuf,
    _marker: PhantomData<fn() -> T>,
}

impl<T> AtomicJsonFile<T>
where
    T: Serialize + DeserializeOwned + Default,
{
    /// Creates a handle; the file itself is created lazily on first save.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            _marker: PhantomData,
        }
    }

    /// Location of the backing file.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Loads the document.
    ///
    /// - `Ok(Some(_))`: parsed successfully
    /// - `Ok(None)`: file missing or empty
    /// - `Err`: unreadable or not valid JSON for `T`
    pub fn load(&self) -> TermResult<Option<T>> {
        if !self.path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(None);
        }
        Ok(Some(serde_json::from_str(&content)?))
    }

    /// Loads the document, treating missing or corrupt storage as empty.
    pub fn load_or_default(&self) -> T {
        match self.load() {
            Ok(Some(value)) => value,
            Ok(None) => T::default(),
            Err(e) => {
                warn!(path = %self.path.display(), error = %e, "Unreadable table, treating as empty");
                T::default()
            }
        }
    }

    /// Writes the document via tmp file + fsync + rename.
    pub fn save(&self, value: &T) -> TermResult<()> {
        write_atomic(&self.path, serde_json::to_string(value)?.as_bytes())
    }

    /// Takes the exclusive cross-process lock guarding this table.
    pub fn lock(&self) -> TermResult<FileLock> {
        FileLock::acquire(&self.path)
    }

    /// Locked read-modify-write. `f` sees the current document (or the
    /// default when storage is missing or corrupt) and its return value is
    /// passed through once the new document has been persisted.
    pub fn update<R, F>(&self, f: F) -> TermResult<R>
    where
        F: FnOnce(&mut T) -> R,
    {
        let _lock = self.lock()?;
        let mut value = self.load_or_default();
        let out = f(&mut value);
        self.save(&value)?;
        Ok(out)
    }
}

/// Atomically replaces `path` with `bytes`, creating parent directories.
pub fn write_atomic(path: &Path, bytes: &[u8]) -> TermResult<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
        }
    }

    let tmp_path = temp_path(path)?;
    let mut tmp_file = File::create(&tmp_path)?;
    tmp_file.write_all(bytes)?;
    tmp_file.sync_all()?;
    drop(tmp_file);

    if let Err(e) = fs::rename(&tmp_path, path) {
        let _ = fs::remove_file(&tmp_path);
        return Err(e.into());
    }
    Ok(())
}

// Per-process tmp names keep concurrent writers from clobbering each other's
// partially written file before the rename.
fn temp_path(path: &Path) -> TermResult<PathBuf> {
    let file_name = path
        .file_name()
        .ok_or_else(|| TermError::Io(std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            "Path has no file name",
        )))?;
    let tmp_name = format!(".{}.{}.tmp", file_name.to_string_lossy(), std::process::id());
    Ok(path.with_file_name(tmp_name))
}

/// Exclusive advisory lock on `<table>.lock`, released on drop.
pub struct FileLock {
    file: File,
}

impl FileLock {
    fn acquire(path: &Path) -> TermResult<Self> {
        let lock_path = path.with_extension("lock");
        if let Some(parent) = lock_path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                fs::create_dir_all(parent)?;
            }
        }

        let file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(false)
            .open(&lock_path)?;
        file.lock_exclusive()
            .map_err(|e| TermError::Lock(format!("Failed to lock {}: {e}", lock_path.display())))?;

        Ok(Self { file })
    }
}

impl Drop for FileLock {
    fn drop(&mut self) {
        // The lock file itself stays on disk; removing it would let a waiter
        // hold a lock on an unlinked inode.
        let _ = FileExt::unlock(&self.file);
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use tempfile::TempDir;

    type Table = BTreeMap<String, u32>;

    #[test]
    fn test_load_missing_and_empty() {
        let dir = TempDir::new().unwrap();
        let file: AtomicJsonFile<Table> = AtomicJsonFile::new(dir.path().join("t.json"));
        assert!(file.load().unwrap().is_none());

        fs::write(file.path(), "   \n").unwrap();
        assert!(file.load().unwrap().is_none());
    }

    #[test]
    fn test_corrupt_is_error_but_default_is_empty() {
        let dir = TempDir::new().unwrap();
        let file: AtomicJsonFile<Table> = AtomicJsonFile::new(dir.path().join("t.json"));
        fs::write(file.path(), "{not json").unwrap();
        assert!(file.load().is_err());
        assert!(file.load_or_default().is_empty());
    }

    #[test]
    fn test_save_creates_parents_and_leaves_no_tmp() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/t.json");
        let file: AtomicJsonFile<Table> = AtomicJsonFile::new(&path);

        let mut table = Table::new();
        table.insert("a".into(), 1);
        file.save(&table).unwrap();

        assert_eq!(file.load().unwrap().unwrap(), table);
        let leftovers: Vec<_> = fs::read_dir(path.parent().unwrap())
            .unwrap()
            .filter_map(Result::ok)
            .filter(|e| e.file_name().to_string_lossy().ends_with(".tmp"))
            .collect();
        assert!(leftovers.is_empty());
    }

    #[test]
    fn test_update_returns_closure_value() {
        let dir = TempDir::new().unwrap();
        let file: AtomicJsonFile<Table> = AtomicJsonFile::new(dir.path().join("t.json"));

        let n = file
            .update(|t| {
                *t.entry("hits".into()).or_insert(0) += 1;
                t.len()
            })
            .unwrap();
        assert_eq!(n, 1);

        file.update(|t| *t.entry("hits".into()).or_insert(0) += 1)
            .unwrap();
        assert_eq!(file.load().unwrap().unwrap()["hits"], 2);
    }

    #[test]
    fn test_concurrent_updates_do_not_lose_writes() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("counter.json");

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let path = path.clone();
                std::thread::spawn(move || {
                    let file: AtomicJsonFile<Table> = AtomicJsonFile::new(path);
                    for _ in 0..10 {
                        file.update(|t| *t.entry("n".into()).or_insert(0) += 1)
                            .unwrap();
                    }
                })
            })
            .collect();
        for h in handles {
            h.join().unwrap();
        }

        let file: AtomicJsonFile<Table> = AtomicJsonFile::new(path);
        assert_eq!(file.load().unwrap().unwrap()["n"], 80);
    }
}
