//! Durable key/value byte storage for the library document.
//!
//! The store's only I/O boundary. `FileStorage` keeps one file per key with
//! shared locks for reads and atomic, exclusively locked replacement for
//! writes. `MemoryStorage` is a shareable in-memory backend for tests and
//! embedding.

use crate::{Error, Result};
use fs2::FileExt;
use std::fs::File;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use tempfile::NamedTempFile;

/// Byte-level storage for a single record under a fixed key
pub trait Storage {
    /// Read the record, `None` if nothing has been written yet
    fn read(&self) -> Result<Option<Vec<u8>>>;

    /// Replace the record wholesale
    fn write(&mut self, bytes: &[u8]) -> Result<()>;

    /// Remove the record; clearing an absent record succeeds
    fn clear(&mut self) -> Result<()>;

    /// Keep a copy of a payload that failed to decode so a later write cannot
    /// destroy it. Returns a description of where it went, if anywhere.
    fn preserve_unreadable(&mut self, _bytes: &[u8]) -> Result<Option<String>> {
        Ok(None)
    }
}

fn persistence(action: &str, path: &Path, e: impl std::fmt::Display) -> Error {
    Error::Persistence(format!("failed to {} {:?}: {}", action, path, e))
}

// ============================================================================
// File Storage
// ============================================================================

/// File-backed storage: `<dir>/<key>.json`
#[derive(Clone, Debug)]
pub struct FileStorage {
    dir: PathBuf,
    key: String,
}

impl FileStorage {
    pub fn new(dir: impl Into<PathBuf>, key: impl Into<String>) -> Self {
        Self {
            dir: dir.into(),
            key: key.into(),
        }
    }

    /// Path of the durable record
    pub fn path(&self) -> PathBuf {
        self.dir.join(format!("{}.json", self.key))
    }

    fn ensure_dir(&self) -> Result<()> {
        std::fs::create_dir_all(&self.dir)
            .map_err(|e| persistence("create directory", &self.dir, e))
    }
}

impl Storage for FileStorage {
    fn read(&self) -> Result<Option<Vec<u8>>> {
        let path = self.path();
        let file = match File::open(&path) {
            Ok(f) => f,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                tracing::debug!("No library file at {:?}", path);
                return Ok(None);
            }
            Err(e) => return Err(persistence("open", &path, e)),
        };

        // Acquire shared lock for reading
        file.lock_shared()
            .map_err(|e| persistence("lock", &path, e))?;

        let mut contents = Vec::new();
        let read = std::io::BufReader::new(&file).read_to_end(&mut contents);
        let _ = file.unlock();
        read.map_err(|e| persistence("read", &path, e))?;

        tracing::debug!("Read {} bytes from {:?}", contents.len(), path);
        Ok(Some(contents))
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let path = self.path();
        self.ensure_dir()?;

        // Temp file in the same directory so the rename stays atomic
        let temp = NamedTempFile::new_in(&self.dir)
            .map_err(|e| persistence("create temp file in", &self.dir, e))?;

        // Exclusive lock serializes concurrent writers
        temp.as_file()
            .lock_exclusive()
            .map_err(|e| persistence("lock", temp.path(), e))?;

        {
            let mut writer = std::io::BufWriter::new(temp.as_file());
            writer
                .write_all(bytes)
                .map_err(|e| persistence("write", temp.path(), e))?;
            writer
                .flush()
                .map_err(|e| persistence("flush", temp.path(), e))?;
        }

        temp.as_file()
            .sync_all()
            .map_err(|e| persistence("sync", temp.path(), e))?;
        let _ = temp.as_file().unlock();

        temp.persist(&path)
            .map_err(|e| persistence("replace", &path, e.error))?;

        tracing::debug!("Wrote {} bytes to {:?}", bytes.len(), path);
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        let path = self.path();
        match std::fs::remove_file(&path) {
            Ok(()) => {
                tracing::info!("Cleared library file {:?}", path);
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(persistence("remove", &path, e)),
        }
    }

    fn preserve_unreadable(&mut self, bytes: &[u8]) -> Result<Option<String>> {
        self.ensure_dir()?;
        let stamp = chrono::Utc::now().format("%Y%m%dT%H%M%S%.3f");
        let backup = self.dir.join(format!("{}.corrupt-{}.json", self.key, stamp));
        std::fs::write(&backup, bytes).map_err(|e| persistence("write", &backup, e))?;
        tracing::warn!("Preserved unreadable library data at {:?}", backup);
        Ok(Some(backup.display().to_string()))
    }
}

// ============================================================================
// Memory Storage
// ============================================================================

#[derive(Debug, Default)]
struct MemoryInner {
    record: Option<Vec<u8>>,
    preserved: Vec<Vec<u8>>,
    writes: usize,
    fail_writes: bool,
    fail_reads: bool,
}

/// In-memory storage; clones share the same record
#[derive(Clone, Debug, Default)]
pub struct MemoryStorage {
    inner: Arc<Mutex<MemoryInner>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    /// Storage pre-populated with a record
    pub fn with_record(bytes: impl Into<Vec<u8>>) -> Self {
        let storage = Self::default();
        storage.lock().record = Some(bytes.into());
        storage
    }

    fn lock(&self) -> MutexGuard<'_, MemoryInner> {
        self.inner.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Current record contents
    pub fn record(&self) -> Option<Vec<u8>> {
        self.lock().record.clone()
    }

    /// Payloads handed to `preserve_unreadable`
    pub fn preserved(&self) -> Vec<Vec<u8>> {
        self.lock().preserved.clone()
    }

    /// Number of successful writes
    pub fn writes(&self) -> usize {
        self.lock().writes
    }

    /// Make subsequent writes and clears fail
    pub fn set_fail_writes(&self, fail: bool) {
        self.lock().fail_writes = fail;
    }

    /// Make subsequent reads fail
    pub fn set_fail_reads(&self, fail: bool) {
        self.lock().fail_reads = fail;
    }
}

impl Storage for MemoryStorage {
    fn read(&self) -> Result<Option<Vec<u8>>> {
        let inner = self.lock();
        if inner.fail_reads {
            return Err(Error::Persistence("memory storage read failure".into()));
        }
        Ok(inner.record.clone())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<()> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(Error::Persistence("memory storage write failure".into()));
        }
        inner.record = Some(bytes.to_vec());
        inner.writes += 1;
        Ok(())
    }

    fn clear(&mut self) -> Result<()> {
        let mut inner = self.lock();
        if inner.fail_writes {
            return Err(Error::Persistence("memory storage clear failure".into()));
        }
        inner.record = None;
        Ok(())
    }

    fn preserve_unreadable(&mut self, bytes: &[u8]) -> Result<Option<String>> {
        let mut inner = self.lock();
        inner.preserved.push(bytes.to_vec());
        Ok(Some(format!("memory slot {}", inner.preserved.len() - 1)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_file_write_and_read_roundtrip() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::new(temp_dir.path(), "userWorkouts");

        storage.write(br#"{"folders":[]}"#).unwrap();

        assert_eq!(
            storage.read().unwrap(),
            Some(br#"{"folders":[]}"#.to_vec())
        );
        assert!(temp_dir.path().join("userWorkouts.json").exists());
    }

    #[test]
    fn test_file_read_missing_returns_none() {
        let temp_dir = tempfile::tempdir().unwrap();
        let storage = FileStorage::new(temp_dir.path().join("nested"), "userWorkouts");
        assert_eq!(storage.read().unwrap(), None);
    }

    #[test]
    fn test_file_write_is_atomic() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::new(temp_dir.path(), "userWorkouts");

        storage.write(b"first").unwrap();
        storage.write(b"second").unwrap();

        assert_eq!(storage.read().unwrap(), Some(b"second".to_vec()));
        // Verify no stray temp files remain
        let extras: Vec<_> = std::fs::read_dir(temp_dir.path())
            .unwrap()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_name() != "userWorkouts.json")
            .collect();
        assert!(
            extras.is_empty(),
            "Expected only userWorkouts.json, found extras: {:?}",
            extras
        );
    }

    #[test]
    fn test_file_clear_is_idempotent() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::new(temp_dir.path(), "userWorkouts");

        storage.write(b"data").unwrap();
        storage.clear().unwrap();
        storage.clear().unwrap();

        assert_eq!(storage.read().unwrap(), None);
    }

    #[test]
    fn test_file_preserve_unreadable_keeps_bytes() {
        let temp_dir = tempfile::tempdir().unwrap();
        let mut storage = FileStorage::new(temp_dir.path(), "userWorkouts");

        let location = storage.preserve_unreadable(b"{ broken").unwrap().unwrap();

        assert!(location.contains("userWorkouts.corrupt-"));
        assert_eq!(std::fs::read(&location).unwrap(), b"{ broken");
    }

    #[test]
    fn test_file_write_into_unwritable_location_fails() {
        let temp_dir = tempfile::tempdir().unwrap();
        let blocker = temp_dir.path().join("blocker");
        std::fs::write(&blocker, b"not a directory").unwrap();

        let mut storage = FileStorage::new(&blocker, "userWorkouts");
        let err = storage.write(b"data").unwrap_err();
        assert!(err.is_persistence());
    }

    #[test]
    fn test_memory_clones_share_record() {
        let storage = MemoryStorage::new();
        let mut writer = storage.clone();

        writer.write(b"abc").unwrap();

        assert_eq!(storage.record(), Some(b"abc".to_vec()));
        assert_eq!(storage.writes(), 1);
    }

    #[test]
    fn test_memory_failure_modes() {
        let mut storage = MemoryStorage::with_record("abc");
        storage.set_fail_writes(true);
        assert!(storage.write(b"xyz").unwrap_err().is_persistence());
        assert!(storage.clear().unwrap_err().is_persistence());
        assert_eq!(storage.record(), Some(b"abc".to_vec()));

        storage.set_fail_reads(true);
        assert!(storage.read().unwrap_err().is_persistence());
    }
}
