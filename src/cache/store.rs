//! Persistent backends for cache entries and the ledger.

use std::collections::HashMap;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

use parking_lot::{Mutex, RwLock};
use tempfile::NamedTempFile;
use tracing::{debug, warn};

use super::error::{CacheError, CacheResult};
use super::ledger::{LedgerRecord, append_record, read_ledger_file};
use super::types::{CacheEntry, CacheKey};
use crate::constants::DEFAULT_LEDGER_FILENAME;

const ENTRY_EXTENSION: &str = "json";

/// Result of a [`CacheStore::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    Written,
    /// A valid entry already existed; it was left untouched.
    AlreadyPresent,
}

/// Storage injected into [`super::EmbeddingCache`].
///
/// `get` treats unreadable entries as absent. `put` never replaces a valid entry.
pub trait CacheStore: Send + Sync {
    fn get(&self, key: &CacheKey) -> CacheResult<Option<CacheEntry>>;

    fn put(&self, entry: &CacheEntry) -> CacheResult<PutOutcome>;

    fn append_ledger(&self, record: &LedgerRecord) -> CacheResult<()>;

    fn read_ledger(&self) -> CacheResult<Vec<LedgerRecord>>;

    fn ledger_len(&self) -> CacheResult<usize> {
        Ok(self.read_ledger()?.len())
    }

    /// Removes every entry and the ledger.
    fn reset(&self) -> CacheResult<()>;
}

/// File-per-entry layout: `<root>/<key[0..2]>/<key>.json`, ledger as NDJSON.
#[derive(Debug)]
pub struct FsCacheStore {
    root: PathBuf,
    ledger_path: PathBuf,
    ledger_lock: Mutex<()>,
}

impl FsCacheStore {
    /// Creates a store rooted at `root` with the ledger at `<root>/ledger.jsonl`.
    pub fn new(root: PathBuf) -> Self {
        let ledger_path = root.join(DEFAULT_LEDGER_FILENAME);
        Self::with_ledger(root, ledger_path)
    }

    pub fn with_ledger(root: PathBuf, ledger_path: PathBuf) -> Self {
        Self {
            root,
            ledger_path,
            ledger_lock: Mutex::new(()),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn ledger_path(&self) -> &Path {
        &self.ledger_path
    }

    pub fn entry_path(&self, key: &CacheKey) -> PathBuf {
        self.root
            .join(key.shard())
            .join(format!("{}.{}", key.as_hex(), ENTRY_EXTENSION))
    }

    /// Number of entry files currently on disk.
    pub fn entry_count(&self) -> CacheResult<usize> {
        if !self.root.exists() {
            return Ok(0);
        }
        let mut count = 0;
        for shard in fs::read_dir(&self.root)? {
            let shard = shard?.path();
            if !shard.is_dir() {
                continue;
            }
            for entry in fs::read_dir(&shard)? {
                let path = entry?.path();
                if path.extension().is_some_and(|ext| ext == ENTRY_EXTENSION) {
                    count += 1;
                }
            }
        }
        Ok(count)
    }

    fn read_entry(&self, key: &CacheKey) -> CacheResult<Option<CacheEntry>> {
        let path = self.entry_path(key);
        let bytes = match fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        let entry: CacheEntry = match serde_json::from_slice(&bytes) {
            Ok(entry) => entry,
            Err(e) => {
                warn!(key = %key, path = %path.display(), error = %e, "Malformed cache entry, treating as miss");
                return Ok(None);
            }
        };

        if let Err(reason) = entry.check(key) {
            warn!(key = %key, path = %path.display(), reason = %reason, "Invalid cache entry, treating as miss");
            return Ok(None);
        }

        Ok(Some(entry))
    }
}

impl CacheStore for FsCacheStore {
    fn get(&self, key: &CacheKey) -> CacheResult<Option<CacheEntry>> {
        self.read_entry(key)
    }

    fn put(&self, entry: &CacheEntry) -> CacheResult<PutOutcome> {
        if self.read_entry(&entry.key)?.is_some() {
            return Ok(PutOutcome::AlreadyPresent);
        }

        let final_path = self.entry_path(&entry.key);
        let shard_dir = final_path
            .parent()
            .map(Path::to_path_buf)
            .unwrap_or_else(|| self.root.clone());
        fs::create_dir_all(&shard_dir)?;

        let bytes = serde_json::to_vec(entry)?;
        let mut temp = NamedTempFile::new_in(&shard_dir)?;
        temp.write_all(&bytes)?;
        temp.as_file().sync_all()?;
        // Replaces a malformed file left at the final path, if any.
        temp.persist(&final_path).map_err(|e| CacheError::Io(e.error))?;

        debug!(key = %entry.key, dim = entry.dim, "Cache entry written");
        Ok(PutOutcome::Written)
    }

    fn append_ledger(&self, record: &LedgerRecord) -> CacheResult<()> {
        let _guard = self.ledger_lock.lock();
        if let Some(parent) = self.ledger_path.parent() {
            fs::create_dir_all(parent)?;
        }
        append_record(&self.ledger_path, record)
    }

    fn read_ledger(&self) -> CacheResult<Vec<LedgerRecord>> {
        let _guard = self.ledger_lock.lock();
        read_ledger_file(&self.ledger_path)
    }

    fn reset(&self) -> CacheResult<()> {
        let _guard = self.ledger_lock.lock();
        if self.root.exists() {
            fs::remove_dir_all(&self.root)?;
        }
        if self.ledger_path.exists() {
            fs::remove_file(&self.ledger_path)?;
        }
        Ok(())
    }
}

/// In-process store, one instance per test or per short-lived pipeline.
#[derive(Debug, Default)]
pub struct MemoryCacheStore {
    entries: RwLock<HashMap<CacheKey, CacheEntry>>,
    ledger: Mutex<Vec<LedgerRecord>>,
    #[cfg(any(test, feature = "mock"))]
    fail_ledger: std::sync::atomic::AtomicBool,
}

impl MemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Makes every subsequent ledger append fail.
    #[cfg(any(test, feature = "mock"))]
    pub fn set_ledger_failing(&self, failing: bool) {
        self.fail_ledger
            .store(failing, std::sync::atomic::Ordering::Release);
    }

    #[cfg(any(test, feature = "mock"))]
    fn ledger_failing(&self) -> bool {
        self.fail_ledger.load(std::sync::atomic::Ordering::Acquire)
    }

    #[cfg(not(any(test, feature = "mock")))]
    fn ledger_failing(&self) -> bool {
        false
    }
}

impl CacheStore for MemoryCacheStore {
    fn get(&self, key: &CacheKey) -> CacheResult<Option<CacheEntry>> {
        Ok(self
            .entries
            .read()
            .get(key)
            .filter(|entry| entry.check(key).is_ok())
            .cloned())
    }

    fn put(&self, entry: &CacheEntry) -> CacheResult<PutOutcome> {
        let mut entries = self.entries.write();
        if entries
            .get(&entry.key)
            .is_some_and(|existing| existing.check(&entry.key).is_ok())
        {
            return Ok(PutOutcome::AlreadyPresent);
        }
        entries.insert(entry.key.clone(), entry.clone());
        Ok(PutOutcome::Written)
    }

    fn append_ledger(&self, record: &LedgerRecord) -> CacheResult<()> {
        if self.ledger_failing() {
            return Err(CacheError::Io(std::io::Error::other(
                "ledger unavailable (simulated)",
            )));
        }
        self.ledger.lock().push(record.clone());
        Ok(())
    }

    fn read_ledger(&self) -> CacheResult<Vec<LedgerRecord>> {
        Ok(self.ledger.lock().clone())
    }

    fn ledger_len(&self) -> CacheResult<usize> {
        Ok(self.ledger.lock().len())
    }

    fn reset(&self) -> CacheResult<()> {
        self.entries.write().clear();
        self.ledger.lock().clear();
        Ok(())
    }
}

impl<T: CacheStore + ?Sized> CacheStore for std::sync::Arc<T> {
    fn get(&self, key: &CacheKey) -> CacheResult<Option<CacheEntry>> {
        (**self).get(key)
    }

    fn put(&self, entry: &CacheEntry) -> CacheResult<PutOutcome> {
        (**self).put(entry)
    }

    fn append_ledger(&self, record: &LedgerRecord) -> CacheResult<()> {
        (**self).append_ledger(record)
    }

    fn read_ledger(&self) -> CacheResult<Vec<LedgerRecord>> {
        (**self).read_ledger()
    }

    fn ledger_len(&self) -> CacheResult<usize> {
        (**self).ledger_len()
    }

    fn reset(&self) -> CacheResult<()> {
        (**self).reset()
    }
}
