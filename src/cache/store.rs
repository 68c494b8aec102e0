//! Cache Store Module
//!
//! Append/remove storage for cache entries: a durable JSON file store and an
//! in-memory store with the same contract.

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::cache::CacheEntry;
use crate::error::{CacheError, Result};

// == Entry Store Trait ==
/// Storage primitive behind the memoization engine.
///
/// Stores do not enforce one entry per identity: `insert` always appends, and
/// `lookup` reports every match so duplicates can be detected by the caller.
pub trait EntryStore {
    /// Returns every stored entry whose identity equals `identity`.
    fn lookup(&self, identity: &str) -> Result<Vec<CacheEntry>>;

    /// Appends an entry.
    fn insert(&mut self, entry: CacheEntry) -> Result<()>;

    /// Deletes every entry matching `identity`, returning how many were dropped.
    fn remove(&mut self, identity: &str) -> Result<usize>;

    /// Deletes entries that are stale at `now`.
    fn remove_stale(&mut self, now: DateTime<Utc>) -> Result<usize>;

    /// Deletes everything.
    fn clear(&mut self) -> Result<usize>;

    /// Snapshot of all stored entries.
    fn entries(&self) -> Result<Vec<CacheEntry>>;

    fn len(&self) -> Result<usize> {
        Ok(self.entries()?.len())
    }

    fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }
}

// == Memory Store ==
/// Non-durable store, lost with the process.
#[derive(Debug, Default, Clone)]
pub struct MemoryStore {
    entries: Vec<CacheEntry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl EntryStore for MemoryStore {
    fn lookup(&self, identity: &str) -> Result<Vec<CacheEntry>> {
        Ok(matching(&self.entries, identity))
    }

    fn insert(&mut self, entry: CacheEntry) -> Result<()> {
        self.entries.push(entry);
        Ok(())
    }

    fn remove(&mut self, identity: &str) -> Result<usize> {
        let before = self.entries.len();
        self.entries.retain(|e| e.identity != identity);
        Ok(before - self.entries.len())
    }

    fn remove_stale(&mut self, now: DateTime<Utc>) -> Result<usize> {
        let before = self.entries.len();
        self.entries.retain(|e| e.is_fresh_at(now));
        Ok(before - self.entries.len())
    }

    fn clear(&mut self) -> Result<usize> {
        let count = self.entries.len();
        self.entries.clear();
        Ok(count)
    }

    fn entries(&self) -> Result<Vec<CacheEntry>> {
        Ok(self.entries.clone())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entries.len())
    }
}

// == JSON File Store ==
/// On-disk layout of the store file.
#[derive(Debug, Deserialize)]
struct StoreDocument {
    entries: Vec<CacheEntry>,
}

/// Durable store kept as a single JSON document.
///
/// The whole document is held in memory; every mutation rewrites the file
/// through a synced temporary file that is renamed over the original, so a
/// crash leaves either the old or the new document on disk. Memory is only
/// updated once the write succeeded.
#[derive(Debug)]
pub struct JsonFileStore {
    path: PathBuf,
    entries: Vec<CacheEntry>,
}

impl JsonFileStore {
    // == Open ==
    /// Opens the store at `path`, creating the file and its parent
    /// directories when missing.
    pub fn open(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();

        let entries = if path.exists() {
            let bytes = fs::read(&path).map_err(|e| CacheError::store(&path, e))?;
            if bytes.iter().all(u8::is_ascii_whitespace) {
                Vec::new()
            } else {
                serde_json::from_slice::<StoreDocument>(&bytes)
                    .map_err(|e| CacheError::store(&path, format!("malformed store file: {e}")))?
                    .entries
            }
        } else {
            if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
                fs::create_dir_all(parent).map_err(|e| CacheError::store(&path, e))?;
            }
            write_document(&path, &[])?;
            Vec::new()
        };

        info!(path = %path.display(), entries = entries.len(), "Cache store opened");
        Ok(Self { path, entries })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Persists `next` and adopts it as the current contents.
    fn commit(&mut self, next: Vec<CacheEntry>) -> Result<()> {
        write_document(&self.path, &next)?;
        self.entries = next;
        Ok(())
    }

    /// Commits the entries passing `keep`, returning how many were dropped.
    fn retain_and_commit(&mut self, keep: impl Fn(&CacheEntry) -> bool) -> Result<usize> {
        let next: Vec<CacheEntry> = self.entries.iter().filter(|e| keep(*e)).cloned().collect();
        let removed = self.entries.len() - next.len();
        if removed > 0 {
            self.commit(next)?;
        }
        Ok(removed)
    }
}

impl EntryStore for JsonFileStore {
    fn lookup(&self, identity: &str) -> Result<Vec<CacheEntry>> {
        Ok(matching(&self.entries, identity))
    }

    fn insert(&mut self, entry: CacheEntry) -> Result<()> {
        debug!(identity = %entry.identity, "Persisting cache entry");
        let mut next = self.entries.clone();
        next.push(entry);
        self.commit(next)
    }

    fn remove(&mut self, identity: &str) -> Result<usize> {
        self.retain_and_commit(|e| e.identity != identity)
    }

    fn remove_stale(&mut self, now: DateTime<Utc>) -> Result<usize> {
        self.retain_and_commit(|e| e.is_fresh_at(now))
    }

    fn clear(&mut self) -> Result<usize> {
        let count = self.entries.len();
        self.commit(Vec::new())?;
        Ok(count)
    }

    fn entries(&self) -> Result<Vec<CacheEntry>> {
        Ok(self.entries.clone())
    }

    fn len(&self) -> Result<usize> {
        Ok(self.entries.len())
    }
}

// == Helpers ==
fn matching(entries: &[CacheEntry], identity: &str) -> Vec<CacheEntry> {
    entries
        .iter()
        .filter(|e| e.identity == identity)
        .cloned()
        .collect()
}

fn write_document(path: &Path, entries: &[CacheEntry]) -> Result<()> {
    #[derive(Serialize)]
    struct Borrowed<'a> {
        entries: &'a [CacheEntry],
    }

    let bytes = serde_json::to_vec_pretty(&Borrowed { entries })
        .map_err(|e| CacheError::store(path, e))?;

    let file_name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "store".to_string());
    let tmp = path.with_file_name(format!(".{file_name}.tmp"));

    let write = || -> std::io::Result<()> {
        let mut file = File::create(&tmp)?;
        file.write_all(&bytes)?;
        file.sync_all()?;
        fs::rename(&tmp, path)
    };

    write().map_err(|e| {
        let _ = fs::remove_file(&tmp);
        CacheError::store(path, e)
    })
}

// == Unit Tests ==
#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeDelta;
    use serde_json::json;
    use tempfile::TempDir;

    fn entry(identity: &str, valid_for: TimeDelta) -> CacheEntry {
        CacheEntry::new(identity, json!(identity), valid_for)
    }

    fn create_test_store() -> (JsonFileStore, TempDir) {
        let dir = TempDir::new().expect("TempDir creation should succeed");
        let store = JsonFileStore::open(dir.path().join("cache.json")).unwrap();
        (store, dir)
    }

    #[test]
    fn test_open_creates_file() {
        let (store, _dir) = create_test_store();
        assert!(store.path().exists());
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_open_creates_parent_dirs() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested/deeper/cache.json");
        let store = JsonFileStore::open(&path).unwrap();
        assert!(path.exists());
        assert_eq!(store.len().unwrap(), 0);
    }

    #[test]
    fn test_insert_and_lookup() {
        let (mut store, _dir) = create_test_store();
        store.insert(entry("a", TimeDelta::seconds(10))).unwrap();
        store.insert(entry("b", TimeDelta::seconds(10))).unwrap();

        let found = store.lookup("a").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].result, json!("a"));
        assert!(store.lookup("missing").unwrap().is_empty());
    }

    #[test]
    fn test_insert_does_not_dedupe() {
        let (mut store, _dir) = create_test_store();
        store.insert(entry("a", TimeDelta::seconds(10))).unwrap();
        store.insert(entry("a", TimeDelta::seconds(10))).unwrap();
        assert_eq!(store.lookup("a").unwrap().len(), 2);
    }

    #[test]
    fn test_remove_all_matches() {
        let (mut store, _dir) = create_test_store();
        store.insert(entry("a", TimeDelta::seconds(10))).unwrap();
        store.insert(entry("a", TimeDelta::seconds(10))).unwrap();
        store.insert(entry("b", TimeDelta::seconds(10))).unwrap();

        assert_eq!(store.remove("a").unwrap(), 2);
        assert!(store.lookup("a").unwrap().is_empty());
        assert_eq!(store.len().unwrap(), 1);
    }

    #[test]
    fn test_remove_nonexistent_is_noop() {
        let (mut store, _dir) = create_test_store();
        assert_eq!(store.remove("nothing").unwrap(), 0);
    }

    #[test]
    fn test_entries_survive_reopen() {
        let (mut store, dir) = create_test_store();
        store.insert(entry("a", TimeDelta::seconds(10))).unwrap();
        let path = store.path().to_path_buf();
        drop(store);

        let reopened = JsonFileStore::open(&path).unwrap();
        let found = reopened.lookup("a").unwrap();
        assert_eq!(found.len(), 1);
        assert_eq!(found[0].valid_for, TimeDelta::seconds(10));
        drop(dir);
    }

    #[test]
    fn test_remove_stale() {
        let (mut store, _dir) = create_test_store();
        store.insert(entry("old", TimeDelta::zero())).unwrap();
        store.insert(entry("new", TimeDelta::seconds(60))).unwrap();

        let removed = store.remove_stale(Utc::now()).unwrap();
        assert_eq!(removed, 1);
        assert!(store.lookup("old").unwrap().is_empty());
        assert_eq!(store.lookup("new").unwrap().len(), 1);
    }

    #[test]
    fn test_clear() {
        let (mut store, _dir) = create_test_store();
        store.insert(entry("a", TimeDelta::seconds(10))).unwrap();
        store.insert(entry("b", TimeDelta::seconds(10))).unwrap();

        assert_eq!(store.clear().unwrap(), 2);
        assert!(store.is_empty().unwrap());

        let reopened = JsonFileStore::open(store.path()).unwrap();
        assert!(reopened.is_empty().unwrap());
    }

    #[test]
    fn test_malformed_file_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "{not json").unwrap();

        assert!(matches!(
            JsonFileStore::open(&path),
            Err(CacheError::StoreUnavailable { .. })
        ));
    }

    #[test]
    fn test_empty_file_opens_empty() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("cache.json");
        fs::write(&path, "").unwrap();

        let store = JsonFileStore::open(&path).unwrap();
        assert!(store.is_empty().unwrap());
    }

    #[test]
    fn test_unwritable_location_is_unavailable() {
        let dir = TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "file, not a directory").unwrap();

        assert!(matches!(
            JsonFileStore::open(blocker.join("cache.json")),
            Err(CacheError::StoreUnavailable { .. })
        ));
    }

    #[test]
    fn test_memory_store_contract() {
        let mut store = MemoryStore::new();
        store.insert(entry("a", TimeDelta::seconds(10))).unwrap();
        store.insert(entry("a", TimeDelta::seconds(10))).unwrap();
        store.insert(entry("b", TimeDelta::zero())).unwrap();

        assert_eq!(store.lookup("a").unwrap().len(), 2);
        assert_eq!(store.remove_stale(Utc::now()).unwrap(), 1);
        assert_eq!(store.remove("a").unwrap(), 2);
        assert!(store.is_empty().unwrap());
    }
}
