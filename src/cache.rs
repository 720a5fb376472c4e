//! Two-tier cache of fragment content and parsed command lists
//!
//! The memory tier lives for the current process; the persistent tier
//! ([`PersistentStore`]) is shared across processes. Both tiers use the same
//! [`CacheKey`], which includes the file's last write time: an entry is valid
//! only for the exact timestamp it was recorded with, so a changed file is
//! always a miss, never a stale hit.
//!
//! Persistent-tier failures never surface to callers. Availability is probed
//! once, when the cache is opened; afterwards a non-busy store error switches
//! the cache to memory-only for the remainder of the process, and a busy store
//! fails the single operation.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use log::debug;

use crate::defaults::STORE_FILE_NAME;
use crate::error::{Error, Result};
use crate::fragment::Fragment;
use crate::parser::{ExposedCommand, ParsingMode};
use crate::store::{is_busy, PersistentStore, StoreRows};

/// Cache key combining file identity, timestamp and parsing mode
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    pub path: PathBuf,
    pub modified_ns: i64,
    pub mode: ParsingMode,
}

impl CacheKey {
    pub fn new(path: impl Into<PathBuf>, modified_ns: i64, mode: ParsingMode) -> Self {
        Self {
            path: path.into(),
            modified_ns,
            mode,
        }
    }

    pub fn for_fragment(fragment: &Fragment, mode: ParsingMode) -> Self {
        Self::new(fragment.path.clone(), fragment.modified_ns, mode)
    }

    /// Path as stored in the persistent tier.
    pub fn path_str(&self) -> String {
        self.path.to_string_lossy().into_owned()
    }
}

/// In-process map for one kind of cached value
#[derive(Debug, Clone)]
pub struct MemoryTier<V> {
    cache: Arc<Mutex<HashMap<CacheKey, V>>>,
}

impl<V: Clone> MemoryTier<V> {
    /// Create a new empty tier
    pub fn new() -> Self {
        Self {
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    /// Get a cached value, or compute and cache it if not present
    pub fn get_or_insert_with<F, E>(&self, key: CacheKey, compute: F) -> std::result::Result<V, E>
    where
        F: FnOnce() -> std::result::Result<V, E>,
        E: From<Error>,
    {
        if let Some(cached) = self.get(&key)? {
            return Ok(cached);
        }

        let value = compute()?;
        self.insert(key, value.clone())?;
        Ok(value)
    }

    /// Insert a value into the tier
    pub fn insert(&self, key: CacheKey, value: V) -> Result<()> {
        let mut cache = self.lock()?;
        cache.insert(key, value);
        Ok(())
    }

    /// Get a value without computing
    pub fn get(&self, key: &CacheKey) -> Result<Option<V>> {
        let cache = self.lock()?;
        Ok(cache.get(key).cloned())
    }

    /// Check if a key exists in the tier
    pub fn contains(&self, key: &CacheKey) -> Result<bool> {
        let cache = self.lock()?;
        Ok(cache.contains_key(key))
    }

    /// Clear all cached entries
    pub fn clear(&self) -> Result<()> {
        let mut cache = self.lock()?;
        cache.clear();
        Ok(())
    }

    /// Get the number of cached entries
    pub fn len(&self) -> Result<usize> {
        let cache = self.lock()?;
        Ok(cache.len())
    }

    /// Check if the tier is empty
    pub fn is_empty(&self) -> Result<bool> {
        let cache = self.lock()?;
        Ok(cache.is_empty())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, HashMap<CacheKey, V>>> {
        self.cache.lock().map_err(|_| Error::LockPoisoned {
            context: "memory cache tier".to_string(),
        })
    }
}

impl<V: Clone> Default for MemoryTier<V> {
    fn default() -> Self {
        Self::new()
    }
}

/// Snapshot of cache sizes and persistent-tier counters.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub content_entries: usize,
    pub ast_entries: usize,
    pub persistent_available: bool,
    pub persistent_lookups: u64,
    pub persistent_batch_lookups: u64,
    pub persistent_writes: u64,
    pub persistent_rows: Option<StoreRows>,
}

/// The two-tier content/AST cache.
#[derive(Debug)]
pub struct FragmentCache {
    content: MemoryTier<String>,
    ast: MemoryTier<Vec<ExposedCommand>>,
    store: Option<PersistentStore>,
    degraded: AtomicBool,
}

impl FragmentCache {
    /// A cache with no persistent tier.
    pub fn memory_only() -> Self {
        Self::with_store(None)
    }

    /// Open the cache, probing the persistent store in `cache_dir` once.
    ///
    /// If the store cannot be opened the cache runs memory-only; this is
    /// reported at `debug` level only.
    pub fn open(cache_dir: &Path, busy_timeout: Duration) -> Self {
        let path = cache_dir.join(STORE_FILE_NAME);
        match PersistentStore::open(&path, busy_timeout) {
            Ok(store) => {
                debug!("Persistent cache available at {}", path.display());
                Self::with_store(Some(store))
            }
            Err(e) => {
                debug!(
                    "Persistent cache unavailable at {} ({}); using memory only",
                    path.display(),
                    e
                );
                Self::memory_only()
            }
        }
    }

    pub fn with_store(store: Option<PersistentStore>) -> Self {
        Self {
            content: MemoryTier::new(),
            ast: MemoryTier::new(),
            store,
            degraded: AtomicBool::new(false),
        }
    }

    /// Whether the persistent tier is in use for this process.
    pub fn is_persistent_store_available(&self) -> bool {
        self.store.is_some() && !self.degraded.load(Ordering::Relaxed)
    }

    /// The persistent tier, if available.
    pub fn store(&self) -> Option<&PersistentStore> {
        if self.degraded.load(Ordering::Relaxed) {
            return None;
        }
        self.store.as_ref()
    }

    pub fn get_content(&self, key: &CacheKey) -> Option<String> {
        if let Some(hit) = self.memory_get(&self.content, key) {
            return Some(hit);
        }
        let store = self.store()?;
        match store.get_content(key) {
            Ok(Some(content)) => {
                self.memory_insert(&self.content, key, content.clone());
                Some(content)
            }
            Ok(None) => None,
            Err(e) => {
                self.store_failed("read", &e);
                None
            }
        }
    }

    pub fn set_content(&self, key: &CacheKey, content: &str) {
        self.memory_insert(&self.content, key, content.to_string());
        if let Some(store) = self.store() {
            if let Err(e) = store.put_content(key, content) {
                self.store_failed("write", &e);
            }
        }
    }

    pub fn get_ast(&self, key: &CacheKey) -> Option<Vec<ExposedCommand>> {
        if let Some(hit) = self.memory_get(&self.ast, key) {
            return Some(hit);
        }
        let store = self.store()?;
        match store.get_ast(key) {
            Ok(Some(commands)) => {
                self.memory_insert(&self.ast, key, commands.clone());
                Some(commands)
            }
            Ok(None) => None,
            Err(e) => {
                self.store_failed("read", &e);
                None
            }
        }
    }

    pub fn set_ast(&self, key: &CacheKey, commands: &[ExposedCommand]) {
        self.memory_insert(&self.ast, key, commands.to_vec());
        if let Some(store) = self.store() {
            if let Err(e) = store.put_ast(key, commands) {
                self.store_failed("write", &e);
            }
        }
    }

    /// Copy persistent content entries for `keys` into the memory tier in one
    /// batch. Returns the number of entries copied.
    pub fn prewarm_content(&self, keys: &[CacheKey]) -> usize {
        let Some(store) = self.store() else {
            return 0;
        };
        let missing = self.missing_keys(&self.content, keys);
        if missing.is_empty() {
            return 0;
        }
        match store.load_content_batch(&missing) {
            Ok(found) => {
                let count = found.len();
                for (key, content) in found {
                    self.memory_insert(&self.content, &key, content);
                }
                count
            }
            Err(e) => {
                self.store_failed("pre-warm", &e);
                0
            }
        }
    }

    /// Copy persistent AST entries for `keys` into the memory tier in one
    /// batch. Returns the number of entries copied.
    pub fn prewarm_ast(&self, keys: &[CacheKey]) -> usize {
        let Some(store) = self.store() else {
            return 0;
        };
        let missing = self.missing_keys(&self.ast, keys);
        if missing.is_empty() {
            return 0;
        }
        match store.load_ast_batch(&missing) {
            Ok(found) => {
                let count = found.len();
                for (key, commands) in found {
                    self.memory_insert(&self.ast, &key, commands);
                }
                count
            }
            Err(e) => {
                self.store_failed("pre-warm", &e);
                0
            }
        }
    }

    /// Drop the memory tier only.
    pub fn clear_memory(&self) -> Result<()> {
        self.content.clear()?;
        self.ast.clear()
    }

    /// Delete every persistent row. Returns the number of rows removed.
    pub fn clear_persistent(&self) -> Result<usize> {
        match self.store() {
            Some(store) => store.clear(),
            None => Err(Error::CacheStore {
                message: "persistent cache is not available".to_string(),
            }),
        }
    }

    pub fn stats(&self) -> CacheStats {
        let store = self.store();
        CacheStats {
            content_entries: self.content.len().unwrap_or(0),
            ast_entries: self.ast.len().unwrap_or(0),
            persistent_available: store.is_some(),
            persistent_lookups: store.map(|s| s.lookups()).unwrap_or(0),
            persistent_batch_lookups: store.map(|s| s.batch_lookups()).unwrap_or(0),
            persistent_writes: store.map(|s| s.writes()).unwrap_or(0),
            persistent_rows: store.and_then(|s| s.row_counts().ok()),
        }
    }

    fn missing_keys<V: Clone>(&self, tier: &MemoryTier<V>, keys: &[CacheKey]) -> Vec<CacheKey> {
        keys.iter()
            .filter(|key| !tier.contains(key).unwrap_or(false))
            .cloned()
            .collect()
    }

    fn memory_get<V: Clone>(&self, tier: &MemoryTier<V>, key: &CacheKey) -> Option<V> {
        match tier.get(key) {
            Ok(hit) => hit,
            Err(e) => {
                debug!("Memory cache lookup failed: {}", e);
                None
            }
        }
    }

    fn memory_insert<V: Clone>(&self, tier: &MemoryTier<V>, key: &CacheKey, value: V) {
        if let Err(e) = tier.insert(key.clone(), value) {
            debug!("Memory cache insert failed: {}", e);
        }
    }

    fn store_failed(&self, operation: &str, error: &Error) {
        if is_busy(error) {
            debug!("Persistent cache busy during {}; skipping", operation);
            return;
        }
        debug!(
            "Persistent cache {} failed ({}); using memory only for this session",
            operation, error
        );
        self.degraded.store(true, Ordering::Relaxed);
    }
}

impl Default for FragmentCache {
    fn default() -> Self {
        Self::memory_only()
    }
}
