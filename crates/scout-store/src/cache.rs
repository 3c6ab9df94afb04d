//! File-backed result cache

use crate::clock::{Clock, SystemClock};
use crate::StoreError;
use scout_domain::normalize_query;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::future::Future;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::OwnedMutexGuard;
use std::time::Duration;
use tokio::fs;
use tracing::{debug, info, warn};

const ENTRY_EXTENSION: &str = "json";
const TEMP_EXTENSION: &str = "tmp";

/// Compute the cache key for a query
///
/// The query is normalized first, so queries that differ only in whitespace
/// share a key. The key is the lowercase hex SHA-256 digest (64 characters).
pub fn cache_key(query: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(normalize_query(query).as_bytes());
    format!("{:x}", hasher.finalize())
}

/// On-disk layout of one entry
#[derive(Serialize, Deserialize)]
struct CacheFile {
    result: Value,
    stored_at: u64,
}

/// A live (non-expired) cache entry
#[derive(Debug, Clone, PartialEq)]
pub struct CacheEntry {
    /// Hex digest the entry is stored under
    pub query_hash: String,
    /// Opaque payload
    pub result: Value,
    /// When the entry was written (unix seconds)
    pub stored_at: u64,
}

/// Outcome of [`ResultCache::get_or_fetch`]
#[derive(Debug)]
pub struct Fetched<T> {
    /// The cached or freshly fetched value
    pub value: T,
    /// True when no fetch was needed
    pub cache_hit: bool,
    /// Set when the value was fetched but could not be written back
    pub store_error: Option<StoreError>,
}

/// Directory statistics
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    /// Number of entry files, expired ones included
    pub entries: usize,
    /// Total size of entry files in bytes
    pub total_bytes: u64,
}

/// Per-key lock plus the number of callers holding or waiting on it
#[derive(Debug, Default)]
struct KeySlot {
    lock: Arc<tokio::sync::Mutex<()>>,
    users: usize,
}

/// Exclusive access to one key; unregisters itself on drop
///
/// Dropping a pending `lock_key` future also drops this, so cancelled
/// callers never leave their slot behind.
struct KeyLock<'a> {
    cache: &'a ResultCache,
    key: String,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for KeyLock<'_> {
    fn drop(&mut self) {
        drop(self.guard.take());
        self.cache.release_key_lock(&self.key);
    }
}

/// Durable query → result cache with lazy expiry
///
/// Safe to share between tasks behind an `Arc`. Operations on different keys
/// never contend. Reads, writes and evictions of one key are serialized, so
/// an eviction only ever removes the stale bytes it inspected; same-key
/// writes are last-write-wins.
#[derive(Debug)]
pub struct ResultCache {
    dir: PathBuf,
    expiry_secs: u64,
    clock: Arc<dyn Clock>,
    key_locks: Mutex<HashMap<String, KeySlot>>,
}

impl ResultCache {
    /// Open (and create if needed) a cache directory
    ///
    /// # Errors
    ///
    /// Returns error if the directory cannot be created.
    pub async fn open(dir: impl Into<PathBuf>, expiry: Duration) -> Result<Self, StoreError> {
        let dir = dir.into();
        fs::create_dir_all(&dir)
            .await
            .map_err(|e| StoreError::io(&dir, e))?;

        debug!("Opened result cache at {} (expiry {:?})", dir.display(), expiry);

        Ok(Self {
            dir,
            expiry_secs: expiry.as_secs(),
            clock: Arc::new(SystemClock),
            key_locks: Mutex::new(HashMap::new()),
        })
    }

    /// Replace the clock used for timestamps and expiry checks
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Cache directory
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Entry lifetime
    pub fn expiry(&self) -> Duration {
        Duration::from_secs(self.expiry_secs)
    }

    /// Path of the file backing `query`
    pub fn entry_path(&self, query: &str) -> PathBuf {
        self.path_for_key(&cache_key(query))
    }

    fn path_for_key(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{}", key, ENTRY_EXTENSION))
    }

    fn is_expired(&self, stored_at: u64) -> bool {
        self.clock.now_secs().saturating_sub(stored_at) > self.expiry_secs
    }

    /// Look up a query
    ///
    /// Runs under the key's lock, so a concurrent `put` is either fully
    /// visible or not at all. Expired entries are deleted and reported as absent. Corrupt entries are
    /// deleted and reported as absent.
    ///
    /// # Errors
    ///
    /// Returns error if the backing file exists but cannot be read or removed.
    pub async fn get(&self, query: &str) -> Result<Option<CacheEntry>, StoreError> {
        let key = cache_key(query);
        let _held = self.lock_key(&key).await;
        self.read_entry(key).await
    }

    /// Read and lazily evict; the caller holds the key lock
    async fn read_entry(&self, key: String) -> Result<Option<CacheEntry>, StoreError> {
        let path = self.path_for_key(&key);

        let bytes = match fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(StoreError::io(&path, e)),
        };

        let file: CacheFile = match serde_json::from_slice(&bytes) {
            Ok(file) => file,
            Err(e) => {
                warn!("Discarding corrupt cache entry {}: {}", path.display(), e);
                remove_if_present(&path).await?;
                return Ok(None);
            }
        };

        if self.is_expired(file.stored_at) {
            debug!("Cache entry {} expired, removing", key);
            remove_if_present(&path).await?;
            return Ok(None);
        }

        Ok(Some(CacheEntry {
            query_hash: key,
            result: file.result,
            stored_at: file.stored_at,
        }))
    }

    /// Store a result for a query, replacing any previous entry
    ///
    /// The entry is written to a temporary file and renamed into place, so
    /// readers never see a partial write.
    ///
    /// # Errors
    ///
    /// Returns error if the payload cannot be serialized or written.
    pub async fn put<T: Serialize>(&self, query: &str, result: &T) -> Result<(), StoreError> {
        let key = cache_key(query);
        let _held = self.lock_key(&key).await;
        self.write_entry(&key, result).await
    }

    /// Atomic write; the caller holds the key lock
    async fn write_entry<T: Serialize>(&self, key: &str, result: &T) -> Result<(), StoreError> {
        let path = self.path_for_key(key);
        let file = CacheFile {
            result: serde_json::to_value(result)?,
            stored_at: self.clock.now_secs(),
        };
        let bytes = serde_json::to_vec(&file)?;

        let tmp_path = self.dir.join(format!(
            ".{}.{}.{}",
            key,
            uuid::Uuid::now_v7().simple(),
            TEMP_EXTENSION
        ));
        fs::write(&tmp_path, &bytes)
            .await
            .map_err(|e| StoreError::io(&tmp_path, e))?;

        if let Err(e) = fs::rename(&tmp_path, &path).await {
            let _ = fs::remove_file(&tmp_path).await;
            return Err(StoreError::io(&path, e));
        }

        debug!("Cached {} bytes under {}", bytes.len(), key);
        Ok(())
    }

    /// Return the cached value for `query`, or run `fetch` and cache its result
    ///
    /// Concurrent calls for the same query are serialized on a per-key lock:
    /// the first caller fetches, later callers wait and then read the entry it
    /// wrote. Read failures and entries that no longer deserialize as `T` are
    /// treated as misses. A failed write does not discard the fetched value;
    /// it is returned in [`Fetched::store_error`].
    ///
    /// # Errors
    ///
    /// Returns the fetch error unchanged. Nothing is cached in that case.
    pub async fn get_or_fetch<T, E, F, Fut>(&self, query: &str, fetch: F) -> Result<Fetched<T>, E>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T, E>>,
    {
        let key = cache_key(query);
        let _held = self.lock_key(&key).await;

        match self.read_entry(key.clone()).await {
            Ok(Some(entry)) => match serde_json::from_value::<T>(entry.result) {
                Ok(value) => {
                    return Ok(Fetched {
                        value,
                        cache_hit: true,
                        store_error: None,
                    })
                }
                Err(e) => warn!(
                    "Cache entry {} has an unexpected shape, refetching: {}",
                    entry.query_hash, e
                ),
            },
            Ok(None) => {}
            Err(e) => warn!("Cache read failed for '{}', treating as miss: {}", query, e),
        }

        let value = fetch().await?;
        let store_error = self.write_entry(&key, &value).await.err();
        if let Some(e) = &store_error {
            warn!("Failed to cache result for '{}': {}", query, e);
        }

        Ok(Fetched {
            value,
            cache_hit: false,
            store_error,
        })
    }

    fn key_locks(&self) -> MutexGuard<'_, HashMap<String, KeySlot>> {
        self.key_locks.lock().unwrap_or_else(PoisonError::into_inner)
    }

    async fn lock_key(&self, key: &str) -> KeyLock<'_> {
        let lock = {
            let mut locks = self.key_locks();
            let slot = locks.entry(key.to_string()).or_default();
            slot.users += 1;
            Arc::clone(&slot.lock)
        };

        let mut held = KeyLock {
            cache: self,
            key: key.to_string(),
            guard: None,
        };
        held.guard = Some(lock.lock_owned().await);
        held
    }

    fn release_key_lock(&self, key: &str) {
        let mut locks = self.key_locks();
        if let Some(slot) = locks.get_mut(key) {
            slot.users = slot.users.saturating_sub(1);
            if slot.users == 0 {
                locks.remove(key);
            }
        }
    }

    /// Delete every expired or corrupt entry
    ///
    /// Returns the number of files removed.
    pub async fn purge_expired(&self) -> Result<usize, StoreError> {
        let mut removed = 0;
        for path in self.entry_files().await? {
            let Some(key) = path.file_stem().and_then(|s| s.to_str()) else {
                continue;
            };
            let _held = self.lock_key(key).await;

            let stale = match fs::read(&path).await {
                Ok(bytes) => match serde_json::from_slice::<CacheFile>(&bytes) {
                    Ok(file) => self.is_expired(file.stored_at),
                    Err(_) => true,
                },
                Err(e) if e.kind() == ErrorKind::NotFound => continue,
                Err(e) => return Err(StoreError::io(&path, e)),
            };
            if stale {
                remove_if_present(&path).await?;
                removed += 1;
            }
        }

        info!("Purged {} stale cache entries from {}", removed, self.dir.display());
        Ok(removed)
    }

    /// Delete every entry and leftover temporary file
    ///
    /// Returns the number of entries removed.
    pub async fn clear(&self) -> Result<usize, StoreError> {
        let mut removed = 0;
        let mut dir = fs::read_dir(&self.dir)
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?;

        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?
        {
            let path = entry.path();
            if is_entry_file(&path) {
                remove_if_present(&path).await?;
                removed += 1;
            } else if is_temp_file(&path) {
                remove_if_present(&path).await?;
            }
        }

        info!("Cleared {} cache entries from {}", removed, self.dir.display());
        Ok(removed)
    }

    /// Count entries and their total size
    pub async fn stats(&self) -> Result<CacheStats, StoreError> {
        let mut stats = CacheStats::default();
        for path in self.entry_files().await? {
            match fs::metadata(&path).await {
                Ok(meta) => {
                    stats.entries += 1;
                    stats.total_bytes += meta.len();
                }
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(StoreError::io(&path, e)),
            }
        }
        Ok(stats)
    }

    async fn entry_files(&self) -> Result<Vec<PathBuf>, StoreError> {
        let mut files = Vec::new();
        let mut dir = fs::read_dir(&self.dir)
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?;

        while let Some(entry) = dir
            .next_entry()
            .await
            .map_err(|e| StoreError::io(&self.dir, e))?
        {
            let path = entry.path();
            if is_entry_file(&path) {
                files.push(path);
            }
        }
        Ok(files)
    }
}

async fn remove_if_present(path: &Path) -> Result<(), StoreError> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(StoreError::io(path, e)),
    }
}

/// `<64 hex chars>.json`
fn is_entry_file(path: &Path) -> bool {
    let is_json = path.extension().and_then(|e| e.to_str()) == Some(ENTRY_EXTENSION);
    let stem_is_digest = path
        .file_stem()
        .and_then(|s| s.to_str())
        .is_some_and(|s| s.len() == 64 && s.bytes().all(|b| b.is_ascii_hexdigit()));
    is_json && stem_is_digest
}

fn is_temp_file(path: &Path) -> bool {
    let name = path.file_name().and_then(|n| n.to_str()).unwrap_or_default();
    name.starts_with('.') && name.ends_with(TEMP_EXTENSION)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ManualClock;
    use serde_json::json;
    use tempfile::TempDir;

    const DAY: u64 = 86_400;

    async fn cache_with_clock(dir: &TempDir, clock: Arc<ManualClock>) -> ResultCache {
        ResultCache::open(dir.path(), Duration::from_secs(7 * DAY))
            .await
            .unwrap()
            .with_clock(clock)
    }

    #[test]
    fn test_cache_key_is_sha256_hex_of_normalized_query() {
        let key = cache_key("Acme contact email");
        assert_eq!(key.len(), 64);
        assert!(key.bytes().all(|b| b.is_ascii_hexdigit()));
        assert_eq!(key, cache_key("  Acme   contact email\n"));
        assert_ne!(key, cache_key("acme contact email"));
    }

    #[test]
    fn test_entry_file_detection() {
        let key = cache_key("q");
        assert!(is_entry_file(Path::new(&format!("/c/{}.json", key))));
        assert!(!is_entry_file(Path::new("/c/notes.json")));
        assert!(!is_entry_file(Path::new(&format!("/c/{}.txt", key))));
        assert!(is_temp_file(Path::new("/c/.abc.123.tmp")));
    }

    #[tokio::test]
    async fn test_put_then_get_round_trip() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(1_000_000));
        let cache = cache_with_clock(&dir, clock).await;

        let payload = json!({"items": [{"title": "Acme"}]});
        cache.put("Acme contact email", &payload).await.unwrap();

        let entry = cache.get("Acme contact email").await.unwrap().unwrap();
        assert_eq!(entry.result, payload);
        assert_eq!(entry.stored_at, 1_000_000);
        assert_eq!(entry.query_hash, cache_key("Acme contact email"));
    }

    #[tokio::test]
    async fn test_file_format() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(42));
        let cache = cache_with_clock(&dir, clock).await;

        cache.put("q", &json!([1, 2])).await.unwrap();

        let raw = std::fs::read_to_string(cache.entry_path("q")).unwrap();
        let value: Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(value, json!({"result": [1, 2], "stored_at": 42}));
    }

    #[tokio::test]
    async fn test_expired_entry_is_removed_on_get() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(1_000_000));
        let cache = cache_with_clock(&dir, clock.clone()).await;

        cache.put("q", &json!("r")).await.unwrap();
        let path = cache.entry_path("q");

        // Exactly at the expiry boundary the entry is still valid
        clock.advance(Duration::from_secs(7 * DAY));
        assert!(cache.get("q").await.unwrap().is_some());

        clock.advance(Duration::from_secs(1));
        assert!(cache.get("q").await.unwrap().is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_put_overwrites() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(100));
        let cache = cache_with_clock(&dir, clock.clone()).await;

        cache.put("q", &json!("first")).await.unwrap();
        clock.advance(Duration::from_secs(10));
        cache.put("q", &json!("second")).await.unwrap();

        let entry = cache.get("q").await.unwrap().unwrap();
        assert_eq!(entry.result, json!("second"));
        assert_eq!(entry.stored_at, 110);
    }

    #[tokio::test]
    async fn test_corrupt_entry_is_a_miss() {
        let dir = TempDir::new().unwrap();
        let cache = cache_with_clock(&dir, Arc::new(ManualClock::new(0))).await;

        let path = cache.entry_path("q");
        std::fs::write(&path, b"{not json").unwrap();

        assert!(cache.get("q").await.unwrap().is_none());
        assert!(!path.exists());
    }

    #[tokio::test]
    async fn test_get_or_fetch_miss_then_hit() {
        let dir = TempDir::new().unwrap();
        let cache = cache_with_clock(&dir, Arc::new(ManualClock::new(0))).await;

        let first: Fetched<String> = cache
            .get_or_fetch("q", || async { Ok::<_, String>("fetched".to_string()) })
            .await
            .unwrap();
        assert!(!first.cache_hit);
        assert!(first.store_error.is_none());

        let second: Fetched<String> = cache
            .get_or_fetch("q", || async { Err::<String, _>("must not be called".to_string()) })
            .await
            .unwrap();
        assert!(second.cache_hit);
        assert_eq!(second.value, "fetched");
    }

    #[tokio::test]
    async fn test_get_or_fetch_error_is_not_cached() {
        let dir = TempDir::new().unwrap();
        let cache = cache_with_clock(&dir, Arc::new(ManualClock::new(0))).await;

        let result = cache
            .get_or_fetch::<String, _, _, _>("q", || async { Err("boom".to_string()) })
            .await;
        assert_eq!(result.unwrap_err(), "boom");
        assert!(cache.get("q").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_get_or_fetch_refetches_on_shape_mismatch() {
        let dir = TempDir::new().unwrap();
        let cache = cache_with_clock(&dir, Arc::new(ManualClock::new(0))).await;
        cache.put("q", &json!({"unexpected": true})).await.unwrap();

        let fetched: Fetched<Vec<u32>> = cache
            .get_or_fetch("q", || async { Ok::<_, String>(vec![1, 2, 3]) })
            .await
            .unwrap();
        assert!(!fetched.cache_hit);
        assert_eq!(fetched.value, vec![1, 2, 3]);
    }

    #[tokio::test]
    async fn test_key_locks_are_released() {
        let dir = TempDir::new().unwrap();
        let cache = cache_with_clock(&dir, Arc::new(ManualClock::new(0))).await;

        let _: Fetched<u8> = cache
            .get_or_fetch("q", || async { Ok::<_, String>(1) })
            .await
            .unwrap();
        assert!(cache.key_locks().is_empty());
    }

    #[tokio::test]
    async fn test_eviction_never_removes_a_newer_write() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(0));
        let cache = Arc::new(cache_with_clock(&dir, clock.clone()).await);

        cache.put("q", &json!("old")).await.unwrap();
        clock.advance(Duration::from_secs(8 * DAY));

        // A reader and a purge queue up on the key while a fresh write lands
        let key = cache_key("q");
        let held = cache.lock_key(&key).await;
        let reader = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.get("q").await }
        });
        let purge = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.purge_expired().await }
        });
        tokio::task::yield_now().await;

        cache.write_entry(&key, &json!("fresh")).await.unwrap();
        drop(held);

        let seen = reader.await.unwrap().unwrap().unwrap();
        assert_eq!(seen.result, json!("fresh"));
        assert_eq!(purge.await.unwrap().unwrap(), 0);
        assert!(cache.entry_path("q").exists());
    }

    #[tokio::test]
    async fn test_put_waits_for_the_key() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(0));
        let cache = Arc::new(cache_with_clock(&dir, clock.clone()).await);
        cache.put("q", &json!("first")).await.unwrap();

        let held = cache.lock_key(&cache_key("q")).await;
        let writer = tokio::spawn({
            let cache = Arc::clone(&cache);
            async move { cache.put("q", &json!("second")).await }
        });
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!writer.is_finished());

        drop(held);
        writer.await.unwrap().unwrap();
        assert_eq!(cache.get("q").await.unwrap().unwrap().result, json!("second"));
    }

    #[tokio::test]
    async fn test_cancelled_callers_release_their_key() {
        let dir = TempDir::new().unwrap();
        let cache = cache_with_clock(&dir, Arc::new(ManualClock::new(0))).await;

        let slow_fetch = tokio::time::timeout(
            Duration::from_millis(20),
            cache.get_or_fetch::<u8, String, _, _>("q", || async {
                tokio::time::sleep(Duration::from_secs(60)).await;
                Ok(1)
            }),
        )
        .await;
        assert!(slow_fetch.is_err());
        assert!(cache.key_locks().is_empty());

        // Dropped while still queued behind a holder
        let key = cache_key("q");
        let held = cache.lock_key(&key).await;
        let queued = tokio::time::timeout(Duration::from_millis(20), cache.get("q")).await;
        assert!(queued.is_err());
        assert_eq!(cache.key_locks()[&key].users, 1);

        drop(held);
        assert!(cache.key_locks().is_empty());
    }

    #[tokio::test]
    async fn test_unreadable_entry_degrades_to_a_miss() {
        let dir = TempDir::new().unwrap();
        let cache = cache_with_clock(&dir, Arc::new(ManualClock::new(0))).await;

        // A directory where the entry file should be: reads and writes both fail
        std::fs::create_dir(cache.entry_path("q")).unwrap();
        assert!(cache.get("q").await.is_err());

        let fetched: Fetched<String> = cache
            .get_or_fetch("q", || async { Ok::<_, String>("fetched".to_string()) })
            .await
            .unwrap();
        assert!(!fetched.cache_hit);
        assert_eq!(fetched.value, "fetched");
        assert!(fetched.store_error.is_some());
    }

    #[tokio::test]
    async fn test_purge_clear_and_stats() {
        let dir = TempDir::new().unwrap();
        let clock = Arc::new(ManualClock::new(0));
        let cache = cache_with_clock(&dir, clock.clone()).await;

        cache.put("old", &json!(1)).await.unwrap();
        clock.advance(Duration::from_secs(8 * DAY));
        cache.put("new", &json!(2)).await.unwrap();
        std::fs::write(dir.path().join("README.txt"), "not an entry").unwrap();

        let stats = cache.stats().await.unwrap();
        assert_eq!(stats.entries, 2);
        assert!(stats.total_bytes > 0);

        assert_eq!(cache.purge_expired().await.unwrap(), 1);
        assert!(cache.get("new").await.unwrap().is_some());

        assert_eq!(cache.clear().await.unwrap(), 1);
        assert_eq!(cache.stats().await.unwrap(), CacheStats::default());
        assert!(dir.path().join("README.txt").exists());
    }
}
