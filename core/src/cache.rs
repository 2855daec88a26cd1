//! Disk-backed cache with cross-process lock coordination.
//!
//! Many independent processes may share one account authorization. The only
//! coordination medium is the filesystem: a JSON cache file per key, plus a
//! zero-byte lock file whose existence marks "a producer is computing the
//! value for this key". Readers never take the lock; a producer must hold it
//! before writing the cache file.

use crate::hash::hex_md5;
use crate::{Error, Result};
use serde::de::DeserializeOwned;
use serde::Serialize;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Poll interval while another process holds the lock.
const LOCK_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// Locks older than this are treated as left behind by a crashed producer and
/// force-cleared. A full handshake with exhausted retries stays well under a
/// minute, so a lock this old has no live owner.
const STALE_LOCK_AGE: Duration = Duration::from_secs(60);

/// Cache key: a scope (`oauth`, `meters`) plus a 16-hex-char digest of the
/// account identity.
///
/// The file names derived from it are a cross-process interface:
/// `.{scope}.{hash}.json` and `.{scope}.{hash}.lock`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
    scope: String,
    hash: String,
}

impl CacheKey {
    /// Build a key from a scope and the identity string it hashes.
    pub fn new(scope: &str, identity: &str) -> Self {
        Self {
            scope: scope.to_string(),
            hash: hex_md5(identity.as_bytes())[..16].to_string(),
        }
    }

    /// The hash part of the key.
    pub fn hash(&self) -> &str {
        &self.hash
    }

    fn cache_file(&self) -> String {
        format!(".{}.{}.json", self.scope, self.hash)
    }

    fn lock_file(&self) -> String {
        format!(".{}.{}.lock", self.scope, self.hash)
    }
}

/// DiskCache serves cached JSON payloads and coordinates a single producer
/// across processes.
///
/// An entry is valid iff `now - mtime < ttl`. A TTL of zero disables caching:
/// every call takes the lock/produce path, so concurrent callers are still
/// de-duplicated, but nothing is persisted.
#[derive(Debug, Clone)]
pub struct DiskCache {
    dir: PathBuf,
    ttl: u64,
    lock_waits: Arc<AtomicU64>,
}

impl DiskCache {
    /// Create a cache over the given directory, creating it if missing.
    ///
    /// Passing `None` uses the system temp directory. A path that exists but
    /// is not a directory, or that cannot be created, is a
    /// [`crate::ErrorKind::CacheInvalid`] error.
    pub fn new(dir: Option<PathBuf>) -> Result<Self> {
        let dir = dir.unwrap_or_else(std::env::temp_dir);

        if dir.exists() {
            if !dir.is_dir() {
                return Err(Error::cache_invalid(format!(
                    "invalid cache: {}",
                    dir.display()
                )));
            }
        } else {
            std::fs::create_dir_all(&dir).map_err(|e| {
                Error::cache_invalid(format!("can not create cache: {}", dir.display()))
                    .with_source(e)
            })?;
        }

        Ok(Self {
            dir,
            ttl: 0,
            lock_waits: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Set the TTL in seconds. Negative values clamp to 0 (caching disabled).
    pub fn with_ttl(mut self, ttl: i64) -> Self {
        self.ttl = ttl.max(0) as u64;
        self
    }

    /// The TTL in seconds.
    pub fn ttl(&self) -> u64 {
        self.ttl
    }

    /// The cache directory.
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// How many 100 ms lock-wait rounds this cache has spent so far.
    pub fn lock_waits(&self) -> u64 {
        self.lock_waits.load(Ordering::Relaxed)
    }

    /// Return the cached payload for `key` if fresh, else coordinate a single
    /// producer and return its result.
    pub async fn get_or_produce<T, F, Fut>(&self, key: &CacheKey, producer: F) -> Result<T>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let cache_path = self.dir.join(key.cache_file());
        let lock_path = self.dir.join(key.lock_file());

        self.evict_stale(&cache_path).await?;

        loop {
            self.wait_for_lock(&lock_path).await?;

            // Another process may have produced the value while we waited.
            if self.ttl > 0 {
                if let Some(value) = self.read_entry(&cache_path).await? {
                    log::debug!("cache: served {} from {}", key.hash, cache_path.display());
                    return Ok(value);
                }
            }

            // Exclusive create is the lock-acquire primitive: losing the race
            // surfaces as AlreadyExists, never as two owners.
            match tokio::fs::OpenOptions::new()
                .write(true)
                .create_new(true)
                .open(&lock_path)
                .await
            {
                Ok(_) => break,
                Err(e) if e.kind() == std::io::ErrorKind::AlreadyExists => continue,
                Err(e) => {
                    return Err(Error::cache_invalid(format!(
                        "can not create lock: {}",
                        lock_path.display()
                    ))
                    .with_source(e))
                }
            }
        }

        let guard = LockGuard::new(lock_path);
        log::debug!("cache: producing {}", key.hash);

        let produced = producer().await;

        let result = match produced {
            Ok(value) => {
                if self.ttl > 0 {
                    self.write_entry(&cache_path, &value).await?;
                }
                Ok(value)
            }
            Err(e) => Err(e),
        };

        guard.release().await;

        result
    }

    /// Remove the entry if it is older than the TTL (always, for ttl = 0).
    async fn evict_stale(&self, cache_path: &Path) -> Result<()> {
        let age = match entry_age(cache_path).await {
            Some(age) => age,
            None => return Ok(()),
        };

        if self.ttl == 0 || age >= Duration::from_secs(self.ttl) {
            log::debug!("cache: evicting stale {}", cache_path.display());
            remove_if_exists(cache_path).await?;
        }

        Ok(())
    }

    /// Block until no one holds the lock, force-clearing abandoned locks.
    async fn wait_for_lock(&self, lock_path: &Path) -> Result<()> {
        loop {
            let age = match entry_age(lock_path).await {
                Some(age) => age,
                None => return Ok(()),
            };

            if age >= STALE_LOCK_AGE {
                log::warn!("cache: clearing stale lock {}", lock_path.display());
                remove_if_exists(lock_path).await?;
                continue;
            }

            self.lock_waits.fetch_add(1, Ordering::Relaxed);
            tokio::time::sleep(LOCK_POLL_INTERVAL).await;
        }
    }

    async fn read_entry<T: DeserializeOwned>(&self, cache_path: &Path) -> Result<Option<T>> {
        let bytes = match tokio::fs::read(cache_path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match serde_json::from_slice(&bytes) {
            Ok(value) => Ok(Some(value)),
            Err(e) => {
                // A corrupt entry is unrecoverable; drop it and re-produce.
                log::warn!(
                    "cache: discarding undecodable entry {}: {}",
                    cache_path.display(),
                    e
                );
                remove_if_exists(cache_path).await?;
                Ok(None)
            }
        }
    }

    /// Write the payload to a temp file and rename it into place, so readers
    /// never observe partial JSON.
    async fn write_entry<T: Serialize>(&self, cache_path: &Path, value: &T) -> Result<()> {
        let bytes = serde_json::to_vec(value)?;

        let mut tmp_path = cache_path.as_os_str().to_owned();
        tmp_path.push(".tmp");
        let tmp_path = PathBuf::from(tmp_path);

        tokio::fs::write(&tmp_path, &bytes).await?;
        tokio::fs::rename(&tmp_path, cache_path).await?;

        Ok(())
    }
}

/// Removes the lock file when the producer section ends, on every exit path.
///
/// The normal path releases asynchronously; if the guard is dropped without
/// release (panic, early return), Drop falls back to a blocking removal so
/// the key can never stay stuck behind a dead producer.
struct LockGuard {
    path: PathBuf,
    released: bool,
}

impl LockGuard {
    fn new(path: PathBuf) -> Self {
        Self {
            path,
            released: false,
        }
    }

    async fn release(mut self) {
        self.released = true;
        if let Err(e) = tokio::fs::remove_file(&self.path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                log::error!("cache: failed to remove lock {}: {}", self.path.display(), e);
            }
        }
    }
}

impl Drop for LockGuard {
    fn drop(&mut self) {
        if !self.released {
            let _ = std::fs::remove_file(&self.path);
        }
    }
}

/// Age of a filesystem entry, `None` if it does not exist.
///
/// An mtime in the future counts as age zero.
async fn entry_age(path: &Path) -> Option<Duration> {
    let meta = tokio::fs::metadata(path).await.ok()?;
    let modified = meta.modified().ok()?;
    Some(modified.elapsed().unwrap_or_default())
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    match tokio::fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
        Err(e) => Err(e.into()),
    }
}
