//! On-disk cache implementation.

use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use datareader_core::{CacheEntry, DataError, ResponseCache, Result, cache_key};
use tokio::fs;
use tracing::{debug, instrument, warn};

/// File extension of cache entries.
const ENTRY_EXTENSION: &str = "cache";

/// Cache storing one JSON-encoded [`CacheEntry`] per file.
///
/// Entries live at `<dir>/<sha256-hex of key>.cache`, so different keys never
/// share a file and no cross-key locking is needed. Concurrent writers of the
/// same key race and the last write wins.
#[derive(Clone, Debug)]
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    /// Create a cache rooted at `dir`.
    ///
    /// The directory is created on the first write if it does not exist.
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Directory holding the cache files.
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path of the file backing `key`.
    #[must_use]
    pub fn entry_path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.{ENTRY_EXTENSION}", cache_key(key)))
    }

    /// Removes every cache file. Returns the number of files removed.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be listed or a file cannot be removed.
    pub async fn clear(&self) -> Result<usize> {
        let mut removed = 0usize;
        for path in self.entry_files().await? {
            remove_if_present(&path).await?;
            removed += 1;
        }
        debug!(removed, dir = %self.dir.display(), "Cleared file cache");
        Ok(removed)
    }

    /// Removes expired and unreadable entries. Returns the number removed.
    ///
    /// # Errors
    /// Returns an error if the directory cannot be listed.
    pub async fn purge_expired(&self) -> Result<usize> {
        let mut removed = 0usize;
        for path in self.entry_files().await? {
            if read_entry(&path).await.is_none_or(|entry| entry.is_expired()) {
                if let Err(e) = remove_if_present(&path).await {
                    warn!(path = %path.display(), error = %e, "Failed to remove stale cache file");
                    continue;
                }
                removed += 1;
            }
        }
        Ok(removed)
    }

    async fn entry_files(&self) -> Result<Vec<PathBuf>> {
        let mut entries = match fs::read_dir(&self.dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(DataError::Cache(e.to_string())),
        };

        let mut files = Vec::new();
        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| DataError::Cache(e.to_string()))?
        {
            let path = entry.path();
            if path.extension().and_then(|ext| ext.to_str()) == Some(ENTRY_EXTENSION) {
                files.push(path);
            }
        }
        Ok(files)
    }
}

#[async_trait]
impl ResponseCache for FileCache {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let path = self.entry_path(key);

        let Some(entry) = read_entry(&path).await else {
            // Unreadable or corrupt files are dropped so the next write starts clean.
            if fs::try_exists(&path).await.unwrap_or(false) {
                let _ = remove_if_present(&path).await;
            }
            debug!("Cache miss");
            return None;
        };

        if entry.is_expired() {
            debug!("Cache entry expired");
            let _ = remove_if_present(&path).await;
            return None;
        }

        debug!(bytes = entry.data.len(), "Cache hit");
        Some(entry.data)
    }

    #[instrument(skip(self, data), fields(bytes = data.len()))]
    async fn set(&self, key: &str, data: &[u8], ttl: Duration) -> Result<()> {
        fs::create_dir_all(&self.dir)
            .await
            .map_err(|e| DataError::Cache(format!("{}: {e}", self.dir.display())))?;

        let entry = CacheEntry::new(data.to_vec(), ttl);
        let encoded = serde_json::to_vec(&entry).map_err(|e| DataError::Cache(e.to_string()))?;

        let path = self.entry_path(key);
        fs::write(&path, encoded)
            .await
            .map_err(|e| DataError::Cache(format!("{}: {e}", path.display())))?;

        debug!("Cached response");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<()> {
        remove_if_present(&self.entry_path(key)).await
    }
}

async fn read_entry(path: &Path) -> Option<CacheEntry> {
    let bytes = fs::read(path).await.ok()?;
    serde_json::from_slice(&bytes).ok()
}

async fn remove_if_present(path: &Path) -> Result<()> {
    match fs::remove_file(path).await {
        Ok(()) => Ok(()),
        Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
        Err(e) => Err(DataError::Cache(format!("{}: {e}", path.display()))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const URL: &str = "https://stooq.com/q/d/l/?s=aapl.us&i=d";

    #[tokio::test]
    async fn test_file_cache_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("nested"));

        assert!(cache.get(URL).await.is_none());

        cache
            .set(URL, b"Date,Close\n2024-01-02,185.6\n", Duration::from_secs(60))
            .await
            .unwrap();

        assert_eq!(
            cache.get(URL).await.as_deref(),
            Some(&b"Date,Close\n2024-01-02,185.6\n"[..])
        );
        assert!(cache.entry_path(URL).exists());
        assert_eq!(
            cache.entry_path(URL).file_name().unwrap().to_str().unwrap(),
            format!("{}.cache", cache_key(URL))
        );
    }

    #[tokio::test]
    async fn test_file_cache_expiry() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());

        cache
            .set(URL, b"payload", Duration::from_millis(50))
            .await
            .unwrap();
        assert!(cache.get(URL).await.is_some());

        tokio::time::sleep(Duration::from_millis(120)).await;

        assert!(cache.get(URL).await.is_none());
        assert!(!cache.entry_path(URL).exists());
    }

    #[tokio::test]
    async fn test_file_cache_zero_ttl_is_permanent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());

        cache.set(URL, b"payload", Duration::ZERO).await.unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(cache.get(URL).await, Some(b"payload".to_vec()));
    }

    #[tokio::test]
    async fn test_file_cache_corrupt_entry_is_a_miss() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());

        std::fs::write(cache.entry_path(URL), b"not json").unwrap();

        assert!(cache.get(URL).await.is_none());
        assert!(!cache.entry_path(URL).exists());
    }

    #[tokio::test]
    async fn test_file_cache_delete_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());

        cache.set(URL, b"payload", Duration::ZERO).await.unwrap();
        cache.delete(URL).await.unwrap();
        cache.delete(URL).await.unwrap();

        assert!(cache.get(URL).await.is_none());
    }

    #[tokio::test]
    async fn test_file_cache_maintenance() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path());

        cache
            .set("https://a.example", b"a", Duration::from_millis(10))
            .await
            .unwrap();
        cache
            .set("https://b.example", b"b", Duration::ZERO)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(cache.purge_expired().await.unwrap(), 1);
        assert_eq!(cache.clear().await.unwrap(), 1);
        assert!(cache.get("https://b.example").await.is_none());
    }

    #[tokio::test]
    async fn test_file_cache_missing_dir_lists_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let cache = FileCache::new(dir.path().join("absent"));

        assert_eq!(cache.clear().await.unwrap(), 0);
    }
}
