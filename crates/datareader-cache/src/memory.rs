//! In-memory cache implementation.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use datareader_core::{CacheEntry, ResponseCache, Result};
use tokio::sync::RwLock;
use tracing::{debug, instrument};

/// Simple in-memory cache for testing and development.
///
/// Entries are stored in a `RwLock`-protected `HashMap` and are lost when the
/// cache is dropped. Expired entries are evicted lazily on read.
#[derive(Debug, Default)]
pub struct InMemoryCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
}

impl InMemoryCache {
    /// Create a new empty in-memory cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored entries, expired ones included.
    pub async fn len(&self) -> usize {
        self.entries.read().await.len()
    }

    /// Returns true if nothing is stored.
    pub async fn is_empty(&self) -> bool {
        self.entries.read().await.is_empty()
    }

    /// Removes expired entries. Returns the number removed.
    #[instrument(skip(self))]
    pub async fn purge_expired(&self) -> usize {
        let mut entries = self.entries.write().await;
        let before = entries.len();
        entries.retain(|_, entry| !entry.is_expired());
        let removed = before - entries.len();
        if removed > 0 {
            debug!("Invalidated {} expired cache entries", removed);
        }
        removed
    }

    /// Removes every entry.
    pub async fn clear(&self) {
        self.entries.write().await.clear();
        debug!("Cleared all cache entries");
    }
}

#[async_trait]
impl ResponseCache for InMemoryCache {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                None => {
                    debug!("Cache miss");
                    return None;
                }
                Some(entry) if !entry.is_expired() => {
                    debug!("Cache hit");
                    return Some(entry.data.clone());
                }
                Some(_) => {}
            }
        }

        // Expired: re-check under the write lock, a writer may have refreshed it.
        let mut entries = self.entries.write().await;
        if entries.get(key).is_some_and(CacheEntry::is_expired) {
            entries.remove(key);
            debug!("Cache entry expired");
            return None;
        }
        entries.get(key).map(|entry| entry.data.clone())
    }

    #[instrument(skip(self, data), fields(bytes = data.len()))]
    async fn set(&self, key: &str, data: &[u8], ttl: Duration) -> Result<()> {
        let mut entries = self.entries.write().await;
        entries.insert(key.to_string(), CacheEntry::new(data.to_vec(), ttl));
        debug!("Cached response");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<()> {
        self.entries.write().await.remove(key);
        Ok(())
    }
}
