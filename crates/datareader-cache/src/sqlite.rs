//! SQLite-based cache implementation.

use std::path::Path;
use std::sync::Mutex;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use datareader_core::{CacheEntry, DataError, ResponseCache, Result};
use rusqlite::{Connection, OptionalExtension, params};
use tracing::{debug, instrument, warn};

/// SQLite-based response cache.
///
/// Stores every entry in a single database file, providing persistence across
/// application restarts. Expiry is kept as Unix milliseconds; `NULL` never expires.
#[derive(Debug)]
pub struct SqliteCache {
    conn: Mutex<Connection>,
}

impl SqliteCache {
    /// Create a new SQLite cache at the given path.
    ///
    /// # Arguments
    /// * `path` - Path to the SQLite database file
    ///
    /// # Errors
    /// Returns an error if the database cannot be opened or schema creation fails.
    pub fn new(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path).map_err(|e| DataError::Cache(e.to_string()))?;
        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Create an in-memory SQLite cache.
    ///
    /// Useful for testing; data is lost when the cache is dropped.
    ///
    /// # Errors
    /// Returns an error if schema creation fails.
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(|e| DataError::Cache(e.to_string()))?;
        let cache = Self {
            conn: Mutex::new(conn),
        };
        cache.initialize_schema()?;
        Ok(cache)
    }

    /// Initialize the database schema.
    fn initialize_schema(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DataError::Cache(e.to_string()))?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS response_cache (
                key TEXT PRIMARY KEY NOT NULL,
                data BLOB NOT NULL,
                expires_at INTEGER
            )",
            [],
        )
        .map_err(|e| DataError::Cache(e.to_string()))?;

        debug!("SQLite cache schema initialized");
        Ok(())
    }

    /// Removes expired entries. Returns the number removed.
    ///
    /// # Errors
    /// Returns an error if the delete statement fails.
    #[instrument(skip(self))]
    pub fn purge_expired(&self) -> Result<usize> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DataError::Cache(e.to_string()))?;

        let removed = conn
            .execute(
                "DELETE FROM response_cache WHERE expires_at IS NOT NULL AND expires_at <= ?1",
                params![Utc::now().timestamp_millis()],
            )
            .map_err(|e| DataError::Cache(e.to_string()))?;

        if removed > 0 {
            debug!("Invalidated {} expired cache entries", removed);
        }
        Ok(removed)
    }

    /// Removes every entry.
    ///
    /// # Errors
    /// Returns an error if the delete statement fails.
    pub fn clear(&self) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DataError::Cache(e.to_string()))?;
        conn.execute("DELETE FROM response_cache", [])
            .map_err(|e| DataError::Cache(e.to_string()))?;
        debug!("Cleared all cache entries");
        Ok(())
    }

    fn load(&self, key: &str) -> Result<Option<CacheEntry>> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DataError::Cache(e.to_string()))?;

        let row = conn
            .query_row(
                "SELECT data, expires_at FROM response_cache WHERE key = ?1",
                params![key],
                |row| Ok((row.get::<_, Vec<u8>>(0)?, row.get::<_, Option<i64>>(1)?)),
            )
            .optional()
            .map_err(|e| DataError::Cache(e.to_string()))?;

        Ok(row.map(|(data, expires_at)| CacheEntry {
            data,
            expires_at: expires_at.and_then(DateTime::<Utc>::from_timestamp_millis),
        }))
    }

    fn remove(&self, key: &str) -> Result<()> {
        let conn = self
            .conn
            .lock()
            .map_err(|e| DataError::Cache(e.to_string()))?;
        conn.execute("DELETE FROM response_cache WHERE key = ?1", params![key])
            .map_err(|e| DataError::Cache(e.to_string()))?;
        Ok(())
    }
}

#[async_trait]
impl ResponseCache for SqliteCache {
    #[instrument(skip(self))]
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        let entry = match self.load(key) {
            Ok(Some(entry)) => entry,
            Ok(None) => {
                debug!("Cache miss");
                return None;
            }
            Err(e) => {
                warn!(error = %e, "Cache read failed, treating as miss");
                return None;
            }
        };

        if entry.is_expired() {
            debug!("Cache entry expired");
            if let Err(e) = self.remove(key) {
                warn!(error = %e, "Failed to evict expired entry");
            }
            return None;
        }

        debug!(bytes = entry.data.len(), "Cache hit");
        Some(entry.data)
    }

    #[instrument(skip(self, data), fields(bytes = data.len()))]
    async fn set(&self, key: &str, data: &[u8], ttl: Duration) -> Result<()> {
        let entry = CacheEntry::new(data.to_vec(), ttl);
        let expires_at = entry.expires_at.map(|at| at.timestamp_millis());

        let conn = self
            .conn
            .lock()
            .map_err(|e| DataError::Cache(e.to_string()))?;
        conn.execute(
            "INSERT OR REPLACE INTO response_cache (key, data, expires_at) VALUES (?1, ?2, ?3)",
            params![key, entry.data, expires_at],
        )
        .map_err(|e| DataError::Cache(e.to_string()))?;

        debug!("Cached response");
        Ok(())
    }

    #[instrument(skip(self))]
    async fn delete(&self, key: &str) -> Result<()> {
        self.remove(key)
    }
}
