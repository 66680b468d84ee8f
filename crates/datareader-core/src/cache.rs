//! Storage contract for cached HTTP responses.
//!
//! This module defines the [`ResponseCache`] trait implemented by the
//! backends in `datareader-cache`, the [`CacheEntry`] record they persist and
//! [`cache_key`], the URL digest used to address entries.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, TimeDelta, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::error::{DataError, Result};

/// Returns the SHA-256 hex digest of a request URL.
#[must_use]
pub fn cache_key(url: &str) -> String {
    hex::encode(Sha256::digest(url.as_bytes()))
}

/// A cached response body and its expiry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CacheEntry {
    /// Raw response bytes.
    #[serde(with = "hex_bytes")]
    pub data: Vec<u8>,
    /// Expiry instant; `None` never expires.
    pub expires_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    /// Creates an entry that expires `ttl` from now. A zero TTL never expires.
    #[must_use]
    pub fn new(data: Vec<u8>, ttl: Duration) -> Self {
        let expires_at = if ttl.is_zero() {
            None
        } else {
            TimeDelta::from_std(ttl)
                .ok()
                .and_then(|delta| Utc::now().checked_add_signed(delta))
        };
        Self { data, expires_at }
    }

    /// Returns true if the entry is past its expiry at `now`.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at.is_some_and(|expires_at| now >= expires_at)
    }

    /// Returns true if the entry is past its expiry.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }
}

/// Storage for response bodies keyed by request URL.
///
/// Implementations must be safe under concurrent use. Reads never fail: a
/// missing, corrupt or expired entry is a miss, and corrupt or expired
/// entries are removed as a side effect.
#[async_trait]
pub trait ResponseCache: Send + Sync + std::fmt::Debug {
    /// Returns the cached bytes for `key`, or `None` on a miss.
    async fn get(&self, key: &str) -> Option<Vec<u8>>;

    /// Stores `data` under `key`. A zero `ttl` means no expiration.
    async fn set(&self, key: &str, data: &[u8], ttl: Duration) -> Result<()>;

    /// Removes `key`. Removing an absent key succeeds.
    async fn delete(&self, key: &str) -> Result<()>;
}

/// A disabled cache: reads miss and writes report [`DataError::NilCache`].
#[async_trait]
impl<C> ResponseCache for Option<Arc<C>>
where
    C: ResponseCache + ?Sized,
{
    async fn get(&self, key: &str) -> Option<Vec<u8>> {
        match self {
            Some(cache) => cache.get(key).await,
            None => None,
        }
    }

    async fn set(&self, key: &str, data: &[u8], ttl: Duration) -> Result<()> {
        match self {
            Some(cache) => cache.set(key, data, ttl).await,
            None => Err(DataError::NilCache),
        }
    }

    async fn delete(&self, key: &str) -> Result<()> {
        match self {
            Some(cache) => cache.delete(key).await,
            None => Err(DataError::NilCache),
        }
    }
}

mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub(super) fn serialize<S: Serializer>(data: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(data))
    }

    pub(super) fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Vec<u8>, D::Error> {
        let text = String::deserialize(deserializer)?;
        hex::decode(text).map_err(serde::de::Error::custom)
    }
}
