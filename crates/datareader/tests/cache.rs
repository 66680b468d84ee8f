//! Cache backends exposed through the umbrella crate.

use std::sync::Arc;
use std::time::Duration;

use datareader::{InMemoryCache, ResponseCache, RetryableClient};

#[tokio::test]
async fn test_in_memory_cache_without_sqlite() {
    let cache: Arc<dyn ResponseCache> = Arc::new(InMemoryCache::new());
    cache.set("key", b"body", Duration::ZERO).await.unwrap();

    let client = RetryableClient::new(&datareader::ClientOptions::default())
        .unwrap()
        .with_cache(Some(cache));

    let cache = client.cache().unwrap();
    assert_eq!(cache.get("key").await, Some(b"body".to_vec()));
}

#[cfg(feature = "cache-sqlite")]
#[tokio::test]
async fn test_sqlite_cache_enabled_by_feature() {
    let cache = datareader::SqliteCache::in_memory().unwrap();
    cache.set("key", b"body", Duration::ZERO).await.unwrap();

    assert_eq!(cache.get("key").await, Some(b"body".to_vec()));
    cache.delete("key").await.unwrap();
    assert_eq!(cache.get("key").await, None);
}
