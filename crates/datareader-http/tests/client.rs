//! Behaviour of the retrying client against a local mock server.

use std::sync::Arc;
use std::time::{Duration, Instant};

use datareader_cache::InMemoryCache;
use datareader_core::{CancellationToken, ClientOptions, DataError, FetchStage, ResponseCache};
use datareader_http::{HeaderMap, HeaderValue, RetryableClient, StatusCode};
use httpmock::prelude::*;

fn fast_options(max_retries: u32) -> ClientOptions {
    ClientOptions::default().with_retries(max_retries, Duration::from_millis(5))
}

#[tokio::test]
async fn test_server_errors_are_retried_until_exhausted() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/flaky");
            then.status(500).body("boom");
        })
        .await;

    let client = RetryableClient::new(&fast_options(2)).unwrap();
    let response = client
        .get(&CancellationToken::new(), &server.url("/flaky"))
        .await
        .unwrap();

    // The last response is returned as-is once retries are exhausted.
    assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);
    assert_eq!(mock.hits_async().await, 3);
    assert!(response.error_for_status().is_err());
}

#[tokio::test]
async fn test_client_errors_are_not_retried() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/missing");
            then.status(404);
        })
        .await;

    let client = RetryableClient::new(&fast_options(3)).unwrap();
    let response = client
        .get(&CancellationToken::new(), &server.url("/missing"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::NOT_FOUND);
    assert_eq!(mock.hits_async().await, 1);
}

#[tokio::test]
async fn test_backoff_is_linear() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/down");
            then.status(503);
        })
        .await;

    // Delays of 20ms then 40ms.
    let options = ClientOptions::default().with_retries(2, Duration::from_millis(20));
    let client = RetryableClient::new(&options).unwrap();
    let started = Instant::now();
    client
        .get(&CancellationToken::new(), &server.url("/down"))
        .await
        .unwrap();

    assert!(started.elapsed() >= Duration::from_millis(60));
}

#[tokio::test]
async fn test_user_agent_overrides_caller_header() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET)
                .path("/ua")
                .header("user-agent", "datareader-test/1.0");
            then.status(200).body("ok");
        })
        .await;

    let options = fast_options(0).with_user_agent("datareader-test/1.0");
    let client = RetryableClient::new(&options).unwrap();

    let mut headers = HeaderMap::new();
    headers.insert("user-agent", HeaderValue::from_static("caller/0.1"));
    let response = client
        .get_with_headers(&CancellationToken::new(), &server.url("/ua"), headers)
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(mock.hits_async().await, 1);
}

#[tokio::test]
async fn test_successful_get_is_cached() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/prices");
            then.status(200).body("Date,Close\n2024-01-02,185.6\n");
        })
        .await;

    let cache: Arc<dyn ResponseCache> = Arc::new(InMemoryCache::new());
    let client = RetryableClient::new(&fast_options(0))
        .unwrap()
        .with_cache(Some(Arc::clone(&cache)));
    let url = server.url("/prices");
    let cancel = CancellationToken::new();

    let first = client.get(&cancel, &url).await.unwrap();
    assert!(!first.is_cached());
    assert_eq!(cache.get(&url).await, Some(first.body().to_vec()));

    let second = client.get(&cancel, &url).await.unwrap();
    assert!(second.is_cached());
    assert_eq!(second.status(), StatusCode::OK);
    assert_eq!(second.body(), first.body());
    assert_eq!(mock.hits_async().await, 1);
}

#[tokio::test]
async fn test_error_responses_are_not_cached() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/gone");
            then.status(404);
        })
        .await;

    let cache: Arc<dyn ResponseCache> = Arc::new(InMemoryCache::new());
    let client = RetryableClient::new(&fast_options(0))
        .unwrap()
        .with_cache(Some(Arc::clone(&cache)));
    let url = server.url("/gone");
    let cancel = CancellationToken::new();

    client.get(&cancel, &url).await.unwrap();
    client.get(&cancel, &url).await.unwrap();

    assert!(cache.get(&url).await.is_none());
    assert_eq!(mock.hits_async().await, 2);
}

#[tokio::test]
async fn test_file_cache_from_options() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/series");
            then.status(200).body("[]");
        })
        .await;

    let dir = tempfile::tempdir().unwrap();
    let options = fast_options(0).with_cache(dir.path(), Duration::from_secs(3600));
    let url = server.url("/series");
    let cancel = CancellationToken::new();

    RetryableClient::new(&options)
        .unwrap()
        .get(&cancel, &url)
        .await
        .unwrap();
    // A fresh client over the same directory sees the entry.
    let cached = RetryableClient::new(&options)
        .unwrap()
        .get(&cancel, &url)
        .await
        .unwrap();

    assert!(cached.is_cached());
    assert_eq!(cached.text(), "[]");
    assert_eq!(mock.hits_async().await, 1);
}

#[tokio::test]
async fn test_cancel_during_request() {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/slow");
            then.status(200).delay(Duration::from_secs(5));
        })
        .await;

    let client = RetryableClient::new(&fast_options(0)).unwrap();
    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(50)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let err = client
        .get(&cancel, &server.url("/slow"))
        .await
        .unwrap_err();

    assert!(matches!(err, DataError::Cancelled));
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test]
async fn test_connection_failure_is_transport_error() {
    // Nothing listens on the discard port of localhost.
    let client = RetryableClient::new(&fast_options(1)).unwrap();
    let err = client
        .get(&CancellationToken::new(), "http://127.0.0.1:9/unreachable")
        .await
        .unwrap_err();

    assert!(err.is_retryable());
    assert!(matches!(
        err,
        DataError::Transport {
            stage: FetchStage::Execute,
            ..
        }
    ));
}

#[tokio::test]
async fn test_invalid_url_is_build_error() {
    let client = RetryableClient::new(&fast_options(0)).unwrap();
    let err = client
        .get(&CancellationToken::new(), "not a url")
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DataError::Transport {
            stage: FetchStage::Build,
            ..
        }
    ));
}
