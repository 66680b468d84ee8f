//! TWSE reader against a local mock server.

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use datareader_cache::InMemoryCache;
use datareader_core::{CancellationToken, ClientOptions, DataError, Reader, ResponseCache};
use datareader_http::RetryableClient;
use datareader_twse::TwseReader;
use httpmock::prelude::*;

const STOCK_DAY_ALL: &str = r#"[
    {"Date":"1141031","Code":"2330","Name":"台積電","TradeVolume":"36,824,588","TradeValue":"54,171,449,512","OpeningPrice":"1,475.00","HighestPrice":"1,480.00","LowestPrice":"1,460.00","ClosingPrice":"1,465.00","Change":"-15.0000","Transaction":"67,834"},
    {"Date":"1141031","Code":"2317","Name":"鴻海","TradeVolume":"41,000,123","TradeValue":"9,876,543,210","OpeningPrice":"240.50","HighestPrice":"243.00","LowestPrice":"239.00","ClosingPrice":"242.00","Change":"+2.0000","Transaction":"40,321"}
]"#;

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

async fn server() -> MockServer {
    let server = MockServer::start_async().await;
    server
        .mock_async(|when, then| {
            when.method(GET).path("/STOCK_DAY_ALL");
            then.status(200)
                .header("content-type", "application/json")
                .body(STOCK_DAY_ALL);
        })
        .await;
    server
}

fn reader(server: &MockServer) -> TwseReader {
    let options = ClientOptions::default().with_retries(0, Duration::from_millis(1));
    TwseReader::new(&options)
        .unwrap()
        .with_base_url(server.url("/STOCK_DAY_ALL"))
}

#[tokio::test]
async fn test_read_single_inside_range() {
    let server = server().await;
    let daily = reader(&server)
        .read_single(
            &CancellationToken::new(),
            "2330",
            date(2025, 10, 1),
            date(2025, 10, 31),
        )
        .await
        .unwrap();

    assert_eq!(daily.date, vec![date(2025, 10, 31)]);
    assert_eq!(daily.close, vec![1465.0]);
    assert_eq!(daily.volume, vec![36_824_588]);
}

#[tokio::test]
async fn test_read_single_outside_range_is_empty() {
    let server = server().await;
    let daily = reader(&server)
        .read_single(
            &CancellationToken::new(),
            "2330",
            date(2025, 11, 1),
            date(2025, 11, 30),
        )
        .await
        .unwrap();

    assert!(daily.date.is_empty());
    assert!(daily.close.is_empty());
}

#[tokio::test]
async fn test_unknown_code() {
    let server = server().await;
    let err = reader(&server)
        .read_single(
            &CancellationToken::new(),
            "9999",
            date(2025, 10, 1),
            date(2025, 10, 31),
        )
        .await
        .unwrap_err();

    assert!(matches!(err, DataError::SymbolNotFound(ref code) if code == "9999"));
}

#[tokio::test]
async fn test_multi_symbol_read_shares_cached_bulk_response() {
    let server = MockServer::start_async().await;
    let mock = server
        .mock_async(|when, then| {
            when.method(GET).path("/STOCK_DAY_ALL");
            then.status(200).body(STOCK_DAY_ALL);
        })
        .await;

    let options = ClientOptions::default().with_retries(0, Duration::from_millis(1));
    let cache: Arc<dyn ResponseCache> = Arc::new(InMemoryCache::new());
    let client = RetryableClient::new(&options).unwrap().with_cache(Some(cache));
    let reader = TwseReader::new(&options)
        .unwrap()
        .with_client(client)
        .with_base_url(server.url("/STOCK_DAY_ALL"));

    // Warm the cache so the parallel read does not race on the first fetch.
    reader
        .read_single(
            &CancellationToken::new(),
            "2330",
            date(2025, 10, 31),
            date(2025, 10, 31),
        )
        .await
        .unwrap();

    let symbols = vec!["2330".to_string(), "2317".to_string()];
    let results = reader
        .read(
            &CancellationToken::new(),
            &symbols,
            date(2025, 10, 31),
            date(2025, 10, 31),
        )
        .await
        .unwrap();

    assert_eq!(results.len(), 2);
    assert_eq!(results["2317"].close, vec![242.0]);
    assert_eq!(results["2330"].symbol, "2330");
    assert_eq!(mock.hits_async().await, 1);
}
