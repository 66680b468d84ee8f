#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/datareader/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! # Example
//!
//! ```rust,ignore
//! use datareader::{CancellationToken, ClientOptions, ReaderRegistry};
//! use chrono::NaiveDate;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> datareader::Result<()> {
//!     let options = ClientOptions::default()
//!         .with_rate_limit(2.0, 1)
//!         .with_cache("/tmp/datareader", Duration::from_secs(3600));
//!     let registry = ReaderRegistry::with_defaults(&options)?;
//!
//!     let reader = registry.get("stooq")?;
//!     let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//!     let end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
//!     let symbols = vec!["aapl.us".to_string(), "msft.us".to_string()];
//!
//!     let tables = reader
//!         .read_tables(&CancellationToken::new(), &symbols, start, end)
//!         .await?;
//!     for (symbol, table) in &tables {
//!         println!("{symbol}: {} rows", table.rows.len());
//!     }
//!     Ok(())
//! }
//! ```

// Core types and traits
pub use datareader_core::*;

// HTTP layer
pub use datareader_http::{BufferPool, HttpResponse, RateLimiter, RetryableClient, should_retry};

// Cache implementations
#[cfg(feature = "cache-sqlite")]
pub use datareader_cache::SqliteCache;
pub use datareader_cache::{FileCache, InMemoryCache};

// Readers
#[cfg(feature = "alphavantage")]
pub use datareader_alphavantage::AlphaVantageReader;
#[cfg(feature = "finmind")]
pub use datareader_finmind::{FinMindPrices, FinMindReader};
#[cfg(feature = "stooq")]
pub use datareader_stooq::StooqReader;
#[cfg(feature = "twse")]
pub use datareader_twse::{TwseDaily, TwseReader, gregorian_to_roc, roc_to_gregorian};
#[cfg(feature = "worldbank")]
pub use datareader_worldbank::WorldBankReader;

#[cfg(feature = "polars")]
pub use datareader_core::frame::to_dataframe;

mod registry;
pub use registry::{ReaderRegistry, open, sources};
