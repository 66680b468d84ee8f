#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/datareader/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Core traits and types for time-series data readers.
//!
//! This crate provides the foundational abstractions shared by every provider:
//!
//! - [`DataSource`](provider::DataSource) - Base trait for all sources
//! - [`Reader`](provider::Reader) - Typed single and multi-symbol reads
//! - [`TableReader`](provider::TableReader) - Object-safe tabular view
//! - [`read_parallel`](provider::read_parallel) - Bounded multi-symbol fan-out
//! - [`ResponseCache`](cache::ResponseCache) - Response caching abstraction
//! - [`ClientOptions`](options::ClientOptions) - HTTP layer configuration

/// Response cache trait and entry record.
pub mod cache;
/// Error types for data operations.
pub mod error;
/// Optional DataFrame view over tabular results.
#[cfg(feature = "polars")]
pub mod frame;
/// Client configuration.
pub mod options;
/// Reader traits and the parallel orchestrator.
pub mod provider;
/// Normalized tabular types.
pub mod types;
/// Validation applied before any request.
pub mod validate;

// Re-export commonly used items at crate root
pub use cache::{CacheEntry, ResponseCache, cache_key};
pub use error::{DataError, FetchStage, Result};
pub use options::ClientOptions;
pub use provider::{DataSource, MAX_CONCURRENT_FETCHES, Reader, TableReader, read_parallel};
pub use types::{Row, Table, Tabular, format_decimal};
pub use validate::{split_symbol_pair, validate_date_range, validate_symbol, validate_symbols};

// Readers take the caller's cancellation token by reference.
pub use tokio_util::sync::CancellationToken;
