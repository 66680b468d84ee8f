#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/datareader/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! Response cache backends for datareader.
//!
//! This crate provides implementations of the [`ResponseCache`] trait from `datareader-core`:
//!
//! - [`FileCache`] - On-disk cache, one file per entry (used by `ClientOptions::cache_dir`)
//! - [`InMemoryCache`] - Simple in-memory cache for testing
//! - [`SqliteCache`] - Persistent SQLite-based cache (requires `sqlite` feature)
//!
//! A disabled cache is modelled as `Option::<Arc<dyn ResponseCache>>::None`,
//! which misses on every read and reports `DataError::NilCache` on writes.

/// On-disk cache implementation.
pub mod file;
/// In-memory cache implementation.
pub mod memory;

/// SQLite-based cache implementation.
#[cfg(feature = "sqlite")]
pub mod sqlite;

// Re-export the trait for convenience
pub use datareader_core::ResponseCache;

// Re-export implementations
pub use file::FileCache;
pub use memory::InMemoryCache;

#[cfg(feature = "sqlite")]
pub use sqlite::SqliteCache;
