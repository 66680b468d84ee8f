#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/datareader/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// Retrying HTTP client.
pub mod client;
/// Reusable body buffers.
pub mod pool;
/// Token-bucket rate limiter.
pub mod rate_limit;
/// Drained responses.
pub mod response;

pub use client::{RetryableClient, redact_url, should_retry};
pub use pool::BufferPool;
pub use rate_limit::RateLimiter;
pub use response::HttpResponse;

// Readers build extra headers with these.
pub use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
pub use reqwest::{StatusCode, Url};
