//! Fully drained HTTP responses.

use datareader_core::{DataError, Result};
use reqwest::StatusCode;
use reqwest::header::HeaderMap;
use serde::de::DeserializeOwned;

/// Longest body excerpt quoted in parse errors.
const EXCERPT_LEN: usize = 200;

/// A response whose body has already been read into memory.
///
/// Returned by every [`RetryableClient`](crate::RetryableClient) call, whether
/// it came from the network or from the response cache.
#[derive(Clone, Debug)]
pub struct HttpResponse {
    url: String,
    status: StatusCode,
    headers: HeaderMap,
    body: Vec<u8>,
    cached: bool,
}

impl HttpResponse {
    pub(crate) const fn new(url: String, status: StatusCode, headers: HeaderMap, body: Vec<u8>) -> Self {
        Self {
            url,
            status,
            headers,
            body,
            cached: false,
        }
    }

    /// A synthesized `200 OK` carrying bytes served from the cache.
    pub(crate) fn from_cache(url: String, body: Vec<u8>) -> Self {
        Self {
            url,
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body,
            cached: true,
        }
    }

    /// Request URL, with credential query values redacted.
    #[must_use]
    pub fn url(&self) -> &str {
        &self.url
    }

    /// Response status.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        self.status
    }

    /// Response headers. Empty for cached responses.
    #[must_use]
    pub const fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    /// Response body.
    #[must_use]
    pub fn body(&self) -> &[u8] {
        &self.body
    }

    /// Consumes the response, returning its body.
    #[must_use]
    pub fn into_body(self) -> Vec<u8> {
        self.body
    }

    /// Returns true if the body was served from the response cache.
    #[must_use]
    pub const fn is_cached(&self) -> bool {
        self.cached
    }

    /// Body decoded as UTF-8, replacing invalid sequences.
    #[must_use]
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Deserializes the body as JSON.
    ///
    /// # Errors
    /// Returns [`DataError::Parse`] quoting the start of the body.
    pub fn json<T: DeserializeOwned>(&self) -> Result<T> {
        serde_json::from_slice(&self.body).map_err(|e| {
            DataError::Parse(format!(
                "invalid JSON from {}: {e}: {}",
                self.url,
                excerpt(&self.body)
            ))
        })
    }

    /// Converts a non-2xx status into [`DataError::HttpStatus`].
    ///
    /// # Errors
    /// Returns an error carrying the status code and reason if the status is not a success.
    pub fn error_for_status(self) -> Result<Self> {
        if self.status.is_success() {
            return Ok(self);
        }
        Err(DataError::HttpStatus {
            status: self.status.as_u16(),
            reason: self
                .status
                .canonical_reason()
                .unwrap_or("Unknown Status")
                .to_string(),
            url: self.url,
        })
    }
}

/// Start of a body, for error messages.
pub(crate) fn excerpt(body: &[u8]) -> String {
    let text = String::from_utf8_lossy(body);
    match text.char_indices().nth(EXCERPT_LEN) {
        Some((end, _)) => format!("{}...", &text[..end]),
        None => text.into_owned(),
    }
}
