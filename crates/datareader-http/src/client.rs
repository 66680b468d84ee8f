//! Retrying, rate-limited, caching HTTP client.

use std::error::Error as StdError;
use std::sync::Arc;
use std::time::Duration;

use datareader_cache::FileCache;
use datareader_core::{ClientOptions, DataError, FetchStage, ResponseCache, Result};
use reqwest::header::{HeaderMap, HeaderValue, USER_AGENT};
use reqwest::{Method, Request, Response, StatusCode, Url};
use tokio::time::sleep;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use crate::pool::BufferPool;
use crate::rate_limit::RateLimiter;
use crate::response::HttpResponse;

/// Query parameters whose values are never logged or quoted in errors.
const SECRET_PARAMS: &[&str] = &["apikey", "api_key", "token"];

/// Renders `url` with credential-bearing query values replaced.
#[must_use]
pub fn redact_url(url: &Url) -> String {
    let is_secret = |name: &str| SECRET_PARAMS.iter().any(|p| name.eq_ignore_ascii_case(p));
    if !url.query_pairs().any(|(name, _)| is_secret(&name)) {
        return url.to_string();
    }

    let pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(name, value)| {
            let value = if is_secret(&name) {
                "REDACTED".to_string()
            } else {
                value.into_owned()
            };
            (name.into_owned(), value)
        })
        .collect();
    let mut redacted = url.clone();
    redacted.query_pairs_mut().clear().extend_pairs(pairs);
    redacted.to_string()
}

/// Returns true if an attempt should be retried.
///
/// Transport failures, attempts that produced no response and `5xx`
/// statuses are retried. Everything else, `4xx` included, is final.
#[must_use]
pub fn should_retry(status: Option<StatusCode>, transport_failed: bool) -> bool {
    if transport_failed {
        return true;
    }
    status.is_none_or(|status| status.is_server_error())
}

/// HTTP client shared by the requests of one reader.
///
/// Each call waits on the rate limiter, serves `GET` requests from the cache
/// when possible, retries transient failures with linear backoff and drains
/// the body into memory. Non-2xx statuses are returned as responses, not
/// errors; see [`HttpResponse::error_for_status`].
///
/// Cloning is cheap and clones share the limiter, cache and buffer pool.
#[derive(Clone, Debug)]
pub struct RetryableClient {
    client: reqwest::Client,
    user_agent: HeaderValue,
    max_retries: u32,
    retry_delay: Duration,
    limiter: Option<Arc<RateLimiter>>,
    cache: Option<Arc<dyn ResponseCache>>,
    cache_ttl: Duration,
    pool: Arc<BufferPool>,
}

impl RetryableClient {
    /// Create a client from reader options.
    ///
    /// A positive `rate_limit` installs a token bucket and a `cache_dir`
    /// installs a [`FileCache`] there.
    ///
    /// # Errors
    /// Returns an error if the User-Agent is not a valid header value or the
    /// underlying HTTP client cannot be built.
    pub fn new(options: &ClientOptions) -> Result<Self> {
        let user_agent = HeaderValue::from_str(&options.user_agent).map_err(|e| {
            DataError::InvalidParameter(format!("invalid User-Agent {:?}: {e}", options.user_agent))
        })?;

        let client = reqwest::Client::builder()
            .timeout(options.timeout)
            .build()
            .map_err(|e| DataError::Other(format!("Failed to create HTTP client: {e}")))?;

        let limiter = (options.rate_limit > 0.0)
            .then(|| Arc::new(RateLimiter::new(options.rate_limit, options.rate_burst)));

        let cache = options.cache_dir.as_ref().map(|dir| {
            debug!(dir = %dir.display(), "Response cache enabled");
            Arc::new(FileCache::new(dir)) as Arc<dyn ResponseCache>
        });

        Ok(Self {
            client,
            user_agent,
            max_retries: options.max_retries,
            retry_delay: options.retry_delay,
            limiter,
            cache,
            cache_ttl: options.cache_ttl,
            pool: Arc::new(BufferPool::default()),
        })
    }

    /// Replaces the underlying `reqwest` client.
    ///
    /// The configured User-Agent is still set on every request.
    #[must_use]
    pub fn with_http_client(mut self, client: reqwest::Client) -> Self {
        self.client = client;
        self
    }

    /// Replaces the response cache. `None` disables caching.
    #[must_use]
    pub fn with_cache(mut self, cache: Option<Arc<dyn ResponseCache>>) -> Self {
        self.cache = cache;
        self
    }

    /// Replaces the rate limiter, for sharing one bucket between clients.
    #[must_use]
    pub fn with_rate_limiter(mut self, limiter: Option<Arc<RateLimiter>>) -> Self {
        self.limiter = limiter;
        self
    }

    /// Replaces the buffer pool, for sharing one pool between clients.
    #[must_use]
    pub fn with_buffer_pool(mut self, pool: Arc<BufferPool>) -> Self {
        self.pool = pool;
        self
    }

    /// The response cache, if any.
    #[must_use]
    pub const fn cache(&self) -> Option<&Arc<dyn ResponseCache>> {
        self.cache.as_ref()
    }

    /// Issues a `GET` for `url`.
    ///
    /// # Errors
    /// See [`RetryableClient::execute`].
    pub async fn get(&self, cancel: &CancellationToken, url: &str) -> Result<HttpResponse> {
        self.get_with_headers(cancel, url, HeaderMap::new()).await
    }

    /// Issues a `GET` for `url` with extra headers.
    ///
    /// # Errors
    /// See [`RetryableClient::execute`]; an unparsable URL is a
    /// [`DataError::Transport`] at the build stage.
    pub async fn get_with_headers(
        &self,
        cancel: &CancellationToken,
        url: &str,
        headers: HeaderMap,
    ) -> Result<HttpResponse> {
        let request = self
            .client
            .get(url)
            .headers(headers)
            .build()
            .map_err(|e| DataError::Transport {
                stage: FetchStage::Build,
                url: e.url().map_or_else(|| url.to_string(), redact_url),
                message: error_chain(&e.without_url()),
            })?;
        self.execute(cancel, request).await
    }

    /// Executes a request.
    ///
    /// # Errors
    /// - [`DataError::Cancelled`] if `cancel` fires while waiting, sending,
    ///   backing off or reading the body
    /// - [`DataError::Transport`] if the request cannot be cloned, the last
    ///   attempt failed on the wire, or the body could not be read
    #[instrument(skip(self, cancel, request), fields(method = %request.method(), url = %redact_url(request.url())))]
    pub async fn execute(&self, cancel: &CancellationToken, request: Request) -> Result<HttpResponse> {
        let key = request.url().to_string();
        let url = redact_url(request.url());
        let cacheable = request.method() == Method::GET;

        if cacheable && self.cache.is_some() {
            if let Some(body) = self.cache.get(&key).await {
                debug!(bytes = body.len(), "Serving response from cache");
                return Ok(HttpResponse::from_cache(url, body));
            }
        }

        let response = self.send_with_retries(cancel, &request, &url).await?;
        let status = response.status();
        let headers = response.headers().clone();
        let body = self.drain(cancel, response, &url).await?;
        debug!(status = status.as_u16(), bytes = body.len(), "Request complete");

        if cacheable && status == StatusCode::OK && self.cache.is_some() {
            if let Err(e) = self.cache.set(&key, &body, self.cache_ttl).await {
                warn!(error = %e, "Failed to cache response");
            }
        }

        Ok(HttpResponse::new(url, status, headers, body))
    }

    /// Runs up to `max_retries + 1` attempts and returns the last outcome.
    async fn send_with_retries(
        &self,
        cancel: &CancellationToken,
        request: &Request,
        url: &str,
    ) -> Result<Response> {
        let mut attempt = 0u32;
        loop {
            if let Some(limiter) = &self.limiter {
                limiter.wait(cancel).await?;
            }

            let mut outbound = request.try_clone().ok_or_else(|| DataError::Transport {
                stage: FetchStage::Build,
                url: url.to_string(),
                message: "request body cannot be cloned".to_string(),
            })?;
            outbound
                .headers_mut()
                .insert(USER_AGENT, self.user_agent.clone());

            let outcome = tokio::select! {
                outcome = self.client.execute(outbound) => outcome,
                () = cancel.cancelled() => return Err(DataError::Cancelled),
            };

            let status = outcome.as_ref().ok().map(Response::status);
            if !should_retry(status, outcome.is_err()) || attempt >= self.max_retries {
                return outcome.map_err(|e| transport(FetchStage::Execute, url, e));
            }

            let delay = self.retry_delay * (attempt + 1);
            // Consuming the outcome releases the connection before sleeping.
            match outcome {
                Ok(response) => warn!(
                    attempt = attempt + 1,
                    status = response.status().as_u16(),
                    delay_ms = delay.as_millis() as u64,
                    "Server error, retrying"
                ),
                Err(e) => warn!(
                    attempt = attempt + 1,
                    error = %error_chain(&e.without_url()),
                    delay_ms = delay.as_millis() as u64,
                    "Request failed, retrying"
                ),
            }

            tokio::select! {
                () = sleep(delay) => {}
                () = cancel.cancelled() => return Err(DataError::Cancelled),
            }
            attempt += 1;
        }
    }

    /// Reads the whole body through a pooled buffer.
    async fn drain(
        &self,
        cancel: &CancellationToken,
        mut response: Response,
        url: &str,
    ) -> Result<Vec<u8>> {
        let mut buffer = self.pool.get();
        loop {
            let chunk = tokio::select! {
                chunk = response.chunk() => chunk,
                () = cancel.cancelled() => {
                    self.pool.put(buffer);
                    return Err(DataError::Cancelled);
                }
            };
            match chunk {
                Ok(Some(bytes)) => buffer.extend_from_slice(&bytes),
                Ok(None) => break,
                Err(e) => {
                    self.pool.put(buffer);
                    return Err(transport(FetchStage::Body, url, e));
                }
            }
        }
        let body = buffer.as_slice().to_vec();
        self.pool.put(buffer);
        Ok(body)
    }
}

/// The URL is dropped from the reqwest error so credentials never leak into messages.
fn transport(stage: FetchStage, url: &str, error: reqwest::Error) -> DataError {
    DataError::Transport {
        stage,
        url: url.to_string(),
        message: error_chain(&error.without_url()),
    }
}

/// Joins an error and its sources, innermost last.
fn error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}
