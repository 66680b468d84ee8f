#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/datareader/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

/// ROC calendar conversion.
pub mod calendar;
/// Daily trading summaries.
pub mod daily;

pub use calendar::{ROC_YEAR_OFFSET, gregorian_to_roc, roc_to_gregorian};
pub use daily::{TwseDaily, parse_stock_day_all};

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use datareader_core::{
    CancellationToken, ClientOptions, DataError, DataSource, Reader, Result, Tabular,
    read_parallel, validate_date_range, validate_symbol,
};
use datareader_http::RetryableClient;
use tracing::{debug, instrument};

/// Daily summary of every listed security.
pub const DEFAULT_BASE_URL: &str = "https://openapi.twse.com.tw/v1/exchangeReport/STOCK_DAY_ALL";

/// Taiwan Stock Exchange reader.
///
/// Every symbol hits the same bulk endpoint, so a multi-symbol read benefits
/// from enabling the response cache.
#[derive(Clone, Debug)]
pub struct TwseReader {
    client: RetryableClient,
    base_url: String,
}

impl TwseReader {
    /// Create a reader from client options.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(options: &ClientOptions) -> Result<Self> {
        Ok(Self {
            client: RetryableClient::new(options)?,
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    /// Points the reader at another endpoint.
    #[must_use]
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    /// Replaces the HTTP client.
    #[must_use]
    pub fn with_client(mut self, client: RetryableClient) -> Self {
        self.client = client;
        self
    }
}

impl DataSource for TwseReader {
    fn name(&self) -> &str {
        "twse"
    }

    fn description(&self) -> &str {
        "Taiwan Stock Exchange daily trading summary"
    }

    fn validate_symbol(&self, symbol: &str) -> Result<()> {
        validate_symbol(symbol)?;
        if !(4..=6).contains(&symbol.len()) || !symbol.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(DataError::invalid_symbol(
                symbol,
                "expected a 4 to 6 character alphanumeric stock code",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Reader for TwseReader {
    type Output = TwseDaily;

    #[instrument(skip(self, cancel), fields(source = "twse"))]
    async fn read_single(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<TwseDaily> {
        self.validate_symbol(symbol)?;
        validate_date_range(start, end)?;

        debug!("Fetching TWSE daily summary: {}", self.base_url);
        let response = self
            .client
            .get(cancel, &self.base_url)
            .await?
            .error_for_status()?;

        let daily = parse_stock_day_all(response.body(), symbol)?.filter_range(start, end);
        debug!(rows = daily.len(), "Parsed TWSE daily summary");
        Ok(daily)
    }

    async fn read(
        &self,
        cancel: &CancellationToken,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HashMap<String, TwseDaily>> {
        read_parallel(self, cancel, symbols, start, end).await
    }
}
