#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/datareader/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use datareader_core::{
    CancellationToken, ClientOptions, DataError, DataSource, Reader, Result, Row, Tabular,
    format_decimal, read_parallel, validate_date_range, validate_symbol,
};
use datareader_http::{AUTHORIZATION, HeaderMap, HeaderValue, RetryableClient};
use serde::Deserialize;
use tracing::{debug, instrument};

/// FinMind v4 data endpoint.
pub const DEFAULT_BASE_URL: &str = "https://api.finmindtrade.com/api/v4/data";

/// Environment variable consulted when no token is configured.
pub const API_TOKEN_VAR: &str = "FINMIND_API_TOKEN";

/// Dataset holding daily Taiwan stock prices.
const DATASET: &str = "TaiwanStockPrice";

const PROVIDER: &str = "FinMind";

/// Status FinMind reports when the request quota is exhausted.
const QUOTA_EXCEEDED: i64 = 402;

#[derive(Debug, Deserialize)]
struct Envelope {
    #[serde(default)]
    msg: String,
    status: i64,
    #[serde(default)]
    data: Vec<PriceRecord>,
}

#[derive(Debug, Deserialize)]
struct PriceRecord {
    date: String,
    #[serde(rename = "Trading_Volume")]
    trading_volume: u64,
    #[serde(rename = "Trading_money")]
    trading_money: u64,
    open: f64,
    max: f64,
    min: f64,
    close: f64,
    spread: f64,
    #[serde(rename = "Trading_turnover")]
    trading_turnover: u64,
}

/// Daily prices for one stock, as parallel columns in ascending date order.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct FinMindPrices {
    /// Stock id, e.g. `2330`.
    pub symbol: String,
    /// Trading days.
    pub date: Vec<NaiveDate>,
    /// Opening prices.
    pub open: Vec<f64>,
    /// Highest prices.
    pub high: Vec<f64>,
    /// Lowest prices.
    pub low: Vec<f64>,
    /// Closing prices.
    pub close: Vec<f64>,
    /// Change from the previous close.
    pub spread: Vec<f64>,
    /// Shares traded.
    pub volume: Vec<u64>,
    /// Turnover in TWD.
    pub money: Vec<u64>,
    /// Number of transactions.
    pub turnover: Vec<u64>,
}

impl Tabular for FinMindPrices {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn columns(&self) -> Vec<String> {
        [
            "date", "open", "high", "low", "close", "spread", "volume", "money", "turnover",
        ]
        .into_iter()
        .map(str::to_string)
        .collect()
    }

    fn len(&self) -> usize {
        self.date.len()
    }

    fn rows(&self) -> Vec<Row> {
        (0..self.len())
            .map(|i| {
                Row::from([
                    ("date".to_string(), self.date[i].to_string()),
                    ("open".to_string(), format_decimal(self.open[i])),
                    ("high".to_string(), format_decimal(self.high[i])),
                    ("low".to_string(), format_decimal(self.low[i])),
                    ("close".to_string(), format_decimal(self.close[i])),
                    ("spread".to_string(), format_decimal(self.spread[i])),
                    ("volume".to_string(), self.volume[i].to_string()),
                    ("money".to_string(), self.money[i].to_string()),
                    ("turnover".to_string(), self.turnover[i].to_string()),
                ])
            })
            .collect()
    }
}

/// Parses a `TaiwanStockPrice` response.
///
/// # Errors
/// - [`DataError::RateLimited`] if the payload status is 402
/// - [`DataError::Provider`] for any other status but 200
/// - [`DataError::Parse`] if the body or a date is malformed
pub fn parse_prices(body: &[u8], symbol: &str) -> Result<FinMindPrices> {
    let envelope: Envelope = serde_json::from_slice(body)
        .map_err(|e| DataError::Parse(format!("invalid FinMind JSON for {symbol}: {e}")))?;

    match envelope.status {
        200 => {}
        QUOTA_EXCEEDED => {
            return Err(DataError::RateLimited {
                provider: PROVIDER.to_string(),
                message: envelope.msg,
            });
        }
        status => {
            return Err(DataError::Provider {
                provider: PROVIDER.to_string(),
                message: format!("status {status}: {}", envelope.msg),
            });
        }
    }

    let mut records = envelope
        .data
        .into_iter()
        .map(|record| match NaiveDate::parse_from_str(&record.date, "%Y-%m-%d") {
            Ok(date) => Ok((date, record)),
            Err(e) => Err(DataError::Parse(format!(
                "invalid FinMind date {:?}: {e}",
                record.date
            ))),
        })
        .collect::<Result<Vec<_>>>()?;
    records.sort_by_key(|(date, _)| *date);

    let mut prices = FinMindPrices {
        symbol: symbol.to_string(),
        ..FinMindPrices::default()
    };
    for (date, record) in records {
        prices.date.push(date);
        prices.open.push(record.open);
        prices.high.push(record.max);
        prices.low.push(record.min);
        prices.close.push(record.close);
        prices.spread.push(record.spread);
        prices.volume.push(record.trading_volume);
        prices.money.push(record.trading_money);
        prices.turnover.push(record.trading_turnover);
    }
    Ok(prices)
}

/// FinMind daily price reader.
#[derive(Clone, Debug)]
pub struct FinMindReader {
    client: RetryableClient,
    base_url: String,
    authorization: Option<HeaderValue>,
}

impl FinMindReader {
    /// Create a reader from client options.
    ///
    /// The token comes from `options.api_key`, falling back to
    /// `FINMIND_API_TOKEN`; without one requests are anonymous.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built or the token is
    /// not a valid header value.
    pub fn new(options: &ClientOptions) -> Result<Self> {
        let authorization = options
            .resolve_api_key(API_TOKEN_VAR)
            .map(|token| {
                let mut value = HeaderValue::from_str(&format!("Bearer {token}")).map_err(|_| {
                    DataError::InvalidParameter(
                        "FinMind token contains characters not allowed in a header".to_string(),
                    )
                })?;
                value.set_sensitive(true);
                Ok::<_, DataError>(value)
            })
            .transpose()?;

        Ok(Self {
            client: RetryableClient::new(options)?,
            base_url: DEFAULT_BASE_URL.to_string(),
            authorization,
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

    /// Build the query URL for a stock and date range.
    #[must_use]
    pub fn build_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "{}?dataset={DATASET}&data_id={}&start_date={}&end_date={}",
            self.base_url,
            symbol,
            start.format("%Y-%m-%d"),
            end.format("%Y-%m-%d")
        )
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        if let Some(authorization) = &self.authorization {
            headers.insert(AUTHORIZATION, authorization.clone());
        }
        headers
    }
}

impl DataSource for FinMindReader {
    fn name(&self) -> &str {
        "finmind"
    }

    fn description(&self) -> &str {
        "FinMind daily Taiwan stock prices"
    }

    fn validate_symbol(&self, symbol: &str) -> Result<()> {
        validate_symbol(symbol)?;
        if !symbol.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(DataError::invalid_symbol(
                symbol,
                "stock id must be alphanumeric",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Reader for FinMindReader {
    type Output = FinMindPrices;

    #[instrument(skip(self, cancel), fields(source = "finmind"))]
    async fn read_single(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<FinMindPrices> {
        self.validate_symbol(symbol)?;
        validate_date_range(start, end)?;

        let url = self.build_url(symbol, start, end);
        debug!(
            authenticated = self.authorization.is_some(),
            "Fetching FinMind prices: {}", url
        );

        let response = self
            .client
            .get_with_headers(cancel, &url, self.headers())
            .await?
            .error_for_status()?;
        let prices = parse_prices(response.body(), symbol)?;
        debug!(rows = prices.len(), "Parsed FinMind prices");
        Ok(prices)
    }

    async fn read(
        &self,
        cancel: &CancellationToken,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HashMap<String, FinMindPrices>> {
        read_parallel(self, cancel, symbols, start, end).await
    }
}
