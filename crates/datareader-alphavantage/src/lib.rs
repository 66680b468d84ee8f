#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/datareader/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use datareader_core::{
    CancellationToken, ClientOptions, DataError, DataSource, Reader, Result, Row, Table, Tabular,
    read_parallel, validate_date_range, validate_symbol,
};
use datareader_http::{RetryableClient, Url};
use serde_json::{Map, Value};
use tracing::{debug, instrument};

/// Alpha Vantage query endpoint.
pub const DEFAULT_BASE_URL: &str = "https://www.alphavantage.co/query";

/// Environment variable consulted when no key is configured.
pub const API_KEY_VAR: &str = "ALPHAVANTAGE_API_KEY";

const PROVIDER: &str = "Alpha Vantage";

/// Payload fields Alpha Vantage uses for throttling notices.
const RATE_LIMIT_FIELDS: [&str; 2] = ["Note", "Information"];

/// Parses a daily time-series payload into a [`Table`].
///
/// Rows are ascending by date with a leading `date` column followed by the
/// observation fields sorted by their raw keys, which for the numbered
/// `"1. open"` style keys is the provider's numbering. An empty series
/// yields zero rows.
///
/// # Errors
/// - [`DataError::RateLimited`] if the payload carries a `Note` or `Information` notice
/// - [`DataError::Provider`] if it carries an `Error Message`
/// - [`DataError::Parse`] if the envelope or an observation is malformed
pub fn parse_time_series(body: &[u8], symbol: &str) -> Result<Table> {
    let payload: Value = serde_json::from_slice(body)
        .map_err(|e| DataError::Parse(format!("invalid Alpha Vantage JSON for {symbol}: {e}")))?;
    let payload = payload.as_object().ok_or_else(|| {
        DataError::Parse(format!("expected a JSON object for {symbol}, got {payload}"))
    })?;

    for field in RATE_LIMIT_FIELDS {
        if let Some(notice) = payload.get(field).and_then(Value::as_str) {
            return Err(DataError::RateLimited {
                provider: PROVIDER.to_string(),
                message: notice.to_string(),
            });
        }
    }
    if let Some(message) = payload.get("Error Message").and_then(Value::as_str) {
        return Err(DataError::Provider {
            provider: PROVIDER.to_string(),
            message: message.to_string(),
        });
    }

    let series = payload
        .iter()
        .find(|(key, _)| key.starts_with("Time Series"))
        .map(|(_, series)| series)
        .ok_or_else(|| DataError::Parse(format!("missing time series for {symbol}")))?
        .as_object()
        .ok_or_else(|| DataError::Parse(format!("time series for {symbol} is not an object")))?;

    let mut dates: Vec<&String> = series.keys().collect();
    dates.sort();

    let mut columns = vec!["date".to_string()];
    let mut rows = Vec::with_capacity(dates.len());
    for date in dates {
        let observation = series[date].as_object().ok_or_else(|| {
            DataError::Parse(format!("observation {date} for {symbol} is not an object"))
        })?;
        if rows.is_empty() {
            columns.extend(observation.keys().map(|label| field_label(label).to_string()));
        }
        rows.push(observation_row(date, observation));
    }

    Ok(Table::new(symbol, columns, rows))
}

fn observation_row(date: &str, observation: &Map<String, Value>) -> Row {
    let mut row = Row::with_capacity(observation.len() + 1);
    row.insert("date".to_string(), date.to_string());
    for (label, value) in observation {
        let value = match value {
            Value::String(text) => text.clone(),
            other => other.to_string(),
        };
        row.insert(field_label(label).to_string(), value);
    }
    row
}

/// Strips the numeric prefix from labels like `"4. close"`.
fn field_label(raw: &str) -> &str {
    match raw.split_once(". ") {
        Some((index, label)) if !index.is_empty() && index.bytes().all(|b| b.is_ascii_digit()) => {
            label
        }
        _ => raw,
    }
}

/// Keeps rows whose `date` falls inside `[start, end]`.
fn filter_range(table: &mut Table, start: NaiveDate, end: NaiveDate) {
    let (start, end) = (start.to_string(), end.to_string());
    table.rows.retain(|row| {
        row.get("date")
            .is_some_and(|date| *date >= start && *date <= end)
    });
}

/// Alpha Vantage daily price reader.
#[derive(Clone)]
pub struct AlphaVantageReader {
    client: RetryableClient,
    base_url: String,
    api_key: Option<String>,
}

impl std::fmt::Debug for AlphaVantageReader {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AlphaVantageReader")
            .field("client", &self.client)
            .field("base_url", &self.base_url)
            .field("api_key", &self.api_key.as_ref().map(|_| "[REDACTED]"))
            .finish()
    }
}

impl AlphaVantageReader {
    /// Create a reader from client options.
    ///
    /// The key comes from `options.api_key`, falling back to
    /// `ALPHAVANTAGE_API_KEY`. A missing key is reported on the first read.
    ///
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(options: &ClientOptions) -> Result<Self> {
        Ok(Self {
            client: RetryableClient::new(options)?,
            base_url: DEFAULT_BASE_URL.to_string(),
            api_key: options.resolve_api_key(API_KEY_VAR),
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

    /// Build the query URL for a symbol.
    fn build_url(&self, symbol: &str, api_key: &str) -> Result<String> {
        let mut url = Url::parse(&self.base_url).map_err(|e| {
            DataError::InvalidParameter(format!("invalid base URL {:?}: {e}", self.base_url))
        })?;
        url.query_pairs_mut()
            .append_pair("function", "TIME_SERIES_DAILY")
            .append_pair("symbol", &symbol.to_uppercase())
            .append_pair("outputsize", "full")
            .append_pair("apikey", api_key);
        Ok(url.into())
    }
}

impl DataSource for AlphaVantageReader {
    fn name(&self) -> &str {
        "alphavantage"
    }

    fn description(&self) -> &str {
        "Alpha Vantage daily equity prices (API key required)"
    }

    fn validate_symbol(&self, symbol: &str) -> Result<()> {
        validate_symbol(symbol)?;
        if !symbol
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '-'))
        {
            return Err(DataError::invalid_symbol(
                symbol,
                "only letters, digits, '.' and '-' are allowed",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Reader for AlphaVantageReader {
    type Output = Table;

    #[instrument(skip(self, cancel), fields(source = "alphavantage"))]
    async fn read_single(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Table> {
        self.validate_symbol(symbol)?;
        validate_date_range(start, end)?;
        let api_key = self
            .api_key
            .as_deref()
            .ok_or_else(|| DataError::MissingCredentials(PROVIDER.to_string()))?;

        let url = self.build_url(symbol, api_key)?;
        debug!("Fetching Alpha Vantage daily series");

        let response = self.client.get(cancel, &url).await?.error_for_status()?;
        let mut table = parse_time_series(response.body(), symbol)?;
        filter_range(&mut table, start, end);

        debug!(rows = table.len(), "Parsed Alpha Vantage series");
        Ok(table)
    }

    async fn read(
        &self,
        cancel: &CancellationToken,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HashMap<String, Table>> {
        read_parallel(self, cancel, symbols, start, end).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const DAILY: &str = r#"{
        "Meta Data": {
            "1. Information": "Daily Prices (open, high, low, close) and Volumes",
            "2. Symbol": "IBM"
        },
        "Time Series (Daily)": {
            "2024-01-04": {"1. open": "162.83", "2. high": "163.29", "3. low": "161.83", "4. close": "161.96", "5. volume": "4132419"},
            "2024-01-02": {"1. open": "161.00", "2. high": "163.29", "3. low": "160.50", "4. close": "163.14", "5. volume": "4086133"},
            "2024-01-03": {"1. open": "162.45", "2. high": "163.20", "3. low": "161.21", "4. close": "161.55", "5. volume": "3739148"}
        }
    }"#;

    #[test]
    fn test_parse_time_series() {
        let table = parse_time_series(DAILY.as_bytes(), "IBM").unwrap();

        assert_eq!(
            table.columns,
            vec!["date", "open", "high", "low", "close", "volume"]
        );
        assert_eq!(
            table.column("date"),
            vec!["2024-01-02", "2024-01-03", "2024-01-04"]
        );
        assert_eq!(table.column("close"), vec!["163.14", "161.55", "161.96"]);
    }

    #[test]
    fn test_soft_errors() {
        let note = br#"{"Note": "Thank you for using Alpha Vantage! Our standard API call frequency is 5 calls per minute."}"#;
        assert!(matches!(
            parse_time_series(note, "IBM"),
            Err(DataError::RateLimited { .. })
        ));

        let information = br#"{"Information": "We have detected your API key and our standard API rate limit is 25 requests per day."}"#;
        assert!(matches!(
            parse_time_series(information, "IBM"),
            Err(DataError::RateLimited { .. })
        ));

        let error = br#"{"Error Message": "Invalid API call. Please retry or visit the documentation."}"#;
        let err = parse_time_series(error, "NOPE").unwrap_err();
        assert!(matches!(err, DataError::Provider { .. }));
        assert!(err.to_string().contains("Invalid API call"));
    }

    #[test]
    fn test_empty_series_is_not_an_error() {
        let body = br#"{"Meta Data": {}, "Time Series (Daily)": {}}"#;
        let table = parse_time_series(body, "IBM").unwrap();

        assert!(table.is_empty());
        assert_eq!(table.columns, vec!["date"]);
    }

    #[test]
    fn test_missing_series_is_parse_error() {
        let err = parse_time_series(br#"{"Meta Data": {}}"#, "IBM").unwrap_err();
        assert!(matches!(err, DataError::Parse(_)));

        let err = parse_time_series(b"[]", "IBM").unwrap_err();
        assert!(matches!(err, DataError::Parse(_)));
    }

    #[test]
    fn test_field_label() {
        assert_eq!(field_label("1. open"), "open");
        assert_eq!(field_label("5. adjusted close"), "adjusted close");
        assert_eq!(field_label("open"), "open");
        assert_eq!(field_label("a. open"), "a. open");
    }

    #[test]
    fn test_filter_range_is_inclusive() {
        let mut table = parse_time_series(DAILY.as_bytes(), "IBM").unwrap();
        filter_range(
            &mut table,
            NaiveDate::from_ymd_opt(2024, 1, 3).unwrap(),
            NaiveDate::from_ymd_opt(2024, 1, 4).unwrap(),
        );

        assert_eq!(table.column("date"), vec!["2024-01-03", "2024-01-04"]);
    }

    #[test]
    fn test_debug_redacts_key() {
        let reader =
            AlphaVantageReader::new(&ClientOptions::default().with_api_key("av-secret")).unwrap();
        let debug = format!("{reader:?}");

        assert!(!debug.contains("av-secret"));
    }

    #[test]
    fn test_build_url_encodes_key() {
        let reader =
            AlphaVantageReader::new(&ClientOptions::default().with_api_key("demo")).unwrap();
        let url = Url::parse(&reader.build_url("ibm", "a&b#c=d").unwrap()).unwrap();
        let pairs: HashMap<String, String> = url.query_pairs().into_owned().collect();

        assert_eq!(pairs["apikey"], "a&b#c=d");
        assert_eq!(pairs["symbol"], "IBM");
        assert_eq!(pairs["function"], "TIME_SERIES_DAILY");
        assert_eq!(pairs["outputsize"], "full");
        assert_eq!(url.fragment(), None);
    }

    #[test]
    fn test_build_url_rejects_bad_base() {
        let reader = AlphaVantageReader::new(&ClientOptions::default().with_api_key("demo"))
            .unwrap()
            .with_base_url("not a url");

        assert!(reader.build_url("IBM", "demo").unwrap_err().is_validation());
    }

    #[test]
    fn test_validate_symbol() {
        let reader =
            AlphaVantageReader::new(&ClientOptions::default().with_api_key("demo")).unwrap();

        assert!(reader.validate_symbol("IBM").is_ok());
        assert!(reader.validate_symbol("BRK-B").is_ok());
        assert!(reader.validate_symbol("IBM&apikey=x").is_err());
        assert!(reader.validate_symbol("").is_err());
    }
}
