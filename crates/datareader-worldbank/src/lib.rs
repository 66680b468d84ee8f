#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/datareader/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{Datelike, NaiveDate};
use datareader_core::{
    CancellationToken, ClientOptions, DataError, DataSource, Reader, Result, Row, Table, Tabular,
    format_decimal, read_parallel, split_symbol_pair, validate_date_range,
};
use datareader_http::RetryableClient;
use serde::Deserialize;
use serde_json::{Number, Value};
use tracing::{debug, instrument, warn};

/// World Bank API v2 root.
pub const DEFAULT_BASE_URL: &str = "https://api.worldbank.org/v2";

/// Observations requested per page; large enough for any single series.
const PER_PAGE: u32 = 20_000;

const PROVIDER: &str = "World Bank";

const COLUMNS: [&str; 4] = ["date", "country", "indicator", "value"];

#[derive(Debug, Deserialize)]
struct Labelled {
    id: String,
}

#[derive(Debug, Deserialize)]
struct Observation {
    indicator: Labelled,
    country: Labelled,
    #[serde(default)]
    countryiso3code: String,
    date: String,
    value: Option<Number>,
}

#[derive(Debug, Deserialize)]
struct ApiMessage {
    #[serde(default)]
    key: String,
    #[serde(default)]
    value: String,
}

/// Parses an indicator response into a [`Table`].
///
/// The body is `[metadata, observations]`. Observations with a `null`
/// value are dropped, a `null` observation list yields zero rows, and rows
/// are sorted ascending by date.
///
/// # Errors
/// - [`DataError::Provider`] for a `[{"message": [...]}]` error envelope
/// - [`DataError::Parse`] if the envelope or an observation is malformed
pub fn parse_indicator(body: &[u8], symbol: &str) -> Result<Table> {
    let mut envelope: Vec<Value> = serde_json::from_slice(body)
        .map_err(|e| DataError::Parse(format!("invalid World Bank JSON for {symbol}: {e}")))?;

    if let Some(messages) = envelope.first().and_then(|meta| meta.get("message")) {
        let messages: Vec<ApiMessage> = serde_json::from_value(messages.clone())
            .map_err(|e| DataError::Parse(format!("invalid World Bank error for {symbol}: {e}")))?;
        let message = messages
            .iter()
            .map(|m| format!("{}: {}", m.key, m.value.trim()))
            .collect::<Vec<_>>()
            .join("; ");
        return Err(DataError::Provider {
            provider: PROVIDER.to_string(),
            message,
        });
    }

    if envelope.len() != 2 {
        return Err(DataError::Parse(format!(
            "expected a two-element envelope for {symbol}, got {} elements",
            envelope.len()
        )));
    }
    if let Some(pages) = envelope[0].get("pages").and_then(Value::as_u64) {
        if pages > 1 {
            warn!(symbol, pages, "Only the first page of observations was read");
        }
    }

    let observations: Option<Vec<Observation>> = serde_json::from_value(envelope.swap_remove(1))
        .map_err(|e| DataError::Parse(format!("invalid observations for {symbol}: {e}")))?;

    let mut rows: Vec<Row> = observations
        .unwrap_or_default()
        .into_iter()
        .filter_map(|obs| {
            let value = render_number(&obs.value?);
            let country = if obs.countryiso3code.is_empty() {
                obs.country.id
            } else {
                obs.countryiso3code
            };
            Some(Row::from([
                ("date".to_string(), obs.date),
                ("country".to_string(), country),
                ("indicator".to_string(), obs.indicator.id),
                ("value".to_string(), value),
            ]))
        })
        .collect();
    rows.sort_by(|a, b| a.get("date").cmp(&b.get("date")));

    Ok(Table::new(
        symbol,
        COLUMNS.iter().map(|c| (*c).to_string()).collect(),
        rows,
    ))
}

/// Integers print as-is; floats print in plain decimal form.
fn render_number(number: &Number) -> String {
    if number.is_i64() || number.is_u64() {
        number.to_string()
    } else {
        number
            .as_f64()
            .map_or_else(|| number.to_string(), format_decimal)
    }
}

/// World Bank indicator reader.
#[derive(Clone, Debug)]
pub struct WorldBankReader {
    client: RetryableClient,
    base_url: String,
}

impl WorldBankReader {
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

    /// Points the reader at another API root.
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

    /// Build the indicator URL for a country, indicator and range of years.
    #[must_use]
    pub fn build_url(&self, country: &str, indicator: &str, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "{}/country/{}/indicator/{}?format=json&date={}:{}&per_page={PER_PAGE}",
            self.base_url,
            country,
            indicator,
            start.year(),
            end.year()
        )
    }
}

impl DataSource for WorldBankReader {
    fn name(&self) -> &str {
        "worldbank"
    }

    fn description(&self) -> &str {
        "World Bank development indicators by country"
    }

    fn validate_symbol(&self, symbol: &str) -> Result<()> {
        let (country, indicator) = split_symbol_pair(symbol)?;
        if !country.bytes().all(|b| b.is_ascii_alphanumeric()) {
            return Err(DataError::invalid_symbol(symbol, "country must be alphanumeric"));
        }
        if !indicator
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_'))
        {
            return Err(DataError::invalid_symbol(
                symbol,
                "indicator may only contain letters, digits, '.' and '_'",
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Reader for WorldBankReader {
    type Output = Table;

    #[instrument(skip(self, cancel), fields(source = "worldbank"))]
    async fn read_single(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Table> {
        self.validate_symbol(symbol)?;
        validate_date_range(start, end)?;
        let (country, indicator) = split_symbol_pair(symbol)?;

        let url = self.build_url(country, indicator, start, end);
        debug!("Fetching World Bank indicator: {}", url);

        let response = self.client.get(cancel, &url).await?.error_for_status()?;
        let table = parse_indicator(response.body(), symbol)?;
        debug!(rows = table.len(), "Parsed World Bank indicator");
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

    const GDP: &str = r#"[
        {"page":1,"pages":1,"per_page":20000,"total":3,"sourceid":"2","lastupdated":"2024-06-28"},
        [
            {"indicator":{"id":"NY.GDP.MKTP.CD","value":"GDP (current US$)"},"country":{"id":"US","value":"United States"},"countryiso3code":"USA","date":"2023","value":null,"unit":"","obs_status":"","decimal":0},
            {"indicator":{"id":"NY.GDP.MKTP.CD","value":"GDP (current US$)"},"country":{"id":"US","value":"United States"},"countryiso3code":"USA","date":"2022","value":25462700000000,"unit":"","obs_status":"","decimal":0},
            {"indicator":{"id":"NY.GDP.MKTP.CD","value":"GDP (current US$)"},"country":{"id":"US","value":"United States"},"countryiso3code":"USA","date":"2021","value":2.33151e13,"unit":"","obs_status":"","decimal":0}
        ]
    ]"#;

    #[test]
    fn test_nulls_dropped_and_sorted_ascending() {
        let table = parse_indicator(GDP.as_bytes(), "USA/NY.GDP.MKTP.CD").unwrap();

        assert_eq!(table.len(), 2);
        assert_eq!(table.column("date"), vec!["2021", "2022"]);
        assert_eq!(
            table.column("value"),
            vec!["23315100000000", "25462700000000"]
        );
        assert_eq!(table.column("country"), vec!["USA", "USA"]);
        assert_eq!(table.column("indicator")[0], "NY.GDP.MKTP.CD");
    }

    #[test]
    fn test_fractional_values() {
        let body = r#"[{"page":1,"pages":1},[
            {"indicator":{"id":"FP.CPI.TOTL.ZG"},"country":{"id":"JP"},"countryiso3code":"","date":"2022","value":2.4977}
        ]]"#;
        let table = parse_indicator(body.as_bytes(), "JPN/FP.CPI.TOTL.ZG").unwrap();

        assert_eq!(table.column("value"), vec!["2.4977"]);
        assert_eq!(table.column("country"), vec!["JP"]);
    }

    #[test]
    fn test_null_observation_list() {
        let body = br#"[{"page":0,"pages":0,"per_page":20000,"total":0},null]"#;
        let table = parse_indicator(body, "USA/NOPE").unwrap();

        assert!(table.is_empty());
        assert_eq!(table.columns.len(), 4);
    }

    #[test]
    fn test_message_envelope_is_provider_error() {
        let body = br#"[{"message":[{"id":"120","key":"Invalid value","value":"The provided parameter value is not valid"}]}]"#;
        let err = parse_indicator(body, "XXX/NY.GDP.MKTP.CD").unwrap_err();

        assert!(matches!(err, DataError::Provider { .. }));
        assert!(err.to_string().contains("Invalid value"));
    }

    #[test]
    fn test_malformed_envelope() {
        assert!(matches!(
            parse_indicator(b"{}", "USA/X"),
            Err(DataError::Parse(_))
        ));
        assert!(matches!(
            parse_indicator(br#"[{"page":1}]"#, "USA/X"),
            Err(DataError::Parse(_))
        ));
    }

    #[test]
    fn test_build_url() {
        let reader = WorldBankReader::new(&ClientOptions::default()).unwrap();
        let url = reader.build_url(
            "USA",
            "NY.GDP.MKTP.CD",
            NaiveDate::from_ymd_opt(2015, 6, 1).unwrap(),
            NaiveDate::from_ymd_opt(2023, 1, 1).unwrap(),
        );

        assert_eq!(
            url,
            "https://api.worldbank.org/v2/country/USA/indicator/NY.GDP.MKTP.CD?format=json&date=2015:2023&per_page=20000"
        );
    }

    #[test]
    fn test_validate_symbol() {
        let reader = WorldBankReader::new(&ClientOptions::default()).unwrap();

        assert!(reader.validate_symbol("USA/NY.GDP.MKTP.CD").is_ok());
        assert!(reader.validate_symbol("USA").is_err());
        assert!(reader.validate_symbol("USA/").is_err());
        assert!(reader.validate_symbol("US A/NY.GDP").is_err());
        assert!(reader.validate_symbol("USA/NY?x=1").is_err());
    }
}
