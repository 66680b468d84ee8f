#![doc = include_str!("../README.md")]
#![doc(issue_tracker_base_url = "https://github.com/factordynamics/datareader/issues/")]
#![cfg_attr(docsrs, feature(doc_cfg, doc_auto_cfg))]
#![warn(missing_docs)]
#![forbid(unsafe_code)]

//! # Example
//!
//! ```rust,ignore
//! use datareader_core::{CancellationToken, ClientOptions, Reader};
//! use datareader_stooq::StooqReader;
//! use chrono::NaiveDate;
//!
//! #[tokio::main]
//! async fn main() -> datareader_core::Result<()> {
//!     let reader = StooqReader::new(&ClientOptions::default())?;
//!     let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
//!     let end = NaiveDate::from_ymd_opt(2024, 12, 31).unwrap();
//!
//!     let table = reader
//!         .read_single(&CancellationToken::new(), "aapl.us", start, end)
//!         .await?;
//!     println!("{} rows", table.rows.len());
//!     Ok(())
//! }
//! ```

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::NaiveDate;
use datareader_core::{
    CancellationToken, ClientOptions, DataError, DataSource, Reader, Result, Row, Table, Tabular,
    read_parallel, validate_date_range, validate_symbol,
};
use datareader_http::RetryableClient;
use tracing::{debug, instrument};

/// Stooq CSV download endpoint.
pub const DEFAULT_BASE_URL: &str = "https://stooq.com/q/d/l/";

/// Date column of Stooq downloads.
const DATE_COLUMN: &str = "Date";

/// Body Stooq returns for unknown symbols.
const NO_DATA: &str = "No data";

/// Parses a CSV document into a [`Table`].
///
/// The first record is the header. Records whose field count differs from
/// the header are skipped. If `date_column` is one of the columns, rows are
/// stable-sorted ascending by it; ISO `YYYY-MM-DD` dates sort correctly as
/// strings.
///
/// # Errors
/// Returns [`DataError::Parse`] if the input has no header or a record cannot be read.
pub fn parse_csv(body: &[u8], symbol: &str, date_column: &str) -> Result<Table> {
    let mut reader = csv::ReaderBuilder::new()
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(body);

    let columns: Vec<String> = reader
        .headers()
        .map_err(|e| DataError::Parse(format!("invalid CSV header for {symbol}: {e}")))?
        .iter()
        .map(str::to_string)
        .collect();
    if columns.iter().all(String::is_empty) {
        return Err(DataError::Parse(format!("empty CSV response for {symbol}")));
    }

    let mut rows: Vec<Row> = Vec::new();
    let mut skipped = 0usize;
    for record in reader.records() {
        let record =
            record.map_err(|e| DataError::Parse(format!("invalid CSV record for {symbol}: {e}")))?;
        if record.len() != columns.len() {
            skipped += 1;
            continue;
        }
        rows.push(
            columns
                .iter()
                .cloned()
                .zip(record.iter().map(str::to_string))
                .collect(),
        );
    }
    if skipped > 0 {
        debug!(symbol, skipped, "Skipped malformed CSV rows");
    }

    if columns.iter().any(|c| c == date_column) {
        rows.sort_by(|a, b| a.get(date_column).cmp(&b.get(date_column)));
    }

    Ok(Table::new(symbol, columns, rows))
}

/// Stooq daily quote reader.
#[derive(Clone, Debug)]
pub struct StooqReader {
    client: RetryableClient,
    base_url: String,
}

impl StooqReader {
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

    /// Build the download URL for a symbol and date range.
    #[must_use]
    pub fn build_url(&self, symbol: &str, start: NaiveDate, end: NaiveDate) -> String {
        format!(
            "{}?s={}&i=d&d1={}&d2={}",
            self.base_url,
            symbol.to_lowercase(),
            start.format("%Y%m%d"),
            end.format("%Y%m%d")
        )
    }
}

impl DataSource for StooqReader {
    fn name(&self) -> &str {
        "stooq"
    }

    fn description(&self) -> &str {
        "Stooq daily quotes for equities, indices, currencies and commodities"
    }

    fn validate_symbol(&self, symbol: &str) -> Result<()> {
        validate_symbol(symbol)?;
        if let Some(c) = symbol
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '^' | '-' | '_' | '=')))
        {
            return Err(DataError::invalid_symbol(
                symbol,
                format!("unexpected character {c:?}"),
            ));
        }
        Ok(())
    }
}

#[async_trait]
impl Reader for StooqReader {
    type Output = Table;

    #[instrument(skip(self, cancel), fields(source = "stooq"))]
    async fn read_single(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Table> {
        self.validate_symbol(symbol)?;
        validate_date_range(start, end)?;

        let url = self.build_url(symbol, start, end);
        debug!("Fetching Stooq quotes: {}", url);

        let response = self.client.get(cancel, &url).await?.error_for_status()?;
        if response.text().trim() == NO_DATA {
            return Err(DataError::SymbolNotFound(symbol.to_string()));
        }

        let table = parse_csv(response.body(), symbol, DATE_COLUMN)?;
        debug!(rows = table.len(), "Parsed Stooq quotes");
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
