//! `STOCK_DAY_ALL` payload and the column-oriented daily result.

use chrono::NaiveDate;
use datareader_core::{DataError, Result, Row, Tabular, format_decimal};
use serde::Deserialize;

use crate::calendar::roc_to_gregorian;

/// One security in the `STOCK_DAY_ALL` response. Every value is a string.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct StockDayRecord {
    #[serde(default)]
    date: String,
    code: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    trade_volume: String,
    #[serde(default)]
    trade_value: String,
    #[serde(default)]
    opening_price: String,
    #[serde(default)]
    highest_price: String,
    #[serde(default)]
    lowest_price: String,
    #[serde(default)]
    closing_price: String,
    #[serde(default)]
    change: String,
    #[serde(default)]
    transaction: String,
}

/// Daily trading summary for one stock, as parallel columns.
///
/// Index `i` of every column refers to the same trading day, and all
/// columns have the same length.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct TwseDaily {
    /// Stock code, e.g. `2330`.
    pub symbol: String,
    /// Security name as published by the exchange.
    pub name: String,
    /// Trading days, ascending.
    pub date: Vec<NaiveDate>,
    /// Opening prices.
    pub open: Vec<f64>,
    /// Highest prices.
    pub high: Vec<f64>,
    /// Lowest prices.
    pub low: Vec<f64>,
    /// Closing prices.
    pub close: Vec<f64>,
    /// Price change from the previous close.
    pub change: Vec<f64>,
    /// Shares traded.
    pub volume: Vec<u64>,
    /// Turnover in TWD.
    pub value: Vec<u64>,
    /// Number of transactions.
    pub transactions: Vec<u64>,
}

impl TwseDaily {
    /// Keeps the observations dated within `[start, end]`.
    #[must_use]
    pub fn filter_range(&self, start: NaiveDate, end: NaiveDate) -> Self {
        fn pick<T: Copy>(column: &[T], keep: &[usize]) -> Vec<T> {
            keep.iter().map(|&i| column[i]).collect()
        }

        let keep: Vec<usize> = (0..self.date.len())
            .filter(|&i| self.date[i] >= start && self.date[i] <= end)
            .collect();

        Self {
            symbol: self.symbol.clone(),
            name: self.name.clone(),
            date: pick(&self.date, &keep),
            open: pick(&self.open, &keep),
            high: pick(&self.high, &keep),
            low: pick(&self.low, &keep),
            close: pick(&self.close, &keep),
            change: pick(&self.change, &keep),
            volume: pick(&self.volume, &keep),
            value: pick(&self.value, &keep),
            transactions: pick(&self.transactions, &keep),
        }
    }

    fn push(&mut self, date: NaiveDate, record: &StockDayRecord) -> Result<()> {
        let open = parse_decimal("OpeningPrice", &record.opening_price)?;
        let high = parse_decimal("HighestPrice", &record.highest_price)?;
        let low = parse_decimal("LowestPrice", &record.lowest_price)?;
        let close = parse_decimal("ClosingPrice", &record.closing_price)?;
        let change = parse_decimal("Change", &record.change)?;
        let volume = parse_count("TradeVolume", &record.trade_volume)?;
        let value = parse_count("TradeValue", &record.trade_value)?;
        let transactions = parse_count("Transaction", &record.transaction)?;

        // Columns are only extended once every field has parsed.
        self.date.push(date);
        self.open.push(open);
        self.high.push(high);
        self.low.push(low);
        self.close.push(close);
        self.change.push(change);
        self.volume.push(volume);
        self.value.push(value);
        self.transactions.push(transactions);
        Ok(())
    }
}

impl Tabular for TwseDaily {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn columns(&self) -> Vec<String> {
        [
            "date",
            "open",
            "high",
            "low",
            "close",
            "change",
            "volume",
            "value",
            "transactions",
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
                [
                    ("date", self.date[i].to_string()),
                    ("open", format_decimal(self.open[i])),
                    ("high", format_decimal(self.high[i])),
                    ("low", format_decimal(self.low[i])),
                    ("close", format_decimal(self.close[i])),
                    ("change", format_decimal(self.change[i])),
                    ("volume", self.volume[i].to_string()),
                    ("value", self.value[i].to_string()),
                    ("transactions", self.transactions[i].to_string()),
                ]
                .into_iter()
                .map(|(column, value)| (column.to_string(), value))
                .collect()
            })
            .collect()
    }
}

/// Extracts `code` from a `STOCK_DAY_ALL` response.
///
/// # Errors
/// - [`DataError::Parse`] if the body is not the expected JSON array or a field is malformed
/// - [`DataError::SymbolNotFound`] if no record carries `code`
/// - [`DataError::InvalidDate`] if the record's date is not a valid ROC date
pub fn parse_stock_day_all(body: &[u8], code: &str) -> Result<TwseDaily> {
    let records: Vec<StockDayRecord> = serde_json::from_slice(body)
        .map_err(|e| DataError::Parse(format!("invalid STOCK_DAY_ALL response: {e}")))?;

    let mut daily = TwseDaily {
        symbol: code.to_string(),
        ..TwseDaily::default()
    };
    let mut matched = records
        .iter()
        .filter(|r| r.code.trim() == code)
        .map(|r| roc_to_gregorian(r.date.trim()).map(|date| (date, r)))
        .collect::<Result<Vec<_>>>()?;
    if matched.is_empty() {
        return Err(DataError::SymbolNotFound(code.to_string()));
    }
    matched.sort_by_key(|(date, _)| *date);

    for (date, record) in matched {
        if daily.name.is_empty() {
            daily.name = record.name.trim().to_string();
        }
        daily.push(date, record)?;
    }
    Ok(daily)
}

/// Parses a price field; empty is zero and `,` separators are ignored.
fn parse_decimal(field: &str, raw: &str) -> Result<f64> {
    let cleaned = clean(raw);
    if cleaned.is_empty() {
        return Ok(0.0);
    }
    cleaned
        .parse()
        .map_err(|e| DataError::Parse(format!("invalid {field} value {raw:?}: {e}")))
}

/// Parses a count field; empty is zero and `,` separators are ignored.
fn parse_count(field: &str, raw: &str) -> Result<u64> {
    let cleaned = clean(raw);
    if cleaned.is_empty() {
        return Ok(0);
    }
    cleaned
        .parse()
        .map_err(|e| DataError::Parse(format!("invalid {field} value {raw:?}: {e}")))
}

fn clean(raw: &str) -> String {
    raw.trim().chars().filter(|&c| c != ',').collect()
}
