//! Validation shared by every reader, applied before any request is made.

use chrono::NaiveDate;

use crate::error::{DataError, Result};

/// Rejects empty symbols and symbols containing whitespace.
///
/// Providers layer their own format rules on top of this check.
pub fn validate_symbol(symbol: &str) -> Result<()> {
    if symbol.is_empty() {
        return Err(DataError::invalid_symbol(symbol, "symbol is empty"));
    }
    if symbol.chars().any(char::is_whitespace) {
        return Err(DataError::invalid_symbol(symbol, "symbol contains whitespace"));
    }
    Ok(())
}

/// Rejects an empty symbol list.
pub fn validate_symbols(symbols: &[String]) -> Result<()> {
    if symbols.is_empty() {
        return Err(DataError::InvalidParameter(
            "symbol list is empty".to_string(),
        ));
    }
    Ok(())
}

/// Rejects a range whose start is after its end.
pub fn validate_date_range(start: NaiveDate, end: NaiveDate) -> Result<()> {
    if start > end {
        return Err(DataError::InvalidParameter(format!(
            "Start date {start} is after end date {end}"
        )));
    }
    Ok(())
}

/// Splits a `LEFT/RIGHT` symbol pair, rejecting anything else.
pub fn split_symbol_pair(symbol: &str) -> Result<(&str, &str)> {
    validate_symbol(symbol)?;
    match symbol.split_once('/') {
        Some((left, right)) if !left.is_empty() && !right.is_empty() && !right.contains('/') => {
            Ok((left, right))
        }
        _ => Err(DataError::invalid_symbol(
            symbol,
            "expected a pair in the form LEFT/RIGHT",
        )),
    }
}
