//! Normalized tabular data returned by readers.
//!
//! Providers with a dynamic or wide schema return a [`Table`]. Providers with
//! a fixed schema return their own column-oriented struct and implement
//! [`Tabular`] so generic consumers can still look at the result as rows.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// One observation: column label to string value.
pub type Row = HashMap<String, String>;

/// Row-oriented view shared by every parsed result.
pub trait Tabular {
    /// Symbol the data belongs to.
    fn symbol(&self) -> &str;

    /// Column labels in output order.
    fn columns(&self) -> Vec<String>;

    /// Number of observations.
    fn len(&self) -> usize;

    /// Returns true if there are no observations.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Observations in ascending chronological order.
    fn rows(&self) -> Vec<Row>;

    /// Copies the data into a [`Table`].
    fn to_table(&self) -> Table {
        Table {
            symbol: self.symbol().to_string(),
            columns: self.columns(),
            rows: self.rows(),
        }
    }
}

/// Columns plus row maps, used when the schema is dynamic.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Table {
    /// Symbol the data belongs to.
    pub symbol: String,
    /// Column labels in output order.
    pub columns: Vec<String>,
    /// Observations, ascending by date.
    pub rows: Vec<Row>,
}

impl Table {
    /// Creates a table.
    #[must_use]
    pub fn new(symbol: impl Into<String>, columns: Vec<String>, rows: Vec<Row>) -> Self {
        Self {
            symbol: symbol.into(),
            columns,
            rows,
        }
    }

    /// Returns the values of `column` in row order; missing cells are empty strings.
    #[must_use]
    pub fn column(&self, column: &str) -> Vec<&str> {
        self.rows
            .iter()
            .map(|row| row.get(column).map_or("", String::as_str))
            .collect()
    }

    /// Tags the table with a symbol.
    #[must_use]
    pub fn with_symbol(mut self, symbol: impl Into<String>) -> Self {
        self.symbol = symbol.into();
        self
    }
}

impl Tabular for Table {
    fn symbol(&self) -> &str {
        &self.symbol
    }

    fn columns(&self) -> Vec<String> {
        self.columns.clone()
    }

    fn len(&self) -> usize {
        self.rows.len()
    }

    fn rows(&self) -> Vec<Row> {
        self.rows.clone()
    }

    fn to_table(&self) -> Table {
        self.clone()
    }
}

/// Formats a float as plain decimal text, never in exponent notation.
#[must_use]
pub fn format_decimal(value: f64) -> String {
    format!("{value}")
}
