//! DataFrame view over tabular results.

use polars::prelude::*;

use crate::{
    error::{DataError, Result},
    types::Tabular,
};

/// Builds a string-typed DataFrame with one column per label.
///
/// Values are kept as text, so provider date formats such as `2022` or
/// `2020M01` survive unchanged. Missing cells are null.
pub fn to_dataframe<T: Tabular + ?Sized>(data: &T) -> Result<DataFrame> {
    let columns = data.columns();
    let rows = data.rows();

    let mut frame_columns = Vec::with_capacity(columns.len() + 1);
    frame_columns.push(Column::new(
        "symbol".into(),
        vec![data.symbol().to_string(); rows.len()],
    ));
    for label in columns.iter().filter(|label| label.as_str() != "symbol") {
        let values: Vec<Option<String>> = rows.iter().map(|row| row.get(label).cloned()).collect();
        frame_columns.push(Column::new(label.as_str().into(), values));
    }

    DataFrame::new(frame_columns).map_err(|e| DataError::Other(e.to_string()))
}
