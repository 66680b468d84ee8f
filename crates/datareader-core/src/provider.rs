//! Reader traits and the parallel fetch orchestrator.
//!
//! This module defines the reader traits:
//!
//! - [`DataSource`] - Base trait with the source name and symbol validation
//! - [`Reader`] - Typed single and multi-symbol reads
//! - [`TableReader`] - Object-safe view returning [`Table`]s, used by registries
//!
//! and [`read_parallel`], the bounded fan-out every [`Reader::read`] delegates to.

use std::collections::HashMap;
use std::fmt::Debug;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::NaiveDate;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::{
    error::{DataError, Result},
    types::{Table, Tabular},
    validate::validate_symbols,
};

/// Upper bound on concurrent fetches issued by one [`read_parallel`] call.
pub const MAX_CONCURRENT_FETCHES: usize = 10;

/// Base trait for all data sources.
pub trait DataSource: Send + Sync + Debug {
    /// Returns the source name (e.g., "stooq").
    fn name(&self) -> &str;

    /// Returns a description of this source.
    fn description(&self) -> &str;

    /// Checks a symbol against the source's format rules without any I/O.
    fn validate_symbol(&self, symbol: &str) -> Result<()>;
}

/// Typed reader for one data source.
#[async_trait]
pub trait Reader: DataSource {
    /// Parsed result for one symbol.
    type Output: Tabular + Send + 'static;

    /// Fetches one symbol over an inclusive date range.
    ///
    /// The symbol and range are validated before any request is issued.
    async fn read_single(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Self::Output>;

    /// Fetches several symbols concurrently.
    ///
    /// Implementations delegate to [`read_parallel`].
    async fn read(
        &self,
        cancel: &CancellationToken,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HashMap<String, Self::Output>>;
}

/// Object-safe reader returning normalized [`Table`]s.
///
/// Every `Reader + Clone` gets this for free, so readers with different
/// output types can sit behind one `Arc<dyn TableReader>`.
#[async_trait]
pub trait TableReader: DataSource {
    /// Fetches one symbol as a [`Table`].
    async fn read_table(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Table>;

    /// Fetches several symbols as [`Table`]s.
    async fn read_tables(
        &self,
        cancel: &CancellationToken,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HashMap<String, Table>>;
}

#[async_trait]
impl<R> TableReader for R
where
    R: Reader + Clone + 'static,
{
    async fn read_table(
        &self,
        cancel: &CancellationToken,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Table> {
        let data = self.read_single(cancel, symbol, start, end).await?;
        Ok(data.to_table())
    }

    async fn read_tables(
        &self,
        cancel: &CancellationToken,
        symbols: &[String],
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<HashMap<String, Table>> {
        let data = self.read(cancel, symbols, start, end).await?;
        Ok(data
            .into_iter()
            .map(|(symbol, output)| (symbol, output.to_table()))
            .collect())
    }
}

/// Fetches every symbol with at most `min(10, symbols.len())` requests in flight.
///
/// The list is validated up front. Each symbol runs [`Reader::read_single`]
/// on its own task and reports back over a channel. The first error is
/// returned as soon as it arrives; results already collected are discarded
/// and tasks still running are neither awaited nor cancelled.
pub async fn read_parallel<R>(
    reader: &R,
    cancel: &CancellationToken,
    symbols: &[String],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<HashMap<String, R::Output>>
where
    R: Reader + Clone + 'static,
{
    validate_symbols(symbols)?;

    let width = MAX_CONCURRENT_FETCHES.min(symbols.len());
    let semaphore = Arc::new(Semaphore::new(width));
    let (tx, mut rx) = mpsc::unbounded_channel();

    debug!(
        source = reader.name(),
        symbols = symbols.len(),
        width,
        "Starting parallel read"
    );

    for symbol in symbols {
        let reader = reader.clone();
        let cancel = cancel.clone();
        let semaphore = Arc::clone(&semaphore);
        let tx = tx.clone();
        let symbol = symbol.clone();

        tokio::spawn(async move {
            let Ok(_permit) = semaphore.acquire_owned().await else {
                return;
            };
            let result = reader.read_single(&cancel, &symbol, start, end).await;
            // The receiver is gone once the parent returned an earlier error.
            let _ = tx.send((symbol, result));
        });
    }
    drop(tx);

    let mut received = 0usize;
    let mut results = HashMap::with_capacity(symbols.len());
    while let Some((symbol, result)) = rx.recv().await {
        received += 1;
        match result {
            Ok(data) => {
                results.insert(symbol, data);
            }
            Err(e) => {
                warn!(source = reader.name(), symbol = %symbol, error = %e, "Parallel read failed");
                return Err(e);
            }
        }
        if received == symbols.len() {
            break;
        }
    }

    if received < symbols.len() {
        return Err(DataError::Other(format!(
            "{} of {} fetch tasks ended without reporting a result",
            symbols.len() - received,
            symbols.len()
        )));
    }

    Ok(results)
}
