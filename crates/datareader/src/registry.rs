//! Source-name registry for readers.

use std::collections::HashMap;
use std::sync::Arc;

use datareader_core::{ClientOptions, DataError, Result, TableReader};
use tracing::debug;

/// Names of the sources compiled into this build.
#[must_use]
pub fn sources() -> Vec<&'static str> {
    let mut names = Vec::new();
    #[cfg(feature = "stooq")]
    names.push("stooq");
    #[cfg(feature = "alphavantage")]
    names.push("alphavantage");
    #[cfg(feature = "twse")]
    names.push("twse");
    #[cfg(feature = "worldbank")]
    names.push("worldbank");
    #[cfg(feature = "finmind")]
    names.push("finmind");
    names
}

/// Constructs the reader for a source name. Names are case-insensitive.
///
/// # Errors
/// Returns [`DataError::InvalidParameter`] for an unknown name, or the
/// reader's construction error.
pub fn open(name: &str, options: &ClientOptions) -> Result<Arc<dyn TableReader>> {
    let reader: Arc<dyn TableReader> = match name.to_ascii_lowercase().as_str() {
        #[cfg(feature = "stooq")]
        "stooq" => Arc::new(datareader_stooq::StooqReader::new(options)?),
        #[cfg(feature = "alphavantage")]
        "alphavantage" => Arc::new(datareader_alphavantage::AlphaVantageReader::new(options)?),
        #[cfg(feature = "twse")]
        "twse" => Arc::new(datareader_twse::TwseReader::new(options)?),
        #[cfg(feature = "worldbank")]
        "worldbank" => Arc::new(datareader_worldbank::WorldBankReader::new(options)?),
        #[cfg(feature = "finmind")]
        "finmind" => Arc::new(datareader_finmind::FinMindReader::new(options)?),
        _ => return Err(unknown_source(name, &sources())),
    };
    Ok(reader)
}

fn unknown_source(name: &str, known: &[&str]) -> DataError {
    DataError::InvalidParameter(format!(
        "unknown data source {name:?}, expected one of: {}",
        known.join(", ")
    ))
}

/// Readers keyed by source name.
///
/// # Example
///
/// ```rust,ignore
/// use datareader::{ClientOptions, ReaderRegistry};
///
/// let registry = ReaderRegistry::with_defaults(&ClientOptions::default())?;
/// let reader = registry.get("WorldBank")?;
/// assert_eq!(reader.name(), "worldbank");
/// ```
#[derive(Default)]
pub struct ReaderRegistry {
    readers: HashMap<String, Arc<dyn TableReader>>,
}

impl std::fmt::Debug for ReaderRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReaderRegistry")
            .field("readers", &self.names())
            .finish()
    }
}

impl ReaderRegistry {
    /// Create a new empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry holding every source compiled into this build,
    /// each with its own client built from `options`.
    ///
    /// # Errors
    /// Returns the first reader construction error.
    pub fn with_defaults(options: &ClientOptions) -> Result<Self> {
        let mut registry = Self::new();
        for name in sources() {
            registry.register(open(name, options)?);
        }
        Ok(registry)
    }

    /// Register a reader under its own name, replacing any reader of that name.
    pub fn register(&mut self, reader: Arc<dyn TableReader>) {
        let name = reader.name().to_ascii_lowercase();
        debug!(source = %name, "Registering reader");
        self.readers.insert(name, reader);
    }

    /// Builder form of [`ReaderRegistry::register`].
    #[must_use]
    pub fn with_reader(mut self, reader: Arc<dyn TableReader>) -> Self {
        self.register(reader);
        self
    }

    /// Looks up a reader by name, ignoring case.
    ///
    /// # Errors
    /// Returns [`DataError::InvalidParameter`] if no reader has that name.
    pub fn get(&self, name: &str) -> Result<Arc<dyn TableReader>> {
        self.readers
            .get(&name.to_ascii_lowercase())
            .cloned()
            .ok_or_else(|| unknown_source(name, &self.names()))
    }

    /// Registered names, sorted.
    #[must_use]
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.readers.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered readers.
    #[must_use]
    pub fn len(&self) -> usize {
        self.readers.len()
    }

    /// Returns true if no reader is registered.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.readers.is_empty()
    }
}
