//! Price provider trait and structured error types.
//!
//! The PriceProvider trait abstracts over market-data sources so the download
//! loop can be driven by Yahoo Finance in production and by fakes in tests.

use super::dataset::PriceDataset;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One ticker's daily observation.
///
/// Fields are optional because the provider may have nothing for a ticker on a
/// given day; such rows are kept and written as empty cells.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceRow {
    pub date: NaiveDate,
    pub ticker: String,
    pub open: Option<f64>,
    pub high: Option<f64>,
    pub low: Option<f64>,
    pub close: Option<f64>,
    pub adj_close: Option<f64>,
    pub volume: Option<u64>,
}

impl PriceRow {
    /// A row with no values.
    pub fn empty(date: NaiveDate, ticker: &str) -> Self {
        Self {
            date,
            ticker: ticker.to_string(),
            open: None,
            high: None,
            low: None,
            close: None,
            adj_close: None,
            volume: None,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.open.is_none()
            && self.high.is_none()
            && self.low.is_none()
            && self.close.is_none()
            && self.adj_close.is_none()
            && self.volume.is_none()
    }
}

/// Errors from fetching or serializing price data.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("HTTP {status} fetching {ticker}")]
    HttpStatus { status: u16, ticker: String },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("dataset error: {0}")]
    Frame(String),
}

/// Source of daily prices.
pub trait PriceProvider {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch one day of prices for every ticker.
    ///
    /// The dataset holds one row per ticker. Tickers the provider has no data
    /// for still get a row; only transport and decoding failures are errors.
    fn fetch_day(&self, tickers: &[&str], date: NaiveDate) -> Result<PriceDataset, DataError>;
}
