//! One trading day of prices as a Polars DataFrame.
//!
//! Columns: `date, ticker, open, high, low, close, adj_close, volume`.
//! Missing values are nulls and serialize as empty CSV cells. Nothing is
//! validated before writing.

use super::provider::{DataError, PriceRow};
use chrono::NaiveDate;
use polars::prelude::*;

/// Column order of the persisted CSV.
pub const COLUMNS: [&str; 8] = [
    "date",
    "ticker",
    "open",
    "high",
    "low",
    "close",
    "adj_close",
    "volume",
];

#[derive(Debug, Clone)]
pub struct PriceDataset {
    frame: DataFrame,
}

impl PriceDataset {
    /// Build the dataset from provider rows, in the order given.
    pub fn from_rows(rows: &[PriceRow]) -> Result<Self, DataError> {
        // NaiveDate::default() is the Unix epoch.
        let epoch = NaiveDate::default();
        let dates: Vec<i32> = rows
            .iter()
            .map(|r| (r.date - epoch).num_days() as i32)
            .collect();
        let tickers: Vec<&str> = rows.iter().map(|r| r.ticker.as_str()).collect();
        let opens: Vec<Option<f64>> = rows.iter().map(|r| r.open).collect();
        let highs: Vec<Option<f64>> = rows.iter().map(|r| r.high).collect();
        let lows: Vec<Option<f64>> = rows.iter().map(|r| r.low).collect();
        let closes: Vec<Option<f64>> = rows.iter().map(|r| r.close).collect();
        let adj_closes: Vec<Option<f64>> = rows.iter().map(|r| r.adj_close).collect();
        let volumes: Vec<Option<u64>> = rows.iter().map(|r| r.volume).collect();

        let frame = DataFrame::new(vec![
            Column::new("date".into(), dates)
                .cast(&DataType::Date)
                .map_err(|e| DataError::Frame(format!("date cast: {e}")))?,
            Column::new("ticker".into(), tickers),
            Column::new("open".into(), opens),
            Column::new("high".into(), highs),
            Column::new("low".into(), lows),
            Column::new("close".into(), closes),
            Column::new("adj_close".into(), adj_closes),
            Column::new("volume".into(), volumes),
        ])
        .map_err(|e| DataError::Frame(format!("dataframe creation: {e}")))?;

        Ok(Self { frame })
    }

    /// Number of rows.
    pub fn height(&self) -> usize {
        self.frame.height()
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    /// CSV text with a header row and no index column.
    pub fn to_csv_bytes(&self) -> Result<Vec<u8>, DataError> {
        let mut buf = Vec::new();
        let mut frame = self.frame.clone();
        CsvWriter::new(&mut buf)
            .include_header(true)
            .finish(&mut frame)
            .map_err(|e| DataError::Frame(format!("csv write: {e}")))?;
        Ok(buf)
    }
}
