//! Yahoo Finance data provider.
//!
//! Fetches one daily bar per ticker from Yahoo's v8 chart API, one request per
//! ticker, sequentially. A ticker Yahoo cannot serve becomes an empty row and a
//! warning; transport failures and undecodable bodies abort the fetch.
//!
//! Yahoo Finance has no official API and is subject to unannounced format changes.

use super::dataset::PriceDataset;
use super::provider::{DataError, PriceProvider, PriceRow};
use crate::config::YahooConfig;
use chrono::{Duration, NaiveDate};
use serde::Deserialize;

/// Yahoo Finance v8 chart API response.
#[derive(Debug, Deserialize)]
struct ChartResponse {
    chart: ChartResult,
}

#[derive(Debug, Deserialize)]
struct ChartResult {
    result: Option<Vec<ChartData>>,
    error: Option<ChartError>,
}

#[derive(Debug, Deserialize)]
struct ChartError {
    code: String,
    description: String,
}

#[derive(Debug, Deserialize)]
struct ChartData {
    timestamp: Option<Vec<i64>>,
    indicators: Indicators,
}

#[derive(Debug, Deserialize)]
struct Indicators {
    quote: Vec<QuoteData>,
    adjclose: Option<Vec<AdjCloseData>>,
}

#[derive(Debug, Deserialize)]
struct QuoteData {
    #[serde(default)]
    open: Vec<Option<f64>>,
    #[serde(default)]
    high: Vec<Option<f64>>,
    #[serde(default)]
    low: Vec<Option<f64>>,
    #[serde(default)]
    close: Vec<Option<f64>>,
    #[serde(default)]
    volume: Vec<Option<u64>>,
}

#[derive(Debug, Deserialize)]
struct AdjCloseData {
    adjclose: Vec<Option<f64>>,
}

/// Yahoo Finance data provider.
pub struct YahooProvider {
    client: reqwest::blocking::Client,
    base_url: String,
}

impl YahooProvider {
    pub fn new(config: &YahooConfig) -> Result<Self, DataError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(std::time::Duration::from_secs(config.timeout_secs))
            .user_agent(config.user_agent.as_str())
            .build()
            .map_err(|e| {
                DataError::NetworkUnreachable(format!("failed to build HTTP client: {e}"))
            })?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Chart API URL covering exactly one UTC calendar day.
    fn chart_url(base_url: &str, symbol: &str, date: NaiveDate) -> String {
        let start_ts = day_start_timestamp(date);
        let end_ts = day_start_timestamp(date + Duration::days(1));
        format!(
            "{base_url}/v8/finance/chart/{symbol}\
             ?period1={start_ts}&period2={end_ts}&interval=1d\
             &includeAdjustedClose=true"
        )
    }

    /// Extract the bar for `date`.
    ///
    /// `Ok(None)` when Yahoo reports an error for the symbol or has no bar on
    /// that day.
    fn parse_response(
        symbol: &str,
        date: NaiveDate,
        resp: ChartResponse,
    ) -> Result<Option<PriceRow>, DataError> {
        if let Some(err) = resp.chart.error {
            log::warn!("{symbol}: {} ({})", err.description, err.code);
            return Ok(None);
        }

        let Some(data) = resp.chart.result.and_then(|r| r.into_iter().next()) else {
            return Ok(None);
        };
        let Some(timestamps) = data.timestamp else {
            return Ok(None);
        };

        let quote = data
            .indicators
            .quote
            .into_iter()
            .next()
            .ok_or_else(|| DataError::ResponseFormatChanged(format!("{symbol}: no quote data")))?;

        let adj_closes = data
            .indicators
            .adjclose
            .and_then(|v| v.into_iter().next())
            .map(|a| a.adjclose);

        for (i, &ts) in timestamps.iter().enumerate() {
            let bar_date = chrono::DateTime::from_timestamp(ts, 0)
                .map(|dt| dt.naive_utc().date())
                .ok_or_else(|| {
                    DataError::ResponseFormatChanged(format!("invalid timestamp: {ts}"))
                })?;
            if bar_date != date {
                continue;
            }

            return Ok(Some(PriceRow {
                date,
                ticker: symbol.to_string(),
                open: quote.open.get(i).copied().flatten(),
                high: quote.high.get(i).copied().flatten(),
                low: quote.low.get(i).copied().flatten(),
                close: quote.close.get(i).copied().flatten(),
                adj_close: adj_closes.as_ref().and_then(|v| v.get(i).copied().flatten()),
                volume: quote.volume.get(i).copied().flatten(),
            }));
        }

        Ok(None)
    }

    /// Single request, no retry.
    fn fetch_symbol(&self, symbol: &str, date: NaiveDate) -> Result<PriceRow, DataError> {
        let url = Self::chart_url(&self.base_url, symbol, date);
        log::debug!("GET {url}");

        let resp = self
            .client
            .get(&url)
            .send()
            .map_err(|e| DataError::NetworkUnreachable(e.to_string()))?;

        let status = resp.status();
        // Unknown symbols come back as 404 with a chart error body.
        if !status.is_success() && status != reqwest::StatusCode::NOT_FOUND {
            return Err(DataError::HttpStatus {
                status: status.as_u16(),
                ticker: symbol.to_string(),
            });
        }

        let chart: ChartResponse = resp.json().map_err(|e| {
            DataError::ResponseFormatChanged(format!("failed to parse response for {symbol}: {e}"))
        })?;

        match Self::parse_response(symbol, date, chart)? {
            Some(row) => Ok(row),
            None => {
                log::warn!("{symbol}: no data for {date}");
                Ok(PriceRow::empty(date, symbol))
            }
        }
    }
}

impl PriceProvider for YahooProvider {
    fn name(&self) -> &str {
        "yahoo_finance"
    }

    fn fetch_day(&self, tickers: &[&str], date: NaiveDate) -> Result<PriceDataset, DataError> {
        let rows = tickers
            .iter()
            .map(|symbol| self.fetch_symbol(symbol, date))
            .collect::<Result<Vec<_>, _>>()?;
        PriceDataset::from_rows(&rows)
    }
}

fn day_start_timestamp(date: NaiveDate) -> i64 {
    date.and_time(chrono::NaiveTime::default()).and_utc().timestamp()
}
