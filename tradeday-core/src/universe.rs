//! The ticker set every run downloads.

/// Symbols in Yahoo's notation (`BRK-B`, not `BRK.B`).
const SP500_SAMPLE: [&str; 9] = [
    "AAPL", "MSFT", "GOOG", "AMZN", "TSLA", "BRK-B", "JNJ", "V", "NVDA",
];

/// A fixed, ordered list of tickers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Universe {
    tickers: Vec<String>,
}

impl Universe {
    /// Large-cap S&P 500 sample used for the daily files.
    pub fn sp500_sample() -> Self {
        let universe = Self {
            tickers: SP500_SAMPLE.iter().map(|t| t.to_string()).collect(),
        };
        log::info!("Fetched {} tickers.", universe.len());
        universe
    }

    /// Tickers in download order.
    pub fn tickers(&self) -> Vec<&str> {
        self.tickers.iter().map(String::as_str).collect()
    }

    pub fn len(&self) -> usize {
        self.tickers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickers.is_empty()
    }
}
