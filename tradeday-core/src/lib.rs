//! tradeday core: incremental daily price downloads for NYSE trading days.
//!
//! This crate holds everything except the command line:
//! - NYSE trading calendar computed from exchange rules
//! - Yahoo Finance single-day fetch into a tabular price dataset
//! - Day stores (local directory, Google Cloud Storage bucket) with inventory listing
//! - The download loop that decides, per calendar day, whether to fetch
//! - TOML configuration

pub mod calendar;
pub mod config;
pub mod data;
pub mod download;
pub mod storage;
pub mod universe;

pub use calendar::{NyseCalendar, Session, TradingCalendar};
pub use config::{AppConfig, ConfigError};
pub use download::{
    download_missing_days, DayOutcome, DayProgress, DownloadError, DownloadSummary, LogProgress,
    LookbackWindow,
};
pub use universe::Universe;
