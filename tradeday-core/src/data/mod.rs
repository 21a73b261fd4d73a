//! Price data: provider trait, Yahoo Finance implementation, and the tabular
//! dataset written once per trading day.

pub mod dataset;
pub mod provider;
pub mod yahoo;

pub use dataset::PriceDataset;
pub use provider::{DataError, PriceProvider, PriceRow};
pub use yahoo::YahooProvider;
