//! Row types shared by the loaders, the fetcher, and the views.

use chrono::NaiveDate;
use marketdata_api::types::DailyBar;
use serde::{Deserialize, Serialize};

/// Screener attributes for one stock. `symbol` is the primary key.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StockDetail {
    pub symbol: String,
    pub name: Option<String>,
    pub country: Option<String>,
    pub ipo_year: Option<i64>,
    pub volume: Option<i64>,
    pub sector: Option<String>,
    pub industry: Option<String>,
}

/// Screener attributes for one ETF.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EtfDetail {
    pub symbol: String,
    pub name: Option<String>,
}

/// One daily OHLCV bar in the `stock_timeseries` layout.
///
/// Field order is the column order of historical CSV files.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimeseriesPoint {
    pub symbol: String,
    pub date: NaiveDate,
    pub price_open: Option<f64>,
    pub price_high: Option<f64>,
    pub price_low: Option<f64>,
    pub price_close: Option<f64>,
    pub volume: Option<i64>,
}

impl TimeseriesPoint {
    /// Tags a provider bar with the symbol it was requested for.
    pub fn from_bar(symbol: &str, bar: &DailyBar) -> Self {
        Self {
            symbol: symbol.to_string(),
            date: bar.date,
            price_open: Some(bar.open),
            price_high: Some(bar.high),
            price_low: Some(bar.low),
            price_close: Some(bar.close),
            volume: Some(bar.volume),
        }
    }
}

/// Outcome of an append: rows written vs. rows ignored by a uniqueness constraint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct AppendSummary {
    pub inserted: usize,
    pub skipped: usize,
}

impl AppendSummary {
    pub fn total(&self) -> usize {
        self.inserted + self.skipped
    }
}

/// Row counts per table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct TableCounts {
    pub stock_details: i64,
    pub etf_details: i64,
    pub stock_timeseries: i64,
}
