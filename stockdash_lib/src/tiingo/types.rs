//! Response types for Tiingo API.

use chrono::NaiveDate;
use marketdata_api::types::DailyBar;
use serde::Deserialize;

use super::error::TiingoError;

/// A single daily price record from the Tiingo end-of-day API.
///
/// The dashboard stores raw (unadjusted) OHLCV, matching the Yahoo chart
/// source, so the `adj*` fields are read but not stored.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TiingoDailyPrice {
    pub date: String,
    pub close: f64,
    pub high: f64,
    pub low: f64,
    pub open: f64,
    pub volume: i64,
    #[serde(default)]
    pub adj_close: Option<f64>,
    #[serde(default)]
    pub div_cash: Option<f64>,
    #[serde(default)]
    pub split_factor: Option<f64>,
}

impl TiingoDailyPrice {
    /// `date` arrives as `2024-06-14T00:00:00+00:00`; only the day is kept.
    pub fn trading_date(&self) -> Result<NaiveDate, TiingoError> {
        let day = self.date.get(..10).unwrap_or(&self.date);
        NaiveDate::parse_from_str(day, "%Y-%m-%d")
            .map_err(|e| TiingoError::ParseFailed(format!("bad date `{}`: {}", self.date, e)))
    }

    pub fn to_daily_bar(&self) -> Result<DailyBar, TiingoError> {
        Ok(DailyBar {
            date: self.trading_date()?,
            open: self.open,
            high: self.high,
            low: self.low,
            close: self.close,
            volume: self.volume,
        })
    }
}
