//! Library layer for the NASDAQ stock dashboard: SQLite storage, CSV loaders,
//! incremental price fetching and the data shaping behind the overview and
//! timeseries views.

pub mod config;
pub mod db;
pub mod error;
pub mod fetch;
pub mod history;
pub mod market;
pub mod models;
pub mod performance;
pub mod query;
pub mod screener;
pub mod tiingo;
pub mod watermark;
pub mod yahoo;

pub use marketdata_api;
pub use marketdata_api::types::DailyBar;

pub use config::{Config, ConfigError, Provider};
pub use db::{Db, DbError};
pub use error::{IngestError, ViewError};
pub use fetch::{FetchError, FetchEvent, FetchOptions, FetchReport, PriceSource};
pub use models::{AppendSummary, EtfDetail, StockDetail, TableCounts, TimeseriesPoint};
pub use query::{QueryError, QueryResult, Store};
pub use tiingo::{TiingoClient, TiingoError};
pub use watermark::{WatermarkError, Watermarks};
pub use yahoo::YahooSource;
