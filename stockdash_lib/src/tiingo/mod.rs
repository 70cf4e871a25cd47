//! Tiingo end-of-day price client, an alternative to the Yahoo chart source.

pub mod client;
pub mod error;
pub mod types;

pub use client::TiingoClient;
pub use error::TiingoError;
