//! Error types for the ingestion and view layers.

use thiserror::Error;

use crate::db::DbError;

/// Failures while reading screener or historical CSV input.
///
/// Format failures terminate the batch: nothing from the failing input is
/// written.
#[derive(Error, Debug)]
pub enum IngestError {
    #[error("failed to read {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("malformed CSV in {path}: {error}")]
    Csv {
        path: String,
        #[source]
        error: csv::Error,
    },
    #[error("{path}: missing required column `{column}`")]
    MissingColumn { path: String, column: String },
    #[error("{path} line {line}: unparseable date `{value}` (expected YYYY-MM-DD)")]
    InvalidDate {
        path: String,
        line: u64,
        value: String,
    },
    #[error("{path} line {line}: missing symbol")]
    MissingSymbol { path: String, line: u64 },
    #[error("{path} line {line}: invalid number `{value}` in column `{column}`")]
    InvalidNumber {
        path: String,
        line: u64,
        column: String,
        value: String,
    },
    #[error(transparent)]
    Db(#[from] DbError),
}

/// Failures while shaping stored rows for the overview and timeseries views.
#[derive(Error, Debug)]
pub enum ViewError {
    #[error("duplicate symbol `{symbol}` in {side}")]
    DuplicateSymbol { symbol: String, side: &'static str },
    #[error("{}", no_selection_message(*compare_selected))]
    NoSelection { compare_selected: bool },
    #[error("no time-series data for `{0}` in the selected range")]
    EmptySeries(String),
    #[error("invalid date range `{0}`: expected `ytd` or `<days>D`")]
    InvalidRange(String),
}

fn no_selection_message(compare_selected: bool) -> &'static str {
    if compare_selected {
        "Please select the first stock for comparison!"
    } else {
        "Please select at least one stock to show!"
    }
}
