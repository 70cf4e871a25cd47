//! Read and write access to an existing dashboard database.
//!
//! Every call opens its own connection and never creates the database file,
//! so pointing a `Store` at a missing path fails instead of producing an empty
//! database.

use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use rusqlite::types::ValueRef;
use serde::Serialize;
use serde_json::{Map, Value};

use crate::db::{Db, DbError};
use crate::models::{StockDetail, TimeseriesPoint};

#[derive(thiserror::Error, Debug)]
pub enum QueryError {
    #[error("The query is not a SELECT query.")]
    NotSelect,
    #[error("The query is not an UPDATE query.")]
    NotUpdate,
    #[error("storage error: {0}")]
    Storage(#[from] DbError),
}

impl From<rusqlite::Error> for QueryError {
    fn from(err: rusqlite::Error) -> Self {
        QueryError::Storage(DbError::Sqlite(err))
    }
}

/// Column names plus rows of JSON values, in result order.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct QueryResult {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<Value>>,
}

impl QueryResult {
    /// One JSON object per row, keyed by column name.
    pub fn to_records(&self) -> Vec<Map<String, Value>> {
        self.rows
            .iter()
            .map(|row| {
                self.columns
                    .iter()
                    .cloned()
                    .zip(row.iter().cloned())
                    .collect()
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

pub struct Store {
    path: PathBuf,
}

impl Store {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Run a single SELECT statement.
    pub fn select(&self, sql: &str) -> Result<QueryResult, QueryError> {
        if !starts_with_keyword(sql, "SELECT") {
            return Err(QueryError::NotSelect);
        }
        let db = Db::open_read_only(&self.path)?;
        let mut stmt = db.conn().prepare(sql)?;
        let columns: Vec<String> = stmt.column_names().into_iter().map(String::from).collect();

        let mut result = QueryResult {
            columns,
            rows: Vec::new(),
        };
        let width = result.columns.len();
        let mut rows = stmt.query([])?;
        while let Some(row) = rows.next()? {
            let mut values = Vec::with_capacity(width);
            for i in 0..width {
                values.push(json_value(row.get_ref(i)?));
            }
            result.rows.push(values);
        }
        tracing::debug!(rows = result.rows.len(), "SELECT complete");
        Ok(result)
    }

    /// Run a single UPDATE statement, returning the number of changed rows.
    pub fn update(&self, sql: &str) -> Result<usize, QueryError> {
        if !starts_with_keyword(sql, "UPDATE") {
            return Err(QueryError::NotUpdate);
        }
        let db = Db::open_existing(&self.path)?;
        let changed = db.conn().execute(sql, [])?;
        tracing::debug!(changed, "UPDATE complete");
        Ok(changed)
    }

    pub fn stock_details(&self) -> Result<Vec<StockDetail>, QueryError> {
        Ok(Db::open_read_only(&self.path)?.stock_details()?)
    }

    pub fn latest_trades(&self) -> Result<Vec<TimeseriesPoint>, QueryError> {
        Ok(Db::open_read_only(&self.path)?.latest_trades()?)
    }

    pub fn stock_timeseries(
        &self,
        symbol: &str,
        since: NaiveDate,
    ) -> Result<Vec<TimeseriesPoint>, QueryError> {
        Ok(Db::open_read_only(&self.path)?.stock_timeseries(symbol, since)?)
    }
}

/// Case-insensitive check of the statement's first word.
fn starts_with_keyword(sql: &str, keyword: &str) -> bool {
    sql.trim_start()
        .split(|c: char| !c.is_ascii_alphabetic())
        .next()
        .is_some_and(|word| word.eq_ignore_ascii_case(keyword))
}

fn json_value(value: ValueRef<'_>) -> Value {
    match value {
        ValueRef::Null => Value::Null,
        ValueRef::Integer(i) => Value::from(i),
        ValueRef::Real(f) => serde_json::Number::from_f64(f)
            .map(Value::Number)
            .unwrap_or(Value::Null),
        ValueRef::Text(t) => Value::String(String::from_utf8_lossy(t).into_owned()),
        ValueRef::Blob(b) => Value::String(b.iter().map(|byte| format!("{:02x}", byte)).collect()),
    }
}
