//! SQLite storage for screener reference data and daily price history.

use std::collections::HashMap;
use std::path::Path;

use chrono::NaiveDate;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension, Row};

use crate::models::{AppendSummary, EtfDetail, StockDetail, TableCounts, TimeseriesPoint};

/// Bundled DDL: drops and recreates every table.
pub const SCHEMA: &str = include_str!("../../schema/sqlite.sql");

/// Dates are stored as plain `YYYY-MM-DD` text.
pub const STORED_DATE_FORMAT: &str = "%Y-%m-%d";

const TABLES: [&str; 3] = ["stock_details", "etf_details", "stock_timeseries"];

#[derive(thiserror::Error, Debug)]
pub enum DbError {
    #[error("sqlite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("date parse error: {0}")]
    Date(#[from] chrono::ParseError),
    #[error("database is missing tables {0:?}; run `stockdash init` to recreate the schema")]
    IncompleteSchema(Vec<&'static str>),
}

pub struct Db {
    conn: Connection,
}

impl Db {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let conn = Connection::open(path)?;
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;",
        )?;
        Ok(Self { conn })
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, DbError> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        Ok(Self { conn })
    }

    /// Open an existing database file without write access. Fails if the
    /// file does not exist.
    pub fn open_read_only(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    /// Open an existing database file for writing. Fails if the file does
    /// not exist.
    pub fn open_existing(path: impl AsRef<Path>) -> Result<Self, DbError> {
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_URI
                | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        Ok(Self { conn })
    }

    #[doc(hidden)]
    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    /// Run a DDL script as one batch. Anything already stored in the tables
    /// the script drops is lost.
    pub fn bootstrap(&self, ddl: &str) -> Result<(), DbError> {
        self.conn.execute_batch(ddl)?;
        Ok(())
    }

    /// Drop and recreate all tables from the bundled schema.
    pub fn reset(&self) -> Result<(), DbError> {
        self.bootstrap(SCHEMA)?;
        tracing::info!("Database schema recreated");
        Ok(())
    }

    /// Bring the database to the current schema without discarding data.
    ///
    /// An empty database gets the full schema. A database created by an older
    /// release is migrated in place.
    pub fn init(&self) -> Result<(), DbError> {
        let missing = self.missing_tables()?;
        if missing.len() == TABLES.len() {
            return self.reset();
        }
        if !missing.is_empty() {
            return Err(DbError::IncompleteSchema(missing));
        }

        let version = self.schema_version()?;
        if version < 1 {
            self.migrate_v1()?;
            self.conn.pragma_update(None, "user_version", 1)?;
        }
        Ok(())
    }

    /// Legacy stores hold `YYYY-MM-DD HH:MM:SS` dates and allow repeated
    /// (symbol, date) rows. Normalize dates, keep the first row of each pair,
    /// then enforce uniqueness.
    fn migrate_v1(&self) -> Result<(), DbError> {
        let tx = self.conn.unchecked_transaction()?;
        let normalized = tx.execute(
            "UPDATE stock_timeseries SET date = substr(date, 1, 10) WHERE length(date) > 10",
            [],
        )?;
        let removed = tx.execute(
            "DELETE FROM stock_timeseries
             WHERE rowid NOT IN (
                 SELECT MIN(rowid) FROM stock_timeseries GROUP BY symbol, date
             )",
            [],
        )?;
        tx.execute_batch(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_stock_timeseries_symbol_date
                 ON stock_timeseries (symbol, date);
             CREATE INDEX IF NOT EXISTS idx_stock_timeseries_date
                 ON stock_timeseries (date);",
        )?;
        tx.commit()?;
        tracing::info!(normalized, removed, "Migrated stock_timeseries to schema v1");
        Ok(())
    }

    pub fn schema_version(&self) -> Result<i32, DbError> {
        let version = self
            .conn
            .pragma_query_value(None, "user_version", |row| row.get(0))?;
        Ok(version)
    }

    fn missing_tables(&self) -> Result<Vec<&'static str>, DbError> {
        let mut missing = Vec::new();
        for table in TABLES {
            let found: Option<String> = self
                .conn
                .query_row(
                    "SELECT name FROM sqlite_master WHERE type = 'table' AND name = ?1",
                    params![table],
                    |row| row.get(0),
                )
                .optional()?;
            if found.is_none() {
                missing.push(table);
            }
        }
        Ok(missing)
    }

    pub fn append_stock_details(
        &mut self,
        rows: &[StockDetail],
    ) -> Result<AppendSummary, DbError> {
        let tx = self.conn.transaction()?;
        let mut summary = AppendSummary::default();
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO stock_details
                     (symbol, name, country, ipo_year, volume, sector, industry)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for row in rows {
                let changed = stmt.execute(params![
                    row.symbol,
                    row.name,
                    row.country,
                    row.ipo_year,
                    row.volume,
                    row.sector,
                    row.industry,
                ])?;
                tally(&mut summary, changed);
            }
        }
        tx.commit()?;
        Ok(summary)
    }

    pub fn append_etf_details(&mut self, rows: &[EtfDetail]) -> Result<AppendSummary, DbError> {
        let tx = self.conn.transaction()?;
        let mut summary = AppendSummary::default();
        {
            let mut stmt =
                tx.prepare("INSERT OR IGNORE INTO etf_details (symbol, name) VALUES (?1, ?2)")?;
            for row in rows {
                let changed = stmt.execute(params![row.symbol, row.name])?;
                tally(&mut summary, changed);
            }
        }
        tx.commit()?;
        Ok(summary)
    }

    /// Append daily bars in one transaction. A (symbol, date) pair already
    /// present is skipped, never overwritten.
    pub fn append_timeseries(
        &mut self,
        points: &[TimeseriesPoint],
    ) -> Result<AppendSummary, DbError> {
        let tx = self.conn.transaction()?;
        let mut summary = AppendSummary::default();
        {
            let mut stmt = tx.prepare(
                "INSERT OR IGNORE INTO stock_timeseries
                     (symbol, date, price_open, price_high, price_low, price_close, volume)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            )?;
            for point in points {
                let date = point.date.format(STORED_DATE_FORMAT).to_string();
                let changed = stmt.execute(params![
                    point.symbol,
                    date,
                    point.price_open,
                    point.price_high,
                    point.price_low,
                    point.price_close,
                    point.volume,
                ])?;
                tally(&mut summary, changed);
            }
        }
        tx.commit()?;
        Ok(summary)
    }

    /// Distinct stock symbols, sorted.
    pub fn stock_symbols(&self) -> Result<Vec<String>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT DISTINCT symbol FROM stock_details ORDER BY symbol")?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row?);
        }
        Ok(symbols)
    }

    pub fn stock_details(&self) -> Result<Vec<StockDetail>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT symbol, name, country, ipo_year, volume, sector, industry
             FROM stock_details ORDER BY symbol",
        )?;
        let rows = stmt.query_map([], stock_detail_from_row)?;
        let mut details = Vec::new();
        for row in rows {
            details.push(row?);
        }
        Ok(details)
    }

    pub fn etf_details(&self) -> Result<Vec<EtfDetail>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT symbol, name FROM etf_details ORDER BY symbol")?;
        let rows = stmt.query_map([], |row| {
            Ok(EtfDetail {
                symbol: row.get(0)?,
                name: row.get(1)?,
            })
        })?;
        let mut details = Vec::new();
        for row in rows {
            details.push(row?);
        }
        Ok(details)
    }

    /// All bars on the most recent stored date, sorted by symbol.
    pub fn latest_trades(&self) -> Result<Vec<TimeseriesPoint>, DbError> {
        self.query_points(
            "SELECT symbol, date, price_open, price_high, price_low, price_close, volume
             FROM stock_timeseries
             WHERE date = (SELECT MAX(date) FROM stock_timeseries)
             ORDER BY symbol",
            [],
        )
    }

    /// Bars for one symbol from `since` onward, oldest first.
    pub fn stock_timeseries(
        &self,
        symbol: &str,
        since: NaiveDate,
    ) -> Result<Vec<TimeseriesPoint>, DbError> {
        let since = since.format(STORED_DATE_FORMAT).to_string();
        self.query_points(
            "SELECT symbol, date, price_open, price_high, price_low, price_close, volume
             FROM stock_timeseries
             WHERE symbol = ?1 AND date >= ?2
             ORDER BY date",
            params![symbol, since],
        )
    }

    fn query_points<P: rusqlite::Params>(
        &self,
        sql: &str,
        params: P,
    ) -> Result<Vec<TimeseriesPoint>, DbError> {
        let mut stmt = self.conn.prepare(sql)?;
        let rows = stmt.query_map(params, timeseries_point_from_row)?;
        let mut points = Vec::new();
        for row in rows {
            points.push(row?);
        }
        Ok(points)
    }

    pub fn max_timeseries_date(&self) -> Result<Option<NaiveDate>, DbError> {
        let max: Option<String> = self
            .conn
            .query_row("SELECT MAX(date) FROM stock_timeseries", [], |row| {
                row.get(0)
            })?;
        match max {
            Some(value) => Ok(Some(parse_stored_date(&value)?)),
            None => Ok(None),
        }
    }

    /// Latest stored date per symbol.
    pub fn max_dates_by_symbol(&self) -> Result<HashMap<String, NaiveDate>, DbError> {
        let mut stmt = self
            .conn
            .prepare("SELECT symbol, MAX(date) FROM stock_timeseries GROUP BY symbol")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
        })?;
        let mut dates = HashMap::new();
        for row in rows {
            let (symbol, date) = row?;
            dates.insert(symbol, parse_stored_date(&date)?);
        }
        Ok(dates)
    }

    /// Symbols that have price history but no `stock_details` row.
    pub fn orphan_timeseries_symbols(&self) -> Result<Vec<String>, DbError> {
        let mut stmt = self.conn.prepare(
            "SELECT DISTINCT t.symbol
             FROM stock_timeseries t
             LEFT JOIN stock_details d ON d.symbol = t.symbol
             WHERE d.symbol IS NULL
             ORDER BY t.symbol",
        )?;
        let rows = stmt.query_map([], |row| row.get(0))?;
        let mut symbols = Vec::new();
        for row in rows {
            symbols.push(row?);
        }
        Ok(symbols)
    }

    pub fn table_counts(&self) -> Result<TableCounts, DbError> {
        let count = |table: &str| -> Result<i64, DbError> {
            let sql = format!("SELECT COUNT(1) FROM {}", table);
            Ok(self.conn.query_row(&sql, [], |row| row.get(0))?)
        };
        Ok(TableCounts {
            stock_details: count("stock_details")?,
            etf_details: count("etf_details")?,
            stock_timeseries: count("stock_timeseries")?,
        })
    }
}

fn tally(summary: &mut AppendSummary, changed: usize) {
    if changed == 0 {
        summary.skipped += 1;
    } else {
        summary.inserted += changed;
    }
}

/// Parse a stored date, tolerating a trailing time component.
pub fn parse_stored_date(value: &str) -> Result<NaiveDate, chrono::ParseError> {
    let date_part = value
        .split(|c: char| c == ' ' || c == 'T')
        .next()
        .unwrap_or(value);
    NaiveDate::parse_from_str(date_part, STORED_DATE_FORMAT)
}

pub(crate) fn stock_detail_from_row(row: &Row<'_>) -> rusqlite::Result<StockDetail> {
    Ok(StockDetail {
        symbol: row.get(0)?,
        name: row.get(1)?,
        country: row.get(2)?,
        ipo_year: row.get(3)?,
        volume: row.get(4)?,
        sector: row.get(5)?,
        industry: row.get(6)?,
    })
}

pub(crate) fn timeseries_point_from_row(row: &Row<'_>) -> rusqlite::Result<TimeseriesPoint> {
    let raw_date: String = row.get(1)?;
    let date = parse_stored_date(&raw_date)
        .map_err(|e| rusqlite::Error::FromSqlConversionFailure(1, Type::Text, Box::new(e)))?;
    Ok(TimeseriesPoint {
        symbol: row.get(0)?,
        date,
        price_open: row.get(2)?,
        price_high: row.get(3)?,
        price_low: row.get(4)?,
        price_close: row.get(5)?,
        volume: row.get(6)?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn open_test_db() -> Db {
        let db = Db::open_in_memory().expect("open in-memory db");
        db.init().expect("init schema");
        db
    }

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").expect("valid date")
    }

    fn detail(symbol: &str, sector: Option<&str>) -> StockDetail {
        StockDetail {
            symbol: symbol.to_string(),
            name: Some(format!("{} Inc.", symbol)),
            country: Some("United States".to_string()),
            ipo_year: Some(1999),
            volume: Some(1000),
            sector: sector.map(String::from),
            industry: None,
        }
    }

    fn point(symbol: &str, day: &str, close: f64) -> TimeseriesPoint {
        TimeseriesPoint {
            symbol: symbol.to_string(),
            date: date(day),
            price_open: Some(close - 1.0),
            price_high: Some(close + 1.0),
            price_low: Some(close - 2.0),
            price_close: Some(close),
            volume: Some(500),
        }
    }

    const LEGACY_SCHEMA: &str = "
CREATE TABLE stock_details (symbol TEXT, name TEXT, country TEXT, ipo_year REAL,
    volume INTEGER, sector TEXT, industry TEXT);
CREATE TABLE etf_details (symbol TEXT, name TEXT);
CREATE TABLE stock_timeseries (symbol TEXT, date TIMESTAMP, price_close REAL,
    price_high REAL, price_low REAL, price_open REAL, volume INTEGER);
";

    #[test]
    fn init_creates_schema_on_empty_database() {
        let db = open_test_db();
        assert_eq!(db.schema_version().unwrap(), 1);
        assert_eq!(db.table_counts().unwrap(), TableCounts::default());
    }

    #[test]
    fn init_is_idempotent_and_keeps_data() {
        let mut db = open_test_db();
        db.append_stock_details(&[detail("AAPL", Some("Technology"))])
            .unwrap();
        db.init().unwrap();
        assert_eq!(db.table_counts().unwrap().stock_details, 1);
    }

    #[test]
    fn reset_discards_existing_rows() {
        let mut db = open_test_db();
        db.append_timeseries(&[point("AAPL", "2024-01-10", 10.0)])
            .unwrap();
        db.reset().unwrap();
        assert_eq!(db.table_counts().unwrap().stock_timeseries, 0);
    }

    #[test]
    fn bootstrap_runs_custom_ddl() {
        let db = Db::open_in_memory().unwrap();
        db.bootstrap("CREATE TABLE extra (id INTEGER);").unwrap();
        let n: i64 = db
            .conn()
            .query_row("SELECT COUNT(1) FROM extra", [], |r| r.get(0))
            .unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn init_migrates_legacy_store() {
        let mut db = Db::open_in_memory().unwrap();
        db.bootstrap(LEGACY_SCHEMA).unwrap();
        db.conn()
            .execute_batch(
                "INSERT INTO stock_timeseries VALUES ('AAPL', '2024-01-10 00:00:00', 10, 11, 9, 9.5, 100);
                 INSERT INTO stock_timeseries VALUES ('AAPL', '2024-01-10 00:00:00', 10, 11, 9, 9.5, 100);
                 INSERT INTO stock_timeseries VALUES ('AAPL', '2024-01-11 00:00:00', 12, 13, 11, 11.5, 100);",
            )
            .unwrap();

        db.init().unwrap();

        assert_eq!(db.schema_version().unwrap(), 1);
        assert_eq!(db.table_counts().unwrap().stock_timeseries, 2);
        let max = db.max_dates_by_symbol().unwrap();
        assert_eq!(max.get("AAPL"), Some(&date("2024-01-11")));

        let summary = db
            .append_timeseries(&[point("AAPL", "2024-01-11", 1.0)])
            .unwrap();
        assert_eq!(summary, AppendSummary { inserted: 0, skipped: 1 });
    }

    #[test]
    fn init_rejects_partial_schema() {
        let db = Db::open_in_memory().unwrap();
        db.bootstrap("CREATE TABLE stock_details (symbol TEXT);")
            .unwrap();
        let err = db.init().unwrap_err();
        assert!(matches!(err, DbError::IncompleteSchema(ref t) if t.len() == 2));
    }

    #[test]
    fn append_timeseries_skips_duplicate_pairs() {
        let mut db = open_test_db();
        let batch = vec![
            point("AAPL", "2024-01-10", 10.0),
            point("AAPL", "2024-01-11", 11.0),
            point("MSFT", "2024-01-10", 20.0),
        ];
        let first = db.append_timeseries(&batch).unwrap();
        assert_eq!(first, AppendSummary { inserted: 3, skipped: 0 });

        let second = db.append_timeseries(&batch).unwrap();
        assert_eq!(second, AppendSummary { inserted: 0, skipped: 3 });
        assert_eq!(second.total(), 3);
        assert_eq!(db.table_counts().unwrap().stock_timeseries, 3);
    }

    #[test]
    fn append_stock_details_ignores_existing_symbol() {
        let mut db = open_test_db();
        db.append_stock_details(&[detail("AAPL", Some("Technology"))])
            .unwrap();
        let summary = db
            .append_stock_details(&[detail("AAPL", Some("Other")), detail("MSFT", None)])
            .unwrap();
        assert_eq!(summary, AppendSummary { inserted: 1, skipped: 1 });

        let details = db.stock_details().unwrap();
        assert_eq!(details.len(), 2);
        assert_eq!(details[0].sector.as_deref(), Some("Technology"));
        assert_eq!(details[1].sector, None);
    }

    #[test]
    fn etf_details_roundtrip() {
        let mut db = open_test_db();
        db.append_etf_details(&[EtfDetail {
            symbol: "QQQ".into(),
            name: Some("Invesco QQQ".into()),
        }])
        .unwrap();
        let etfs = db.etf_details().unwrap();
        assert_eq!(etfs.len(), 1);
        assert_eq!(etfs[0].name.as_deref(), Some("Invesco QQQ"));
    }

    #[test]
    fn latest_trades_returns_only_max_date() {
        let mut db = open_test_db();
        db.append_timeseries(&[
            point("MSFT", "2024-01-11", 20.0),
            point("AAPL", "2024-01-10", 10.0),
            point("AAPL", "2024-01-11", 11.0),
        ])
        .unwrap();
        let latest = db.latest_trades().unwrap();
        let symbols: Vec<&str> = latest.iter().map(|p| p.symbol.as_str()).collect();
        assert_eq!(symbols, vec!["AAPL", "MSFT"]);
        assert!(latest.iter().all(|p| p.date == date("2024-01-11")));
    }

    #[test]
    fn latest_trades_empty_store() {
        let db = open_test_db();
        assert!(db.latest_trades().unwrap().is_empty());
        assert_eq!(db.max_timeseries_date().unwrap(), None);
    }

    #[test]
    fn stock_timeseries_filters_and_sorts() {
        let mut db = open_test_db();
        db.append_timeseries(&[
            point("AAPL", "2024-01-12", 12.0),
            point("AAPL", "2019-12-31", 5.0),
            point("AAPL", "2024-01-10", 10.0),
            point("MSFT", "2024-01-10", 20.0),
        ])
        .unwrap();
        let series = db.stock_timeseries("AAPL", date("2020-01-01")).unwrap();
        let dates: Vec<NaiveDate> = series.iter().map(|p| p.date).collect();
        assert_eq!(dates, vec![date("2024-01-10"), date("2024-01-12")]);
    }

    #[test]
    fn stock_symbols_sorted_distinct() {
        let mut db = open_test_db();
        db.append_stock_details(&[detail("MSFT", None), detail("AAPL", None)])
            .unwrap();
        assert_eq!(db.stock_symbols().unwrap(), vec!["AAPL", "MSFT"]);
    }

    #[test]
    fn orphan_symbols_detected() {
        let mut db = open_test_db();
        db.append_stock_details(&[detail("AAPL", None)]).unwrap();
        db.append_timeseries(&[
            point("AAPL", "2024-01-10", 10.0),
            point("ZZZZ", "2024-01-10", 1.0),
        ])
        .unwrap();
        assert_eq!(db.orphan_timeseries_symbols().unwrap(), vec!["ZZZZ"]);
    }

    #[test]
    fn parse_stored_date_accepts_time_suffix() {
        assert_eq!(
            parse_stored_date("2024-01-10 00:00:00").unwrap(),
            date("2024-01-10")
        );
        assert_eq!(
            parse_stored_date("2024-01-10T00:00:00").unwrap(),
            date("2024-01-10")
        );
        assert!(parse_stored_date("10/01/2024").is_err());
    }
}
