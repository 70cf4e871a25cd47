//! Bulk loading of historical daily bars from a directory of CSV files.

use std::io::Read;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use csv::StringRecord;

use crate::error::IngestError;
use crate::models::TimeseriesPoint;
use crate::screener::{cell, csv_error, csv_reader, open_input, parse_integral, resolve_columns};

/// Directory entries that are never data files.
pub const SKIPPED_FILE_NAMES: &[&str] = &[".DS_Store"];

pub const HISTORY_COLUMNS: [&str; 7] = [
    "symbol",
    "date",
    "price_open",
    "price_high",
    "price_low",
    "price_close",
    "volume",
];

pub const HISTORY_DATE_FORMAT: &str = "%Y-%m-%d";

#[derive(Debug, Clone, Default)]
pub struct HistoryLoad {
    pub points: Vec<TimeseriesPoint>,
    pub files: Vec<PathBuf>,
    pub skipped_files: Vec<PathBuf>,
}

/// Regular files in `dir`, sorted by name, split into (data files, skipped files).
pub fn list_history_files(dir: &Path) -> Result<(Vec<PathBuf>, Vec<PathBuf>), IngestError> {
    let io_error = |source: std::io::Error| IngestError::Io {
        path: dir.display().to_string(),
        source,
    };
    let mut files = Vec::new();
    let mut skipped = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(io_error)? {
        let entry = entry.map_err(io_error)?;
        let path = entry.path();
        if !entry.file_type().map_err(io_error)?.is_file() {
            tracing::debug!(path = %path.display(), "Skipping non-file entry");
            continue;
        }
        let name = entry.file_name();
        if SKIPPED_FILE_NAMES.iter().any(|s| name == *s) {
            tracing::warn!(path = %path.display(), "Skipping non-data file");
            skipped.push(path);
            continue;
        }
        files.push(path);
    }
    files.sort();
    skipped.sort();
    Ok((files, skipped))
}

pub fn read_history_file(path: &Path) -> Result<Vec<TimeseriesPoint>, IngestError> {
    let file = open_input(path)?;
    parse_history(file, &path.display().to_string())
}

/// Parse one historical CSV. Any malformed row fails the whole input.
pub fn parse_history<R: Read>(reader: R, origin: &str) -> Result<Vec<TimeseriesPoint>, IngestError> {
    let mut csv_reader = csv_reader(reader);
    let positions = resolve_columns(&mut csv_reader, &HISTORY_COLUMNS, origin)?;

    let mut points = Vec::new();
    for record in csv_reader.records() {
        let record = record.map_err(|error| csv_error(origin, error))?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        let row = RowContext {
            record: &record,
            origin,
            line,
        };

        let symbol = cell(&record, positions[0]).ok_or_else(|| IngestError::MissingSymbol {
            path: origin.to_string(),
            line,
        })?;
        let raw_date = cell(&record, positions[1]).unwrap_or_default();
        let date = NaiveDate::parse_from_str(&raw_date, HISTORY_DATE_FORMAT).map_err(|_| {
            IngestError::InvalidDate {
                path: origin.to_string(),
                line,
                value: raw_date.clone(),
            }
        })?;

        points.push(TimeseriesPoint {
            symbol,
            date,
            price_open: row.price(positions[2], "price_open")?,
            price_high: row.price(positions[3], "price_high")?,
            price_low: row.price(positions[4], "price_low")?,
            price_close: row.price(positions[5], "price_close")?,
            volume: row.volume(positions[6])?,
        });
    }
    Ok(points)
}

struct RowContext<'a> {
    record: &'a StringRecord,
    origin: &'a str,
    line: u64,
}

impl RowContext<'_> {
    fn invalid(&self, column: &str, value: String) -> IngestError {
        IngestError::InvalidNumber {
            path: self.origin.to_string(),
            line: self.line,
            column: column.to_string(),
            value,
        }
    }

    fn price(&self, position: usize, column: &str) -> Result<Option<f64>, IngestError> {
        match cell(self.record, position) {
            None => Ok(None),
            Some(value) => match value.parse::<f64>() {
                Ok(v) if v.is_nan() => Ok(None),
                Ok(v) => Ok(Some(v)),
                Err(_) => Err(self.invalid(column, value)),
            },
        }
    }

    fn volume(&self, position: usize) -> Result<Option<i64>, IngestError> {
        match cell(self.record, position) {
            None => Ok(None),
            Some(value) => match parse_integral(&value) {
                Some(v) => Ok(Some(v)),
                None => Err(self.invalid("volume", value)),
            },
        }
    }
}

/// Read every data file in `dir` and concatenate the rows in file order.
pub fn load_history_dir(dir: &Path) -> Result<HistoryLoad, IngestError> {
    let (files, skipped_files) = list_history_files(dir)?;
    let mut points = Vec::new();
    for file in &files {
        let rows = read_history_file(file)?;
        tracing::debug!(path = %file.display(), rows = rows.len(), "Parsed history file");
        points.extend(rows);
    }
    Ok(HistoryLoad {
        points,
        files,
        skipped_files,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const AAPL_CSV: &str = "\
symbol,date,price_close,price_high,price_low,price_open,volume
AAPL,2024-01-10,186.19,186.40,183.92,184.35,46792900
AAPL,2024-01-11,185.59,187.05,183.62,186.54,49128400.0
";

    fn write(dir: &Path, name: &str, body: &str) {
        std::fs::write(dir.join(name), body).expect("write fixture");
    }

    #[test]
    fn parse_history_maps_columns_by_name() {
        let points = parse_history(AAPL_CSV.as_bytes(), "aapl.csv").unwrap();
        assert_eq!(points.len(), 2);
        let first = &points[0];
        assert_eq!(first.symbol, "AAPL");
        assert_eq!(first.date, NaiveDate::from_ymd_opt(2024, 1, 10).unwrap());
        assert_eq!(first.price_open, Some(184.35));
        assert_eq!(first.price_close, Some(186.19));
        assert_eq!(first.volume, Some(46792900));
        assert_eq!(points[1].volume, Some(49128400));
    }

    #[test]
    fn parse_history_rejects_other_date_formats() {
        let csv = "symbol,date,price_open,price_high,price_low,price_close,volume\n\
                   AAPL,01/10/2024,1,1,1,1,1\n";
        let err = parse_history(csv.as_bytes(), "bad.csv").unwrap_err();
        match err {
            IngestError::InvalidDate { line, value, .. } => {
                assert_eq!(line, 2);
                assert_eq!(value, "01/10/2024");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parse_history_rejects_datetime_values() {
        let csv = "symbol,date,price_open,price_high,price_low,price_close,volume\n\
                   AAPL,2024-01-10 00:00:00,1,1,1,1,1\n";
        assert!(matches!(
            parse_history(csv.as_bytes(), "bad.csv"),
            Err(IngestError::InvalidDate { .. })
        ));
    }

    #[test]
    fn parse_history_missing_symbol_and_bad_number() {
        let csv = "symbol,date,price_open,price_high,price_low,price_close,volume\n\
                   ,2024-01-10,1,1,1,1,1\n";
        assert!(matches!(
            parse_history(csv.as_bytes(), "x.csv"),
            Err(IngestError::MissingSymbol { line: 2, .. })
        ));

        let csv = "symbol,date,price_open,price_high,price_low,price_close,volume\n\
                   AAPL,2024-01-10,1,one,1,1,1\n";
        match parse_history(csv.as_bytes(), "x.csv").unwrap_err() {
            IngestError::InvalidNumber { column, value, .. } => {
                assert_eq!(column, "price_high");
                assert_eq!(value, "one");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn parse_history_empty_cells_are_null() {
        let csv = "symbol,date,price_open,price_high,price_low,price_close,volume\n\
                   AAPL,2024-01-10,,,,,\n";
        let points = parse_history(csv.as_bytes(), "x.csv").unwrap();
        assert_eq!(points[0].price_close, None);
        assert_eq!(points[0].volume, None);
    }

    #[test]
    fn load_history_dir_skips_ds_store_and_sorts() {
        let dir = tempfile::tempdir().unwrap();
        write(
            dir.path(),
            "b.csv",
            "symbol,date,price_open,price_high,price_low,price_close,volume\nMSFT,2024-01-10,1,2,0.5,1.5,10\n",
        );
        write(dir.path(), "a.csv", AAPL_CSV);
        write(dir.path(), ".DS_Store", "\0\0binary");
        std::fs::create_dir(dir.path().join("nested")).unwrap();

        let load = load_history_dir(dir.path()).unwrap();
        let names: Vec<String> = load
            .files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["a.csv", "b.csv"]);
        assert_eq!(load.skipped_files.len(), 1);
        assert_eq!(load.points.len(), 3);
        assert_eq!(load.points[0].symbol, "AAPL");
        assert_eq!(load.points[2].symbol, "MSFT");
    }

    #[test]
    fn load_history_dir_fails_on_malformed_file() {
        let dir = tempfile::tempdir().unwrap();
        write(dir.path(), "a.csv", AAPL_CSV);
        write(dir.path(), "b.csv", "symbol,date\nAAPL,2024-01-10\n");
        assert!(matches!(
            load_history_dir(dir.path()),
            Err(IngestError::MissingColumn { .. })
        ));
    }

    #[test]
    fn missing_directory_is_io_error() {
        assert!(matches!(
            load_history_dir(Path::new("/nonexistent/history")),
            Err(IngestError::Io { .. })
        ));
    }
}
