//! NASDAQ screener CSV loading.
//!
//! Screener exports carry more columns than the dashboard stores. Headers are
//! matched case-insensitively (`IPO Year` becomes `ipo_year`), extra columns
//! are dropped and rows without a symbol are discarded.

use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

use csv::StringRecord;

use crate::error::IngestError;
use crate::models::{EtfDetail, StockDetail};

pub const STOCK_SCREENER_COLUMNS: [&str; 7] = [
    "symbol", "name", "country", "ipo_year", "volume", "sector", "industry",
];

pub const ETF_SCREENER_COLUMNS: [&str; 2] = ["symbol", "name"];

/// Parsed screener rows plus the number of rows dropped for a missing symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenerLoad<T> {
    pub rows: Vec<T>,
    pub dropped: usize,
}

pub fn read_stock_screener(path: &Path) -> Result<ScreenerLoad<StockDetail>, IngestError> {
    let file = open_input(path)?;
    parse_stock_screener(file, &path.display().to_string())
}

pub fn read_etf_screener(path: &Path) -> Result<ScreenerLoad<EtfDetail>, IngestError> {
    let file = open_input(path)?;
    parse_etf_screener(file, &path.display().to_string())
}

/// Parse a stock screener export. `origin` labels errors.
pub fn parse_stock_screener<R: Read>(
    reader: R,
    origin: &str,
) -> Result<ScreenerLoad<StockDetail>, IngestError> {
    let mut csv_reader = csv_reader(reader);
    let positions = resolve_columns(&mut csv_reader, &STOCK_SCREENER_COLUMNS, origin)?;

    let mut load = ScreenerLoad {
        rows: Vec::new(),
        dropped: 0,
    };
    for record in csv_reader.records() {
        let record = record.map_err(|error| csv_error(origin, error))?;
        let Some(symbol) = cell(&record, positions[0]) else {
            load.dropped += 1;
            continue;
        };
        let ipo_year = lenient_int(cell(&record, positions[3]), "ipo_year", &symbol, origin);
        let volume = lenient_int(cell(&record, positions[4]), "volume", &symbol, origin);
        load.rows.push(StockDetail {
            name: cell(&record, positions[1]),
            country: cell(&record, positions[2]),
            ipo_year,
            volume,
            sector: cell(&record, positions[5]),
            industry: cell(&record, positions[6]),
            symbol,
        });
    }
    if load.dropped > 0 {
        tracing::warn!(origin, dropped = load.dropped, "Dropped screener rows without a symbol");
    }
    Ok(load)
}

/// Parse an ETF screener export. `origin` labels errors.
pub fn parse_etf_screener<R: Read>(
    reader: R,
    origin: &str,
) -> Result<ScreenerLoad<EtfDetail>, IngestError> {
    let mut csv_reader = csv_reader(reader);
    let positions = resolve_columns(&mut csv_reader, &ETF_SCREENER_COLUMNS, origin)?;

    let mut load = ScreenerLoad {
        rows: Vec::new(),
        dropped: 0,
    };
    for record in csv_reader.records() {
        let record = record.map_err(|error| csv_error(origin, error))?;
        match cell(&record, positions[0]) {
            Some(symbol) => load.rows.push(EtfDetail {
                symbol,
                name: cell(&record, positions[1]),
            }),
            None => load.dropped += 1,
        }
    }
    if load.dropped > 0 {
        tracing::warn!(origin, dropped = load.dropped, "Dropped screener rows without a symbol");
    }
    Ok(load)
}

pub(crate) fn open_input(path: &Path) -> Result<File, IngestError> {
    File::open(path).map_err(|source| IngestError::Io {
        path: path.display().to_string(),
        source,
    })
}

pub(crate) fn csv_reader<R: Read>(reader: R) -> csv::Reader<R> {
    csv::ReaderBuilder::new()
        .has_headers(true)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader)
}

pub(crate) fn csv_error(origin: &str, error: csv::Error) -> IngestError {
    IngestError::Csv {
        path: origin.to_string(),
        error,
    }
}

pub(crate) fn normalize_header(header: &str) -> String {
    let lower = header.trim().to_lowercase();
    if lower == "ipo year" {
        "ipo_year".to_string()
    } else {
        lower
    }
}

/// Positions of `required` columns in the header row, in the order given.
pub(crate) fn resolve_columns<R: Read>(
    reader: &mut csv::Reader<R>,
    required: &[&str],
    origin: &str,
) -> Result<Vec<usize>, IngestError> {
    let headers = reader
        .headers()
        .map_err(|error| csv_error(origin, error))?;
    let index: HashMap<String, usize> = headers
        .iter()
        .enumerate()
        .map(|(i, h)| (normalize_header(h), i))
        .collect();

    required
        .iter()
        .map(|column| {
            index
                .get(*column)
                .copied()
                .ok_or_else(|| IngestError::MissingColumn {
                    path: origin.to_string(),
                    column: column.to_string(),
                })
        })
        .collect()
}

/// Non-empty cell value. Short rows read as empty.
pub(crate) fn cell(record: &StringRecord, position: usize) -> Option<String> {
    record
        .get(position)
        .filter(|value| !value.is_empty())
        .map(String::from)
}

/// Integer parse accepting float spellings such as `1999.0`.
pub(crate) fn parse_integral(value: &str) -> Option<i64> {
    if let Ok(n) = value.parse::<i64>() {
        return Some(n);
    }
    let f = value.parse::<f64>().ok()?;
    if f.is_finite() && f.fract() == 0.0 && f.abs() < i64::MAX as f64 {
        Some(f as i64)
    } else {
        None
    }
}

fn lenient_int(value: Option<String>, column: &str, symbol: &str, origin: &str) -> Option<i64> {
    let value = value?;
    let parsed = parse_integral(&value);
    if parsed.is_none() {
        tracing::warn!(origin, symbol, column, value = %value, "Unparseable screener number stored as NULL");
    }
    parsed
}

#[cfg(test)]
mod tests {
    use super::*;

    const STOCK_CSV: &str = "\
Symbol,Name,Last Sale,Net Change,% Change,Market Cap,Country,IPO Year,Volume,Sector,Industry
AAPL,Apple Inc. Common Stock,$185.92,1.02,0.55%,2870000000000,United States,1980,48103241,Technology,Computer Manufacturing
,Ghost Row,$1.00,0,0%,0,United States,,0,,
MSFT,Microsoft Corporation Common Stock,$388.47,-1.22,-0.31%,2890000000000,United States,1986.0,20109000,Technology,Computer Software: Prepackaged Software
NEWCO,New Company,$10.00,0,0%,0,,,,,
";

    #[test]
    fn stock_screener_projects_known_columns() {
        let load = parse_stock_screener(STOCK_CSV.as_bytes(), "stock.csv").unwrap();
        assert_eq!(load.dropped, 1);
        assert_eq!(load.rows.len(), 3);

        let aapl = &load.rows[0];
        assert_eq!(aapl.symbol, "AAPL");
        assert_eq!(aapl.name.as_deref(), Some("Apple Inc. Common Stock"));
        assert_eq!(aapl.country.as_deref(), Some("United States"));
        assert_eq!(aapl.ipo_year, Some(1980));
        assert_eq!(aapl.volume, Some(48103241));
        assert_eq!(aapl.sector.as_deref(), Some("Technology"));
        assert_eq!(aapl.industry.as_deref(), Some("Computer Manufacturing"));
    }

    #[test]
    fn stock_screener_accepts_float_years_and_empty_cells() {
        let load = parse_stock_screener(STOCK_CSV.as_bytes(), "stock.csv").unwrap();
        assert_eq!(load.rows[1].ipo_year, Some(1986));

        let newco = &load.rows[2];
        assert_eq!(newco.symbol, "NEWCO");
        assert_eq!(newco.country, None);
        assert_eq!(newco.ipo_year, None);
        assert_eq!(newco.sector, None);
    }

    #[test]
    fn stock_screener_bad_number_becomes_null() {
        let csv = "symbol,name,country,ipo_year,volume,sector,industry\nAAPL,Apple,US,n/a,abc,Tech,HW\n";
        let load = parse_stock_screener(csv.as_bytes(), "s.csv").unwrap();
        assert_eq!(load.rows[0].ipo_year, None);
        assert_eq!(load.rows[0].volume, None);
    }

    #[test]
    fn stock_screener_missing_column_is_error() {
        let csv = "Symbol,Name,Country,Volume,Sector,Industry\nAAPL,Apple,US,1,Tech,HW\n";
        let err = parse_stock_screener(csv.as_bytes(), "s.csv").unwrap_err();
        match err {
            IngestError::MissingColumn { column, .. } => assert_eq!(column, "ipo_year"),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn etf_screener_keeps_symbol_and_name() {
        let csv = "Symbol,Name,Last Sale\nQQQ,Invesco QQQ Trust,$400\n,Nameless,$1\n";
        let load = parse_etf_screener(csv.as_bytes(), "etf.csv").unwrap();
        assert_eq!(load.dropped, 1);
        assert_eq!(
            load.rows,
            vec![EtfDetail {
                symbol: "QQQ".into(),
                name: Some("Invesco QQQ Trust".into()),
            }]
        );
    }

    #[test]
    fn header_normalization() {
        assert_eq!(normalize_header(" IPO Year "), "ipo_year");
        assert_eq!(normalize_header("Symbol"), "symbol");
        assert_eq!(normalize_header("% Change"), "% change");
    }

    #[test]
    fn parse_integral_variants() {
        assert_eq!(parse_integral("42"), Some(42));
        assert_eq!(parse_integral("42.0"), Some(42));
        assert_eq!(parse_integral("42.5"), None);
        assert_eq!(parse_integral("NaN"), None);
        assert_eq!(parse_integral(""), None);
    }

    #[test]
    fn missing_file_reports_path() {
        let err = read_stock_screener(Path::new("/nonexistent/screener.csv")).unwrap_err();
        assert!(err.to_string().contains("/nonexistent/screener.csv"));
    }
}
