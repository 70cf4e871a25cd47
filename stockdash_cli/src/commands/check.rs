use anyhow::Result;
use stockdash_lib::{Config, Db};

use crate::output::{build_symbol_rows, print_json, print_rows, OutputFormat};

/// Report time-series symbols that have no stock_details row.
pub fn run(config: &Config, format: &OutputFormat) -> Result<()> {
    let db = Db::open_read_only(&config.database_path)?;
    let orphans = db.orphan_timeseries_symbols()?;
    if orphans.is_empty() {
        eprintln!("Every time-series symbol has a stock_details row");
    } else {
        eprintln!("{} time-series symbols missing from stock_details", orphans.len());
    }
    match format {
        OutputFormat::Json => print_json(&orphans),
        _ => print_rows(&build_symbol_rows(&orphans), format)?,
    }
    Ok(())
}
