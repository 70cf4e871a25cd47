//! Mock-database flow: recreate the tables, then load the screener files and
//! optionally the historical price directory.

use anyhow::Result;
use clap::Args;
use stockdash_lib::{history, screener, Config, Db, Watermarks};

use super::ensure_parent_dir;

#[derive(Args)]
pub struct PopulateArgs {
    /// Also load every historical daily-bar file from the history directory
    #[arg(long)]
    pub populate_timeseries: bool,

    /// Also load the ETF screener
    #[arg(long)]
    pub etfs: bool,
}

pub fn run(args: &PopulateArgs, config: &Config) -> Result<()> {
    let path = &config.database_path;
    ensure_parent_dir(path)?;
    let mut db = Db::open(path)?;
    db.reset()?;
    Watermarks::clear(&config.watermark_path)?;

    let stocks = screener::read_stock_screener(&config.stock_screener_path)?;
    let summary = db.append_stock_details(&stocks.rows)?;
    eprintln!(
        "stock_details: {} inserted, {} skipped, {} dropped without symbol",
        summary.inserted, summary.skipped, stocks.dropped
    );

    if args.populate_timeseries {
        let load = history::load_history_dir(&config.history_dir)?;
        let summary = db.append_timeseries(&load.points)?;
        eprintln!(
            "stock_timeseries: {} inserted, {} skipped from {} files",
            summary.inserted,
            summary.skipped,
            load.files.len()
        );
    }

    if args.etfs {
        let etfs = screener::read_etf_screener(&config.etf_screener_path)?;
        let summary = db.append_etf_details(&etfs.rows)?;
        eprintln!(
            "etf_details: {} inserted, {} skipped",
            summary.inserted, summary.skipped
        );
    }

    eprintln!("Populated {}", path.display());
    Ok(())
}
