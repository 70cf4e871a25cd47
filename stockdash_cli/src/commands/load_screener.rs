use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, ValueEnum};
use stockdash_lib::{screener, Config};

use super::open_db;

#[derive(Clone, Copy, ValueEnum)]
pub enum ScreenerKind {
    Stock,
    Etf,
}

#[derive(Args)]
pub struct LoadScreenerArgs {
    /// Which screener export the file is
    #[arg(long, value_enum)]
    pub kind: ScreenerKind,

    /// Screener CSV (defaults to the configured path for the kind)
    #[arg(long)]
    pub file: Option<PathBuf>,
}

pub fn run(args: &LoadScreenerArgs, config: &Config) -> Result<()> {
    let mut db = open_db(&config.database_path)?;
    let (table, summary, dropped) = match args.kind {
        ScreenerKind::Stock => {
            let file = args.file.as_ref().unwrap_or(&config.stock_screener_path);
            let load = screener::read_stock_screener(file)?;
            ("stock_details", db.append_stock_details(&load.rows)?, load.dropped)
        }
        ScreenerKind::Etf => {
            let file = args.file.as_ref().unwrap_or(&config.etf_screener_path);
            let load = screener::read_etf_screener(file)?;
            ("etf_details", db.append_etf_details(&load.rows)?, load.dropped)
        }
    };
    eprintln!(
        "{}: {} inserted, {} skipped, {} dropped without symbol",
        table, summary.inserted, summary.skipped, dropped
    );
    Ok(())
}
