use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use stockdash_lib::{history, Config};

use super::open_db;

#[derive(Args)]
pub struct LoadHistoryArgs {
    /// Directory of per-symbol CSV files (defaults to the configured history directory)
    #[arg(long)]
    pub dir: Option<PathBuf>,
}

pub fn run(args: &LoadHistoryArgs, config: &Config) -> Result<()> {
    let dir = args.dir.as_ref().unwrap_or(&config.history_dir);
    let mut db = open_db(&config.database_path)?;
    let load = history::load_history_dir(dir)?;
    let summary = db.append_timeseries(&load.points)?;
    eprintln!(
        "stock_timeseries: {} inserted, {} skipped from {} files ({} ignored)",
        summary.inserted,
        summary.skipped,
        load.files.len(),
        load.skipped_files.len()
    );
    Ok(())
}
