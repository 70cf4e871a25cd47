use anyhow::Result;
use clap::Args;
use stockdash_lib::market::{self, MarketOverviewRow, SizeMetric};
use stockdash_lib::{Config, Store};

use crate::output::{build_overview_rows, build_sector_rows, print_json, print_rows, OutputFormat};

#[derive(Args)]
pub struct OverviewArgs {
    /// Keep only these sectors (repeatable); all sectors when omitted
    #[arg(long)]
    pub sector: Vec<String>,

    /// Quantity sizing each stock: market-cap or volume
    #[arg(long, default_value = "market-cap")]
    pub size: SizeMetric,

    /// Aggregate by sector instead of listing stocks
    #[arg(long)]
    pub by_sector: bool,
}

pub fn run(args: &OverviewArgs, config: &Config, format: &OutputFormat) -> Result<()> {
    let store = Store::new(&config.database_path);
    let details = store.stock_details()?;
    let latest = store.latest_trades()?;
    let rows = market::build_market_overview(&details, &latest)?;

    if let Some(date) = rows.first().map(|r| r.date) {
        eprintln!("{} market on {}", market::MARKET_LABEL, date);
    }

    let selected: Vec<&MarketOverviewRow> = if args.sector.is_empty() {
        rows.iter().collect()
    } else {
        market::filter_by_sectors(&rows, &args.sector)
    };
    if selected.is_empty() && !args.sector.is_empty() {
        eprintln!(
            "No stocks in the selected sectors. Available: {}",
            market::sector_options(&rows).join(", ")
        );
    }

    if args.by_sector {
        let tree = market::build_treemap(&selected, args.size);
        match format {
            OutputFormat::Json => print_json(&tree),
            _ => print_rows(&build_sector_rows(&tree, args.size), format)?,
        }
        return Ok(());
    }

    match format {
        OutputFormat::Json => print_json(&selected),
        _ => print_rows(&build_overview_rows(&selected), format)?,
    }
    Ok(())
}
