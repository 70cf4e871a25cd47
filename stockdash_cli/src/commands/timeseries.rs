use anyhow::Result;
use clap::Args;
use stockdash_lib::performance::{self, DateRange, PlotType, SymbolSeries};
use stockdash_lib::{Config, Store};

use crate::output::{build_series_rows, print_json, print_rows, OutputFormat};

#[derive(Args)]
pub struct TimeseriesArgs {
    /// Stock to show
    pub symbol: String,

    /// Second stock to compare against
    #[arg(long)]
    pub compare: Option<String>,

    /// Window ending at the latest date: ytd or <N>D (e.g. 30D, 365D)
    #[arg(long, default_value = "183D")]
    pub range: DateRange,

    /// daily-trade, performance-index or daily-price
    #[arg(long, default_value = "daily-trade")]
    pub plot: PlotType,
}

pub fn run(args: &TimeseriesArgs, config: &Config, format: &OutputFormat) -> Result<()> {
    let store = Store::new(&config.database_path);
    let since = performance::default_start_date();
    let details = store.stock_details()?;
    let name_of = |symbol: &str| {
        details
            .iter()
            .find(|d| d.symbol == symbol)
            .and_then(|d| d.name.as_deref())
    };

    let symbol = args.symbol.trim().to_uppercase();
    let primary_points = store.stock_timeseries(&symbol, since)?;
    let compare = args.compare.as_ref().map(|s| s.trim().to_uppercase());
    let compare_points = match &compare {
        Some(other) => store.stock_timeseries(other, since)?,
        None => Vec::new(),
    };

    let primary = SymbolSeries {
        symbol: &symbol,
        name: name_of(&symbol),
        points: &primary_points,
    };
    let second = compare.as_deref().map(|other| SymbolSeries {
        symbol: other,
        name: name_of(other),
        points: &compare_points,
    });

    let comparing = second.is_some();
    let options: Vec<String> = performance::plot_options(comparing)
        .into_iter()
        .map(|(plot, enabled)| {
            if enabled {
                plot.label().to_string()
            } else {
                format!("{} (disabled)", plot.label())
            }
        })
        .collect();
    tracing::debug!(plots = %options.join(", "), "Plot options");

    let chart = performance::build_chart(Some(primary), second, args.range, args.plot)?;
    if chart.plot != args.plot {
        eprintln!(
            "{} is not available here, showing {}",
            args.plot.label(),
            chart.plot.label()
        );
    }

    match format {
        OutputFormat::Json => print_json(&chart),
        _ => {
            eprintln!("{}", chart.title);
            eprintln!("{}", chart.subtitle);
            let points: Vec<_> = chart
                .series
                .iter()
                .flat_map(|s| s.points.iter().cloned())
                .collect();
            print_rows(&build_series_rows(&points), format)?;
        }
    }
    Ok(())
}
