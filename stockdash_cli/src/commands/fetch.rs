//! Incremental fetch: pull daily bars published since each symbol's last
//! checkpoint and append them to the time-series table.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use stockdash_lib::fetch::{self, FetchEvent};
use stockdash_lib::{
    Config, Db, FetchOptions, FetchReport, PriceSource, Provider, TiingoClient, Watermarks,
    YahooSource,
};

use super::open_db;
use crate::output::{build_plan_rows, print_json, print_rows, OutputFormat};

#[derive(Args)]
pub struct FetchArgs {
    /// Price provider: yahoo or tiingo (overrides the config file)
    #[arg(long)]
    pub provider: Option<Provider>,

    /// Record per-symbol failures and carry on instead of aborting the run
    #[arg(long)]
    pub keep_going: bool,

    /// Also write the fetched rows to a timestamped CSV in this directory
    #[arg(long)]
    pub archive_dir: Option<PathBuf>,

    /// Base delay between provider requests in milliseconds (jittered)
    #[arg(long)]
    pub delay_ms: Option<u64>,

    /// Print the fetch plan without contacting the provider
    #[arg(long)]
    pub dry_run: bool,
}

pub async fn run(args: &FetchArgs, config: &Config, format: &OutputFormat) -> Result<()> {
    let mut db = open_db(&config.database_path)?;
    let mut watermarks = Watermarks::load(&config.watermark_path)?;

    let options = FetchOptions {
        default_start: config.default_start_date,
        today: fetch::today_utc(),
        keep_going: args.keep_going,
        delay: args
            .delay_ms
            .map(std::time::Duration::from_millis)
            .unwrap_or_else(|| config.request_delay()),
        watermark_path: config.watermark_path.clone(),
        archive_dir: args.archive_dir.clone().or_else(|| config.archive_dir.clone()),
    };

    if args.dry_run {
        let schedule = fetch::schedule(&db, &watermarks, &options)?;
        eprintln!(
            "{} symbols to fetch, {} up to date",
            schedule.pending.len(),
            schedule.up_to_date.len()
        );
        match format {
            OutputFormat::Json => print_json(&schedule),
            _ => print_rows(&build_plan_rows(&schedule.pending), format)?,
        }
        return Ok(());
    }

    let provider = args.provider.unwrap_or(config.provider);
    let report = match provider {
        Provider::Yahoo => {
            let source = YahooSource::new(config.request_timeout());
            fetch_with(&mut db, &source, &mut watermarks, &options).await?
        }
        Provider::Tiingo => {
            let source =
                TiingoClient::new(config.tiingo_api_key()?.to_string(), config.request_timeout())?;
            fetch_with(&mut db, &source, &mut watermarks, &options).await?
        }
    };

    match format {
        OutputFormat::Json => print_json(&report),
        _ => print_summary(&report),
    }
    Ok(())
}

async fn fetch_with<S: PriceSource>(
    db: &mut Db,
    source: &S,
    watermarks: &mut Watermarks,
    options: &FetchOptions,
) -> Result<FetchReport> {
    let pb = ProgressBar::new(0);
    pb.set_style(
        ProgressStyle::with_template(
            "[{elapsed_precise}] {bar:40.cyan/blue} {pos:>7}/{len:7} ({eta}) {msg}",
        )?
        .progress_chars("=> "),
    );

    let result = fetch::run_incremental(db, source, watermarks, options, |event| match event {
        FetchEvent::Started { plan, total, .. } => {
            pb.set_length(total as u64);
            pb.set_message(format!("{} from {}", plan.symbol, plan.start));
        }
        FetchEvent::Fetched { .. } => pb.inc(1),
        FetchEvent::Failed { plan, error } => {
            pb.inc(1);
            pb.println(format!("{}: {}", plan.symbol, error));
        }
    })
    .await;

    pb.finish_and_clear();
    Ok(result?)
}

fn print_summary(report: &FetchReport) {
    eprintln!(
        "{}: {} symbols planned, {} up to date, {} fetched, {} failed",
        report.provider,
        report.planned,
        report.up_to_date.len(),
        report.fetched.len(),
        report.failed.len()
    );
    eprintln!(
        "stock_timeseries: {} rows fetched, {} inserted, {} skipped",
        report.rows, report.appended.inserted, report.appended.skipped
    );
    for (symbol, error) in &report.failed {
        eprintln!("  failed {}: {}", symbol, error);
    }
    if let Some(path) = &report.archive {
        eprintln!("Archived to {}", path.display());
    }
    if let Some(date) = report.last_end_date {
        eprintln!("Latest checkpoint: {}", date);
    }
}
