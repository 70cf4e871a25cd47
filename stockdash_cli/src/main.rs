mod commands;
mod output;

use std::path::PathBuf;

use anyhow::{bail, Result};
use clap::{Parser, Subcommand};
use stockdash_lib::Config;

use crate::output::OutputFormat;

#[derive(Parser)]
#[command(name = "stockdash")]
#[command(about = "Build, refresh and query the NASDAQ stock dashboard database")]
struct Cli {
    /// Output format: table, json, csv or markdown
    #[arg(long, default_value = "table", global = true)]
    output: String,

    /// Config file (defaults to ./stockdash.toml when present)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// SQLite database path, overriding the config file and TARGET_DATABASE
    #[arg(long, global = true)]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Create the tables from the bundled or a given schema (drops existing data and fetch checkpoints)
    Init(commands::init::InitArgs),
    /// Recreate the database and load the screener and history files
    Populate(commands::populate::PopulateArgs),
    /// Append a stock or ETF screener CSV
    LoadScreener(commands::load_screener::LoadScreenerArgs),
    /// Append a directory of historical daily-bar CSV files
    LoadHistory(commands::load_history::LoadHistoryArgs),
    /// Fetch daily bars published since each symbol's last checkpoint
    Fetch(commands::fetch::FetchArgs),
    /// Show the latest trading day per stock
    Overview(commands::overview::OverviewArgs),
    /// Show one stock's history, optionally against another
    Timeseries(commands::timeseries::TimeseriesArgs),
    /// Run a read-only SELECT statement
    Query(commands::query::QueryArgs),
    /// Run an UPDATE statement
    Update(commands::query::UpdateArgs),
    /// Report time-series symbols missing from stock details
    Check,
    /// Show row counts and fetch checkpoints
    Status,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive("stockdash=info".parse()?),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let format = match cli.output.as_str() {
        "table" => OutputFormat::Table,
        "json" => OutputFormat::Json,
        "csv" => OutputFormat::Csv,
        "markdown" | "md" => OutputFormat::Markdown,
        other => bail!(
            "unknown output format `{}` (expected table, json, csv or markdown)",
            other
        ),
    };

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(db) = &cli.db {
        config.database_path = db.clone();
    }

    match &cli.command {
        Commands::Init(args) => commands::init::run(args, &config)?,
        Commands::Populate(args) => commands::populate::run(args, &config)?,
        Commands::LoadScreener(args) => commands::load_screener::run(args, &config)?,
        Commands::LoadHistory(args) => commands::load_history::run(args, &config)?,
        Commands::Fetch(args) => commands::fetch::run(args, &config, &format).await?,
        Commands::Overview(args) => commands::overview::run(args, &config, &format)?,
        Commands::Timeseries(args) => commands::timeseries::run(args, &config, &format)?,
        Commands::Query(args) => commands::query::run_select(args, &config, &format)?,
        Commands::Update(args) => commands::query::run_update(args, &config)?,
        Commands::Check => commands::check::run(&config, &format)?,
        Commands::Status => commands::status::run(&config, &format)?,
    }

    Ok(())
}
