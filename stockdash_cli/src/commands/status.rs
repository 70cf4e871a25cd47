use anyhow::Result;
use serde::Serialize;
use stockdash_lib::{Config, Db, TableCounts, Watermarks};

use crate::output::{build_count_rows, build_watermark_rows, print_json, print_rows, OutputFormat};

#[derive(Serialize)]
struct Status<'a> {
    database: String,
    schema_version: i32,
    counts: TableCounts,
    latest_date: Option<chrono::NaiveDate>,
    watermarks: &'a Watermarks,
}

pub fn run(config: &Config, format: &OutputFormat) -> Result<()> {
    let db = Db::open_read_only(&config.database_path)?;
    let counts = db.table_counts()?;
    let latest_date = db.max_timeseries_date()?;
    let watermarks = Watermarks::load(&config.watermark_path)?;

    if *format == OutputFormat::Json {
        print_json(&Status {
            database: config.database_path.display().to_string(),
            schema_version: db.schema_version()?,
            counts,
            latest_date,
            watermarks: &watermarks,
        });
        return Ok(());
    }

    eprintln!(
        "{} (schema version {})",
        config.database_path.display(),
        db.schema_version()?
    );
    if let Some(date) = latest_date {
        eprintln!("Latest stored date: {}", date);
    }
    print_rows(&build_count_rows(&counts), format)?;
    if watermarks.symbols.is_empty() {
        eprintln!("No fetch checkpoints in {}", config.watermark_path.display());
    } else {
        print_rows(&build_watermark_rows(&watermarks), format)?;
    }
    Ok(())
}
