use anyhow::Result;
use clap::Args;
use stockdash_lib::{Config, Store};

use crate::output::{print_query_result, OutputFormat};

#[derive(Args)]
pub struct QueryArgs {
    /// SELECT statement to run against the database
    pub sql: String,
}

#[derive(Args)]
pub struct UpdateArgs {
    /// UPDATE statement to run against the database
    pub sql: String,
}

pub fn run_select(args: &QueryArgs, config: &Config, format: &OutputFormat) -> Result<()> {
    let store = Store::new(&config.database_path);
    let result = store.select(&args.sql)?;
    if result.is_empty() {
        eprintln!("No rows");
    }
    print_query_result(&result, format)
}

pub fn run_update(args: &UpdateArgs, config: &Config) -> Result<()> {
    let store = Store::new(&config.database_path);
    let changed = store.update(&args.sql)?;
    eprintln!("{} rows updated", changed);
    Ok(())
}
