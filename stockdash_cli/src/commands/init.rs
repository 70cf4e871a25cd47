use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use stockdash_lib::{Config, Db, Watermarks};

use super::ensure_parent_dir;

#[derive(Args)]
pub struct InitArgs {
    /// DDL file to run instead of the bundled schema
    #[arg(long)]
    pub schema: Option<PathBuf>,

    /// Keep existing data: create missing tables and apply pending migrations only
    #[arg(long, conflicts_with = "schema")]
    pub migrate: bool,
}

pub fn run(args: &InitArgs, config: &Config) -> Result<()> {
    let path = &config.database_path;
    ensure_parent_dir(path)?;
    let db = Db::open(path)?;

    if args.migrate {
        db.init()?;
        eprintln!(
            "Schema at version {} in {}",
            db.schema_version()?,
            path.display()
        );
        return Ok(());
    }

    match &args.schema {
        Some(file) => {
            let ddl = std::fs::read_to_string(file)
                .with_context(|| format!("failed to read schema {}", file.display()))?;
            db.bootstrap(&ddl)?;
            Watermarks::clear(&config.watermark_path)?;
            eprintln!("Applied {} to {}", file.display(), path.display());
        }
        None => {
            db.reset()?;
            Watermarks::clear(&config.watermark_path)?;
            eprintln!("Created tables in {}", path.display());
        }
    }
    Ok(())
}
