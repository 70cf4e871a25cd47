//! CLI subcommand implementations.

pub mod check;
pub mod fetch;
pub mod init;
pub mod load_history;
pub mod load_screener;
pub mod overview;
pub mod populate;
pub mod query;
pub mod status;
pub mod timeseries;

use std::path::Path;

use anyhow::{Context, Result};
use stockdash_lib::Db;

/// Create the parent directory of `path` if it has one.
pub(crate) fn ensure_parent_dir(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    Ok(())
}

/// Open the database for writing, creating or upgrading the schema as needed.
pub(crate) fn open_db(path: &Path) -> Result<Db> {
    ensure_parent_dir(path)?;
    let db = Db::open(path)?;
    db.init()?;
    Ok(db)
}
