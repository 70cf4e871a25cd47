//! Incremental daily-price fetching.
//!
//! Each stock symbol resumes the day after its last checkpoint. Rows land in
//! the database before checkpoints move, so a failed write is retried on the
//! next run instead of leaving a gap.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};
use std::time::Duration;

use chrono::{NaiveDate, NaiveDateTime, Utc};
use marketdata_api::types::DailyBar;
use rand::Rng;
use serde::Serialize;

use crate::db::{Db, DbError};
use crate::error::IngestError;
use crate::models::{AppendSummary, TimeseriesPoint};
use crate::tiingo::TiingoError;
use crate::watermark::{WatermarkError, Watermarks};

#[derive(thiserror::Error, Debug)]
pub enum FetchError {
    #[error("price request for {symbol} failed: {source}")]
    Api {
        symbol: String,
        source: marketdata_api::Error,
    },
    #[error("tiingo request for {symbol} failed: {source}")]
    Tiingo { symbol: String, source: TiingoError },
    #[error(transparent)]
    Db(#[from] DbError),
    #[error(transparent)]
    Watermark(#[from] WatermarkError),
    #[error("failed to write archive {path}: {error}")]
    Archive {
        path: String,
        #[source]
        error: IngestError,
    },
}

/// A provider of daily OHLCV bars.
#[allow(async_fn_in_trait)]
pub trait PriceSource {
    fn name(&self) -> &'static str;

    /// Bars for `symbol` from `start` through the latest available day.
    /// An unknown symbol yields an empty list.
    async fn daily_bars(&self, symbol: &str, start: NaiveDate) -> Result<Vec<DailyBar>, FetchError>;
}

/// Map a screener symbol to the provider's spelling: share classes use `-`
/// instead of `/` and preferred series use `-P` instead of `^`.
pub fn provider_symbol(symbol: &str) -> Option<String> {
    let trimmed = symbol.trim();
    if trimmed.is_empty() {
        return None;
    }
    Some(trimmed.replace('/', "-").replace('^', "-P"))
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StartBasis {
    Watermark,
    Stored,
    LegacyWatermark,
    Default,
}

impl StartBasis {
    pub fn as_str(&self) -> &'static str {
        match self {
            StartBasis::Watermark => "watermark",
            StartBasis::Stored => "stored",
            StartBasis::LegacyWatermark => "legacy_watermark",
            StartBasis::Default => "default",
        }
    }
}

/// Current calendar date in UTC. Provider requests are bounded by UTC
/// midnights, so a local date east of UTC can lie in the provider's future.
pub fn today_utc() -> NaiveDate {
    Utc::now().date_naive()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchPlan {
    pub symbol: String,
    pub start: NaiveDate,
    pub basis: StartBasis,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct FetchSchedule {
    pub pending: Vec<FetchPlan>,
    pub up_to_date: Vec<String>,
}

/// Decide where each symbol resumes: the day after its checkpoint, else the
/// day after its newest stored row, else the day after a legacy file's global
/// date, else `default_start`.
///
/// When both a checkpoint and stored rows exist the earlier of the two wins,
/// so a rebuilt table never resumes past rows it no longer holds.
pub fn plan_fetch(
    symbols: &[String],
    watermarks: &Watermarks,
    stored: &HashMap<String, NaiveDate>,
    default_start: NaiveDate,
    today: NaiveDate,
) -> FetchSchedule {
    let mut schedule = FetchSchedule::default();
    for symbol in symbols {
        let (start, basis) = match (watermarks.get(symbol), stored.get(symbol)) {
            (Some(mark), Some(max)) if *max < mark => (max.succ_opt(), StartBasis::Stored),
            (Some(mark), _) => (mark.succ_opt(), StartBasis::Watermark),
            (None, Some(max)) => (max.succ_opt(), StartBasis::Stored),
            (None, None) => match watermarks.legacy_end_date() {
                Some(last) => (last.succ_opt(), StartBasis::LegacyWatermark),
                None => (Some(default_start), StartBasis::Default),
            },
        };
        match start {
            Some(start) if start <= today => schedule.pending.push(FetchPlan {
                symbol: symbol.clone(),
                start,
                basis,
            }),
            _ => schedule.up_to_date.push(symbol.clone()),
        }
    }
    schedule
}

#[derive(Debug, Clone)]
pub struct FetchOptions {
    pub default_start: NaiveDate,
    pub today: NaiveDate,
    pub keep_going: bool,
    pub delay: Duration,
    pub watermark_path: PathBuf,
    pub archive_dir: Option<PathBuf>,
}

/// Schedule for every stock symbol currently in the database.
pub fn schedule(
    db: &Db,
    watermarks: &Watermarks,
    options: &FetchOptions,
) -> Result<FetchSchedule, DbError> {
    let symbols = db.stock_symbols()?;
    let stored = db.max_dates_by_symbol()?;
    Ok(plan_fetch(
        &symbols,
        watermarks,
        &stored,
        options.default_start,
        options.today,
    ))
}

#[derive(Debug)]
pub enum FetchEvent<'a> {
    Started {
        plan: &'a FetchPlan,
        index: usize,
        total: usize,
    },
    Fetched {
        plan: &'a FetchPlan,
        rows: usize,
    },
    Failed {
        plan: &'a FetchPlan,
        error: &'a FetchError,
    },
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct FetchReport {
    pub provider: &'static str,
    pub planned: usize,
    pub up_to_date: Vec<String>,
    pub fetched: BTreeMap<String, usize>,
    pub failed: Vec<(String, String)>,
    pub rows: usize,
    pub appended: AppendSummary,
    pub archive: Option<PathBuf>,
    pub last_end_date: Option<NaiveDate>,
}

/// Fetch new bars for every stale symbol, store them, then advance and save
/// the checkpoints.
///
/// Without `keep_going` the first provider error aborts the run before
/// anything is written.
pub async fn run_incremental<S, F>(
    db: &mut Db,
    source: &S,
    watermarks: &mut Watermarks,
    options: &FetchOptions,
    mut on_event: F,
) -> Result<FetchReport, FetchError>
where
    S: PriceSource,
    F: FnMut(FetchEvent<'_>),
{
    let schedule = schedule(db, watermarks, options)?;
    let total = schedule.pending.len();
    tracing::info!(
        provider = source.name(),
        total,
        up_to_date = schedule.up_to_date.len(),
        "Starting incremental fetch"
    );

    let mut report = FetchReport {
        provider: source.name(),
        planned: total,
        up_to_date: schedule.up_to_date.clone(),
        ..Default::default()
    };
    let mut points: Vec<TimeseriesPoint> = Vec::new();
    let mut newest: BTreeMap<String, NaiveDate> = BTreeMap::new();

    for (index, plan) in schedule.pending.iter().enumerate() {
        if index > 0 {
            pause(options.delay).await;
        }
        on_event(FetchEvent::Started { plan, index, total });

        match source.daily_bars(&plan.symbol, plan.start).await {
            Ok(bars) => {
                let rows: Vec<TimeseriesPoint> = bars
                    .iter()
                    .filter(|bar| bar.date >= plan.start)
                    .map(|bar| TimeseriesPoint::from_bar(&plan.symbol, bar))
                    .collect();
                if let Some(max) = rows.iter().map(|p| p.date).max() {
                    newest.insert(plan.symbol.clone(), max);
                }
                tracing::debug!(symbol = %plan.symbol, rows = rows.len(), "Fetched bars");
                on_event(FetchEvent::Fetched {
                    plan,
                    rows: rows.len(),
                });
                report.fetched.insert(plan.symbol.clone(), rows.len());
                points.extend(rows);
            }
            Err(error) => {
                on_event(FetchEvent::Failed {
                    plan,
                    error: &error,
                });
                if !options.keep_going {
                    return Err(error);
                }
                tracing::warn!(symbol = %plan.symbol, error = %error, "Fetch failed, continuing");
                report.failed.push((plan.symbol.clone(), error.to_string()));
            }
        }
    }

    report.rows = points.len();
    report.appended = db.append_timeseries(&points)?;

    if let Some(dir) = &options.archive_dir {
        if !points.is_empty() {
            let stamp = chrono::Local::now().naive_local();
            report.archive = Some(write_archive(dir, &points, stamp)?);
        }
    }

    for (symbol, date) in &newest {
        watermarks.advance(symbol, *date);
    }
    if !newest.is_empty() {
        watermarks.save(&options.watermark_path)?;
    }
    report.last_end_date = watermarks.last_end_date;

    tracing::info!(
        rows = report.rows,
        inserted = report.appended.inserted,
        skipped = report.appended.skipped,
        failed = report.failed.len(),
        "Incremental fetch complete"
    );
    Ok(report)
}

async fn pause(delay: Duration) {
    if delay.is_zero() {
        return;
    }
    let jitter = rand::thread_rng().gen_range(0.8..1.2);
    tokio::time::sleep(delay.mul_f64(jitter)).await;
}

/// Archive file name for a run started at `stamp`.
pub fn archive_file_name(stamp: NaiveDateTime) -> String {
    format!("nasdaq_stock_{}.csv", stamp.format("%Y%m%dT%H%M%S"))
}

/// Write fetched rows in the historical-file layout so the bulk loader can
/// replay them.
pub fn write_archive(
    dir: &Path,
    points: &[TimeseriesPoint],
    stamp: NaiveDateTime,
) -> Result<PathBuf, FetchError> {
    let path = dir.join(archive_file_name(stamp));
    let archive_error = |error: IngestError| FetchError::Archive {
        path: path.display().to_string(),
        error,
    };
    std::fs::create_dir_all(dir).map_err(|source| {
        archive_error(IngestError::Io {
            path: dir.display().to_string(),
            source,
        })
    })?;
    let csv_error = |error: csv::Error| {
        archive_error(IngestError::Csv {
            path: path.display().to_string(),
            error,
        })
    };
    let mut writer = csv::Writer::from_path(&path).map_err(csv_error)?;
    for point in points {
        writer.serialize(point).map_err(csv_error)?;
    }
    writer.flush().map_err(|source| {
        archive_error(IngestError::Io {
            path: path.display().to_string(),
            source,
        })
    })?;
    tracing::info!(path = %path.display(), rows = points.len(), "Wrote fetch archive");
    Ok(path)
}
