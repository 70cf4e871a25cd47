//! Per-symbol price history shaped for the timeseries view.

use std::fmt;
use std::str::FromStr;

use chrono::{Datelike, Days, NaiveDate};
use regex::Regex;
use serde::Serialize;

use crate::error::ViewError;
use crate::models::TimeseriesPoint;

/// Earliest date the timeseries view loads.
pub fn default_start_date() -> NaiveDate {
    NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or(NaiveDate::MIN)
}

/// Preset ranges offered by the view, with their labels.
pub const DATE_RANGE_PRESETS: [(&str, &str); 6] = [
    ("ytd", "Year to date"),
    ("30D", "1 month"),
    ("183D", "6 months"),
    ("365D", "1 year"),
    ("1096D", "3 years"),
    ("1826D", "5 years"),
];

/// Window ending at the latest date of a series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateRange {
    YearToDate,
    Days(u64),
}

impl Default for DateRange {
    fn default() -> Self {
        DateRange::Days(183)
    }
}

impl FromStr for DateRange {
    type Err = ViewError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        if trimmed.eq_ignore_ascii_case("ytd") {
            return Ok(DateRange::YearToDate);
        }
        let invalid = || ViewError::InvalidRange(s.to_string());
        let re = Regex::new(r"^(\d+)[Dd]$").map_err(|_| invalid())?;
        let caps = re.captures(trimmed).ok_or_else(invalid)?;
        let days = caps[1].parse::<u64>().map_err(|_| invalid())?;
        Ok(DateRange::Days(days))
    }
}

impl fmt::Display for DateRange {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            DateRange::YearToDate => write!(f, "ytd"),
            DateRange::Days(n) => write!(f, "{}D", n),
        }
    }
}

impl DateRange {
    /// First date kept when the series ends on `latest`.
    pub fn cutoff(&self, latest: NaiveDate) -> NaiveDate {
        match self {
            DateRange::YearToDate => {
                NaiveDate::from_ymd_opt(latest.year(), 1, 1).unwrap_or(latest)
            }
            DateRange::Days(n) => latest
                .checked_sub_days(Days::new(*n))
                .unwrap_or(NaiveDate::MIN),
        }
    }
}

/// Sort by date and keep the points inside `range`.
pub fn filter_date_range(points: &[TimeseriesPoint], range: DateRange) -> Vec<TimeseriesPoint> {
    let mut sorted = points.to_vec();
    sorted.sort_by_key(|p| p.date);
    let Some(latest) = sorted.last().map(|p| p.date) else {
        return sorted;
    };
    let cutoff = range.cutoff(latest);
    sorted.retain(|p| p.date >= cutoff);
    sorted
}

/// A bar plus its performance relative to the first close of the window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PerformancePoint {
    pub symbol: String,
    pub date: NaiveDate,
    pub price_open: Option<f64>,
    pub price_high: Option<f64>,
    pub price_low: Option<f64>,
    pub price_close: f64,
    pub performance_index: f64,
}

/// `close / first close - 1` for each bar with a close. Empty if there is no
/// usable base price.
pub fn performance_index(points: &[TimeseriesPoint]) -> Vec<PerformancePoint> {
    let Some(base) = points
        .iter()
        .filter_map(|p| p.price_close)
        .find(|c| *c != 0.0)
    else {
        return Vec::new();
    };
    points
        .iter()
        .filter_map(|p| {
            let close = p.price_close?;
            Some(PerformancePoint {
                symbol: p.symbol.clone(),
                date: p.date,
                price_open: p.price_open,
                price_high: p.price_high,
                price_low: p.price_low,
                price_close: close,
                performance_index: close / base - 1.0,
            })
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Trend {
    Up,
    Down,
}

impl Trend {
    pub fn color(&self) -> &'static str {
        match self {
            Trend::Up => "#089000",
            Trend::Down => "#ff0000",
        }
    }
}

/// Up when the last close is at least the first close.
pub fn trend(points: &[PerformancePoint]) -> Option<Trend> {
    let first = points.first()?;
    let last = points.last()?;
    Some(if last.price_close >= first.price_close {
        Trend::Up
    } else {
        Trend::Down
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum PlotType {
    #[default]
    DailyTrade,
    PerformanceIndex,
    DailyPrice,
}

impl PlotType {
    pub fn label(&self) -> &'static str {
        match self {
            PlotType::DailyTrade => "Daily Trade",
            PlotType::PerformanceIndex => "Performance Index",
            PlotType::DailyPrice => "Daily Price",
        }
    }

    pub fn is_available(&self, comparing: bool) -> bool {
        match self {
            PlotType::DailyTrade => !comparing,
            PlotType::PerformanceIndex => true,
            PlotType::DailyPrice => comparing,
        }
    }
}

impl FromStr for PlotType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let key = s.trim().to_ascii_lowercase().replace('-', "_");
        match key.trim_end_matches("_graph") {
            "daily_trade" => Ok(PlotType::DailyTrade),
            "performance_index" => Ok(PlotType::PerformanceIndex),
            "daily_price" => Ok(PlotType::DailyPrice),
            _ => Err(format!(
                "unknown plot type `{}` (expected daily-trade, performance-index or daily-price)",
                s
            )),
        }
    }
}

/// Plot choices with availability for the current mode.
pub fn plot_options(comparing: bool) -> Vec<(PlotType, bool)> {
    [
        PlotType::DailyTrade,
        PlotType::PerformanceIndex,
        PlotType::DailyPrice,
    ]
    .into_iter()
    .map(|plot| (plot, plot.is_available(comparing)))
    .collect()
}

/// The plot actually drawn: an unavailable choice falls back to the
/// performance index.
pub fn effective_plot(requested: PlotType, comparing: bool) -> PlotType {
    if requested.is_available(comparing) {
        requested
    } else {
        PlotType::PerformanceIndex
    }
}

/// One symbol's stored history and display name.
#[derive(Debug, Clone, Copy)]
pub struct SymbolSeries<'a> {
    pub symbol: &'a str,
    pub name: Option<&'a str>,
    pub points: &'a [TimeseriesPoint],
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSeries {
    pub symbol: String,
    pub color: Option<&'static str>,
    pub points: Vec<PerformancePoint>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChartSpec {
    pub title: String,
    pub subtitle: String,
    pub plot: PlotType,
    pub y_axis: &'static str,
    pub series: Vec<ChartSeries>,
}

/// Shape the selection into a chart description.
pub fn build_chart(
    primary: Option<SymbolSeries<'_>>,
    compare: Option<SymbolSeries<'_>>,
    range: DateRange,
    requested: PlotType,
) -> Result<ChartSpec, ViewError> {
    let Some(primary) = primary else {
        return Err(ViewError::NoSelection {
            compare_selected: compare.is_some(),
        });
    };
    let comparing = compare.is_some();
    let plot = effective_plot(requested, comparing);

    let first = windowed(&primary, range)?;
    let second = match compare {
        Some(other) => Some((other.symbol, windowed(&other, range)?)),
        None => None,
    };

    let span_start = first.first().map(|p| p.date);
    let span_end = second
        .as_ref()
        .and_then(|(_, points)| points.last())
        .or_else(|| first.last())
        .map(|p| p.date);
    let span = match (span_start, span_end) {
        (Some(start), Some(end)) => format!("from {} to {}", start, end),
        _ => String::new(),
    };

    let y_axis = match plot {
        PlotType::DailyTrade | PlotType::DailyPrice => "Price",
        PlotType::PerformanceIndex => "Performance index",
    };

    let chart = match second {
        Some((other_symbol, other_points)) => ChartSpec {
            title: format!("{} vs {}", primary.symbol, other_symbol),
            subtitle: match plot {
                PlotType::DailyPrice => format!("Close price {}", span),
                _ => format!("Performance index {}", span),
            },
            plot,
            y_axis,
            series: vec![
                ChartSeries {
                    symbol: primary.symbol.to_string(),
                    color: None,
                    points: first,
                },
                ChartSeries {
                    symbol: other_symbol.to_string(),
                    color: None,
                    points: other_points,
                },
            ],
        },
        None => {
            let color = match plot {
                PlotType::PerformanceIndex => trend(&first).map(|t| t.color()),
                _ => None,
            };
            ChartSpec {
                title: format!("{} | {}", primary.symbol, primary.name.unwrap_or("N/A")),
                subtitle: match plot {
                    PlotType::DailyTrade => format!("Daily trading details {}", span),
                    _ => format!("Performance index {}", span),
                },
                plot,
                y_axis,
                series: vec![ChartSeries {
                    symbol: primary.symbol.to_string(),
                    color,
                    points: first,
                }],
            }
        }
    };
    Ok(chart)
}

fn windowed(series: &SymbolSeries<'_>, range: DateRange) -> Result<Vec<PerformancePoint>, ViewError> {
    let points = performance_index(&filter_date_range(series.points, range));
    if points.is_empty() {
        return Err(ViewError::EmptySeries(series.symbol.to_string()));
    }
    Ok(points)
}
