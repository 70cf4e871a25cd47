//! Market overview: the latest trading day joined with screener attributes.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::str::FromStr;

use serde::Serialize;

use crate::error::ViewError;
use crate::models::{StockDetail, TimeseriesPoint};

/// Root label of the sector tree.
pub const MARKET_LABEL: &str = "NASDAQ";

/// Sector shown for stocks without one.
pub const UNKNOWN_SECTOR: &str = "N/A";

/// Bucket of the daily change used to colour a stock.
///
/// Bins are right-closed: (-1, -0.05], (-0.05, -0.02], (-0.02, 0],
/// (0, 0.02], (0.02, 0.05], (0.05, 1]. Anything outside, or a missing change,
/// is `Unknown`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChangeColor {
    #[serde(rename = "(?)")]
    Unknown,
    Red,
    IndianRed,
    Gray,
    LightGreen,
    Lime,
    Green,
}

impl ChangeColor {
    pub fn from_delta(delta: Option<f64>) -> Self {
        let Some(d) = delta else {
            return ChangeColor::Unknown;
        };
        if d > -1.0 && d <= -0.05 {
            ChangeColor::Red
        } else if d > -0.05 && d <= -0.02 {
            ChangeColor::IndianRed
        } else if d > -0.02 && d <= 0.0 {
            ChangeColor::Gray
        } else if d > 0.0 && d <= 0.02 {
            ChangeColor::LightGreen
        } else if d > 0.02 && d <= 0.05 {
            ChangeColor::Lime
        } else if d > 0.05 && d <= 1.0 {
            ChangeColor::Green
        } else {
            ChangeColor::Unknown
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ChangeColor::Unknown => "(?)",
            ChangeColor::Red => "red",
            ChangeColor::IndianRed => "indianred",
            ChangeColor::Gray => "gray",
            ChangeColor::LightGreen => "lightgreen",
            ChangeColor::Lime => "lime",
            ChangeColor::Green => "green",
        }
    }
}

impl std::fmt::Display for ChangeColor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MarketOverviewRow {
    pub symbol: String,
    pub name: Option<String>,
    pub country: Option<String>,
    pub sector: String,
    pub industry: Option<String>,
    pub date: chrono::NaiveDate,
    pub price_close: Option<f64>,
    pub delta: Option<f64>,
    pub volume: Option<i64>,
    pub market_cap: Option<f64>,
    pub color: ChangeColor,
}

/// Join the latest bars with stock details, one row per symbol present on
/// both sides, in the order of `latest`.
pub fn build_market_overview(
    details: &[StockDetail],
    latest: &[TimeseriesPoint],
) -> Result<Vec<MarketOverviewRow>, ViewError> {
    let mut by_symbol: HashMap<&str, &StockDetail> = HashMap::with_capacity(details.len());
    for detail in details {
        if by_symbol.insert(detail.symbol.as_str(), detail).is_some() {
            return Err(ViewError::DuplicateSymbol {
                symbol: detail.symbol.clone(),
                side: "stock details",
            });
        }
    }

    let mut seen = BTreeSet::new();
    let mut rows = Vec::with_capacity(latest.len());
    for point in latest {
        if !seen.insert(point.symbol.as_str()) {
            return Err(ViewError::DuplicateSymbol {
                symbol: point.symbol.clone(),
                side: "latest trades",
            });
        }
        let Some(detail) = by_symbol.get(point.symbol.as_str()) else {
            continue;
        };
        let delta = match (point.price_close, point.price_open) {
            (Some(close), Some(open)) if open != 0.0 => Some(close / open - 1.0),
            _ => None,
        };
        let market_cap = match (point.price_close, point.volume) {
            (Some(close), Some(volume)) => Some(close * volume as f64),
            _ => None,
        };
        rows.push(MarketOverviewRow {
            symbol: point.symbol.clone(),
            name: detail.name.clone(),
            country: detail.country.clone(),
            sector: detail
                .sector
                .clone()
                .unwrap_or_else(|| UNKNOWN_SECTOR.to_string()),
            industry: detail.industry.clone(),
            date: point.date,
            price_close: point.price_close,
            delta,
            volume: point.volume,
            market_cap,
            color: ChangeColor::from_delta(delta),
        });
    }
    Ok(rows)
}

/// Sorted distinct sectors.
pub fn sector_options(rows: &[MarketOverviewRow]) -> Vec<String> {
    rows.iter()
        .map(|row| row.sector.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

/// Rows whose sector is one of `sectors`.
pub fn filter_by_sectors<'a>(
    rows: &'a [MarketOverviewRow],
    sectors: &[String],
) -> Vec<&'a MarketOverviewRow> {
    rows.iter()
        .filter(|row| sectors.iter().any(|s| s == &row.sector))
        .collect()
}

/// Quantity that sizes a stock in the sector tree.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SizeMetric {
    #[default]
    MarketCap,
    Volume,
}

impl SizeMetric {
    pub fn value(&self, row: &MarketOverviewRow) -> f64 {
        match self {
            SizeMetric::MarketCap => row.market_cap.unwrap_or(0.0),
            SizeMetric::Volume => row.volume.map(|v| v as f64).unwrap_or(0.0),
        }
    }
}

impl FromStr for SizeMetric {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().replace('-', "_").as_str() {
            "market_cap" => Ok(SizeMetric::MarketCap),
            "volume" => Ok(SizeMetric::Volume),
            other => Err(format!(
                "unknown size metric `{}` (expected market-cap or volume)",
                other
            )),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreemapLeaf {
    pub symbol: String,
    pub value: f64,
    pub delta: Option<f64>,
    pub color: ChangeColor,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SectorNode {
    pub sector: String,
    pub total: f64,
    pub leaves: Vec<TreemapLeaf>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Treemap {
    pub root: String,
    pub total: f64,
    pub sectors: Vec<SectorNode>,
}

/// Group rows as market → sector → symbol. Sectors and leaves are ordered by
/// size, largest first.
pub fn build_treemap(rows: &[&MarketOverviewRow], metric: SizeMetric) -> Treemap {
    let mut groups: BTreeMap<&str, Vec<TreemapLeaf>> = BTreeMap::new();
    for row in rows {
        groups
            .entry(row.sector.as_str())
            .or_default()
            .push(TreemapLeaf {
                symbol: row.symbol.clone(),
                value: metric.value(row),
                delta: row.delta,
                color: row.color,
            });
    }

    let mut sectors: Vec<SectorNode> = groups
        .into_iter()
        .map(|(sector, mut leaves)| {
            leaves.sort_by(|a, b| b.value.total_cmp(&a.value));
            SectorNode {
                sector: sector.to_string(),
                total: leaves.iter().map(|l| l.value).sum(),
                leaves,
            }
        })
        .collect();
    sectors.sort_by(|a, b| b.total.total_cmp(&a.total));

    Treemap {
        root: MARKET_LABEL.to_string(),
        total: sectors.iter().map(|s| s.total).sum(),
        sectors,
    }
}
