use anyhow::Result;
use serde::Serialize;
use stockdash_lib::fetch::FetchPlan;
use stockdash_lib::market::{MarketOverviewRow, SizeMetric, Treemap};
use stockdash_lib::performance::PerformancePoint;
use stockdash_lib::{QueryResult, TableCounts, Watermarks};
use tabled::builder::Builder;
use tabled::settings::Style;
use tabled::{Table, Tabled};

#[derive(Clone, Debug, PartialEq)]
pub enum OutputFormat {
    Table,
    Json,
    Csv,
    Markdown,
}

#[derive(Tabled, Serialize)]
pub struct OverviewRow {
    #[tabled(rename = "Symbol")]
    #[serde(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Name")]
    #[serde(rename = "Name")]
    name: String,
    #[tabled(rename = "Sector")]
    #[serde(rename = "Sector")]
    sector: String,
    #[tabled(rename = "Close")]
    #[serde(rename = "Close")]
    close: String,
    #[tabled(rename = "Change")]
    #[serde(rename = "Change")]
    change: String,
    #[tabled(rename = "Volume")]
    #[serde(rename = "Volume")]
    volume: String,
    #[tabled(rename = "Market Cap")]
    #[serde(rename = "Market Cap")]
    market_cap: String,
    #[tabled(rename = "Color")]
    #[serde(rename = "Color")]
    color: String,
}

#[derive(Tabled, Serialize)]
pub struct SectorRow {
    #[tabled(rename = "Sector")]
    #[serde(rename = "Sector")]
    sector: String,
    #[tabled(rename = "Stocks")]
    #[serde(rename = "Stocks")]
    stocks: usize,
    #[tabled(rename = "Size")]
    #[serde(rename = "Size")]
    size: String,
    #[tabled(rename = "Share")]
    #[serde(rename = "Share")]
    share: String,
}

#[derive(Tabled, Serialize)]
pub struct SeriesRow {
    #[tabled(rename = "Symbol")]
    #[serde(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Date")]
    #[serde(rename = "Date")]
    date: String,
    #[tabled(rename = "Open")]
    #[serde(rename = "Open")]
    open: String,
    #[tabled(rename = "High")]
    #[serde(rename = "High")]
    high: String,
    #[tabled(rename = "Low")]
    #[serde(rename = "Low")]
    low: String,
    #[tabled(rename = "Close")]
    #[serde(rename = "Close")]
    close: String,
    #[tabled(rename = "Performance")]
    #[serde(rename = "Performance")]
    performance: String,
}

#[derive(Tabled, Serialize)]
pub struct PlanRow {
    #[tabled(rename = "Symbol")]
    #[serde(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Start")]
    #[serde(rename = "Start")]
    start: String,
    #[tabled(rename = "Resumes From")]
    #[serde(rename = "Resumes From")]
    basis: String,
}

#[derive(Tabled, Serialize)]
pub struct CountRow {
    #[tabled(rename = "Table")]
    #[serde(rename = "Table")]
    table: String,
    #[tabled(rename = "Rows")]
    #[serde(rename = "Rows")]
    rows: i64,
}

#[derive(Tabled, Serialize)]
pub struct WatermarkRow {
    #[tabled(rename = "Symbol")]
    #[serde(rename = "Symbol")]
    symbol: String,
    #[tabled(rename = "Last Date")]
    #[serde(rename = "Last Date")]
    last_date: String,
}

#[derive(Tabled, Serialize)]
pub struct SymbolRow {
    #[tabled(rename = "Symbol")]
    #[serde(rename = "Symbol")]
    symbol: String,
}

pub fn build_overview_rows(rows: &[&MarketOverviewRow]) -> Vec<OverviewRow> {
    rows.iter()
        .map(|row| OverviewRow {
            symbol: row.symbol.clone(),
            name: row.name.clone().unwrap_or_default(),
            sector: row.sector.clone(),
            close: format_price(row.price_close),
            change: format_change(row.delta),
            volume: row
                .volume
                .map(|v| format_compact(v as f64))
                .unwrap_or_else(|| "-".to_string()),
            market_cap: row
                .market_cap
                .map(|v| format!("${}", format_compact(v)))
                .unwrap_or_else(|| "-".to_string()),
            color: row.color.to_string(),
        })
        .collect()
}

pub fn build_sector_rows(tree: &Treemap, metric: SizeMetric) -> Vec<SectorRow> {
    tree.sectors
        .iter()
        .map(|node| SectorRow {
            sector: node.sector.clone(),
            stocks: node.leaves.len(),
            size: match metric {
                SizeMetric::MarketCap => format!("${}", format_compact(node.total)),
                SizeMetric::Volume => format_compact(node.total),
            },
            share: if tree.total > 0.0 {
                format!("{:.1}%", node.total / tree.total * 100.0)
            } else {
                "-".to_string()
            },
        })
        .collect()
}

pub fn build_series_rows(points: &[PerformancePoint]) -> Vec<SeriesRow> {
    points
        .iter()
        .map(|p| SeriesRow {
            symbol: p.symbol.clone(),
            date: p.date.to_string(),
            open: format_price(p.price_open),
            high: format_price(p.price_high),
            low: format_price(p.price_low),
            close: format_price(Some(p.price_close)),
            performance: format_change(Some(p.performance_index)),
        })
        .collect()
}

pub fn build_plan_rows(plans: &[FetchPlan]) -> Vec<PlanRow> {
    plans
        .iter()
        .map(|plan| PlanRow {
            symbol: plan.symbol.clone(),
            start: plan.start.to_string(),
            basis: plan.basis.as_str().to_string(),
        })
        .collect()
}

pub fn build_count_rows(counts: &TableCounts) -> Vec<CountRow> {
    vec![
        CountRow {
            table: "stock_details".into(),
            rows: counts.stock_details,
        },
        CountRow {
            table: "etf_details".into(),
            rows: counts.etf_details,
        },
        CountRow {
            table: "stock_timeseries".into(),
            rows: counts.stock_timeseries,
        },
    ]
}

pub fn build_watermark_rows(marks: &Watermarks) -> Vec<WatermarkRow> {
    marks
        .symbols
        .iter()
        .map(|(symbol, date)| WatermarkRow {
            symbol: symbol.clone(),
            last_date: date.to_string(),
        })
        .collect()
}

pub fn build_symbol_rows(symbols: &[String]) -> Vec<SymbolRow> {
    symbols
        .iter()
        .map(|s| SymbolRow { symbol: s.clone() })
        .collect()
}

/// Print rows in the requested format. JSON prints the rows themselves;
/// callers with a richer JSON shape print that instead.
pub fn print_rows<T: Tabled + Serialize>(rows: &[T], format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Table => println!("{}", Table::new(rows)),
        OutputFormat::Markdown => {
            let mut table = Table::new(rows);
            table.with(Style::markdown());
            println!("{}", table);
        }
        OutputFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(std::io::stdout());
            for row in rows {
                wtr.serialize(row)?;
            }
            wtr.flush()?;
        }
        OutputFormat::Json => print_json(&rows),
    }
    Ok(())
}

/// Print an ad-hoc query result, whose columns are only known at run time.
pub fn print_query_result(result: &QueryResult, format: &OutputFormat) -> Result<()> {
    match format {
        OutputFormat::Json => print_json(&result.to_records()),
        OutputFormat::Csv => {
            let mut wtr = csv::Writer::from_writer(std::io::stdout());
            wtr.write_record(&result.columns)?;
            for row in &result.rows {
                wtr.write_record(row.iter().map(cell_text))?;
            }
            wtr.flush()?;
        }
        OutputFormat::Table | OutputFormat::Markdown => {
            let mut table = query_table(result);
            if *format == OutputFormat::Markdown {
                table.with(Style::markdown());
            }
            println!("{}", table);
        }
    }
    Ok(())
}

fn query_table(result: &QueryResult) -> Table {
    let mut builder = Builder::default();
    builder.push_record(result.columns.iter().cloned());
    for row in &result.rows {
        builder.push_record(row.iter().map(cell_text));
    }
    builder.build()
}

fn cell_text(value: &serde_json::Value) -> String {
    match value {
        serde_json::Value::Null => String::new(),
        serde_json::Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

pub fn print_json<T: serde::Serialize>(data: &T) {
    match serde_json::to_string_pretty(data) {
        Ok(json) => println!("{}", json),
        Err(e) => eprintln!("Failed to serialize to JSON: {}", e),
    }
}

fn format_price(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:.2}", v))
        .unwrap_or_else(|| "-".to_string())
}

fn format_change(value: Option<f64>) -> String {
    value
        .map(|v| format!("{:+.2}%", v * 100.0))
        .unwrap_or_else(|| "-".to_string())
}

fn format_compact(value: f64) -> String {
    let abs = value.abs();
    if abs >= 1e12 {
        format!("{:.1}T", value / 1e12)
    } else if abs >= 1e9 {
        format!("{:.1}B", value / 1e9)
    } else if abs >= 1e6 {
        format!("{:.1}M", value / 1e6)
    } else if abs >= 1e3 {
        format!("{:.1}K", value / 1e3)
    } else {
        format!("{}", value)
    }
}
