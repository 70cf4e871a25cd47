use chrono::NaiveDate;
use marketdata_api::types::ChartResponse;

fn load_fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{}", name)).unwrap()
}

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

#[test]
fn deserialize_chart_full() {
    let json = load_fixture("chart_aapl.json");
    let resp: ChartResponse = serde_json::from_str(&json).unwrap();
    assert!(resp.chart.error.is_none());

    let results = resp.chart.result.unwrap();
    assert_eq!(results.len(), 1);
    let result = &results[0];
    assert_eq!(result.meta.symbol, "AAPL");
    assert_eq!(result.meta.currency.as_deref(), Some("USD"));
    assert_eq!(result.meta.exchange_name.as_deref(), Some("NMS"));
    assert_eq!(result.meta.gmtoffset, -18000);
    assert_eq!(result.timestamp.len(), 4);
    assert_eq!(result.indicators.quote[0].open[0], Some(186.09));
    assert_eq!(result.indicators.quote[0].volume[3], None);
    assert_eq!(result.indicators.adjclose[0].adjclose[1], Some(185.20));
}

#[test]
fn daily_bars_rename_columns_and_skip_nulls() {
    let json = load_fixture("chart_aapl.json");
    let resp: ChartResponse = serde_json::from_str(&json).unwrap();
    let bars = resp.chart.result.unwrap()[0].daily_bars();

    assert_eq!(bars.len(), 3);
    assert_eq!(bars[0].date, date(2024, 1, 11));
    assert_eq!(bars[0].open, 186.09);
    assert_eq!(bars[0].high, 187.05);
    assert_eq!(bars[0].low, 183.62);
    assert_eq!(bars[0].close, 185.59);
    assert_eq!(bars[0].volume, 49128400);
    assert_eq!(bars[1].date, date(2024, 1, 12));
    assert_eq!(bars[2].date, date(2024, 1, 16));
}

#[test]
fn deserialize_chart_without_timestamps() {
    let json = load_fixture("chart_empty.json");
    let resp: ChartResponse = serde_json::from_str(&json).unwrap();
    let results = resp.chart.result.unwrap();
    assert!(results[0].timestamp.is_empty());
    assert!(results[0].daily_bars().is_empty());
}

#[test]
fn deserialize_chart_error() {
    let json = load_fixture("chart_not_found.json");
    let resp: ChartResponse = serde_json::from_str(&json).unwrap();
    assert!(resp.chart.result.is_none());
    let err = resp.chart.error.unwrap();
    assert_eq!(err.code, "Not Found");
    assert!(err.description.contains("delisted"));
}
