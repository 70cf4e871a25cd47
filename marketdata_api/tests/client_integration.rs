use chrono::NaiveDate;
use marketdata_api::{ChartQuery, Client, Error};
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn load_fixture(name: &str) -> String {
    std::fs::read_to_string(format!("tests/fixtures/{}", name)).unwrap()
}

fn query() -> ChartQuery {
    ChartQuery::new(NaiveDate::from_ymd_opt(2024, 1, 11).unwrap())
}

#[tokio::test]
async fn get_daily_bars_success() {
    let mock_server = MockServer::start().await;
    let body = load_fixture("chart_aapl.json");

    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/AAPL"))
        .and(query_param("period1", "1704931200"))
        .and(query_param("interval", "1d"))
        .respond_with(ResponseTemplate::new(200).set_body_string(&body))
        .mount(&mock_server)
        .await;

    let client = Client::with_base_url(&mock_server.uri());
    let bars = client.get_daily_bars("AAPL", &query()).await.unwrap();
    assert_eq!(bars.len(), 3);
    assert_eq!(bars[0].close, 185.59);
}

#[tokio::test]
async fn get_chart_returns_raw_payload() {
    let mock_server = MockServer::start().await;
    let body = load_fixture("chart_aapl.json");

    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/AAPL"))
        .respond_with(ResponseTemplate::new(200).set_body_string(&body))
        .mount(&mock_server)
        .await;

    let client = Client::with_base_url(&mock_server.uri());
    let resp = client.get_chart("AAPL", &query()).await.unwrap();
    assert_eq!(resp.chart.result.unwrap()[0].meta.symbol, "AAPL");
}

#[tokio::test]
async fn get_daily_bars_not_found_is_empty() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/ZZZZ"))
        .respond_with(
            ResponseTemplate::new(404).set_body_string(load_fixture("chart_not_found.json")),
        )
        .mount(&mock_server)
        .await;

    let client = Client::with_base_url(&mock_server.uri());
    let bars = client.get_daily_bars("ZZZZ", &query()).await.unwrap();
    assert!(bars.is_empty());
}

#[tokio::test]
async fn get_daily_bars_provider_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/AAPL"))
        .respond_with(
            ResponseTemplate::new(200).set_body_string(load_fixture("chart_not_found.json")),
        )
        .mount(&mock_server)
        .await;

    let client = Client::with_base_url(&mock_server.uri());
    let err = client.get_daily_bars("AAPL", &query()).await.unwrap_err();
    match err {
        Error::Provider { code, .. } => assert_eq!(code, "Not Found"),
        other => panic!("unexpected error: {:?}", other),
    }
}

#[tokio::test]
async fn get_daily_bars_server_error() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/AAPL"))
        .respond_with(ResponseTemplate::new(500).set_body_string("Internal Server Error"))
        .mount(&mock_server)
        .await;

    let client = Client::with_base_url(&mock_server.uri());
    let err = client.get_daily_bars("AAPL", &query()).await.unwrap_err();
    assert!(matches!(err, Error::HttpStatus { status: 500, .. }));
}

#[tokio::test]
async fn get_daily_bars_malformed_json() {
    let mock_server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path("/v8/finance/chart/AAPL"))
        .respond_with(ResponseTemplate::new(200).set_body_string("{not valid json}"))
        .mount(&mock_server)
        .await;

    let client = Client::with_base_url(&mock_server.uri());
    let result = client.get_daily_bars("AAPL", &query()).await;
    assert!(matches!(result, Err(Error::RequestFailed)));
}

#[tokio::test]
async fn unreachable_host_is_request_failed() {
    let client = Client::with_base_url("http://127.0.0.1:9")
        .with_timeout(std::time::Duration::from_secs(2));
    let result = client.get_daily_bars("AAPL", &query()).await;
    assert!(matches!(result, Err(Error::RequestFailed)));
}
