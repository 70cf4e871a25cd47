//! Tiingo API client for historical end-of-day prices.

use std::time::Duration;

use chrono::NaiveDate;
use marketdata_api::types::DailyBar;

use super::error::TiingoError;
use super::types::TiingoDailyPrice;
use crate::fetch::{provider_symbol, FetchError, PriceSource};

const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Tiingo REST API client for end-of-day historical prices.
pub struct TiingoClient {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
}

impl TiingoClient {
    pub fn new(api_key: String, timeout: Duration) -> Result<Self, TiingoError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            api_key,
            base_url: "https://api.tiingo.com".to_string(),
        })
    }

    /// Create a client against a custom base URL (for testing with wiremock).
    pub fn with_base_url(base_url: &str, api_key: String) -> Result<Self, TiingoError> {
        let client = reqwest::Client::builder()
            .timeout(DEFAULT_TIMEOUT)
            .build()?;
        Ok(Self {
            client,
            api_key,
            base_url: base_url.trim_end_matches('/').to_string(),
        })
    }

    /// Daily prices for `ticker` from `start` through `end` (or the latest
    /// available day).
    ///
    /// Returns an empty list for an unknown ticker (404) or an empty range.
    ///
    /// Tiingo quirk: rate limits return HTTP 200 with Content-Type text/plain
    /// instead of a proper 429 status code.
    pub async fn get_daily_prices(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: Option<NaiveDate>,
    ) -> Result<Vec<TiingoDailyPrice>, TiingoError> {
        let url = format!("{}/tiingo/daily/{}/prices", self.base_url, ticker);
        let mut params = vec![("startDate", start.format("%Y-%m-%d").to_string())];
        if let Some(end) = end {
            params.push(("endDate", end.format("%Y-%m-%d").to_string()));
        }

        let response = self
            .client
            .get(&url)
            .header("Authorization", format!("Token {}", self.api_key))
            .query(&params)
            .send()
            .await?;

        let status = response.status();

        if status == reqwest::StatusCode::NOT_FOUND {
            tracing::debug!(ticker, "Ticker not found on Tiingo");
            return Ok(Vec::new());
        }

        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(TiingoError::InvalidApiKey);
        }

        if !status.is_success() {
            let body = response
                .text()
                .await
                .unwrap_or_else(|_| "Unable to read response body".to_string());
            return Err(TiingoError::ParseFailed(format!(
                "HTTP {}: {}",
                status,
                snippet(&body, 200)
            )));
        }

        let content_type = response
            .headers()
            .get(reqwest::header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or("")
            .to_lowercase();

        let body = response.text().await.map_err(|e| {
            TiingoError::ParseFailed(format!("Failed to read response body: {}", e))
        })?;

        if content_type.contains("text/plain") || content_type.contains("text/html") {
            let lower = body.to_lowercase();
            if lower.contains("rate limit")
                || lower.contains("too many requests")
                || lower.contains("error")
            {
                return Err(TiingoError::RateLimited);
            }
        }

        serde_json::from_str(&body).map_err(|e| {
            TiingoError::ParseFailed(format!(
                "Failed to deserialize response: {} | body: {}",
                e,
                snippet(&body, 500)
            ))
        })
    }
}

fn snippet(body: &str, max: usize) -> &str {
    match body.char_indices().nth(max) {
        Some((idx, _)) => &body[..idx],
        None => body,
    }
}

impl PriceSource for TiingoClient {
    fn name(&self) -> &'static str {
        "tiingo"
    }

    async fn daily_bars(&self, symbol: &str, start: NaiveDate) -> Result<Vec<DailyBar>, FetchError> {
        let Some(ticker) = provider_symbol(symbol) else {
            return Ok(Vec::new());
        };
        let tiingo_error = |source: TiingoError| FetchError::Tiingo {
            symbol: symbol.to_string(),
            source,
        };
        let prices = self
            .get_daily_prices(&ticker, start, None)
            .await
            .map_err(tiingo_error)?;
        prices
            .iter()
            .map(TiingoDailyPrice::to_daily_bar)
            .collect::<Result<Vec<_>, _>>()
            .map_err(tiingo_error)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use wiremock::matchers::{header, method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn sample_prices_json() -> serde_json::Value {
        serde_json::json!([
            {
                "adjClose": 142.56, "adjHigh": 144.10, "adjLow": 141.20, "adjOpen": 143.50,
                "adjVolume": 5000000, "close": 142.56, "date": "2024-06-14T00:00:00+00:00",
                "divCash": 0.0, "high": 144.10, "low": 141.20, "open": 143.50,
                "splitFactor": 1.0, "volume": 5000000
            },
            {
                "adjClose": 145.00, "adjHigh": 146.00, "adjLow": 142.00, "adjOpen": 142.60,
                "adjVolume": 6000000, "close": 145.00, "date": "2024-06-17T00:00:00+00:00",
                "divCash": 0.0, "high": 146.00, "low": 142.00, "open": 142.60,
                "splitFactor": 1.0, "volume": 6000000
            }
        ])
    }

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 6, 14).unwrap()
    }

    #[tokio::test]
    async fn success_returns_all_rows() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/tiingo/daily/AAPL/prices"))
            .and(query_param("startDate", "2024-06-14"))
            .and(header("Authorization", "Token test-key"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(sample_prices_json())
                    .insert_header("content-type", "application/json"),
            )
            .mount(&server)
            .await;

        let client = TiingoClient::with_base_url(&server.uri(), "test-key".to_string()).unwrap();
        let prices = client.get_daily_prices("AAPL", start(), None).await.unwrap();

        assert_eq!(prices.len(), 2);
        assert_eq!(prices[1].close, 145.00);
        assert_eq!(
            prices[1].trading_date().unwrap(),
            NaiveDate::from_ymd_opt(2024, 6, 17).unwrap()
        );
    }

    #[tokio::test]
    async fn price_source_maps_to_daily_bars() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/tiingo/daily/BRK-B/prices"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(sample_prices_json())
                    .insert_header("content-type", "application/json"),
            )
            .mount(&server)
            .await;

        let client = TiingoClient::with_base_url(&server.uri(), "test-key".to_string()).unwrap();
        let bars = client.daily_bars("BRK/B", start()).await.unwrap();

        assert_eq!(bars.len(), 2);
        assert_eq!(bars[0].open, 143.50);
        assert_eq!(bars[0].volume, 5000000);
        assert_eq!(bars[0].date, start());
    }

    #[tokio::test]
    async fn not_found_returns_empty() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(path("/tiingo/daily/ZZZZ/prices"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let client = TiingoClient::with_base_url(&server.uri(), "test-key".to_string()).unwrap();
        let prices = client.get_daily_prices("ZZZZ", start(), None).await.unwrap();
        assert!(prices.is_empty());
    }

    #[tokio::test]
    async fn unauthorized_is_invalid_api_key() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(401))
            .mount(&server)
            .await;

        let client = TiingoClient::with_base_url(&server.uri(), "bad".to_string()).unwrap();
        let err = client.get_daily_prices("AAPL", start(), None).await.unwrap_err();
        assert!(matches!(err, TiingoError::InvalidApiKey));
    }

    #[tokio::test]
    async fn text_plain_rate_limit_detected() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_string("Error: You have run over your hourly request rate limit")
                    .insert_header("content-type", "text/plain"),
            )
            .mount(&server)
            .await;

        let client = TiingoClient::with_base_url(&server.uri(), "test-key".to_string()).unwrap();
        let err = client.get_daily_prices("AAPL", start(), None).await.unwrap_err();
        assert!(matches!(err, TiingoError::RateLimited));
    }

    #[tokio::test]
    async fn server_error_is_parse_failed_with_status() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503).set_body_string("upstream down"))
            .mount(&server)
            .await;

        let client = TiingoClient::with_base_url(&server.uri(), "test-key".to_string()).unwrap();
        let err = client.get_daily_prices("AAPL", start(), None).await.unwrap_err();
        match err {
            TiingoError::ParseFailed(msg) => assert!(msg.contains("503")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn end_date_is_sent_when_given() {
        let server = MockServer::start().await;

        Mock::given(method("GET"))
            .and(query_param("endDate", "2024-06-17"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(serde_json::json!([]))
                    .insert_header("content-type", "application/json"),
            )
            .expect(1)
            .mount(&server)
            .await;

        let client = TiingoClient::with_base_url(&server.uri(), "test-key".to_string()).unwrap();
        let end = NaiveDate::from_ymd_opt(2024, 6, 17).unwrap();
        let prices = client.get_daily_prices("AAPL", start(), Some(end)).await.unwrap();
        assert!(prices.is_empty());
    }
}
