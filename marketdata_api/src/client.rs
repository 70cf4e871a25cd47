//! HTTP client for the Yahoo Finance v8 chart API.

use std::time::Duration;

use serde::de::DeserializeOwned;
use url::Url;

use crate::{
    query::{ChartQuery, Query},
    types::{ChartResponse, DailyBar},
    user_agent::get_user_agent,
    Error,
};

/// The one network timeout in the pipeline.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// HTTP client for the chart endpoint.
///
/// Each request builds a fresh `reqwest::Client` with a randomized browser
/// user agent and the configured timeout.
pub struct Client {
    /// Base URL for the API. Defaults to `https://query1.finance.yahoo.com`.
    base_api_url: String,
    timeout: Duration,
}

impl Default for Client {
    fn default() -> Self {
        Self::new()
    }
}

impl Client {
    /// Creates a new client pointing at the production chart API.
    pub fn new() -> Self {
        Self {
            base_api_url: "https://query1.finance.yahoo.com".to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    /// Creates a new client with a custom base URL. Used for testing with wiremock.
    pub fn with_base_url(base_url: &str) -> Self {
        Self {
            base_api_url: base_url.to_string(),
            timeout: DEFAULT_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    fn get_url(&self, segments: &[&str], query: Option<&impl Query>) -> Result<Url, Error> {
        let mut url = Url::parse(&self.base_api_url).map_err(|e| {
            tracing::error!("Invalid URL constructed: {}", e);
            Error::RequestFailed
        })?;
        url.path_segments_mut()
            .map_err(|_| {
                tracing::error!("Base URL cannot carry a path: {}", self.base_api_url);
                Error::RequestFailed
            })?
            .pop_if_empty()
            .extend(segments);
        Ok(match query {
            Some(query) => query.add_to_url(&url),
            None => url,
        })
    }

    async fn get<T, Q>(&self, segments: &[&str], query: Option<&Q>) -> Result<T, Error>
    where
        T: DeserializeOwned,
        Q: Query,
    {
        let url = self.get_url(segments, query)?;
        let client = reqwest::Client::builder()
            .user_agent(get_user_agent())
            .timeout(self.timeout)
            .build()
            .map_err(|e| {
                tracing::error!("Failed to build HTTP client: {}", e);
                Error::RequestFailed
            })?;
        let resp = client
            .get(url)
            .header("accept", "application/json, text/plain, */*")
            .header("accept-language", "en-US,en;q=0.9")
            .send()
            .await
            .map_err(|e| {
                tracing::error!("Failed to get resource: {}", e);
                Error::RequestFailed
            })?;

        let status = resp.status();
        let body = resp.text().await.map_err(|e| {
            tracing::error!("Failed to read response body: {}", e);
            Error::RequestFailed
        })?;

        if !status.is_success() {
            let snippet = truncate_body(&body);
            tracing::error!("Request failed with status {}: {}", status, snippet);
            return Err(Error::HttpStatus {
                status: status.as_u16(),
                body: snippet,
            });
        }

        let parsed = serde_json::from_str::<T>(&body).map_err(|e| {
            let snippet = truncate_body(&body);
            tracing::error!("Failed to parse resource: {} | body: {}", e, snippet);
            Error::RequestFailed
        })?;

        Ok(parsed)
    }

    /// Fetches the raw chart payload for one symbol.
    pub async fn get_chart(&self, symbol: &str, query: &ChartQuery) -> Result<ChartResponse, Error> {
        self.get::<ChartResponse, ChartQuery>(&["v8", "finance", "chart", symbol], Some(query))
            .await
    }

    /// Fetches daily bars for one symbol.
    ///
    /// Unknown symbols (HTTP 404) and empty results yield an empty vector.
    /// An error object inside a successful payload becomes [`Error::Provider`].
    pub async fn get_daily_bars(
        &self,
        symbol: &str,
        query: &ChartQuery,
    ) -> Result<Vec<DailyBar>, Error> {
        let response = match self.get_chart(symbol, query).await {
            Ok(response) => response,
            Err(Error::HttpStatus { status: 404, .. }) => {
                tracing::warn!("No chart data for {}", symbol);
                return Ok(Vec::new());
            }
            Err(e) => return Err(e),
        };

        if let Some(err) = response.chart.error {
            return Err(Error::Provider {
                code: err.code,
                description: err.description,
            });
        }

        Ok(response
            .chart
            .result
            .unwrap_or_default()
            .iter()
            .flat_map(|r| r.daily_bars())
            .collect())
    }
}

fn truncate_body(body: &str) -> String {
    const MAX: usize = 2000;
    if body.len() <= MAX {
        body.to_string()
    } else {
        let mut end = MAX;
        while !body.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...[truncated]", &body[..end])
    }
}
