//! Yahoo chart price source.

use std::time::Duration;

use chrono::{NaiveDate, Utc};
use marketdata_api::types::DailyBar;
use marketdata_api::{ChartQuery, Client};

use crate::fetch::{provider_symbol, FetchError, PriceSource};

pub struct YahooSource {
    client: Client,
}

impl YahooSource {
    pub fn new(timeout: Duration) -> Self {
        Self {
            client: Client::new().with_timeout(timeout),
        }
    }

    /// Wrap a preconfigured client (for testing with wiremock).
    pub fn with_client(client: Client) -> Self {
        Self { client }
    }
}

impl PriceSource for YahooSource {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn daily_bars(&self, symbol: &str, start: NaiveDate) -> Result<Vec<DailyBar>, FetchError> {
        let Some(ticker) = provider_symbol(symbol) else {
            return Ok(Vec::new());
        };
        let query = ChartQuery::new(start);
        if query.period1() > Utc::now().timestamp() {
            tracing::debug!(symbol, %start, "Start date not yet open in UTC, skipping");
            return Ok(Vec::new());
        }
        self.client
            .get_daily_bars(&ticker, &query)
            .await
            .map_err(|source| FetchError::Api {
                symbol: symbol.to_string(),
                source,
            })
    }
}
