use super::{PageRequest, TradeSource};
use crate::{
    error::DataError,
    trade::{AggTrade, Symbol},
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use serde::Serialize;
use std::time::Duration;
use tracing::debug;
use url::Url;

/// Binance spot REST API base url.
pub const BINANCE_SPOT_BASE_URL: &str = "https://api.binance.com";

/// Binance compressed/aggregate trades list endpoint.
const AGG_TRADES_PATH: &str = "/api/v3/aggTrades";

/// Query string of a `GET /api/v3/aggTrades` request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
struct AggTradesQuery<'a> {
    symbol: &'a str,
    limit: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    from_id: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    start_time: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    end_time: Option<i64>,
}

impl<'a> AggTradesQuery<'a> {
    fn new(symbol: &'a Symbol, request: PageRequest, limit: usize) -> Self {
        match request {
            PageRequest::Window { start_ms, end_ms } => Self {
                symbol: symbol.as_str(),
                limit,
                from_id: None,
                start_time: Some(start_ms),
                end_time: Some(end_ms),
            },
            PageRequest::FromId(from_id) => Self {
                symbol: symbol.as_str(),
                limit,
                from_id: Some(from_id),
                start_time: None,
                end_time: None,
            },
        }
    }
}

/// [`TradeSource`] backed by the public Binance spot REST API (no API key required).
#[derive(Debug, Clone)]
pub struct BinanceRestSource {
    client: Client,
    url: Url,
}

impl BinanceRestSource {
    /// Construct a new [`BinanceRestSource`] for the provided base url (eg/ [`BINANCE_SPOT_BASE_URL`]).
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, DataError> {
        let url = Url::parse(base_url)
            .and_then(|base| base.join(AGG_TRADES_PATH))
            .map_err(|error| DataError::Config(format!("invalid base url {base_url}: {error}")))?;

        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|error| DataError::Config(format!("failed to build HTTP client: {error}")))?;

        Ok(Self { client, url })
    }

    pub fn url(&self) -> &Url {
        &self.url
    }
}

#[async_trait]
impl TradeSource for BinanceRestSource {
    async fn aggregate_trades(
        &self,
        symbol: &Symbol,
        request: PageRequest,
        limit: usize,
    ) -> Result<Vec<AggTrade>, DataError> {
        let query = AggTradesQuery::new(symbol, request, limit);
        debug!(?query, "requesting Binance aggregate trades");

        let response = self.client.get(self.url.clone()).query(&query).send().await?;

        let status = response.status();
        if is_rejection(status) {
            let body = response.text().await.unwrap_or_default();
            return Err(DataError::Rejected {
                status: status.as_u16(),
                body,
            });
        }

        if let Err(status_err) = response.error_for_status_ref() {
            return Err(DataError::Http(format!(
                "Binance aggregate trades request failed ({symbol}): {status_err}"
            )));
        }

        response.json::<Vec<AggTrade>>().await.map_err(|parse_err| {
            DataError::Parse(format!(
                "Binance aggregate trades parse failed ({symbol}): {parse_err}"
            ))
        })
    }
}

/// Client errors that will not succeed on retry.
///
/// 429 (rate limited) and 418 (IP auto-banned after ignoring 429s) clear after a back-off.
fn is_rejection(status: StatusCode) -> bool {
    status.is_client_error()
        && status != StatusCode::TOO_MANY_REQUESTS
        && status != StatusCode::IM_A_TEAPOT
}
