use crate::{
    error::DataError,
    source::{PageRequest, TradeSource},
    trade::{AggTrade, Symbol},
};
use async_trait::async_trait;
use chrono::DateTime;
use parking_lot::Mutex;
use std::{collections::VecDeque, sync::Arc};

pub fn trade(id: u64, time_ms: i64, price: f64, quantity: f64, is_buyer_maker: bool) -> AggTrade {
    AggTrade {
        id,
        price,
        quantity,
        time: DateTime::from_timestamp_millis(time_ms).unwrap(),
        is_buyer_maker,
    }
}

/// In-memory [`TradeSource`] mimicking the exchange paging semantics.
#[derive(Debug, Clone, Default)]
pub struct FakeSource {
    trades: Arc<Vec<AggTrade>>,
    requests: Arc<Mutex<Vec<PageRequest>>>,
    failures: Arc<Mutex<VecDeque<DataError>>>,
}

impl FakeSource {
    pub fn new(mut trades: Vec<AggTrade>) -> Self {
        trades.sort_by_key(|trade| trade.id);
        Self {
            trades: Arc::new(trades),
            ..Self::default()
        }
    }

    /// Queue errors returned by the next requests, before any page is served.
    pub fn with_failures(self, failures: impl IntoIterator<Item = DataError>) -> Self {
        self.failures.lock().extend(failures);
        self
    }

    pub fn requests(&self) -> Vec<PageRequest> {
        self.requests.lock().clone()
    }
}

#[async_trait]
impl TradeSource for FakeSource {
    async fn aggregate_trades(
        &self,
        _: &Symbol,
        request: PageRequest,
        limit: usize,
    ) -> Result<Vec<AggTrade>, DataError> {
        self.requests.lock().push(request);

        if let Some(error) = self.failures.lock().pop_front() {
            return Err(error);
        }

        let page = self
            .trades
            .iter()
            .filter(|trade| match request {
                PageRequest::Window { start_ms, end_ms } => {
                    (start_ms..=end_ms).contains(&trade.time_ms())
                }
                PageRequest::FromId(from_id) => trade.id >= from_id,
            })
            .take(limit)
            .cloned()
            .collect();

        Ok(page)
    }
}
