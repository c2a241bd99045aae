use crate::{
    error::DataError,
    trade::{AggTrade, Symbol},
};
use async_trait::async_trait;

/// Binance REST [`TradeSource`] implementation.
pub mod binance;

/// Single page request against an aggregate trade source.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub enum PageRequest {
    /// Trades with `start_ms <= time <= end_ms` (both bounds inclusive, epoch milliseconds).
    Window { start_ms: i64, end_ms: i64 },
    /// Trades with an aggregate trade id greater than or equal to the cursor, no time bounds.
    FromId(u64),
}

/// Source of aggregate trades, eg/ an exchange REST API.
///
/// Implementations return at most `limit` trades per page, in ascending id order.
#[async_trait]
pub trait TradeSource: Send + Sync {
    async fn aggregate_trades(
        &self,
        symbol: &Symbol,
        request: PageRequest,
        limit: usize,
    ) -> Result<Vec<AggTrade>, DataError>;
}
