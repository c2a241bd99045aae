use crate::{
    score::{SentimentResult, score},
    trade::{AggTrade, Side},
};
use serde::{Deserialize, Serialize};

/// Default notional value (quote units) at or above which a trade counts as whale flow.
pub const DEFAULT_WHALE_THRESHOLD: f64 = 100_000.0;

/// Bucket assignment of a single trade.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Classification {
    pub side: Side,
    pub whale: bool,
}

/// Classify a trade by aggressor side and notional value.
///
/// A trade is whale flow when `quantity × price >= whale_threshold`.
pub fn classify(trade: &AggTrade, whale_threshold: f64) -> Classification {
    Classification {
        side: trade.taker_side(),
        whale: trade.notional() >= whale_threshold,
    }
}

/// Running buy/sell volume totals in base asset units.
///
/// The `retail_*` buckets hold the total volume of each side; the `whale_*` buckets are the
/// subset of that volume contributed by whale trades, so `whale_buy <= retail_buy` and
/// `whale_sell <= retail_sell` always hold.
#[derive(Debug, Copy, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct VolumeAccumulator {
    pub retail_buy: f64,
    pub retail_sell: f64,
    pub whale_buy: f64,
    pub whale_sell: f64,
    pub trades: u64,
    pub whale_trades: u64,
}

impl VolumeAccumulator {
    /// Classify the trade and add its quantity to the matching buckets.
    pub fn add(&mut self, trade: &AggTrade, whale_threshold: f64) -> Classification {
        let classification = classify(trade, whale_threshold);

        let (side_total, whale_total) = match classification.side {
            Side::Buy => (&mut self.retail_buy, &mut self.whale_buy),
            Side::Sell => (&mut self.retail_sell, &mut self.whale_sell),
        };

        *side_total += trade.quantity;
        if classification.whale {
            *whale_total += trade.quantity;
            self.whale_trades += 1;
        }
        self.trades += 1;

        classification
    }

    pub fn score(&self) -> SentimentResult {
        score(
            self.retail_buy,
            self.retail_sell,
            self.whale_buy,
            self.whale_sell,
        )
    }
}
