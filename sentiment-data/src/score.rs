use serde::{Deserialize, Serialize};

/// Normalised retail and whale sentiment over a trade window.
///
/// Volumes are in base asset units. Indices lie in `[-1, 1]`, or are exactly `0.0` when the
/// corresponding volume is zero.
#[derive(Debug, Copy, Clone, Default, PartialEq, Deserialize, Serialize)]
pub struct SentimentResult {
    pub buy_volume: f64,
    pub sell_volume: f64,
    pub sentiment_index: f64,
    pub whale_buy_volume: f64,
    pub whale_sell_volume: f64,
    pub whale_sentiment_index: f64,
}

/// `(buy - sell) / (buy + sell)`, or `0.0` when there is no volume.
pub fn sentiment_index(buy: f64, sell: f64) -> f64 {
    let total = buy + sell;
    if total > 0.0 { (buy - sell) / total } else { 0.0 }
}

/// Reduce the four volume buckets into a [`SentimentResult`].
pub fn score(buy: f64, sell: f64, whale_buy: f64, whale_sell: f64) -> SentimentResult {
    SentimentResult {
        buy_volume: buy,
        sell_volume: sell,
        sentiment_index: sentiment_index(buy, sell),
        whale_buy_volume: whale_buy,
        whale_sell_volume: whale_sell,
        whale_sentiment_index: sentiment_index(whale_buy, whale_sell),
    }
}
