/// Sentiment Data - trade retrieval & sentiment scoring
///
/// Estimates the market sentiment of a cryptocurrency pair from its recent aggregate trades:
/// - [`fetch`]: paginated retrieval of every trade inside a time window
/// - [`classify`]: whale/retail and buy/sell volume accumulation
/// - [`score`]: normalised sentiment indices
/// - [`pipeline`]: the composed fetch, classify & score pipeline
///
/// The library also includes:
/// - Timeframe & free-form query parsing
/// - A plain text sentiment report
/// - Environment driven configuration
pub mod classify;
pub mod config;
pub mod de;
pub mod error;
pub mod fetch;
pub mod pipeline;
pub mod query;
pub mod report;
pub mod score;
pub mod source;
pub mod timeframe;
pub mod trade;

#[cfg(test)]
pub(crate) mod test_utils;

// Re-export commonly used types for convenience
pub use classify::{Classification, DEFAULT_WHALE_THRESHOLD, VolumeAccumulator, classify};
pub use config::SentimentConfig;
pub use error::DataError;
pub use fetch::{FetchConfig, FetchSummary, RetryPolicy, TradeWindow, TradeWindowFetcher};
pub use pipeline::{SentimentAnalyzer, SentimentPipeline};
pub use query::SentimentQuery;
pub use report::{Bias, Phase, SentimentReport};
pub use score::{SentimentResult, score, sentiment_index};
pub use source::{PageRequest, TradeSource, binance::BinanceRestSource};
pub use timeframe::{Timeframe, format_time_until};
pub use trade::{AggTrade, Side, Symbol};
