use crate::{
    classify::VolumeAccumulator,
    error::DataError,
    fetch::{TradeWindow, TradeWindowFetcher},
    query::SentimentQuery,
    score::SentimentResult,
    source::TradeSource,
    trade::Symbol,
};
use async_trait::async_trait;
use chrono::Utc;
use tracing::info;

/// Computes the [`SentimentResult`] of a [`SentimentQuery`].
#[async_trait]
pub trait SentimentAnalyzer: Send + Sync {
    async fn analyze(&self, query: &SentimentQuery) -> Result<SentimentResult, DataError>;
}

/// Fetch, classify and score pipeline over a [`TradeSource`].
#[derive(Debug, Clone)]
pub struct SentimentPipeline<Source> {
    fetcher: TradeWindowFetcher<Source>,
}

impl<Source> SentimentPipeline<Source>
where
    Source: TradeSource,
{
    pub fn new(fetcher: TradeWindowFetcher<Source>) -> Self {
        Self { fetcher }
    }

    pub fn fetcher(&self) -> &TradeWindowFetcher<Source> {
        &self.fetcher
    }

    /// Score every trade of `symbol` inside the provided window.
    pub async fn analyze_window(
        &self,
        symbol: &Symbol,
        window: TradeWindow,
        whale_threshold: f64,
    ) -> Result<SentimentResult, DataError> {
        let mut volumes = VolumeAccumulator::default();

        let summary = self
            .fetcher
            .fetch_with(symbol, window, |trade| {
                volumes.add(trade, whale_threshold);
            })
            .await?;

        let result = volumes.score();
        info!(
            %symbol,
            start = %window.start,
            end = %window.end,
            pages = summary.pages,
            trades = volumes.trades,
            whale_trades = volumes.whale_trades,
            sentiment_index = result.sentiment_index,
            whale_sentiment_index = result.whale_sentiment_index,
            "computed sentiment"
        );

        Ok(result)
    }
}

#[async_trait]
impl<Source> SentimentAnalyzer for SentimentPipeline<Source>
where
    Source: TradeSource,
{
    async fn analyze(&self, query: &SentimentQuery) -> Result<SentimentResult, DataError> {
        let window = TradeWindow::lookback(Utc::now(), query.lookback.duration())?;
        self.analyze_window(&query.symbol, window, query.whale_threshold)
            .await
    }
}
