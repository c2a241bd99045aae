//! Paginated retrieval of every aggregate trade inside a time window.
//!
//! The first page of a window is requested by explicit time bounds. Every subsequent page is
//! requested with an id cursor (`fromId = last id + 1`) and no time bounds, which is the only way
//! to page the exchange without gaps or re-fetching once the first page is consumed.

use crate::{
    error::DataError,
    source::{PageRequest, TradeSource},
    trade::{AggTrade, Symbol},
};
use chrono::{DateTime, Utc};
use futures::{Stream, TryStreamExt, stream};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Reference page size of the Binance aggregate trades endpoint (also its maximum).
pub const DEFAULT_PAGE_SIZE: usize = 1000;

/// Courtesy delay between successful page requests.
pub const DEFAULT_PAGE_DELAY: Duration = Duration::from_millis(200);

/// Widest inclusive span accepted for a time bounded page request.
///
/// Binance rejects `startTime`/`endTime` pairs that are an hour or more apart.
pub const MAX_BOUNDED_SPAN_MS: i64 = 60 * 60 * 1000 - 1;

/// Bounded exponential back-off applied to transient page request failures.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Total attempts per page, including the first.
    pub max_attempts: u32,
    pub initial_backoff: Duration,
    pub max_backoff: Duration,
    pub multiplier: u32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            initial_backoff: Duration::from_secs(1),
            max_backoff: Duration::from_secs(30),
            multiplier: 2,
        }
    }
}

impl RetryPolicy {
    /// Back-off to wait after the provided failed attempt (1-based).
    pub fn backoff(&self, attempt: u32) -> Duration {
        let factor = self.multiplier.saturating_pow(attempt.saturating_sub(1));
        self.initial_backoff
            .saturating_mul(factor)
            .min(self.max_backoff)
    }
}

/// [`TradeWindowFetcher`] configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchConfig {
    pub page_size: usize,
    pub page_delay: Duration,
    pub retry: RetryPolicy,
}

impl Default for FetchConfig {
    fn default() -> Self {
        Self {
            page_size: DEFAULT_PAGE_SIZE,
            page_delay: DEFAULT_PAGE_DELAY,
            retry: RetryPolicy::default(),
        }
    }
}

impl FetchConfig {
    pub fn with_page_size(mut self, page_size: usize) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    pub fn with_page_delay(mut self, delay: Duration) -> Self {
        self.page_delay = delay;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }
}

/// Half-open time window `[start, end)`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash)]
pub struct TradeWindow {
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
}

impl TradeWindow {
    pub fn new(start: DateTime<Utc>, end: DateTime<Utc>) -> Result<Self, DataError> {
        if start.timestamp_millis() >= end.timestamp_millis() {
            return Err(DataError::InvalidWindow { start, end });
        }
        Ok(Self { start, end })
    }

    /// Window covering the `lookback` period that ends at `end`.
    pub fn lookback(end: DateTime<Utc>, lookback: Duration) -> Result<Self, DataError> {
        let lookback = chrono::Duration::from_std(lookback)
            .map_err(|error| DataError::InvalidInterval(error.to_string()))?;
        let start = end
            .checked_sub_signed(lookback)
            .ok_or_else(|| DataError::InvalidInterval(format!("lookback {lookback} too large")))?;
        Self::new(start, end)
    }

    pub fn start_ms(&self) -> i64 {
        self.start.timestamp_millis()
    }

    /// Exclusive end of the window in epoch milliseconds.
    pub fn end_ms(&self) -> i64 {
        self.end.timestamp_millis()
    }

    /// Last millisecond that still belongs to the window.
    fn last_ms(&self) -> i64 {
        self.end_ms() - 1
    }

    pub fn contains(&self, trade: &AggTrade) -> bool {
        (self.start_ms()..self.end_ms()).contains(&trade.time_ms())
    }
}

/// Outcome of a completed window fetch.
#[derive(Debug, Copy, Clone, Default, PartialEq, Eq)]
pub struct FetchSummary {
    /// Page requests that returned successfully, including empty pages.
    pub pages: usize,
    /// Trades inside the window handed to the consumer.
    pub trades: usize,
}

/// Position of the pagination cursor.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Cursor {
    /// Time bounded request starting at `start_ms`.
    Bounded { start_ms: i64 },
    /// Id cursor request starting at (and including) the id.
    FromId(u64),
    Done,
}

#[derive(Debug)]
struct PageState {
    cursor: Cursor,
    summary: FetchSummary,
}

impl PageState {
    fn new(window: TradeWindow) -> Self {
        Self {
            cursor: Cursor::Bounded {
                start_ms: window.start_ms(),
            },
            summary: FetchSummary::default(),
        }
    }
}

/// Determine the cursor that follows a fetched (unfiltered) page.
fn next_cursor(
    request: PageRequest,
    page: &[AggTrade],
    window: TradeWindow,
    page_size: usize,
) -> Cursor {
    let last = page.last();

    if last.is_some_and(|trade| trade.time_ms() >= window.end_ms()) {
        return Cursor::Done;
    }

    match (request, last) {
        // Empty bounded span: slide to the next span, unless the window end was covered
        (PageRequest::Window { end_ms, .. }, None) if end_ms < window.last_ms() => {
            Cursor::Bounded {
                start_ms: end_ms + 1,
            }
        }
        (PageRequest::Window { .. }, None) => Cursor::Done,

        // Short bounded page covering the window end holds every remaining trade
        (PageRequest::Window { end_ms, .. }, Some(_))
            if page.len() < page_size && end_ms >= window.last_ms() =>
        {
            Cursor::Done
        }

        // Short or empty cursor page means no trades exist beyond it yet
        (PageRequest::FromId(_), None) => Cursor::Done,
        (PageRequest::FromId(_), Some(_)) if page.len() < page_size => Cursor::Done,

        (_, Some(last)) => Cursor::FromId(last.id + 1),
    }
}

/// Retrieves every aggregate trade of a symbol inside a [`TradeWindow`], page by page.
#[derive(Debug, Clone)]
pub struct TradeWindowFetcher<Source> {
    source: Source,
    config: FetchConfig,
}

impl<Source> TradeWindowFetcher<Source>
where
    Source: TradeSource,
{
    pub fn new(source: Source, config: FetchConfig) -> Self {
        Self { source, config }
    }

    pub fn config(&self) -> &FetchConfig {
        &self.config
    }

    pub fn source(&self) -> &Source {
        &self.source
    }

    /// Stream the pages of trades inside the window.
    ///
    /// Each yielded page only contains trades inside `[window.start, window.end)`. Trades past
    /// the window end that arrive on the final cursor page are dropped.
    pub fn pages<'a>(
        &'a self,
        symbol: &'a Symbol,
        window: TradeWindow,
    ) -> impl Stream<Item = Result<Vec<AggTrade>, DataError>> + Send + 'a {
        stream::try_unfold(PageState::new(window), move |mut state| async move {
            let page = self.next_page(symbol, window, &mut state).await?;
            Ok(page.map(|page| (page, state)))
        })
    }

    /// Fetch the window, handing every trade to `on_trade` as its page arrives.
    pub async fn fetch_with<F>(
        &self,
        symbol: &Symbol,
        window: TradeWindow,
        mut on_trade: F,
    ) -> Result<FetchSummary, DataError>
    where
        F: FnMut(&AggTrade) + Send,
    {
        let mut state = PageState::new(window);
        while let Some(page) = self.next_page(symbol, window, &mut state).await? {
            page.iter().for_each(&mut on_trade);
        }
        Ok(state.summary)
    }

    /// Fetch and materialise every trade inside the window.
    pub async fn fetch(
        &self,
        symbol: &Symbol,
        window: TradeWindow,
    ) -> Result<Vec<AggTrade>, DataError> {
        self.pages(symbol, window).try_concat().await
    }

    /// Advance the cursor until a non-empty page of in-window trades is found.
    ///
    /// Returns `None` once the window is exhausted.
    async fn next_page(
        &self,
        symbol: &Symbol,
        window: TradeWindow,
        state: &mut PageState,
    ) -> Result<Option<Vec<AggTrade>>, DataError> {
        loop {
            let request = match state.cursor {
                Cursor::Done => {
                    info!(
                        %symbol,
                        pages = state.summary.pages,
                        trades = state.summary.trades,
                        "finished fetching aggregate trades"
                    );
                    return Ok(None);
                }
                Cursor::Bounded { start_ms } => PageRequest::Window {
                    start_ms,
                    end_ms: start_ms
                        .saturating_add(MAX_BOUNDED_SPAN_MS)
                        .min(window.last_ms()),
                },
                Cursor::FromId(from_id) => PageRequest::FromId(from_id),
            };

            if state.summary.pages > 0 {
                tokio::time::sleep(self.config.page_delay).await;
            }

            let mut page = self.fetch_page(symbol, request).await?;
            state.summary.pages += 1;
            state.cursor = next_cursor(request, &page, window, self.config.page_size);

            page.retain(|trade| window.contains(trade));
            state.summary.trades += page.len();

            debug!(
                %symbol,
                ?request,
                page_len = page.len(),
                fetched = state.summary.trades,
                "fetched aggregate trade page"
            );

            if !page.is_empty() {
                return Ok(Some(page));
            }
        }
    }

    /// Request one page, retrying transient failures with the configured back-off.
    async fn fetch_page(
        &self,
        symbol: &Symbol,
        request: PageRequest,
    ) -> Result<Vec<AggTrade>, DataError> {
        let retry = self.config.retry;
        let max_attempts = retry.max_attempts.max(1);
        let mut attempt = 0;

        loop {
            attempt += 1;

            match self
                .source
                .aggregate_trades(symbol, request, self.config.page_size)
                .await
            {
                Ok(page) => return Ok(page),
                Err(error) if error.is_transient() && attempt < max_attempts => {
                    let backoff = retry.backoff(attempt);
                    warn!(
                        %symbol,
                        ?request,
                        attempt,
                        ?backoff,
                        %error,
                        "aggregate trade page request failed, retrying"
                    );
                    tokio::time::sleep(backoff).await;
                }
                Err(error) if error.is_transient() => {
                    return Err(DataError::TransientFetch {
                        attempts: attempt,
                        reason: error.to_string(),
                    });
                }
                Err(error) => return Err(error),
            }
        }
    }
}
