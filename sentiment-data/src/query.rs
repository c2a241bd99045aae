use crate::{error::DataError, timeframe::Timeframe, trade::Symbol};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Request to analyse the sentiment of a symbol over the trailing `lookback` period.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct SentimentQuery {
    pub symbol: Symbol,
    pub lookback: Timeframe,
    /// Notional value (quote units) at or above which a trade counts as whale flow.
    pub whale_threshold: f64,
}

impl SentimentQuery {
    pub fn new(symbol: Symbol, lookback: Timeframe, whale_threshold: f64) -> Self {
        Self {
            symbol,
            lookback,
            whale_threshold,
        }
    }

    /// Parse a free-form query, eg/ "BTCUSDT 1 day", "LTCUSDT 10 hours" or "ETHUSDT 4h".
    ///
    /// The first word is the symbol; the remaining words are the lookback, defaulting to one
    /// day when omitted.
    pub fn parse(text: &str, whale_threshold: f64) -> Result<Self, DataError> {
        let mut words = text.split_whitespace();

        let symbol = words
            .next()
            .map(|symbol| symbol.trim_end_matches(','))
            .ok_or_else(|| DataError::InvalidQuery("empty query, expected eg/ BTCUSDT 1 day".to_string()))?;
        let symbol = parse_symbol(symbol)?;

        let mut lookback = words.peekable();
        let lookback = if lookback.peek().is_some() {
            Timeframe::parse_words(lookback)?
        } else {
            Timeframe::one_day()
        };

        if !whale_threshold.is_finite() || whale_threshold < 0.0 {
            return Err(DataError::InvalidQuery(format!(
                "whale threshold must be a non-negative number, got {whale_threshold}"
            )));
        }

        Ok(Self::new(symbol, lookback, whale_threshold))
    }
}

impl fmt::Display for SentimentQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.symbol, self.lookback)
    }
}

/// Validate and normalise a trading pair symbol (non-empty ASCII alphanumeric).
pub fn parse_symbol(symbol: &str) -> Result<Symbol, DataError> {
    let symbol = symbol.trim();
    if symbol.is_empty() || !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
        return Err(DataError::InvalidQuery(format!(
            "invalid symbol '{symbol}', expected eg/ BTCUSDT"
        )));
    }
    Ok(Symbol::new(symbol))
}
