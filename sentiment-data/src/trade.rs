/// Aggregate trade records and the types used to describe them.
///
/// These types match the JSON format of the Binance `GET /api/v3/aggTrades` endpoint.
use crate::de::{de_str, de_u64_epoch_ms_as_datetime_utc};
use chrono::{DateTime, Utc};
use derive_more::{Display, From};
use serde::{Deserialize, Serialize};
use smol_str::SmolStr;

/// Exchange trading pair symbol (eg/ "BTCUSDT").
#[derive(
    Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Deserialize, Serialize, Display, From,
)]
pub struct Symbol(SmolStr);

impl Symbol {
    /// Construct a new [`Symbol`], trimmed and upper-cased.
    pub fn new(symbol: impl AsRef<str>) -> Self {
        Self(SmolStr::new(symbol.as_ref().trim().to_uppercase()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for Symbol {
    fn from(symbol: &str) -> Self {
        Self::new(symbol)
    }
}

/// Aggressor side of a trade (Buy or Sell flow).
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Side {
    Buy,
    Sell,
}

impl Side {
    /// Convert to display string
    pub fn as_str(&self) -> &'static str {
        match self {
            Side::Buy => "Buy",
            Side::Sell => "Sell",
        }
    }

    pub fn is_buy(&self) -> bool {
        matches!(self, Side::Buy)
    }

    pub fn is_sell(&self) -> bool {
        matches!(self, Side::Sell)
    }
}

impl std::fmt::Display for Side {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Binance aggregate trade.
///
/// ### Raw Payload Examples
/// See docs: <https://developers.binance.com/docs/binance-spot-api-docs/rest-api/market-data-endpoints#compressedaggregate-trades-list>
/// ```json
/// {
///     "a": 26129,
///     "p": "0.01633102",
///     "q": "4.70443515",
///     "f": 27781,
///     "l": 27781,
///     "T": 1498793709153,
///     "m": true,
///     "M": true
/// }
/// ```
#[derive(Clone, PartialEq, PartialOrd, Debug, Deserialize)]
pub struct AggTrade {
    /// Aggregate trade id, monotonically increasing per symbol.
    #[serde(alias = "a")]
    pub id: u64,

    #[serde(alias = "p", deserialize_with = "de_str")]
    pub price: f64,

    /// Quantity in base asset units.
    #[serde(alias = "q", deserialize_with = "de_str")]
    pub quantity: f64,

    #[serde(alias = "T", deserialize_with = "de_u64_epoch_ms_as_datetime_utc")]
    pub time: DateTime<Utc>,

    #[serde(alias = "m")]
    pub is_buyer_maker: bool,
}

impl AggTrade {
    /// Quote denominated value of the trade (quantity × price).
    pub fn notional(&self) -> f64 {
        self.quantity * self.price
    }

    /// Aggressor flow of the trade.
    ///
    /// A buyer-maker trade counts as sell-side flow, anything else as buy-side flow.
    pub fn taker_side(&self) -> Side {
        if self.is_buyer_maker {
            Side::Sell
        } else {
            Side::Buy
        }
    }

    /// Trade time as epoch milliseconds.
    pub fn time_ms(&self) -> i64 {
        self.time.timestamp_millis()
    }
}
