use crate::{query::SentimentQuery, score::SentimentResult, timeframe::Timeframe, trade::Symbol};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Indices within `[-NEUTRAL_BAND, NEUTRAL_BAND]` are considered balanced.
pub const NEUTRAL_BAND: f64 = 0.05;

/// Directional bias of a sentiment index.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Bias {
    Bullish,
    Bearish,
    Balanced,
}

impl Bias {
    pub fn from_index(index: f64) -> Self {
        if index.abs() <= NEUTRAL_BAND {
            Bias::Balanced
        } else if index > 0.0 {
            Bias::Bullish
        } else {
            Bias::Bearish
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Bias::Bullish => "Bullish",
            Bias::Bearish => "Bearish",
            Bias::Balanced => "Balanced",
        }
    }
}

impl fmt::Display for Bias {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Market phase implied by comparing whale and retail bias.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub enum Phase {
    /// Whales buying into retail selling.
    Accumulation,
    /// Whales selling into retail buying.
    Distribution,
    ContinuationUp,
    ContinuationDown,
    Indecisive,
    Divergence,
}

impl Phase {
    pub fn new(whale: Bias, retail: Bias) -> Self {
        match (whale, retail) {
            (Bias::Bullish, Bias::Bearish) => Phase::Accumulation,
            (Bias::Bearish, Bias::Bullish) => Phase::Distribution,
            (Bias::Bullish, Bias::Bullish) => Phase::ContinuationUp,
            (Bias::Bearish, Bias::Bearish) => Phase::ContinuationDown,
            (Bias::Balanced, Bias::Balanced) => Phase::Indecisive,
            _ => Phase::Divergence,
        }
    }

    fn describe(&self) -> &'static str {
        match self {
            Phase::Accumulation => "whales bullish while retail is bearish: accumulation phase, potential upward move",
            Phase::Distribution => "whales bearish while retail is bullish: distribution phase, potential downward move",
            Phase::ContinuationUp => "whales and retail both bullish: trend continuation upward",
            Phase::ContinuationDown => "whales and retail both bearish: trend continuation downward",
            Phase::Indecisive => "both indices near zero: market is balanced and indecisive",
            Phase::Divergence => "whale and retail sentiment diverge",
        }
    }

    fn insight(&self) -> &'static str {
        match self {
            Phase::Accumulation => "Large traders are absorbing retail selling, which often precedes a move up.",
            Phase::Distribution => "Large traders are selling into retail demand, so rallies may fade.",
            Phase::ContinuationUp => "Buyers dominate across the board, favouring further upside.",
            Phase::ContinuationDown => "Sellers dominate across the board, favouring further downside.",
            Phase::Indecisive => "Neither side is in control, so wait for a clearer signal.",
            Phase::Divergence => "One group is leaning while the other is flat, so watch whether whale flow follows through.",
        }
    }
}

/// Five part text report of a [`SentimentResult`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentReport {
    pub symbol: Symbol,
    pub lookback: Timeframe,
    pub result: SentimentResult,
}

impl SentimentReport {
    pub fn new(query: &SentimentQuery, result: SentimentResult) -> Self {
        Self {
            symbol: query.symbol.clone(),
            lookback: query.lookback.clone(),
            result,
        }
    }

    pub fn retail_bias(&self) -> Bias {
        Bias::from_index(self.result.sentiment_index)
    }

    pub fn whale_bias(&self) -> Bias {
        Bias::from_index(self.result.whale_sentiment_index)
    }

    pub fn phase(&self) -> Phase {
        Phase::new(self.whale_bias(), self.retail_bias())
    }

    /// Overall bias; whale bias takes precedence unless whales are balanced.
    pub fn conclusion(&self) -> Bias {
        match self.whale_bias() {
            Bias::Balanced => self.retail_bias(),
            whale => whale,
        }
    }
}

impl fmt::Display for SentimentReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let result = &self.result;
        writeln!(f, "{} sentiment over the last {}", self.symbol, self.lookback)?;
        writeln!(f)?;
        writeln!(
            f,
            "1. Retail Sentiment: {} (index {:+.3}, buy {:.4} / sell {:.4})",
            self.retail_bias(),
            result.sentiment_index,
            result.buy_volume,
            result.sell_volume
        )?;
        writeln!(
            f,
            "2. Whale Sentiment: {} (index {:+.3}, buy {:.4} / sell {:.4})",
            self.whale_bias(),
            result.whale_sentiment_index,
            result.whale_buy_volume,
            result.whale_sell_volume
        )?;
        writeln!(f, "3. Comparison: {}", self.phase().describe())?;
        writeln!(f, "4. Conclusion: {}", self.conclusion())?;
        write!(f, "5. Insight: {}", self.phase().insight())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::score::score;

    #[test]
    fn test_bias_from_index() {
        struct TestCase {
            input: f64,
            expected: Bias,
        }

        let tests = vec![
            TestCase {
                // TC0: zero is balanced
                input: 0.0,
                expected: Bias::Balanced,
            },
            TestCase {
                // TC1: upper band edge is balanced
                input: 0.05,
                expected: Bias::Balanced,
            },
            TestCase {
                // TC2: lower band edge is balanced
                input: -0.05,
                expected: Bias::Balanced,
            },
            TestCase {
                // TC3: positive beyond band is bullish
                input: 0.2,
                expected: Bias::Bullish,
            },
            TestCase {
                // TC4: negative beyond band is bearish
                input: -0.051,
                expected: Bias::Bearish,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let actual = Bias::from_index(test.input);
            assert_eq!(actual, test.expected, "TC{} failed", index);
        }
    }

    #[test]
    fn test_phase_and_conclusion() {
        struct TestCase {
            result: SentimentResult,
            expected_phase: Phase,
            expected_conclusion: Bias,
        }

        let tests = vec![
            TestCase {
                // TC0: whales bullish, retail bearish
                result: score(40.0, 60.0, 30.0, 5.0),
                expected_phase: Phase::Accumulation,
                expected_conclusion: Bias::Bullish,
            },
            TestCase {
                // TC1: whales bearish, retail bullish
                result: score(60.0, 40.0, 5.0, 30.0),
                expected_phase: Phase::Distribution,
                expected_conclusion: Bias::Bearish,
            },
            TestCase {
                // TC2: both bullish
                result: score(120.0, 80.0, 50.0, 10.0),
                expected_phase: Phase::ContinuationUp,
                expected_conclusion: Bias::Bullish,
            },
            TestCase {
                // TC3: both bearish
                result: score(80.0, 120.0, 10.0, 50.0),
                expected_phase: Phase::ContinuationDown,
                expected_conclusion: Bias::Bearish,
            },
            TestCase {
                // TC4: both balanced, incl. no whale volume
                result: score(100.0, 99.0, 0.0, 0.0),
                expected_phase: Phase::Indecisive,
                expected_conclusion: Bias::Balanced,
            },
            TestCase {
                // TC5: whales balanced, retail bearish falls back to retail bias
                result: score(40.0, 60.0, 0.0, 0.0),
                expected_phase: Phase::Divergence,
                expected_conclusion: Bias::Bearish,
            },
        ];

        let query = SentimentQuery::parse("BTCUSDT 1d", 100_000.0).unwrap();

        for (index, test) in tests.into_iter().enumerate() {
            let report = SentimentReport::new(&query, test.result);
            assert_eq!(report.phase(), test.expected_phase, "TC{} failed", index);
            assert_eq!(
                report.conclusion(),
                test.expected_conclusion,
                "TC{} failed",
                index
            );
        }
    }

    #[test]
    fn test_sentiment_report_display() {
        let query = SentimentQuery::parse("BTCUSDT 1 day", 100_000.0).unwrap();
        let report = SentimentReport::new(&query, score(120.0, 80.0, 50.0, 10.0));

        let actual = report.to_string();

        assert!(actual.starts_with("BTCUSDT sentiment over the last 1d"));
        assert!(actual.contains("1. Retail Sentiment: Bullish (index +0.200, buy 120.0000 / sell 80.0000)"));
        assert!(actual.contains("2. Whale Sentiment: Bullish (index +0.667"));
        assert!(actual.contains("3. Comparison: whales and retail both bullish"));
        assert!(actual.contains("4. Conclusion: Bullish"));
        assert!(actual.contains("5. Insight: "));
    }
}
