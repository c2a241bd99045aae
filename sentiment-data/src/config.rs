use crate::{
    classify::DEFAULT_WHALE_THRESHOLD,
    error::DataError,
    fetch::{DEFAULT_PAGE_DELAY, DEFAULT_PAGE_SIZE, FetchConfig, RetryPolicy, TradeWindowFetcher},
    pipeline::SentimentPipeline,
    source::binance::{BINANCE_SPOT_BASE_URL, BinanceRestSource},
};
use std::{str::FromStr, time::Duration};

const DEFAULT_HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// Runtime configuration of the sentiment pipeline.
///
/// Every field can be overridden by an environment variable (see [`SentimentConfig::from_env`]).
#[derive(Debug, Clone, PartialEq)]
pub struct SentimentConfig {
    /// Binance REST base url (env: `BINANCE_API_URL`).
    pub base_url: String,
    /// Trades requested per page (env: `PAGE_SIZE`, max 1000).
    pub page_size: usize,
    /// Delay between page requests (env: `PAGE_DELAY_MS`).
    pub page_delay: Duration,
    /// Initial retry back-off (env: `RETRY_BACKOFF_MS`).
    pub retry_backoff: Duration,
    /// Attempts per page before giving up (env: `MAX_FETCH_ATTEMPTS`).
    pub max_fetch_attempts: u32,
    /// Whale notional threshold in quote units (env: `WHALE_THRESHOLD`).
    pub whale_threshold: f64,
    /// Per request HTTP timeout (env: `HTTP_TIMEOUT_SECS`).
    pub http_timeout: Duration,
}

impl Default for SentimentConfig {
    fn default() -> Self {
        let retry = RetryPolicy::default();
        Self {
            base_url: BINANCE_SPOT_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            page_delay: DEFAULT_PAGE_DELAY,
            retry_backoff: retry.initial_backoff,
            max_fetch_attempts: retry.max_attempts,
            whale_threshold: DEFAULT_WHALE_THRESHOLD,
            http_timeout: DEFAULT_HTTP_TIMEOUT,
        }
    }
}

impl SentimentConfig {
    /// Read the configuration from environment variables, falling back to defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration from an arbitrary key/value lookup.
    ///
    /// Missing or unparsable values fall back to their default.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let default = Self::default();
        Self {
            base_url: lookup("BINANCE_API_URL").unwrap_or(default.base_url),
            page_size: parse(&lookup, "PAGE_SIZE")
                .unwrap_or(default.page_size)
                .clamp(1, DEFAULT_PAGE_SIZE),
            page_delay: parse(&lookup, "PAGE_DELAY_MS")
                .map(Duration::from_millis)
                .unwrap_or(default.page_delay),
            retry_backoff: parse(&lookup, "RETRY_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(default.retry_backoff),
            max_fetch_attempts: parse(&lookup, "MAX_FETCH_ATTEMPTS")
                .unwrap_or(default.max_fetch_attempts)
                .max(1),
            whale_threshold: parse::<_, f64>(&lookup, "WHALE_THRESHOLD")
                .filter(|threshold| threshold.is_finite() && *threshold >= 0.0)
                .unwrap_or(default.whale_threshold),
            http_timeout: parse(&lookup, "HTTP_TIMEOUT_SECS")
                .map(Duration::from_secs)
                .unwrap_or(default.http_timeout),
        }
    }

    pub fn fetch_config(&self) -> FetchConfig {
        FetchConfig::default()
            .with_page_size(self.page_size)
            .with_page_delay(self.page_delay)
            .with_retry(RetryPolicy {
                max_attempts: self.max_fetch_attempts,
                initial_backoff: self.retry_backoff,
                ..RetryPolicy::default()
            })
    }

    /// Construct the Binance backed [`SentimentPipeline`] described by this configuration.
    pub fn build_pipeline(&self) -> Result<SentimentPipeline<BinanceRestSource>, DataError> {
        let source = BinanceRestSource::new(&self.base_url, self.http_timeout)?;
        Ok(SentimentPipeline::new(TradeWindowFetcher::new(
            source,
            self.fetch_config(),
        )))
    }
}

fn parse<F, T>(lookup: &F, key: &str) -> Option<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    lookup(key).and_then(|value| value.trim().parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::query::SentimentQuery;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars = vars
            .iter()
            .map(|(key, value)| (key.to_string(), value.to_string()))
            .collect::<HashMap<_, _>>();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_sentiment_config_defaults() {
        let actual = SentimentConfig::from_lookup(lookup(&[]));
        assert_eq!(actual, SentimentConfig::default());
        assert_eq!(actual.base_url, "https://api.binance.com");
        assert_eq!(actual.page_size, 1000);
        assert_eq!(actual.whale_threshold, 100_000.0);
    }

    #[test]
    fn test_sentiment_config_overrides() {
        let actual = SentimentConfig::from_lookup(lookup(&[
            ("BINANCE_API_URL", "https://api.binance.us"),
            ("PAGE_SIZE", "5000"),
            ("PAGE_DELAY_MS", "50"),
            ("RETRY_BACKOFF_MS", "250"),
            ("MAX_FETCH_ATTEMPTS", "3"),
            ("WHALE_THRESHOLD", "250000"),
            ("HTTP_TIMEOUT_SECS", "not a number"),
        ]));

        assert_eq!(actual.base_url, "https://api.binance.us");
        assert_eq!(actual.page_size, 1000);
        assert_eq!(actual.page_delay, Duration::from_millis(50));
        assert_eq!(actual.whale_threshold, 250_000.0);
        assert_eq!(actual.http_timeout, DEFAULT_HTTP_TIMEOUT);

        let fetch = actual.fetch_config();
        assert_eq!(fetch.retry.max_attempts, 3);
        assert_eq!(fetch.retry.initial_backoff, Duration::from_millis(250));
        assert_eq!(fetch.retry.max_backoff, Duration::from_secs(30));
    }

    #[test]
    fn test_whale_threshold_falls_back_when_invalid() {
        struct TestCase {
            input: &'static str,
            expected: f64,
        }

        let tests = vec![
            TestCase {
                // TC0: valid threshold
                input: "50000.5",
                expected: 50_000.5,
            },
            TestCase {
                // TC1: zero counts every trade as whale flow
                input: "0",
                expected: 0.0,
            },
            TestCase {
                // TC2: negative
                input: "-5",
                expected: DEFAULT_WHALE_THRESHOLD,
            },
            TestCase {
                // TC3: NaN
                input: "NaN",
                expected: DEFAULT_WHALE_THRESHOLD,
            },
            TestCase {
                // TC4: infinite
                input: "inf",
                expected: DEFAULT_WHALE_THRESHOLD,
            },
        ];

        for (index, test) in tests.into_iter().enumerate() {
            let config = SentimentConfig::from_lookup(lookup(&[("WHALE_THRESHOLD", test.input)]));
            assert_eq!(config.whale_threshold, test.expected, "TC{} failed", index);
            assert!(
                SentimentQuery::parse("BTCUSDT 1h", config.whale_threshold).is_ok(),
                "TC{} failed",
                index
            );
        }
    }

    #[test]
    fn test_build_pipeline_rejects_invalid_url() {
        let config = SentimentConfig {
            base_url: "::not a url::".to_string(),
            ..SentimentConfig::default()
        };
        assert!(matches!(
            config.build_pipeline(),
            Err(DataError::Config(_))
        ));
    }
}
