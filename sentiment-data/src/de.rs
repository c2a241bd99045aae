//! Deserialisation helpers for exchange REST payloads.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Deserializer, de::Error};
use std::{fmt::Display, str::FromStr};

/// Deserialise a `String` as the desired type.
///
/// Binance encodes prices and quantities as decimal strings, eg/ `"16578.50"`.
pub fn de_str<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: FromStr,
    T::Err: Display,
{
    let data = String::deserialize(deserializer)?;
    data.parse::<T>().map_err(D::Error::custom)
}

/// Deserialise a `u64` milliseconds value as `DateTime<Utc>`.
pub fn de_u64_epoch_ms_as_datetime_utc<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
where
    D: Deserializer<'de>,
{
    let epoch_ms = u64::deserialize(deserializer)?;
    i64::try_from(epoch_ms)
        .ok()
        .and_then(DateTime::from_timestamp_millis)
        .ok_or_else(|| D::Error::custom(format!("epoch milliseconds out of range: {epoch_ms}")))
}
