use crate::error::DataError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use smol_str::{SmolStr, format_smolstr};
use std::{fmt, str::FromStr, time::Duration};

const MINUTE: u64 = 60;
const HOUR: u64 = 60 * MINUTE;
const DAY: u64 = 24 * HOUR;
const WEEK: u64 = 7 * DAY;
const MONTH: u64 = 30 * DAY;
const YEAR: u64 = 365 * DAY;

/// Filler words tolerated between the quantities of a free-form timeframe, eg/ "last 2 days".
const FILLER_WORDS: [&str; 4] = ["last", "past", "for", "the"];

/// Length of time expressed as a label (eg/ "15m", "4h", "1d", "1mo").
///
/// Used both as the lookback period of an analysis and as the interval of a recurring job.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Deserialize, Serialize)]
pub struct Timeframe {
    label: SmolStr,
    seconds: u64,
}

impl Timeframe {
    /// Parse a compact `<digits><unit>` label, with unit one of `m`, `h`, `d`, `w`, `mo`, `y`.
    ///
    /// Parsing is case-insensitive and ignores surrounding whitespace. Longer unit words are
    /// also accepted (eg/ "10hours").
    pub fn parse(label: &str) -> Result<Self, DataError> {
        let label = label.trim().to_lowercase();
        let invalid = || DataError::InvalidInterval(format!("'{label}', expected eg/ 15m, 4h, 1d"));

        let unit_start = label
            .find(|c: char| !c.is_ascii_digit())
            .ok_or_else(invalid)?;
        let (value, unit) = label.split_at(unit_start);
        let value = value.parse::<u64>().map_err(|_| invalid())?;

        part(value, unit)
            .and_then(|part| Self::from_parts([part]))
            .ok_or_else(invalid)
    }

    /// Parse a free-form timeframe from whitespace separated words.
    ///
    /// Accepts compact labels ("4h") and `<n> <unit word>` pairs ("1 day", "2 days 6 hours",
    /// "last 30 minutes"). Multiple parts are summed.
    pub fn parse_words<'a>(words: impl IntoIterator<Item = &'a str>) -> Result<Self, DataError> {
        let words = words
            .into_iter()
            .map(|word| word.trim_matches(|c: char| c == ',' || c == '.').to_lowercase())
            .filter(|word| !word.is_empty() && !FILLER_WORDS.contains(&word.as_str()))
            .collect::<Vec<_>>();
        let text = words.join(" ");
        let invalid = || DataError::InvalidInterval(format!("'{text}', expected eg/ 4h or 1 day"));

        let mut parts = Vec::with_capacity(words.len());
        let mut words = words.iter();
        while let Some(word) = words.next() {
            match word.parse::<u64>() {
                // Quantity followed by a unit word, eg/ "10 hours"
                Ok(value) => {
                    let unit = words.next().ok_or_else(invalid)?;
                    parts.push(part(value, unit).ok_or_else(invalid)?);
                }
                // Compact label, eg/ "4h"
                Err(_) => {
                    let timeframe = Self::parse(word).map_err(|_| invalid())?;
                    parts.push((timeframe.label, timeframe.seconds));
                }
            }
        }

        Self::from_parts(parts).ok_or_else(invalid)
    }

    /// Sum labelled parts, `None` when empty, zero length or overflowing.
    fn from_parts(parts: impl IntoIterator<Item = (SmolStr, u64)>) -> Option<Self> {
        let mut label = String::new();
        let mut seconds = 0u64;
        for (part_label, part_seconds) in parts {
            label.push_str(&part_label);
            seconds = seconds.checked_add(part_seconds)?;
        }

        (seconds > 0).then(|| Self {
            label: SmolStr::new(label),
            seconds,
        })
    }

    /// One day, the default lookback of an analysis.
    pub fn one_day() -> Self {
        Self {
            label: SmolStr::new_static("1d"),
            seconds: DAY,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    pub fn seconds(&self) -> u64 {
        self.seconds
    }

    pub fn duration(&self) -> Duration {
        Duration::from_secs(self.seconds)
    }
}

impl Default for Timeframe {
    fn default() -> Self {
        Self::one_day()
    }
}

impl fmt::Display for Timeframe {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label)
    }
}

impl FromStr for Timeframe {
    type Err = DataError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse_words(s.split_whitespace())
    }
}

/// Labelled length of `value` units, eg/ `(10, "hours")` => `("10h", 36000)`.
fn part(value: u64, unit: &str) -> Option<(SmolStr, u64)> {
    let (unit, unit_seconds) = match unit {
        "m" | "min" | "mins" | "minute" | "minutes" => ("m", MINUTE),
        "h" | "hr" | "hrs" | "hour" | "hours" => ("h", HOUR),
        "d" | "day" | "days" => ("d", DAY),
        "w" | "wk" | "week" | "weeks" => ("w", WEEK),
        "mo" | "month" | "months" => ("mo", MONTH),
        "y" | "yr" | "year" | "years" => ("y", YEAR),
        _ => return None,
    };
    let seconds = value.checked_mul(unit_seconds)?;
    Some((format_smolstr!("{value}{unit}"), seconds))
}

/// Human readable time remaining until `target`, eg/ "42 seconds", "2h 30m", "1d 4h".
pub fn format_time_until(target: DateTime<Utc>, now: DateTime<Utc>) -> SmolStr {
    if target <= now {
        return SmolStr::new_static("Due now");
    }

    let total = (target - now).num_seconds().max(0) as u64;
    let plural = |n: u64| if n == 1 { "" } else { "s" };

    if total < MINUTE {
        format_smolstr!("{total} seconds")
    } else if total < HOUR {
        let minutes = total / MINUTE;
        format_smolstr!("{minutes} minute{}", plural(minutes))
    } else if total < DAY {
        let hours = total / HOUR;
        match (total % HOUR) / MINUTE {
            0 => format_smolstr!("{hours} hour{}", plural(hours)),
            minutes => format_smolstr!("{hours}h {minutes}m"),
        }
    } else {
        let days = total / DAY;
        match (total % DAY) / HOUR {
            0 => format_smolstr!("{days} day{}", plural(days)),
            hours => format_smolstr!("{days}d {hours}h"),
        }
    }
}
