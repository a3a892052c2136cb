//! General constant enums used by the chart engine.

use chrono::{DateTime, Datelike, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Direction of a position or pending order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    #[serde(alias = "buy")]
    Long,
    #[serde(alias = "sell")]
    Short,
}

impl Direction {
    /// Order ticket label.
    pub fn label(&self) -> &'static str {
        match self {
            Direction::Long => "BUY",
            Direction::Short => "SELL",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// Interval (timeframe) of bar data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Interval {
    #[serde(rename = "1m")]
    Minute,
    #[serde(rename = "5m")]
    Minute5,
    #[serde(rename = "15m")]
    Minute15,
    #[serde(rename = "30m")]
    Minute30,
    #[serde(rename = "1h")]
    Hour,
    #[serde(rename = "4h")]
    Hour4,
    #[serde(rename = "1D")]
    Daily,
    #[serde(rename = "1W")]
    Weekly,
}

impl Interval {
    /// Get interval value string
    pub fn value(&self) -> &'static str {
        match self {
            Interval::Minute => "1m",
            Interval::Minute5 => "5m",
            Interval::Minute15 => "15m",
            Interval::Minute30 => "30m",
            Interval::Hour => "1h",
            Interval::Hour4 => "4h",
            Interval::Daily => "1D",
            Interval::Weekly => "1W",
        }
    }

    /// Bucket width in seconds.
    pub fn seconds(&self) -> i64 {
        match self {
            Interval::Minute => 60,
            Interval::Minute5 => 300,
            Interval::Minute15 => 900,
            Interval::Minute30 => 1800,
            Interval::Hour => 3600,
            Interval::Hour4 => 14400,
            Interval::Daily => 86400,
            Interval::Weekly => 604800,
        }
    }

    /// Start (unix seconds) of the bucket containing `timestamp`.
    ///
    /// Intraday intervals are plain `floor(ts / width) * width`. Daily and
    /// weekly buckets follow the UTC calendar: midnight, and Monday midnight.
    pub fn bucket_start(&self, timestamp: i64) -> i64 {
        match self {
            Interval::Weekly => {
                let Some(dt) = Utc.timestamp_opt(timestamp, 0).single() else {
                    return timestamp.div_euclid(86400) * 86400;
                };
                let days_from_monday = dt.weekday().num_days_from_monday() as i64;
                let day_start = timestamp.div_euclid(86400) * 86400;
                day_start - days_from_monday * 86400
            }
            _ => {
                let width = self.seconds();
                timestamp.div_euclid(width) * width
            }
        }
    }

    /// Start of the bucket containing `dt`.
    pub fn bucket_start_datetime(&self, dt: &DateTime<Utc>) -> i64 {
        self.bucket_start(dt.timestamp())
    }

    /// Parse the short label used by configuration and history sources.
    pub fn from_value(value: &str) -> Option<Interval> {
        Interval::all().into_iter().find(|i| i.value() == value)
    }

    /// Get all intervals for UI selection
    pub fn all() -> Vec<Interval> {
        vec![
            Interval::Minute,
            Interval::Minute5,
            Interval::Minute15,
            Interval::Minute30,
            Interval::Hour,
            Interval::Hour4,
            Interval::Daily,
            Interval::Weekly,
        ]
    }
}

impl fmt::Display for Interval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.value())
    }
}

/// Which price of a bar an indicator or rule reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum PriceSource {
    Open,
    High,
    Low,
    #[default]
    Close,
    Hl2,
    Hlc3,
    Ohlc4,
}
