//! Basic data structures flowing through the chart engine.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use ta::{Close, High, Low, Open, Volume};

use super::constant::{Direction, Interval, PriceSource};

/// A single bid/ask/mid update for an instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TickData {
    pub symbol: String,
    pub datetime: DateTime<Utc>,
    pub bid: f64,
    pub ask: f64,
    pub mid: f64,
}

impl TickData {
    /// Create a tick from bid and ask; mid is their average.
    pub fn new(symbol: impl Into<String>, datetime: DateTime<Utc>, bid: f64, ask: f64) -> Self {
        Self {
            symbol: symbol.into(),
            datetime,
            bid,
            ask,
            mid: (bid + ask) / 2.0,
        }
    }

    pub fn spread(&self) -> f64 {
        self.ask - self.bid
    }

    /// Unix timestamp in seconds
    pub fn timestamp(&self) -> i64 {
        self.datetime.timestamp()
    }
}

/// Candlestick bar data of a certain trading period.
///
/// `time` is the bucket start in unix seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BarData {
    pub symbol: String,
    pub interval: Option<Interval>,
    pub time: i64,
    pub open_price: f64,
    pub high_price: f64,
    pub low_price: f64,
    pub close_price: f64,
    #[serde(default)]
    pub volume: f64,
}

impl BarData {
    /// Create a new BarData
    pub fn new(symbol: impl Into<String>, time: i64, open: f64, high: f64, low: f64, close: f64) -> Self {
        Self {
            symbol: symbol.into(),
            interval: None,
            time,
            open_price: open,
            high_price: high,
            low_price: low,
            close_price: close,
            volume: 0.0,
        }
    }

    /// Open a new bar from a single price
    pub fn from_price(symbol: impl Into<String>, interval: Interval, time: i64, price: f64) -> Self {
        Self {
            interval: Some(interval),
            ..Self::new(symbol, time, price, price, price, price)
        }
    }

    pub fn with_volume(mut self, volume: f64) -> Self {
        self.volume = volume;
        self
    }

    pub fn datetime(&self) -> Option<DateTime<Utc>> {
        Utc.timestamp_opt(self.time, 0).single()
    }

    /// Fold a new price into an open bar.
    pub fn update_price(&mut self, price: f64) {
        self.high_price = self.high_price.max(price);
        self.low_price = self.low_price.min(price);
        self.close_price = price;
    }

    /// Price read through the given source.
    pub fn price(&self, source: PriceSource) -> f64 {
        match source {
            PriceSource::Open => self.open_price,
            PriceSource::High => self.high_price,
            PriceSource::Low => self.low_price,
            PriceSource::Close => self.close_price,
            PriceSource::Hl2 => (self.high_price + self.low_price) / 2.0,
            PriceSource::Hlc3 => (self.high_price + self.low_price + self.close_price) / 3.0,
            PriceSource::Ohlc4 => {
                (self.open_price + self.high_price + self.low_price + self.close_price) / 4.0
            }
        }
    }

    /// `low <= min(open, close)` and `high >= max(open, close)`.
    pub fn is_consistent(&self) -> bool {
        self.low_price <= self.open_price.min(self.close_price)
            && self.high_price >= self.open_price.max(self.close_price)
    }
}

impl Open for BarData {
    fn open(&self) -> f64 {
        self.open_price
    }
}

impl High for BarData {
    fn high(&self) -> f64 {
        self.high_price
    }
}

impl Low for BarData {
    fn low(&self) -> f64 {
        self.low_price
    }
}

impl Close for BarData {
    fn close(&self) -> f64 {
        self.close_price
    }
}

impl Volume for BarData {
    fn volume(&self) -> f64 {
        self.volume
    }
}

/// Open position supplied by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PositionData {
    pub symbol: String,
    pub direction: Direction,
    pub entry_price: f64,
    pub quantity: f64,
    #[serde(default)]
    pub take_profit: Option<f64>,
    #[serde(default)]
    pub stop_loss: Option<f64>,
}

impl PositionData {
    pub fn new(symbol: impl Into<String>, direction: Direction, entry_price: f64, quantity: f64) -> Self {
        Self {
            symbol: symbol.into(),
            direction,
            entry_price,
            quantity,
            take_profit: None,
            stop_loss: None,
        }
    }
}

/// Pending order supplied by the host.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OrderData {
    pub symbol: String,
    pub direction: Direction,
    pub requested_price: f64,
    pub quantity: f64,
}

/// Request for recent history of one symbol and interval.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HistoryRequest {
    pub symbol: String,
    pub interval: Interval,
    pub count: usize,
}

impl HistoryRequest {
    /// Create a new HistoryRequest
    pub fn new(symbol: impl Into<String>, interval: Interval, count: usize) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
            count,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_mid_and_spread() {
        let tick = TickData::new("EURUSD", Utc::now(), 1.1000, 1.1002);
        assert!((tick.mid - 1.1001).abs() < 1e-12);
        assert!((tick.spread() - 0.0002).abs() < 1e-12);
    }

    #[test]
    fn test_bar_update_price_keeps_invariant() {
        let mut bar = BarData::from_price("EURUSD", Interval::Minute, 60, 1.1);
        for price in [1.2, 1.05, 1.15] {
            bar.update_price(price);
            assert!(bar.is_consistent());
        }
        assert_eq!(bar.open_price, 1.1);
        assert_eq!(bar.high_price, 1.2);
        assert_eq!(bar.low_price, 1.05);
        assert_eq!(bar.close_price, 1.15);
    }

    #[test]
    fn test_price_source() {
        let bar = BarData::new("X", 0, 1.0, 4.0, 0.0, 3.0);
        assert_eq!(bar.price(PriceSource::Hl2), 2.0);
        assert_eq!(bar.price(PriceSource::Hlc3), 7.0 / 3.0);
        assert_eq!(bar.price(PriceSource::Ohlc4), 2.0);
    }
}
