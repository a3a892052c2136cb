//! Datafeed traits for historical candles and streaming prices.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

use super::constant::Interval;
use super::object::{BarData, HistoryRequest};

/// Historical candle source.
///
/// Results may contain duplicate or overlapping timestamps; the aggregator
/// normalizes them.
#[async_trait]
pub trait BaseDatafeed: Send + Sync {
    /// Query recent history bar data
    async fn query_bar_history(&self, req: HistoryRequest) -> Result<Vec<BarData>, String>;
}

/// Streaming price source. Ticks are pushed into the engine by the host.
pub trait BasePriceFeed {
    fn subscribe(&self, symbol: &str);

    fn unsubscribe(&self, symbol: &str);

    /// Whether the market for `symbol` is currently open
    fn is_market_open(&self, _symbol: &str) -> bool {
        true
    }
}

/// Empty datafeed implementation for when no datafeed is configured
#[derive(Default)]
pub struct EmptyDatafeed;

impl EmptyDatafeed {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl BaseDatafeed for EmptyDatafeed {
    async fn query_bar_history(&self, req: HistoryRequest) -> Result<Vec<BarData>, String> {
        tracing::warn!(symbol = %req.symbol, "no datafeed configured");
        Err("history query failed: no datafeed configured".to_string())
    }
}

/// In-memory history keyed by (symbol, interval).
#[derive(Default)]
pub struct MemoryDatafeed {
    bars: Mutex<HashMap<(String, Interval), Vec<BarData>>>,
}

impl MemoryDatafeed {
    pub fn new() -> Self {
        Self::default()
    }

    /// Store bars as returned by the source, duplicates included.
    pub fn insert(&self, symbol: &str, interval: Interval, bars: Vec<BarData>) {
        if let Ok(mut map) = self.bars.lock() {
            map.entry((symbol.to_string(), interval)).or_default().extend(bars);
        }
    }
}

#[async_trait]
impl BaseDatafeed for MemoryDatafeed {
    async fn query_bar_history(&self, req: HistoryRequest) -> Result<Vec<BarData>, String> {
        let map = self.bars.lock().map_err(|e| e.to_string())?;
        let bars = map
            .get(&(req.symbol.clone(), req.interval))
            .ok_or_else(|| format!("no history for {} {}", req.symbol, req.interval))?;
        let start = bars.len().saturating_sub(req.count);
        Ok(bars[start..].to_vec())
    }
}

/// Price feed that only records subscriptions; ticks are injected by the caller.
#[derive(Default, Clone)]
pub struct ManualPriceFeed {
    subscribed: Arc<Mutex<HashSet<String>>>,
    closed: Arc<Mutex<HashSet<String>>>,
}

impl ManualPriceFeed {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_subscribed(&self, symbol: &str) -> bool {
        self.subscribed
            .lock()
            .map(|s| s.contains(symbol))
            .unwrap_or(false)
    }

    pub fn subscription_count(&self) -> usize {
        self.subscribed.lock().map(|s| s.len()).unwrap_or(0)
    }

    /// Open or close the market of `symbol`. Markets start open.
    pub fn set_market_open(&self, symbol: &str, open: bool) {
        if let Ok(mut closed) = self.closed.lock() {
            if open {
                closed.remove(symbol);
            } else {
                closed.insert(symbol.to_string());
            }
        }
    }
}

impl BasePriceFeed for ManualPriceFeed {
    fn subscribe(&self, symbol: &str) {
        if let Ok(mut s) = self.subscribed.lock() {
            s.insert(symbol.to_string());
        }
        tracing::debug!(symbol, "price feed subscribed");
    }

    fn unsubscribe(&self, symbol: &str) {
        if let Ok(mut s) = self.subscribed.lock() {
            s.remove(symbol);
        }
        tracing::debug!(symbol, "price feed unsubscribed");
    }

    fn is_market_open(&self, symbol: &str) -> bool {
        self.closed.lock().map(|c| !c.contains(symbol)).unwrap_or(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_empty_datafeed() {
        let datafeed = EmptyDatafeed::new();
        let req = HistoryRequest::new("EURUSD", Interval::Minute, 10);
        assert!(datafeed.query_bar_history(req).await.is_err());
    }

    #[tokio::test]
    async fn test_memory_datafeed_returns_tail() {
        let datafeed = MemoryDatafeed::new();
        let bars: Vec<BarData> = (0..10)
            .map(|i| BarData::new("EURUSD", i * 60, 1.0, 1.0, 1.0, 1.0))
            .collect();
        datafeed.insert("EURUSD", Interval::Minute, bars);

        let result = datafeed
            .query_bar_history(HistoryRequest::new("EURUSD", Interval::Minute, 3))
            .await
            .unwrap();
        assert_eq!(result.iter().map(|b| b.time).collect::<Vec<_>>(), vec![420, 480, 540]);

        let missing = datafeed
            .query_bar_history(HistoryRequest::new("EURUSD", Interval::Hour, 3))
            .await;
        assert!(missing.is_err());
    }

    #[test]
    fn test_manual_price_feed() {
        let feed = ManualPriceFeed::new();
        feed.subscribe("EURUSD");
        assert!(feed.is_subscribed("EURUSD"));
        feed.unsubscribe("EURUSD");
        assert_eq!(feed.subscription_count(), 0);

        assert!(feed.is_market_open("EURUSD"));
        feed.set_market_open("EURUSD", false);
        assert!(!feed.is_market_open("EURUSD"));
        assert!(feed.is_market_open("GBPUSD"));
        feed.set_market_open("EURUSD", true);
        assert!(feed.is_market_open("EURUSD"));
    }
}
