//! Bar data manager for the chart module.
//!
//! Holds the single active candle series: sorted ascending, unique by time,
//! capped to a retention length. Provides time lookup and range queries for
//! price data.

use std::collections::HashMap;

use crate::trader::object::BarData;

/// Where a bar landed when pushed into the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BarUpdate {
    /// Replaced the trailing bar in place
    Replaced,
    /// Appended after the trailing bar
    Appended,
    /// Older than the trailing bar; history is never rewritten
    Rejected,
}

/// Manages bar data with time-based lookup
#[derive(Debug, Clone)]
pub struct BarManager {
    /// Ordered list of bar data, strictly increasing times
    ordered_bars: Vec<BarData>,
    /// Retention cap
    max_bars: usize,
}

impl Default for BarManager {
    fn default() -> Self {
        Self::new(500)
    }
}

impl BarManager {
    /// Create a new BarManager keeping at most `max_bars` bars
    pub fn new(max_bars: usize) -> Self {
        Self {
            ordered_bars: Vec::new(),
            max_bars: max_bars.max(1),
        }
    }

    /// Replace the series with a history batch.
    ///
    /// Duplicate times keep the later bar of the batch; the result is sorted
    /// ascending and trimmed to the newest `max_bars`.
    pub fn update_history(&mut self, history: Vec<BarData>) {
        let mut bars: HashMap<i64, BarData> = HashMap::with_capacity(history.len());
        for bar in history {
            bars.insert(bar.time, bar);
        }

        let mut sorted_bars: Vec<BarData> = bars.into_values().collect();
        sorted_bars.sort_by_key(|bar| bar.time);

        let excess = sorted_bars.len().saturating_sub(self.max_bars);
        sorted_bars.drain(..excess);

        self.ordered_bars = sorted_bars;
    }

    /// Push a single bar at or after the tail.
    pub fn update_bar(&mut self, bar: BarData) -> BarUpdate {
        match self.ordered_bars.last() {
            Some(last) if bar.time == last.time => {
                let ix = self.ordered_bars.len() - 1;
                self.ordered_bars[ix] = bar;
                BarUpdate::Replaced
            }
            Some(last) if bar.time < last.time => BarUpdate::Rejected,
            _ => {
                self.ordered_bars.push(bar);
                if self.ordered_bars.len() > self.max_bars {
                    let excess = self.ordered_bars.len() - self.max_bars;
                    self.ordered_bars.drain(..excess);
                }
                BarUpdate::Appended
            }
        }
    }

    /// Mutable access to the trailing (open) bar.
    pub fn last_bar_mut(&mut self) -> Option<&mut BarData> {
        self.ordered_bars.last_mut()
    }

    pub fn last_bar(&self) -> Option<&BarData> {
        self.ordered_bars.last()
    }

    /// Get total number of bars
    pub fn get_count(&self) -> usize {
        self.ordered_bars.len()
    }

    /// Get index for a bar time
    pub fn get_index(&self, time: i64) -> Option<usize> {
        self.ordered_bars.binary_search_by_key(&time, |bar| bar.time).ok()
    }

    /// Get bar data for an index
    pub fn get_bar(&self, ix: usize) -> Option<&BarData> {
        self.ordered_bars.get(ix)
    }

    /// Get all bar data
    pub fn get_all_bars(&self) -> &[BarData] {
        &self.ordered_bars
    }

    /// Time span `(first, last)` covered by the series
    pub fn get_time_range(&self) -> Option<(i64, i64)> {
        Some((self.ordered_bars.first()?.time, self.ordered_bars.last()?.time))
    }

    /// Get price range for given index range
    pub fn get_price_range(&self, min_ix: Option<usize>, max_ix: Option<usize>) -> (f64, f64) {
        if self.ordered_bars.is_empty() {
            return (0.0, 1.0);
        }

        let last_ix = self.ordered_bars.len() - 1;
        let min_ix = min_ix.unwrap_or(0);
        let max_ix = max_ix.unwrap_or(last_ix).min(last_ix);

        if min_ix > max_ix {
            return (0.0, 1.0);
        }

        let bars = &self.ordered_bars[min_ix..=max_ix];
        let min_price = bars.iter().map(|b| b.low_price).fold(f64::INFINITY, f64::min);
        let max_price = bars.iter().map(|b| b.high_price).fold(f64::NEG_INFINITY, f64::max);
        (min_price, max_price)
    }
}

/// Series invariant: consistent OHLC on every bar, strictly increasing times.
pub fn is_well_formed(bars: &[BarData]) -> bool {
    bars.iter().all(BarData::is_consistent) && bars.windows(2).all(|w| w[0].time < w[1].time)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn create_test_bar(time: i64, open: f64, high: f64, low: f64, close: f64) -> BarData {
        BarData::new("TEST", time, open, high, low, close)
    }

    #[test]
    fn test_update_history_dedups_keeping_later() {
        let mut manager = BarManager::new(500);

        let bars = vec![
            create_test_bar(120, 1.0, 2.0, 0.5, 1.5),
            create_test_bar(60, 1.0, 1.2, 0.9, 1.1),
            create_test_bar(120, 1.0, 3.0, 0.5, 2.5),
            create_test_bar(0, 1.0, 1.1, 0.9, 1.0),
        ];

        manager.update_history(bars);
        assert_eq!(manager.get_count(), 3);
        let times: Vec<i64> = manager.get_all_bars().iter().map(|b| b.time).collect();
        assert_eq!(times, vec![0, 60, 120]);
        assert_eq!(manager.get_bar(2).unwrap().close_price, 2.5);
        assert_eq!(manager.get_index(60), Some(1));
        assert!(is_well_formed(manager.get_all_bars()));
    }

    #[test]
    fn test_update_history_trims_to_cap() {
        let mut manager = BarManager::new(3);
        let bars = (0..5).map(|i| create_test_bar(i * 60, 1.0, 1.0, 1.0, 1.0)).collect();
        manager.update_history(bars);
        assert_eq!(manager.get_time_range(), Some((120, 240)));
        assert_eq!(manager.get_index(120), Some(0));
    }

    #[test]
    fn test_update_bar_replace_append_reject() {
        let mut manager = BarManager::new(2);
        assert_eq!(manager.update_bar(create_test_bar(60, 1.0, 1.0, 1.0, 1.0)), BarUpdate::Appended);
        assert_eq!(manager.update_bar(create_test_bar(60, 1.0, 2.0, 1.0, 2.0)), BarUpdate::Replaced);
        assert_eq!(manager.update_bar(create_test_bar(0, 1.0, 1.0, 1.0, 1.0)), BarUpdate::Rejected);
        assert_eq!(manager.update_bar(create_test_bar(120, 2.0, 2.0, 2.0, 2.0)), BarUpdate::Appended);
        assert_eq!(manager.update_bar(create_test_bar(180, 2.0, 2.0, 2.0, 2.0)), BarUpdate::Appended);

        // Oldest evicted past the cap
        assert_eq!(manager.get_count(), 2);
        assert_eq!(manager.get_index(60), None);
        assert_eq!(manager.get_index(180), Some(1));
    }

    #[test]
    fn test_price_range() {
        let mut manager = BarManager::default();
        manager.update_history(vec![
            create_test_bar(0, 100.0, 105.0, 95.0, 102.0),
            create_test_bar(60, 102.0, 110.0, 98.0, 108.0),
        ]);

        assert_eq!(manager.get_price_range(None, None), (95.0, 110.0));
        assert_eq!(manager.get_price_range(Some(1), None), (98.0, 110.0));
        assert_eq!(manager.get_price_range(Some(2), Some(1)), (0.0, 1.0));
    }
}
