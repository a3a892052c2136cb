//! Bar generator for converting tick data to bar data.
//!
//! Owns the live candle series for exactly one (symbol, interval) pair.
//! Ticks fold into the trailing bucket in place or open a new bucket; ticks
//! for buckets older than the tail are dropped.

use crate::chart::manager::{BarManager, BarUpdate};
use crate::trader::constant::Interval;
use crate::trader::object::{BarData, TickData};

/// What a tick did to the series.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// Trailing bar updated in place
    Updated,
    /// New bar opened
    Appended,
    /// Tick for another symbol or a closed bucket
    Dropped,
}

/// Bar generator that aggregates ticks into bars
pub struct BarGenerator {
    symbol: String,
    interval: Interval,
    manager: BarManager,

    /// Minimum spacing between committed in-place updates
    commit_interval_ms: i64,
    last_commit_ms: Option<i64>,
    /// Series mutated since the last commit
    dirty: bool,
    /// A new bar opened since the last commit
    appended: bool,
}

impl BarGenerator {
    /// Create a new bar generator
    pub fn new(symbol: impl Into<String>, interval: Interval, max_bars: usize, commit_interval_ms: i64) -> Self {
        Self {
            symbol: symbol.into(),
            interval,
            manager: BarManager::new(max_bars),
            commit_interval_ms,
            last_commit_ms: None,
            dirty: false,
            appended: false,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn interval(&self) -> Interval {
        self.interval
    }

    /// Read-only view of the series.
    pub fn manager(&self) -> &BarManager {
        &self.manager
    }

    pub fn bars(&self) -> &[BarData] {
        self.manager.get_all_bars()
    }

    /// Replace the series with a bulk history load.
    pub fn load_history(&mut self, history: Vec<BarData>) {
        let received = history.len();
        self.manager.update_history(history);
        self.dirty = false;
        self.appended = false;
        tracing::debug!(
            symbol = %self.symbol,
            interval = %self.interval,
            received,
            kept = self.manager.get_count(),
            "history loaded"
        );
    }

    /// Update with a new tick
    pub fn update_tick(&mut self, tick: &TickData) -> TickOutcome {
        if tick.symbol != self.symbol {
            return TickOutcome::Dropped;
        }

        let bucket = self.interval.bucket_start_datetime(&tick.datetime);

        if let Some(last) = self.manager.last_bar_mut() {
            if bucket == last.time {
                last.update_price(tick.mid);
                self.dirty = true;
                return TickOutcome::Updated;
            }
            if bucket < last.time {
                tracing::trace!(symbol = %self.symbol, bucket, tail = last.time, "stale tick dropped");
                return TickOutcome::Dropped;
            }
        }

        let bar = BarData::from_price(self.symbol.clone(), self.interval, bucket, tick.mid);
        match self.manager.update_bar(bar) {
            BarUpdate::Rejected => TickOutcome::Dropped,
            _ => {
                self.dirty = true;
                self.appended = true;
                TickOutcome::Appended
            }
        }
    }

    /// Whether pending mutations should propagate downstream now.
    ///
    /// New bars commit immediately; in-place updates at most once per
    /// commit interval.
    pub fn take_commit(&mut self, now_ms: i64) -> bool {
        if !self.dirty {
            return false;
        }

        let due = match self.last_commit_ms {
            None => true,
            Some(last) => now_ms - last >= self.commit_interval_ms,
        };

        if self.appended || due {
            self.dirty = false;
            self.appended = false;
            self.last_commit_ms = Some(now_ms);
            true
        } else {
            false
        }
    }

    /// Get the current (open) bar
    pub fn get_current_bar(&self) -> Option<&BarData> {
        self.manager.last_bar()
    }
}

/// Aggregate a tick sequence from scratch into bars.
///
/// Applies the same bucketing and stale-tick rules as the live path.
pub fn aggregate_ticks(symbol: &str, interval: Interval, ticks: &[TickData]) -> Vec<BarData> {
    let mut bars: Vec<BarData> = Vec::new();

    for tick in ticks.iter().filter(|t| t.symbol == symbol) {
        let bucket = interval.bucket_start_datetime(&tick.datetime);
        match bars.last_mut() {
            Some(last) if last.time == bucket => last.update_price(tick.mid),
            Some(last) if last.time > bucket => {}
            _ => bars.push(BarData::from_price(symbol, interval, bucket, tick.mid)),
        }
    }

    bars
}
