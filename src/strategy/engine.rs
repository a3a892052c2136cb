//! Signal Engine
//!
//! Evaluates strategy rule-sets over the raw candle series and keeps the
//! resulting markers keyed by strategy id. Evaluation runs on load and on a
//! recompute interval, never per tick.

use std::collections::BTreeMap;

use super::base::{Comparison, Condition, Operand, Signal, SignalType, StrategySpec};
use crate::chart::indicator::compute_lines;
use crate::error::{ChartError, ChartResult};
use crate::trader::constant::PriceSource;
use crate::trader::object::BarData;

/// Resolve an operand to a series aligned with `bars`.
fn operand_series(operand: &Operand, bars: &[BarData]) -> ChartResult<Vec<Option<f64>>> {
    match operand {
        Operand::Price { source } => Ok(bars.iter().map(|b| Some(b.price(*source))).collect()),
        Operand::Value { value } => Ok(vec![Some(*value); bars.len()]),
        Operand::Indicator { kind, line } => {
            let lines = compute_lines(kind, PriceSource::Close, bars)?;
            let selected = match line {
                Some(name) => lines.into_iter().find(|l| &l.name == name),
                None => lines.into_iter().next(),
            };
            selected
                .map(|l| l.values)
                .ok_or_else(|| ChartError::invalid("line", format!("{} has no line {:?}", kind.name(), line)))
        }
    }
}

/// Whether the condition holds at each candle.
fn condition_series(condition: &Condition, bars: &[BarData]) -> ChartResult<Vec<bool>> {
    let left = operand_series(&condition.left, bars)?;
    let right = operand_series(&condition.right, bars)?;

    let holds = (0..bars.len())
        .map(|i| {
            let (Some(l), Some(r)) = (left[i], right[i]) else {
                return false;
            };
            let prev = if i > 0 { left[i - 1].zip(right[i - 1]) } else { None };
            match condition.op {
                Comparison::Gt => l > r,
                Comparison::Lt => l < r,
                Comparison::Gte => l >= r,
                Comparison::Lte => l <= r,
                Comparison::CrossesAbove => prev.is_some_and(|(pl, pr)| pl <= pr) && l > r,
                Comparison::CrossesBelow => prev.is_some_and(|(pl, pr)| pl >= pr) && l < r,
            }
        })
        .collect();
    Ok(holds)
}

/// Evaluate one strategy over the whole series.
///
/// A candle qualifies when every required rule holds and some weight
/// matched. Every qualifying candle emits, or only the first of each run
/// when the strategy is edge-triggered.
pub fn evaluate_strategy(spec: &StrategySpec, bars: &[BarData]) -> ChartResult<Vec<Signal>> {
    let total_weight = spec.total_weight();
    if spec.rules.is_empty() || total_weight <= 0.0 {
        return Ok(Vec::new());
    }

    let rule_holds = spec
        .rules
        .iter()
        .map(|rule| condition_series(&rule.condition, bars))
        .collect::<ChartResult<Vec<_>>>()?;

    let mut signals = Vec::new();
    let mut previous = false;

    for (i, bar) in bars.iter().enumerate() {
        let mut matched = 0.0;
        let mut required_ok = true;
        for (rule, holds) in spec.rules.iter().zip(&rule_holds) {
            if holds[i] {
                matched += rule.weight;
            } else if rule.required {
                required_ok = false;
            }
        }

        let qualifies = required_ok && matched > 0.0;
        if qualifies && !(spec.edge_triggered && previous) {
            let strength = (matched / total_weight).clamp(0.0, 1.0);
            signals.push(Signal {
                time: bar.time,
                signal_type: SignalType::from_side(spec.side, strength >= spec.strong_threshold),
                strength,
                strategy_id: spec.id.clone(),
                price: bar.close_price,
            });
        }
        previous = qualifies;
    }

    Ok(signals)
}

/// Strategy set with interval-gated recomputation
#[derive(Debug, Clone)]
pub struct SignalEngine {
    strategies: Vec<StrategySpec>,
    markers: BTreeMap<String, Vec<Signal>>,
    interval_ms: i64,
    last_run_ms: Option<i64>,
}

impl SignalEngine {
    pub fn new(interval_secs: i64) -> Self {
        Self {
            strategies: Vec::new(),
            markers: BTreeMap::new(),
            interval_ms: interval_secs.max(1) * 1000,
            last_run_ms: None,
        }
    }

    pub fn strategies(&self) -> &[StrategySpec] {
        &self.strategies
    }

    pub fn has_active(&self) -> bool {
        self.strategies.iter().any(|s| s.enabled)
    }

    /// Replace the strategy set. No active strategies clears every marker.
    pub fn set_strategies(&mut self, strategies: Vec<StrategySpec>) {
        self.strategies = strategies;
        if !self.has_active() {
            self.clear();
        }
        self.last_run_ms = None;
    }

    /// Whether the recompute interval has elapsed.
    pub fn should_recompute(&self, now_ms: i64) -> bool {
        match self.last_run_ms {
            None => true,
            Some(last) => now_ms - last >= self.interval_ms,
        }
    }

    /// Full evaluation of every active strategy.
    pub fn evaluate(&mut self, bars: &[BarData], now_ms: i64) {
        self.markers.clear();
        for spec in self.strategies.iter().filter(|s| s.enabled) {
            match evaluate_strategy(spec, bars) {
                Ok(signals) => {
                    self.markers.insert(spec.id.clone(), signals);
                }
                Err(e) => tracing::warn!(id = %spec.id, error = %e, "strategy skipped"),
            }
        }
        self.last_run_ms = Some(now_ms);
        tracing::debug!(strategies = self.markers.len(), signals = self.signal_count(), "signals evaluated");
    }

    /// Timer hook. Returns whether an evaluation ran.
    pub fn on_timer(&mut self, bars: &[BarData], now_ms: i64) -> bool {
        if !self.has_active() || !self.should_recompute(now_ms) {
            return false;
        }
        self.evaluate(bars, now_ms);
        true
    }

    pub fn markers(&self, strategy_id: &str) -> &[Signal] {
        self.markers.get(strategy_id).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Every marker ordered by time.
    pub fn signals(&self) -> Vec<Signal> {
        let mut all: Vec<Signal> = self.markers.values().flatten().cloned().collect();
        all.sort_by_key(|s| s.time);
        all
    }

    pub fn signal_count(&self) -> usize {
        self.markers.values().map(Vec::len).sum()
    }

    pub fn clear(&mut self) {
        self.markers.clear();
    }
}
