//! Chart-type transforms over a candle series.
//!
//! Each sequential representation is a fold carrying an explicit state
//! struct, so every transform is a pure function of its input series.

use serde::{Deserialize, Serialize};

use crate::error::{ChartError, ChartResult};
use crate::trader::object::BarData;
use crate::trader::utility::{ceil_to, floor_to};

/// Relative tolerance used when comparing price moves against brick sizes.
const SIZE_EPSILON: f64 = 1e-9;

/// Most bricks a Renko series may hold.
pub const MAX_BRICKS: usize = 10_000;

/// Chart representation selected by the user.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ChartType {
    #[default]
    Candles,
    HeikinAshi,
    Renko {
        brick_size: f64,
    },
    PointAndFigure {
        box_size: f64,
        reversal: u32,
    },
    Line,
}

impl ChartType {
    pub fn name(&self) -> &'static str {
        match self {
            ChartType::Candles => "Candles",
            ChartType::HeikinAshi => "Heikin-Ashi",
            ChartType::Renko { .. } => "Renko",
            ChartType::PointAndFigure { .. } => "Point & Figure",
            ChartType::Line => "Line",
        }
    }
}

/// A candle series in one chart representation.
#[derive(Debug, Clone, PartialEq)]
pub struct ChartRepresentation {
    pub chart_type: ChartType,
    pub bars: Vec<BarData>,
}

impl ChartRepresentation {
    /// `(time, close)` pairs, the payload of a line series.
    pub fn line_points(&self) -> Vec<(i64, f64)> {
        self.bars.iter().map(|b| (b.time, b.close_price)).collect()
    }

    /// Update the trailing element in place for a live candle update.
    ///
    /// Only passthrough and line representations map one candle to one
    /// element; the others need a full rebuild, signalled by `false`.
    pub fn update_last(&mut self, bar: &BarData) -> bool {
        if !matches!(self.chart_type, ChartType::Candles | ChartType::Line) {
            return false;
        }
        let mapped = match self.chart_type {
            ChartType::Line => line_bar(bar),
            _ => bar.clone(),
        };
        match self.bars.last_mut() {
            Some(last) if last.time == mapped.time => {
                *last = mapped;
                true
            }
            Some(last) if last.time < mapped.time => {
                self.bars.push(mapped);
                true
            }
            None => {
                self.bars.push(mapped);
                true
            }
            _ => false,
        }
    }
}

/// Map a raw candle series into the requested representation.
pub fn transform(bars: &[BarData], chart_type: ChartType) -> ChartResult<ChartRepresentation> {
    let out = match chart_type {
        ChartType::Candles => bars.to_vec(),
        ChartType::Line => bars.iter().map(line_bar).collect(),
        ChartType::HeikinAshi => heikin_ashi(bars),
        ChartType::Renko { brick_size } => renko(bars, brick_size)?,
        ChartType::PointAndFigure { box_size, reversal } => point_and_figure(bars, box_size, reversal)?,
    };
    Ok(ChartRepresentation {
        chart_type,
        bars: out,
    })
}

fn line_bar(bar: &BarData) -> BarData {
    let close = bar.close_price;
    BarData {
        open_price: close,
        high_price: close,
        low_price: close,
        ..bar.clone()
    }
}

/// Heikin-Ashi accumulator: the previous synthetic open and close.
#[derive(Debug, Clone, Copy, Default)]
struct HeikinAshiState {
    prev: Option<(f64, f64)>,
}

impl HeikinAshiState {
    fn step(&mut self, bar: &BarData) -> BarData {
        let ha_close =
            (bar.open_price + bar.high_price + bar.low_price + bar.close_price) / 4.0;
        let ha_open = match self.prev {
            Some((prev_open, prev_close)) => (prev_open + prev_close) / 2.0,
            None => (bar.open_price + bar.close_price) / 2.0,
        };
        self.prev = Some((ha_open, ha_close));

        BarData {
            open_price: ha_open,
            high_price: bar.high_price.max(ha_open).max(ha_close),
            low_price: bar.low_price.min(ha_open).min(ha_close),
            close_price: ha_close,
            ..bar.clone()
        }
    }
}

pub fn heikin_ashi(bars: &[BarData]) -> Vec<BarData> {
    let mut state = HeikinAshiState::default();
    bars.iter().map(|bar| state.step(bar)).collect()
}

/// Hands out strictly increasing synthetic timestamps.
#[derive(Debug, Clone, Copy, Default)]
struct SyntheticClock {
    last: Option<i64>,
}

impl SyntheticClock {
    fn next(&mut self, source_time: i64) -> i64 {
        let time = match self.last {
            Some(last) if source_time <= last => last + 1,
            _ => source_time,
        };
        self.last = Some(time);
        time
    }
}

fn synthetic_bar(source: &BarData, time: i64, open: f64, close: f64) -> BarData {
    BarData {
        time,
        open_price: open,
        high_price: open.max(close),
        low_price: open.min(close),
        close_price: close,
        volume: 0.0,
        ..source.clone()
    }
}

/// Renko accumulator: the running reference price and the synthetic clock.
#[derive(Debug, Clone, Default)]
struct RenkoState {
    reference: Option<f64>,
    clock: SyntheticClock,
    bricks: Vec<BarData>,
}

impl RenkoState {
    fn step(mut self, bar: &BarData, brick_size: f64) -> ChartResult<Self> {
        let close = bar.close_price;
        let Some(reference) = self.reference else {
            self.reference = Some(close);
            return Ok(self);
        };

        let moved = (close - reference) / brick_size;
        let count = (moved.abs() + SIZE_EPSILON).floor();
        if count < 1.0 {
            return Ok(self);
        }
        if count > (MAX_BRICKS - self.bricks.len()) as f64 {
            return Err(ChartError::invalid(
                "brick_size",
                format!("{} is too small, series exceeds {} bricks", brick_size, MAX_BRICKS),
            ));
        }

        let count = count as usize;
        let step = brick_size.copysign(moved);
        for k in 0..count {
            // Offsets from the reference, so rounding never accumulates
            let open = reference + step * k as f64;
            let close = reference + step * (k + 1) as f64;
            if open == close {
                return Err(ChartError::invalid(
                    "brick_size",
                    format!("{} is below the price resolution at {}", brick_size, reference),
                ));
            }
            let time = self.clock.next(bar.time);
            self.bricks.push(synthetic_bar(bar, time, open, close));
        }

        self.reference = Some(reference + step * count as f64);
        Ok(self)
    }
}

pub fn renko(bars: &[BarData], brick_size: f64) -> ChartResult<Vec<BarData>> {
    if !(brick_size > 0.0) || !brick_size.is_finite() {
        return Err(ChartError::invalid("brick_size", format!("must be positive, got {}", brick_size)));
    }
    let state = bars
        .iter()
        .try_fold(RenkoState::default(), |state, bar| state.step(bar, brick_size))?;
    Ok(state.bricks)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
enum ColumnDirection {
    #[default]
    Undetermined,
    Rising,
    Falling,
}

/// Point-and-Figure accumulator. Prices are tracked as whole box indices,
/// snapped down for rising moves and up for falling ones.
#[derive(Debug, Clone, Default)]
struct PointFigureState {
    direction: ColumnDirection,
    extreme: Option<i64>,
    clock: SyntheticClock,
    columns: Vec<BarData>,
}

impl PointFigureState {
    fn step(mut self, bar: &BarData, box_size: f64, reversal: i64) -> Self {
        let close = bar.close_price;
        let up = (floor_to(close, box_size) / box_size).round() as i64;
        let down = (ceil_to(close, box_size) / box_size).round() as i64;

        let Some(extreme) = self.extreme else {
            self.extreme = Some(up);
            return self;
        };

        let next = match self.direction {
            ColumnDirection::Undetermined if up > extreme => Some((ColumnDirection::Rising, up)),
            ColumnDirection::Undetermined if down < extreme => Some((ColumnDirection::Falling, down)),
            ColumnDirection::Rising if up > extreme => Some((ColumnDirection::Rising, up)),
            ColumnDirection::Rising if extreme - down >= reversal => Some((ColumnDirection::Falling, down)),
            ColumnDirection::Falling if down < extreme => Some((ColumnDirection::Falling, down)),
            ColumnDirection::Falling if up - extreme >= reversal => Some((ColumnDirection::Rising, up)),
            _ => None,
        };

        if let Some((direction, target)) = next {
            let time = self.clock.next(bar.time);
            let open = extreme as f64 * box_size;
            let close = target as f64 * box_size;
            self.columns.push(synthetic_bar(bar, time, open, close));
            self.direction = direction;
            self.extreme = Some(target);
        }
        self
    }
}

pub fn point_and_figure(bars: &[BarData], box_size: f64, reversal: u32) -> ChartResult<Vec<BarData>> {
    if !(box_size > 0.0) || !box_size.is_finite() {
        return Err(ChartError::invalid("box_size", format!("must be positive, got {}", box_size)));
    }
    if reversal == 0 {
        return Err(ChartError::invalid("reversal", "must be at least 1 box"));
    }
    let state = bars.iter().fold(PointFigureState::default(), |state, bar| {
        state.step(bar, box_size, reversal as i64)
    });
    Ok(state.columns)
}
