//! Indicator module for chart technical analysis.
//!
//! Indicator configuration is a closed tagged union (`IndicatorKind`) with a
//! single dispatch point, `compute_lines`. Every line is computed aligned to
//! the input bars, `None` marking the warm-up prefix, and only converted to
//! `(time, value)` points when a series is built.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use ta::indicators::{
    BollingerBands, CommodityChannelIndex, ExponentialMovingAverage, FastStochastic, KeltnerChannel,
    MoneyFlowIndex, MovingAverageConvergenceDivergence, RelativeStrengthIndex, SimpleMovingAverage,
};
use ta::Next;

use super::base::{LineConfig, LineStyle, INDICATOR_COLORS, LEVEL_COLOR};
use super::levels::{support_resistance, LevelKind};
use crate::error::{ChartError, ChartResult};
use crate::trader::constant::PriceSource;
use crate::trader::object::BarData;
use crate::trader::setting::DEFAULT_PRICE_PRECISION;

fn default_period() -> usize {
    14
}
fn default_ma_period() -> usize {
    20
}
fn default_std_dev() -> f64 {
    2.0
}
fn default_keltner_multiplier() -> f64 {
    1.5
}
fn default_acceleration() -> f64 {
    0.02
}
fn default_maximum() -> f64 {
    0.2
}
fn default_pivot_period() -> i64 {
    86400
}
fn default_sr_period() -> usize {
    20
}
fn default_sr_strength() -> usize {
    2
}
fn default_fast() -> usize {
    12
}
fn default_slow() -> usize {
    26
}
fn default_signal() -> usize {
    9
}
fn default_d_period() -> usize {
    3
}
fn default_true() -> bool {
    true
}

/// Indicator type with its parameters
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum IndicatorKind {
    Sma {
        #[serde(default = "default_ma_period")]
        period: usize,
    },
    Ema {
        #[serde(default = "default_ma_period")]
        period: usize,
    },
    Wma {
        #[serde(default = "default_ma_period")]
        period: usize,
    },
    BollingerBands {
        #[serde(default = "default_ma_period")]
        period: usize,
        #[serde(default = "default_std_dev")]
        std_dev: f64,
    },
    KeltnerChannel {
        #[serde(default = "default_ma_period")]
        period: usize,
        #[serde(default = "default_keltner_multiplier")]
        multiplier: f64,
    },
    ParabolicSar {
        #[serde(default = "default_acceleration")]
        acceleration: f64,
        #[serde(default = "default_maximum")]
        maximum: f64,
    },
    PivotPoints {
        #[serde(default = "default_pivot_period")]
        period_secs: i64,
    },
    Vwap {
        #[serde(default = "default_ma_period")]
        period: usize,
    },
    SupportResistance {
        #[serde(default = "default_sr_period")]
        period: usize,
        #[serde(default = "default_sr_strength")]
        strength: usize,
        /// Decimal places of the tolerance bucket; the display precision when absent
        #[serde(default)]
        precision: Option<u32>,
    },
    Rsi {
        #[serde(default = "default_period")]
        period: usize,
    },
    Macd {
        #[serde(default = "default_fast")]
        fast: usize,
        #[serde(default = "default_slow")]
        slow: usize,
        #[serde(default = "default_signal")]
        signal: usize,
    },
    Stochastic {
        #[serde(default = "default_period")]
        k_period: usize,
        #[serde(default = "default_d_period")]
        d_period: usize,
    },
    WilliamsR {
        #[serde(default = "default_period")]
        period: usize,
    },
    Cci {
        #[serde(default = "default_ma_period")]
        period: usize,
    },
    Adx {
        #[serde(default = "default_period")]
        period: usize,
    },
    Mfi {
        #[serde(default = "default_period")]
        period: usize,
    },
}

/// Where an indicator is displayed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DisplayType {
    /// Drawn on the price pane
    Overlay,
    /// Drawn in its own pane below the price chart
    Oscillator,
}

impl IndicatorKind {
    /// Get indicator display name
    pub fn name(&self) -> String {
        match self {
            IndicatorKind::Sma { period } => format!("SMA({})", period),
            IndicatorKind::Ema { period } => format!("EMA({})", period),
            IndicatorKind::Wma { period } => format!("WMA({})", period),
            IndicatorKind::BollingerBands { period, std_dev } => format!("BOLL({},{})", period, std_dev),
            IndicatorKind::KeltnerChannel { period, multiplier } => format!("KC({},{})", period, multiplier),
            IndicatorKind::ParabolicSar { acceleration, maximum } => format!("SAR({},{})", acceleration, maximum),
            IndicatorKind::PivotPoints { .. } => "Pivot".to_string(),
            IndicatorKind::Vwap { period } => format!("VWAP({})", period),
            IndicatorKind::SupportResistance { .. } => "S/R".to_string(),
            IndicatorKind::Rsi { period } => format!("RSI({})", period),
            IndicatorKind::Macd { fast, slow, signal } => format!("MACD({},{},{})", fast, slow, signal),
            IndicatorKind::Stochastic { k_period, d_period } => format!("STOCH({},{})", k_period, d_period),
            IndicatorKind::WilliamsR { period } => format!("WR({})", period),
            IndicatorKind::Cci { period } => format!("CCI({})", period),
            IndicatorKind::Adx { period } => format!("ADX({})", period),
            IndicatorKind::Mfi { period } => format!("MFI({})", period),
        }
    }

    pub fn display(&self) -> DisplayType {
        match self {
            IndicatorKind::Sma { .. }
            | IndicatorKind::Ema { .. }
            | IndicatorKind::Wma { .. }
            | IndicatorKind::BollingerBands { .. }
            | IndicatorKind::KeltnerChannel { .. }
            | IndicatorKind::ParabolicSar { .. }
            | IndicatorKind::PivotPoints { .. }
            | IndicatorKind::Vwap { .. }
            | IndicatorKind::SupportResistance { .. } => DisplayType::Overlay,
            _ => DisplayType::Oscillator,
        }
    }

    /// Fill an absent S/R tolerance precision with `precision`.
    pub fn with_default_precision(self, precision: u32) -> Self {
        match self {
            IndicatorKind::SupportResistance { period, strength, precision: None } => {
                IndicatorKind::SupportResistance {
                    period,
                    strength,
                    precision: Some(precision),
                }
            }
            other => other,
        }
    }

    /// Reference threshold levels drawn with an oscillator
    pub fn default_levels(&self) -> Vec<f64> {
        match self {
            IndicatorKind::Rsi { .. } => vec![70.0, 30.0],
            IndicatorKind::Stochastic { .. } => vec![80.0, 20.0],
            IndicatorKind::WilliamsR { .. } => vec![-20.0, -80.0],
            IndicatorKind::Cci { .. } => vec![100.0, -100.0],
            IndicatorKind::Mfi { .. } => vec![80.0, 20.0],
            IndicatorKind::Adx { .. } => vec![25.0],
            _ => Vec::new(),
        }
    }
}

/// User configuration of one indicator instance
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSpec {
    pub id: String,
    pub kind: IndicatorKind,
    #[serde(default)]
    pub price_source: PriceSource,
    /// Style of the primary line; other lines take palette colors
    #[serde(default)]
    pub style: Option<LineConfig>,
    /// Positive trims points from the tail, negative from the head
    #[serde(default)]
    pub offset: i32,
    /// Line visibility by name; missing names are visible
    #[serde(default)]
    pub sublines: BTreeMap<String, bool>,
    /// Overrides the default threshold levels
    #[serde(default)]
    pub levels: Option<Vec<f64>>,
    #[serde(default = "default_true")]
    pub enabled: bool,
}

impl IndicatorSpec {
    pub fn new(id: impl Into<String>, kind: IndicatorKind) -> Self {
        Self {
            id: id.into(),
            kind,
            price_source: PriceSource::Close,
            style: None,
            offset: 0,
            sublines: BTreeMap::new(),
            levels: None,
            enabled: true,
        }
    }

    pub fn with_offset(mut self, offset: i32) -> Self {
        self.offset = offset;
        self
    }

    pub fn with_price_source(mut self, source: PriceSource) -> Self {
        self.price_source = source;
        self
    }

    pub fn with_subline(mut self, name: impl Into<String>, visible: bool) -> Self {
        self.sublines.insert(name.into(), visible);
        self
    }

    pub fn with_levels(mut self, levels: Vec<f64>) -> Self {
        self.levels = Some(levels);
        self
    }

    pub fn is_line_visible(&self, name: &str) -> bool {
        self.sublines.get(name).copied().unwrap_or(true)
    }

    /// Parse a JSON array of specs. Entries that fail to parse are logged and skipped.
    pub fn parse_list(value: &serde_json::Value) -> Vec<IndicatorSpec> {
        let Some(items) = value.as_array() else {
            tracing::warn!("indicator list is not an array");
            return Vec::new();
        };

        items
            .iter()
            .filter_map(|item| match serde_json::from_value::<IndicatorSpec>(item.clone()) {
                Ok(spec) => Some(spec),
                Err(e) => {
                    tracing::warn!(error = %e, entry = %item, "skipping unknown indicator");
                    None
                }
            })
            .collect()
    }
}

/// One computed line aligned to the input bars
#[derive(Debug, Clone, PartialEq)]
pub struct RawLine {
    pub name: String,
    pub values: Vec<Option<f64>>,
}

impl RawLine {
    fn new(name: impl Into<String>, values: Vec<Option<f64>>) -> Self {
        Self {
            name: name.into(),
            values,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct IndicatorPoint {
    pub time: i64,
    pub value: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorLine {
    pub name: String,
    pub style: LineConfig,
    pub points: Vec<IndicatorPoint>,
}

impl IndicatorLine {
    pub fn last_value(&self) -> Option<f64> {
        self.points.last().map(|p| p.value)
    }
}

/// Horizontal reference level of an oscillator pane
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HorizontalLevel {
    pub value: f64,
    pub style: LineConfig,
}

/// Computed output of one indicator spec
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorSeries {
    pub spec_id: String,
    pub name: String,
    pub display: DisplayType,
    /// 0 is the price pane, oscillators take 1.. in order
    pub pane: usize,
    pub lines: Vec<IndicatorLine>,
    pub levels: Vec<HorizontalLevel>,
}

impl IndicatorSeries {
    pub fn line(&self, name: &str) -> Option<&IndicatorLine> {
        self.lines.iter().find(|l| l.name == name)
    }
}

fn invalid_period(period: usize) -> ChartResult<()> {
    if period == 0 {
        return Err(ChartError::invalid("period", "must be positive"));
    }
    Ok(())
}

fn ta_error(name: &'static str) -> impl Fn(ta::errors::TaError) -> ChartError {
    move |e| ChartError::invalid(name, format!("{:?}", e))
}

/// Blank the first `warm_up` values.
fn mask(mut values: Vec<Option<f64>>, warm_up: usize) -> Vec<Option<f64>> {
    for v in values.iter_mut().take(warm_up) {
        *v = None;
    }
    values
}

fn run<I, T>(indicator: &mut I, inputs: impl Iterator<Item = T>) -> Vec<Option<f64>>
where
    I: Next<T, Output = f64>,
{
    inputs.map(|x| Some(indicator.next(x))).collect()
}

fn wma(values: &[f64], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; values.len()];
    if period == 0 || values.len() < period {
        return out;
    }

    let weight_sum = (period * (period + 1)) as f64 / 2.0;
    for i in (period - 1)..values.len() {
        let window = &values[i + 1 - period..=i];
        let weighted: f64 = window.iter().enumerate().map(|(j, v)| v * (j + 1) as f64).sum();
        out[i] = Some(weighted / weight_sum);
    }
    out
}

/// Parabolic SAR. The first bar only seeds the state.
fn parabolic_sar(bars: &[BarData], acceleration: f64, maximum: f64) -> Vec<Option<f64>> {
    let mut out = vec![None; bars.len()];
    if bars.len() < 2 {
        return out;
    }

    let mut is_long = true;
    let mut sar = bars[0].low_price;
    let mut ep = bars[0].high_price;
    let mut af = acceleration;

    for i in 1..bars.len() {
        let high = bars[i].high_price;
        let low = bars[i].low_price;

        sar += af * (ep - sar);

        if is_long {
            sar = sar.min(bars[i - 1].low_price);
            if i >= 2 {
                sar = sar.min(bars[i - 2].low_price);
            }

            if low < sar {
                is_long = false;
                sar = ep;
                ep = low;
                af = acceleration;
            } else if high > ep {
                ep = high;
                af = (af + acceleration).min(maximum);
            }
        } else {
            sar = sar.max(bars[i - 1].high_price);
            if i >= 2 {
                sar = sar.max(bars[i - 2].high_price);
            }

            if high > sar {
                is_long = true;
                sar = ep;
                ep = high;
                af = acceleration;
            } else if low < ep {
                ep = low;
                af = (af + acceleration).min(maximum);
            }
        }

        out[i] = Some(sar);
    }
    out
}

/// Pivot levels from the previous period's aggregated high/low/close.
fn pivot_points(bars: &[BarData], period_secs: i64) -> [Vec<Option<f64>>; 5] {
    let mut lines: [Vec<Option<f64>>; 5] = Default::default();
    for line in lines.iter_mut() {
        *line = vec![None; bars.len()];
    }

    // (bucket, high, low, close) of the current and previous periods
    let mut current: Option<(i64, f64, f64, f64)> = None;
    let mut previous: Option<(f64, f64, f64)> = None;

    for (i, bar) in bars.iter().enumerate() {
        let bucket = bar.time.div_euclid(period_secs);
        match current.as_mut() {
            Some(period) if period.0 == bucket => {
                period.1 = period.1.max(bar.high_price);
                period.2 = period.2.min(bar.low_price);
                period.3 = bar.close_price;
            }
            _ => {
                if let Some((_, h, l, c)) = current {
                    previous = Some((h, l, c));
                }
                current = Some((bucket, bar.high_price, bar.low_price, bar.close_price));
            }
        }

        if let Some((h, l, c)) = previous {
            let pivot = (h + l + c) / 3.0;
            let values = [pivot, 2.0 * pivot - l, pivot + (h - l), 2.0 * pivot - h, pivot - (h - l)];
            for (line, value) in lines.iter_mut().zip(values) {
                line[i] = Some(value);
            }
        }
    }
    lines
}

/// Volume-weighted EMA approximation of VWAP.
///
/// Falls back to the EMA of typical price while no volume has been seen.
fn vwap(bars: &[BarData], period: usize) -> ChartResult<Vec<Option<f64>>> {
    let mut pv = ExponentialMovingAverage::new(period).map_err(ta_error("period"))?;
    let mut vol = ExponentialMovingAverage::new(period).map_err(ta_error("period"))?;
    let mut tp = ExponentialMovingAverage::new(period).map_err(ta_error("period"))?;

    let values = bars
        .iter()
        .map(|bar| {
            let typical = (bar.high_price + bar.low_price + bar.close_price) / 3.0;
            let weighted = pv.next(typical * bar.volume);
            let volume = vol.next(bar.volume);
            let plain = tp.next(typical);
            Some(if volume > 0.0 { weighted / volume } else { plain })
        })
        .collect();
    Ok(mask(values, period - 1))
}

fn williams_r(bars: &[BarData], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; bars.len()];
    if period == 0 || bars.len() < period {
        return out;
    }

    for i in (period - 1)..bars.len() {
        let window = &bars[i + 1 - period..=i];
        let highest = window.iter().map(|b| b.high_price).fold(f64::MIN, f64::max);
        let lowest = window.iter().map(|b| b.low_price).fold(f64::MAX, f64::min);
        out[i] = Some(if highest == lowest {
            -50.0
        } else {
            -100.0 * (highest - bars[i].close_price) / (highest - lowest)
        });
    }
    out
}

/// Wilder's ADX. First value at index `2 * period - 1`.
fn adx(bars: &[BarData], period: usize) -> Vec<Option<f64>> {
    let mut out = vec![None; bars.len()];
    if period == 0 || bars.len() < 2 * period {
        return out;
    }

    let n = period as f64;
    let mut tr_sum = 0.0;
    let mut plus_sum = 0.0;
    let mut minus_sum = 0.0;
    let mut dx_sum = 0.0;
    let mut adx_value: Option<f64> = None;

    for i in 1..bars.len() {
        let (cur, prev) = (&bars[i], &bars[i - 1]);
        let up = cur.high_price - prev.high_price;
        let down = prev.low_price - cur.low_price;
        let plus_dm = if up > down && up > 0.0 { up } else { 0.0 };
        let minus_dm = if down > up && down > 0.0 { down } else { 0.0 };
        let tr = (cur.high_price - cur.low_price)
            .max((cur.high_price - prev.close_price).abs())
            .max((cur.low_price - prev.close_price).abs());

        if i <= period {
            tr_sum += tr;
            plus_sum += plus_dm;
            minus_sum += minus_dm;
            if i < period {
                continue;
            }
        } else {
            tr_sum = tr_sum - tr_sum / n + tr;
            plus_sum = plus_sum - plus_sum / n + plus_dm;
            minus_sum = minus_sum - minus_sum / n + minus_dm;
        }

        let (plus_di, minus_di) = if tr_sum > 0.0 {
            (100.0 * plus_sum / tr_sum, 100.0 * minus_sum / tr_sum)
        } else {
            (0.0, 0.0)
        };
        let di_sum = plus_di + minus_di;
        let dx = if di_sum > 0.0 {
            100.0 * (plus_di - minus_di).abs() / di_sum
        } else {
            0.0
        };

        adx_value = match adx_value {
            Some(prev_adx) => Some((prev_adx * (n - 1.0) + dx) / n),
            None => {
                dx_sum += dx;
                if i == 2 * period - 1 {
                    Some(dx_sum / n)
                } else {
                    None
                }
            }
        };
        out[i] = adx_value;
    }
    out
}

/// Compute every line of `kind` over `bars`, aligned to the input.
///
/// Single-input indicators read the price selected by `source` from a
/// private copy; range indicators read the full candle.
pub fn compute_lines(kind: &IndicatorKind, source: PriceSource, bars: &[BarData]) -> ChartResult<Vec<RawLine>> {
    let prices: Vec<f64> = bars.iter().map(|b| b.price(source)).collect();

    let lines = match *kind {
        IndicatorKind::Sma { period } => {
            let mut sma = SimpleMovingAverage::new(period).map_err(ta_error("period"))?;
            vec![RawLine::new("sma", mask(run(&mut sma, prices.iter().copied()), period - 1))]
        }
        IndicatorKind::Ema { period } => {
            let mut ema = ExponentialMovingAverage::new(period).map_err(ta_error("period"))?;
            vec![RawLine::new("ema", mask(run(&mut ema, prices.iter().copied()), period - 1))]
        }
        IndicatorKind::Wma { period } => {
            invalid_period(period)?;
            vec![RawLine::new("wma", wma(&prices, period))]
        }
        IndicatorKind::BollingerBands { period, std_dev } => {
            let mut bb = BollingerBands::new(period, std_dev).map_err(ta_error("std_dev"))?;
            let outputs: Vec<_> = prices.iter().map(|p| bb.next(*p)).collect();
            band_lines(
                outputs.iter().map(|o| (o.upper, o.average, o.lower)),
                period - 1,
            )
        }
        IndicatorKind::KeltnerChannel { period, multiplier } => {
            let mut kc = KeltnerChannel::new(period, multiplier).map_err(ta_error("multiplier"))?;
            let outputs: Vec<_> = bars.iter().map(|b| kc.next(b)).collect();
            band_lines(
                outputs.iter().map(|o| (o.upper, o.average, o.lower)),
                period - 1,
            )
        }
        IndicatorKind::ParabolicSar { acceleration, maximum } => {
            if !(acceleration > 0.0) || maximum < acceleration {
                return Err(ChartError::invalid(
                    "acceleration",
                    format!("need 0 < acceleration <= maximum, got {} / {}", acceleration, maximum),
                ));
            }
            vec![RawLine::new("sar", parabolic_sar(bars, acceleration, maximum))]
        }
        IndicatorKind::PivotPoints { period_secs } => {
            if period_secs <= 0 {
                return Err(ChartError::invalid("period_secs", "must be positive"));
            }
            let [pivot, r1, r2, s1, s2] = pivot_points(bars, period_secs);
            vec![
                RawLine::new("pivot", pivot),
                RawLine::new("r1", r1),
                RawLine::new("r2", r2),
                RawLine::new("s1", s1),
                RawLine::new("s2", s2),
            ]
        }
        IndicatorKind::Vwap { period } => {
            invalid_period(period)?;
            vec![RawLine::new("vwap", vwap(bars, period)?)]
        }
        IndicatorKind::SupportResistance { period, strength, precision } => {
            let precision = precision.unwrap_or(DEFAULT_PRICE_PRECISION);
            let levels = support_resistance(bars, period, strength, precision)?;
            levels
                .iter()
                .map(|level| {
                    // Two points spanning the visible range
                    let mut values = vec![None; bars.len()];
                    if let Some(first) = values.first_mut() {
                        *first = Some(level.price);
                    }
                    if let Some(last) = values.last_mut() {
                        *last = Some(level.price);
                    }
                    let prefix = match level.kind {
                        LevelKind::Support => "support",
                        LevelKind::Resistance => "resistance",
                    };
                    RawLine::new(format!("{} {}", prefix, level.price), values)
                })
                .collect()
        }
        IndicatorKind::Rsi { period } => {
            let mut rsi = RelativeStrengthIndex::new(period).map_err(ta_error("period"))?;
            vec![RawLine::new("rsi", mask(run(&mut rsi, prices.iter().copied()), period))]
        }
        IndicatorKind::Macd { fast, slow, signal } => {
            if fast >= slow {
                return Err(ChartError::invalid("fast", "must be shorter than slow"));
            }
            let mut macd =
                MovingAverageConvergenceDivergence::new(fast, slow, signal).map_err(ta_error("period"))?;
            let outputs: Vec<_> = prices.iter().map(|p| macd.next(*p)).collect();
            let macd_warm_up = slow - 1;
            let signal_warm_up = slow + signal - 2;
            vec![
                RawLine::new("macd", mask(outputs.iter().map(|o| Some(o.macd)).collect(), macd_warm_up)),
                RawLine::new("signal", mask(outputs.iter().map(|o| Some(o.signal)).collect(), signal_warm_up)),
                RawLine::new(
                    "histogram",
                    mask(outputs.iter().map(|o| Some(o.histogram)).collect(), signal_warm_up),
                ),
            ]
        }
        IndicatorKind::Stochastic { k_period, d_period } => {
            let mut fast = FastStochastic::new(k_period).map_err(ta_error("k_period"))?;
            let mut slow = SimpleMovingAverage::new(d_period).map_err(ta_error("d_period"))?;
            let k: Vec<f64> = bars.iter().map(|b| fast.next(b)).collect();
            let d: Vec<Option<f64>> = k.iter().map(|v| Some(slow.next(*v))).collect();
            vec![
                RawLine::new("k", mask(k.into_iter().map(Some).collect(), k_period - 1)),
                RawLine::new("d", mask(d, k_period + d_period - 2)),
            ]
        }
        IndicatorKind::WilliamsR { period } => {
            invalid_period(period)?;
            vec![RawLine::new("wr", williams_r(bars, period))]
        }
        IndicatorKind::Cci { period } => {
            let mut cci = CommodityChannelIndex::new(period).map_err(ta_error("period"))?;
            vec![RawLine::new("cci", mask(run(&mut cci, bars.iter()), period - 1))]
        }
        IndicatorKind::Adx { period } => {
            invalid_period(period)?;
            vec![RawLine::new("adx", adx(bars, period))]
        }
        IndicatorKind::Mfi { period } => {
            let mut mfi = MoneyFlowIndex::new(period).map_err(ta_error("period"))?;
            vec![RawLine::new("mfi", mask(run(&mut mfi, bars.iter()), period))]
        }
    };

    Ok(lines)
}

fn band_lines(outputs: impl Iterator<Item = (f64, f64, f64)>, warm_up: usize) -> Vec<RawLine> {
    let (mut upper, mut middle, mut lower) = (Vec::new(), Vec::new(), Vec::new());
    for (u, m, l) in outputs {
        upper.push(Some(u));
        middle.push(Some(m));
        lower.push(Some(l));
    }
    vec![
        RawLine::new("upper", mask(upper, warm_up)),
        RawLine::new("middle", mask(middle, warm_up)),
        RawLine::new("lower", mask(lower, warm_up)),
    ]
}

/// Drop warm-up and non-finite values, then apply the offset trim.
fn to_points(values: &[Option<f64>], bars: &[BarData], offset: i32) -> Vec<IndicatorPoint> {
    let mut points: Vec<IndicatorPoint> = values
        .iter()
        .zip(bars)
        .filter_map(|(value, bar)| match value {
            Some(v) if v.is_finite() => Some(IndicatorPoint {
                time: bar.time,
                value: *v,
            }),
            _ => None,
        })
        .collect();

    let trim = (offset.unsigned_abs() as usize).min(points.len());
    if offset > 0 {
        points.truncate(points.len() - trim);
    } else if offset < 0 {
        points.drain(..trim);
    }
    points
}

fn line_style(spec: &IndicatorSpec, index: usize, name: &str) -> LineConfig {
    if index == 0 {
        if let Some(style) = &spec.style {
            return style.clone();
        }
    }
    let color = INDICATOR_COLORS[index % INDICATOR_COLORS.len()];
    match name {
        "upper" | "lower" => LineConfig::new(color, 1.0, LineStyle::Dashed),
        n if n.starts_with("support") || n.starts_with("resistance") => LineConfig::dashed(color),
        _ => LineConfig::solid(color),
    }
}

/// Build the series for one spec on the given pane.
pub fn build_series(spec: &IndicatorSpec, bars: &[BarData], pane: usize) -> ChartResult<IndicatorSeries> {
    let raw = compute_lines(&spec.kind, spec.price_source, bars)?;

    let lines = raw
        .iter()
        .enumerate()
        .filter(|(_, line)| spec.is_line_visible(&line.name))
        .map(|(ix, line)| IndicatorLine {
            name: line.name.clone(),
            style: line_style(spec, ix, &line.name),
            points: to_points(&line.values, bars, spec.offset),
        })
        .collect();

    let levels = spec
        .levels
        .clone()
        .unwrap_or_else(|| spec.kind.default_levels())
        .into_iter()
        .map(|value| HorizontalLevel {
            value,
            style: LineConfig::dotted(LEVEL_COLOR),
        })
        .collect();

    Ok(IndicatorSeries {
        spec_id: spec.id.clone(),
        name: spec.kind.name(),
        display: spec.kind.display(),
        pane,
        lines,
        levels,
    })
}

/// Holds the configured indicator set and its last computed output.
#[derive(Debug, Clone)]
pub struct IndicatorPipeline {
    specs: Vec<IndicatorSpec>,
    series: Vec<IndicatorSeries>,
    price_precision: u32,
}

impl Default for IndicatorPipeline {
    fn default() -> Self {
        Self::new()
    }
}

impl IndicatorPipeline {
    pub fn new() -> Self {
        Self {
            specs: Vec::new(),
            series: Vec::new(),
            price_precision: DEFAULT_PRICE_PRECISION,
        }
    }

    /// Display precision used where a spec leaves its tolerance unset
    pub fn with_price_precision(mut self, precision: u32) -> Self {
        self.price_precision = precision;
        self
    }

    pub fn set_specs(&mut self, specs: Vec<IndicatorSpec>) {
        self.specs = specs;
    }

    pub fn specs(&self) -> &[IndicatorSpec] {
        &self.specs
    }

    pub fn series(&self) -> &[IndicatorSeries] {
        &self.series
    }

    pub fn clear(&mut self) {
        self.series.clear();
    }

    /// Full recompute of the enabled set over `bars`.
    ///
    /// Specs with invalid parameters are logged and skipped.
    pub fn compute(&mut self, bars: &[BarData]) -> &[IndicatorSeries] {
        let mut next_pane = 1;
        let mut series = Vec::with_capacity(self.specs.len());

        for spec in self.specs.iter().filter(|s| s.enabled) {
            let pane = match spec.kind.display() {
                DisplayType::Overlay => 0,
                DisplayType::Oscillator => next_pane,
            };
            let resolved = IndicatorSpec {
                kind: spec.kind.with_default_precision(self.price_precision),
                ..spec.clone()
            };
            match build_series(&resolved, bars, pane) {
                Ok(s) => {
                    if s.display == DisplayType::Oscillator {
                        next_pane += 1;
                    }
                    series.push(s);
                }
                Err(e) => tracing::warn!(id = %spec.id, error = %e, "indicator skipped"),
            }
        }

        tracing::debug!(count = series.len(), bars = bars.len(), "indicators computed");
        self.series = series;
        &self.series
    }
}
