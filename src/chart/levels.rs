//! Automatic support and resistance detection from swing points.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ChartError, ChartResult};
use crate::trader::object::BarData;
use crate::trader::utility::{precision_step, round_to};

/// Finest tolerance precision; beyond it bucket indices overflow for ordinary prices.
pub const MAX_PRECISION: u32 = 12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LevelKind {
    Support,
    Resistance,
}

/// A horizontal price level touched by several swing points
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceLevel {
    pub price: f64,
    pub touches: usize,
    pub kind: LevelKind,
}

/// Swing highs and lows over a symmetric window of `half` bars each side.
///
/// A bar is a swing high when its high is the maximum of the window, and a
/// swing low when its low is the minimum.
pub fn find_swing_points(bars: &[BarData], half: usize) -> (Vec<f64>, Vec<f64>) {
    let mut highs = Vec::new();
    let mut lows = Vec::new();
    let half = half.max(1);

    if bars.len() < 2 * half + 1 {
        return (highs, lows);
    }

    for i in half..bars.len() - half {
        let window = &bars[i - half..=i + half];
        let high = bars[i].high_price;
        let low = bars[i].low_price;

        if window.iter().all(|b| b.high_price <= high) {
            highs.push(high);
        }
        if window.iter().all(|b| b.low_price >= low) {
            lows.push(low);
        }
    }

    (highs, lows)
}

/// Detect levels whose tolerance bucket collects at least `strength` swing touches.
///
/// The tolerance bucket is `10 × 10^-precision`. Levels above the last close
/// are resistance, the rest support. Sorted by price ascending.
pub fn support_resistance(
    bars: &[BarData],
    period: usize,
    strength: usize,
    precision: u32,
) -> ChartResult<Vec<PriceLevel>> {
    if period < 2 {
        return Err(ChartError::invalid("period", "must be at least 2"));
    }
    if strength == 0 {
        return Err(ChartError::invalid("strength", "must be at least 1"));
    }
    let step = precision_step(precision)
        .filter(|_| precision <= MAX_PRECISION)
        .ok_or_else(|| ChartError::invalid("precision", format!("must be at most {}, got {}", MAX_PRECISION, precision)))?;

    let Some(last) = bars.last() else {
        return Ok(Vec::new());
    };

    let tolerance = 10.0 * step;
    let (highs, lows) = find_swing_points(bars, period / 2);

    // Bucket index -> touch count
    let mut buckets: BTreeMap<i64, usize> = BTreeMap::new();
    for price in highs.iter().chain(lows.iter()) {
        let bucket = (round_to(*price, tolerance) / tolerance).round() as i64;
        *buckets.entry(bucket).or_default() += 1;
    }

    let levels = buckets
        .into_iter()
        .filter(|(_, touches)| *touches >= strength)
        .map(|(bucket, touches)| {
            let price = round_to(bucket as f64 * tolerance, tolerance);
            let kind = if price > last.close_price {
                LevelKind::Resistance
            } else {
                LevelKind::Support
            };
            PriceLevel { price, touches, kind }
        })
        .collect();

    Ok(levels)
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Oscillates between ~1.1000 and ~1.1100 with small jitter at the extremes.
    fn ranging_bars() -> Vec<BarData> {
        let highs = [1.1000, 1.1040, 1.1080, 1.1101, 1.1060, 1.1020, 1.1002, 1.1030, 1.1070, 1.1098, 1.1050, 1.1010, 1.0999, 1.1040, 1.1080, 1.1102, 1.1060];
        highs
            .iter()
            .enumerate()
            .map(|(i, &h)| {
                let low = h - 0.0010;
                BarData::new("EURUSD", i as i64 * 60, low + 0.0005, h, low, low + 0.0005)
            })
            .collect()
    }

    #[test]
    fn test_swing_points() {
        let (highs, lows) = find_swing_points(&ranging_bars(), 2);
        assert_eq!(highs, vec![1.1101, 1.1098]);
        assert_eq!(lows.len(), 2);
    }

    #[test]
    fn test_levels_group_by_tolerance() {
        let levels = support_resistance(&ranging_bars(), 4, 2, 4).unwrap();
        assert_eq!(levels.len(), 2);

        let support = &levels[0];
        assert_eq!(support.kind, LevelKind::Support);
        assert!((support.price - 1.099).abs() < 1e-9);
        assert_eq!(support.touches, 2);

        let resistance = &levels[1];
        assert_eq!(resistance.kind, LevelKind::Resistance);
        assert!((resistance.price - 1.110).abs() < 1e-9);
    }

    #[test]
    fn test_short_series_and_bad_params() {
        let bars = ranging_bars();
        assert!(support_resistance(&bars[..3], 4, 2, 4).unwrap().is_empty());
        assert!(support_resistance(&[], 4, 2, 4).unwrap().is_empty());
        assert!(support_resistance(&bars, 1, 2, 4).is_err());
        assert!(support_resistance(&bars, 4, 0, 4).is_err());
        assert!(support_resistance(&bars, 4, 2, MAX_PRECISION).is_ok());
        assert!(support_resistance(&bars, 4, 2, 30).is_err());
        assert!(support_resistance(&[], 4, 2, 30).is_err());
    }
}
