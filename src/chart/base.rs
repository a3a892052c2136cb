//! Base constants and style types for the chart module.

use serde::{Deserialize, Serialize};

// Price line colors
pub const BID_COLOR: &str = "#2962ff";
pub const ASK_COLOR: &str = "#ff6d00";

// Trade overlay colors
pub const ENTRY_COLOR: &str = "#9e9e9e";
pub const PROFIT_COLOR: &str = "#26a69a";
pub const LOSS_COLOR: &str = "#ef5350";
pub const ORDER_COLOR: &str = "#ffb300";
pub const ZONE_OPACITY: f32 = 0.12;

// Drawing colors
pub const DRAWING_COLOR: &str = "#00cccc";

// Oscillator reference level color
pub const LEVEL_COLOR: &str = "#787b86";

/// Indicator palette cycled by line position
pub const INDICATOR_COLORS: [&str; 6] = ["#f7c948", "#42a5f5", "#ab47bc", "#66bb6a", "#ff7043", "#8d6e63"];

/// Line style for indicators and overlay lines
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LineStyle {
    #[default]
    Solid,
    Dashed,
    Dotted,
}

/// Visual style of a line
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LineConfig {
    pub color: String,
    #[serde(default = "default_width")]
    pub width: f32,
    #[serde(default)]
    pub style: LineStyle,
}

fn default_width() -> f32 {
    1.5
}

impl LineConfig {
    pub fn new(color: impl Into<String>, width: f32, style: LineStyle) -> Self {
        Self {
            color: color.into(),
            width,
            style,
        }
    }

    pub fn solid(color: impl Into<String>) -> Self {
        Self::new(color, default_width(), LineStyle::Solid)
    }

    pub fn dashed(color: impl Into<String>) -> Self {
        Self::new(color, 1.0, LineStyle::Dashed)
    }

    pub fn dotted(color: impl Into<String>) -> Self {
        Self::new(color, 1.0, LineStyle::Dotted)
    }
}

impl Default for LineConfig {
    fn default() -> Self {
        Self::solid(INDICATOR_COLORS[0])
    }
}

/// Format price with appropriate precision
pub fn format_price(price: f64, decimals: usize) -> String {
    format!("{:.prec$}", price, prec = decimals)
}

/// Format quantity with units (K, M, B)
pub fn format_volume(volume: f64) -> String {
    if volume >= 1_000_000_000.0 {
        format!("{:.2}B", volume / 1_000_000_000.0)
    } else if volume >= 1_000_000.0 {
        format!("{:.2}M", volume / 1_000_000.0)
    } else if volume >= 1_000.0 {
        format!("{:.2}K", volume / 1_000.0)
    } else {
        format!("{}", volume)
    }
}
