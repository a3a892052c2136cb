//! Chart module: candle series, chart-type transforms, indicators and overlays.
//!
//! This module provides:
//! - `BarManager` - Ordered candle series with time indexing
//! - `transform` - Candles, Heikin-Ashi, Renko, Point-and-Figure and line representations
//! - `IndicatorPipeline` - Overlay and oscillator indicators over a series
//! - `OverlayReconciler` - Position, order, price-line and drawing annotations
//! - `DrawingManager` - Click-driven drawing tools
//!
//! # Example
//!
//! ```ignore
//! use chart_engine::chart::{transform, ChartType};
//!
//! let renko = transform(&bars, ChartType::Renko { brick_size: 0.0005 })?;
//! ```

pub mod base;
pub mod drawing;
pub mod indicator;
pub mod levels;
pub mod manager;
pub mod overlay;
pub mod transform;

pub use base::*;
pub use drawing::{AnchorPoint, CoordinateMapper, Drawing, DrawingManager, DrawingTool, LinearMapper, FIB_RATIOS};
pub use indicator::{
    DisplayType, IndicatorKind, IndicatorLine, IndicatorPipeline, IndicatorPoint, IndicatorSeries, IndicatorSpec,
};
pub use levels::{LevelKind, PriceLevel};
pub use manager::{BarManager, BarUpdate};
pub use overlay::{
    build_overlays, dispatch, DisplayPreferences, MemorySink, OverlayPrimitive, OverlayReconciler, OverlaySet,
    RenderOp, RenderSink,
};
pub use transform::{transform, ChartRepresentation, ChartType};
