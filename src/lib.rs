//! Chart Engine - real-time market visualization and analysis core
//!
//! This crate provides the engine behind a trading dashboard chart:
//!
//! - Tick to OHLCV candle aggregation at selectable timeframes
//! - Chart representations (candles, Heikin-Ashi, Renko, Point-and-Figure, line)
//! - Overlay and oscillator indicators
//! - Rule-based strategy signals
//! - Position, order, price-line and drawing overlays reconciled against a render sink
//!
//! # Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use chart_engine::{ChartEngine, EngineSettings, Interval, ManualPriceFeed, MemoryDatafeed};
//!
//! #[tokio::main]
//! async fn main() {
//!     let datafeed = Arc::new(MemoryDatafeed::new());
//!     let price_feed = Arc::new(ManualPriceFeed::new());
//!     let mut engine = ChartEngine::new("EURUSD", Interval::Minute, datafeed, price_feed, EngineSettings::default());
//!     let _ = engine.load(0).await;
//! }
//! ```

pub mod chart;
pub mod engine;
pub mod error;
pub mod strategy;
pub mod trader;

// Re-export commonly used types
pub use chart::{
    ChartRepresentation, ChartType, DisplayPreferences, DrawingTool, IndicatorKind, IndicatorSeries, IndicatorSpec,
    OverlayPrimitive, RenderOp, RenderSink,
};
pub use engine::{ChartEngine, LoadState, LoadTicket};
pub use error::{ChartError, ChartResult};
pub use strategy::{Signal, SignalType, StrategySpec};
pub use trader::{
    BarData, BaseDatafeed, BasePriceFeed, Direction, EngineSettings, Interval, ManualPriceFeed, MemoryDatafeed,
    OrderData, PositionData, PriceSource, TickData,
};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
