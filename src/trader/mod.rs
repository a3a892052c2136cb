//! Trader module - market data types and ambient services.
//!
//! - **constant**: Direction, Interval, PriceSource
//! - **object**: TickData, BarData, PositionData, OrderData, HistoryRequest
//! - **bar_generator**: Tick to candle aggregation
//! - **datafeed**: History and streaming price source traits
//! - **setting**: Global settings management
//! - **utility**: Rounding and file helpers
//! - **logger**: Logging utilities

pub mod bar_generator;
pub mod constant;
pub mod datafeed;
pub mod logger;
pub mod object;
pub mod setting;
pub mod utility;

// Re-exports for convenience
pub use bar_generator::{aggregate_ticks, BarGenerator, TickOutcome};
pub use constant::{Direction, Interval, PriceSource};
pub use datafeed::{BaseDatafeed, BasePriceFeed, EmptyDatafeed, ManualPriceFeed, MemoryDatafeed};
pub use logger::{init_logger, CRITICAL, DEBUG, ERROR, INFO, WARNING};
pub use object::{BarData, HistoryRequest, OrderData, PositionData, TickData};
pub use setting::{EngineSettings, SettingValue, Settings, SETTINGS};
pub use utility::{ceil_to, floor_to, get_file_path, get_folder_path, load_json, precision_step, round_to, save_json, TEMP_DIR};
