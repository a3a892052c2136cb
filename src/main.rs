//! Chart Engine - demo entry point
//!
//! Seeds an in-memory history with a random walk, then streams simulated
//! ticks through the engine and logs what the render sink receives.

use std::collections::HashMap;
use std::error::Error;
use std::path::Path;
use std::sync::Arc;

use chrono::{TimeZone, Utc};
use rand::Rng;
use tracing::{info, warn};

use chart_engine::chart::{format_price, format_volume, DrawingTool, MemorySink, OverlaySet};
use chart_engine::strategy::{Comparison, Condition, Operand, RuleSpec};
use chart_engine::trader::{get_file_path, init_logger, load_json, save_json, SETTINGS};
use chart_engine::{
    BarData, ChartEngine, ChartType, Direction, DisplayPreferences, EngineSettings, IndicatorKind, IndicatorSpec,
    Interval, ManualPriceFeed, MemoryDatafeed, PositionData, PriceSource, StrategySpec, TickData,
};

const SYMBOL: &str = "EURUSD";
const TICK_COUNT: usize = 120;
const PREFERENCES_FILENAME: &str = "chart_preferences.json";

/// Random-walk candles ending at `end`.
fn random_history(interval: Interval, count: i64, end: i64, start_price: f64) -> Vec<BarData> {
    let mut rng = rand::rng();
    let step = interval.seconds();
    let first = interval.bucket_start(end) - (count - 1) * step;
    let mut price = start_price;

    (0..count)
        .map(|i| {
            let open = price;
            let close = open + rng.random_range(-0.0008..0.0008);
            let high = open.max(close) + rng.random_range(0.0..0.0004);
            let low = open.min(close) - rng.random_range(0.0..0.0004);
            price = close;
            BarData::new(SYMBOL, first + i * step, open, high, low, close)
                .with_volume(rng.random_range(100.0..1000.0))
        })
        .collect()
}

fn load_preferences(path: &Path) -> DisplayPreferences {
    let stored = load_json(path);
    serde_json::to_value(stored)
        .and_then(serde_json::from_value)
        .unwrap_or_default()
}

fn save_preferences(path: &Path, prefs: &DisplayPreferences) {
    let Ok(serde_json::Value::Object(map)) = serde_json::to_value(prefs) else {
        return;
    };
    let data: HashMap<String, serde_json::Value> = map.into_iter().collect();
    if let Err(e) = save_json(path, &data) {
        warn!(path = %path.display(), error = %e, "failed to save preferences");
    }
}

fn summarize(primitives: &OverlaySet) -> String {
    primitives.keys().cloned().collect::<Vec<_>>().join(", ")
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn Error>> {
    init_logger();
    info!("chart engine {} starting", chart_engine::VERSION);

    let settings = EngineSettings::from_settings(&SETTINGS);
    let start = Utc::now().timestamp();

    let datafeed = MemoryDatafeed::new();
    let history = random_history(Interval::Minute, settings.history_count as i64, start - 60, 1.1000);
    let last_close = history.last().map(|b| b.close_price).unwrap_or(1.1);
    datafeed.insert(SYMBOL, Interval::Minute, history);

    let precision = settings.price_precision as usize;
    let prefs_path = get_file_path(PREFERENCES_FILENAME);
    let prefs = load_preferences(&prefs_path);
    let price_feed = ManualPriceFeed::new();
    let mut engine = ChartEngine::new(
        SYMBOL,
        Interval::Minute,
        Arc::new(datafeed),
        Arc::new(price_feed.clone()),
        settings,
    )
    .with_preferences(
        prefs,
        Some(Box::new(move |p: &DisplayPreferences| save_preferences(&prefs_path, p))),
    );

    engine.set_indicators(vec![
        IndicatorSpec::new("sma20", IndicatorKind::Sma { period: 20 }),
        IndicatorSpec::new("bb", IndicatorKind::BollingerBands { period: 20, std_dev: 2.0 }),
        IndicatorSpec::new("rsi", IndicatorKind::Rsi { period: 14 }),
        IndicatorSpec::new("macd", IndicatorKind::Macd { fast: 12, slow: 26, signal: 9 }),
    ]);

    let crossover = Condition {
        left: Operand::Price { source: PriceSource::Close },
        op: Comparison::CrossesAbove,
        right: Operand::Indicator {
            kind: IndicatorKind::Sma { period: 20 },
            line: None,
        },
    };
    engine.set_strategies(
        vec![StrategySpec::new("sma_cross", Direction::Long, vec![RuleSpec::required(crossover)])],
        start * 1000,
    );

    if let Err(e) = engine.load(start * 1000).await {
        warn!(error = %e, "initial load failed, retrying");
        engine.retry(start * 1000).await?;
    }
    info!(
        bars = engine.bars().len(),
        subscribed = price_feed.is_subscribed(SYMBOL),
        signals = engine.signals().len(),
        "history loaded"
    );

    let mut position = PositionData::new(SYMBOL, Direction::Long, last_close, 1.0);
    position.take_profit = Some(last_close + 0.0020);
    position.stop_loss = Some(last_close - 0.0015);
    engine.set_positions(vec![position]);

    // Mark the session mid-price with a horizontal line
    if let Some(mapper) = engine.mapper(1200.0, 600.0, None) {
        engine.set_drawing_tool(DrawingTool::HorizontalLine);
        engine.handle_drawing_click(600.0, 300.0, &mapper);
    }

    let mut sink = MemorySink::default();
    engine.flush(&mut sink);

    let mut rng = rand::rng();
    let mut mid = last_close;
    let mut ticker = tokio::time::interval(std::time::Duration::from_millis(50));

    for i in 0..TICK_COUNT {
        ticker.tick().await;

        // Simulated clock: 2 seconds of market time per tick
        let ts = start + i as i64 * 2;
        let now_ms = ts * 1000;
        mid += rng.random_range(-0.0002..0.0002);
        let spread = 0.0001;
        let Some(datetime) = Utc.timestamp_opt(ts, 0).single() else {
            continue;
        };
        let tick = TickData::new(SYMBOL, datetime, mid - spread / 2.0, mid + spread / 2.0);

        engine.on_tick(&tick, now_ms);
        engine.on_timer(now_ms);
        engine.flush(&mut sink);
    }

    engine.set_chart_type(ChartType::HeikinAshi)?;
    if let Some(last) = engine.bars().last() {
        info!(
            close = %format_price(last.close_price, precision),
            volume = %format_volume(last.volume),
            "last candle"
        );
    }
    info!(
        bars = engine.bars().len(),
        representation = engine.representation().bars.len(),
        indicators = engine.indicator_series().len(),
        signals = engine.signals().len(),
        ops = sink.applied,
        "stream finished"
    );
    info!("rendered overlays: {}", summarize(&sink.primitives));

    engine.shutdown();
    engine.flush(&mut sink);
    info!(remaining = sink.primitives.len(), "chart engine stopped");
    Ok(())
}
