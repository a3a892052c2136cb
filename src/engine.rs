//! Chart engine orchestration.
//!
//! Wires tick -> candle -> chart transform -> indicators/signals -> overlays
//! for one active (symbol, interval). All methods take `&mut self`; the bulk
//! history load is the only suspension point and is guarded by a generation
//! counter so a stale load can never overwrite a newer selection.

use std::sync::Arc;

use crate::chart::drawing::{CoordinateMapper, Drawing, DrawingManager, DrawingTool, LinearMapper};
use crate::chart::indicator::{IndicatorPipeline, IndicatorSeries, IndicatorSpec};
use crate::chart::overlay::{build_overlays, dispatch, DisplayPreferences, OverlayReconciler, RenderOp, RenderSink};
use crate::chart::transform::{transform, ChartRepresentation, ChartType};
use crate::error::{ChartError, ChartResult};
use crate::strategy::base::{Signal, StrategySpec};
use crate::strategy::engine::SignalEngine;
use crate::trader::bar_generator::{BarGenerator, TickOutcome};
use crate::trader::constant::Interval;
use crate::trader::datafeed::{BaseDatafeed, BasePriceFeed};
use crate::trader::object::{BarData, HistoryRequest, OrderData, PositionData, TickData};
use crate::trader::setting::EngineSettings;

/// Called with the new preferences after every change
pub type PreferencesCallback = Box<dyn Fn(&DisplayPreferences) + Send + Sync>;

/// History load lifecycle of the active selection
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LoadState {
    Idle,
    Loading,
    Ready,
    Failed(String),
}

/// Handle for one in-flight history load
#[derive(Debug, Clone)]
pub struct LoadTicket {
    pub generation: u64,
    pub request: HistoryRequest,
}

pub struct ChartEngine {
    datafeed: Arc<dyn BaseDatafeed>,
    price_feed: Arc<dyn BasePriceFeed + Send + Sync>,
    settings: EngineSettings,

    generator: BarGenerator,
    load_state: LoadState,
    generation: u64,
    subscribed: Option<String>,

    chart_type: ChartType,
    representation: ChartRepresentation,
    indicators: IndicatorPipeline,
    signals: SignalEngine,

    positions: Vec<PositionData>,
    orders: Vec<OrderData>,
    last_tick: Option<TickData>,
    drawings: DrawingManager,
    prefs: DisplayPreferences,
    on_prefs_changed: Option<PreferencesCallback>,

    reconciler: OverlayReconciler,
    pending_ops: Vec<RenderOp>,
}

impl ChartEngine {
    pub fn new(
        symbol: impl Into<String>,
        interval: Interval,
        datafeed: Arc<dyn BaseDatafeed>,
        price_feed: Arc<dyn BasePriceFeed + Send + Sync>,
        settings: EngineSettings,
    ) -> Self {
        let chart_type = ChartType::Candles;
        Self {
            datafeed,
            price_feed,
            generator: BarGenerator::new(symbol, interval, settings.max_candles, settings.commit_interval_ms),
            signals: SignalEngine::new(settings.signal_interval_secs),
            indicators: IndicatorPipeline::new().with_price_precision(settings.price_precision),
            settings,
            load_state: LoadState::Idle,
            generation: 0,
            subscribed: None,
            chart_type,
            representation: ChartRepresentation {
                chart_type,
                bars: Vec::new(),
            },
            positions: Vec::new(),
            orders: Vec::new(),
            last_tick: None,
            drawings: DrawingManager::new(),
            prefs: DisplayPreferences::default(),
            on_prefs_changed: None,
            reconciler: OverlayReconciler::new(),
            pending_ops: Vec::new(),
        }
    }

    pub fn with_preferences(mut self, prefs: DisplayPreferences, callback: Option<PreferencesCallback>) -> Self {
        self.prefs = prefs;
        self.on_prefs_changed = callback;
        self
    }

    pub fn symbol(&self) -> &str {
        self.generator.symbol()
    }

    pub fn interval(&self) -> Interval {
        self.generator.interval()
    }

    pub fn settings(&self) -> &EngineSettings {
        &self.settings
    }

    pub fn load_state(&self) -> &LoadState {
        &self.load_state
    }

    pub fn is_ready(&self) -> bool {
        self.load_state == LoadState::Ready
    }

    /// Raw candle series
    pub fn bars(&self) -> &[BarData] {
        self.generator.bars()
    }

    /// Raw candle starting at `time`.
    pub fn bar_at(&self, time: i64) -> Option<&BarData> {
        let manager = self.generator.manager();
        manager.get_index(time).and_then(|ix| manager.get_bar(ix))
    }

    /// Screen mapping of the raw series onto a `width` x `height` area.
    ///
    /// `window` restricts the price range to a candle index range.
    pub fn mapper(&self, width: f64, height: f64, window: Option<(usize, usize)>) -> Option<LinearMapper> {
        let manager = self.generator.manager();
        let time_range = manager.get_time_range()?;
        let (min_ix, max_ix) = window.unzip();
        let price_range = manager.get_price_range(min_ix, max_ix);
        Some(LinearMapper::new(width, height, time_range, price_range))
    }

    pub fn representation(&self) -> &ChartRepresentation {
        &self.representation
    }

    pub fn indicator_series(&self) -> &[IndicatorSeries] {
        self.indicators.series()
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.signals.signals()
    }

    pub fn preferences(&self) -> &DisplayPreferences {
        &self.prefs
    }

    pub fn drawings(&self) -> &[Drawing] {
        self.drawings.drawings()
    }

    // ==================== Loading ====================

    /// Start switching to `(symbol, interval)`.
    ///
    /// The previous symbol is unsubscribed, its overlays and drawings torn
    /// down and all derived output cleared before any state for the new
    /// selection exists.
    pub fn begin_switch(&mut self, symbol: &str, interval: Interval) -> LoadTicket {
        if let Some(previous) = self.subscribed.take() {
            self.price_feed.unsubscribe(&previous);
        }
        let teardown = self.reconciler.teardown();
        self.pending_ops.extend(teardown);
        self.drawings = DrawingManager::new();

        self.indicators.clear();
        self.signals.clear();
        self.representation = ChartRepresentation {
            chart_type: self.chart_type,
            bars: Vec::new(),
        };
        self.last_tick = None;

        self.generator = BarGenerator::new(
            symbol,
            interval,
            self.settings.max_candles,
            self.settings.commit_interval_ms,
        );
        self.generation += 1;
        self.load_state = LoadState::Loading;

        self.price_feed.subscribe(symbol);
        self.subscribed = Some(symbol.to_string());

        tracing::info!(symbol, %interval, generation = self.generation, "chart switch started");
        LoadTicket {
            generation: self.generation,
            request: HistoryRequest::new(symbol, interval, self.settings.history_count),
        }
    }

    /// Finish a load. Returns `Ok(false)` when the ticket is stale.
    pub fn complete_load(
        &mut self,
        ticket: LoadTicket,
        result: Result<Vec<BarData>, String>,
        now_ms: i64,
    ) -> ChartResult<bool> {
        if ticket.generation != self.generation {
            tracing::debug!(
                stale = ticket.generation,
                current = self.generation,
                "discarding stale history load"
            );
            return Ok(false);
        }

        match result {
            Ok(bars) => {
                self.generator.load_history(bars);
                self.load_state = LoadState::Ready;
                self.rebuild_representation();
                self.indicators.compute(&self.representation.bars);
                if self.signals.has_active() {
                    self.signals.evaluate(self.generator.bars(), now_ms);
                }
                self.refresh_overlays();
                tracing::info!(
                    symbol = %ticket.request.symbol,
                    interval = %ticket.request.interval,
                    bars = self.generator.bars().len(),
                    "chart ready"
                );
                Ok(true)
            }
            Err(message) => {
                tracing::error!(symbol = %ticket.request.symbol, error = %message, "history load failed");
                self.load_state = LoadState::Failed(message.clone());
                Err(ChartError::HistoryLoad {
                    symbol: ticket.request.symbol,
                    interval: ticket.request.interval.to_string(),
                    message,
                })
            }
        }
    }

    /// Switch and load history from the datafeed.
    pub async fn switch(&mut self, symbol: &str, interval: Interval, now_ms: i64) -> ChartResult<()> {
        let ticket = self.begin_switch(symbol, interval);
        let datafeed = Arc::clone(&self.datafeed);
        let result = datafeed.query_bar_history(ticket.request.clone()).await;
        self.complete_load(ticket, result, now_ms).map(|_| ())
    }

    /// Load history for the current selection.
    pub async fn load(&mut self, now_ms: i64) -> ChartResult<()> {
        let symbol = self.symbol().to_string();
        self.switch(&symbol, self.interval(), now_ms).await
    }

    /// Manual retry after a failed load.
    pub async fn retry(&mut self, now_ms: i64) -> ChartResult<()> {
        tracing::info!(symbol = %self.symbol(), "retrying history load");
        self.load(now_ms).await
    }

    pub async fn set_interval(&mut self, interval: Interval, now_ms: i64) -> ChartResult<()> {
        let symbol = self.symbol().to_string();
        self.switch(&symbol, interval, now_ms).await
    }

    // ==================== Live path ====================

    /// Feed one tick. Ticks are dropped while no series is ready.
    pub fn on_tick(&mut self, tick: &TickData, now_ms: i64) -> TickOutcome {
        if !self.is_ready() || tick.symbol != self.symbol() {
            return TickOutcome::Dropped;
        }

        if !self.price_feed.is_market_open(&tick.symbol) {
            tracing::trace!(symbol = %tick.symbol, "market closed, tick ignored");
            return TickOutcome::Dropped;
        }

        let outcome = self.generator.update_tick(tick);
        self.last_tick = Some(tick.clone());

        if self.generator.take_commit(now_ms) {
            self.propagate_candles();
        }

        // Price lines follow every tick
        self.refresh_overlays();
        outcome
    }

    /// Periodic hook: flushes throttled candle updates and recomputes signals when due.
    pub fn on_timer(&mut self, now_ms: i64) {
        if !self.is_ready() {
            return;
        }
        if self.generator.take_commit(now_ms) {
            self.propagate_candles();
        }
        self.signals.on_timer(self.generator.bars(), now_ms);
    }

    fn propagate_candles(&mut self) {
        let updated = match self.generator.get_current_bar() {
            Some(bar) => self.representation.update_last(bar),
            None => false,
        };
        // Eviction past the retention cap also needs a rebuild
        if !updated || self.representation.bars.len() != self.generator.bars().len() {
            self.rebuild_representation();
        }
        self.indicators.compute(&self.representation.bars);
    }

    fn rebuild_representation(&mut self) {
        self.representation = match transform(self.generator.bars(), self.chart_type) {
            Ok(rep) => rep,
            Err(e) => {
                tracing::warn!(error = %e, chart_type = self.chart_type.name(), "transform failed, showing candles");
                ChartRepresentation {
                    chart_type: ChartType::Candles,
                    bars: self.generator.bars().to_vec(),
                }
            }
        };
    }

    // ==================== Configuration ====================

    /// Change the chart representation and recompute indicators over it.
    /// Invalid parameters leave the current one.
    pub fn set_chart_type(&mut self, chart_type: ChartType) -> ChartResult<()> {
        let representation = transform(self.generator.bars(), chart_type)?;
        self.chart_type = chart_type;
        self.representation = representation;
        self.indicators.compute(&self.representation.bars);
        Ok(())
    }

    pub fn chart_type(&self) -> ChartType {
        self.chart_type
    }

    pub fn set_indicators(&mut self, specs: Vec<IndicatorSpec>) {
        self.indicators.set_specs(specs);
        self.indicators.compute(&self.representation.bars);
    }

    pub fn set_indicators_json(&mut self, value: &serde_json::Value) {
        self.set_indicators(IndicatorSpec::parse_list(value));
    }

    pub fn set_strategies(&mut self, strategies: Vec<StrategySpec>, now_ms: i64) {
        self.signals.set_strategies(strategies);
        if self.is_ready() && self.signals.has_active() {
            self.signals.evaluate(self.generator.bars(), now_ms);
        }
    }

    pub fn set_strategies_json(&mut self, value: &serde_json::Value, now_ms: i64) {
        self.set_strategies(StrategySpec::parse_list(value), now_ms);
    }

    pub fn set_positions(&mut self, positions: Vec<PositionData>) {
        self.positions = positions;
        self.refresh_overlays();
    }

    pub fn set_orders(&mut self, orders: Vec<OrderData>) {
        self.orders = orders;
        self.refresh_overlays();
    }

    /// Apply a change to the display preferences and persist it.
    pub fn update_preferences(&mut self, change: impl FnOnce(&mut DisplayPreferences)) {
        let before = self.prefs;
        change(&mut self.prefs);
        if self.prefs == before {
            return;
        }
        if let Some(callback) = &self.on_prefs_changed {
            callback(&self.prefs);
        }
        self.refresh_overlays();
    }

    // ==================== Drawings ====================

    pub fn set_drawing_tool(&mut self, tool: DrawingTool) {
        self.drawings.set_tool(tool);
    }

    pub fn handle_drawing_click(&mut self, x: f64, y: f64, mapper: &dyn CoordinateMapper) -> bool {
        let committed = self.drawings.handle_click(x, y, mapper).is_some();
        if committed {
            self.refresh_overlays();
        }
        committed
    }

    pub fn remove_drawing(&mut self, id: &str) -> bool {
        let removed = self.drawings.remove(id);
        if removed {
            self.refresh_overlays();
        }
        removed
    }

    pub fn clear_drawings(&mut self) {
        self.drawings.clear();
        self.refresh_overlays();
    }

    // ==================== Rendering ====================

    fn refresh_overlays(&mut self) {
        let desired = build_overlays(
            self.generator.symbol(),
            &self.positions,
            &self.orders,
            self.last_tick.as_ref(),
            self.drawings.drawings(),
            &self.prefs,
        );
        let ops = self.reconciler.reconcile(desired);
        self.pending_ops.extend(ops);
    }

    /// Drain the render operations produced since the last call.
    pub fn take_render_ops(&mut self) -> Vec<RenderOp> {
        std::mem::take(&mut self.pending_ops)
    }

    /// Apply pending render operations to `sink`.
    pub fn flush(&mut self, sink: &mut dyn RenderSink) -> usize {
        let ops = self.take_render_ops();
        dispatch(sink, &ops)
    }

    pub fn rendered_overlay_count(&self) -> usize {
        self.reconciler.rendered_count()
    }

    /// Unsubscribe and tear everything down.
    pub fn shutdown(&mut self) {
        if let Some(symbol) = self.subscribed.take() {
            self.price_feed.unsubscribe(&symbol);
        }
        let teardown = self.reconciler.teardown();
        self.pending_ops.extend(teardown);
        self.indicators.clear();
        self.signals.clear();
        self.load_state = LoadState::Idle;
        tracing::info!(symbol = %self.symbol(), "chart engine shut down");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::indicator::IndicatorKind;
    use crate::chart::overlay::MemorySink;
    use crate::chart::transform::heikin_ashi;
    use crate::strategy::base::{Comparison, Condition, Operand, RuleSpec};
    use crate::trader::constant::{Direction, PriceSource};
    use crate::trader::datafeed::{EmptyDatafeed, ManualPriceFeed, MemoryDatafeed};
    use chrono::{TimeZone, Utc};
    use std::sync::Mutex;

    const BASE: i64 = 1_700_000_000 - 1_700_000_000 % 3600;

    fn history(interval: Interval, count: i64) -> Vec<BarData> {
        let step = interval.seconds();
        (0..count)
            .map(|i| {
                let price = 1.1 + (i as f64 * 0.2).sin() * 0.01;
                BarData::new("EURUSD", BASE + i * step, price, price + 0.001, price - 0.001, price)
            })
            .collect()
    }

    fn create_engine() -> (ChartEngine, ManualPriceFeed) {
        create_engine_with(EngineSettings::default())
    }

    fn create_engine_with(settings: EngineSettings) -> (ChartEngine, ManualPriceFeed) {
        let datafeed = MemoryDatafeed::new();
        datafeed.insert("EURUSD", Interval::Minute5, history(Interval::Minute5, 60));
        datafeed.insert("EURUSD", Interval::Hour, history(Interval::Hour, 40));
        let feed = ManualPriceFeed::new();
        let engine = ChartEngine::new(
            "EURUSD",
            Interval::Minute5,
            Arc::new(datafeed),
            Arc::new(feed.clone()),
            settings,
        );
        (engine, feed)
    }

    fn tick_at(secs: i64, mid: f64) -> TickData {
        TickData::new("EURUSD", Utc.timestamp_opt(secs, 0).unwrap(), mid - 0.0001, mid + 0.0001)
    }

    #[tokio::test]
    async fn test_interval_switch_recomputes_indicators() {
        let (mut engine, _) = create_engine();
        engine.set_indicators(vec![IndicatorSpec::new("sma", IndicatorKind::Sma { period: 20 })]);
        engine.load(0).await.unwrap();

        let five_min = engine.indicator_series()[0].line("sma").unwrap().points.clone();
        assert_eq!(five_min.len(), 41);
        assert_eq!(five_min[0].time, BASE + 19 * 300);

        engine.set_interval(Interval::Hour, 0).await.unwrap();
        assert_eq!(engine.interval(), Interval::Hour);
        let hourly = &engine.indicator_series()[0].line("sma").unwrap().points;
        assert_eq!(hourly.len(), 21);
        assert_eq!(hourly[0].time, BASE + 19 * 3600);
        assert_eq!(engine.representation().bars.len(), 40);
    }

    #[test]
    fn test_stale_load_discarded() {
        let (mut engine, feed) = create_engine();
        let first = engine.begin_switch("EURUSD", Interval::Minute5);
        let second = engine.begin_switch("GBPUSD", Interval::Minute5);

        assert!(!feed.is_subscribed("EURUSD"));
        assert!(feed.is_subscribed("GBPUSD"));

        assert!(!engine.complete_load(first, Ok(history(Interval::Minute5, 10)), 0).unwrap());
        assert_eq!(engine.load_state(), &LoadState::Loading);
        assert!(engine.bars().is_empty());

        let gbp: Vec<BarData> = history(Interval::Minute5, 5)
            .into_iter()
            .map(|mut b| {
                b.symbol = "GBPUSD".to_string();
                b
            })
            .collect();
        assert!(engine.complete_load(second, Ok(gbp), 0).unwrap());
        assert_eq!(engine.symbol(), "GBPUSD");
        assert_eq!(engine.bars().len(), 5);
    }

    #[test]
    fn test_ticks_dropped_while_loading() {
        let (mut engine, _) = create_engine();
        let ticket = engine.begin_switch("EURUSD", Interval::Minute5);
        let next_bucket = BASE + 60 * 300;
        assert_eq!(engine.on_tick(&tick_at(next_bucket, 1.2), 0), TickOutcome::Dropped);

        engine
            .complete_load(ticket, Ok(history(Interval::Minute5, 60)), 0)
            .unwrap();
        assert_eq!(engine.on_tick(&tick_at(next_bucket, 1.2), 0), TickOutcome::Appended);
        assert_eq!(engine.bars().len(), 61);
        assert!((engine.representation().bars.last().unwrap().close_price - 1.2).abs() < 1e-9);
    }

    #[test]
    fn test_failed_load_and_retry() {
        let feed = ManualPriceFeed::new();
        let mut engine = ChartEngine::new(
            "EURUSD",
            Interval::Minute,
            Arc::new(EmptyDatafeed::new()),
            Arc::new(feed),
            EngineSettings::default(),
        );

        let result = tokio_test::block_on(engine.load(0));
        assert!(matches!(result, Err(ChartError::HistoryLoad { .. })));
        assert!(matches!(engine.load_state(), LoadState::Failed(_)));

        let retried = tokio_test::block_on(engine.retry(0));
        assert!(retried.is_err());
    }

    #[tokio::test]
    async fn test_position_overlays_and_switch_teardown() {
        let (mut engine, _) = create_engine();
        engine.load(0).await.unwrap();
        let mut sink = MemorySink::default();
        engine.flush(&mut sink);

        let mut position = PositionData::new("EURUSD", Direction::Long, 1.1, 1.0);
        position.take_profit = Some(1.11);
        position.stop_loss = Some(1.09);
        engine.set_positions(vec![position]);
        engine.flush(&mut sink);
        assert_eq!(sink.primitives.len(), 4);

        engine.update_preferences(|p| p.set_show_tp_sl_zones(false));
        engine.flush(&mut sink);
        assert_eq!(sink.primitives.len(), 3);

        engine.set_positions(Vec::new());
        engine.flush(&mut sink);
        assert!(sink.primitives.is_empty());

        engine.set_orders(vec![OrderData {
            symbol: "EURUSD".to_string(),
            direction: Direction::Long,
            requested_price: 1.095,
            quantity: 2.0,
        }]);
        engine.flush(&mut sink);
        assert_eq!(sink.primitives.len(), 1);

        engine.switch("GBPUSD", Interval::Minute5, 0).await.ok();
        engine.flush(&mut sink);
        assert!(sink.primitives.is_empty());
        assert!(engine.indicator_series().is_empty());
    }

    #[test]
    fn test_preferences_callback() {
        let saved: Arc<Mutex<Vec<DisplayPreferences>>> = Arc::new(Mutex::new(Vec::new()));
        let sink = Arc::clone(&saved);
        let (engine, _) = create_engine();
        let mut engine = engine.with_preferences(
            DisplayPreferences::default(),
            Some(Box::new(move |p: &DisplayPreferences| sink.lock().unwrap().push(*p))),
        );

        engine.update_preferences(|p| p.set_show_bid_ask_lines(false));
        // No change, no callback
        engine.update_preferences(|p| p.set_show_bid_ask_lines(false));

        let saved = saved.lock().unwrap();
        assert_eq!(saved.len(), 1);
        assert!(!saved[0].show_bid_ask_lines);
    }

    #[tokio::test]
    async fn test_signals_on_load_and_timer() {
        let (mut engine, _) = create_engine();
        let above = Condition {
            left: Operand::Price { source: PriceSource::Close },
            op: Comparison::CrossesAbove,
            right: Operand::Value { value: 1.1 },
        };
        engine.set_strategies(
            vec![StrategySpec::new("cross", Direction::Long, vec![RuleSpec::required(above)])],
            0,
        );
        assert!(engine.signals().is_empty());

        engine.load(0).await.unwrap();
        let signals = engine.signals();
        assert!(!signals.is_empty());
        assert!(signals.iter().all(|s| s.strategy_id == "cross"));

        engine.set_strategies(Vec::new(), 0);
        assert!(engine.signals().is_empty());
    }

    #[tokio::test]
    async fn test_chart_type_change() {
        let (mut engine, _) = create_engine();
        engine.load(0).await.unwrap();

        engine.set_chart_type(ChartType::HeikinAshi).unwrap();
        assert_eq!(engine.representation().bars.len(), 60);

        assert!(engine.set_chart_type(ChartType::Renko { brick_size: 0.0 }).is_err());
        assert_eq!(engine.chart_type(), ChartType::HeikinAshi);

        // Non one-to-one representations rebuild on commit
        engine.set_chart_type(ChartType::Renko { brick_size: 0.002 }).unwrap();
        let before = engine.representation().bars.len();
        engine.on_tick(&tick_at(BASE + 60 * 300, 1.2), 0);
        assert!(engine.representation().bars.len() > before);
    }

    #[tokio::test]
    async fn test_indicators_follow_chart_type() {
        let (mut engine, _) = create_engine();
        engine.set_indicators(vec![IndicatorSpec::new("sma", IndicatorKind::Sma { period: 5 })]);
        engine.load(0).await.unwrap();

        engine.set_chart_type(ChartType::HeikinAshi).unwrap();
        let ha = heikin_ashi(engine.bars());
        let expected: f64 = ha[..5].iter().map(|b| b.close_price).sum::<f64>() / 5.0;
        let first = engine.indicator_series()[0].line("sma").unwrap().points[0];
        assert!((first.value - expected).abs() < 1e-12);
        assert_eq!(first.time, ha[4].time);

        engine.set_chart_type(ChartType::Renko { brick_size: 0.002 }).unwrap();
        let brick_times: Vec<i64> = engine.representation().bars.iter().map(|b| b.time).collect();
        assert!(brick_times.len() > 5 && brick_times.len() < engine.bars().len());
        let points = &engine.indicator_series()[0].line("sma").unwrap().points;
        assert_eq!(points.len(), brick_times.len().saturating_sub(4));
        assert!(points.iter().all(|p| brick_times.contains(&p.time)));
    }

    #[tokio::test]
    async fn test_drawings_cleared_on_symbol_switch() {
        let (mut engine, _) = create_engine();
        engine.load(0).await.unwrap();
        let mut sink = MemorySink::default();

        let mapper = engine.mapper(800.0, 400.0, None).unwrap();
        engine.set_drawing_tool(DrawingTool::HorizontalLine);
        assert!(engine.handle_drawing_click(400.0, 200.0, &mapper));
        engine.flush(&mut sink);
        assert_eq!(sink.primitives.len(), 1);

        let ticket = engine.begin_switch("GBPUSD", Interval::Minute5);
        let gbp: Vec<BarData> = history(Interval::Minute5, 5)
            .into_iter()
            .map(|mut b| {
                b.symbol = "GBPUSD".to_string();
                b
            })
            .collect();
        engine.complete_load(ticket, Ok(gbp), 0).unwrap();

        let ops = engine.take_render_ops();
        assert!(ops.iter().all(|op| matches!(op, RenderOp::Delete { .. })));
        dispatch(&mut sink, &ops);
        assert!(sink.primitives.is_empty());
        assert!(engine.drawings().is_empty());
        assert_eq!(engine.rendered_overlay_count(), 0);
    }

    #[tokio::test]
    async fn test_ticks_dropped_while_market_closed() {
        let (mut engine, feed) = create_engine();
        engine.load(0).await.unwrap();
        let next_bucket = BASE + 60 * 300;

        feed.set_market_open("EURUSD", false);
        assert_eq!(engine.on_tick(&tick_at(next_bucket, 1.2), 0), TickOutcome::Dropped);
        assert_eq!(engine.bars().len(), 60);

        feed.set_market_open("EURUSD", true);
        assert_eq!(engine.on_tick(&tick_at(next_bucket, 1.2), 0), TickOutcome::Appended);
    }

    #[tokio::test]
    async fn test_eviction_keeps_representation_aligned() {
        let settings = EngineSettings {
            max_candles: 60,
            ..EngineSettings::default()
        };
        let (mut engine, _) = create_engine_with(settings);
        engine.load(0).await.unwrap();
        assert_eq!(engine.bars().len(), 60);

        for i in 0..3 {
            let time = BASE + (60 + i) * 300;
            assert_eq!(engine.on_tick(&tick_at(time, 1.2), 0), TickOutcome::Appended);
            assert_eq!(engine.bars().len(), 60);
            assert_eq!(engine.representation().bars.as_slice(), engine.bars());
        }
        assert_eq!(engine.bars()[0].time, BASE + 3 * 300);
    }

    #[tokio::test]
    async fn test_bar_lookup_and_mapper() {
        let (mut engine, _) = create_engine();
        assert!(engine.mapper(800.0, 400.0, None).is_none());
        engine.load(0).await.unwrap();

        assert_eq!(engine.bar_at(BASE + 300).map(|b| b.time), Some(BASE + 300));
        assert!(engine.bar_at(BASE + 301).is_none());

        let mapper = engine.mapper(800.0, 400.0, Some((0, 9))).unwrap();
        assert_eq!(mapper.time_range, (BASE, BASE + 59 * 300));
        let low = engine.bars()[..10].iter().map(|b| b.low_price).fold(f64::INFINITY, f64::min);
        assert_eq!(mapper.price_range.0, low);
    }
}
