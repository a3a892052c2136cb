//! Trade and drawing overlays.
//!
//! `build_overlays` maps the current inputs to a keyed set of primitives.
//! `OverlayReconciler` diffs that set against what was last rendered and
//! emits the create/update/delete operations a `RenderSink` applies.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use super::base::{
    LineConfig, LineStyle, ASK_COLOR, BID_COLOR, ENTRY_COLOR, LOSS_COLOR, ORDER_COLOR, PROFIT_COLOR, ZONE_OPACITY,
};
use super::drawing::{AnchorPoint, Drawing, DrawingTool};
use crate::error::ChartResult;
use crate::trader::object::{OrderData, PositionData, TickData};

fn default_true() -> bool {
    true
}

/// User toggles for the annotation layer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DisplayPreferences {
    #[serde(default = "default_true")]
    pub show_bid_ask_lines: bool,
    #[serde(default = "default_true")]
    pub show_price_labels: bool,
    #[serde(default = "default_true")]
    pub show_trade_markers: bool,
    #[serde(default = "default_true")]
    pub show_tp_sl_lines: bool,
    #[serde(default = "default_true")]
    pub show_tp_sl_zones: bool,
}

impl Default for DisplayPreferences {
    fn default() -> Self {
        Self {
            show_bid_ask_lines: true,
            show_price_labels: true,
            show_trade_markers: true,
            show_tp_sl_lines: true,
            show_tp_sl_zones: true,
        }
    }
}

impl DisplayPreferences {
    pub fn set_show_bid_ask_lines(&mut self, show: bool) {
        self.show_bid_ask_lines = show;
    }

    pub fn set_show_price_labels(&mut self, show: bool) {
        self.show_price_labels = show;
    }

    pub fn set_show_trade_markers(&mut self, show: bool) {
        self.show_trade_markers = show;
    }

    pub fn set_show_tp_sl_lines(&mut self, show: bool) {
        self.show_tp_sl_lines = show;
    }

    pub fn set_show_tp_sl_zones(&mut self, show: bool) {
        self.show_tp_sl_zones = show;
    }

    /// Zones hang off the TP/SL lines and are hidden with them.
    pub fn zones_visible(&self) -> bool {
        self.show_tp_sl_zones && self.show_tp_sl_lines
    }
}

/// Shaded band between two prices
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ZoneBand {
    pub from_price: f64,
    pub to_price: f64,
    pub color: String,
    pub opacity: f32,
}

/// Something the render surface draws
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OverlayPrimitive {
    /// Horizontal line at a price
    PriceLine {
        price: f64,
        label: String,
        style: LineConfig,
        axis_label: bool,
    },
    Zone {
        bands: Vec<ZoneBand>,
    },
    OrderLine {
        price: f64,
        label: String,
        style: LineConfig,
        axis_label: bool,
    },
    TrendLine {
        from: AnchorPoint,
        to: AnchorPoint,
        style: LineConfig,
    },
    TimeLine {
        time: i64,
        style: LineConfig,
    },
    FibonacciSet {
        from_time: i64,
        to_time: i64,
        levels: Vec<(f64, f64)>,
        style: LineConfig,
    },
}

/// Keyed primitive set
pub type OverlaySet = BTreeMap<String, OverlayPrimitive>;

fn price_line(price: f64, label: impl Into<String>, style: LineConfig, prefs: &DisplayPreferences) -> OverlayPrimitive {
    OverlayPrimitive::PriceLine {
        price,
        label: label.into(),
        style,
        axis_label: prefs.show_price_labels,
    }
}

fn position_overlays(ix: usize, position: &PositionData, prefs: &DisplayPreferences, out: &mut OverlaySet) {
    let key = |part: &str| format!("position:{}:{}", ix, part);

    if prefs.show_trade_markers {
        let label = format!("{} {}", position.direction.label(), position.quantity);
        out.insert(key("entry"), price_line(position.entry_price, label, LineConfig::solid(ENTRY_COLOR), prefs));
    }

    if !prefs.show_tp_sl_lines {
        return;
    }

    if let Some(tp) = position.take_profit {
        out.insert(key("tp"), price_line(tp, "TP", LineConfig::dashed(PROFIT_COLOR), prefs));
    }
    if let Some(sl) = position.stop_loss {
        out.insert(key("sl"), price_line(sl, "SL", LineConfig::dashed(LOSS_COLOR), prefs));
    }

    if prefs.zones_visible() {
        let bands: Vec<ZoneBand> = [(position.take_profit, PROFIT_COLOR), (position.stop_loss, LOSS_COLOR)]
            .into_iter()
            .filter_map(|(target, color)| {
                target.map(|price| ZoneBand {
                    from_price: position.entry_price,
                    to_price: price,
                    color: color.to_string(),
                    opacity: ZONE_OPACITY,
                })
            })
            .collect();
        if !bands.is_empty() {
            out.insert(key("zone"), OverlayPrimitive::Zone { bands });
        }
    }
}

fn drawing_overlay(drawing: &Drawing, prefs: &DisplayPreferences) -> Option<OverlayPrimitive> {
    let style = drawing.style.clone();
    match (drawing.tool, drawing.anchors.as_slice()) {
        (DrawingTool::TrendLine, [from, to]) => Some(OverlayPrimitive::TrendLine {
            from: *from,
            to: *to,
            style,
        }),
        (DrawingTool::Fibonacci, [from, to]) => Some(OverlayPrimitive::FibonacciSet {
            from_time: from.time,
            to_time: to.time,
            levels: drawing.fib_levels(),
            style,
        }),
        (DrawingTool::HorizontalLine, [anchor]) => Some(price_line(anchor.price, "", style, prefs)),
        (DrawingTool::VerticalLine, [anchor]) => Some(OverlayPrimitive::TimeLine {
            time: anchor.time,
            style,
        }),
        _ => None,
    }
}

/// Desired primitive set for the active symbol.
pub fn build_overlays(
    symbol: &str,
    positions: &[PositionData],
    orders: &[OrderData],
    tick: Option<&TickData>,
    drawings: &[Drawing],
    prefs: &DisplayPreferences,
) -> OverlaySet {
    let mut out = OverlaySet::new();

    for (ix, position) in positions.iter().enumerate().filter(|(_, p)| p.symbol == symbol) {
        position_overlays(ix, position, prefs, &mut out);
    }

    for (ix, order) in orders.iter().enumerate().filter(|(_, o)| o.symbol == symbol) {
        out.insert(
            format!("order:{}", ix),
            OverlayPrimitive::OrderLine {
                price: order.requested_price,
                label: format!("{} {}", order.direction.label(), order.quantity),
                style: LineConfig::new(ORDER_COLOR, 1.0, LineStyle::Dashed),
                axis_label: prefs.show_price_labels,
            },
        );
    }

    if prefs.show_bid_ask_lines {
        if let Some(tick) = tick.filter(|t| t.symbol == symbol) {
            out.insert("price:bid".to_string(), price_line(tick.bid, "Bid", LineConfig::solid(BID_COLOR), prefs));
            out.insert("price:ask".to_string(), price_line(tick.ask, "Ask", LineConfig::solid(ASK_COLOR), prefs));
        }
    }

    for drawing in drawings {
        if let Some(primitive) = drawing_overlay(drawing, prefs) {
            out.insert(format!("drawing:{}", drawing.id), primitive);
        }
    }

    out
}

/// One change to the render surface
#[derive(Debug, Clone, PartialEq)]
pub enum RenderOp {
    Create { key: String, primitive: OverlayPrimitive },
    Update { key: String, primitive: OverlayPrimitive },
    Delete { key: String },
}

impl RenderOp {
    pub fn key(&self) -> &str {
        match self {
            RenderOp::Create { key, .. } | RenderOp::Update { key, .. } | RenderOp::Delete { key } => key,
        }
    }
}

/// Render surface implemented by the host.
pub trait RenderSink {
    /// Apply one operation. Returns `ChartError::Disposed` when the target
    /// surface is already gone.
    fn apply(&mut self, op: &RenderOp) -> ChartResult<()>;
}

/// Apply operations in order. Disposed targets are skipped.
pub fn dispatch(sink: &mut dyn RenderSink, ops: &[RenderOp]) -> usize {
    let mut applied = 0;
    for op in ops {
        match sink.apply(op) {
            Ok(()) => applied += 1,
            Err(e) if e.is_disposed() => {
                tracing::debug!(key = op.key(), "render target already disposed");
            }
            Err(e) => tracing::warn!(key = op.key(), error = %e, "render op failed"),
        }
    }
    applied
}

/// Tracks what was last rendered.
#[derive(Debug, Default, Clone)]
pub struct OverlayReconciler {
    rendered: OverlaySet,
}

impl OverlayReconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn rendered(&self) -> &OverlaySet {
        &self.rendered
    }

    pub fn rendered_count(&self) -> usize {
        self.rendered.len()
    }

    /// Diff `desired` against the rendered set; deletes come first.
    pub fn reconcile(&mut self, desired: OverlaySet) -> Vec<RenderOp> {
        let mut ops: Vec<RenderOp> = self
            .rendered
            .keys()
            .filter(|key| !desired.contains_key(*key))
            .map(|key| RenderOp::Delete { key: key.clone() })
            .collect();

        for (key, primitive) in &desired {
            match self.rendered.get(key) {
                None => ops.push(RenderOp::Create {
                    key: key.clone(),
                    primitive: primitive.clone(),
                }),
                Some(current) if current != primitive => ops.push(RenderOp::Update {
                    key: key.clone(),
                    primitive: primitive.clone(),
                }),
                Some(_) => {}
            }
        }

        self.rendered = desired;
        ops
    }

    /// Delete everything rendered.
    pub fn teardown(&mut self) -> Vec<RenderOp> {
        let ops = self
            .rendered
            .keys()
            .map(|key| RenderOp::Delete { key: key.clone() })
            .collect();
        self.rendered.clear();
        ops
    }
}

/// Sink keeping primitives in memory; used by the demo binary and tests.
#[derive(Debug, Default, Clone)]
pub struct MemorySink {
    pub primitives: OverlaySet,
    pub applied: usize,
    pub disposed: bool,
}

impl RenderSink for MemorySink {
    fn apply(&mut self, op: &RenderOp) -> ChartResult<()> {
        if self.disposed {
            return Err(crate::error::ChartError::Disposed(op.key().to_string()));
        }
        match op {
            RenderOp::Create { key, primitive } | RenderOp::Update { key, primitive } => {
                self.primitives.insert(key.clone(), primitive.clone());
            }
            RenderOp::Delete { key } => {
                self.primitives.remove(key);
            }
        }
        self.applied += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::trader::constant::Direction;
    use chrono::{TimeZone, Utc};

    fn create_test_position() -> PositionData {
        let mut position = PositionData::new("EURUSD", Direction::Long, 1.1000, 1.0);
        position.take_profit = Some(1.1050);
        position.stop_loss = Some(1.0950);
        position
    }

    fn order(symbol: &str) -> OrderData {
        OrderData {
            symbol: symbol.to_string(),
            direction: Direction::Short,
            requested_price: 1.1100,
            quantity: 0.5,
        }
    }

    #[test]
    fn test_position_makes_four_primitives() {
        let prefs = DisplayPreferences::default();
        let set = build_overlays("EURUSD", &[create_test_position()], &[], None, &[], &prefs);
        assert_eq!(set.len(), 4);
        assert!(set.contains_key("position:0:entry"));

        let Some(OverlayPrimitive::Zone { bands }) = set.get("position:0:zone") else {
            panic!("zone missing");
        };
        assert_eq!(bands.len(), 2);
        assert_eq!(bands[0].to_price, 1.1050);

        let mut reconciler = OverlayReconciler::new();
        let ops = reconciler.reconcile(set);
        assert!(ops.iter().all(|op| matches!(op, RenderOp::Create { .. })));
        assert_eq!(reconciler.rendered_count(), 4);

        let ops = reconciler.reconcile(build_overlays("EURUSD", &[], &[], None, &[], &prefs));
        assert_eq!(ops.len(), 4);
        assert!(ops.iter().all(|op| matches!(op, RenderOp::Delete { .. })));
        assert_eq!(reconciler.rendered_count(), 0);
    }

    #[test]
    fn test_preference_flags() {
        let mut prefs = DisplayPreferences::default();
        let positions = [create_test_position()];

        prefs.set_show_tp_sl_lines(false);
        let set = build_overlays("EURUSD", &positions, &[], None, &[], &prefs);
        assert_eq!(set.keys().collect::<Vec<_>>(), vec!["position:0:entry"]);

        prefs.set_show_tp_sl_lines(true);
        prefs.set_show_tp_sl_zones(false);
        prefs.set_show_trade_markers(false);
        prefs.set_show_price_labels(false);
        let set = build_overlays("EURUSD", &positions, &[], None, &[], &prefs);
        assert_eq!(set.len(), 2);
        assert!(set
            .values()
            .all(|p| matches!(p, OverlayPrimitive::PriceLine { axis_label: false, .. })));
    }

    #[test]
    fn test_orders_and_price_lines_filtered_by_symbol() {
        let prefs = DisplayPreferences::default();
        let tick = TickData::new("EURUSD", Utc.timestamp_opt(1_700_000_000, 0).unwrap(), 1.1000, 1.1002);
        let set = build_overlays(
            "EURUSD",
            &[],
            &[order("EURUSD"), order("GBPUSD")],
            Some(&tick),
            &[],
            &prefs,
        );
        assert_eq!(set.len(), 3);
        match set.get("order:0") {
            Some(OverlayPrimitive::OrderLine { label, style, .. }) => {
                assert_eq!(label, "SELL 0.5");
                assert_eq!(style.style, LineStyle::Dashed);
            }
            other => panic!("unexpected {:?}", other),
        }

        let mut prefs = prefs;
        prefs.set_show_bid_ask_lines(false);
        let set = build_overlays("EURUSD", &[], &[], Some(&tick), &[], &prefs);
        assert!(set.is_empty());
    }

    #[test]
    fn test_reconcile_updates_only_changed() {
        let prefs = DisplayPreferences::default();
        let mut reconciler = OverlayReconciler::new();
        let at = |secs| Utc.timestamp_opt(secs, 0).unwrap();

        let tick = TickData::new("EURUSD", at(0), 1.1000, 1.1002);
        reconciler.reconcile(build_overlays("EURUSD", &[create_test_position()], &[], Some(&tick), &[], &prefs));

        let tick = TickData::new("EURUSD", at(1), 1.1001, 1.1002);
        let ops = reconciler.reconcile(build_overlays("EURUSD", &[create_test_position()], &[], Some(&tick), &[], &prefs));
        assert_eq!(ops.len(), 1);
        assert_eq!(ops[0].key(), "price:bid");
        assert!(matches!(ops[0], RenderOp::Update { .. }));

        let ops = reconciler.teardown();
        assert_eq!(ops.len(), 6);
        assert_eq!(reconciler.rendered_count(), 0);
    }

    #[test]
    fn test_drawings_become_primitives() {
        let prefs = DisplayPreferences::default();
        let fib = Drawing::new(
            DrawingTool::Fibonacci,
            vec![AnchorPoint::new(0, 1.0), AnchorPoint::new(60, 2.0)],
            LineConfig::default(),
        );
        let vline = Drawing::new(DrawingTool::VerticalLine, vec![AnchorPoint::new(30, 1.5)], LineConfig::default());
        let set = build_overlays("EURUSD", &[], &[], None, &[fib.clone(), vline], &prefs);
        assert_eq!(set.len(), 2);
        match set.get(&format!("drawing:{}", fib.id)) {
            Some(OverlayPrimitive::FibonacciSet { levels, .. }) => assert_eq!(levels.len(), 7),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_dispatch_swallows_disposed() {
        let mut reconciler = OverlayReconciler::new();
        let ops = reconciler.reconcile(build_overlays(
            "EURUSD",
            &[create_test_position()],
            &[],
            None,
            &[],
            &DisplayPreferences::default(),
        ));

        let mut sink = MemorySink::default();
        assert_eq!(dispatch(&mut sink, &ops), 4);
        assert_eq!(sink.primitives.len(), 4);

        sink.disposed = true;
        assert_eq!(dispatch(&mut sink, &reconciler.teardown()), 0);
    }
}
