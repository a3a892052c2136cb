//! Drawing tools and click-driven drawing state.

use serde::{Deserialize, Serialize};

use super::base::{LineConfig, DRAWING_COLOR};

/// Fibonacci retracement ratios, 0 at the second anchor and 1 at the first.
pub const FIB_RATIOS: [f64; 7] = [0.0, 0.236, 0.382, 0.5, 0.618, 0.786, 1.0];

/// Available drawing tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DrawingTool {
    #[default]
    None,
    TrendLine,
    Fibonacci,
    HorizontalLine,
    VerticalLine,
}

impl DrawingTool {
    pub fn name(&self) -> &'static str {
        match self {
            DrawingTool::None => "None",
            DrawingTool::TrendLine => "Trend Line",
            DrawingTool::Fibonacci => "Fib Retracement",
            DrawingTool::HorizontalLine => "Horizontal Line",
            DrawingTool::VerticalLine => "Vertical Line",
        }
    }

    /// Number of clicks needed to place a drawing.
    pub fn anchor_count(&self) -> usize {
        match self {
            DrawingTool::None => 0,
            DrawingTool::TrendLine | DrawingTool::Fibonacci => 2,
            DrawingTool::HorizontalLine | DrawingTool::VerticalLine => 1,
        }
    }

    pub fn all() -> &'static [DrawingTool] {
        &[
            DrawingTool::TrendLine,
            DrawingTool::Fibonacci,
            DrawingTool::HorizontalLine,
            DrawingTool::VerticalLine,
        ]
    }
}

/// A point in chart space.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct AnchorPoint {
    pub time: i64,
    pub price: f64,
}

impl AnchorPoint {
    pub fn new(time: i64, price: f64) -> Self {
        Self { time, price }
    }
}

/// A committed drawing. Anchors hold one point for single-click tools and two otherwise.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Drawing {
    pub id: String,
    pub tool: DrawingTool,
    pub anchors: Vec<AnchorPoint>,
    pub style: LineConfig,
}

impl Drawing {
    pub fn new(tool: DrawingTool, anchors: Vec<AnchorPoint>, style: LineConfig) -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            tool,
            anchors,
            style,
        }
    }

    /// `(ratio, price)` pairs of a Fibonacci drawing.
    pub fn fib_levels(&self) -> Vec<(f64, f64)> {
        match (self.tool, self.anchors.as_slice()) {
            (DrawingTool::Fibonacci, [first, second]) => FIB_RATIOS
                .iter()
                .map(|r| (*r, second.price + (first.price - second.price) * r))
                .collect(),
            _ => Vec::new(),
        }
    }
}

/// Maps between chart space and screen space.
pub trait CoordinateMapper {
    fn time_to_x(&self, time: i64) -> Option<f64>;

    fn x_to_time(&self, x: f64) -> Option<i64>;

    fn price_to_y(&self, price: f64) -> Option<f64>;

    fn y_to_price(&self, y: f64) -> Option<f64>;
}

/// Linear mapping of a visible time/price window onto a pixel rectangle.
///
/// Y grows downwards, so the top of the rectangle is the highest price.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct LinearMapper {
    pub width: f64,
    pub height: f64,
    pub time_range: (i64, i64),
    pub price_range: (f64, f64),
}

impl LinearMapper {
    pub fn new(width: f64, height: f64, time_range: (i64, i64), price_range: (f64, f64)) -> Self {
        Self {
            width,
            height,
            time_range,
            price_range,
        }
    }

    fn time_span(&self) -> Option<f64> {
        let span = (self.time_range.1 - self.time_range.0) as f64;
        (span > 0.0 && self.width > 0.0).then_some(span)
    }

    fn price_span(&self) -> Option<f64> {
        let span = self.price_range.1 - self.price_range.0;
        (span > 0.0 && self.height > 0.0).then_some(span)
    }
}

impl CoordinateMapper for LinearMapper {
    fn time_to_x(&self, time: i64) -> Option<f64> {
        let span = self.time_span()?;
        Some((time - self.time_range.0) as f64 / span * self.width)
    }

    fn x_to_time(&self, x: f64) -> Option<i64> {
        let span = self.time_span()?;
        Some(self.time_range.0 + (x / self.width * span).round() as i64)
    }

    fn price_to_y(&self, price: f64) -> Option<f64> {
        let span = self.price_span()?;
        let normalized = (price - self.price_range.0) / span;
        Some(self.height - normalized * self.height)
    }

    fn y_to_price(&self, y: f64) -> Option<f64> {
        let span = self.price_span()?;
        Some(self.price_range.0 + (self.height - y) / self.height * span)
    }
}

/// Current interaction state.
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub enum InteractionState {
    #[default]
    Idle,
    /// First anchor of a two-point drawing placed
    Placing { first_anchor: AnchorPoint },
}

/// Owns the active tool, the pending anchor and the committed drawings.
#[derive(Debug, Clone)]
pub struct DrawingManager {
    tool: DrawingTool,
    interaction: InteractionState,
    drawings: Vec<Drawing>,
    style: LineConfig,
}

impl Default for DrawingManager {
    fn default() -> Self {
        Self::new()
    }
}

impl DrawingManager {
    pub fn new() -> Self {
        Self {
            tool: DrawingTool::None,
            interaction: InteractionState::Idle,
            drawings: Vec::new(),
            style: LineConfig::solid(DRAWING_COLOR),
        }
    }

    pub fn tool(&self) -> DrawingTool {
        self.tool
    }

    pub fn interaction(&self) -> InteractionState {
        self.interaction
    }

    /// Set the active tool, discarding any pending anchor.
    pub fn set_tool(&mut self, tool: DrawingTool) {
        self.interaction = InteractionState::Idle;
        self.tool = tool;
    }

    pub fn cancel(&mut self) {
        self.interaction = InteractionState::Idle;
        self.tool = DrawingTool::None;
    }

    pub fn drawings(&self) -> &[Drawing] {
        &self.drawings
    }

    pub fn remove(&mut self, id: &str) -> bool {
        let before = self.drawings.len();
        self.drawings.retain(|d| d.id != id);
        self.drawings.len() != before
    }

    pub fn clear(&mut self) {
        self.drawings.clear();
        self.interaction = InteractionState::Idle;
    }

    /// Handle a click in screen space. Clicks outside the mapped area are ignored.
    pub fn handle_click(&mut self, x: f64, y: f64, mapper: &dyn CoordinateMapper) -> Option<&Drawing> {
        let anchor = AnchorPoint::new(mapper.x_to_time(x)?, mapper.y_to_price(y)?);
        self.handle_anchor(anchor)
    }

    /// Handle a click already mapped to chart space.
    ///
    /// Returns the committed drawing, after which the tool and the pending
    /// anchor are reset.
    pub fn handle_anchor(&mut self, anchor: AnchorPoint) -> Option<&Drawing> {
        let anchors = match (self.tool.anchor_count(), self.interaction) {
            (0, _) => return None,
            (1, _) => vec![anchor],
            (_, InteractionState::Idle) => {
                self.interaction = InteractionState::Placing { first_anchor: anchor };
                return None;
            }
            (_, InteractionState::Placing { first_anchor }) => vec![first_anchor, anchor],
        };

        let drawing = Drawing::new(self.tool, anchors, self.style.clone());
        tracing::debug!(id = %drawing.id, tool = self.tool.name(), "drawing committed");

        self.drawings.push(drawing);
        self.interaction = InteractionState::Idle;
        self.tool = DrawingTool::None;
        self.drawings.last()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mapper() -> LinearMapper {
        LinearMapper::new(1000.0, 500.0, (0, 10_000), (1.0, 2.0))
    }

    #[test]
    fn test_linear_mapper_round_trip() {
        let m = mapper();
        assert_eq!(m.time_to_x(5_000), Some(500.0));
        assert_eq!(m.price_to_y(2.0), Some(0.0));
        assert_eq!(m.price_to_y(1.0), Some(500.0));
        assert_eq!(m.x_to_time(250.0), Some(2_500));
        assert!((m.y_to_price(125.0).unwrap() - 1.75).abs() < 1e-12);

        let empty = LinearMapper::new(1000.0, 500.0, (10, 10), (1.0, 1.0));
        assert_eq!(empty.time_to_x(10), None);
        assert_eq!(empty.y_to_price(0.0), None);
    }

    #[test]
    fn test_two_click_trend_line() {
        let mut manager = DrawingManager::new();
        manager.set_tool(DrawingTool::TrendLine);

        assert!(manager.handle_click(100.0, 250.0, &mapper()).is_none());
        assert!(matches!(manager.interaction(), InteractionState::Placing { .. }));

        let drawing = manager.handle_click(300.0, 50.0, &mapper()).cloned().unwrap();
        assert_eq!(drawing.tool, DrawingTool::TrendLine);
        assert_eq!(drawing.anchors[0].time, 1_000);
        assert_eq!(drawing.anchors[1].time, 3_000);

        // Tool and pending anchor reset after commit
        assert_eq!(manager.tool(), DrawingTool::None);
        assert_eq!(manager.interaction(), InteractionState::Idle);
        assert!(manager.handle_anchor(AnchorPoint::new(0, 1.0)).is_none());
        assert_eq!(manager.drawings().len(), 1);
    }

    #[test]
    fn test_single_click_tools() {
        let mut manager = DrawingManager::new();
        for tool in [DrawingTool::HorizontalLine, DrawingTool::VerticalLine] {
            manager.set_tool(tool);
            let drawing = manager.handle_anchor(AnchorPoint::new(60, 1.5)).cloned().unwrap();
            assert_eq!(drawing.anchors.len(), 1);
        }
        assert_eq!(manager.drawings().len(), 2);
        assert_ne!(manager.drawings()[0].id, manager.drawings()[1].id);
    }

    #[test]
    fn test_switching_tool_discards_pending_anchor() {
        let mut manager = DrawingManager::new();
        manager.set_tool(DrawingTool::Fibonacci);
        manager.handle_anchor(AnchorPoint::new(0, 1.0));
        manager.set_tool(DrawingTool::TrendLine);
        assert_eq!(manager.interaction(), InteractionState::Idle);
    }

    #[test]
    fn test_fibonacci_levels() {
        let mut manager = DrawingManager::new();
        manager.set_tool(DrawingTool::Fibonacci);
        manager.handle_anchor(AnchorPoint::new(0, 100.0));
        let fib = manager.handle_anchor(AnchorPoint::new(600, 200.0)).cloned().unwrap();

        let levels = fib.fib_levels();
        assert_eq!(levels.len(), 7);
        assert_eq!(levels[0], (0.0, 200.0));
        assert_eq!(levels[3], (0.5, 150.0));
        assert_eq!(levels[6], (1.0, 100.0));

        let id = fib.id.clone();
        assert!(manager.remove(&id));
        assert!(!manager.remove(&id));
    }
}
