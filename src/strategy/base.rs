//! Strategy Base Types
//!
//! Rule-set configuration and the signals it produces

use serde::{Deserialize, Serialize};

use crate::chart::indicator::IndicatorKind;
use crate::trader::constant::{Direction, PriceSource};

/// Signal marker type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SignalType {
    Buy,
    StrongBuy,
    Sell,
    StrongSell,
}

impl SignalType {
    pub fn from_side(side: Direction, strong: bool) -> Self {
        match (side, strong) {
            (Direction::Long, false) => SignalType::Buy,
            (Direction::Long, true) => SignalType::StrongBuy,
            (Direction::Short, false) => SignalType::Sell,
            (Direction::Short, true) => SignalType::StrongSell,
        }
    }

    pub fn direction(&self) -> Direction {
        match self {
            SignalType::Buy | SignalType::StrongBuy => Direction::Long,
            SignalType::Sell | SignalType::StrongSell => Direction::Short,
        }
    }

    pub fn is_strong(&self) -> bool {
        matches!(self, SignalType::StrongBuy | SignalType::StrongSell)
    }
}

/// A directional marker at one candle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Signal {
    /// Candle time
    pub time: i64,
    pub signal_type: SignalType,
    /// Matched weight over total weight, 0..=1
    pub strength: f64,
    pub strategy_id: String,
    /// Close of the candle
    pub price: f64,
}

/// Comparison operator of a condition
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Comparison {
    Gt,
    Lt,
    Gte,
    Lte,
    CrossesAbove,
    CrossesBelow,
}

/// One side of a condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Operand {
    Price {
        #[serde(default)]
        source: PriceSource,
    },
    Indicator {
        kind: IndicatorKind,
        /// Line name; the first line when absent
        #[serde(default)]
        line: Option<String>,
    },
    Value {
        value: f64,
    },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Condition {
    pub left: Operand,
    pub op: Comparison,
    pub right: Operand,
}

fn default_true() -> bool {
    true
}

fn default_weight() -> f64 {
    1.0
}

fn default_strong_threshold() -> f64 {
    0.8
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleSpec {
    pub condition: Condition,
    /// Must hold for the strategy to fire
    #[serde(default = "default_true")]
    pub required: bool,
    #[serde(default = "default_weight")]
    pub weight: f64,
}

impl RuleSpec {
    pub fn required(condition: Condition) -> Self {
        Self {
            condition,
            required: true,
            weight: 1.0,
        }
    }

    pub fn optional(condition: Condition, weight: f64) -> Self {
        Self {
            condition,
            required: false,
            weight,
        }
    }
}

/// Strategy rule-set
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StrategySpec {
    pub id: String,
    pub name: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    pub side: Direction,
    pub rules: Vec<RuleSpec>,
    #[serde(default = "default_strong_threshold")]
    pub strong_threshold: f64,
    /// Emit only on the first candle of a qualifying run
    #[serde(default)]
    pub edge_triggered: bool,
}

impl StrategySpec {
    pub fn new(id: impl Into<String>, side: Direction, rules: Vec<RuleSpec>) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            enabled: true,
            side,
            rules,
            strong_threshold: default_strong_threshold(),
            edge_triggered: false,
        }
    }

    pub fn with_edge_trigger(mut self) -> Self {
        self.edge_triggered = true;
        self
    }

    pub fn total_weight(&self) -> f64 {
        self.rules.iter().map(|r| r.weight).sum()
    }

    /// Parse a JSON array of strategies. Entries that fail to parse are logged and skipped.
    pub fn parse_list(value: &serde_json::Value) -> Vec<StrategySpec> {
        let Some(items) = value.as_array() else {
            tracing::warn!("strategy list is not an array");
            return Vec::new();
        };

        items
            .iter()
            .filter_map(|item| match serde_json::from_value::<StrategySpec>(item.clone()) {
                Ok(spec) => Some(spec),
                Err(e) => {
                    tracing::warn!(error = %e, entry = %item, "skipping unknown strategy");
                    None
                }
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_signal_type_from_side() {
        assert_eq!(SignalType::from_side(Direction::Long, true), SignalType::StrongBuy);
        assert_eq!(SignalType::from_side(Direction::Short, false), SignalType::Sell);
        assert_eq!(SignalType::StrongSell.direction(), Direction::Short);
        assert!(!SignalType::Buy.is_strong());
    }

    #[test]
    fn test_parse_strategy_list() {
        let json = serde_json::json!([
            {
                "id": "rsi_rebound",
                "name": "RSI rebound",
                "side": "buy",
                "rules": [
                    {"condition": {
                        "left": {"type": "indicator", "kind": {"type": "rsi", "period": 14}},
                        "op": "crosses_above",
                        "right": {"type": "value", "value": 30.0}
                    }},
                    {"condition": {
                        "left": {"type": "price"},
                        "op": "gt",
                        "right": {"type": "indicator", "kind": {"type": "sma", "period": 50}, "line": "sma"}
                    }, "required": false, "weight": 0.5}
                ]
            },
            {"id": "broken", "side": "buy", "rules": [{"condition": {"left": {"type": "magic"}}}]}
        ]);

        let specs = StrategySpec::parse_list(&json);
        assert_eq!(specs.len(), 1);
        let spec = &specs[0];
        assert_eq!(spec.side, Direction::Long);
        assert!(spec.enabled);
        assert_eq!(spec.strong_threshold, 0.8);
        assert!(!spec.edge_triggered);
        assert_eq!(spec.total_weight(), 1.5);
        assert!(spec.rules[0].required);
        assert_eq!(spec.rules[1].condition.left, Operand::Price { source: PriceSource::Close });
    }
}
