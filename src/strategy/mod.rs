//! Strategy module: rule-set configuration and the signal engine.

pub mod base;
pub mod engine;

pub use base::{Comparison, Condition, Operand, RuleSpec, Signal, SignalType, StrategySpec};
pub use engine::{evaluate_strategy, SignalEngine};
