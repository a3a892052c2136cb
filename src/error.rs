//! Error types shared across the chart engine.

use thiserror::Error;

/// Errors raised by the chart engine and its collaborators.
#[derive(Debug, Error)]
pub enum ChartError {
    /// Historical candle load failed; the chart stays in an error state until retried.
    #[error("failed to load history for {symbol} {interval}: {message}")]
    HistoryLoad {
        symbol: String,
        interval: String,
        message: String,
    },

    /// A transform or indicator parameter is outside its valid range.
    #[error("invalid parameter `{name}`: {reason}")]
    InvalidParameter { name: &'static str, reason: String },

    /// The render surface object was already torn down.
    #[error("render object {0} already disposed")]
    Disposed(String),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
}

impl ChartError {
    pub fn invalid(name: &'static str, reason: impl Into<String>) -> Self {
        ChartError::InvalidParameter {
            name,
            reason: reason.into(),
        }
    }

    /// Whether this error is an expected disposal race that callers swallow.
    pub fn is_disposed(&self) -> bool {
        matches!(self, ChartError::Disposed(_))
    }
}

pub type ChartResult<T> = Result<T, ChartError>;
