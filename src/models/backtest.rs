use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Fixed share count held through a backtest. Cost basis plays no part in valuation.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct BacktestPosition {
    pub symbol: String,
    pub shares: f64,
}

impl BacktestPosition {
    pub fn new(symbol: impl Into<String>, shares: f64) -> Self {
        Self {
            symbol: symbol.into(),
            shares,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BacktestRequest {
    pub holdings: Vec<BacktestPosition>,
    pub start_date: NaiveDate,
    pub end_date: NaiveDate,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BacktestQueryParams {
    /// `json` (default) or `csv`
    #[serde(default)]
    pub format: Option<String>,
}

/// Replay of a fixed-share portfolio over historical closes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BacktestResult {
    pub dates: Vec<NaiveDate>,
    pub portfolio_values: Vec<f64>,
    /// Day-over-day fractional change; first entry is 0
    pub returns: Vec<f64>,
    pub total_return: f64,
    pub annualized_return: f64,
    /// Peak-to-trough fraction, always >= 0
    pub max_drawdown: f64,
    /// Symbols dropped because their series was empty
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub skipped_symbols: Vec<String>,
}
