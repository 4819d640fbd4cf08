use std::collections::BTreeMap;

use ndarray::Array2;
use serde::{Deserialize, Serialize};

use crate::models::{PortfolioSummary, RiskTolerance};

/// Per-symbol return/risk estimates produced by a metrics provider.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StockMetrics {
    pub symbol: String,
    pub expected_return: f64,
    pub volatility: f64,
    pub beta: f64,
    pub sharpe: f64,
}

/// Square, symmetric, unit-diagonal correlation matrix indexed by symbol.
#[derive(Debug, Clone, PartialEq)]
pub struct CorrelationMatrix {
    symbols: Vec<String>,
    values: Array2<f64>,
}

impl CorrelationMatrix {
    /// Build from a pairwise function. Only the upper triangle is evaluated and
    /// mirrored, so the result is symmetric whatever `pair` does.
    pub fn from_pairwise<F>(symbols: Vec<String>, pair: F) -> Self
    where
        F: Fn(usize, usize) -> f64,
    {
        let n = symbols.len();
        let mut values = Array2::<f64>::eye(n);
        for i in 0..n {
            for j in (i + 1)..n {
                let c = pair(i, j);
                values[[i, j]] = c;
                values[[j, i]] = c;
            }
        }
        Self { symbols, values }
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn at(&self, i: usize, j: usize) -> f64 {
        self.values[[i, j]]
    }

    pub fn get(&self, a: &str, b: &str) -> Option<f64> {
        let i = self.symbols.iter().position(|s| s == a)?;
        let j = self.symbols.iter().position(|s| s == b)?;
        Some(self.values[[i, j]])
    }

    pub fn to_nested_map(&self) -> BTreeMap<String, BTreeMap<String, f64>> {
        self.symbols
            .iter()
            .enumerate()
            .map(|(i, a)| {
                let row = self
                    .symbols
                    .iter()
                    .enumerate()
                    .map(|(j, b)| (b.clone(), self.values[[i, j]]))
                    .collect();
                (a.clone(), row)
            })
            .collect()
    }
}

/// Metrics for every holding plus their pairwise correlations, in holding order.
#[derive(Debug, Clone, PartialEq)]
pub struct MetricsEstimate {
    pub metrics: Vec<StockMetrics>,
    pub correlations: CorrelationMatrix,
}

/// Target allocation fractions keyed by symbol. Non-negative, summing to 1.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
#[serde(transparent)]
pub struct Weights(BTreeMap<String, f64>);

impl Weights {
    /// Weight for `symbol`, 0 when it has none.
    pub fn get(&self, symbol: &str) -> f64 {
        self.0.get(symbol).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &f64)> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.0.values().sum()
    }
}

impl FromIterator<(String, f64)> for Weights {
    fn from_iter<I: IntoIterator<Item = (String, f64)>>(iter: I) -> Self {
        Weights(iter.into_iter().collect())
    }
}

/// Weighting scheme chosen by risk tolerance.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AllocationStrategy {
    MinimumVariance,
    MeanVariance,
    MaximumSharpe,
}

impl From<RiskTolerance> for AllocationStrategy {
    fn from(value: RiskTolerance) -> Self {
        match value {
            RiskTolerance::Conservative => AllocationStrategy::MinimumVariance,
            RiskTolerance::Moderate => AllocationStrategy::MeanVariance,
            RiskTolerance::Aggressive => AllocationStrategy::MaximumSharpe,
        }
    }
}

/// Portfolio-level return and risk aggregates.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioMetrics {
    pub expected_return: f64,
    pub volatility: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    #[serde(rename = "var95")]
    pub var_95: f64,
    pub diversification_ratio: f64,
    pub concentration_risk: f64,
}

/// Action to take on a position
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "UPPERCASE")]
pub enum AdjustmentAction {
    Buy,
    Sell,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RebalancingRecommendation {
    pub symbol: String,
    /// Percent of portfolio value (0-100)
    pub current_weight: f64,
    /// Percent of portfolio value (0-100)
    pub target_weight: f64,
    pub action: AdjustmentAction,
    /// Dollar amount to trade
    pub amount: f64,
    pub reason: String,
}

/// Complete optimization result returned to callers.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct OptimizedPortfolio {
    pub strategy: AllocationStrategy,
    pub weights: Weights,
    pub expected_return: f64,
    pub expected_risk: f64,
    pub sharpe_ratio: f64,
    pub max_drawdown: f64,
    #[serde(rename = "var95")]
    pub var_95: f64,
    pub diversification_ratio: f64,
    pub concentration_risk: f64,
    pub rebalancing_recommendations: Vec<RebalancingRecommendation>,
    pub stock_metrics: Vec<StockMetrics>,
    pub correlations: BTreeMap<String, BTreeMap<String, f64>>,
    pub summary: PortfolioSummary,
}

/// Holding as submitted by a client; the price may be left for the quote lookup.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct HoldingInput {
    pub symbol: String,
    pub shares: f64,
    pub avg_cost: f64,
    #[serde(default)]
    pub current_price: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OptimizeRequest {
    pub holdings: Vec<HoldingInput>,
    #[serde(default)]
    pub risk_tolerance: RiskTolerance,
    /// Accepted but not yet used by any strategy
    #[serde(default)]
    pub target_return: Option<f64>,
}
