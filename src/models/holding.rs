use serde::{Deserialize, Serialize};

/// One portfolio line item, supplied per call.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Holding {
    pub symbol: String,
    pub shares: f64,
    pub avg_cost: f64,
    pub current_price: f64,
    /// Reported beta from fundamentals, when the data source has one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub beta: Option<f64>,
}

impl Holding {
    pub fn new(symbol: impl Into<String>, shares: f64, avg_cost: f64, current_price: f64) -> Self {
        Self {
            symbol: symbol.into(),
            shares,
            avg_cost,
            current_price,
            beta: None,
        }
    }

    pub fn market_value(&self) -> f64 {
        self.shares * self.current_price
    }

    pub fn cost_basis(&self) -> f64 {
        self.shares * self.avg_cost
    }

    pub fn gain_loss(&self) -> f64 {
        self.market_value() - self.cost_basis()
    }

    /// Gain/loss as a percentage of cost basis (0 when the basis is zero).
    pub fn gain_loss_percent(&self) -> f64 {
        let basis = self.cost_basis();
        if basis.abs() < f64::EPSILON {
            return 0.0;
        }
        self.gain_loss() / basis * 100.0
    }
}

/// Row parsed from an uploaded holdings CSV; priced later through the quote lookup.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ImportedHolding {
    pub symbol: String,
    pub shares: f64,
    pub avg_cost: f64,
}

/// Investor risk tolerance; selects the allocation strategy.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
pub enum RiskTolerance {
    Conservative,
    #[default]
    Moderate,
    Aggressive,
}

/// Aggregate view of a holdings list.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PortfolioSummary {
    pub total_value: f64,
    pub total_cost: f64,
    pub total_gain_loss: f64,
    pub total_gain_loss_percent: f64,
    pub position_count: usize,
}

impl PortfolioSummary {
    pub fn from_holdings(holdings: &[Holding]) -> Self {
        let total_value: f64 = holdings.iter().map(Holding::market_value).sum();
        let total_cost: f64 = holdings.iter().map(Holding::cost_basis).sum();
        let total_gain_loss = total_value - total_cost;
        let total_gain_loss_percent = if total_cost > 0.0 {
            total_gain_loss / total_cost * 100.0
        } else {
            0.0
        };

        Self {
            total_value,
            total_cost,
            total_gain_loss,
            total_gain_loss_percent,
            position_count: holdings.len(),
        }
    }
}
