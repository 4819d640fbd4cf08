use tracing::debug;

use crate::models::{AdjustmentAction, Holding, RebalancingRecommendation, StockMetrics, Weights};

/// Weight gap (as a fraction) a holding must exceed before it is flagged.
pub const REBALANCE_THRESHOLD: f64 = 0.02;

/// Compare current market-value weights against `target` and recommend trades.
///
/// Only holdings whose gap exceeds [`REBALANCE_THRESHOLD`] are returned, in
/// input order. Weights in the output are percentages.
pub fn generate_recommendations(
    holdings: &[Holding],
    target: &Weights,
    metrics: &[StockMetrics],
) -> Vec<RebalancingRecommendation> {
    let total_value: f64 = holdings.iter().map(Holding::market_value).sum();
    if !(total_value.is_finite() && total_value > 0.0) {
        debug!("Portfolio has no market value; skipping rebalancing");
        return Vec::new();
    }

    holdings
        .iter()
        .filter_map(|holding| {
            let current_weight = holding.market_value() / total_value;
            let target_weight = target.get(&holding.symbol);
            let diff = target_weight - current_weight;

            if diff.abs() <= REBALANCE_THRESHOLD {
                return None;
            }

            let (action, reason) = if diff > 0.0 {
                let stock = metrics.iter().find(|m| m.symbol == holding.symbol);
                let (sharpe, expected_return) = stock.map_or((0.0, 0.0), |m| (m.sharpe, m.expected_return));
                (
                    AdjustmentAction::Buy,
                    format!(
                        "High Sharpe ratio ({:.2}), expected return {:.1}%",
                        sharpe,
                        expected_return * 100.0
                    ),
                )
            } else {
                (
                    AdjustmentAction::Sell,
                    "Overweight position, consider rebalancing for risk management".to_string(),
                )
            };

            Some(RebalancingRecommendation {
                symbol: holding.symbol.clone(),
                current_weight: current_weight * 100.0,
                target_weight: target_weight * 100.0,
                action,
                amount: diff.abs() * total_value,
                reason,
            })
        })
        .collect()
}
