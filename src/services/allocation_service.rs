use tracing::{debug, warn};

use crate::errors::AppError;
use crate::models::{AllocationStrategy, CorrelationMatrix, StockMetrics, Weights};

/// Per-rank decay applied by the mean-variance ranking.
const RANK_DECAY: f64 = 0.7;

/// Total weight reserved for non-positive Sharpe holdings under max-Sharpe.
const RESIDUAL_WEIGHT: f64 = 0.05;

/// Compute target weights for `metrics` under `strategy`.
///
/// Every strategy returns non-negative weights summing to 1. If a strategy
/// produces something unusable (NaN, negative, or all zero) the result falls
/// back to equal weighting.
pub fn allocate(
    strategy: AllocationStrategy,
    metrics: &[StockMetrics],
    correlations: &CorrelationMatrix,
    target_return: Option<f64>,
) -> Result<Weights, AppError> {
    if metrics.is_empty() {
        return Err(AppError::Validation("Cannot allocate an empty portfolio".to_string()));
    }
    if correlations.len() != metrics.len() {
        return Err(AppError::Validation(format!(
            "Correlation matrix covers {} symbols but {} metrics were supplied",
            correlations.len(),
            metrics.len()
        )));
    }
    if let Some(target) = target_return {
        debug!("Target return {:.4} accepted but not used by {:?}", target, strategy);
    }

    // None of the heuristics solve the full quadratic program, so the
    // correlation matrix is only validated here.
    let raw = match strategy {
        AllocationStrategy::MinimumVariance => minimum_variance(metrics),
        AllocationStrategy::MeanVariance => mean_variance(metrics),
        AllocationStrategy::MaximumSharpe => maximum_sharpe(metrics),
    };

    Ok(normalize_or_equal(metrics, raw, strategy))
}

/// Inverse-volatility weights. Zero-volatility assets, if any, take the whole allocation.
fn minimum_variance(metrics: &[StockMetrics]) -> Vec<f64> {
    let riskless: Vec<bool> = metrics
        .iter()
        .map(|m| !(m.volatility.is_finite() && m.volatility > f64::EPSILON))
        .collect();

    if riskless.iter().any(|&r| r) {
        return riskless.iter().map(|&r| if r { 1.0 } else { 0.0 }).collect();
    }

    metrics.iter().map(|m| 1.0 / m.volatility).collect()
}

/// Rank by Sharpe (descending, ties keep input order) and decay geometrically.
fn mean_variance(metrics: &[StockMetrics]) -> Vec<f64> {
    let mut order: Vec<usize> = (0..metrics.len()).collect();
    order.sort_by(|&a, &b| metrics[b].sharpe.total_cmp(&metrics[a].sharpe));

    let mut raw = vec![0.0; metrics.len()];
    for (rank, &idx) in order.iter().enumerate() {
        raw[idx] = RANK_DECAY.powi(rank as i32);
    }
    raw
}

/// Sharpe-squared weights over positive-Sharpe holdings, with a fixed residual
/// split across the rest.
fn maximum_sharpe(metrics: &[StockMetrics]) -> Vec<f64> {
    let positive: Vec<bool> = metrics
        .iter()
        .map(|m| m.sharpe.is_finite() && m.sharpe > 0.0)
        .collect();
    let positive_count = positive.iter().filter(|&&p| p).count();

    if positive_count == 0 {
        debug!("No positive Sharpe ratios; using equal weights");
        return vec![1.0; metrics.len()];
    }

    let non_positive_count = metrics.len() - positive_count;
    let positive_share = if non_positive_count == 0 { 1.0 } else { 1.0 - RESIDUAL_WEIGHT };
    let sharpe_squared: f64 = metrics
        .iter()
        .zip(&positive)
        .filter(|(_, &p)| p)
        .map(|(m, _)| m.sharpe * m.sharpe)
        .sum();

    metrics
        .iter()
        .zip(&positive)
        .map(|(m, &p)| {
            if p {
                positive_share * m.sharpe * m.sharpe / sharpe_squared
            } else {
                RESIDUAL_WEIGHT / non_positive_count as f64
            }
        })
        .collect()
}

fn normalize_or_equal(metrics: &[StockMetrics], raw: Vec<f64>, strategy: AllocationStrategy) -> Weights {
    let total: f64 = raw.iter().sum();
    let usable = raw.iter().all(|w| w.is_finite() && *w >= 0.0) && total.is_finite() && total > 0.0;

    if !usable {
        warn!(
            "{:?} produced degenerate weights {:?}; falling back to equal weighting",
            strategy, raw
        );
        let equal = 1.0 / metrics.len() as f64;
        return metrics.iter().map(|m| (m.symbol.clone(), equal)).collect();
    }

    metrics
        .iter()
        .zip(raw)
        .map(|(m, w)| (m.symbol.clone(), w / total))
        .collect()
}
