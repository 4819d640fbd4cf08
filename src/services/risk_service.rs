use ndarray::Array1;

use crate::errors::AppError;
use crate::models::{CorrelationMatrix, PortfolioMetrics, StockMetrics, Weights};
use crate::services::metrics_service::sharpe_ratio;

/// Drawdown multiple of volatility (heuristic, not simulated).
const DRAWDOWN_MULTIPLE: f64 = 2.5;

/// One-tailed 95% z-score used for the volatility-scaled VaR.
const VAR_95_Z: f64 = 1.645;

/// Aggregate per-asset metrics into portfolio-level return and risk figures.
///
/// Portfolio variance is the quadratic form `w' Σ w` where
/// `Σ[i][j] = vol[i] * vol[j] * corr[i][j]`. Max drawdown and VaR are
/// fixed multiples of the resulting volatility.
///
/// # Arguments
/// * `weights` – target allocation by symbol
/// * `metrics` – per-asset estimates, in the same order as `correlations`
/// * `correlations` – pairwise correlation matrix
pub fn compute_portfolio_metrics(
    weights: &Weights,
    metrics: &[StockMetrics],
    correlations: &CorrelationMatrix,
) -> Result<PortfolioMetrics, AppError> {
    if metrics.is_empty() {
        return Err(AppError::Validation("No metrics to aggregate".to_string()));
    }
    let aligned = correlations.len() == metrics.len()
        && metrics
            .iter()
            .zip(correlations.symbols())
            .all(|(m, s)| &m.symbol == s);
    if !aligned {
        return Err(AppError::Validation(
            "Correlation matrix symbols do not match the supplied metrics".to_string(),
        ));
    }

    let w: Array1<f64> = metrics.iter().map(|m| weights.get(&m.symbol)).collect();
    let vol: Array1<f64> = metrics.iter().map(|m| m.volatility).collect();
    let er: Array1<f64> = metrics.iter().map(|m| m.expected_return).collect();

    let expected_return = w.dot(&er);

    let weighted_vol = &w * &vol;
    let variance = weighted_vol.dot(&correlations.values().dot(&weighted_vol));
    let volatility = variance.max(0.0).sqrt();

    let weighted_avg_vol = weighted_vol.sum();
    let diversification_ratio = if volatility > f64::EPSILON {
        weighted_avg_vol / volatility
    } else {
        1.0
    };

    let concentration_risk: f64 = weights.iter().map(|(_, w)| w * w).sum();

    Ok(PortfolioMetrics {
        expected_return,
        volatility,
        sharpe_ratio: sharpe_ratio(expected_return, volatility),
        max_drawdown: volatility * DRAWDOWN_MULTIPLE,
        var_95: volatility * VAR_95_Z,
        diversification_ratio,
        concentration_risk,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stock(symbol: &str, expected_return: f64, volatility: f64) -> StockMetrics {
        StockMetrics {
            symbol: symbol.to_string(),
            expected_return,
            volatility,
            beta: 1.0,
            sharpe: sharpe_ratio(expected_return, volatility),
        }
    }

    fn weights(pairs: &[(&str, f64)]) -> Weights {
        pairs.iter().map(|(s, w)| (s.to_string(), *w)).collect()
    }

    fn uniform_matrix(metrics: &[StockMetrics], rho: f64) -> CorrelationMatrix {
        CorrelationMatrix::from_pairwise(metrics.iter().map(|m| m.symbol.clone()).collect(), |_, _| rho)
    }

    #[test]
    fn test_single_asset_portfolio() {
        let metrics = vec![stock("AAPL", 0.12, 0.2)];
        let result =
            compute_portfolio_metrics(&weights(&[("AAPL", 1.0)]), &metrics, &uniform_matrix(&metrics, 0.5)).unwrap();

        assert!((result.expected_return - 0.12).abs() < 1e-12);
        assert!((result.volatility - 0.2).abs() < 1e-12);
        assert!((result.diversification_ratio - 1.0).abs() < 1e-12);
        assert_eq!(result.concentration_risk, 1.0);
        assert!((result.sharpe_ratio - 0.5).abs() < 1e-12);
        assert!((result.max_drawdown - 0.5).abs() < 1e-12);
        assert!((result.var_95 - 0.329).abs() < 1e-12);
    }

    #[test]
    fn test_two_asset_variance_formula() {
        let metrics = vec![stock("A", 0.10, 0.2), stock("B", 0.06, 0.1)];
        let w = weights(&[("A", 0.5), ("B", 0.5)]);
        let result = compute_portfolio_metrics(&w, &metrics, &uniform_matrix(&metrics, 0.3)).unwrap();

        // 0.25*0.04 + 0.25*0.01 + 2*0.25*0.2*0.1*0.3
        let variance = 0.01 + 0.0025 + 0.003;
        assert!((result.volatility - f64::sqrt(variance)).abs() < 1e-12);
        assert!((result.expected_return - 0.08).abs() < 1e-12);
        assert!((result.diversification_ratio - 0.15 / f64::sqrt(variance)).abs() < 1e-12);
        assert!(result.diversification_ratio > 1.0);
        assert!((result.concentration_risk - 0.5).abs() < 1e-12);
    }

    #[test]
    fn test_perfect_correlation_has_no_diversification() {
        let metrics = vec![stock("A", 0.10, 0.2), stock("B", 0.06, 0.3)];
        let w = weights(&[("A", 0.4), ("B", 0.6)]);
        let result = compute_portfolio_metrics(&w, &metrics, &uniform_matrix(&metrics, 1.0)).unwrap();
        assert!((result.diversification_ratio - 1.0).abs() < 1e-12);
    }

    #[test]
    fn test_equal_weights_concentration_is_one_over_n() {
        let metrics: Vec<_> = ["A", "B", "C", "D"].iter().map(|s| stock(s, 0.1, 0.2)).collect();
        let w = weights(&[("A", 0.25), ("B", 0.25), ("C", 0.25), ("D", 0.25)]);
        let result = compute_portfolio_metrics(&w, &metrics, &uniform_matrix(&metrics, 0.5)).unwrap();
        assert!((result.concentration_risk - 0.25).abs() < 1e-12);
    }

    #[test]
    fn test_zero_volatility_sentinels() {
        let metrics = vec![stock("CASH", 0.02, 0.0)];
        let result =
            compute_portfolio_metrics(&weights(&[("CASH", 1.0)]), &metrics, &uniform_matrix(&metrics, 0.0)).unwrap();
        assert_eq!(result.volatility, 0.0);
        assert_eq!(result.sharpe_ratio, 0.0);
        assert_eq!(result.diversification_ratio, 1.0);
        assert!(result.sharpe_ratio.is_finite());
    }

    #[test]
    fn test_rejects_misaligned_matrix() {
        let metrics = vec![stock("A", 0.1, 0.2), stock("B", 0.1, 0.2)];
        let matrix = CorrelationMatrix::from_pairwise(vec!["B".into(), "A".into()], |_, _| 0.3);
        let w = weights(&[("A", 0.5), ("B", 0.5)]);
        assert!(compute_portfolio_metrics(&w, &metrics, &matrix).is_err());
    }
}
