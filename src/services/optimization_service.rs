use std::collections::HashSet;

use futures::future::join_all;
use tracing::{debug, info, warn};

use crate::errors::AppError;
use crate::external::market_data::{MarketDataError, MarketDataProvider};
use crate::models::{
    AllocationStrategy, Holding, HoldingInput, OptimizeRequest, OptimizedPortfolio, PortfolioSummary,
    RiskTolerance,
};
use crate::services::allocation_service::allocate;
use crate::services::metrics_service::MetricsProvider;
use crate::services::rebalancing_service::generate_recommendations;
use crate::services::risk_service::compute_portfolio_metrics;

fn is_positive(value: f64) -> bool {
    value.is_finite() && value > 0.0
}

fn check_symbols<'a>(symbols: impl Iterator<Item = &'a str>) -> Result<(), AppError> {
    let mut seen = HashSet::new();
    for symbol in symbols {
        if symbol.is_empty() {
            return Err(AppError::Validation("Holding symbol must not be empty".to_string()));
        }
        if !seen.insert(symbol) {
            return Err(AppError::Validation(format!("Duplicate holding symbol: {}", symbol)));
        }
    }
    Ok(())
}

/// Reject inputs the optimizer cannot price. Nothing is coerced to zero.
pub fn validate_holdings(holdings: &[Holding]) -> Result<(), AppError> {
    if holdings.is_empty() {
        return Err(AppError::Validation("No holdings provided for optimization".to_string()));
    }
    check_symbols(holdings.iter().map(|h| h.symbol.as_str()))?;

    for h in holdings {
        if !is_positive(h.shares) {
            return Err(AppError::Validation(format!("{}: shares must be positive", h.symbol)));
        }
        if !is_positive(h.avg_cost) {
            return Err(AppError::Validation(format!("{}: avgCost must be positive", h.symbol)));
        }
        if !is_positive(h.current_price) {
            return Err(AppError::Validation(format!("{}: currentPrice must be positive", h.symbol)));
        }
    }
    Ok(())
}

fn validate_inputs(inputs: &[HoldingInput]) -> Result<(), AppError> {
    if inputs.is_empty() {
        return Err(AppError::Validation("No holdings provided for optimization".to_string()));
    }
    check_symbols(inputs.iter().map(|h| h.symbol.as_str()))?;

    for h in inputs {
        if !is_positive(h.shares) {
            return Err(AppError::Validation(format!("{}: shares must be positive", h.symbol)));
        }
        if !is_positive(h.avg_cost) {
            return Err(AppError::Validation(format!("{}: avgCost must be positive", h.symbol)));
        }
        if let Some(price) = h.current_price {
            if !is_positive(price) {
                return Err(AppError::Validation(format!("{}: currentPrice must be positive", h.symbol)));
            }
        }
    }
    Ok(())
}

/// Run estimator, allocator, risk aggregator and rebalancer over priced holdings.
///
/// Pure and synchronous; all market data must already be resolved.
pub fn optimize_portfolio(
    holdings: &[Holding],
    risk_tolerance: RiskTolerance,
    target_return: Option<f64>,
    metrics_provider: &dyn MetricsProvider,
) -> Result<OptimizedPortfolio, AppError> {
    validate_holdings(holdings)?;

    let strategy = AllocationStrategy::from(risk_tolerance);
    info!(
        "Optimizing {} holdings with {:?} tolerance ({:?})",
        holdings.len(),
        risk_tolerance,
        strategy
    );

    let estimate = metrics_provider.estimate(holdings)?;
    let weights = allocate(strategy, &estimate.metrics, &estimate.correlations, target_return)?;
    let portfolio = compute_portfolio_metrics(&weights, &estimate.metrics, &estimate.correlations)?;
    let rebalancing_recommendations = generate_recommendations(holdings, &weights, &estimate.metrics);

    info!(
        "Optimization complete: expected return {:.4}, risk {:.4}, sharpe {:.3}, {} recommendations",
        portfolio.expected_return,
        portfolio.volatility,
        portfolio.sharpe_ratio,
        rebalancing_recommendations.len()
    );

    Ok(OptimizedPortfolio {
        strategy,
        weights,
        expected_return: portfolio.expected_return,
        expected_risk: portfolio.volatility,
        sharpe_ratio: portfolio.sharpe_ratio,
        max_drawdown: portfolio.max_drawdown,
        var_95: portfolio.var_95,
        diversification_ratio: portfolio.diversification_ratio,
        concentration_risk: portfolio.concentration_risk,
        rebalancing_recommendations,
        stock_metrics: estimate.metrics,
        correlations: estimate.correlations.to_nested_map(),
        summary: PortfolioSummary::from_holdings(holdings),
    })
}

async fn current_price(input: &HoldingInput, provider: &dyn MarketDataProvider) -> Result<f64, AppError> {
    if let Some(price) = input.current_price {
        return Ok(price);
    }
    let quote = provider
        .fetch_quote(&input.symbol)
        .await
        .map_err(|e| AppError::from_market_data(&input.symbol, e))?;
    if !is_positive(quote.price) {
        return Err(AppError::DataUnavailable {
            symbol: input.symbol.clone(),
            reason: format!("quote price {} is not usable", quote.price),
        });
    }
    Ok(quote.price)
}

/// Price client-supplied holdings, fetching quotes and fundamentals concurrently.
///
/// A holding without `currentPrice` must get a usable quote or the whole call
/// fails naming the symbol. Fundamentals only contribute `beta` and are
/// best-effort.
pub async fn resolve_holdings(
    inputs: &[HoldingInput],
    provider: &dyn MarketDataProvider,
) -> Result<Vec<Holding>, AppError> {
    let inputs: Vec<HoldingInput> = inputs
        .iter()
        .map(|h| HoldingInput {
            symbol: h.symbol.trim().to_uppercase(),
            ..h.clone()
        })
        .collect();
    validate_inputs(&inputs)?;

    let price_lookups = inputs.iter().map(|h| current_price(h, provider));
    let fundamentals_lookups = inputs.iter().map(|h| provider.fetch_fundamentals(&h.symbol));

    let (prices, fundamentals) = tokio::join!(join_all(price_lookups), join_all(fundamentals_lookups));

    let mut holdings = Vec::with_capacity(inputs.len());
    for ((input, price), fundamentals) in inputs.into_iter().zip(prices).zip(fundamentals) {
        let current_price = price?;
        let beta = match fundamentals {
            Ok(data) => data.beta,
            Err(MarketDataError::Unsupported(provider_name)) => {
                debug!("{} does not serve fundamentals; no reported beta for {}", provider_name, input.symbol);
                None
            }
            Err(e) => {
                warn!("Fundamentals unavailable for {}: {}", input.symbol, e);
                None
            }
        };

        holdings.push(Holding {
            symbol: input.symbol,
            shares: input.shares,
            avg_cost: input.avg_cost,
            current_price,
            beta,
        });
    }

    Ok(holdings)
}

/// Resolve market data for a request and optimize it.
pub async fn optimize_with_market_data(
    request: OptimizeRequest,
    provider: &dyn MarketDataProvider,
    metrics_provider: &dyn MetricsProvider,
) -> Result<OptimizedPortfolio, AppError> {
    let holdings = resolve_holdings(&request.holdings, provider).await?;
    optimize_portfolio(&holdings, request.risk_tolerance, request.target_return, metrics_provider)
}
