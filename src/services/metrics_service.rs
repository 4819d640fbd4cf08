//! Per-holding return, volatility, beta and correlation estimates.
//!
//! The default [`HeuristicMetricsProvider`] is a proxy model, not a
//! statistical estimator. It derives every figure from the holding's
//! realized gain/loss and from fixed sector and market-cap tables. No
//! historical return series is consulted. Swap in another
//! [`MetricsProvider`] to use real covariance estimates; the allocator and
//! aggregator only see the resulting [`MetricsEstimate`].

use crate::errors::AppError;
use crate::models::{CorrelationMatrix, Holding, MetricsEstimate, StockMetrics};

/// Annual risk-free rate used for every Sharpe ratio.
pub const RISK_FREE_RATE: f64 = 0.02;

const LARGE_CAP: &[&str] = &["AAPL", "GOOGL", "MSFT", "AMZN", "TSLA", "META", "NVDA"];
const MID_CAP: &[&str] = &["AMD", "NFLX", "CRM", "ADBE", "PYPL"];

const TECHNOLOGY: &[&str] = &["AAPL", "GOOGL", "MSFT", "META", "NVDA", "AMD"];
const FINANCIAL_SERVICES: &[&str] = &["JPM", "BAC", "WFC", "GS"];
const HEALTHCARE: &[&str] = &["JNJ", "PFE", "UNH"];

/// Produces per-holding metrics and the pairwise correlation matrix.
pub trait MetricsProvider: Send + Sync {
    fn estimate(&self, holdings: &[Holding]) -> Result<MetricsEstimate, AppError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Sector {
    Technology,
    FinancialServices,
    Healthcare,
    Other,
}

impl Sector {
    pub fn of(symbol: &str) -> Self {
        if TECHNOLOGY.contains(&symbol) {
            Sector::Technology
        } else if FINANCIAL_SERVICES.contains(&symbol) {
            Sector::FinancialServices
        } else if HEALTHCARE.contains(&symbol) {
            Sector::Healthcare
        } else {
            Sector::Other
        }
    }

    fn return_adjustment(self) -> f64 {
        match self {
            Sector::Technology => 0.02,
            Sector::FinancialServices => -0.01,
            Sector::Healthcare => 0.01,
            Sector::Other => 0.0,
        }
    }
}

/// Size tier. Unknown symbols are treated as small caps.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MarketCapTier {
    Large,
    Mid,
    Small,
}

impl MarketCapTier {
    pub fn of(symbol: &str) -> Self {
        if LARGE_CAP.contains(&symbol) {
            MarketCapTier::Large
        } else if MID_CAP.contains(&symbol) {
            MarketCapTier::Mid
        } else {
            MarketCapTier::Small
        }
    }

    /// Expected-return adjustment; also drives beta and correlation.
    pub fn factor(self) -> f64 {
        match self {
            MarketCapTier::Large => -0.01,
            MarketCapTier::Mid => 0.01,
            MarketCapTier::Small => 0.03,
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HeuristicMetricsProvider;

impl HeuristicMetricsProvider {
    /// 8% base + 30% of realized return + size and sector premia, in [0.02, 0.25].
    pub fn expected_return(holding: &Holding) -> f64 {
        let realized = holding.gain_loss_percent() / 100.0;
        let adjusted = 0.08
            + realized * 0.3
            + MarketCapTier::of(&holding.symbol).factor()
            + Sector::of(&holding.symbol).return_adjustment();
        adjusted.clamp(0.02, 0.25)
    }

    /// Twice the absolute realized move plus a size premium, in [0.10, 0.50].
    pub fn volatility(holding: &Holding) -> f64 {
        let price_volatility = holding.gain_loss_percent().abs() / 100.0 * 2.0;
        let size_adjustment = match MarketCapTier::of(&holding.symbol) {
            MarketCapTier::Small => 0.05,
            MarketCapTier::Large | MarketCapTier::Mid => 0.02,
        };
        (price_volatility + size_adjustment).clamp(0.10, 0.50)
    }

    /// Reported beta when the holding carries one, otherwise a volatility/size proxy.
    pub fn beta(holding: &Holding) -> f64 {
        match holding.beta.filter(|b| b.is_finite()) {
            Some(reported) => reported.clamp(0.3, 2.0),
            None => {
                let factor = MarketCapTier::of(&holding.symbol).factor();
                (Self::volatility(holding) * 2.0 + factor * 10.0).clamp(0.3, 2.0)
            }
        }
    }

    /// Pairwise correlation proxy in [0.1, 0.9]. Every term is order-independent.
    pub fn correlation(a: &str, b: &str) -> f64 {
        if a == b {
            return 1.0;
        }

        let (sector_a, sector_b) = (Sector::of(a), Sector::of(b));
        let cap_gap = (MarketCapTier::of(a).factor() - MarketCapTier::of(b).factor()).abs();

        let mut correlation: f64 = 0.3;
        if sector_a == sector_b {
            correlation += 0.4;
        }
        if cap_gap < 0.01 {
            correlation += 0.2;
        }
        if sector_a == Sector::Technology && sector_b == Sector::Technology {
            correlation += 0.1;
        }
        correlation.clamp(0.1, 0.9)
    }
}

/// (expected_return - risk_free) / volatility; 0 when volatility is not positive.
pub fn sharpe_ratio(expected_return: f64, volatility: f64) -> f64 {
    if volatility.is_finite() && volatility > f64::EPSILON {
        (expected_return - RISK_FREE_RATE) / volatility
    } else {
        0.0
    }
}

impl MetricsProvider for HeuristicMetricsProvider {
    fn estimate(&self, holdings: &[Holding]) -> Result<MetricsEstimate, AppError> {
        if holdings.is_empty() {
            return Err(AppError::Validation("No holdings provided for optimization".to_string()));
        }

        let metrics: Vec<StockMetrics> = holdings
            .iter()
            .map(|h| {
                let expected_return = Self::expected_return(h);
                let volatility = Self::volatility(h);
                StockMetrics {
                    symbol: h.symbol.clone(),
                    expected_return,
                    volatility,
                    beta: Self::beta(h),
                    sharpe: sharpe_ratio(expected_return, volatility),
                }
            })
            .collect();

        let symbols: Vec<String> = metrics.iter().map(|m| m.symbol.clone()).collect();
        let correlations = CorrelationMatrix::from_pairwise(symbols.clone(), |i, j| {
            Self::correlation(&symbols[i], &symbols[j])
        });

        Ok(MetricsEstimate { metrics, correlations })
    }
}
