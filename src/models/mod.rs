mod backtest;
mod holding;
mod market;
mod price_point;
pub mod optimization;

pub use backtest::{BacktestPosition, BacktestQueryParams, BacktestRequest, BacktestResult};
pub use holding::{Holding, ImportedHolding, PortfolioSummary, RiskTolerance};
pub use market::{FundamentalData, Quote};
pub use price_point::PricePoint;
pub use optimization::{
    AdjustmentAction, AllocationStrategy, CorrelationMatrix, HoldingInput, MetricsEstimate,
    OptimizeRequest, OptimizedPortfolio, PortfolioMetrics, RebalancingRecommendation,
    StockMetrics, Weights,
};
