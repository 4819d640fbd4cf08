pub mod allocation_service;
pub mod backtest_service;
pub mod metrics_service;
pub mod optimization_service;
pub mod portfolio_import_service;
pub mod rebalancing_service;
pub mod response_cache;
pub mod risk_service;
