pub mod backtest;
pub mod health;
pub mod optimization;
pub mod portfolio;
