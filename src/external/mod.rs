pub mod alphavantage;
pub mod cached;
pub mod market_data;
pub mod multi_provider;
pub mod yahoo;
