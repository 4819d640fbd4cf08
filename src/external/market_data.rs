use async_trait::async_trait;
use chrono::NaiveDate;
use thiserror::Error;

use crate::models::{FundamentalData, PricePoint, Quote};

#[derive(Debug, Error, Clone, PartialEq)]
pub enum MarketDataError {
    #[error("network error: {0}")]
    Network(String),

    #[error("bad response: {0}")]
    BadResponse(String),

    #[error("parse error: {0}")]
    Parse(String),

    #[error("rate limited")]
    RateLimited,

    #[error("symbol not found: {0}")]
    NotFound(String),

    #[error("not supported by {0}")]
    Unsupported(&'static str),

    #[error("no API key configured for {0}")]
    MissingApiKey(&'static str),
}

/// Source of quotes, daily closes and fundamentals.
///
/// An empty history is a valid answer ("no data in range") and is distinct
/// from an `Err`, which means the lookup itself failed.
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Short provider name used in logs.
    fn name(&self) -> &'static str;

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError>;

    /// Daily closes in `[start, end]`, ascending by date.
    async fn fetch_daily_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, MarketDataError>;

    async fn fetch_fundamentals(&self, _symbol: &str) -> Result<FundamentalData, MarketDataError> {
        Err(MarketDataError::Unsupported(self.name()))
    }
}

/// Keep points inside `[start, end]` and sort ascending.
pub(crate) fn clip_to_range(mut points: Vec<PricePoint>, start: NaiveDate, end: NaiveDate) -> Vec<PricePoint> {
    points.retain(|p| p.date >= start && p.date <= end);
    points.sort_by_key(|p| p.date);
    points.dedup_by_key(|p| p.date);
    points
}
