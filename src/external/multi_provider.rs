use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::{info, warn};

use crate::external::market_data::{MarketDataError, MarketDataProvider};
use crate::models::{FundamentalData, PricePoint, Quote};

/// Tries the primary provider first and falls back on any error.
///
/// Strategy:
/// 1. Ask the primary (keyless Yahoo by default)
/// 2. On failure, log and ask the fallback (Alpha Vantage)
/// 3. Report the fallback's error if both fail
pub struct MultiProvider {
    primary: Box<dyn MarketDataProvider>,
    fallback: Box<dyn MarketDataProvider>,
}

impl MultiProvider {
    pub fn new(primary: Box<dyn MarketDataProvider>, fallback: Box<dyn MarketDataProvider>) -> Self {
        Self { primary, fallback }
    }

    fn log_fallback(&self, what: &str, symbol: &str, err: &MarketDataError) {
        warn!(
            "{} lookup for {} failed on {} ({}); trying {}",
            what,
            symbol,
            self.primary.name(),
            err,
            self.fallback.name()
        );
    }
}

#[async_trait]
impl MarketDataProvider for MultiProvider {
    fn name(&self) -> &'static str {
        "multi"
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        match self.primary.fetch_quote(symbol).await {
            Ok(quote) => Ok(quote),
            Err(e) => {
                self.log_fallback("Quote", symbol, &e);
                self.fallback.fetch_quote(symbol).await
            }
        }
    }

    async fn fetch_daily_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, MarketDataError> {
        match self.primary.fetch_daily_history(symbol, start, end).await {
            Ok(points) => Ok(points),
            Err(e) => {
                self.log_fallback("History", symbol, &e);
                let points = self.fallback.fetch_daily_history(symbol, start, end).await?;
                info!("✓ {} returned {} points for {}", self.fallback.name(), points.len(), symbol);
                Ok(points)
            }
        }
    }

    async fn fetch_fundamentals(&self, symbol: &str) -> Result<FundamentalData, MarketDataError> {
        match self.primary.fetch_fundamentals(symbol).await {
            Ok(data) => Ok(data),
            // Not worth a warning: Yahoo never serves fundamentals
            Err(MarketDataError::Unsupported(_)) => self.fallback.fetch_fundamentals(symbol).await,
            Err(e) => {
                self.log_fallback("Fundamentals", symbol, &e);
                self.fallback.fetch_fundamentals(symbol).await
            }
        }
    }
}
