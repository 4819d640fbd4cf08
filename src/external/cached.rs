use std::time::Duration;

use async_trait::async_trait;
use chrono::NaiveDate;
use tracing::debug;

use crate::external::market_data::{MarketDataError, MarketDataProvider};
use crate::models::{FundamentalData, PricePoint, Quote};
use crate::services::response_cache::ResponseCache;

/// TTLs per lookup kind.
#[derive(Debug, Clone, Copy)]
pub struct CacheTtls {
    pub quote: Duration,
    pub history: Duration,
    pub fundamentals: Duration,
}

impl Default for CacheTtls {
    fn default() -> Self {
        Self {
            quote: Duration::from_secs(60),
            history: Duration::from_secs(300),
            fundamentals: Duration::from_secs(3600),
        }
    }
}

/// Wraps any provider with per-request-key TTL caches. Failures are never cached.
pub struct CachedProvider {
    inner: Box<dyn MarketDataProvider>,
    quotes: ResponseCache<Quote>,
    history: ResponseCache<Vec<PricePoint>>,
    fundamentals: ResponseCache<FundamentalData>,
}

impl CachedProvider {
    pub fn new(inner: Box<dyn MarketDataProvider>, ttls: CacheTtls) -> Self {
        Self {
            inner,
            quotes: ResponseCache::new(ttls.quote),
            history: ResponseCache::new(ttls.history),
            fundamentals: ResponseCache::new(ttls.fundamentals),
        }
    }
}

#[async_trait]
impl MarketDataProvider for CachedProvider {
    fn name(&self) -> &'static str {
        self.inner.name()
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let key = format!("quote_{}", symbol);
        if let Some(quote) = self.quotes.get(&key) {
            debug!("Cache hit: {}", key);
            return Ok(quote);
        }
        let quote = self.inner.fetch_quote(symbol).await?;
        self.quotes.insert(key, quote.clone());
        Ok(quote)
    }

    async fn fetch_daily_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, MarketDataError> {
        let key = format!("history_{}_{}_{}", symbol, start, end);
        if let Some(points) = self.history.get(&key) {
            debug!("Cache hit: {}", key);
            return Ok(points);
        }
        let points = self.inner.fetch_daily_history(symbol, start, end).await?;
        self.history.insert(key, points.clone());
        Ok(points)
    }

    async fn fetch_fundamentals(&self, symbol: &str) -> Result<FundamentalData, MarketDataError> {
        let key = format!("fundamental_{}", symbol);
        if let Some(data) = self.fundamentals.get(&key) {
            debug!("Cache hit: {}", key);
            return Ok(data);
        }
        let data = self.inner.fetch_fundamentals(symbol).await?;
        self.fundamentals.insert(key, data.clone());
        Ok(data)
    }
}
