use std::sync::Arc;

use crate::config::{AppConfig, ProviderKind};
use crate::external::alphavantage::AlphaVantageProvider;
use crate::external::cached::CachedProvider;
use crate::external::market_data::{MarketDataError, MarketDataProvider};
use crate::external::multi_provider::MultiProvider;
use crate::external::yahoo::YahooProvider;
use crate::services::metrics_service::{HeuristicMetricsProvider, MetricsProvider};

#[derive(Clone)]
pub struct AppState {
    pub market_data: Arc<dyn MarketDataProvider>,
    pub metrics_provider: Arc<dyn MetricsProvider>,
}

impl AppState {
    pub fn new(market_data: Arc<dyn MarketDataProvider>, metrics_provider: Arc<dyn MetricsProvider>) -> Self {
        Self {
            market_data,
            metrics_provider,
        }
    }

    /// Build the configured provider chain behind the response cache, with
    /// the heuristic metrics model.
    pub fn from_config(config: &AppConfig) -> Result<Self, MarketDataError> {
        let alphavantage = || -> Result<AlphaVantageProvider, MarketDataError> {
            let key = config
                .alphavantage_api_key
                .clone()
                .ok_or(MarketDataError::MissingApiKey("alphavantage"))?;
            AlphaVantageProvider::new(key, config.http_timeout)
        };

        let provider: Box<dyn MarketDataProvider> = match config.provider {
            ProviderKind::AlphaVantage => {
                tracing::info!("Using price provider: Alpha Vantage only");
                Box::new(alphavantage()?)
            }
            ProviderKind::Yahoo => {
                tracing::info!("Using price provider: Yahoo only");
                Box::new(YahooProvider::new(config.http_timeout)?)
            }
            ProviderKind::Multi => {
                tracing::info!("Using price provider: Multi-provider (Yahoo + Alpha Vantage fallback)");
                Box::new(MultiProvider::new(
                    Box::new(YahooProvider::new(config.http_timeout)?),
                    Box::new(alphavantage()?),
                ))
            }
        };

        Ok(Self::new(
            Arc::new(CachedProvider::new(provider, config.cache_ttls)),
            Arc::new(HeuristicMetricsProvider),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::cached::CacheTtls;
    use std::time::Duration;

    fn config(provider: ProviderKind, key: Option<&str>) -> AppConfig {
        AppConfig {
            bind_addr: "127.0.0.1:0".parse().unwrap(),
            provider,
            alphavantage_api_key: key.map(str::to_string),
            http_timeout: Duration::from_secs(5),
            cache_ttls: CacheTtls::default(),
        }
    }

    #[test]
    fn test_missing_key_is_reported_as_such() {
        for provider in [ProviderKind::AlphaVantage, ProviderKind::Multi] {
            let err = AppState::from_config(&config(provider, None)).err().unwrap();
            assert_eq!(err, MarketDataError::MissingApiKey("alphavantage"));
            assert_eq!(err.to_string(), "no API key configured for alphavantage");
        }
    }

    #[test]
    fn test_yahoo_builds_without_key() {
        let state = AppState::from_config(&config(ProviderKind::Yahoo, None)).unwrap();
        assert_eq!(state.market_data.name(), "yahoo");
    }
}
