use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{anyhow, Context, Result};

use crate::external::cached::CacheTtls;

/// Which market-data source backs quote and history lookups.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProviderKind {
    AlphaVantage,
    Yahoo,
    /// Yahoo first, Alpha Vantage on failure
    Multi,
}

impl FromStr for ProviderKind {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_lowercase().as_str() {
            "alphavantage" => Ok(ProviderKind::AlphaVantage),
            "yahoo" => Ok(ProviderKind::Yahoo),
            "multi" => Ok(ProviderKind::Multi),
            other => Err(anyhow!(
                "Invalid PRICE_PROVIDER: {}. Must be 'alphavantage', 'yahoo', or 'multi'",
                other
            )),
        }
    }
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub bind_addr: SocketAddr,
    pub provider: ProviderKind,
    pub alphavantage_api_key: Option<String>,
    pub http_timeout: Duration,
    pub cache_ttls: CacheTtls,
}

impl AppConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from any key lookup; `from_env` passes the process environment.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let bind_addr = lookup("BIND_ADDR")
            .unwrap_or_else(|| "0.0.0.0:3000".to_string())
            .parse::<SocketAddr>()
            .context("BIND_ADDR must be a socket address such as 0.0.0.0:3000")?;

        let provider = match lookup("PRICE_PROVIDER") {
            Some(value) => value.parse()?,
            None => ProviderKind::Multi,
        };

        let alphavantage_api_key = lookup("ALPHAVANTAGE_API_KEY").filter(|k| !k.trim().is_empty());
        if provider != ProviderKind::Yahoo && alphavantage_api_key.is_none() {
            return Err(anyhow!(
                "ALPHAVANTAGE_API_KEY is required when PRICE_PROVIDER is {:?}",
                provider
            ));
        }

        let seconds = |key: &str, default: u64| -> Result<Duration> {
            match lookup(key) {
                Some(raw) => raw
                    .trim()
                    .parse::<u64>()
                    .map(Duration::from_secs)
                    .with_context(|| format!("{} must be a whole number of seconds, got '{}'", key, raw)),
                None => Ok(Duration::from_secs(default)),
            }
        };

        let defaults = CacheTtls::default();
        Ok(Self {
            bind_addr,
            provider,
            alphavantage_api_key,
            http_timeout: seconds("HTTP_TIMEOUT_SECS", 10)?,
            cache_ttls: CacheTtls {
                quote: seconds("QUOTE_CACHE_TTL_SECS", defaults.quote.as_secs())?,
                history: seconds("HISTORY_CACHE_TTL_SECS", defaults.history.as_secs())?,
                fundamentals: seconds("FUNDAMENTALS_CACHE_TTL_SECS", defaults.fundamentals.as_secs())?,
            },
        })
    }
}
