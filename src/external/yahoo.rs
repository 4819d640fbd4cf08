use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDate};
use serde::Deserialize;

use crate::external::market_data::{clip_to_range, MarketDataError, MarketDataProvider};
use crate::models::{PricePoint, Quote};

/// Keyless Yahoo Finance chart endpoint. Fundamentals are not available here.
pub struct YahooProvider {
    client: reqwest::Client,
}

impl YahooProvider {
    pub fn new(timeout: Duration) -> Result<Self, MarketDataError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .user_agent("Mozilla/5.0 (compatible; stockfolio)")
            .build()
            .map_err(|e| MarketDataError::Network(e.to_string()))?;
        Ok(Self { client })
    }

    async fn chart(&self, symbol: &str, query: &[(&str, String)]) -> Result<YahooChartResponse, MarketDataError> {
        let url = format!("https://query1.finance.yahoo.com/v8/finance/chart/{symbol}");

        let resp = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| MarketDataError::Network(e.to_string()))?;

        match resp.status() {
            reqwest::StatusCode::TOO_MANY_REQUESTS => return Err(MarketDataError::RateLimited),
            reqwest::StatusCode::NOT_FOUND => return Err(MarketDataError::NotFound(symbol.to_string())),
            _ => {}
        }

        resp.json::<YahooChartResponse>()
            .await
            .map_err(|e| MarketDataError::Parse(e.to_string()))
    }
}

// Minimal response structs (only what we need)
#[derive(Debug, Deserialize)]
struct YahooChartResponse {
    chart: YahooChart,
}

#[derive(Debug, Deserialize)]
struct YahooChart {
    result: Option<Vec<YahooResult>>,
    error: Option<YahooError>,
}

#[derive(Debug, Deserialize)]
struct YahooError {
    code: String,
    description: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YahooResult {
    meta: YahooMeta,
    #[serde(default)]
    timestamp: Vec<i64>,
    indicators: YahooIndicators,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct YahooMeta {
    symbol: String,
    regular_market_price: Option<f64>,
    chart_previous_close: Option<f64>,
    regular_market_volume: Option<f64>,
    fifty_two_week_high: Option<f64>,
    fifty_two_week_low: Option<f64>,
    long_name: Option<String>,
    short_name: Option<String>,
}

#[derive(Debug, Deserialize)]
struct YahooIndicators {
    quote: Vec<YahooQuote>,
}

#[derive(Debug, Deserialize)]
struct YahooQuote {
    #[serde(default)]
    close: Vec<Option<f64>>,
}

fn first_result(symbol: &str, body: YahooChartResponse) -> Result<YahooResult, MarketDataError> {
    if let Some(err) = body.chart.error {
        if err.code.eq_ignore_ascii_case("Not Found") {
            return Err(MarketDataError::NotFound(symbol.to_string()));
        }
        return Err(MarketDataError::BadResponse(
            err.description.unwrap_or(err.code),
        ));
    }

    body.chart
        .result
        .and_then(|mut r| r.pop())
        .ok_or_else(|| MarketDataError::BadResponse("missing result".into()))
}

fn parse_history(
    symbol: &str,
    body: YahooChartResponse,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<PricePoint>, MarketDataError> {
    let result = first_result(symbol, body)?;

    // An empty range has no quote block at all
    let Some(quote) = result.indicators.quote.first() else {
        return Ok(Vec::new());
    };

    let mut out = Vec::with_capacity(result.timestamp.len());
    for (i, ts) in result.timestamp.iter().enumerate() {
        // skip missing closes
        let Some(close) = quote.close.get(i).copied().flatten() else { continue };

        let dt = DateTime::from_timestamp(*ts, 0)
            .ok_or_else(|| MarketDataError::Parse("bad timestamp".into()))?;
        out.push(PricePoint::new(dt.date_naive(), close));
    }

    Ok(clip_to_range(out, start, end))
}

fn parse_quote(symbol: &str, body: YahooChartResponse) -> Result<Quote, MarketDataError> {
    let meta = first_result(symbol, body)?.meta;

    let price = meta
        .regular_market_price
        .ok_or_else(|| MarketDataError::NotFound(symbol.to_string()))?;
    let previous = meta.chart_previous_close.unwrap_or(price);
    let change = price - previous;
    let change_percent = if previous > 0.0 { change / previous * 100.0 } else { 0.0 };

    Ok(Quote {
        name: meta
            .long_name
            .or(meta.short_name)
            .unwrap_or_else(|| meta.symbol.clone()),
        symbol: meta.symbol,
        price,
        change,
        change_percent,
        volume: meta.regular_market_volume.unwrap_or(0.0),
        market_cap: 0.0,
        high_52_week: meta.fifty_two_week_high.unwrap_or(price),
        low_52_week: meta.fifty_two_week_low.unwrap_or(price),
    })
}

#[async_trait]
impl MarketDataProvider for YahooProvider {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let body = self
            .chart(symbol, &[("range", "5d".to_string()), ("interval", "1d".to_string())])
            .await?;
        parse_quote(symbol, body)
    }

    async fn fetch_daily_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, MarketDataError> {
        let period1 = start
            .and_hms_opt(0, 0, 0)
            .map(|t| t.and_utc().timestamp())
            .ok_or_else(|| MarketDataError::Parse("bad start date".into()))?;
        // period2 is exclusive
        let period2 = end
            .succ_opt()
            .and_then(|d| d.and_hms_opt(0, 0, 0))
            .map(|t| t.and_utc().timestamp())
            .ok_or_else(|| MarketDataError::Parse("bad end date".into()))?;

        let body = self
            .chart(
                symbol,
                &[
                    ("period1", period1.to_string()),
                    ("period2", period2.to_string()),
                    ("interval", "1d".to_string()),
                ],
            )
            .await?;

        parse_history(symbol, body, start, end)
    }
}
