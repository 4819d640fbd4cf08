use std::collections::{BTreeMap, HashMap};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use serde::Deserialize;
use tracing::{debug, warn};

use crate::external::market_data::{clip_to_range, MarketDataError, MarketDataProvider};
use crate::models::{FundamentalData, PricePoint, Quote};

const BASE_URL: &str = "https://www.alphavantage.co/query";

pub struct AlphaVantageProvider {
    client: reqwest::Client,
    api_key: String,
}

impl AlphaVantageProvider {
    pub fn new(api_key: impl Into<String>, timeout: Duration) -> Result<Self, MarketDataError> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| MarketDataError::Network(e.to_string()))?;

        Ok(Self {
            client,
            api_key: api_key.into(),
        })
    }

    async fn query<T: for<'de> Deserialize<'de>>(&self, params: &[(&str, &str)]) -> Result<T, MarketDataError> {
        let resp = self
            .client
            .get(BASE_URL)
            .query(params)
            .query(&[("apikey", self.api_key.as_str())])
            .send()
            .await
            .map_err(|e| MarketDataError::Network(e.to_string()))?;

        if resp.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(MarketDataError::RateLimited);
        }

        resp.json::<T>()
            .await
            .map_err(|e| MarketDataError::Parse(e.to_string()))
    }
}

// Throttled calls come back as 200 with a "Note" or "Information" message,
// invalid symbols with "Error Message".
#[derive(Debug, Deserialize)]
struct AvEnvelope {
    #[serde(rename = "Note")]
    note: Option<String>,
    #[serde(rename = "Information")]
    information: Option<String>,
    #[serde(rename = "Error Message")]
    error_message: Option<String>,
}

impl AvEnvelope {
    fn check(&self, symbol: &str) -> Result<(), MarketDataError> {
        if self.note.is_some() || self.information.is_some() {
            return Err(MarketDataError::RateLimited);
        }
        if let Some(msg) = &self.error_message {
            debug!("Alpha Vantage error for {}: {}", symbol, msg);
            return Err(MarketDataError::NotFound(symbol.to_string()));
        }
        Ok(())
    }
}

#[derive(Debug, Deserialize)]
struct AvDailyResponse {
    #[serde(flatten)]
    envelope: AvEnvelope,
    #[serde(rename = "Time Series (Daily)")]
    time_series: Option<BTreeMap<String, AvDailyBar>>,
}

#[derive(Debug, Deserialize)]
struct AvDailyBar {
    #[serde(rename = "4. close")]
    close: String,
    #[serde(rename = "5. adjusted close")]
    adjusted_close: Option<String>,
}

#[derive(Debug, Deserialize)]
struct AvQuoteResponse {
    #[serde(flatten)]
    envelope: AvEnvelope,
    #[serde(rename = "Global Quote")]
    global_quote: Option<HashMap<String, String>>,
}

#[derive(Debug, Deserialize)]
struct AvOverviewResponse {
    #[serde(flatten)]
    envelope: AvEnvelope,
    #[serde(flatten)]
    fields: HashMap<String, serde_json::Value>,
}

fn parse_daily(
    symbol: &str,
    body: AvDailyResponse,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<PricePoint>, MarketDataError> {
    body.envelope.check(symbol)?;

    let series = body
        .time_series
        .ok_or_else(|| MarketDataError::BadResponse("missing time series".into()))?;

    let mut out = Vec::with_capacity(series.len());
    for (date_str, bar) in series {
        let date = NaiveDate::parse_from_str(&date_str, "%Y-%m-%d")
            .map_err(|e| MarketDataError::Parse(e.to_string()))?;
        if date < start || date > end {
            continue;
        }
        let raw = bar.adjusted_close.as_deref().unwrap_or(&bar.close);
        let close = raw
            .parse::<f64>()
            .map_err(|e| MarketDataError::Parse(e.to_string()))?;
        out.push(PricePoint::new(date, close));
    }

    Ok(clip_to_range(out, start, end))
}

fn number_field(fields: &HashMap<String, String>, key: &str) -> Option<f64> {
    fields
        .get(key)
        .map(|v| v.trim_end_matches('%'))
        .and_then(|v| v.parse::<f64>().ok())
}

fn parse_global_quote(symbol: &str, body: AvQuoteResponse) -> Result<Quote, MarketDataError> {
    body.envelope.check(symbol)?;

    let fields = body
        .global_quote
        .filter(|q| !q.is_empty())
        .ok_or_else(|| MarketDataError::NotFound(symbol.to_string()))?;

    let price = number_field(&fields, "05. price")
        .ok_or_else(|| MarketDataError::Parse("missing price".into()))?;

    Ok(Quote {
        symbol: fields
            .get("01. symbol")
            .cloned()
            .unwrap_or_else(|| symbol.to_string()),
        name: symbol.to_string(),
        price,
        change: number_field(&fields, "09. change").unwrap_or(0.0),
        change_percent: number_field(&fields, "10. change percent").unwrap_or(0.0),
        volume: number_field(&fields, "06. volume").unwrap_or(0.0),
        market_cap: 0.0,
        high_52_week: price,
        low_52_week: price,
    })
}

// Overview values are strings, with "None" or "-" for missing data.
fn overview_number(fields: &HashMap<String, serde_json::Value>, key: &str) -> Option<f64> {
    fields
        .get(key)
        .and_then(|v| v.as_str())
        .and_then(|v| v.parse::<f64>().ok())
}

fn parse_overview(symbol: &str, body: AvOverviewResponse) -> Result<(FundamentalData, Option<String>, Option<f64>, Option<f64>), MarketDataError> {
    body.envelope.check(symbol)?;

    if !body.fields.contains_key("Symbol") {
        return Err(MarketDataError::NotFound(symbol.to_string()));
    }

    let f = &body.fields;
    let data = FundamentalData {
        symbol: symbol.to_string(),
        market_cap: overview_number(f, "MarketCapitalization"),
        pe_ratio: overview_number(f, "PERatio"),
        peg_ratio: overview_number(f, "PEGRatio"),
        price_to_book: overview_number(f, "PriceToBookRatio"),
        profit_margin: overview_number(f, "ProfitMargin"),
        operating_margin: overview_number(f, "OperatingMarginTTM"),
        return_on_equity: overview_number(f, "ReturnOnEquityTTM"),
        beta: overview_number(f, "Beta"),
    };
    let name = f.get("Name").and_then(|v| v.as_str()).map(str::to_string);

    Ok((
        data,
        name,
        overview_number(f, "52WeekHigh"),
        overview_number(f, "52WeekLow"),
    ))
}

#[async_trait]
impl MarketDataProvider for AlphaVantageProvider {
    fn name(&self) -> &'static str {
        "alphavantage"
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        let body: AvQuoteResponse = self
            .query(&[("function", "GLOBAL_QUOTE"), ("symbol", symbol)])
            .await?;
        let mut quote = parse_global_quote(symbol, body)?;

        // Name, market cap and 52-week range live on the overview endpoint
        match self
            .query::<AvOverviewResponse>(&[("function", "OVERVIEW"), ("symbol", symbol)])
            .await
            .and_then(|body| parse_overview(symbol, body))
        {
            Ok((fundamentals, name, high, low)) => {
                if let Some(name) = name {
                    quote.name = name;
                }
                quote.market_cap = fundamentals.market_cap.unwrap_or(0.0);
                quote.high_52_week = high.unwrap_or(quote.high_52_week);
                quote.low_52_week = low.unwrap_or(quote.low_52_week);
            }
            Err(e) => warn!("Alpha Vantage overview unavailable for {}: {}", symbol, e),
        }

        Ok(quote)
    }

    async fn fetch_daily_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, MarketDataError> {
        // compact = latest ~100 trading days, full = 20+ years
        let days_back = (Utc::now().date_naive() - start).num_days();
        let outputsize = if days_back <= 100 { "compact" } else { "full" };

        let body: AvDailyResponse = self
            .query(&[
                ("function", "TIME_SERIES_DAILY"),
                ("symbol", symbol),
                ("outputsize", outputsize),
            ])
            .await?;

        parse_daily(symbol, body, start, end)
    }

    async fn fetch_fundamentals(&self, symbol: &str) -> Result<FundamentalData, MarketDataError> {
        let body: AvOverviewResponse = self
            .query(&[("function", "OVERVIEW"), ("symbol", symbol)])
            .await?;
        parse_overview(symbol, body).map(|(data, ..)| data)
    }
}
