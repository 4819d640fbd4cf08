/// API route tests
///
/// Drives the full axum router with an in-memory market data provider:
/// - GET  /health
/// - POST /api/optimization
/// - POST /api/backtest (JSON and CSV)
/// - POST /api/portfolio/import
use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use axum::body::{to_bytes, Body};
use axum::http::{header, Request, StatusCode};
use axum::Router;
use chrono::{Duration, NaiveDate};
use serde_json::{json, Value};
use tower::ServiceExt;

use stockfolio_backend::app::create_app;
use stockfolio_backend::external::market_data::{MarketDataError, MarketDataProvider};
use stockfolio_backend::models::{PricePoint, Quote};
use stockfolio_backend::services::metrics_service::HeuristicMetricsProvider;
use stockfolio_backend::state::AppState;

#[derive(Default)]
struct InMemoryProvider {
    prices: HashMap<String, f64>,
    histories: HashMap<String, Vec<PricePoint>>,
    rate_limited: Vec<String>,
}

#[async_trait]
impl MarketDataProvider for InMemoryProvider {
    fn name(&self) -> &'static str {
        "in-memory"
    }

    async fn fetch_quote(&self, symbol: &str) -> Result<Quote, MarketDataError> {
        if self.rate_limited.iter().any(|s| s == symbol) {
            return Err(MarketDataError::RateLimited);
        }
        let price = *self
            .prices
            .get(symbol)
            .ok_or_else(|| MarketDataError::NotFound(symbol.to_string()))?;
        Ok(Quote {
            symbol: symbol.to_string(),
            name: format!("{} Inc.", symbol),
            price,
            change: 0.0,
            change_percent: 0.0,
            volume: 1_000_000.0,
            market_cap: 0.0,
            high_52_week: price,
            low_52_week: price,
        })
    }

    async fn fetch_daily_history(
        &self,
        symbol: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<PricePoint>, MarketDataError> {
        let points = self
            .histories
            .get(symbol)
            .ok_or_else(|| MarketDataError::Network(format!("no route to {}", symbol)))?;
        Ok(points
            .iter()
            .filter(|p| p.date >= start && p.date <= end)
            .copied()
            .collect())
    }
}

fn day(offset: i64) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 3, 1).unwrap() + Duration::days(offset)
}

fn app() -> Router {
    let provider = InMemoryProvider {
        prices: HashMap::from([("AAPL".to_string(), 175.0), ("GOOGL".to_string(), 208.0)]),
        histories: HashMap::from([
            (
                "AAPL".to_string(),
                (0..5).map(|i| PricePoint::new(day(i), 100.0 + i as f64)).collect(),
            ),
            ("GOOGL".to_string(), vec![]),
        ]),
        rate_limited: vec!["HOT".to_string()],
    };
    create_app(AppState::new(Arc::new(provider), Arc::new(HeuristicMetricsProvider)))
}

fn post_json(uri: &str, body: Value) -> Request<Body> {
    Request::builder()
        .method("POST")
        .uri(uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(Body::from(body.to_string()))
        .unwrap()
}

async fn body_string(response: axum::response::Response) -> String {
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    String::from_utf8(bytes.to_vec()).unwrap()
}

async fn body_json(response: axum::response::Response) -> Value {
    serde_json::from_str(&body_string(response).await).unwrap()
}

// ---------------------------------------------------------------------------
// Health
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_health() {
    let response = app()
        .oneshot(Request::builder().uri("/health").body(Body::empty()).unwrap())
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_string(response).await, "OK");
}

// ---------------------------------------------------------------------------
// Optimization
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_optimize_prices_holdings_from_quotes() {
    let request = post_json(
        "/api/optimization",
        json!({
            "holdings": [
                {"symbol": "AAPL", "shares": 10, "avgCost": 150},
                {"symbol": "GOOGL", "shares": 5, "avgCost": 200}
            ],
            "riskTolerance": "Conservative"
        }),
    );
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["strategy"], "minimum_variance");
    let total: f64 = body["weights"]
        .as_object()
        .unwrap()
        .values()
        .map(|w| w.as_f64().unwrap())
        .sum();
    assert!((total - 1.0).abs() < 1e-9);
    assert_eq!(body["summary"]["totalValue"], 2790.0);
    assert_eq!(body["correlations"]["AAPL"]["AAPL"], 1.0);
    assert!(body["var95"].as_f64().unwrap() > 0.0);
    assert!(body["rebalancingRecommendations"].is_array());
    assert_eq!(body["stockMetrics"].as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn test_optimize_defaults_to_moderate() {
    let request = post_json(
        "/api/optimization",
        json!({"holdings": [{"symbol": "MSFT", "shares": 3, "avgCost": 300, "currentPrice": 410}]}),
    );
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    let body = body_json(response).await;
    assert_eq!(body["strategy"], "mean_variance");
    assert_eq!(body["weights"]["MSFT"], 1.0);
}

#[tokio::test]
async fn test_optimize_unknown_symbol_is_unprocessable() {
    let request = post_json(
        "/api/optimization",
        json!({"holdings": [{"symbol": "AAPL", "shares": 1, "avgCost": 1}, {"symbol": "NOPE", "shares": 1, "avgCost": 1}]}),
    );
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    let body = body_json(response).await;
    assert!(body["error"].as_str().unwrap().contains("NOPE"));
}

#[tokio::test]
async fn test_optimize_rejects_empty_and_invalid_holdings() {
    let empty = post_json("/api/optimization", json!({"holdings": []}));
    assert_eq!(app().oneshot(empty).await.unwrap().status(), StatusCode::BAD_REQUEST);

    let zero = post_json(
        "/api/optimization",
        json!({"holdings": [{"symbol": "AAPL", "shares": 0, "avgCost": 150}]}),
    );
    assert_eq!(app().oneshot(zero).await.unwrap().status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn test_optimize_rate_limited_sets_retry_after() {
    let request = post_json(
        "/api/optimization",
        json!({"holdings": [{"symbol": "HOT", "shares": 1, "avgCost": 1}]}),
    );
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
    assert_eq!(response.headers().get("Retry-After").unwrap(), "60");
}

// ---------------------------------------------------------------------------
// Backtest
// ---------------------------------------------------------------------------

fn backtest_body() -> Value {
    json!({
        "holdings": [{"symbol": "AAPL", "shares": 2}, {"symbol": "GOOGL", "shares": 1}],
        "startDate": "2024-03-01",
        "endDate": "2024-03-05"
    })
}

#[tokio::test]
async fn test_backtest_json() {
    let response = app().oneshot(post_json("/api/backtest", backtest_body())).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(body["dates"].as_array().unwrap().len(), 5);
    assert_eq!(body["dates"][0], "2024-03-01");
    assert_eq!(body["portfolioValues"][0], 200.0);
    assert_eq!(body["portfolioValues"][4], 208.0);
    assert!((body["totalReturn"].as_f64().unwrap() - 0.04).abs() < 1e-12);
    assert_eq!(body["maxDrawdown"], 0.0);
    assert_eq!(body["skippedSymbols"], json!(["GOOGL"]));
}

#[tokio::test]
async fn test_backtest_csv() {
    let response = app()
        .oneshot(post_json("/api/backtest?format=csv", backtest_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::OK);
    assert!(response
        .headers()
        .get(header::CONTENT_TYPE)
        .unwrap()
        .to_str()
        .unwrap()
        .starts_with("text/csv"));

    let body = body_string(response).await;
    let lines: Vec<&str> = body.lines().collect();
    assert_eq!(lines[0], "date,portfolio_value,daily_return");
    assert_eq!(lines[1], "2024-03-01,200.00,0.000000");
    assert_eq!(lines.len(), 6);
}

#[tokio::test]
async fn test_backtest_fetch_failure_names_symbol() {
    let body = json!({
        "holdings": [{"symbol": "AAPL", "shares": 1}, {"symbol": "MSFT", "shares": 1}],
        "startDate": "2024-03-01",
        "endDate": "2024-03-05"
    });
    let response = app().oneshot(post_json("/api/backtest", body)).await.unwrap();
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert!(body_json(response).await["error"].as_str().unwrap().contains("MSFT"));
}

#[tokio::test]
async fn test_backtest_rejects_inverted_range_and_unknown_format() {
    let inverted = json!({
        "holdings": [{"symbol": "AAPL", "shares": 1}],
        "startDate": "2024-03-05",
        "endDate": "2024-03-01"
    });
    let response = app().oneshot(post_json("/api/backtest", inverted)).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let response = app()
        .oneshot(post_json("/api/backtest?format=xml", backtest_body()))
        .await
        .unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}

// ---------------------------------------------------------------------------
// Portfolio import
// ---------------------------------------------------------------------------

#[tokio::test]
async fn test_import_csv() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/portfolio/import")
        .header(header::CONTENT_TYPE, "text/csv")
        .body(Body::from("Symbol,Shares,AvgCost\naapl,10,150\nmsft,2,300.5\n"))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);

    let body = body_json(response).await;
    assert_eq!(
        body,
        json!([
            {"symbol": "AAPL", "shares": 10.0, "avgCost": 150.0},
            {"symbol": "MSFT", "shares": 2.0, "avgCost": 300.5}
        ])
    );
}

#[tokio::test]
async fn test_import_bad_csv_is_bad_request() {
    let request = Request::builder()
        .method("POST")
        .uri("/api/portfolio/import")
        .body(Body::from("symbol,shares\naapl,10\n"))
        .unwrap();
    let response = app().oneshot(request).await.unwrap();
    assert_eq!(response.status(), StatusCode::BAD_REQUEST);
}
