use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::IntoResponse;
use axum::Json;
use serde_json::json;
use thiserror::Error;

use crate::external::market_data::MarketDataError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    Validation(String),
    #[error("Market data unavailable for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },
    #[error("Not found: {0}")]
    NotFound(String),
    #[error("Rate limited by external provider")]
    RateLimited,
    #[error("External error: {0}")]
    External(String),
}

impl AppError {
    /// Attach the failing symbol to an adapter error.
    pub fn from_market_data(symbol: &str, err: MarketDataError) -> Self {
        match err {
            MarketDataError::RateLimited => AppError::RateLimited,
            other => AppError::DataUnavailable {
                symbol: symbol.to_string(),
                reason: other.to_string(),
            },
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let message = self.to_string();
        match self {
            AppError::Validation(_) => (StatusCode::BAD_REQUEST, Json(json!({ "error": message }))).into_response(),
            AppError::NotFound(_) => (StatusCode::NOT_FOUND, Json(json!({ "error": message }))).into_response(),
            AppError::DataUnavailable { .. } => {
                (StatusCode::UNPROCESSABLE_ENTITY, Json(json!({ "error": message }))).into_response()
            }
            AppError::RateLimited => {
                let mut headers = HeaderMap::new();
                headers.insert("Retry-After", HeaderValue::from_static("60"));
                (StatusCode::TOO_MANY_REQUESTS, headers, Json(json!({ "error": message }))).into_response()
            }
            AppError::External(_) => (StatusCode::BAD_GATEWAY, Json(json!({ "error": message }))).into_response(),
        }
    }
}

impl From<csv::Error> for AppError {
    fn from(value: csv::Error) -> Self {
        AppError::Validation(format!("Malformed CSV: {}", value))
    }
}
