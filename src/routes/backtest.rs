use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::routing::post;
use axum::{Json, Router};
use tracing::{error, info};

use crate::errors::AppError;
use crate::models::{BacktestQueryParams, BacktestRequest};
use crate::services::backtest_service;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(run_backtest))
}

/// POST /api/backtest
///
/// Replay fixed share counts over daily closes in `[startDate, endDate]`.
/// `?format=csv` returns `date,portfolio_value,daily_return` rows instead of JSON.
#[axum::debug_handler]
pub async fn run_backtest(
    State(state): State<AppState>,
    Query(params): Query<BacktestQueryParams>,
    Json(request): Json<BacktestRequest>,
) -> Result<Response, AppError> {
    info!(
        "POST /api/backtest - {} holdings, {} to {}",
        request.holdings.len(),
        request.start_date,
        request.end_date
    );

    let result = backtest_service::backtest_portfolio(
        state.market_data.as_ref(),
        &request.holdings,
        request.start_date,
        request.end_date,
    )
    .await
    .map_err(|e| {
        error!("Backtest failed: {}", e);
        e
    })?;

    match params.format.as_deref().map(str::to_lowercase).as_deref() {
        None | Some("json") => Ok(Json(result).into_response()),
        Some("csv") => {
            let body = backtest_service::to_csv(&result)?;
            Ok((
                [
                    (header::CONTENT_TYPE, "text/csv; charset=utf-8"),
                    (header::CONTENT_DISPOSITION, "attachment; filename=\"backtest.csv\""),
                ],
                body,
            )
                .into_response())
        }
        Some(other) => Err(AppError::Validation(format!(
            "Unsupported format '{}'; use json or csv",
            other
        ))),
    }
}
