use axum::extract::State;
use axum::routing::post;
use axum::{Json, Router};
use tracing::{error, info};

use crate::errors::AppError;
use crate::models::{OptimizeRequest, OptimizedPortfolio};
use crate::services::optimization_service;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/", post(optimize))
}

/// POST /api/optimization
///
/// Optimize a holdings list for the requested risk tolerance. Holdings sent
/// without `currentPrice` are priced from the quote lookup.
///
/// Example body:
/// `{"holdings":[{"symbol":"AAPL","shares":10,"avgCost":150}],"riskTolerance":"Conservative"}`
#[axum::debug_handler]
pub async fn optimize(
    State(state): State<AppState>,
    Json(request): Json<OptimizeRequest>,
) -> Result<Json<OptimizedPortfolio>, AppError> {
    info!(
        "POST /api/optimization - {} holdings, {:?} tolerance",
        request.holdings.len(),
        request.risk_tolerance
    );

    let result = optimization_service::optimize_with_market_data(
        request,
        state.market_data.as_ref(),
        state.metrics_provider.as_ref(),
    )
    .await
    .map_err(|e| {
        error!("Optimization failed: {}", e);
        e
    })?;

    Ok(Json(result))
}
