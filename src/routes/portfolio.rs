use axum::routing::post;
use axum::{Json, Router};
use tracing::info;

use crate::errors::AppError;
use crate::models::ImportedHolding;
use crate::services::portfolio_import_service;
use crate::state::AppState;

pub fn router() -> Router<AppState> {
    Router::new().route("/import", post(import_holdings))
}

/// POST /api/portfolio/import
///
/// Body is raw CSV with `symbol`, `shares` and `avgCost` columns.
pub async fn import_holdings(body: String) -> Result<Json<Vec<ImportedHolding>>, AppError> {
    info!("POST /api/portfolio/import - {} bytes", body.len());
    let holdings = portfolio_import_service::parse_holdings_csv(&body)?;
    Ok(Json(holdings))
}
