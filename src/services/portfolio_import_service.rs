use csv::{ReaderBuilder, StringRecord, Trim};
use tracing::info;

use crate::errors::AppError;
use crate::models::ImportedHolding;

const SYMBOL: &str = "symbol";
const SHARES: &str = "shares";
const AVG_COST: &str = "avgcost";

fn column(headers: &StringRecord, name: &str) -> Result<usize, AppError> {
    headers
        .iter()
        .position(|h| h.trim().eq_ignore_ascii_case(name))
        .ok_or_else(|| AppError::Validation(format!("CSV header is missing the '{}' column", name)))
}

fn positive_number(record: &StringRecord, idx: usize, name: &str, row: u64) -> Result<f64, AppError> {
    let raw = record
        .get(idx)
        .ok_or_else(|| AppError::Validation(format!("Row {}: missing {}", row, name)))?;
    let value: f64 = raw
        .parse()
        .map_err(|_| AppError::Validation(format!("Row {}: '{}' is not a valid {}", row, raw, name)))?;
    if !(value.is_finite() && value > 0.0) {
        return Err(AppError::Validation(format!("Row {}: {} must be positive", row, name)));
    }
    Ok(value)
}

/// Parse a `symbol,shares,avgCost` CSV into holdings.
///
/// Header names are matched case-insensitively and may appear in any order;
/// extra columns are ignored. Symbols are trimmed and uppercased.
pub fn parse_holdings_csv(body: &str) -> Result<Vec<ImportedHolding>, AppError> {
    let mut reader = ReaderBuilder::new()
        .trim(Trim::All)
        .flexible(true)
        .from_reader(body.as_bytes());

    let headers = reader.headers()?.clone();
    let symbol_idx = column(&headers, SYMBOL)?;
    let shares_idx = column(&headers, SHARES)?;
    let avg_cost_idx = column(&headers, AVG_COST)?;

    let mut holdings = Vec::new();
    for record in reader.records() {
        let record = record?;
        let row = record.position().map(|p| p.line()).unwrap_or_default();

        if record.iter().all(str::is_empty) {
            continue;
        }

        let symbol = record
            .get(symbol_idx)
            .map(|s| s.trim().to_uppercase())
            .filter(|s| !s.is_empty())
            .ok_or_else(|| AppError::Validation(format!("Row {}: missing symbol", row)))?;

        holdings.push(ImportedHolding {
            symbol,
            shares: positive_number(&record, shares_idx, SHARES, row)?,
            avg_cost: positive_number(&record, avg_cost_idx, "avgCost", row)?,
        });
    }

    if holdings.is_empty() {
        return Err(AppError::Validation("CSV contains no holdings".to_string()));
    }

    info!("Imported {} holdings from CSV", holdings.len());
    Ok(holdings)
}
