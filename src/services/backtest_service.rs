//! Historical replay of a fixed-share portfolio.
//!
//! Missing-data policy:
//! - a failed history fetch for any symbol fails the whole run, naming the symbol
//! - a symbol whose history is empty in range is skipped with a warning
//! - dates come from the first position (input order) that has data; a symbol
//!   without a close on one of those dates contributes nothing that day

use std::collections::{HashMap, HashSet};

use chrono::NaiveDate;
use futures::future::join_all;
use tracing::{info, warn};

use crate::errors::AppError;
use crate::external::market_data::MarketDataProvider;
use crate::models::{BacktestPosition, BacktestResult, PricePoint};

const DAYS_PER_YEAR: f64 = 365.0;

pub fn validate_positions(positions: &[BacktestPosition]) -> Result<(), AppError> {
    if positions.is_empty() {
        return Err(AppError::Validation("No holdings provided for backtest".to_string()));
    }

    let mut seen = HashSet::new();
    for p in positions {
        if p.symbol.is_empty() {
            return Err(AppError::Validation("Holding symbol must not be empty".to_string()));
        }
        if !seen.insert(p.symbol.as_str()) {
            return Err(AppError::Validation(format!("Duplicate holding symbol: {}", p.symbol)));
        }
        if !(p.shares.is_finite() && p.shares > 0.0) {
            return Err(AppError::Validation(format!("{}: shares must be positive", p.symbol)));
        }
    }
    Ok(())
}

/// Value `positions` over already-fetched daily closes.
///
/// `series` maps symbol to its closes in the requested range; a missing key
/// is treated the same as an empty series.
pub fn run_backtest(
    positions: &[BacktestPosition],
    series: &HashMap<String, Vec<PricePoint>>,
) -> Result<BacktestResult, AppError> {
    validate_positions(positions)?;

    let mut skipped_symbols = Vec::new();
    let mut priced: Vec<(&BacktestPosition, HashMap<NaiveDate, f64>)> = Vec::new();
    let mut dates: Vec<NaiveDate> = Vec::new();

    for position in positions {
        let points = series.get(&position.symbol).map(Vec::as_slice).unwrap_or_default();
        if points.is_empty() {
            skipped_symbols.push(position.symbol.clone());
            continue;
        }
        if dates.is_empty() {
            dates = points.iter().map(|p| p.date).collect();
            dates.sort_unstable();
            dates.dedup();
        }
        priced.push((position, points.iter().map(|p| (p.date, p.close)).collect()));
    }

    if !skipped_symbols.is_empty() {
        warn!("No price history in range for {}; excluded from backtest", skipped_symbols.join(", "));
    }
    if priced.is_empty() {
        return Err(AppError::NotFound(
            "No price history available for any holding in the requested range".to_string(),
        ));
    }

    let portfolio_values: Vec<f64> = dates
        .iter()
        .map(|date| {
            priced
                .iter()
                .filter_map(|(position, closes)| closes.get(date).map(|close| position.shares * close))
                .sum()
        })
        .collect();

    let total_return = total_return(&portfolio_values);
    let annualized_return = match (dates.first(), dates.last()) {
        (Some(first), Some(last)) => annualized_return(total_return, (*last - *first).num_days()),
        _ => total_return,
    };

    Ok(BacktestResult {
        returns: daily_returns(&portfolio_values),
        max_drawdown: max_drawdown(&portfolio_values),
        dates,
        portfolio_values,
        total_return,
        annualized_return,
        skipped_symbols,
    })
}

/// Day-over-day change; the first entry and any step from a zero value are 0.
pub fn daily_returns(values: &[f64]) -> Vec<f64> {
    let mut returns = Vec::with_capacity(values.len());
    if values.is_empty() {
        return returns;
    }
    returns.push(0.0);
    for pair in values.windows(2) {
        let (prev, curr) = (pair[0], pair[1]);
        returns.push(if prev > 0.0 { (curr - prev) / prev } else { 0.0 });
    }
    returns
}

pub fn total_return(values: &[f64]) -> f64 {
    match (values.first(), values.last()) {
        (Some(&first), Some(&last)) if first > 0.0 => (last - first) / first,
        _ => 0.0,
    }
}

/// Compound `total_return` over `elapsed_days`. With no elapsed time, or
/// when compounding a short span overflows, the total return is returned
/// unannualized.
pub fn annualized_return(total_return: f64, elapsed_days: i64) -> f64 {
    if elapsed_days <= 0 {
        return total_return;
    }
    let years = elapsed_days as f64 / DAYS_PER_YEAR;
    let annualized = (1.0 + total_return).powf(1.0 / years) - 1.0;
    if annualized.is_finite() {
        annualized
    } else {
        total_return
    }
}

/// Running maximum of `values`; never decreases.
pub fn running_peak(values: &[f64]) -> Vec<f64> {
    values
        .iter()
        .scan(f64::NEG_INFINITY, |peak, &v| {
            *peak = peak.max(v);
            Some(*peak)
        })
        .collect()
}

/// Largest peak-to-trough fall as a fraction of the peak, always >= 0.
pub fn max_drawdown(values: &[f64]) -> f64 {
    values
        .iter()
        .zip(running_peak(values))
        .map(|(&v, peak)| if peak > 0.0 { (peak - v) / peak } else { 0.0 })
        .fold(0.0, f64::max)
}

/// Fetch every position's history concurrently and run the backtest.
pub async fn backtest_portfolio(
    provider: &dyn MarketDataProvider,
    positions: &[BacktestPosition],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<BacktestResult, AppError> {
    if start > end {
        return Err(AppError::Validation(format!(
            "startDate {} is after endDate {}",
            start, end
        )));
    }

    let positions: Vec<BacktestPosition> = positions
        .iter()
        .map(|p| BacktestPosition::new(p.symbol.trim().to_uppercase(), p.shares))
        .collect();
    validate_positions(&positions)?;

    info!(
        "Backtesting {} holdings from {} to {} via {}",
        positions.len(),
        start,
        end,
        provider.name()
    );

    let fetches = positions
        .iter()
        .map(|p| provider.fetch_daily_history(&p.symbol, start, end));
    let results = join_all(fetches).await;

    let mut series = HashMap::with_capacity(positions.len());
    for (position, result) in positions.iter().zip(results) {
        let points = result.map_err(|e| AppError::from_market_data(&position.symbol, e))?;
        series.insert(position.symbol.clone(), points);
    }

    let result = run_backtest(&positions, &series)?;
    info!(
        "Backtest complete: {} days, total return {:.4}, max drawdown {:.4}",
        result.dates.len(),
        result.total_return,
        result.max_drawdown
    );
    Ok(result)
}

/// Render one `date,portfolio_value,daily_return` row per date.
pub fn to_csv(result: &BacktestResult) -> Result<String, AppError> {
    let write_err = |e: csv::Error| AppError::External(format!("Failed to write CSV: {}", e));
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer
        .write_record(["date", "portfolio_value", "daily_return"])
        .map_err(write_err)?;

    for ((date, value), ret) in result
        .dates
        .iter()
        .zip(&result.portfolio_values)
        .zip(&result.returns)
    {
        writer.write_record([
            date.format("%Y-%m-%d").to_string(),
            format!("{:.2}", value),
            format!("{:.6}", ret),
        ])
        .map_err(write_err)?;
    }

    let bytes = writer
        .into_inner()
        .map_err(|e| AppError::External(format!("Failed to flush CSV: {}", e)))?;
    String::from_utf8(bytes).map_err(|e| AppError::External(format!("CSV is not UTF-8: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::external::market_data::MarketDataError;
    use async_trait::async_trait;
    use chrono::Duration;

    fn day(offset: i64) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, 1).unwrap() + Duration::days(offset)
    }

    fn series_of(closes: &[f64]) -> Vec<PricePoint> {
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| PricePoint::new(day(i as i64), c))
            .collect()
    }

    #[test]
    fn test_two_symbols_sum_by_date() {
        let positions = vec![BacktestPosition::new("A", 2.0), BacktestPosition::new("B", 1.0)];
        let series = HashMap::from([
            ("A".to_string(), series_of(&[10.0, 11.0, 12.0])),
            ("B".to_string(), series_of(&[100.0, 90.0, 110.0])),
        ]);
        let result = run_backtest(&positions, &series).unwrap();

        assert_eq!(result.portfolio_values, vec![120.0, 112.0, 134.0]);
        assert_eq!(result.returns[0], 0.0);
        assert!((result.returns[1] - (112.0 - 120.0) / 120.0).abs() < 1e-12);
        assert!((result.total_return - 14.0 / 120.0).abs() < 1e-12);
        assert!((result.max_drawdown - 8.0 / 120.0).abs() < 1e-12);
        assert!(result.skipped_symbols.is_empty());
    }

    #[test]
    fn test_missing_date_contributes_zero() {
        let positions = vec![BacktestPosition::new("A", 1.0), BacktestPosition::new("B", 1.0)];
        let series = HashMap::from([
            ("A".to_string(), series_of(&[10.0, 10.0, 10.0])),
            ("B".to_string(), vec![PricePoint::new(day(0), 5.0), PricePoint::new(day(2), 5.0)]),
        ]);
        let result = run_backtest(&positions, &series).unwrap();
        assert_eq!(result.portfolio_values, vec![15.0, 10.0, 15.0]);
    }

    #[test]
    fn test_reference_dates_come_from_first_symbol_with_data() {
        let positions = vec![
            BacktestPosition::new("EMPTY", 1.0),
            BacktestPosition::new("A", 1.0),
            BacktestPosition::new("B", 1.0),
        ];
        let series = HashMap::from([
            ("EMPTY".to_string(), vec![]),
            ("A".to_string(), series_of(&[1.0, 2.0])),
            ("B".to_string(), series_of(&[1.0, 1.0, 1.0, 1.0])),
        ]);
        let result = run_backtest(&positions, &series).unwrap();
        assert_eq!(result.dates, vec![day(0), day(1)]);
        assert_eq!(result.skipped_symbols, vec!["EMPTY".to_string()]);
    }

    #[test]
    fn test_all_empty_is_not_found() {
        let positions = vec![BacktestPosition::new("A", 1.0)];
        let series = HashMap::from([("A".to_string(), vec![])]);
        assert!(matches!(run_backtest(&positions, &series), Err(AppError::NotFound(_))));
    }

    #[test]
    fn test_annualized_return() {
        // Doubling over exactly one year
        assert!((annualized_return(1.0, 365) - 1.0).abs() < 1e-12);
        // Same total over two years compounds to sqrt(2) - 1
        assert!((annualized_return(1.0, 730) - (2f64.sqrt() - 1.0)).abs() < 1e-12);
        assert_eq!(annualized_return(0.05, 0), 0.05);
        assert_eq!(annualized_return(-1.0, 10), -1.0);
    }

    #[test]
    fn test_annualized_return_overflow_falls_back_to_total() {
        // 12x in a day compounds past f64::MAX
        assert_eq!(annualized_return(11.0, 1), 11.0);
        assert!(annualized_return(11.0, 1).is_finite());
    }

    #[test]
    fn test_zero_value_sentinels() {
        assert_eq!(daily_returns(&[0.0, 10.0, 5.0]), vec![0.0, 0.0, -0.5]);
        assert_eq!(total_return(&[0.0, 10.0]), 0.0);
        assert_eq!(total_return(&[]), 0.0);
        assert_eq!(max_drawdown(&[0.0, 0.0]), 0.0);
        assert!(daily_returns(&[]).is_empty());
    }

    #[test]
    fn test_running_peak_is_monotonic() {
        let peaks = running_peak(&[3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0]);
        assert_eq!(peaks, vec![3.0, 3.0, 4.0, 4.0, 5.0, 9.0, 9.0]);
        assert!((max_drawdown(&[3.0, 1.0, 4.0, 1.0, 5.0, 9.0, 2.0]) - 7.0 / 9.0).abs() < 1e-12);
    }

    #[test]
    fn test_validate_positions() {
        assert!(validate_positions(&[]).is_err());
        assert!(validate_positions(&[BacktestPosition::new("A", 0.0)]).is_err());
        assert!(validate_positions(&[BacktestPosition::new("A", 1.0), BacktestPosition::new("A", 2.0)]).is_err());
        assert!(validate_positions(&[BacktestPosition::new("A", 1.5)]).is_ok());
    }

    #[test]
    fn test_csv_export() {
        let positions = vec![BacktestPosition::new("A", 10.0)];
        let series = HashMap::from([("A".to_string(), series_of(&[100.0, 110.0]))]);
        let result = run_backtest(&positions, &series).unwrap();

        let csv = to_csv(&result).unwrap();
        let lines: Vec<&str> = csv.lines().collect();
        assert_eq!(lines[0], "date,portfolio_value,daily_return");
        assert_eq!(lines[1], "2024-01-01,1000.00,0.000000");
        assert_eq!(lines[2], "2024-01-02,1100.00,0.100000");
        assert_eq!(lines.len(), 3);
    }

    struct Histories(HashMap<String, Result<Vec<PricePoint>, MarketDataError>>);

    #[async_trait]
    impl MarketDataProvider for Histories {
        fn name(&self) -> &'static str {
            "histories"
        }

        async fn fetch_quote(&self, _symbol: &str) -> Result<crate::models::Quote, MarketDataError> {
            Err(MarketDataError::Unsupported("histories"))
        }

        async fn fetch_daily_history(
            &self,
            symbol: &str,
            _start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<Vec<PricePoint>, MarketDataError> {
            self.0
                .get(symbol)
                .cloned()
                .unwrap_or_else(|| Err(MarketDataError::NotFound(symbol.to_string())))
        }
    }

    #[tokio::test]
    async fn test_fetch_failure_names_symbol() {
        let provider = Histories(HashMap::from([
            ("AAPL".to_string(), Ok(series_of(&[1.0, 2.0]))),
            ("MSFT".to_string(), Err(MarketDataError::Network("reset".into()))),
        ]));
        let positions = vec![BacktestPosition::new("aapl", 1.0), BacktestPosition::new("MSFT", 1.0)];
        let err = backtest_portfolio(&provider, &positions, day(0), day(5)).await.unwrap_err();
        match err {
            AppError::DataUnavailable { symbol, .. } => assert_eq!(symbol, "MSFT"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_backtest_portfolio_normalizes_symbols() {
        let provider = Histories(HashMap::from([("AAPL".to_string(), Ok(series_of(&[1.0, 2.0])))]));
        let positions = vec![BacktestPosition::new(" aapl ", 3.0)];
        let result = backtest_portfolio(&provider, &positions, day(0), day(1)).await.unwrap();
        assert_eq!(result.portfolio_values, vec![3.0, 6.0]);
    }

    #[tokio::test]
    async fn test_inverted_range_is_rejected() {
        let provider = Histories(HashMap::new());
        let positions = vec![BacktestPosition::new("AAPL", 1.0)];
        let err = backtest_portfolio(&provider, &positions, day(5), day(0)).await.unwrap_err();
        assert!(matches!(err, AppError::Validation(_)));
    }
}
