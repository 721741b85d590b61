use analysis_core::{Horizon, RankingReport, ScoreRow};
use tabled::builder::Builder;

const ABSENT: &str = "—";

/// Fractional return as a percentage, e.g. `0.1234` -> `12.34%`
pub fn pct(value: Option<f64>) -> String {
    value.map_or_else(|| ABSENT.to_string(), |v| format!("{:.2}%", v * 100.0))
}

/// Value that is already a percentage
pub fn pct_points(value: Option<f64>) -> String {
    value.map_or_else(|| ABSENT.to_string(), |v| format!("{:.2}%", v))
}

pub fn ratio(value: Option<f64>) -> String {
    value.map_or_else(|| ABSENT.to_string(), |v| format!("{:.2}", v))
}

fn header(forecast_years: u32) -> Vec<String> {
    let mut columns = vec!["Symbol".to_string(), "P/E".to_string(), "P/B".to_string()];
    columns.extend(Horizon::ALL.iter().map(|h| h.label().to_string()));
    columns.push("Undervaluation %".to_string());
    columns.push(format!("Forecast {}Y", forecast_years));
    columns.push("Score".to_string());
    columns
}

fn record(row: &ScoreRow) -> Vec<String> {
    let mut cells = vec![row.symbol.clone(), ratio(row.trailing_pe), ratio(row.price_to_book)];
    cells.extend(row.returns.iter().map(|(_, value)| pct(value)));
    cells.push(pct_points(row.undervaluation_pct));
    cells.push(pct(row.forecast_5y));
    cells.push(format!("{:.2}", row.score));
    cells
}

pub fn table(report: &RankingReport) -> String {
    let mut builder = Builder::default();
    builder.push_record(header(report.forecast_years));
    for row in &report.rows {
        builder.push_record(record(row));
    }
    builder.build().to_string()
}

pub fn failures(report: &RankingReport) -> Vec<String> {
    report
        .failures
        .iter()
        .map(|f| format!("Warning: no data for {} ({})", f.symbol, f.reason))
        .collect()
}
