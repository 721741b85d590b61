use analysis_core::ReturnProfile;
use serde::{Deserialize, Serialize};

pub const DEFAULT_HISTORICAL_WEIGHT: f64 = 0.5;
pub const DEFAULT_VALUATION_WEIGHT: f64 = 0.25;
pub const DEFAULT_FORECAST_WEIGHT: f64 = 0.25;

/// Blend of past performance, undervaluation and trend forecast.
///
/// `score = historical * avg(5Y, 10Y) + valuation * pct / 100 + forecast * forecast`
///
/// Absent inputs contribute nothing; the historical average is taken over
/// whichever of the 5Y and 10Y returns exist.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScoringWeights {
    pub historical: f64,
    pub valuation: f64,
    pub forecast: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            historical: DEFAULT_HISTORICAL_WEIGHT,
            valuation: DEFAULT_VALUATION_WEIGHT,
            forecast: DEFAULT_FORECAST_WEIGHT,
        }
    }
}

impl ScoringWeights {
    pub fn score(
        &self,
        returns: &ReturnProfile,
        undervaluation_pct: Option<f64>,
        forecast: Option<f64>,
    ) -> f64 {
        let historical = historical_component(returns).unwrap_or(0.0);
        let valuation = undervaluation_pct.map(|pct| pct / 100.0).unwrap_or(0.0);
        let forecast = forecast.unwrap_or(0.0);

        self.historical * historical + self.valuation * valuation + self.forecast * forecast
    }

    pub fn total(&self) -> f64 {
        self.historical + self.valuation + self.forecast
    }
}

/// Mean of the 5Y and 10Y annualized returns that are present.
pub fn historical_component(returns: &ReturnProfile) -> Option<f64> {
    let present: Vec<f64> = [returns.five_year, returns.ten_year]
        .into_iter()
        .flatten()
        .collect();

    if present.is_empty() {
        None
    } else {
        Some(present.iter().sum::<f64>() / present.len() as f64)
    }
}
