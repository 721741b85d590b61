use analysis_core::{AnalysisError, PriceSeries, TRADING_DAYS_PER_YEAR};
use statrs::statistics::Statistics;

/// Ordinary least-squares line `price = intercept + slope * day_offset`,
/// where `day_offset` counts calendar days from the series' first date.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrendFit {
    pub intercept: f64,
    pub slope: f64,
    /// Day offset of the last observation
    pub last_day: i64,
    pub last_close: f64,
}

impl TrendFit {
    pub fn predict(&self, day_offset: f64) -> f64 {
        self.intercept + self.slope * day_offset
    }
}

pub fn fit_trend(series: &PriceSeries) -> Result<TrendFit, AnalysisError> {
    let (first, last) = match (series.first(), series.last()) {
        (Some(f), Some(l)) => (*f, *l),
        _ => {
            return Err(AnalysisError::InsufficientData(
                "Trend fit needs a non-empty series".to_string(),
            ))
        }
    };

    // Dates are unique, so two points means two distinct offsets
    if series.len() < 2 {
        return Err(AnalysisError::InsufficientData(format!(
            "Trend fit needs at least 2 distinct dates, got {}",
            series.len()
        )));
    }

    let xs: Vec<f64> = series
        .points()
        .iter()
        .map(|p| (p.date - first.date).num_days() as f64)
        .collect();
    let ys = series.closes();

    let x_mean = xs.as_slice().mean();
    let y_mean = ys.as_slice().mean();

    let (sxy, sxx) = xs.iter().zip(ys.iter()).fold((0.0, 0.0), |(sxy, sxx), (x, y)| {
        let dx = x - x_mean;
        (sxy + dx * (y - y_mean), sxx + dx * dx)
    });

    if sxx == 0.0 {
        return Err(AnalysisError::InsufficientData(
            "Trend fit has no variation in time".to_string(),
        ));
    }

    let slope = sxy / sxx;
    Ok(TrendFit {
        intercept: y_mean - slope * x_mean,
        slope,
        last_day: (last.date - first.date).num_days(),
        last_close: last.close,
    })
}

/// Annualized return implied by extending the fitted line
/// `252 * years_ahead` days past the last observation.
pub fn forecast_annualized_return(series: &PriceSeries, years_ahead: u32) -> Result<f64, AnalysisError> {
    if years_ahead == 0 {
        return Err(AnalysisError::CalculationError(
            "Forecast horizon must be at least one year".to_string(),
        ));
    }

    let fit = fit_trend(series)?;
    let future_day = fit.last_day as f64 + (TRADING_DAYS_PER_YEAR as f64 * years_ahead as f64);
    let predicted = fit.predict(future_day);

    if !predicted.is_finite() || predicted <= 0.0 {
        return Err(AnalysisError::CalculationError(format!(
            "Trend extrapolates to a non-positive price ({:.2})",
            predicted
        )));
    }

    tracing::debug!(
        "Trend fit slope={:.4} intercept={:.2}, predicted {:.2} vs last {:.2}",
        fit.slope,
        fit.intercept,
        predicted,
        fit.last_close
    );

    Ok((predicted / fit.last_close).powf(1.0 / years_ahead as f64) - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::PricePoint;
    use approx::assert_relative_eq;
    use chrono::{Duration, NaiveDate};

    fn start() -> NaiveDate {
        NaiveDate::from_ymd_opt(2019, 1, 1).unwrap()
    }

    fn linear_series(days: i64, step: i64) -> PriceSeries {
        PriceSeries::new(
            (0..days)
                .map(|i| {
                    let offset = i * step;
                    PricePoint::new(start() + Duration::days(offset), 100.0 + 0.5 * offset as f64)
                })
                .collect(),
        )
    }

    #[test]
    fn test_recovers_known_line() {
        let fit = fit_trend(&linear_series(400, 1)).unwrap();
        assert_relative_eq!(fit.slope, 0.5, epsilon = 1e-9);
        assert_relative_eq!(fit.intercept, 100.0, epsilon = 1e-7);
        assert_eq!(fit.last_day, 399);
    }

    #[test]
    fn test_offsets_use_calendar_days() {
        // Every third day: the slope is still per calendar day
        let fit = fit_trend(&linear_series(200, 3)).unwrap();
        assert_relative_eq!(fit.slope, 0.5, epsilon = 1e-9);
        assert_eq!(fit.last_day, 597);
    }

    #[test]
    fn test_forecast_matches_closed_form() {
        let series = linear_series(400, 1);
        let forecast = forecast_annualized_return(&series, 5).unwrap();

        let last_price = 100.0 + 0.5 * 399.0;
        let future_day = 399.0 + 252.0 * 5.0;
        let predicted: f64 = 100.0 + 0.5 * future_day;
        let expected = (predicted / last_price).powf(1.0 / 5.0) - 1.0;

        assert_relative_eq!(forecast, expected, epsilon = 1e-9);
    }

    #[test]
    fn test_flat_series_forecasts_zero() {
        let series = PriceSeries::new(
            (0..30)
                .map(|i| PricePoint::new(start() + Duration::days(i), 25.0))
                .collect(),
        );
        assert_relative_eq!(forecast_annualized_return(&series, 5).unwrap(), 0.0, epsilon = 1e-12);
    }

    #[test]
    fn test_single_point_is_insufficient() {
        let series = PriceSeries::new(vec![PricePoint::new(start(), 10.0)]);
        assert!(matches!(
            forecast_annualized_return(&series, 5),
            Err(AnalysisError::InsufficientData(_))
        ));
        assert!(matches!(
            fit_trend(&PriceSeries::default()),
            Err(AnalysisError::InsufficientData(_))
        ));
    }

    #[test]
    fn test_collapsing_trend_is_calculation_error() {
        let series = PriceSeries::new(
            (0..100)
                .map(|i| PricePoint::new(start() + Duration::days(i), 200.0 - 1.9 * i as f64))
                .collect(),
        );
        assert!(matches!(
            forecast_annualized_return(&series, 5),
            Err(AnalysisError::CalculationError(_))
        ));
    }

    #[test]
    fn test_zero_horizon_rejected() {
        assert!(matches!(
            forecast_annualized_return(&linear_series(10, 1), 0),
            Err(AnalysisError::CalculationError(_))
        ));
    }
}
