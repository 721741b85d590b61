use analysis_core::{Horizon, PriceSeries, ReturnProfile, TRADING_DAYS_PER_YEAR};
use chrono::{Datelike, Duration, NaiveDate};

/// Shortest period a since-inception return is annualized over.
///
/// Histories shorter than this report their plain total return; raising a
/// ratio to `1/years` for a few weeks of data produces meaningless values.
pub const MIN_ANNUALIZATION_YEARS: f64 = 1.0;

/// Annualized return over the trailing `years`, or `None` when the series
/// holds fewer than `252 * years` observations.
pub fn annualized_return(series: &PriceSeries, years: u32) -> Option<f64> {
    if years == 0 {
        return None;
    }

    let window = TRADING_DAYS_PER_YEAR * years as usize;
    let points = series.points();
    if points.len() < window {
        return None;
    }

    let start = points[points.len() - window].close;
    let end = points[points.len() - 1].close;
    Some((end / start).powf(1.0 / years as f64) - 1.0)
}

/// Annualized return from the first to the last observation.
pub fn since_inception_return(series: &PriceSeries) -> Option<f64> {
    if series.len() < 2 {
        return None;
    }

    let first = series.first()?.close;
    let last = series.last()?.close;
    let years = (series.len() as f64 / TRADING_DAYS_PER_YEAR as f64).max(MIN_ANNUALIZATION_YEARS);
    Some((last / first).powf(1.0 / years) - 1.0)
}

/// Days after Jan 1 within which the year's first session can fall
/// (Jan 1 holiday followed by a weekend).
const OPENING_WINDOW_DAYS: i64 = 3;

/// Simple (not annualized) return since the first session of `as_of`'s year.
///
/// `None` when nothing was observed this year, or when the history begins
/// after the year's opening sessions so there is no year-start price.
pub fn year_to_date_return(series: &PriceSeries, as_of: NaiveDate) -> Option<f64> {
    let year_start = NaiveDate::from_ymd_opt(as_of.year(), 1, 1)?;
    let first = series.first()?;

    if first.date > year_start + Duration::days(OPENING_WINDOW_DAYS) {
        return None;
    }

    let first_of_year = series.points().iter().find(|p| p.date >= year_start)?;
    let last = series.last()?;
    Some(last.close / first_of_year.close - 1.0)
}

/// Every horizon, computed independently from the same series.
pub fn return_profile(series: &PriceSeries, as_of: NaiveDate) -> ReturnProfile {
    let mut profile = ReturnProfile::default();

    for horizon in Horizon::ALL {
        let value = match horizon {
            Horizon::SinceInception => since_inception_return(series),
            Horizon::YearToDate => year_to_date_return(series, as_of),
            fixed => fixed.years().and_then(|years| annualized_return(series, years)),
        };
        profile.set(horizon, value);
    }

    profile
}
