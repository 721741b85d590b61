//! Return statistics and trend extrapolation over a daily close series.

pub mod forecast;
pub mod indicators;
pub mod returns;

pub use forecast::{fit_trend, forecast_annualized_return, TrendFit};
pub use returns::{
    annualized_return, return_profile, since_inception_return, year_to_date_return,
    MIN_ANNUALIZATION_YEARS,
};
