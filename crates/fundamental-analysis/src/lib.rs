//! Undervaluation signals.
//!
//! Each strategy turns a symbol's price history and valuation snapshot into
//! a percentage where positive means "cheap"; `None` means the strategy had
//! nothing to work with and the score treats the term as zero.

pub mod sector_pe;

pub use sector_pe::SectorPeTable;

use analysis_core::{AnalysisError, PriceSeries, ValuationSnapshot};
use quant_analysis::indicators::trailing_sma;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub const SHORT_MA_PERIOD: usize = 50;
pub const LONG_MA_PERIOD: usize = 200;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum UndervaluationStrategy {
    /// Distance of the current price below the analysts' mean target
    #[default]
    AnalystGap,
    /// Last close against the 50- and 200-session moving averages
    MovingAverage,
    /// Trailing P/E against the sector average
    SectorPe,
}

impl UndervaluationStrategy {
    pub fn as_str(&self) -> &'static str {
        match self {
            UndervaluationStrategy::AnalystGap => "analyst-gap",
            UndervaluationStrategy::MovingAverage => "moving-average",
            UndervaluationStrategy::SectorPe => "sector-pe",
        }
    }
}

impl fmt::Display for UndervaluationStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UndervaluationStrategy {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "analyst-gap" | "analyst" | "target" => Ok(UndervaluationStrategy::AnalystGap),
            "moving-average" | "ma" | "sma" => Ok(UndervaluationStrategy::MovingAverage),
            "sector-pe" | "pe" => Ok(UndervaluationStrategy::SectorPe),
            other => Err(AnalysisError::ConfigError(format!(
                "Unknown undervaluation strategy '{}' (expected analyst-gap, moving-average or sector-pe)",
                other
            ))),
        }
    }
}

/// `(target - current) / target * 100`
pub fn analyst_gap_pct(snapshot: &ValuationSnapshot) -> Option<f64> {
    let target = snapshot.target_mean_price.filter(|t| *t > 0.0)?;
    let current = snapshot.current_price?;
    Some((target - current) / target * 100.0)
}

/// 100 when the last close is below both the 50- and 200-session SMA,
/// 50 when below exactly one, 0 otherwise.
pub fn moving_average_pct(series: &PriceSeries) -> Option<f64> {
    if series.len() < LONG_MA_PERIOD {
        return None;
    }

    let closes = series.closes();
    let last = *closes.last()?;
    let short = trailing_sma(&closes, SHORT_MA_PERIOD)?;
    let long = trailing_sma(&closes, LONG_MA_PERIOD)?;

    let below = [short, long].iter().filter(|ma| last < **ma).count();
    Some(below as f64 * 0.5 * 100.0)
}

/// `(sector_avg_pe - pe) / sector_avg_pe * 100`
pub fn sector_pe_pct(snapshot: &ValuationSnapshot, table: &SectorPeTable) -> Option<f64> {
    let pe = snapshot.trailing_pe?;
    let sector = snapshot.sector.as_deref()?;
    let average = table.average_pe(sector)?;
    Some((average - pe) / average * 100.0)
}

/// Run `strategy` for one symbol.
pub fn evaluate(
    strategy: UndervaluationStrategy,
    series: &PriceSeries,
    snapshot: &ValuationSnapshot,
    sector_table: &SectorPeTable,
) -> Option<f64> {
    match strategy {
        UndervaluationStrategy::AnalystGap => analyst_gap_pct(snapshot),
        UndervaluationStrategy::MovingAverage => moving_average_pct(series),
        UndervaluationStrategy::SectorPe => sector_pe_pct(snapshot, sector_table),
    }
}
