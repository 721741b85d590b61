//! Ties fetching, return calculation, forecasting and valuation together
//! into a ranked report.

pub mod config;
pub mod ranker;
pub mod scoring;

pub use config::{ProviderKind, RankerConfig};
pub use ranker::{parse_symbols, RankingPipeline};
pub use scoring::{historical_component, ScoringWeights};
