use analysis_core::{AnalysisError, MarketDataProvider};
use anyhow::{bail, Context, Result};
use fundamental_analysis::{SectorPeTable, UndervaluationStrategy};
use market_data::{AlphaVantageClient, FixtureProvider, RetryPolicy, YahooFinanceClient};
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;
use std::time::Duration;

use crate::scoring::ScoringWeights;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ProviderKind {
    AlphaVantage,
    #[default]
    Yahoo,
    Fixture,
}

impl ProviderKind {
    /// Request budget when none is configured: the Alpha Vantage free tier
    /// allows 5 per minute, Yahoo tolerates far more.
    pub fn default_requests_per_minute(self) -> usize {
        match self {
            ProviderKind::AlphaVantage => 5,
            ProviderKind::Yahoo => 60,
            ProviderKind::Fixture => usize::MAX,
        }
    }
}

impl fmt::Display for ProviderKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ProviderKind::AlphaVantage => "alpha-vantage",
            ProviderKind::Yahoo => "yahoo",
            ProviderKind::Fixture => "fixture",
        })
    }
}

impl FromStr for ProviderKind {
    type Err = AnalysisError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().replace('_', "-").as_str() {
            "alpha-vantage" | "alphavantage" | "av" => Ok(ProviderKind::AlphaVantage),
            "yahoo" | "yahoo-finance" => Ok(ProviderKind::Yahoo),
            "fixture" | "file" => Ok(ProviderKind::Fixture),
            other => Err(AnalysisError::ConfigError(format!(
                "Unknown market data provider '{}' (expected alpha-vantage, yahoo or fixture)",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankerConfig {
    // Data source
    pub provider: ProviderKind,
    #[serde(skip_serializing)]
    pub alpha_vantage_api_key: Option<String>,
    pub fixture_file: Option<PathBuf>,

    // Fetching
    pub fetch_max_attempts: u32,       // 5
    pub fetch_base_delay_ms: u64,      // 1000
    pub requests_per_minute: Option<usize>, // None = provider default
    pub max_concurrency: usize,        // 1 = sequential

    // Scoring
    pub strategy: UndervaluationStrategy,
    pub sector_pe_file: Option<PathBuf>,
    pub forecast_years: u32,           // 5
    pub weights: ScoringWeights,
}

impl Default for RankerConfig {
    fn default() -> Self {
        Self {
            provider: ProviderKind::default(),
            alpha_vantage_api_key: None,
            fixture_file: None,
            fetch_max_attempts: 5,
            fetch_base_delay_ms: 1000,
            requests_per_minute: None,
            max_concurrency: 1,
            strategy: UndervaluationStrategy::default(),
            sector_pe_file: None,
            forecast_years: 5,
            weights: ScoringWeights::default(),
        }
    }
}

impl RankerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build from any key/value source; unset keys take their defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let var = |key: &str, default: String| lookup(key).unwrap_or(default);

        let config = Self {
            provider: var("MARKET_DATA_PROVIDER", defaults.provider.to_string())
                .parse()
                .context("MARKET_DATA_PROVIDER")?,
            alpha_vantage_api_key: lookup("ALPHA_VANTAGE_API_KEY").filter(|k| !k.trim().is_empty()),
            fixture_file: lookup("FIXTURE_FILE").map(PathBuf::from),

            fetch_max_attempts: var("FETCH_MAX_ATTEMPTS", defaults.fetch_max_attempts.to_string())
                .parse()
                .context("FETCH_MAX_ATTEMPTS must be a positive integer")?,
            fetch_base_delay_ms: var("FETCH_BASE_DELAY_MS", defaults.fetch_base_delay_ms.to_string())
                .parse()
                .context("FETCH_BASE_DELAY_MS must be an integer")?,
            requests_per_minute: lookup("REQUESTS_PER_MINUTE")
                .map(|v| v.trim().parse::<usize>())
                .transpose()
                .context("REQUESTS_PER_MINUTE must be an integer")?,
            max_concurrency: var("MAX_CONCURRENCY", defaults.max_concurrency.to_string())
                .parse()
                .context("MAX_CONCURRENCY must be an integer")?,

            strategy: var("UNDERVALUATION_STRATEGY", defaults.strategy.to_string())
                .parse()
                .context("UNDERVALUATION_STRATEGY")?,
            sector_pe_file: lookup("SECTOR_PE_FILE").map(PathBuf::from),
            forecast_years: var("FORECAST_YEARS", defaults.forecast_years.to_string())
                .parse()
                .context("FORECAST_YEARS must be an integer")?,
            weights: ScoringWeights {
                historical: var("SCORE_WEIGHT_HISTORICAL", defaults.weights.historical.to_string())
                    .parse()
                    .context("SCORE_WEIGHT_HISTORICAL must be a number")?,
                valuation: var("SCORE_WEIGHT_VALUATION", defaults.weights.valuation.to_string())
                    .parse()
                    .context("SCORE_WEIGHT_VALUATION must be a number")?,
                forecast: var("SCORE_WEIGHT_FORECAST", defaults.weights.forecast.to_string())
                    .parse()
                    .context("SCORE_WEIGHT_FORECAST must be a number")?,
            },
        };

        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        if self.fetch_max_attempts == 0 {
            bail!("fetch_max_attempts must be at least 1");
        }
        if self.requests_per_minute == Some(0) {
            bail!("requests_per_minute must be at least 1");
        }
        if self.max_concurrency == 0 {
            bail!("max_concurrency must be at least 1");
        }
        if self.forecast_years == 0 {
            bail!("forecast_years must be at least 1");
        }

        let w = &self.weights;
        if [w.historical, w.valuation, w.forecast].iter().any(|x| !x.is_finite() || *x < 0.0) {
            bail!("score weights must be finite and non-negative: {:?}", w);
        }
        if (w.total() - 1.0).abs() > 1e-6 {
            tracing::warn!("Score weights sum to {:.3}, not 1.0; scores will be scaled accordingly", w.total());
        }

        match self.provider {
            ProviderKind::AlphaVantage if self.alpha_vantage_api_key.is_none() => {
                bail!("ALPHA_VANTAGE_API_KEY is required for the alpha-vantage provider")
            }
            ProviderKind::Fixture if self.fixture_file.is_none() => {
                bail!("a fixture file is required for the fixture provider")
            }
            _ => {}
        }

        if self.strategy == UndervaluationStrategy::SectorPe && self.sector_pe_file.is_none() {
            tracing::warn!("sector-pe strategy without a sector P/E table; undervaluation will be empty");
        }

        Ok(())
    }

    /// Configured request budget, or the provider's own default.
    pub fn requests_per_minute(&self) -> usize {
        self.requests_per_minute
            .unwrap_or_else(|| self.provider.default_requests_per_minute())
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.fetch_max_attempts, Duration::from_millis(self.fetch_base_delay_ms))
    }

    pub fn build_provider(&self) -> Result<Arc<dyn MarketDataProvider>> {
        let provider: Arc<dyn MarketDataProvider> = match self.provider {
            ProviderKind::AlphaVantage => {
                let key = self
                    .alpha_vantage_api_key
                    .clone()
                    .context("ALPHA_VANTAGE_API_KEY not set")?;
                Arc::new(AlphaVantageClient::new(key, self.requests_per_minute()))
            }
            ProviderKind::Yahoo => Arc::new(YahooFinanceClient::new(self.requests_per_minute())),
            ProviderKind::Fixture => {
                let path = self.fixture_file.as_ref().context("fixture file not set")?;
                let fixture = FixtureProvider::from_file(path)
                    .with_context(|| format!("Failed to load fixture {}", path.display()))?;
                tracing::info!("Loaded {} fixture symbols from {}", fixture.len(), path.display());
                Arc::new(fixture)
            }
        };
        Ok(provider)
    }

    pub fn load_sector_table(&self) -> Result<SectorPeTable> {
        match &self.sector_pe_file {
            Some(path) => SectorPeTable::from_file(path)
                .with_context(|| format!("Failed to load sector P/E table {}", path.display())),
            None => Ok(SectorPeTable::default()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key: &str| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let config = RankerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.provider, ProviderKind::Yahoo);
        assert_eq!(config.fetch_max_attempts, 5);
        assert_eq!(config.max_concurrency, 1);
        assert_eq!(config.forecast_years, 5);
        assert_eq!(config.requests_per_minute, None);
        assert_eq!(config.strategy, UndervaluationStrategy::AnalystGap);
        assert_eq!(config.weights, ScoringWeights::default());
        assert!(config.validate().is_ok());

        let retry = config.retry_policy();
        assert_eq!(retry.max_attempts, 5);
        assert_eq!(retry.base_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_overrides() {
        let config = RankerConfig::from_lookup(lookup(&[
            ("MARKET_DATA_PROVIDER", "alpha_vantage"),
            ("ALPHA_VANTAGE_API_KEY", "demo"),
            ("FETCH_MAX_ATTEMPTS", "3"),
            ("MAX_CONCURRENCY", "4"),
            ("UNDERVALUATION_STRATEGY", "moving-average"),
            ("SCORE_WEIGHT_HISTORICAL", "0.6"),
            ("SCORE_WEIGHT_VALUATION", "0.2"),
            ("SCORE_WEIGHT_FORECAST", "0.2"),
        ]))
        .unwrap();

        assert_eq!(config.provider, ProviderKind::AlphaVantage);
        assert_eq!(config.alpha_vantage_api_key.as_deref(), Some("demo"));
        assert_eq!(config.fetch_max_attempts, 3);
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.strategy, UndervaluationStrategy::MovingAverage);
        assert_eq!(config.weights.historical, 0.6);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_rate_limit_follows_provider() {
        let yahoo = RankerConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(yahoo.requests_per_minute(), 60);

        let alpha = RankerConfig::from_lookup(lookup(&[
            ("MARKET_DATA_PROVIDER", "alpha-vantage"),
            ("ALPHA_VANTAGE_API_KEY", "demo"),
        ]))
        .unwrap();
        assert_eq!(alpha.requests_per_minute(), 5);

        let pinned = RankerConfig::from_lookup(lookup(&[
            ("MARKET_DATA_PROVIDER", "alpha-vantage"),
            ("ALPHA_VANTAGE_API_KEY", "premium"),
            ("REQUESTS_PER_MINUTE", "75"),
        ]))
        .unwrap();
        assert_eq!(pinned.requests_per_minute, Some(75));
        assert_eq!(pinned.requests_per_minute(), 75);
        assert!(pinned.validate().is_ok());

        let zero = RankerConfig {
            requests_per_minute: Some(0),
            ..Default::default()
        };
        assert!(zero.validate().is_err());
    }

    #[test]
    fn test_unparseable_values_rejected() {
        assert!(RankerConfig::from_lookup(lookup(&[("FETCH_MAX_ATTEMPTS", "lots")])).is_err());
        assert!(RankerConfig::from_lookup(lookup(&[("MARKET_DATA_PROVIDER", "bloomberg")])).is_err());
        assert!(RankerConfig::from_lookup(lookup(&[("REQUESTS_PER_MINUTE", "fast")])).is_err());
        assert!(RankerConfig::from_lookup(lookup(&[("UNDERVALUATION_STRATEGY", "vibes")])).is_err());
    }

    #[test]
    fn test_validate() {
        let missing_key = RankerConfig {
            provider: ProviderKind::AlphaVantage,
            ..Default::default()
        };
        assert!(missing_key.validate().is_err());

        let missing_fixture = RankerConfig {
            provider: ProviderKind::Fixture,
            ..Default::default()
        };
        assert!(missing_fixture.validate().is_err());

        let zero_workers = RankerConfig {
            max_concurrency: 0,
            ..Default::default()
        };
        assert!(zero_workers.validate().is_err());

        let negative_weight = RankerConfig {
            weights: ScoringWeights {
                historical: -0.5,
                ..Default::default()
            },
            ..Default::default()
        };
        assert!(negative_weight.validate().is_err());
    }

    #[test]
    fn test_missing_sector_table_is_empty() {
        let table = RankerConfig::default().load_sector_table().unwrap();
        assert!(table.is_empty());
    }
}
