use analysis_core::{AnalysisError, MarketData, MarketDataProvider};
use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;

/// Frozen, in-memory market data keyed by symbol.
///
/// The JSON file form is an object of symbol to `{ "series": [...],
/// "valuation": {...} }`, the same shape `MarketData` serializes to.
#[derive(Debug, Clone, Default)]
pub struct FixtureProvider {
    data: HashMap<String, MarketData>,
}

impl FixtureProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, AnalysisError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path)
            .map_err(|e| AnalysisError::ConfigError(format!("{}: {}", path.display(), e)))?;
        Self::from_json(&raw)
    }

    pub fn from_json(raw: &str) -> Result<Self, AnalysisError> {
        let parsed: HashMap<String, MarketData> =
            serde_json::from_str(raw).map_err(|e| AnalysisError::InvalidData(e.to_string()))?;

        let mut provider = Self::new();
        for (symbol, data) in parsed {
            provider.insert(&symbol, data);
        }
        Ok(provider)
    }

    pub fn insert(&mut self, symbol: &str, data: MarketData) {
        self.data.insert(symbol.trim().to_uppercase(), data);
    }

    pub fn with(mut self, symbol: &str, data: MarketData) -> Self {
        self.insert(symbol, data);
        self
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}

#[async_trait]
impl MarketDataProvider for FixtureProvider {
    fn name(&self) -> &'static str {
        "fixture"
    }

    async fn fetch(&self, symbol: &str) -> Result<MarketData, AnalysisError> {
        self.data
            .get(&symbol.to_uppercase())
            .cloned()
            .ok_or_else(|| AnalysisError::FetchFailed(format!("no fixture data for {}", symbol)))
    }
}
