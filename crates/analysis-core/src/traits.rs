use async_trait::async_trait;
use crate::{AnalysisError, MarketData};

/// Source of price history and valuation metadata for a symbol.
///
/// Implementations hide provider-specific payload shapes; callers only ever
/// see a [`MarketData`] or an [`AnalysisError::FetchFailed`].
#[async_trait]
pub trait MarketDataProvider: Send + Sync {
    /// Short provider name used in log lines
    fn name(&self) -> &'static str;

    async fn fetch(&self, symbol: &str) -> Result<MarketData, AnalysisError>;
}
