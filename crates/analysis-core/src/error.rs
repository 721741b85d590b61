use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum AnalysisError {
    /// A single provider call failed; eligible for retry.
    #[error("Fetch failed: {0}")]
    FetchFailed(String),

    /// Every retry attempt for a symbol failed.
    #[error("Data unavailable for {symbol} after {attempts} attempts: {reason}")]
    DataUnavailable {
        symbol: String,
        attempts: u32,
        reason: String,
    },

    #[error("Insufficient history: {0}")]
    InsufficientHistory(String),

    #[error("Insufficient data: {0}")]
    InsufficientData(String),

    #[error("Missing metadata: {0}")]
    MissingMetadata(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),
}
