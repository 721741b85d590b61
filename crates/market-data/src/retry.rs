use analysis_core::{AnalysisError, MarketData, MarketDataProvider};
use std::time::Duration;

/// Bounded exponential backoff for provider calls.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    pub fn new(max_attempts: u32, base_delay: Duration) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
        }
    }

    /// Wait after failed attempt `attempt` (1-based): `base_delay * 2^(attempt-1)`.
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.base_delay.saturating_mul(factor)
    }
}

/// Fetch `symbol`, retrying every failure (including an empty price history)
/// until the policy's attempts are used up.
pub async fn fetch_with_retry<P>(
    provider: &P,
    symbol: &str,
    policy: &RetryPolicy,
) -> Result<MarketData, AnalysisError>
where
    P: MarketDataProvider + ?Sized,
{
    let max_attempts = policy.max_attempts.max(1);
    let mut last_error = AnalysisError::FetchFailed("no attempt made".to_string());

    for attempt in 1..=max_attempts {
        match provider.fetch(symbol).await {
            Ok(data) if !data.series.is_empty() => {
                if attempt > 1 {
                    tracing::info!("[{}] fetched from {} on attempt {}/{}", symbol, provider.name(), attempt, max_attempts);
                }
                return Ok(data);
            }
            Ok(_) => {
                last_error = AnalysisError::FetchFailed("empty price history".to_string());
            }
            Err(e) => {
                last_error = e;
            }
        }

        if attempt < max_attempts {
            let wait = policy.delay_for(attempt);
            tracing::warn!(
                "[{}] {} fetch failed (attempt {}/{}): {}; retrying in {:.1}s",
                symbol,
                provider.name(),
                attempt,
                max_attempts,
                last_error,
                wait.as_secs_f64()
            );
            tokio::time::sleep(wait).await;
        }
    }

    Err(AnalysisError::DataUnavailable {
        symbol: symbol.to_string(),
        attempts: max_attempts,
        reason: last_error.to_string(),
    })
}
