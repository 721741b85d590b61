pub mod alpha_vantage;
pub mod fixture;
pub mod rate_limit;
pub mod retry;
pub mod yahoo_finance;

mod json;

pub use alpha_vantage::AlphaVantageClient;
pub use fixture::FixtureProvider;
pub use rate_limit::RateLimiter;
pub use retry::{fetch_with_retry, RetryPolicy};
pub use yahoo_finance::YahooFinanceClient;
