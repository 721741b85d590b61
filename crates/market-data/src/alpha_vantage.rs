use analysis_core::{
    AnalysisError, MarketData, MarketDataProvider, PricePoint, PriceSeries, ValuationSnapshot,
};
use async_trait::async_trait;
use chrono::NaiveDate;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;

use crate::json;
use crate::rate_limit::RateLimiter;

const BASE_URL: &str = "https://www.alphavantage.co/query";
const DAILY_SERIES_KEY: &str = "Time Series (Daily)";
const CLOSE_KEY: &str = "4. close";

/// Alpha Vantage adapter: full daily history plus the company overview.
#[derive(Clone)]
pub struct AlphaVantageClient {
    api_key: String,
    base_url: String,
    client: Client,
    rate_limiter: RateLimiter,
}

impl AlphaVantageClient {
    /// `requests_per_minute` should match the plan; the free tier allows 5.
    pub fn new(api_key: String, requests_per_minute: usize) -> Self {
        let client = Client::builder()
            .timeout(Duration::from_secs(60))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            api_key,
            base_url: BASE_URL.to_string(),
            client,
            rate_limiter: RateLimiter::per_minute(requests_per_minute),
        }
    }

    /// Point the client at a different host, e.g. a local mock.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self
    }

    async fn query(&self, function: &str, symbol: &str, extra: &[(&str, &str)]) -> Result<Value, AnalysisError> {
        self.rate_limiter.acquire().await;

        let mut params = vec![
            ("function", function),
            ("symbol", symbol),
            ("apikey", self.api_key.as_str()),
        ];
        params.extend_from_slice(extra);

        let response = self
            .client
            .get(&self.base_url)
            .query(&params)
            .send()
            .await
            .map_err(|e| AnalysisError::FetchFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AnalysisError::FetchFailed(format!(
                "Alpha Vantage {} HTTP {}",
                function,
                response.status()
            )));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| AnalysisError::FetchFailed(e.to_string()))?;

        check_error_payload(&json)?;
        Ok(json)
    }

    /// Full daily close history, oldest first
    pub async fn get_daily_series(&self, symbol: &str) -> Result<PriceSeries, AnalysisError> {
        let json = self
            .query("TIME_SERIES_DAILY", symbol, &[("outputsize", "full")])
            .await?;
        parse_daily_series(&json)
    }

    /// P/E, P/B, analyst target and sector from the company overview
    pub async fn get_overview(&self, symbol: &str) -> Result<ValuationSnapshot, AnalysisError> {
        let json = self.query("OVERVIEW", symbol, &[]).await?;
        Ok(parse_overview(&json))
    }
}

#[async_trait]
impl MarketDataProvider for AlphaVantageClient {
    fn name(&self) -> &'static str {
        "alpha-vantage"
    }

    async fn fetch(&self, symbol: &str) -> Result<MarketData, AnalysisError> {
        let series = self.get_daily_series(symbol).await?;

        // ETFs have no overview; a missing snapshot is not a fetch failure.
        let mut valuation = match self.get_overview(symbol).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("[{}] overview unavailable, valuation fields left empty: {}", symbol, e);
                ValuationSnapshot::default()
            }
        };

        if valuation.is_empty() {
            tracing::info!("[{}] no valuation metadata reported", symbol);
        }

        if valuation.current_price.is_none() {
            valuation.current_price = series.last().map(|p| p.close);
        }

        Ok(MarketData {
            series,
            valuation: valuation.normalized(),
        })
    }
}

/// Alpha Vantage reports errors and throttling with HTTP 200 and a body key.
fn check_error_payload(json: &Value) -> Result<(), AnalysisError> {
    if let Some(error) = json.get("Error Message") {
        return Err(AnalysisError::FetchFailed(format!("Alpha Vantage error: {}", error)));
    }

    if let Some(note) = json.get("Note").or_else(|| json.get("Information")) {
        return Err(AnalysisError::FetchFailed(format!("Alpha Vantage rate limit: {}", note)));
    }

    if json.as_object().map_or(true, |obj| obj.is_empty()) {
        return Err(AnalysisError::FetchFailed("Alpha Vantage returned an empty payload".to_string()));
    }

    Ok(())
}

pub(crate) fn parse_daily_series(json: &Value) -> Result<PriceSeries, AnalysisError> {
    let series = json
        .get(DAILY_SERIES_KEY)
        .and_then(|v| v.as_object())
        .ok_or_else(|| AnalysisError::FetchFailed("No daily time series found".to_string()))?;

    let points = series
        .iter()
        .filter_map(|(date, values)| {
            let date = NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()?;
            let close = json::number(values.get(CLOSE_KEY))?;
            Some(PricePoint::new(date, close))
        })
        .collect();

    let series = PriceSeries::new(points);
    if series.is_empty() {
        return Err(AnalysisError::FetchFailed("Daily time series was empty".to_string()));
    }

    Ok(series)
}

pub(crate) fn parse_overview(json: &Value) -> ValuationSnapshot {
    ValuationSnapshot {
        trailing_pe: json::number(json.get("TrailingPE").or_else(|| json.get("PERatio"))),
        price_to_book: json::number(json.get("PriceToBookRatio")),
        current_price: None,
        target_mean_price: json::number(json.get("AnalystTargetPrice")),
        sector: json::text(json.get("Sector")),
    }
    .normalized()
}
