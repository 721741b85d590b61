use analysis_core::{
    AnalysisError, MarketData, MarketDataProvider, PricePoint, PriceSeries, ValuationSnapshot,
};
use async_trait::async_trait;
use chrono::DateTime;
use reqwest::Client;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

use crate::json;
use crate::rate_limit::RateLimiter;

const BASE_URL: &str = "https://query2.finance.yahoo.com";
const COOKIE_URL: &str = "https://fc.yahoo.com";
const SUMMARY_MODULES: &str = "financialData,summaryDetail,defaultKeyStatistics,assetProfile";

#[derive(Clone)]
pub struct YahooFinanceClient {
    base_url: String,
    cookie_url: String,
    client: Client,
    crumb: Arc<Mutex<Option<String>>>,
    rate_limiter: RateLimiter,
}

impl YahooFinanceClient {
    pub fn new(requests_per_minute: usize) -> Self {
        let client = Client::builder()
            .user_agent("Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36")
            .timeout(Duration::from_secs(60))
            .cookie_store(true)
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            base_url: BASE_URL.to_string(),
            cookie_url: COOKIE_URL.to_string(),
            client,
            crumb: Arc::new(Mutex::new(None)),
            rate_limiter: RateLimiter::per_minute(requests_per_minute),
        }
    }

    /// Serve every endpoint, the consent cookie included, from one host.
    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into();
        self.cookie_url = self.base_url.clone();
        self
    }

    /// Session crumb that `quoteSummary` requires. Yahoo only issues one to a
    /// client already holding the cookie set by `fc.yahoo.com`.
    async fn crumb(&self) -> Result<String, AnalysisError> {
        let mut cached = self.crumb.lock().await;
        if let Some(crumb) = cached.as_ref() {
            return Ok(crumb.clone());
        }

        // The cookie host answers 404 but still sets the cookie
        if let Err(e) = self.client.get(&self.cookie_url).send().await {
            tracing::debug!("Yahoo Finance cookie request failed: {}", e);
        }

        self.rate_limiter.acquire().await;
        let response = self
            .client
            .get(format!("{}/v1/test/getcrumb", self.base_url))
            .send()
            .await
            .map_err(|e| AnalysisError::FetchFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AnalysisError::FetchFailed(format!(
                "Yahoo Finance crumb HTTP {}",
                response.status()
            )));
        }

        let crumb = response
            .text()
            .await
            .map_err(|e| AnalysisError::FetchFailed(e.to_string()))?
            .trim()
            .to_string();

        if crumb.is_empty() || crumb.contains('<') {
            return Err(AnalysisError::FetchFailed("Yahoo Finance returned no crumb".to_string()));
        }

        tracing::debug!("Obtained Yahoo Finance crumb");
        *cached = Some(crumb.clone());
        Ok(crumb)
    }

    async fn get_json(&self, url: &str, query: &[(&str, &str)]) -> Result<Value, AnalysisError> {
        self.rate_limiter.acquire().await;

        let response = self
            .client
            .get(url)
            .query(query)
            .send()
            .await
            .map_err(|e| AnalysisError::FetchFailed(e.to_string()))?;

        if !response.status().is_success() {
            return Err(AnalysisError::FetchFailed(format!(
                "Yahoo Finance HTTP {} for {}",
                response.status(),
                url
            )));
        }

        response
            .json()
            .await
            .map_err(|e| AnalysisError::FetchFailed(e.to_string()))
    }

    /// Entire daily close history
    pub async fn get_historical_data(&self, symbol: &str) -> Result<(PriceSeries, Option<f64>), AnalysisError> {
        let url = format!("{}/v8/finance/chart/{}", self.base_url, symbol);
        let json = self
            .get_json(&url, &[("range", "max"), ("interval", "1d")])
            .await?;
        parse_chart(&json)
    }

    /// Valuation fields from the quote summary modules
    pub async fn get_fundamentals(&self, symbol: &str) -> Result<ValuationSnapshot, AnalysisError> {
        let crumb = self.crumb().await?;
        let url = format!("{}/v10/finance/quoteSummary/{}", self.base_url, symbol);
        let json = self
            .get_json(&url, &[("modules", SUMMARY_MODULES), ("crumb", crumb.as_str())])
            .await;

        // An expired crumb is refetched on the next call
        if json.is_err() {
            *self.crumb.lock().await = None;
        }

        parse_quote_summary(&json?)
    }
}

#[async_trait]
impl MarketDataProvider for YahooFinanceClient {
    fn name(&self) -> &'static str {
        "yahoo"
    }

    async fn fetch(&self, symbol: &str) -> Result<MarketData, AnalysisError> {
        let (series, market_price) = self.get_historical_data(symbol).await?;

        let mut valuation = match self.get_fundamentals(symbol).await {
            Ok(v) => v,
            Err(e) => {
                tracing::warn!("[{}] quote summary unavailable, valuation fields left empty: {}", symbol, e);
                ValuationSnapshot::default()
            }
        };

        if valuation.is_empty() {
            tracing::info!("[{}] no valuation metadata reported", symbol);
        }

        if valuation.current_price.is_none() {
            valuation.current_price = market_price
                .into_iter()
                .chain(series.last().map(|p| p.close))
                .find(|price| price.is_finite() && *price > 0.0);
        }

        Ok(MarketData {
            series,
            valuation: valuation.normalized(),
        })
    }
}

/// Returns the close series and the chart's `regularMarketPrice`, if any.
pub(crate) fn parse_chart(json: &Value) -> Result<(PriceSeries, Option<f64>), AnalysisError> {
    let chart = json
        .get("chart")
        .ok_or_else(|| AnalysisError::FetchFailed("No chart object in response".to_string()))?;

    if let Some(error) = chart.get("error").filter(|e| !e.is_null()) {
        return Err(AnalysisError::FetchFailed(format!("Yahoo Finance error: {}", error)));
    }

    let result = chart
        .get("result")
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .ok_or_else(|| AnalysisError::FetchFailed("No chart data found".to_string()))?;

    let timestamps = result
        .get("timestamp")
        .and_then(|v| v.as_array())
        .ok_or_else(|| AnalysisError::FetchFailed("No timestamps found".to_string()))?;

    let closes = result
        .get("indicators")
        .and_then(|v| v.get("quote"))
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .and_then(|q| q.get("close"))
        .and_then(|v| v.as_array())
        .ok_or_else(|| AnalysisError::FetchFailed("No close prices".to_string()))?;

    // Null closes (halted sessions) are skipped rather than zero-filled
    let points = timestamps
        .iter()
        .zip(closes.iter())
        .filter_map(|(ts, close)| {
            let date = DateTime::from_timestamp(ts.as_i64()?, 0)?.date_naive();
            Some(PricePoint::new(date, close.as_f64()?))
        })
        .collect();

    let series = PriceSeries::new(points);
    if series.is_empty() {
        return Err(AnalysisError::FetchFailed("Chart contained no usable closes".to_string()));
    }

    let market_price = json::number(result.get("meta").and_then(|m| m.get("regularMarketPrice")));
    Ok((series, market_price))
}

pub(crate) fn parse_quote_summary(json: &Value) -> Result<ValuationSnapshot, AnalysisError> {
    let result = json
        .get("quoteSummary")
        .and_then(|v| v.get("result"))
        .and_then(|v| v.as_array())
        .and_then(|arr| arr.first())
        .ok_or_else(|| AnalysisError::MissingMetadata("No quote summary found".to_string()))?;

    let module = |name: &str, field: &str| result.get(name).and_then(|m| m.get(field));

    Ok(ValuationSnapshot {
        trailing_pe: json::number(module("summaryDetail", "trailingPE")),
        price_to_book: json::number(module("defaultKeyStatistics", "priceToBook")),
        current_price: json::number(module("financialData", "currentPrice")),
        target_mean_price: json::number(module("financialData", "targetMeanPrice")),
        sector: json::text(module("assetProfile", "sector")),
    }
    .normalized())
}
