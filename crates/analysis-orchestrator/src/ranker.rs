use analysis_core::{
    MarketData, MarketDataProvider, RankingReport, ScoreRow, SymbolFailure,
};
use chrono::{NaiveDate, Utc};
use fundamental_analysis::{SectorPeTable, UndervaluationStrategy};
use market_data::{fetch_with_retry, RetryPolicy};
use quant_analysis::{forecast_annualized_return, return_profile};
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::config::RankerConfig;
use crate::scoring::ScoringWeights;

/// Split a comma-separated list into unique, upper-cased symbols,
/// keeping the order of first appearance.
pub fn parse_symbols(input: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    input
        .split(',')
        .map(|s| s.trim().to_uppercase())
        .filter(|s| !s.is_empty())
        .filter(|s| seen.insert(s.clone()))
        .collect()
}

/// Scoring inputs shared read-only by every symbol task.
#[derive(Debug, Clone)]
struct ScoringContext {
    strategy: UndervaluationStrategy,
    sector_table: SectorPeTable,
    forecast_years: u32,
    weights: ScoringWeights,
}

pub struct RankingPipeline {
    provider: Arc<dyn MarketDataProvider>,
    retry: RetryPolicy,
    max_concurrency: usize,
    context: Arc<ScoringContext>,
}

impl RankingPipeline {
    pub fn new(provider: Arc<dyn MarketDataProvider>, config: &RankerConfig, sector_table: SectorPeTable) -> Self {
        Self {
            provider,
            retry: config.retry_policy(),
            max_concurrency: config.max_concurrency.max(1),
            context: Arc::new(ScoringContext {
                strategy: config.strategy,
                sector_table,
                forecast_years: config.forecast_years,
                weights: config.weights,
            }),
        }
    }

    /// Fetch, score and rank every symbol.
    ///
    /// A symbol whose fetch fails after all retries is left out of the rows
    /// and listed in `failures`; the rest of the batch carries on.
    pub async fn rank(&self, symbols: &[String]) -> RankingReport {
        let as_of = Utc::now().date_naive();
        let total = symbols.len();

        tracing::info!(
            "📊 Ranking {} symbols via {} (concurrency {})",
            total,
            self.provider.name(),
            self.max_concurrency
        );

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for (index, symbol) in symbols.iter().cloned().enumerate() {
            let provider = Arc::clone(&self.provider);
            let context = Arc::clone(&self.context);
            let semaphore = Arc::clone(&semaphore);
            let retry = self.retry;

            tasks.spawn(async move {
                let result = match semaphore.acquire_owned().await {
                    Ok(_permit) => fetch_with_retry(provider.as_ref(), &symbol, &retry)
                        .await
                        .map(|data| score_symbol(&symbol, &data, as_of, &context)),
                    Err(e) => Err(analysis_core::AnalysisError::FetchFailed(e.to_string())),
                };
                (index, symbol, result)
            });
        }

        let mut rows = Vec::with_capacity(total);
        let mut failures = Vec::new();
        let mut finished = vec![false; total];
        let mut task_errors = Vec::new();

        while let Some(joined) = tasks.join_next().await {
            if let Ok((index, _, _)) = &joined {
                finished[*index] = true;
            }

            match joined {
                Ok((index, _symbol, Ok(row))) => rows.push((index, row)),
                Ok((index, symbol, Err(e))) => {
                    tracing::warn!("⚠️  Skipping {}: {}", symbol, e);
                    failures.push((
                        index,
                        SymbolFailure {
                            symbol,
                            reason: e.to_string(),
                        },
                    ));
                }
                Err(e) => {
                    tracing::error!("Task error: {}", e);
                    task_errors.push(e.to_string());
                }
            }
        }

        // A task that panicked never reported its symbol
        for (index, symbol) in symbols.iter().enumerate().filter(|(i, _)| !finished[*i]) {
            let reason = match task_errors.as_slice() {
                [only] => format!("analysis task failed: {}", only),
                _ => "analysis task failed".to_string(),
            };
            tracing::warn!("⚠️  Skipping {}: {}", symbol, reason);
            failures.push((
                index,
                SymbolFailure {
                    symbol: symbol.clone(),
                    reason,
                },
            ));
        }

        // Input order first so equal scores keep it after the stable sort
        rows.sort_by_key(|(index, _)| *index);
        let mut rows: Vec<ScoreRow> = rows.into_iter().map(|(_, row)| row).collect();
        rows.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        failures.sort_by_key(|(index, _)| *index);
        let failures: Vec<SymbolFailure> = failures.into_iter().map(|(_, f)| f).collect();

        tracing::info!(
            "✅ Ranking complete: {}/{} symbols scored, {} failed",
            rows.len(),
            total,
            failures.len()
        );

        RankingReport {
            rows,
            failures,
            forecast_years: self.context.forecast_years,
            generated_at: Utc::now(),
        }
    }

    /// Score one symbol's already-fetched data.
    pub fn build_row(&self, symbol: &str, data: &MarketData, as_of: NaiveDate) -> ScoreRow {
        score_symbol(symbol, data, as_of, &self.context)
    }
}

fn score_symbol(symbol: &str, data: &MarketData, as_of: NaiveDate, context: &ScoringContext) -> ScoreRow {
    let returns = return_profile(&data.series, as_of);

    let forecast = match forecast_annualized_return(&data.series, context.forecast_years) {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::debug!("[{}] no trend forecast: {}", symbol, e);
            None
        }
    };

    let undervaluation_pct = fundamental_analysis::evaluate(
        context.strategy,
        &data.series,
        &data.valuation,
        &context.sector_table,
    );

    let score = context.weights.score(&returns, undervaluation_pct, forecast);

    tracing::debug!(
        "[{}] {} points, score {:.4} (undervaluation {:?}, forecast {:?})",
        symbol,
        data.series.len(),
        score,
        undervaluation_pct,
        forecast
    );

    ScoreRow {
        symbol: symbol.to_string(),
        trailing_pe: data.valuation.trailing_pe,
        price_to_book: data.valuation.price_to_book,
        current_price: data.valuation.current_price,
        target_mean_price: data.valuation.target_mean_price,
        returns,
        forecast_5y: forecast,
        undervaluation_pct,
        score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use analysis_core::{AnalysisError, PricePoint, PriceSeries, ValuationSnapshot};
    use async_trait::async_trait;
    use chrono::Duration;
    use market_data::FixtureProvider;
    use std::sync::atomic::{AtomicU32, Ordering};

    fn linear(days: usize, from: f64, to: f64) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2023, 1, 2).unwrap();
        let step = (to - from) / (days - 1) as f64;
        PriceSeries::new(
            (0..days)
                .map(|i| PricePoint::new(start + Duration::days(i as i64), from + step * i as f64))
                .collect(),
        )
    }

    fn aaa() -> MarketData {
        MarketData {
            series: linear(300, 100.0, 150.0),
            valuation: ValuationSnapshot {
                trailing_pe: Some(18.0),
                price_to_book: Some(2.5),
                current_price: Some(150.0),
                target_mean_price: Some(180.0),
                sector: Some("Technology".to_string()),
            },
        }
    }

    fn test_config() -> RankerConfig {
        RankerConfig {
            fetch_base_delay_ms: 0,
            ..Default::default()
        }
    }

    /// Serves fixture data but always fails for one symbol, counting calls.
    struct PartlyDown {
        inner: FixtureProvider,
        down: &'static str,
        calls_to_down: AtomicU32,
    }

    #[async_trait]
    impl MarketDataProvider for PartlyDown {
        fn name(&self) -> &'static str {
            "partly-down"
        }

        async fn fetch(&self, symbol: &str) -> Result<MarketData, AnalysisError> {
            if symbol == self.down {
                self.calls_to_down.fetch_add(1, Ordering::SeqCst);
                return Err(AnalysisError::FetchFailed("connection reset".to_string()));
            }
            self.inner.fetch(symbol).await
        }
    }

    /// Panics while fetching one symbol.
    struct Exploding {
        inner: FixtureProvider,
    }

    #[async_trait]
    impl MarketDataProvider for Exploding {
        fn name(&self) -> &'static str {
            "exploding"
        }

        async fn fetch(&self, symbol: &str) -> Result<MarketData, AnalysisError> {
            if symbol == "BOOM" {
                panic!("provider bug");
            }
            self.inner.fetch(symbol).await
        }
    }

    #[test]
    fn test_parse_symbols() {
        assert_eq!(parse_symbols(" msft, GOOGL,,msft ,vti "), vec!["MSFT", "GOOGL", "VTI"]);
        assert!(parse_symbols(" , ,").is_empty());
    }

    #[tokio::test]
    async fn test_failed_symbol_is_reported_not_ranked() {
        let provider = Arc::new(PartlyDown {
            inner: FixtureProvider::new().with("AAA", aaa()),
            down: "BBB",
            calls_to_down: AtomicU32::new(0),
        });
        let pipeline = RankingPipeline::new(provider.clone(), &test_config(), SectorPeTable::default());

        let report = pipeline.rank(&parse_symbols("AAA,BBB")).await;

        assert_eq!(report.rows.len(), 1);
        let row = &report.rows[0];
        assert_eq!(row.symbol, "AAA");
        assert!(row.returns.one_year.is_some());
        assert_eq!(row.returns.five_year, None);
        assert!(row.score > 0.0);

        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].symbol, "BBB");
        assert!(report.failures[0].reason.contains("5 attempts"));
        assert_eq!(provider.calls_to_down.load(Ordering::SeqCst), 5);
    }

    #[tokio::test]
    async fn test_panicked_task_still_reported_as_failure() {
        let provider = Arc::new(Exploding {
            inner: FixtureProvider::new().with("AAA", aaa()),
        });
        let pipeline = RankingPipeline::new(provider, &test_config(), SectorPeTable::default());

        let report = pipeline.rank(&parse_symbols("BOOM,AAA")).await;

        assert_eq!(report.rows.len(), 1);
        assert_eq!(report.rows[0].symbol, "AAA");
        assert_eq!(report.failures.len(), 1);
        assert_eq!(report.failures[0].symbol, "BOOM");
        assert!(report.failures[0].reason.starts_with("analysis task failed"));
    }

    #[tokio::test]
    async fn test_report_carries_forecast_horizon() {
        let config = RankerConfig {
            forecast_years: 3,
            ..test_config()
        };
        let pipeline = RankingPipeline::new(
            Arc::new(FixtureProvider::new().with("AAA", aaa())),
            &config,
            SectorPeTable::default(),
        );
        let report = pipeline.rank(&parse_symbols("AAA")).await;

        assert_eq!(report.forecast_years, 3);
        let expected = forecast_annualized_return(&aaa().series, 3).unwrap();
        assert_eq!(report.rows[0].forecast_5y, Some(expected));
    }

    #[tokio::test]
    async fn test_rows_sorted_by_score_descending() {
        let mut falling = aaa();
        falling.series = linear(300, 150.0, 100.0);
        falling.valuation.target_mean_price = Some(90.0);
        falling.valuation.current_price = Some(100.0);

        let provider = FixtureProvider::new()
            .with("DOWN", falling)
            .with("UP", aaa())
            .with("FLAT", MarketData {
                series: linear(300, 50.0, 50.0),
                valuation: ValuationSnapshot::default(),
            });

        let config = RankerConfig {
            max_concurrency: 3,
            ..test_config()
        };
        let pipeline = RankingPipeline::new(Arc::new(provider), &config, SectorPeTable::default());
        let report = pipeline.rank(&parse_symbols("DOWN,FLAT,UP")).await;

        let order: Vec<&str> = report.rows.iter().map(|r| r.symbol.as_str()).collect();
        assert_eq!(order, vec!["UP", "FLAT", "DOWN"]);
        assert!(report.rows.windows(2).all(|w| w[0].score >= w[1].score));
        assert!(report.failures.is_empty());
    }

    #[tokio::test]
    async fn test_rerun_on_same_data_is_identical() {
        let provider = Arc::new(FixtureProvider::new().with("AAA", aaa()).with("CCC", {
            let mut data = aaa();
            data.series = linear(600, 40.0, 90.0);
            data
        }));
        let pipeline = RankingPipeline::new(provider, &test_config(), SectorPeTable::default());
        let symbols = parse_symbols("AAA,CCC");

        let first = pipeline.rank(&symbols).await;
        let second = pipeline.rank(&symbols).await;
        assert_eq!(first.rows, second.rows);
        assert_eq!(first.failures, second.failures);
    }

    #[tokio::test]
    async fn test_empty_symbol_list() {
        let pipeline = RankingPipeline::new(Arc::new(FixtureProvider::new()), &test_config(), SectorPeTable::default());
        let report = pipeline.rank(&[]).await;
        assert!(report.rows.is_empty());
        assert!(report.failures.is_empty());
    }

    #[test]
    fn test_build_row_with_sector_strategy() {
        let config = RankerConfig {
            strategy: UndervaluationStrategy::SectorPe,
            ..test_config()
        };
        let table = SectorPeTable::new().with("technology", 24.0);
        let pipeline = RankingPipeline::new(Arc::new(FixtureProvider::new()), &config, table);

        let as_of = NaiveDate::from_ymd_opt(2023, 10, 29).unwrap();
        let row = pipeline.build_row("AAA", &aaa(), as_of);

        assert_eq!(row.undervaluation_pct, Some(25.0));
        assert_eq!(row.trailing_pe, Some(18.0));
        assert_eq!(row.price_to_book, Some(2.5));
        assert!(row.forecast_5y.unwrap() > 0.0);
        assert!(row.returns.year_to_date.unwrap() > 0.0);
    }

    #[test]
    fn test_short_history_row_has_absent_fields() {
        let pipeline = RankingPipeline::new(Arc::new(FixtureProvider::new()), &test_config(), SectorPeTable::default());
        let data = MarketData {
            series: linear(2, 10.0, 11.0),
            valuation: ValuationSnapshot::default(),
        };
        let row = pipeline.build_row("NEW", &data, NaiveDate::from_ymd_opt(2023, 1, 3).unwrap());

        assert_eq!(row.returns.one_year, None);
        assert!(row.returns.since_inception.is_some());
        assert_eq!(row.undervaluation_pct, None);
        assert!(row.score.is_finite());
    }
}
