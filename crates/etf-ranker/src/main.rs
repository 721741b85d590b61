//! etf-ranker: rank ETFs and equities by an attractiveness score.
//!
//! Usage:
//!   cargo run -p etf-ranker -- MSFT,GOOGL,VTI
//!   cargo run -p etf-ranker -- SPY,QQQ --strategy moving-average --concurrency 2
//!   cargo run -p etf-ranker -- VTI --provider fixture --fixture data/frozen.json --json

use analysis_orchestrator::{parse_symbols, ProviderKind, RankerConfig, RankingPipeline};
use anyhow::{bail, Context, Result};
use clap::Parser;
use fundamental_analysis::UndervaluationStrategy;
use std::path::PathBuf;

mod render;

const DEFAULT_SYMBOLS: &str = "MSFT,GOOGL";

#[derive(Parser, Debug)]
#[command(name = "etf-ranker", version, about = "Rank ETFs and equities by attractiveness score")]
struct Args {
    /// Comma-separated ticker symbols
    #[arg(default_value = DEFAULT_SYMBOLS)]
    symbols: String,

    /// Market data provider (alpha-vantage, yahoo, fixture)
    #[arg(long)]
    provider: Option<String>,

    /// Frozen market data JSON for the fixture provider
    #[arg(long)]
    fixture: Option<PathBuf>,

    /// Undervaluation strategy (analyst-gap, moving-average, sector-pe)
    #[arg(long)]
    strategy: Option<String>,

    /// Sector average P/E table (JSON object of sector to P/E)
    #[arg(long)]
    sector_pe: Option<PathBuf>,

    /// Symbols fetched in parallel
    #[arg(long)]
    concurrency: Option<usize>,

    /// Forecast horizon in years
    #[arg(long)]
    forecast_years: Option<u32>,

    /// Print the report as JSON instead of a table
    #[arg(long)]
    json: bool,
}

impl Args {
    /// Flags take precedence over the environment.
    fn apply(&self, config: &mut RankerConfig) -> Result<()> {
        if let Some(provider) = &self.provider {
            config.provider = provider.parse::<ProviderKind>()?;
        }
        if let Some(fixture) = &self.fixture {
            config.fixture_file = Some(fixture.clone());
            if self.provider.is_none() {
                config.provider = ProviderKind::Fixture;
            }
        }
        if let Some(strategy) = &self.strategy {
            config.strategy = strategy.parse::<UndervaluationStrategy>()?;
        }
        if let Some(path) = &self.sector_pe {
            config.sector_pe_file = Some(path.clone());
        }
        if let Some(concurrency) = self.concurrency {
            config.max_concurrency = concurrency;
        }
        if let Some(years) = self.forecast_years {
            config.forecast_years = years;
        }
        Ok(())
    }
}

fn init_tracing() {
    let filter = || {
        tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("etf_ranker=info,analysis_orchestrator=info,market_data=info"))
    };

    let json_logging = std::env::var("RUST_LOG_FORMAT")
        .map(|v| v.eq_ignore_ascii_case("json"))
        .unwrap_or(false);

    // Logs go to stderr so `--json` output stays parseable
    if json_logging {
        tracing_subscriber::fmt()
            .json()
            .with_writer(std::io::stderr)
            .with_env_filter(filter())
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_writer(std::io::stderr)
            .with_env_filter(filter())
            .init();
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    init_tracing();

    let args = Args::parse();

    let mut config = RankerConfig::from_env().context("Failed to load configuration")?;
    args.apply(&mut config)?;
    config.validate()?;

    let symbols = parse_symbols(&args.symbols);
    if symbols.is_empty() {
        bail!("no symbols given");
    }

    tracing::info!(
        "etf-ranker: {} symbols, provider={}, strategy={}, concurrency={}",
        symbols.len(),
        config.provider,
        config.strategy,
        config.max_concurrency
    );

    let provider = config.build_provider()?;
    let sector_table = config.load_sector_table()?;
    let pipeline = RankingPipeline::new(provider, &config, sector_table);

    let report = tokio::select! {
        report = pipeline.rank(&symbols) => report,
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Received SIGINT, abandoning remaining symbols");
            return Ok(());
        }
    };

    for line in render::failures(&report) {
        eprintln!("{}", line);
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&report)?);
    } else if report.rows.is_empty() {
        println!("No symbols could be ranked.");
    } else {
        println!("{}", render::table(&report));
    }

    Ok(())
}
