use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

/// Assumed number of trading sessions in a calendar year.
pub const TRADING_DAYS_PER_YEAR: usize = 252;

/// A single daily close
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PricePoint {
    pub date: NaiveDate,
    pub close: f64,
}

impl PricePoint {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }
}

/// Chronologically ordered, date-deduplicated close prices.
///
/// Construction sorts the points, keeps the last close seen for any
/// repeated date and drops closes that are not finite and positive, so
/// every reader can index the series without re-checking ordering.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<PricePoint>", into = "Vec<PricePoint>")]
pub struct PriceSeries {
    points: Vec<PricePoint>,
}

impl PriceSeries {
    pub fn new(points: Vec<PricePoint>) -> Self {
        let mut points: Vec<PricePoint> = points
            .into_iter()
            .filter(|p| p.close.is_finite() && p.close > 0.0)
            .collect();

        // Stable sort keeps insertion order within a date, so the last
        // duplicate is the one that survives below.
        points.sort_by_key(|p| p.date);

        let mut deduped: Vec<PricePoint> = Vec::with_capacity(points.len());
        for point in points {
            match deduped.last_mut() {
                Some(prev) if prev.date == point.date => *prev = point,
                _ => deduped.push(point),
            }
        }

        Self { points: deduped }
    }

    pub fn points(&self) -> &[PricePoint] {
        &self.points
    }

    pub fn closes(&self) -> Vec<f64> {
        self.points.iter().map(|p| p.close).collect()
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn first(&self) -> Option<&PricePoint> {
        self.points.first()
    }

    pub fn last(&self) -> Option<&PricePoint> {
        self.points.last()
    }
}

impl From<Vec<PricePoint>> for PriceSeries {
    fn from(points: Vec<PricePoint>) -> Self {
        Self::new(points)
    }
}

impl From<PriceSeries> for Vec<PricePoint> {
    fn from(series: PriceSeries) -> Self {
        series.points
    }
}

/// Point-in-time valuation metadata, as read at fetch time.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ValuationSnapshot {
    #[serde(default)]
    pub trailing_pe: Option<f64>,
    #[serde(default)]
    pub price_to_book: Option<f64>,
    #[serde(default)]
    pub current_price: Option<f64>,
    #[serde(default)]
    pub target_mean_price: Option<f64>,
    #[serde(default)]
    pub sector: Option<String>,
}

impl ValuationSnapshot {
    /// Drop values a provider reported but which cannot be used as a
    /// positive ratio or price (zero, negative, NaN).
    pub fn normalized(self) -> Self {
        fn positive(v: Option<f64>) -> Option<f64> {
            v.filter(|x| x.is_finite() && *x > 0.0)
        }

        Self {
            trailing_pe: positive(self.trailing_pe),
            price_to_book: positive(self.price_to_book),
            current_price: positive(self.current_price),
            target_mean_price: positive(self.target_mean_price),
            sector: self.sector.filter(|s| !s.trim().is_empty()),
        }
    }

    /// True when none of the numeric valuation fields were supplied.
    pub fn is_empty(&self) -> bool {
        self.trailing_pe.is_none()
            && self.price_to_book.is_none()
            && self.current_price.is_none()
            && self.target_mean_price.is_none()
    }
}

/// Everything a provider returns for one symbol
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarketData {
    pub series: PriceSeries,
    #[serde(default)]
    pub valuation: ValuationSnapshot,
}

/// Look-back window over which a return is measured
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Horizon {
    #[serde(rename = "1Y")]
    OneYear,
    #[serde(rename = "3Y")]
    ThreeYear,
    #[serde(rename = "5Y")]
    FiveYear,
    #[serde(rename = "10Y")]
    TenYear,
    SinceInception,
    #[serde(rename = "YTD")]
    YearToDate,
}

impl Horizon {
    pub const ALL: [Horizon; 6] = [
        Horizon::OneYear,
        Horizon::ThreeYear,
        Horizon::FiveYear,
        Horizon::TenYear,
        Horizon::SinceInception,
        Horizon::YearToDate,
    ];

    /// Whole-year length of the fixed look-back horizons
    pub fn years(&self) -> Option<u32> {
        match self {
            Horizon::OneYear => Some(1),
            Horizon::ThreeYear => Some(3),
            Horizon::FiveYear => Some(5),
            Horizon::TenYear => Some(10),
            Horizon::SinceInception | Horizon::YearToDate => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            Horizon::OneYear => "1Y",
            Horizon::ThreeYear => "3Y",
            Horizon::FiveYear => "5Y",
            Horizon::TenYear => "10Y",
            Horizon::SinceInception => "Since Inception",
            Horizon::YearToDate => "YTD",
        }
    }
}

/// Annualized return per horizon; `None` means insufficient history.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ReturnProfile {
    #[serde(rename = "1Y")]
    pub one_year: Option<f64>,
    #[serde(rename = "3Y")]
    pub three_year: Option<f64>,
    #[serde(rename = "5Y")]
    pub five_year: Option<f64>,
    #[serde(rename = "10Y")]
    pub ten_year: Option<f64>,
    pub since_inception: Option<f64>,
    #[serde(rename = "YTD")]
    pub year_to_date: Option<f64>,
}

impl ReturnProfile {
    pub fn get(&self, horizon: Horizon) -> Option<f64> {
        match horizon {
            Horizon::OneYear => self.one_year,
            Horizon::ThreeYear => self.three_year,
            Horizon::FiveYear => self.five_year,
            Horizon::TenYear => self.ten_year,
            Horizon::SinceInception => self.since_inception,
            Horizon::YearToDate => self.year_to_date,
        }
    }

    pub fn set(&mut self, horizon: Horizon, value: Option<f64>) {
        let slot = match horizon {
            Horizon::OneYear => &mut self.one_year,
            Horizon::ThreeYear => &mut self.three_year,
            Horizon::FiveYear => &mut self.five_year,
            Horizon::TenYear => &mut self.ten_year,
            Horizon::SinceInception => &mut self.since_inception,
            Horizon::YearToDate => &mut self.year_to_date,
        };
        *slot = value;
    }

    pub fn iter(&self) -> impl Iterator<Item = (Horizon, Option<f64>)> + '_ {
        Horizon::ALL.iter().map(move |h| (*h, self.get(*h)))
    }
}

/// One ranked line of output, built once per symbol per run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoreRow {
    pub symbol: String,
    pub trailing_pe: Option<f64>,
    pub price_to_book: Option<f64>,
    pub current_price: Option<f64>,
    pub target_mean_price: Option<f64>,
    pub returns: ReturnProfile,
    pub forecast_5y: Option<f64>,
    pub undervaluation_pct: Option<f64>,
    pub score: f64,
}

/// A symbol that was dropped from the ranking, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SymbolFailure {
    pub symbol: String,
    pub reason: String,
}

/// Result of one ranking run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RankingReport {
    /// Sorted by score, highest first
    pub rows: Vec<ScoreRow>,
    pub failures: Vec<SymbolFailure>,
    /// Horizon the `forecast_5y` column was computed over
    pub forecast_years: u32,
    pub generated_at: DateTime<Utc>,
}
