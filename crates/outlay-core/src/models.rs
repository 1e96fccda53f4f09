//! Domain models for Outlay

use chrono::{Datelike, Months, NaiveDate};
use serde::{Deserialize, Serialize};

/// Category label of the derived aggregate series
pub const ALL_CATEGORY: &str = "ALL";

/// One month of spend for a single category
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MonthlyObservation {
    /// First day of the month
    pub month: NaiveDate,
    pub category: String,
    pub amount: f64,
}

/// A forecast for one category in one future month
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ForecastRow {
    /// First day of the month
    pub month: NaiveDate,
    pub category: String,
    pub forecast_amount: f64,
    pub lower_ci: f64,
    pub upper_ci: f64,
}

/// Forecasting methods available to the ensemble
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForecastMethod {
    /// Seasonal ARIMA
    Sarima,
    /// Holt-Winters triple exponential smoothing
    HoltWinters,
    /// Classical multiplicative decomposition with a linear trend
    Decomposition,
}

impl ForecastMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Sarima => "sarima",
            Self::HoltWinters => "holt_winters",
            Self::Decomposition => "decomposition",
        }
    }

    pub fn all() -> &'static [ForecastMethod] {
        &[Self::Sarima, Self::HoltWinters, Self::Decomposition]
    }
}

impl std::str::FromStr for ForecastMethod {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "sarima" | "sarimax" | "arima" => Ok(Self::Sarima),
            "holt_winters" | "holtwinters" | "ets" => Ok(Self::HoltWinters),
            "decomposition" | "decompose" => Ok(Self::Decomposition),
            _ => Err(format!("Unknown forecast method: {}", s)),
        }
    }
}

impl std::fmt::Display for ForecastMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// What a retrain does when some categories fail to fit
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FailurePolicy {
    /// Any failed category fails the whole run
    #[default]
    Abort,
    /// Keep the previous forecast rows for failed categories
    KeepStale,
}

impl FailurePolicy {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Abort => "abort",
            Self::KeepStale => "keep_stale",
        }
    }
}

impl std::str::FromStr for FailurePolicy {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.to_lowercase().replace('-', "_").as_str() {
            "abort" => Ok(Self::Abort),
            "keep_stale" | "stale" => Ok(Self::KeepStale),
            _ => Err(format!("Unknown failure policy: {}", s)),
        }
    }
}

impl std::fmt::Display for FailurePolicy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ============================================================================
// Month arithmetic
// ============================================================================

/// Normalize a date to the first day of its month
pub fn month_start(date: NaiveDate) -> NaiveDate {
    date.with_day(1).unwrap_or(date)
}

/// First day of the month `n` months after `month`
pub fn add_months(month: NaiveDate, n: u32) -> NaiveDate {
    month_start(month)
        .checked_add_months(Months::new(n))
        .unwrap_or(NaiveDate::MAX)
}

/// First day of the following month
pub fn next_month(month: NaiveDate) -> NaiveDate {
    add_months(month, 1)
}

/// All month starts from `start` through `end`, inclusive
pub fn month_range(start: NaiveDate, end: NaiveDate) -> Vec<NaiveDate> {
    let end = month_start(end);
    let mut months = Vec::new();
    let mut current = month_start(start);
    while current <= end {
        months.push(current);
        current = next_month(current);
    }
    months
}

/// Parse "YYYY-MM" or "YYYY-MM-DD" into a month start
pub fn parse_month(s: &str) -> Option<NaiveDate> {
    let s = s.trim();
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .or_else(|_| NaiveDate::parse_from_str(&format!("{}-01", s), "%Y-%m-%d"))
        .ok()
        .map(month_start)
}

/// Format a month as "YYYY-MM"
pub fn format_month(month: NaiveDate) -> String {
    month.format("%Y-%m").to_string()
}
