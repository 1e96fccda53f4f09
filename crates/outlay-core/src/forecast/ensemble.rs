//! Combine method forecasts into a consensus and roll categories up into ALL

use std::collections::BTreeMap;

use chrono::NaiveDate;

use super::MethodForecast;
use crate::error::{Error, Result};
use crate::models::{ForecastRow, ALL_CATEGORY};

/// Consensus forecast for one category
#[derive(Debug, Clone, PartialEq)]
pub struct CombinedForecast {
    pub mean: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

/// Merge forecasts from several methods, step by step
///
/// The consensus is the mean of the point forecasts. With two or more
/// methods the band is the min/max of their point forecasts (how far the
/// methods disagree). A single method keeps its own interval.
pub fn combine(forecasts: &[MethodForecast]) -> Result<CombinedForecast> {
    let first = forecasts
        .first()
        .ok_or_else(|| Error::InvalidData("No method forecasts to combine".into()))?;
    let steps = first.len();
    if let Some(bad) = forecasts.iter().find(|f| f.len() != steps) {
        return Err(Error::InvalidData(format!(
            "{} forecast has {} steps, expected {}",
            bad.method,
            bad.len(),
            steps
        )));
    }

    if forecasts.len() == 1 {
        return Ok(CombinedForecast {
            mean: first.mean.clone(),
            lower: first.lower.clone(),
            upper: first.upper.clone(),
        });
    }

    let count = forecasts.len() as f64;
    let mut combined = CombinedForecast {
        mean: Vec::with_capacity(steps),
        lower: Vec::with_capacity(steps),
        upper: Vec::with_capacity(steps),
    };
    for h in 0..steps {
        let points = forecasts.iter().map(|f| f.mean[h]);
        combined.mean.push(points.clone().sum::<f64>() / count);
        combined.lower.push(points.clone().fold(f64::INFINITY, f64::min));
        combined.upper.push(points.fold(f64::NEG_INFINITY, f64::max));
    }
    Ok(combined)
}

/// Sum category rows into one ALL row per month
///
/// Forecast, lower and upper are summed independently. Existing ALL rows
/// in the input are ignored.
pub fn aggregate_all(rows: &[ForecastRow]) -> Vec<ForecastRow> {
    let mut by_month: BTreeMap<NaiveDate, (f64, f64, f64)> = BTreeMap::new();
    for row in rows.iter().filter(|r| r.category != ALL_CATEGORY) {
        let entry = by_month.entry(row.month).or_default();
        entry.0 += row.forecast_amount;
        entry.1 += row.lower_ci;
        entry.2 += row.upper_ci;
    }

    by_month
        .into_iter()
        .map(|(month, (forecast_amount, lower_ci, upper_ci))| ForecastRow {
            month,
            category: ALL_CATEGORY.to_string(),
            forecast_amount,
            lower_ci,
            upper_ci,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::ForecastMethod;

    fn method(method: ForecastMethod, mean: &[f64], spread: f64) -> MethodForecast {
        MethodForecast {
            method,
            mean: mean.to_vec(),
            lower: mean.iter().map(|m| m - spread).collect(),
            upper: mean.iter().map(|m| m + spread).collect(),
        }
    }

    #[test]
    fn test_combine_mean_and_range() {
        let combined = combine(&[
            method(ForecastMethod::Sarima, &[100.0, 110.0], 5.0),
            method(ForecastMethod::HoltWinters, &[90.0, 130.0], 5.0),
            method(ForecastMethod::Decomposition, &[110.0, 120.0], 5.0),
        ])
        .unwrap();

        assert_eq!(combined.mean, vec![100.0, 120.0]);
        assert_eq!(combined.lower, vec![90.0, 110.0]);
        assert_eq!(combined.upper, vec![110.0, 130.0]);
    }

    #[test]
    fn test_combine_single_method_keeps_interval() {
        let only = method(ForecastMethod::Sarima, &[100.0, 200.0], 15.0);
        let combined = combine(std::slice::from_ref(&only)).unwrap();
        assert_eq!(combined.mean, only.mean);
        assert_eq!(combined.lower, vec![85.0, 185.0]);
        assert_eq!(combined.upper, vec![115.0, 215.0]);
    }

    #[test]
    fn test_combine_rejects_empty_and_ragged() {
        assert!(combine(&[]).is_err());
        let err = combine(&[
            method(ForecastMethod::Sarima, &[1.0, 2.0], 1.0),
            method(ForecastMethod::HoltWinters, &[1.0], 1.0),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("holt_winters"));
    }

    #[test]
    fn test_consensus_within_band() {
        let combined = combine(&[
            method(ForecastMethod::Sarima, &[3.0, -1.0, 7.5], 0.0),
            method(ForecastMethod::HoltWinters, &[4.0, 2.0, 7.0], 0.0),
        ])
        .unwrap();
        for h in 0..3 {
            assert!(combined.lower[h] <= combined.mean[h]);
            assert!(combined.mean[h] <= combined.upper[h]);
        }
    }

    #[test]
    fn test_aggregate_all_sums_independently() {
        let month = NaiveDate::from_ymd_opt(2025, 9, 1).unwrap();
        let row = |category: &str, f: f64, l: f64, u: f64| ForecastRow {
            month,
            category: category.to_string(),
            forecast_amount: f,
            lower_ci: l,
            upper_ci: u,
        };
        let rows = vec![
            row("Cloud", 100.0, 90.0, 120.0),
            row("Payroll", 1000.0, 950.0, 1010.0),
            row(ALL_CATEGORY, 1.0, 1.0, 1.0),
        ];

        let all = aggregate_all(&rows);
        assert_eq!(all.len(), 1);
        assert_eq!(all[0].category, ALL_CATEGORY);
        assert_eq!(all[0].forecast_amount, 1100.0);
        assert_eq!(all[0].lower_ci, 1040.0);
        assert_eq!(all[0].upper_ci, 1130.0);
    }
}
