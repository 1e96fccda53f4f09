//! Holdout evaluation of the forecasting methods
//!
//! Each category's last `holdout` months are hidden, every configured method
//! is fitted on the rest, and the forecasts are scored against the hidden
//! actuals. The ensemble consensus and the ALL aggregate are scored too.

use serde::Serialize;
use tracing::{debug, info};

use crate::config::ForecastConfig;
use crate::error::{Error, Result};
use crate::forecast::pipeline::{group_series, CategorySeries};
use crate::forecast::{build_model, combine, ForecastModel};
use crate::models::{MonthlyObservation, ALL_CATEGORY};

/// Method label used for the combined forecast in reports
pub const ENSEMBLE_LABEL: &str = "ensemble";

/// Forecast accuracy over a holdout window
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Accuracy {
    pub mae: f64,
    pub rmse: f64,
    /// Mean absolute percentage error as a fraction; zero actuals are skipped
    pub mape: f64,
}

impl Accuracy {
    pub fn score(actual: &[f64], predicted: &[f64]) -> Result<Self> {
        if actual.is_empty() || actual.len() != predicted.len() {
            return Err(Error::InvalidData(format!(
                "Cannot score {} predictions against {} actuals",
                predicted.len(),
                actual.len()
            )));
        }
        let n = actual.len() as f64;
        let errors: Vec<f64> = actual.iter().zip(predicted).map(|(a, p)| a - p).collect();

        let mae = errors.iter().map(|e| e.abs()).sum::<f64>() / n;
        let rmse = (errors.iter().map(|e| e * e).sum::<f64>() / n).sqrt();

        let pct: Vec<f64> = actual
            .iter()
            .zip(&errors)
            .filter(|(a, _)| a.abs() > 1e-10)
            .map(|(a, e)| (e / a).abs())
            .collect();
        let mape = if pct.is_empty() {
            f64::NAN
        } else {
            pct.iter().sum::<f64>() / pct.len() as f64
        };

        Ok(Self { mae, rmse, mape })
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestScore {
    pub category: String,
    /// Method name, or [`ENSEMBLE_LABEL`]
    pub method: String,
    #[serde(flatten)]
    pub accuracy: Accuracy,
}

#[derive(Debug, Clone, Serialize)]
pub struct BacktestReport {
    pub holdout: usize,
    /// Months each model was trained on
    pub train_months: usize,
    pub scores: Vec<BacktestScore>,
}

impl BacktestReport {
    /// Scores for one category, methods first then the ensemble
    pub fn for_category<'a>(&'a self, category: &'a str) -> impl Iterator<Item = &'a BacktestScore> {
        self.scores.iter().filter(move |s| s.category == category)
    }
}

/// Score every method on the last `holdout` months of each category
pub fn run_backtest(
    history: &[MonthlyObservation],
    config: &ForecastConfig,
    holdout: usize,
) -> Result<BacktestReport> {
    if holdout == 0 {
        return Err(Error::InvalidData("holdout must be at least one month".into()));
    }

    let mut series = group_series(history)?;
    if let Some(total) = total_series(&series) {
        series.push(total);
    }

    let models = config
        .methods
        .iter()
        .map(|m| build_model(*m, config))
        .collect::<Result<Vec<_>>>()?;
    let required = models
        .iter()
        .map(|m| m.min_observations())
        .max()
        .unwrap_or(0);

    let shortest = series.iter().map(|s| s.values.len()).min().unwrap_or(0);
    let train_months = shortest.saturating_sub(holdout);
    if train_months < required {
        let short = series
            .iter()
            .min_by_key(|s| s.values.len())
            .map(|s| s.category.clone())
            .unwrap_or_default();
        return Err(Error::InsufficientData {
            category: short,
            required: required + holdout,
            actual: shortest,
        });
    }

    info!(categories = series.len(), holdout, "Running backtest");

    let mut scores = Vec::new();
    for s in &series {
        scores.extend(score_category(s, &models, holdout)?);
    }

    Ok(BacktestReport {
        holdout,
        train_months,
        scores,
    })
}

fn score_category(
    series: &CategorySeries,
    models: &[Box<dyn ForecastModel>],
    holdout: usize,
) -> Result<Vec<BacktestScore>> {
    let split = series.values.len() - holdout;
    let (train, actual) = series.values.split_at(split);

    let mut forecasts = Vec::with_capacity(models.len());
    let mut scores = Vec::with_capacity(models.len() + 1);
    for model in models {
        let forecast = model
            .fit_forecast(train, holdout)
            .map_err(|e| e.for_category(&series.category))?;
        let accuracy = Accuracy::score(actual, &forecast.mean)?;
        debug!(
            category = %series.category,
            method = model.name(),
            mape = accuracy.mape,
            "Backtest score"
        );
        scores.push(BacktestScore {
            category: series.category.clone(),
            method: model.name().to_string(),
            accuracy,
        });
        forecasts.push(forecast);
    }

    let combined = combine(&forecasts)?;
    scores.push(BacktestScore {
        category: series.category.clone(),
        method: ENSEMBLE_LABEL.to_string(),
        accuracy: Accuracy::score(actual, &combined.mean)?,
    });
    Ok(scores)
}

/// Sum of all category series, when they cover the same months
fn total_series(series: &[CategorySeries]) -> Option<CategorySeries> {
    let first = series.first()?;
    if series.iter().any(|s| s.months != first.months) {
        return None;
    }
    let values = (0..first.values.len())
        .map(|t| series.iter().map(|s| s.values[t]).sum())
        .collect();
    Some(CategorySeries {
        category: ALL_CATEGORY.to_string(),
        months: first.months.clone(),
        values,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutlayConfig;
    use crate::generate::ExpenseGenerator;
    use crate::models::ForecastMethod;

    #[test]
    fn test_accuracy_score() {
        let acc = Accuracy::score(&[100.0, 200.0], &[110.0, 180.0]).unwrap();
        assert!((acc.mae - 15.0).abs() < 1e-12);
        assert!((acc.rmse - (250.0f64).sqrt()).abs() < 1e-12);
        assert!((acc.mape - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_accuracy_skips_zero_actuals() {
        let acc = Accuracy::score(&[0.0, 50.0], &[5.0, 55.0]).unwrap();
        assert!((acc.mape - 0.1).abs() < 1e-12);
        assert!(Accuracy::score(&[], &[]).is_err());
    }

    #[test]
    fn test_backtest_generated_history() {
        let config = OutlayConfig::defaults().unwrap();
        let history = ExpenseGenerator::new(&config.generator).generate().unwrap();
        let mut forecast = config.forecast.clone();
        forecast.methods = vec![ForecastMethod::HoltWinters, ForecastMethod::Decomposition];

        let report = run_backtest(&history, &forecast, 6).unwrap();
        assert_eq!(report.holdout, 6);
        assert_eq!(report.train_months, 50);
        // 5 categories + ALL, two methods + ensemble each
        assert_eq!(report.scores.len(), 6 * 3);

        let payroll: Vec<_> = report.for_category("Payroll").collect();
        assert_eq!(payroll.last().unwrap().method, ENSEMBLE_LABEL);
        // Payroll noise is 2%, so every method should land well within 15%
        assert!(payroll.iter().all(|s| s.accuracy.mape < 0.15));
    }

    #[test]
    fn test_backtest_holdout_too_long() {
        let config = OutlayConfig::defaults().unwrap();
        let history = ExpenseGenerator::new(&config.generator).generate().unwrap();
        let err = run_backtest(&history, &config.forecast, 20).unwrap_err();
        assert!(matches!(err, Error::InsufficientData { .. }));
        assert!(run_backtest(&history, &config.forecast, 0).is_err());
    }
}
