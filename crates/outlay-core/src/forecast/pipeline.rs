//! Batch forecast over every category in a history table

use std::collections::BTreeMap;
use std::path::Path;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{debug, info, warn};

use super::ensemble::{aggregate_all, combine};
use super::{build_model, ForecastModel};
use crate::config::ForecastConfig;
use crate::error::{Error, Result};
use crate::models::{
    add_months, format_month, next_month, FailurePolicy, ForecastRow, MonthlyObservation,
    ALL_CATEGORY,
};
use crate::tables;

/// One category's ordered, gap-free series
#[derive(Debug, Clone, PartialEq)]
pub struct CategorySeries {
    pub category: String,
    pub months: Vec<NaiveDate>,
    pub values: Vec<f64>,
}

impl CategorySeries {
    pub fn last_month(&self) -> Option<NaiveDate> {
        self.months.last().copied()
    }
}

/// A category that could not be forecast in this run
#[derive(Debug, Clone, Serialize)]
pub struct CategoryFailure {
    pub category: String,
    pub reason: String,
    /// Previous rows were carried over in place of a fresh forecast
    pub kept_stale: bool,
}

/// Output of a batch forecast
#[derive(Debug, Clone)]
pub struct ForecastRun {
    /// Category rows plus ALL, sorted by (category, month)
    pub rows: Vec<ForecastRow>,
    pub failures: Vec<CategoryFailure>,
    pub last_observed: NaiveDate,
    /// SHA-256 of the history file, when the run was read from one
    pub history_sha256: Option<String>,
}

impl ForecastRun {
    /// Named categories in the run, without ALL
    pub fn categories(&self) -> Vec<String> {
        let mut categories: Vec<String> = Vec::new();
        for row in &self.rows {
            if row.category != ALL_CATEGORY && !categories.contains(&row.category) {
                categories.push(row.category.clone());
            }
        }
        categories
    }
}

/// Split a history table into per-category series, checking month contiguity
///
/// ALL rows are skipped; the aggregate is always re-derived.
pub fn group_series(history: &[MonthlyObservation]) -> Result<Vec<CategorySeries>> {
    let mut grouped: BTreeMap<&str, Vec<(NaiveDate, f64)>> = BTreeMap::new();
    for obs in history.iter().filter(|o| o.category != ALL_CATEGORY) {
        grouped
            .entry(obs.category.as_str())
            .or_default()
            .push((obs.month, obs.amount));
    }
    if grouped.is_empty() {
        return Err(Error::InvalidData(
            "History has no category observations".into(),
        ));
    }

    let mut series = Vec::with_capacity(grouped.len());
    for (category, mut points) in grouped {
        points.sort_by_key(|(month, _)| *month);
        for pair in points.windows(2) {
            let expected = next_month(pair[0].0);
            if pair[1].0 != expected {
                return Err(Error::InvalidData(format!(
                    "{} history has a gap or duplicate: {} follows {} (expected {})",
                    category,
                    format_month(pair[1].0),
                    format_month(pair[0].0),
                    format_month(expected)
                )));
            }
        }
        let (months, values) = points.into_iter().unzip();
        series.push(CategorySeries {
            category: category.to_string(),
            months,
            values,
        });
    }
    Ok(series)
}

/// Fit every model on one series and combine them into forecast rows
pub fn forecast_category(
    series: &CategorySeries,
    models: &[Box<dyn ForecastModel>],
    horizon: usize,
) -> Result<Vec<ForecastRow>> {
    let last = series
        .last_month()
        .ok_or_else(|| Error::InvalidData(format!("{} has no observations", series.category)))?;

    let mut forecasts = Vec::with_capacity(models.len());
    for model in models {
        let forecast = model
            .fit_forecast(&series.values, horizon)
            .map_err(|e| e.for_category(&series.category))?;
        debug!(
            category = %series.category,
            method = model.name(),
            first = forecast.mean.first().copied().unwrap_or_default(),
            "Method forecast"
        );
        forecasts.push(forecast);
    }

    let combined = combine(&forecasts)?;
    Ok((0..horizon)
        .map(|h| ForecastRow {
            month: add_months(last, h as u32 + 1),
            category: series.category.clone(),
            forecast_amount: combined.mean[h],
            lower_ci: combined.lower[h],
            upper_ci: combined.upper[h],
        })
        .collect())
}

/// Forecast every category in `history` and derive ALL
///
/// `previous` is the table currently being served; it is only consulted
/// under [`FailurePolicy::KeepStale`].
pub fn run_forecast(
    history: &[MonthlyObservation],
    config: &ForecastConfig,
    previous: Option<&[ForecastRow]>,
) -> Result<ForecastRun> {
    let series = group_series(history)?;

    let first_last = series[0].last_month();
    if let Some(off) = series.iter().find(|s| s.last_month() != first_last) {
        return Err(Error::InvalidData(format!(
            "{} history ends in a different month than {}",
            off.category, series[0].category
        )));
    }
    let last_observed = first_last
        .ok_or_else(|| Error::InvalidData("History has no observations".into()))?;

    let models = config
        .methods
        .iter()
        .map(|m| build_model(*m, config))
        .collect::<Result<Vec<_>>>()?;
    let horizon = config.horizon;

    info!(
        categories = series.len(),
        methods = models.len(),
        horizon,
        last_observed = %format_month(last_observed),
        "Running forecast"
    );

    let (mut rows, failures) = collect_categories(
        &series,
        config.failure_policy,
        previous,
        last_observed,
        horizon,
        |s| forecast_category(s, &models, horizon),
    )?;

    let all = aggregate_all(&rows);
    rows.extend(all);
    rows.sort_by(|a, b| a.category.cmp(&b.category).then(a.month.cmp(&b.month)));

    info!(rows = rows.len(), failures = failures.len(), "Forecast complete");

    Ok(ForecastRun {
        rows,
        failures,
        last_observed,
        history_sha256: None,
    })
}

/// Read a history file and forecast it, recording the file's fingerprint
pub fn run_from_file(
    history_path: &Path,
    config: &ForecastConfig,
    previous: Option<&[ForecastRow]>,
) -> Result<(Vec<MonthlyObservation>, ForecastRun)> {
    let bytes = std::fs::read(history_path)?;
    let sha256 = tables::fingerprint_bytes(&bytes);
    let history = tables::parse_history(bytes.as_slice())?;
    debug!(path = %history_path.display(), rows = history.len(), sha256 = %sha256, "Read history");

    let mut run = run_forecast(&history, config, previous)?;
    run.history_sha256 = Some(sha256);
    Ok((history, run))
}

/// Fit each series in turn, applying `policy` to the ones that fail
///
/// Under [`FailurePolicy::Abort`] the first failure ends the loop; no
/// further categories are fit.
fn collect_categories<F>(
    series: &[CategorySeries],
    policy: FailurePolicy,
    previous: Option<&[ForecastRow]>,
    last_observed: NaiveDate,
    horizon: usize,
    mut fit: F,
) -> Result<(Vec<ForecastRow>, Vec<CategoryFailure>)>
where
    F: FnMut(&CategorySeries) -> Result<Vec<ForecastRow>>,
{
    let mut rows = Vec::with_capacity((series.len() + 1) * horizon);
    let mut failures = Vec::new();

    for s in series {
        let e = match fit(s) {
            Ok(category_rows) => {
                rows.extend(category_rows);
                continue;
            }
            Err(e) => e,
        };
        warn!(category = %s.category, error = %e, "Category forecast failed");

        let stale = match policy {
            FailurePolicy::Abort => None,
            FailurePolicy::KeepStale => {
                previous.and_then(|p| stale_rows(p, &s.category, last_observed, horizon))
            }
        };
        let Some(kept) = stale else {
            return Err(e);
        };

        info!(category = %s.category, rows = kept.len(), "Keeping previous forecast");
        failures.push(CategoryFailure {
            category: s.category.clone(),
            reason: e.to_string(),
            kept_stale: true,
        });
        rows.extend(kept);
    }

    Ok((rows, failures))
}

/// Previous rows for `category` covering exactly the months this run forecasts
fn stale_rows(
    previous: &[ForecastRow],
    category: &str,
    last_observed: NaiveDate,
    horizon: usize,
) -> Option<Vec<ForecastRow>> {
    let kept: Vec<ForecastRow> = (0..horizon)
        .map(|h| {
            let month = add_months(last_observed, h as u32 + 1);
            previous
                .iter()
                .find(|r| r.category == category && r.month == month)
                .cloned()
        })
        .collect::<Option<_>>()?;
    Some(kept)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutlayConfig;
    use crate::models::{month_range, ForecastMethod};

    const FACTORS: [f64; 12] = [
        0.98, 1.00, 1.06, 1.08, 1.03, 1.05, 1.00, 0.97, 0.99, 1.07, 1.10, 1.12,
    ];

    fn date(y: i32, m: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, 1).unwrap()
    }

    fn history(categories: &[(&str, f64)], months: usize) -> Vec<MonthlyObservation> {
        let all_months = month_range(date(2021, 1), add_months(date(2021, 1), months as u32 - 1));
        let mut rows = Vec::new();
        for (c, (name, base)) in categories.iter().enumerate() {
            for (t, month) in all_months.iter().enumerate() {
                let wiggle = if (t + c) % 3 == 0 { 1.01 } else { 0.995 };
                rows.push(MonthlyObservation {
                    month: *month,
                    category: name.to_string(),
                    amount: base * (1.0 + 0.002 * t as f64) * FACTORS[t % 12] * wiggle,
                });
            }
        }
        rows
    }

    fn config(methods: &[ForecastMethod], policy: FailurePolicy) -> ForecastConfig {
        let mut config = OutlayConfig::defaults().unwrap().forecast;
        config.methods = methods.to_vec();
        config.failure_policy = policy;
        config
    }

    #[test]
    fn test_group_series_skips_all_and_sorts() {
        let mut rows = history(&[("Payroll", 1000.0), ("Cloud", 500.0)], 3);
        rows.reverse();
        rows.push(MonthlyObservation {
            month: date(2021, 1),
            category: ALL_CATEGORY.into(),
            amount: 1.0,
        });

        let series = group_series(&rows).unwrap();
        assert_eq!(series.len(), 2);
        assert_eq!(series[0].category, "Cloud");
        assert_eq!(series[0].months, vec![date(2021, 1), date(2021, 2), date(2021, 3)]);
    }

    #[test]
    fn test_group_series_rejects_gap() {
        let mut rows = history(&[("Payroll", 1000.0)], 5);
        rows.remove(2);
        let err = group_series(&rows).unwrap_err();
        assert!(err.to_string().contains("gap"));
    }

    #[test]
    fn test_run_forecast_rows_and_all() {
        let rows = history(&[("Payroll", 1000.0), ("Cloud", 400.0)], 48);
        let config = config(
            &[ForecastMethod::HoltWinters, ForecastMethod::Decomposition],
            FailurePolicy::Abort,
        );
        let run = run_forecast(&rows, &config, None).unwrap();

        assert_eq!(run.last_observed, date(2024, 12));
        assert_eq!(run.rows.len(), 3 * 12);
        assert!(run.failures.is_empty());
        assert_eq!(run.categories(), vec!["Cloud".to_string(), "Payroll".to_string()]);

        // ALL sorts first and starts the month after the history
        assert_eq!(run.rows[0].category, ALL_CATEGORY);
        assert_eq!(run.rows[0].month, date(2025, 1));

        for h in 0..12 {
            let month = add_months(date(2024, 12), h + 1);
            let at = |cat: &str| {
                run.rows
                    .iter()
                    .find(|r| r.category == cat && r.month == month)
                    .unwrap()
                    .clone()
            };
            let all = at(ALL_CATEGORY);
            let (payroll, cloud) = (at("Payroll"), at("Cloud"));
            assert!((all.forecast_amount - payroll.forecast_amount - cloud.forecast_amount).abs() < 1e-6);
            assert!((all.lower_ci - payroll.lower_ci - cloud.lower_ci).abs() < 1e-6);
            assert!((all.upper_ci - payroll.upper_ci - cloud.upper_ci).abs() < 1e-6);
            assert!(payroll.lower_ci <= payroll.forecast_amount);
            assert!(payroll.forecast_amount <= payroll.upper_ci);
        }
    }

    #[test]
    fn test_abort_on_insufficient_category() {
        let mut rows = history(&[("Payroll", 1000.0)], 48);
        // Short category: only the last 10 months
        rows.extend(
            history(&[("Travel", 300.0)], 48)
                .into_iter()
                .skip(38),
        );
        let config = config(&[ForecastMethod::HoltWinters], FailurePolicy::Abort);
        let err = run_forecast(&rows, &config, None).unwrap_err();
        assert!(matches!(err, Error::InsufficientData { ref category, .. } if category == "Travel"));
    }

    #[test]
    fn test_keep_stale_reuses_previous_rows() {
        let mut rows = history(&[("Payroll", 1000.0)], 48);
        rows.extend(history(&[("Travel", 300.0)], 48).into_iter().skip(38));

        let previous: Vec<ForecastRow> = (0..12)
            .map(|h| ForecastRow {
                month: add_months(date(2024, 12), h + 1),
                category: "Travel".into(),
                forecast_amount: 300.0,
                lower_ci: 250.0,
                upper_ci: 350.0,
            })
            .collect();

        let config = config(&[ForecastMethod::HoltWinters], FailurePolicy::KeepStale);
        let run = run_forecast(&rows, &config, Some(&previous)).unwrap();

        assert_eq!(run.failures.len(), 1);
        assert!(run.failures[0].kept_stale);
        let travel: Vec<_> = run.rows.iter().filter(|r| r.category == "Travel").collect();
        assert_eq!(travel.len(), 12);
        assert_eq!(travel[0].forecast_amount, 300.0);

        let payroll = run
            .rows
            .iter()
            .find(|r| r.category == "Payroll" && r.month == date(2025, 1))
            .unwrap();
        let all = run
            .rows
            .iter()
            .find(|r| r.category == ALL_CATEGORY && r.month == date(2025, 1))
            .unwrap();
        assert!((all.forecast_amount - payroll.forecast_amount - 300.0).abs() < 1e-6);
    }

    #[test]
    fn test_abort_stops_fitting_after_first_failure() {
        let mut rows = history(&[("Payroll", 1000.0), ("Rent", 500.0)], 48);
        rows.extend(history(&[("Cloud", 300.0)], 48));
        let series = group_series(&rows).unwrap();
        assert_eq!(series[0].category, "Cloud");

        let mut fitted = Vec::new();
        let result = collect_categories(
            &series,
            FailurePolicy::Abort,
            None,
            date(2024, 12),
            3,
            |s| {
                fitted.push(s.category.clone());
                Err(Error::InsufficientData {
                    category: s.category.clone(),
                    required: 24,
                    actual: 0,
                })
            },
        );

        assert!(result.is_err());
        assert_eq!(fitted, vec!["Cloud"]);
    }

    #[test]
    fn test_keep_stale_continues_past_failure() {
        let rows = history(&[("Payroll", 1000.0), ("Rent", 500.0)], 48);
        let series = group_series(&rows).unwrap();
        let last = date(2024, 12);
        let previous: Vec<ForecastRow> = (0..3)
            .map(|h| ForecastRow {
                month: add_months(last, h + 1),
                category: "Payroll".into(),
                forecast_amount: 1000.0,
                lower_ci: 900.0,
                upper_ci: 1100.0,
            })
            .collect();

        let mut fitted = 0;
        let (kept, failures) = collect_categories(
            &series,
            FailurePolicy::KeepStale,
            Some(&previous),
            last,
            3,
            |s| {
                fitted += 1;
                if s.category == "Payroll" {
                    Err(Error::InvalidData("boom".into()))
                } else {
                    Ok(Vec::new())
                }
            },
        )
        .unwrap();

        assert_eq!(fitted, 2);
        assert_eq!(failures.len(), 1);
        assert_eq!(kept.len(), 3);
    }

    #[test]
    fn test_keep_stale_without_previous_aborts() {
        let mut rows = history(&[("Payroll", 1000.0)], 48);
        rows.extend(history(&[("Travel", 300.0)], 48).into_iter().skip(38));
        let config = config(&[ForecastMethod::HoltWinters], FailurePolicy::KeepStale);
        assert!(run_forecast(&rows, &config, None).is_err());
    }

    #[test]
    fn test_misaligned_history_rejected() {
        let mut rows = history(&[("Payroll", 1000.0)], 48);
        rows.extend(history(&[("Cloud", 300.0)], 47));
        let config = config(&[ForecastMethod::HoltWinters], FailurePolicy::Abort);
        assert!(matches!(
            run_forecast(&rows, &config, None),
            Err(Error::InvalidData(_))
        ));
    }
}
