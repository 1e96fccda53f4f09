//! Batch training and backtest commands

use std::path::Path;

use anyhow::{Context, Result};
use outlay_core::forecast::pipeline::run_from_file;
use outlay_core::models::format_month;
use outlay_core::{
    backtest::ENSEMBLE_LABEL, run_backtest, tables, BacktestReport, ForecastRun, ForecastTable,
    OutlayConfig,
};

use super::format_amount;

/// Fit every category, derive ALL and write the forecast table
pub fn cmd_train(
    config: &OutlayConfig,
    history: Option<&Path>,
    out: Option<&Path>,
    horizon: Option<usize>,
) -> Result<ForecastRun> {
    let mut forecast_config = config.forecast.clone();
    if let Some(h) = horizon {
        forecast_config.horizon = h;
        let mut check = config.clone();
        check.forecast.horizon = h;
        check.validate()?;
    }
    let history_path = history.unwrap_or(&config.paths.history);
    let out_path = out.unwrap_or(&config.paths.forecasts);

    println!(
        "📈 Training {} on {}...",
        forecast_config
            .methods
            .iter()
            .map(|m| m.as_str())
            .collect::<Vec<_>>()
            .join(" + "),
        history_path.display()
    );

    // The table on disk is what a keep_stale policy falls back to
    let previous = ForecastTable::load(out_path)
        .with_context(|| format!("Failed to read previous forecasts {}", out_path.display()))?;

    let (_, run) = run_from_file(history_path, &forecast_config, Some(previous.rows()))
        .with_context(|| format!("Failed to forecast {}", history_path.display()))?;
    tables::write_forecasts(out_path, &run.rows)
        .with_context(|| format!("Failed to write {}", out_path.display()))?;

    println!(
        "   Last observed month: {}",
        format_month(run.last_observed)
    );
    for failure in &run.failures {
        println!(
            "   ⚠️  {} kept its previous forecast: {}",
            failure.category, failure.reason
        );
    }
    println!(
        "✅ Wrote {} rows ({} months × {} categories + ALL) to {}",
        run.rows.len(),
        forecast_config.horizon,
        run.categories().len(),
        out_path.display()
    );
    Ok(run)
}

/// Score each method on the last `holdout` months
pub fn cmd_backtest(
    config: &OutlayConfig,
    holdout: usize,
    history: Option<&Path>,
    json: bool,
) -> Result<BacktestReport> {
    let history_path = history.unwrap_or(&config.paths.history);
    let rows = tables::read_history(history_path)
        .with_context(|| format!("Failed to read {}", history_path.display()))?;
    let report = run_backtest(&rows, &config.forecast, holdout)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(report);
    }

    println!(
        "🧪 Backtest: trained on {} months, scored on the last {}",
        report.train_months, report.holdout
    );
    println!();
    println!(
        "   {:<12} {:<14} {:>14} {:>14} {:>8}",
        "Category", "Method", "MAE", "RMSE", "MAPE"
    );
    println!("   {}", "─".repeat(66));
    for score in &report.scores {
        let marker = if score.method == ENSEMBLE_LABEL { "*" } else { " " };
        println!(
            "  {}{:<12} {:<14} {:>14} {:>14} {:>7.2}%",
            marker,
            score.category,
            score.method,
            format_amount(score.accuracy.mae),
            format_amount(score.accuracy.rmse),
            score.accuracy.mape * 100.0
        );
    }
    Ok(report)
}
