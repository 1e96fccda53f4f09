//! CLI command tests
//!
//! This module contains all tests for the CLI commands.

use std::path::Path;

use outlay_core::{tables, ForecastMethod, OutlayConfig, ALL_CATEGORY};
use tempfile::TempDir;

use crate::commands::{self, format_amount};

/// Defaults with both tables inside `dir` and quick methods only
fn test_config(dir: &Path) -> OutlayConfig {
    let mut config = OutlayConfig::defaults().unwrap();
    config.paths.history = dir.join("data").join("expenses_monthly.csv");
    config.paths.forecasts = dir.join("artifacts").join("forecasts.csv");
    config.forecast.methods = vec![ForecastMethod::HoltWinters, ForecastMethod::Decomposition];
    config
}

// ========== Helper Tests ==========

#[test]
fn test_format_amount() {
    assert_eq!(format_amount(0.0), "0.00");
    assert_eq!(format_amount(999.999), "1,000.00");
    assert_eq!(format_amount(1234567.891), "1,234,567.89");
    assert_eq!(format_amount(-45000.5), "-45,000.50");
}

// ========== Config Tests ==========

#[test]
fn test_load_config_missing_explicit_file() {
    let dir = TempDir::new().unwrap();
    let result = commands::load_config(Some(&dir.path().join("nope.toml")));
    assert!(result.is_err());
}

#[test]
fn test_load_config_explicit_override() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("outlay.toml");
    std::fs::write(
        &path,
        "[generator]\nseed = 7\n\n[forecast]\nhorizon = 6\nmethods = [\"holt_winters\"]\n",
    )
    .unwrap();

    let config = commands::load_config(Some(&path)).unwrap();
    assert_eq!(config.forecast.horizon, 6);
    assert_eq!(config.forecast.methods, vec![ForecastMethod::HoltWinters]);
    // Untouched keys keep their defaults
    assert_eq!(config.generator.categories.len(), 5);
    assert_eq!(config.forecast.sarima.period, 12);
}

// ========== Generate Command Tests ==========

#[test]
fn test_cmd_generate_writes_history() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let path = commands::cmd_generate(&config, None, None).unwrap();
    assert_eq!(path, config.paths.history);

    let rows = tables::read_history(&path).unwrap();
    assert_eq!(rows.len(), 56 * 6);
}

#[test]
fn test_cmd_generate_seed_override() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    let a = commands::cmd_generate(&config, Some(1), Some(&dir.path().join("a.csv"))).unwrap();
    let b = commands::cmd_generate(&config, Some(1), Some(&dir.path().join("b.csv"))).unwrap();
    let c = commands::cmd_generate(&config, Some(2), Some(&dir.path().join("c.csv"))).unwrap();

    let bytes = |p: &Path| std::fs::read(p).unwrap();
    assert_eq!(bytes(&a), bytes(&b));
    assert_ne!(bytes(&a), bytes(&c));
}

// ========== Train Command Tests ==========

#[test]
fn test_cmd_train_writes_forecasts() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    commands::cmd_generate(&config, None, None).unwrap();

    let run = commands::cmd_train(&config, None, None, None).unwrap();
    assert_eq!(run.rows.len(), 6 * 12);
    assert!(run.history_sha256.is_some());

    let written = tables::read_forecasts(&config.paths.forecasts).unwrap();
    assert_eq!(written, run.rows);
}

#[test]
fn test_cmd_train_horizon_override() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    commands::cmd_generate(&config, None, None).unwrap();

    let run = commands::cmd_train(&config, None, None, Some(4)).unwrap();
    assert_eq!(run.rows.len(), 6 * 4);

    assert!(commands::cmd_train(&config, None, None, Some(13)).is_err());
}

#[test]
fn test_cmd_train_missing_history() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    assert!(commands::cmd_train(&config, None, None, None).is_err());
    assert!(!config.paths.forecasts.exists());
}

// ========== Forecast Command Tests ==========

#[test]
fn test_cmd_forecast_rows() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    commands::cmd_generate(&config, None, None).unwrap();
    commands::cmd_train(&config, None, None, None).unwrap();

    let rows = commands::cmd_forecast(&config, ALL_CATEGORY, 5, None).unwrap();
    assert_eq!(rows.len(), 5);
    assert!(rows.windows(2).all(|w| w[0].month < w[1].month));
}

#[test]
fn test_cmd_forecast_errors() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());

    // No table yet
    assert!(commands::cmd_forecast(&config, "Payroll", 3, None).is_err());

    commands::cmd_generate(&config, None, None).unwrap();
    commands::cmd_train(&config, None, None, None).unwrap();

    let err = commands::cmd_forecast(&config, "Rent", 3, None).unwrap_err();
    assert!(err.to_string().contains("Choose from"));
    assert!(commands::cmd_forecast(&config, "Payroll", 0, None).is_err());
    assert!(commands::cmd_forecast(&config, "Payroll", 13, None).is_err());
}

// ========== Backtest Command Tests ==========

#[test]
fn test_cmd_backtest() {
    let dir = TempDir::new().unwrap();
    let config = test_config(dir.path());
    commands::cmd_generate(&config, None, None).unwrap();

    let report = commands::cmd_backtest(&config, 6, None, false).unwrap();
    assert_eq!(report.holdout, 6);
    assert_eq!(report.scores.len(), 6 * 3);

    assert!(commands::cmd_backtest(&config, 40, None, true).is_err());
}
