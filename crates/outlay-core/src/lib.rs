//! Outlay Core Library
//!
//! Shared functionality for the Outlay expense forecaster:
//! - Synthetic monthly expense generator
//! - CSV storage for the history and forecast tables
//! - Forecasting methods (SARIMA, Holt-Winters, decomposition) and their ensemble
//! - In-memory forecast snapshots for the query service
//! - Holdout backtesting

pub mod backtest;
pub mod config;
pub mod error;
pub mod forecast;
pub mod generate;
pub mod models;
pub mod store;
pub mod tables;

pub use backtest::{run_backtest, Accuracy, BacktestReport, BacktestScore};
pub use config::{ForecastConfig, GeneratorConfig, OutlayConfig, MAX_HORIZON};
pub use error::{Error, Result};
pub use forecast::{run_forecast, CategoryFailure, ForecastModel, ForecastRun, MethodForecast};
pub use generate::ExpenseGenerator;
pub use models::{FailurePolicy, ForecastMethod, ForecastRow, MonthlyObservation, ALL_CATEGORY};
pub use store::{ForecastStore, ForecastTable, HistoryStore, HistoryTable};
