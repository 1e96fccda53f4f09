//! Retrain handler

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, Json};
use serde::Serialize;
use tracing::{info, warn};

use crate::{AppError, AppState};
use outlay_core::forecast::pipeline::run_from_file;
use outlay_core::models::format_month;
use outlay_core::{tables, CategoryFailure, ForecastTable, HistoryTable, MAX_HORIZON};

#[derive(Debug, Serialize)]
pub struct RetrainResponse {
    pub message: String,
    pub rows: usize,
    pub categories: Vec<String>,
    /// "YYYY-MM" of the last observed month
    pub last_observed: String,
    pub history_sha256: Option<String>,
    /// Categories that failed but kept their previous forecast
    pub failures: Vec<CategoryFailure>,
    pub elapsed_ms: u64,
}

/// POST /retrain - Refit every category on the history file and replace the forecasts
///
/// Always fits the full 12-month horizon. Retrains are serialized. Readers
/// keep seeing the previous snapshot until the new table has been written
/// to disk.
pub async fn retrain(State(state): State<Arc<AppState>>) -> Result<Json<RetrainResponse>, AppError> {
    let _guard = state.retrain_lock.lock().await;
    let started = Instant::now();

    let paths = state.config.paths.clone();
    // The query API serves every horizon up to MAX_HORIZON
    let mut forecast_config = state.config.forecast.clone();
    forecast_config.horizon = MAX_HORIZON;
    let previous = state.forecasts.snapshot();

    info!(history = %paths.history.display(), "Retrain started");

    let (history, run) = tokio::task::spawn_blocking(move || {
        let (history, run) = run_from_file(&paths.history, &forecast_config, Some(previous.rows()))?;
        tables::write_forecasts(&paths.forecasts, &run.rows)?;
        Ok::<_, outlay_core::Error>((history, run))
    })
    .await??;

    for failure in &run.failures {
        warn!(category = %failure.category, reason = %failure.reason, "Kept previous forecast");
    }

    let categories = run.categories();
    let rows = run.rows.len();
    // Forecasts first: a reader between the two swaps sees new forecasts
    // over the previous history, never stale forecasts over new history.
    state.forecasts.replace(ForecastTable::new(run.rows));
    state.history.replace(HistoryTable::new(history));

    let elapsed_ms = started.elapsed().as_millis() as u64;
    info!(rows, elapsed_ms, "Retrain complete");

    Ok(Json(RetrainResponse {
        message: "Models retrained and forecasts updated".to_string(),
        rows,
        categories,
        last_observed: format_month(run.last_observed),
        history_sha256: run.history_sha256,
        failures: run.failures,
        elapsed_ms,
    }))
}
