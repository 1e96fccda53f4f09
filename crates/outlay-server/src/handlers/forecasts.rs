//! Forecast query handlers

use std::sync::Arc;

use axum::{
    extract::{Query, State},
    Json,
};
use serde::{Deserialize, Serialize};

use crate::{AppError, AppState};
use outlay_core::models::format_month;
use outlay_core::{Error, ForecastRow, MAX_HORIZON};

/// Category used when the query names none
pub const DEFAULT_CATEGORY: &str = "Payroll";

/// Months returned when the query names none
pub const DEFAULT_MONTHS: usize = 3;

/// Query parameters for a category forecast
#[derive(Debug, Deserialize)]
pub struct ForecastQuery {
    pub category: Option<String>,
    /// Kept as text so a non-number gets the same 422 as an out-of-range value
    pub months: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct ForecastPoint {
    /// "YYYY-MM"
    pub month: String,
    pub forecast_amount: f64,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ForecastResponse {
    Forecast {
        category: String,
        months_requested: usize,
        forecast: Vec<ForecastPoint>,
    },
    /// Unknown category: the request was valid, so this is a normal body
    InvalidCategory {
        error: String,
        valid_categories: Vec<String>,
    },
}

fn parse_months(raw: Option<&str>) -> Result<usize, AppError> {
    let Some(raw) = raw else {
        return Ok(DEFAULT_MONTHS);
    };
    match raw.trim().parse::<usize>() {
        Ok(n) if (1..=MAX_HORIZON).contains(&n) => Ok(n),
        _ => Err(AppError::unprocessable(&format!(
            "months must be an integer between 1 and {}",
            MAX_HORIZON
        ))),
    }
}

/// GET /all-category-forecast-data - Every row of the current forecast table
pub async fn all_forecasts(State(state): State<Arc<AppState>>) -> Json<Vec<ForecastRow>> {
    let table = state.forecasts.snapshot();
    Json(table.rows().to_vec())
}

/// GET /forecast - Next months of forecast for one category
pub async fn forecast(
    State(state): State<Arc<AppState>>,
    Query(params): Query<ForecastQuery>,
) -> Result<Json<ForecastResponse>, AppError> {
    let months = parse_months(params.months.as_deref())?;
    let category = params
        .category
        .unwrap_or_else(|| DEFAULT_CATEGORY.to_string());

    let table = state.forecasts.snapshot();
    if table.is_empty() {
        return Err(AppError::not_found(
            "No forecasts available yet; POST /retrain to build them",
        ));
    }

    match table.for_category(&category, months) {
        Ok(rows) => Ok(Json(ForecastResponse::Forecast {
            category,
            months_requested: months,
            forecast: rows
                .iter()
                .map(|r| ForecastPoint {
                    month: format_month(r.month),
                    forecast_amount: r.forecast_amount,
                })
                .collect(),
        })),
        Err(Error::UnknownCategory { valid, .. }) => Ok(Json(ForecastResponse::InvalidCategory {
            error: format!("Invalid category. Choose from {:?}", valid),
            valid_categories: valid,
        })),
        Err(e @ Error::HorizonExceeded { .. }) => Err(AppError::unprocessable(&e.to_string())),
        Err(e) => Err(e.into()),
    }
}
