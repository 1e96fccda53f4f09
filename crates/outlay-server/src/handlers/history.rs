//! Welcome and history handlers

use std::sync::Arc;

use axum::{extract::State, Json};
use serde::Serialize;

use crate::AppState;
use outlay_core::MonthlyObservation;

#[derive(Serialize)]
pub struct WelcomeResponse {
    pub message: &'static str,
}

/// GET / - Welcome message
pub async fn home() -> Json<WelcomeResponse> {
    Json(WelcomeResponse {
        message: "Welcome to the Outlay expense forecaster",
    })
}

/// GET /monthly-expenses-data - All observed monthly expenses, ALL included
pub async fn monthly_expenses(State(state): State<Arc<AppState>>) -> Json<Vec<MonthlyObservation>> {
    let history = state.history.snapshot();
    Json(history.rows().to_vec())
}
