//! Outlay Web Server
//!
//! Axum-based query API over the expense history and the latest forecasts,
//! plus a retrain trigger.
//!
//! - Reads are served from immutable in-memory snapshots
//! - Retrains run one at a time on a blocking thread and swap the snapshots
//!   only after the new forecasts are on disk
//! - Restrictive CORS policy and sanitized error responses

use std::sync::Arc;

use anyhow::Context;
use axum::{
    http::{header, HeaderValue, Method, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use tokio::sync::Mutex;
use tower_http::{cors::CorsLayer, set_header::SetResponseHeaderLayer, trace::TraceLayer};
use tracing::{error, info};

use outlay_core::{ForecastStore, ForecastTable, HistoryStore, HistoryTable, OutlayConfig};

mod handlers;

/// Server configuration
#[derive(Clone, Default)]
pub struct ServerConfig {
    /// Allowed CORS origins (empty = same-origin only)
    pub allowed_origins: Vec<String>,
}

/// Shared application state
pub struct AppState {
    pub config: OutlayConfig,
    pub history: HistoryStore,
    pub forecasts: ForecastStore,
    /// Held for the whole of a retrain so only one runs at a time
    pub retrain_lock: Mutex<()>,
}

impl AppState {
    pub fn new(config: OutlayConfig, history: HistoryTable, forecasts: ForecastTable) -> Self {
        Self {
            config,
            history: HistoryStore::new(history),
            forecasts: ForecastStore::new(forecasts),
            retrain_lock: Mutex::new(()),
        }
    }

    /// Build state from the tables at the configured paths
    ///
    /// Missing files load as empty tables; a retrain fills them in.
    pub fn load(config: OutlayConfig) -> anyhow::Result<Self> {
        let history = HistoryTable::load(&config.paths.history).with_context(|| {
            format!("Failed to read history {}", config.paths.history.display())
        })?;
        let forecasts = ForecastTable::load(&config.paths.forecasts).with_context(|| {
            format!("Failed to read forecasts {}", config.paths.forecasts.display())
        })?;
        info!(
            history_rows = history.rows().len(),
            forecast_rows = forecasts.rows().len(),
            "Loaded tables"
        );
        Ok(Self::new(config, history, forecasts))
    }
}

/// Create the application router
pub fn create_router(state: Arc<AppState>, config: ServerConfig) -> Router {
    let routes = Router::new()
        .route("/", get(handlers::home))
        .route("/monthly-expenses-data", get(handlers::monthly_expenses))
        .route("/all-category-forecast-data", get(handlers::all_forecasts))
        .route("/forecast", get(handlers::forecast))
        .route("/retrain", post(handlers::retrain));

    // Build CORS layer
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .allow_headers([header::CONTENT_TYPE]);
    let cors = if config.allowed_origins.is_empty() {
        cors
    } else {
        let origins: Vec<HeaderValue> = config
            .allowed_origins
            .iter()
            .filter_map(|o| o.parse().ok())
            .collect();
        cors.allow_origin(origins)
    };

    routes
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        // Security headers
        .layer(SetResponseHeaderLayer::overriding(
            header::X_CONTENT_TYPE_OPTIONS,
            HeaderValue::from_static("nosniff"),
        ))
        .layer(SetResponseHeaderLayer::overriding(
            header::X_FRAME_OPTIONS,
            HeaderValue::from_static("DENY"),
        ))
}

/// Start the server
pub async fn serve(
    config: OutlayConfig,
    host: &str,
    port: u16,
    server: ServerConfig,
) -> anyhow::Result<()> {
    let state = Arc::new(AppState::load(config)?);
    if state.forecasts.snapshot().is_empty() {
        info!("No forecasts on disk yet (POST /retrain to build them)");
    }

    let app = create_router(state, server);
    let addr = format!("{}:{}", host, port);

    info!("Starting server at http://{}", addr);

    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;
    axum::serve(listener, app).await?;

    Ok(())
}

// ============================================================================
// Error Handling
// ============================================================================

/// Application error type with proper HTTP status codes
#[derive(Debug)]
pub struct AppError {
    status: StatusCode,
    message: String,
    internal: Option<anyhow::Error>,
}

impl AppError {
    pub fn not_found(msg: &str) -> Self {
        Self {
            status: StatusCode::NOT_FOUND,
            message: msg.to_string(),
            internal: None,
        }
    }

    /// Well-formed request whose parameters are out of range
    pub fn unprocessable(msg: &str) -> Self {
        Self {
            status: StatusCode::UNPROCESSABLE_ENTITY,
            message: msg.to_string(),
            internal: None,
        }
    }

    pub fn status(&self) -> StatusCode {
        self.status
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        // Log the full internal error if present
        if let Some(err) = &self.internal {
            error!(error = %format!("{:#}", err), "Internal error");
        }

        let body = Json(serde_json::json!({
            "error": self.message
        }));

        (self.status, body).into_response()
    }
}

impl<E> From<E> for AppError
where
    E: Into<anyhow::Error>,
{
    fn from(err: E) -> Self {
        let err = err.into();
        Self {
            status: StatusCode::INTERNAL_SERVER_ERROR,
            // Return generic message to client
            message: "An internal error occurred".to_string(),
            // Keep full error for logging
            internal: Some(err),
        }
    }
}
