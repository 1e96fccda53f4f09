//! Shared command utilities

use std::path::Path;

use anyhow::{Context, Result};
use outlay_core::OutlayConfig;

/// Resolve the config: explicit file, data dir override, or embedded defaults
pub fn load_config(explicit: Option<&Path>) -> Result<OutlayConfig> {
    let config = OutlayConfig::load(explicit).context("Failed to load configuration")?;
    tracing::debug!(
        history = %config.paths.history.display(),
        forecasts = %config.paths.forecasts.display(),
        "Configuration loaded"
    );
    Ok(config)
}
