//! Forecast query command

use std::path::Path;

use anyhow::{bail, Context, Result};
use outlay_core::models::format_month;
use outlay_core::{Error, ForecastRow, ForecastTable, OutlayConfig};

use super::format_amount;

/// Print the next `months` forecast rows for `category`
pub fn cmd_forecast(
    config: &OutlayConfig,
    category: &str,
    months: usize,
    forecasts: Option<&Path>,
) -> Result<Vec<ForecastRow>> {
    let path = forecasts.unwrap_or(&config.paths.forecasts);
    if !path.exists() {
        bail!(
            "No forecast table at {}. Run 'outlay train' first.",
            path.display()
        );
    }
    let table = ForecastTable::load(path)
        .with_context(|| format!("Failed to read {}", path.display()))?;

    let rows = match table.for_category(category, months) {
        Ok(rows) => rows,
        Err(Error::UnknownCategory { valid, .. }) => {
            bail!(
                "Invalid category '{}'. Choose from {}",
                category,
                valid.join(", ")
            )
        }
        Err(e) => return Err(e.into()),
    };

    println!("🔮 {} forecast, next {} months", category, rows.len());
    println!();
    println!(
        "   {:<8} {:>14} {:>14} {:>14}",
        "Month", "Forecast", "Lower", "Upper"
    );
    println!("   {}", "─".repeat(53));
    for row in &rows {
        println!(
            "   {:<8} {:>14} {:>14} {:>14}",
            format_month(row.month),
            format_amount(row.forecast_amount),
            format_amount(row.lower_ci),
            format_amount(row.upper_ci)
        );
    }
    Ok(rows)
}
