//! History generation command

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use outlay_core::{tables, ExpenseGenerator, OutlayConfig};

/// Generate the history table and write it; returns the path written
pub fn cmd_generate(config: &OutlayConfig, seed: Option<u64>, out: Option<&Path>) -> Result<PathBuf> {
    let mut generator_config = config.generator.clone();
    if let Some(seed) = seed {
        generator_config.seed = seed;
    }
    let path = out
        .map(Path::to_path_buf)
        .unwrap_or_else(|| config.paths.history.clone());

    println!(
        "🎲 Generating {} categories from {} to {} (seed {})...",
        generator_config.categories.len(),
        generator_config.start.format("%Y-%m"),
        generator_config.end.format("%Y-%m"),
        generator_config.seed
    );

    let generator = ExpenseGenerator::new(&generator_config);
    let rows = generator.generate().context("Failed to generate history")?;
    tables::write_history(&path, &rows)
        .with_context(|| format!("Failed to write {}", path.display()))?;

    println!(
        "✅ Wrote {} rows ({} months) to {}",
        rows.len(),
        generator.months().len(),
        path.display()
    );
    Ok(path)
}
