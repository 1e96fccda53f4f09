//! Configuration for data generation and forecasting
//!
//! ## Configuration Resolution
//!
//! Config is loaded with a two-layer resolution:
//! 1. Embedded defaults (compiled into binary)
//! 2. An override file merged on top: the explicit `--config` path if given,
//!    otherwise `<data dir>/outlay/config.toml` when it exists
//!
//! Tables merge key by key; arrays in the override replace the defaults.
//! Environment variables (`OUTLAY_HISTORY_PATH`, `OUTLAY_FORECAST_PATH`,
//! `OUTLAY_SEED`) are applied last.

use std::fs;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::{Error, Result};
use crate::models::{FailurePolicy, ForecastMethod};

/// Embedded default config (compiled into binary)
const DEFAULT_CONFIG: &str = include_str!("../../../config/outlay.toml");

/// Longest horizon the forecast table supports
pub const MAX_HORIZON: usize = 12;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutlayConfig {
    pub paths: PathsConfig,
    pub generator: GeneratorConfig,
    pub forecast: ForecastConfig,
}

/// Where the history and forecast tables live
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PathsConfig {
    pub history: PathBuf,
    pub forecasts: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneratorConfig {
    pub seed: u64,
    /// First month of history
    pub start: NaiveDate,
    /// Last month of history (inclusive)
    pub end: NaiveDate,
    /// Multiplier per calendar month, January first
    pub seasonality: Vec<f64>,
    pub categories: Vec<CategorySpec>,
}

/// Shape of one synthetic expense category
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CategorySpec {
    pub name: String,
    /// Level at month zero
    pub base: f64,
    /// Linear growth per month, as a fraction of base
    pub trend: f64,
    /// Standard deviation of the log-normal noise
    pub noise: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ForecastConfig {
    /// Months to forecast past the end of history
    pub horizon: usize,
    pub methods: Vec<ForecastMethod>,
    pub confidence_level: f64,
    #[serde(default)]
    pub failure_policy: FailurePolicy,
    pub sarima: SarimaOrder,
}

/// SARIMA (p,d,q)x(P,D,Q,s) orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SarimaOrder {
    pub p: usize,
    pub d: usize,
    pub q: usize,
    pub seasonal_p: usize,
    pub seasonal_d: usize,
    pub seasonal_q: usize,
    pub period: usize,
}

impl Default for SarimaOrder {
    fn default() -> Self {
        Self {
            p: 1,
            d: 1,
            q: 1,
            seasonal_p: 1,
            seasonal_d: 1,
            seasonal_q: 1,
            period: 12,
        }
    }
}

impl OutlayConfig {
    /// The embedded defaults, without override files or environment
    pub fn defaults() -> Result<Self> {
        Self::from_toml(DEFAULT_CONFIG)
    }

    /// Parse a complete config document and validate it
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Embedded defaults merged with an override document
    pub fn from_override(content: &str) -> Result<Self> {
        let mut base: toml::Value = toml::from_str(DEFAULT_CONFIG)?;
        let overlay: toml::Value = toml::from_str(content)?;
        merge_toml(&mut base, overlay);
        let config: Self = base.try_into()?;
        config.validate()?;
        Ok(config)
    }

    /// Resolve the config from an explicit path, the data dir override, or the defaults
    pub fn load(explicit: Option<&Path>) -> Result<Self> {
        let override_path = match explicit {
            Some(path) => {
                if !path.exists() {
                    return Err(Error::Config(format!(
                        "Config file not found: {}",
                        path.display()
                    )));
                }
                Some(path.to_path_buf())
            }
            None => Self::override_path().filter(|p| p.exists()),
        };

        let mut config = match override_path {
            Some(path) => {
                debug!(path = %path.display(), "Loading config override");
                let content = fs::read_to_string(&path)?;
                Self::from_override(&content)?
            }
            None => Self::defaults()?,
        };

        config.apply_env_overrides();
        config.validate()?;
        Ok(config)
    }

    /// Location of the user override file
    pub fn override_path() -> Option<PathBuf> {
        dirs::data_dir().map(|d| d.join("outlay").join("config.toml"))
    }

    fn apply_env_overrides(&mut self) {
        if let Some(path) = env_nonempty("OUTLAY_HISTORY_PATH") {
            self.paths.history = PathBuf::from(path);
        }
        if let Some(path) = env_nonempty("OUTLAY_FORECAST_PATH") {
            self.paths.forecasts = PathBuf::from(path);
        }
        if let Some(seed) = env_nonempty("OUTLAY_SEED") {
            match seed.parse() {
                Ok(seed) => self.generator.seed = seed,
                Err(_) => warn!(value = %seed, "Ignoring non-numeric OUTLAY_SEED"),
            }
        }
    }

    pub fn validate(&self) -> Result<()> {
        let gen = &self.generator;
        if gen.seasonality.len() != 12 {
            return Err(Error::Config(format!(
                "generator.seasonality needs 12 values, got {}",
                gen.seasonality.len()
            )));
        }
        if gen.seasonality.iter().any(|s| !s.is_finite() || *s < 0.0) {
            return Err(Error::Config(
                "generator.seasonality values must be finite and non-negative".into(),
            ));
        }
        if gen.start > gen.end {
            return Err(Error::Config(format!(
                "generator.start {} is after generator.end {}",
                gen.start, gen.end
            )));
        }
        if gen.categories.is_empty() {
            return Err(Error::Config("generator.categories is empty".into()));
        }
        for cat in &gen.categories {
            if cat.name.is_empty() || cat.name == crate::models::ALL_CATEGORY {
                return Err(Error::Config(format!(
                    "Invalid category name '{}'",
                    cat.name
                )));
            }
            if cat.base < 0.0 || cat.noise < 0.0 {
                return Err(Error::Config(format!(
                    "Category {} needs non-negative base and noise",
                    cat.name
                )));
            }
        }

        let fc = &self.forecast;
        if fc.horizon == 0 || fc.horizon > MAX_HORIZON {
            return Err(Error::Config(format!(
                "forecast.horizon must be in 1..={}, got {}",
                MAX_HORIZON, fc.horizon
            )));
        }
        if fc.methods.is_empty() {
            return Err(Error::Config("forecast.methods is empty".into()));
        }
        if !(fc.confidence_level > 0.0 && fc.confidence_level < 1.0) {
            return Err(Error::Config(format!(
                "forecast.confidence_level must be in (0, 1), got {}",
                fc.confidence_level
            )));
        }
        if fc.sarima.period < 2 {
            return Err(Error::Config("forecast.sarima.period must be at least 2".into()));
        }
        Ok(())
    }
}

fn env_nonempty(key: &str) -> Option<String> {
    std::env::var(key).ok().filter(|s| !s.trim().is_empty())
}

/// Recursively merge `overlay` into `base`
fn merge_toml(base: &mut toml::Value, overlay: toml::Value) {
    match (base, overlay) {
        (toml::Value::Table(base), toml::Value::Table(overlay)) => {
            for (key, value) in overlay {
                match base.get_mut(&key) {
                    Some(existing) => merge_toml(existing, value),
                    None => {
                        base.insert(key, value);
                    }
                }
            }
        }
        (base, overlay) => *base = overlay,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_embedded_config_parses() {
        let config = OutlayConfig::from_toml(DEFAULT_CONFIG).unwrap();
        assert_eq!(config.generator.seed, 42);
        assert_eq!(config.generator.categories.len(), 5);
        assert_eq!(config.generator.categories[0].name, "Payroll");
        assert_eq!(config.forecast.horizon, 12);
        assert_eq!(config.forecast.methods.len(), 3);
        assert_eq!(config.forecast.sarima, SarimaOrder::default());
        assert_eq!(config.forecast.failure_policy, FailurePolicy::Abort);
    }

    #[test]
    fn test_override_merges_tables() {
        let config = OutlayConfig::from_override(
            r#"
            [generator]
            seed = 7

            [forecast]
            methods = ["sarima"]
            failure_policy = "keep_stale"
            "#,
        )
        .unwrap();

        assert_eq!(config.generator.seed, 7);
        // Untouched keys keep their defaults
        assert_eq!(config.generator.categories.len(), 5);
        assert_eq!(config.forecast.horizon, 12);
        assert_eq!(config.forecast.methods, vec![ForecastMethod::Sarima]);
        assert_eq!(config.forecast.failure_policy, FailurePolicy::KeepStale);
    }

    #[test]
    fn test_override_rejects_bad_seasonality() {
        let err = OutlayConfig::from_override("[generator]\nseasonality = [1.0, 1.0]\n")
            .unwrap_err();
        assert!(matches!(err, Error::Config(_)));
    }

    #[test]
    fn test_override_rejects_horizon_out_of_range() {
        assert!(OutlayConfig::from_override("[forecast]\nhorizon = 13\n").is_err());
        assert!(OutlayConfig::from_override("[forecast]\nhorizon = 0\n").is_err());
    }

    #[test]
    fn test_override_rejects_all_category() {
        let err = OutlayConfig::from_override(
            r#"
            [[generator.categories]]
            name = "ALL"
            base = 1.0
            trend = 0.0
            noise = 0.0
            "#,
        )
        .unwrap_err();
        assert!(err.to_string().contains("ALL"));
    }

    #[test]
    fn test_load_missing_explicit_path() {
        let result = OutlayConfig::load(Some(Path::new("/nonexistent/outlay.toml")));
        assert!(matches!(result, Err(Error::Config(_))));
    }
}
