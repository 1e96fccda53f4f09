//! Forecasting methods and the per-category ensemble
//!
//! Every method implements [`ForecastModel`]: fit to a monthly series and
//! forecast a number of steps past its end, with a point forecast and an
//! interval per step. The [`pipeline`] runs the configured methods for each
//! category and merges them through [`ensemble`].

pub mod decomposition;
pub mod ensemble;
pub mod holt_winters;
pub mod optimize;
pub mod pipeline;
pub mod sarima;

use statrs::distribution::{ContinuousCDF, Normal};

use crate::config::ForecastConfig;
use crate::error::{Error, Result};
use crate::models::ForecastMethod;

pub use decomposition::DecompositionModel;
pub use ensemble::{combine, CombinedForecast};
pub use holt_winters::HoltWintersModel;
pub use pipeline::{run_forecast, CategoryFailure, ForecastRun};
pub use sarima::SarimaModel;

/// One method's forecast for one series
#[derive(Debug, Clone, PartialEq)]
pub struct MethodForecast {
    pub method: ForecastMethod,
    pub mean: Vec<f64>,
    pub lower: Vec<f64>,
    pub upper: Vec<f64>,
}

impl MethodForecast {
    pub fn len(&self) -> usize {
        self.mean.len()
    }

    pub fn is_empty(&self) -> bool {
        self.mean.is_empty()
    }
}

/// A statistical model that can be fitted to a series and extrapolated
pub trait ForecastModel: Send + Sync {
    fn method(&self) -> ForecastMethod;

    fn name(&self) -> &'static str {
        self.method().as_str()
    }

    /// Minimum series length the model can be fitted on
    fn min_observations(&self) -> usize;

    /// Fit to `series` (oldest first) and forecast `steps` values past its end
    fn fit_forecast(&self, series: &[f64], steps: usize) -> Result<MethodForecast>;
}

/// Build the model for `method` from the forecast config
pub fn build_model(method: ForecastMethod, config: &ForecastConfig) -> Result<Box<dyn ForecastModel>> {
    let z = z_score(config.confidence_level)?;
    let period = config.sarima.period;
    Ok(match method {
        ForecastMethod::Sarima => Box::new(SarimaModel::new(config.sarima, z)),
        ForecastMethod::HoltWinters => Box::new(HoltWintersModel::new(period, z)),
        ForecastMethod::Decomposition => Box::new(DecompositionModel::new(period, z)),
    })
}

/// Two-sided standard normal quantile for a confidence level
pub fn z_score(confidence_level: f64) -> Result<f64> {
    if !(confidence_level > 0.0 && confidence_level < 1.0) {
        return Err(Error::InvalidData(format!(
            "Confidence level must be in (0, 1), got {}",
            confidence_level
        )));
    }
    let normal = Normal::new(0.0, 1.0)
        .map_err(|e| Error::InvalidData(format!("Normal distribution: {}", e)))?;
    Ok(normal.inverse_cdf(1.0 - (1.0 - confidence_level) / 2.0))
}

/// Reject series a model can't be fitted on
pub(crate) fn check_series(method: ForecastMethod, series: &[f64], required: usize) -> Result<()> {
    if series.len() < required {
        return Err(Error::InsufficientData {
            category: String::new(),
            required,
            actual: series.len(),
        });
    }
    if series.iter().any(|x| !x.is_finite()) {
        return Err(fit_error(method, "series contains NaN or infinite values"));
    }
    let first = series[0];
    if series.iter().all(|x| (x - first).abs() < 1e-12) {
        return Err(fit_error(method, "series is constant"));
    }
    Ok(())
}

pub(crate) fn fit_error(method: ForecastMethod, reason: impl Into<String>) -> Error {
    Error::Fit {
        method: method.as_str().to_string(),
        category: String::new(),
        reason: reason.into(),
    }
}

/// Population standard deviation
pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    (values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n).sqrt()
}

/// Interval from a residual standard deviation, widening with sqrt(h)
pub(crate) fn residual_interval(mean: &[f64], sigma: f64, z: f64) -> (Vec<f64>, Vec<f64>) {
    mean.iter()
        .enumerate()
        .map(|(h, &m)| {
            let half = z * sigma * ((h + 1) as f64).sqrt();
            (m - half, m + half)
        })
        .unzip()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::OutlayConfig;

    #[test]
    fn test_z_score() {
        assert!((z_score(0.95).unwrap() - 1.959964).abs() < 1e-4);
        assert!((z_score(0.80).unwrap() - 1.281552).abs() < 1e-4);
        assert!(z_score(1.0).is_err());
    }

    #[test]
    fn test_check_series() {
        let m = ForecastMethod::Sarima;
        assert!(matches!(
            check_series(m, &[1.0, 2.0], 3),
            Err(Error::InsufficientData { required: 3, actual: 2, .. })
        ));
        assert!(matches!(
            check_series(m, &[5.0; 30], 3),
            Err(Error::Fit { .. })
        ));
        assert!(check_series(m, &[1.0, f64::NAN, 2.0], 3).is_err());
        assert!(check_series(m, &[1.0, 2.0, 3.0], 3).is_ok());
    }

    #[test]
    fn test_build_every_method() {
        let config = OutlayConfig::defaults().unwrap().forecast;
        for method in ForecastMethod::all() {
            let model = build_model(*method, &config).unwrap();
            assert_eq!(model.method(), *method);
            assert!(model.min_observations() >= 24);
        }
    }

    #[test]
    fn test_residual_interval_widens() {
        let (lower, upper) = residual_interval(&[100.0, 100.0], 10.0, 2.0);
        assert_eq!(lower[0], 80.0);
        assert_eq!(upper[0], 120.0);
        assert!(upper[1] - lower[1] > upper[0] - lower[0]);
    }
}
