//! Classical multiplicative decomposition forecast
//!
//! 1. Trend: centred moving average over one cycle (2 x m for even m)
//! 2. Seasonal index: mean of `y / trend` per cycle position, normalised to average 1
//! 3. Straight line fitted by least squares to the deseasonalised series
//! 4. Forecast: line extrapolated and multiplied back by the seasonal index

use serde::{Deserialize, Serialize};

use super::{
    check_series, fit_error, residual_interval, std_dev, ForecastModel, MethodForecast,
};
use crate::error::Result;
use crate::models::ForecastMethod;

#[derive(Debug, Clone)]
pub struct DecompositionModel {
    period: usize,
    z: f64,
}

/// Components of a decomposed series
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Decomposition {
    /// Centred moving average; `None` where the window runs off either end
    pub trend: Vec<Option<f64>>,
    /// Seasonal index per cycle position (`t % period`)
    pub seasonal_index: Vec<f64>,
    pub intercept: f64,
    pub slope: f64,
    /// `y - fitted` over the whole series
    pub residuals: Vec<f64>,
}

impl DecompositionModel {
    pub fn new(period: usize, z: f64) -> Self {
        Self { period, z }
    }

    fn moving_average(&self, series: &[f64]) -> Vec<Option<f64>> {
        let m = self.period;
        let half = m / 2;
        let n = series.len();
        (0..n)
            .map(|t| {
                if t < half || t + half >= n {
                    return None;
                }
                let value = if m % 2 == 0 {
                    let inner: f64 = series[t + 1 - half..t + half].iter().sum();
                    (0.5 * series[t - half] + inner + 0.5 * series[t + half]) / m as f64
                } else {
                    series[t - half..=t + half].iter().sum::<f64>() / m as f64
                };
                Some(value)
            })
            .collect()
    }

    pub fn decompose(&self, series: &[f64]) -> Result<Decomposition> {
        let method = ForecastMethod::Decomposition;
        check_series(method, series, self.min_observations())?;

        let m = self.period;
        let trend = self.moving_average(series);

        let mut sums = vec![0.0; m];
        let mut counts = vec![0usize; m];
        for (t, tr) in trend.iter().enumerate() {
            if let Some(tr) = tr {
                if *tr <= 0.0 {
                    return Err(fit_error(method, "moving-average trend is not positive"));
                }
                sums[t % m] += series[t] / tr;
                counts[t % m] += 1;
            }
        }
        if counts.iter().any(|&c| c == 0) {
            return Err(fit_error(method, "a cycle position has no trend estimate"));
        }

        let mut seasonal_index: Vec<f64> = sums
            .iter()
            .zip(&counts)
            .map(|(s, &c)| s / c as f64)
            .collect();
        let mean_index = seasonal_index.iter().sum::<f64>() / m as f64;
        if mean_index <= 0.0 {
            return Err(fit_error(method, "seasonal indices are not positive"));
        }
        for s in seasonal_index.iter_mut() {
            *s /= mean_index;
        }
        if seasonal_index.iter().any(|s| *s <= 0.0) {
            return Err(fit_error(method, "seasonal index collapsed to zero"));
        }

        let deseasonalized: Vec<f64> = series
            .iter()
            .enumerate()
            .map(|(t, y)| y / seasonal_index[t % m])
            .collect();
        let (intercept, slope) = least_squares_line(&deseasonalized);

        let residuals = series
            .iter()
            .enumerate()
            .map(|(t, y)| y - (intercept + slope * t as f64) * seasonal_index[t % m])
            .collect();

        Ok(Decomposition {
            trend,
            seasonal_index,
            intercept,
            slope,
            residuals,
        })
    }

    pub fn forecast(&self, series_len: usize, parts: &Decomposition, steps: usize) -> MethodForecast {
        let mean: Vec<f64> = (0..steps)
            .map(|h| {
                let t = series_len + h;
                (parts.intercept + parts.slope * t as f64) * parts.seasonal_index[t % self.period]
            })
            .collect();
        let (lower, upper) = residual_interval(&mean, std_dev(&parts.residuals), self.z);

        MethodForecast {
            method: ForecastMethod::Decomposition,
            mean,
            lower,
            upper,
        }
    }
}

impl ForecastModel for DecompositionModel {
    fn method(&self) -> ForecastMethod {
        ForecastMethod::Decomposition
    }

    fn min_observations(&self) -> usize {
        self.period * 2
    }

    fn fit_forecast(&self, series: &[f64], steps: usize) -> Result<MethodForecast> {
        let parts = self.decompose(series)?;
        Ok(self.forecast(series.len(), &parts, steps))
    }
}

/// Ordinary least squares `y = a + b t` over t = 0..n
fn least_squares_line(values: &[f64]) -> (f64, f64) {
    let n = values.len() as f64;
    let t_mean = (n - 1.0) / 2.0;
    let y_mean = values.iter().sum::<f64>() / n;

    let mut num = 0.0;
    let mut den = 0.0;
    for (t, y) in values.iter().enumerate() {
        let dt = t as f64 - t_mean;
        num += dt * (y - y_mean);
        den += dt * dt;
    }
    let slope = if den > 0.0 { num / den } else { 0.0 };
    (y_mean - slope * t_mean, slope)
}
