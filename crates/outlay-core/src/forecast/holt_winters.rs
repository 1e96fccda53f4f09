//! Holt-Winters triple exponential smoothing
//!
//! Additive trend, multiplicative seasonality:
//!
//! - level:  `l_t = alpha * y_t / s_{t-m} + (1 - alpha) * (l_{t-1} + b_{t-1})`
//! - trend:  `b_t = beta * (l_t - l_{t-1}) + (1 - beta) * b_{t-1}`
//! - season: `s_t = gamma * y_t / l_t + (1 - gamma) * s_{t-m}`
//!
//! Smoothing parameters are picked by grid search on the one-step-ahead
//! squared error. Intervals come from the in-sample residual spread.

use tracing::debug;

use super::{
    check_series, fit_error, residual_interval, std_dev, ForecastModel, MethodForecast,
};
use crate::error::Result;
use crate::models::ForecastMethod;

/// Grid of candidate smoothing values
const GRID: [f64; 9] = [0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9];

#[derive(Debug, Clone)]
pub struct HoltWintersModel {
    period: usize,
    z: f64,
}

/// Fitted state after the last observation
#[derive(Debug, Clone, PartialEq)]
pub struct HoltWintersState {
    pub alpha: f64,
    pub beta: f64,
    pub gamma: f64,
    pub level: f64,
    pub trend: f64,
    /// Seasonal factors indexed by position in the cycle (`t % period`)
    pub seasonal: Vec<f64>,
    /// One-step-ahead errors from the second cycle on
    pub residuals: Vec<f64>,
    /// Number of observations fitted
    pub observations: usize,
}

impl HoltWintersModel {
    pub fn new(period: usize, z: f64) -> Self {
        Self { period, z }
    }

    /// Run the recursions for one parameter triple
    fn smooth(&self, series: &[f64], alpha: f64, beta: f64, gamma: f64) -> Option<HoltWintersState> {
        let m = self.period;
        let first_avg = series[..m].iter().sum::<f64>() / m as f64;
        let second_avg = series[m..2 * m].iter().sum::<f64>() / m as f64;
        if first_avg <= 0.0 {
            return None;
        }

        let mut level = first_avg;
        let mut trend = (second_avg - first_avg) / m as f64;
        let mut seasonal: Vec<f64> = series[..m].iter().map(|y| y / first_avg).collect();
        let mut residuals = Vec::with_capacity(series.len() - m);

        for (t, &y) in series.iter().enumerate().skip(m) {
            let idx = t % m;
            let prev_season = seasonal[idx];
            let predicted = (level + trend) * prev_season;
            residuals.push(y - predicted);

            let prev_level = level;
            let deseasonalized = if prev_season.abs() > 1e-10 { y / prev_season } else { y };
            level = alpha * deseasonalized + (1.0 - alpha) * (level + trend);
            trend = beta * (level - prev_level) + (1.0 - beta) * trend;
            if level.abs() > 1e-10 {
                seasonal[idx] = gamma * (y / level) + (1.0 - gamma) * prev_season;
            }
        }

        if !level.is_finite() || !trend.is_finite() {
            return None;
        }

        Some(HoltWintersState {
            alpha,
            beta,
            gamma,
            level,
            trend,
            seasonal,
            residuals,
            observations: series.len(),
        })
    }

    /// Fit by grid search over (alpha, beta, gamma)
    pub fn fit(&self, series: &[f64]) -> Result<HoltWintersState> {
        let method = ForecastMethod::HoltWinters;
        check_series(method, series, self.min_observations())?;

        let mut best: Option<(f64, HoltWintersState)> = None;
        for &alpha in &GRID {
            for &beta in &GRID {
                for &gamma in &GRID {
                    let Some(state) = self.smooth(series, alpha, beta, gamma) else {
                        continue;
                    };
                    let sse: f64 = state.residuals.iter().map(|e| e * e).sum();
                    if !sse.is_finite() {
                        continue;
                    }
                    if best.as_ref().map_or(true, |(b, _)| sse < *b) {
                        best = Some((sse, state));
                    }
                }
            }
        }

        let (sse, state) = best.ok_or_else(|| {
            fit_error(method, "no smoothing parameters produced a finite fit (first cycle must average above zero)")
        })?;

        debug!(
            alpha = state.alpha,
            beta = state.beta,
            gamma = state.gamma,
            sse,
            "Holt-Winters fit"
        );
        Ok(state)
    }

    pub fn forecast(&self, state: &HoltWintersState, steps: usize) -> MethodForecast {
        let n = state.observations;
        let mean: Vec<f64> = (1..=steps)
            .map(|h| {
                let idx = (n + h - 1) % self.period;
                (state.level + h as f64 * state.trend) * state.seasonal[idx]
            })
            .collect();
        let (lower, upper) = residual_interval(&mean, std_dev(&state.residuals), self.z);

        MethodForecast {
            method: ForecastMethod::HoltWinters,
            mean,
            lower,
            upper,
        }
    }
}

impl ForecastModel for HoltWintersModel {
    fn method(&self) -> ForecastMethod {
        ForecastMethod::HoltWinters
    }

    fn min_observations(&self) -> usize {
        self.period * 2
    }

    fn fit_forecast(&self, series: &[f64], steps: usize) -> Result<MethodForecast> {
        let state = self.fit(series)?;
        Ok(self.forecast(&state, steps))
    }
}
