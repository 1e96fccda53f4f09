//! Seasonal ARIMA (p,d,q)x(P,D,Q,s)
//!
//! The series is differenced `d` times at lag 1 and `D` times at lag `s`.
//! The remaining multiplicative ARMA
//!
//! ```text
//! phi(B) Phi(B^s) w_t = theta(B) Theta(B^s) e_t
//! ```
//!
//! is estimated by conditional sum of squares. Each coefficient is bounded
//! to (-1, 1) through `tanh` and the objective is minimised with Nelder-Mead.
//!
//! Forecasts run the integrated recursion on the original scale with future
//! shocks set to zero. Interval half-width at step `h` is
//! `z * sigma * sqrt(sum_{j<h} psi_j^2)` where `psi` are the MA(inf) weights of
//! the integrated model.

use tracing::{debug, warn};

use super::optimize::NelderMead;
use super::{check_series, fit_error, ForecastModel, MethodForecast};
use crate::config::SarimaOrder;
use crate::error::Result;
use crate::models::ForecastMethod;

#[derive(Debug, Clone)]
pub struct SarimaModel {
    order: SarimaOrder,
    z: f64,
    solver: NelderMead,
}

/// Estimated coefficients of a fitted model
#[derive(Debug, Clone, PartialEq)]
pub struct SarimaFit {
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub seasonal_ar: Vec<f64>,
    pub seasonal_ma: Vec<f64>,
    /// Residual variance
    pub sigma2: f64,
}

impl SarimaModel {
    pub fn new(order: SarimaOrder, z: f64) -> Self {
        Self {
            order,
            z,
            solver: NelderMead {
                max_iterations: 20_000,
                ..Default::default()
            },
        }
    }

    fn param_count(&self) -> usize {
        let o = &self.order;
        o.p + o.q + o.seasonal_p + o.seasonal_q
    }

    fn integration_lag(&self) -> usize {
        self.order.d + self.order.seasonal_d * self.order.period
    }

    /// Largest lag of the ARMA polynomials on the differenced series
    fn ar_lag(&self) -> usize {
        self.order.p + self.order.seasonal_p * self.order.period
    }

    fn ma_lag(&self) -> usize {
        self.order.q + self.order.seasonal_q * self.order.period
    }

    /// Split an unconstrained parameter vector into bounded coefficients
    fn unpack(&self, raw: &[f64]) -> (Vec<f64>, Vec<f64>, Vec<f64>, Vec<f64>) {
        let o = &self.order;
        let bounded: Vec<f64> = raw.iter().map(|u| u.tanh()).collect();
        let (ar, rest) = bounded.split_at(o.p);
        let (ma, rest) = rest.split_at(o.q);
        let (sar, sma) = rest.split_at(o.seasonal_p);
        (ar.to_vec(), ma.to_vec(), sar.to_vec(), sma.to_vec())
    }

    /// AR and MA polynomials (coefficient of B^k at index k) on the differenced series
    fn polynomials(&self, ar: &[f64], ma: &[f64], sar: &[f64], sma: &[f64]) -> (Vec<f64>, Vec<f64>) {
        let s = self.order.period;
        let ar_poly = poly_mul(&lag_poly(ar, 1, -1.0), &lag_poly(sar, s, -1.0));
        let ma_poly = poly_mul(&lag_poly(ma, 1, 1.0), &lag_poly(sma, s, 1.0));
        (ar_poly, ma_poly)
    }

    /// AR polynomial of the undifferenced series
    fn integrated_ar(&self, ar_poly: &[f64]) -> Vec<f64> {
        let mut poly = ar_poly.to_vec();
        for _ in 0..self.order.d {
            poly = poly_mul(&poly, &[1.0, -1.0]);
        }
        let mut seasonal_diff = vec![0.0; self.order.period + 1];
        seasonal_diff[0] = 1.0;
        seasonal_diff[self.order.period] = -1.0;
        for _ in 0..self.order.seasonal_d {
            poly = poly_mul(&poly, &seasonal_diff);
        }
        poly
    }

    fn difference(&self, series: &[f64]) -> Vec<f64> {
        let mut w = series.to_vec();
        for _ in 0..self.order.d {
            w = w.windows(2).map(|p| p[1] - p[0]).collect();
        }
        let s = self.order.period;
        for _ in 0..self.order.seasonal_d {
            w = (s..w.len()).map(|t| w[t] - w[t - s]).collect();
        }
        w
    }

    /// Fit the coefficients on a series (oldest first)
    pub fn fit(&self, series: &[f64]) -> Result<SarimaFit> {
        let method = ForecastMethod::Sarima;
        check_series(method, series, self.min_observations())?;

        let (w, _) = self.prepare(series);
        let scale = series.iter().fold(1.0_f64, |acc, v| acc.max(v.abs()));
        if w.iter().all(|x| x.abs() < 1e-9 * scale) {
            return Err(fit_error(method, "differenced series is constant"));
        }

        let start = self.ar_lag();
        let objective = |raw: &[f64]| {
            let (ar, ma, sar, sma) = self.unpack(raw);
            let (ar_poly, ma_poly) = self.polynomials(&ar, &ma, &sar, &sma);
            let e = css_residuals(&w, &ar_poly, &ma_poly);
            e[start..].iter().map(|x| x * x).sum::<f64>()
        };

        let min = self
            .solver
            .minimize(objective, &vec![0.0; self.param_count()]);

        if !min.value.is_finite() {
            return Err(fit_error(method, "objective is not finite"));
        }
        if !min.converged {
            warn!(
                iterations = min.iterations,
                sse = min.value,
                "SARIMA optimizer stopped before converging; using best point"
            );
        }

        let (ar, ma, seasonal_ar, seasonal_ma) = self.unpack(&min.point);
        let sigma2 = min.value / (w.len() - start) as f64;

        debug!(
            ?ar,
            ?ma,
            ?seasonal_ar,
            ?seasonal_ma,
            sigma2,
            iterations = min.iterations,
            "SARIMA fit"
        );

        Ok(SarimaFit {
            ar,
            ma,
            seasonal_ar,
            seasonal_ma,
            sigma2,
        })
    }

    /// Centre when nothing is differenced, then difference
    fn prepare(&self, series: &[f64]) -> (Vec<f64>, f64) {
        let mean = if self.integration_lag() == 0 {
            series.iter().sum::<f64>() / series.len() as f64
        } else {
            0.0
        };
        let centred: Vec<f64> = series.iter().map(|y| y - mean).collect();
        (self.difference(&centred), mean)
    }

    /// Forecast from a fitted model
    pub fn forecast(&self, series: &[f64], fit: &SarimaFit, steps: usize) -> MethodForecast {
        let (w, mean) = self.prepare(series);
        let (ar_poly, ma_poly) =
            self.polynomials(&fit.ar, &fit.ma, &fit.seasonal_ar, &fit.seasonal_ma);
        let full_ar = self.integrated_ar(&ar_poly);

        // Residuals aligned to the original index; the differenced-away prefix has none
        let offset = self.integration_lag();
        let mut shocks = vec![0.0; offset];
        shocks.extend(css_residuals(&w, &ar_poly, &ma_poly));

        let mut y: Vec<f64> = series.iter().map(|v| v - mean).collect();
        let n = y.len();
        for t in n..n + steps {
            let mut value = 0.0;
            for (k, a) in full_ar.iter().enumerate().skip(1) {
                if k <= t {
                    value -= a * y[t - k];
                }
            }
            for (k, m) in ma_poly.iter().enumerate().skip(1) {
                if k <= t && t - k < n {
                    value += m * shocks[t - k];
                }
            }
            y.push(value);
        }

        let psi = psi_weights(&full_ar, &ma_poly, steps);
        let sigma = fit.sigma2.max(0.0).sqrt();

        let mut out_mean = Vec::with_capacity(steps);
        let mut lower = Vec::with_capacity(steps);
        let mut upper = Vec::with_capacity(steps);
        let mut cumulative = 0.0;
        for h in 0..steps {
            cumulative += psi[h] * psi[h];
            let point = y[n + h] + mean;
            let half = self.z * sigma * cumulative.sqrt();
            out_mean.push(point);
            lower.push(point - half);
            upper.push(point + half);
        }

        MethodForecast {
            method: ForecastMethod::Sarima,
            mean: out_mean,
            lower,
            upper,
        }
    }
}

impl ForecastModel for SarimaModel {
    fn method(&self) -> ForecastMethod {
        ForecastMethod::Sarima
    }

    fn min_observations(&self) -> usize {
        self.integration_lag() + self.ar_lag() + self.ma_lag() + 3
    }

    fn fit_forecast(&self, series: &[f64], steps: usize) -> Result<MethodForecast> {
        let fit = self.fit(series)?;
        Ok(self.forecast(series, &fit, steps))
    }
}

/// `1 + sign * (c_1 B^lag + c_2 B^{2 lag} + ...)`
fn lag_poly(coeffs: &[f64], lag: usize, sign: f64) -> Vec<f64> {
    let mut poly = vec![0.0; coeffs.len() * lag + 1];
    poly[0] = 1.0;
    for (i, c) in coeffs.iter().enumerate() {
        poly[(i + 1) * lag] = sign * c;
    }
    poly
}

fn poly_mul(a: &[f64], b: &[f64]) -> Vec<f64> {
    let mut out = vec![0.0; a.len() + b.len() - 1];
    for (i, x) in a.iter().enumerate() {
        for (j, y) in b.iter().enumerate() {
            out[i + j] += x * y;
        }
    }
    out
}

/// Conditional residuals: presample values and shocks are zero
fn css_residuals(w: &[f64], ar_poly: &[f64], ma_poly: &[f64]) -> Vec<f64> {
    let start = ar_poly.len() - 1;
    let mut e = vec![0.0; w.len()];
    for t in start..w.len() {
        let mut value = 0.0;
        for (k, a) in ar_poly.iter().enumerate() {
            value += a * w[t - k];
        }
        for (k, m) in ma_poly.iter().enumerate().skip(1) {
            if k <= t {
                value -= m * e[t - k];
            }
        }
        e[t] = value;
    }
    e
}

/// MA(inf) weights of `ar(B) y = ma(B) e`
fn psi_weights(ar: &[f64], ma: &[f64], count: usize) -> Vec<f64> {
    let mut psi = vec![0.0; count.max(1)];
    psi[0] = 1.0;
    for j in 1..count {
        let mut value = ma.get(j).copied().unwrap_or(0.0);
        for k in 1..=j.min(ar.len() - 1) {
            value -= ar[k] * psi[j - k];
        }
        psi[j] = value;
    }
    psi
}
