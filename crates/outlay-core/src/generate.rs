//! Synthetic monthly expense generator
//!
//! Each category follows `base * (1 + trend * t) * seasonality[month] * exp(eps)`
//! with `eps ~ N(0, noise)`. Noise is drawn category by category from one
//! seeded RNG, so a seed fully determines the output.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use rand::rngs::StdRng;
use rand::SeedableRng;
use rand_distr::{Distribution, Normal};
use tracing::debug;

use crate::config::{CategorySpec, GeneratorConfig};
use crate::error::{Error, Result};
use crate::models::{month_range, MonthlyObservation, ALL_CATEGORY};

/// Builds the synthetic history table
pub struct ExpenseGenerator<'a> {
    config: &'a GeneratorConfig,
}

impl<'a> ExpenseGenerator<'a> {
    pub fn new(config: &'a GeneratorConfig) -> Self {
        Self { config }
    }

    /// Months covered by the history window
    pub fn months(&self) -> Vec<NaiveDate> {
        month_range(self.config.start, self.config.end)
    }

    /// Generate every category plus the ALL aggregate, sorted by (category, month)
    pub fn generate(&self) -> Result<Vec<MonthlyObservation>> {
        let months = self.months();
        let mut rng = StdRng::seed_from_u64(self.config.seed);

        let mut rows = Vec::with_capacity(months.len() * (self.config.categories.len() + 1));
        for spec in &self.config.categories {
            let values = self.make_series(spec, &months, &mut rng)?;
            debug!(category = %spec.name, months = values.len(), "Generated series");
            rows.extend(
                months
                    .iter()
                    .zip(values)
                    .map(|(month, amount)| MonthlyObservation {
                        month: *month,
                        category: spec.name.clone(),
                        amount,
                    }),
            );
        }

        let totals = monthly_totals(&rows);
        rows.extend(totals);

        rows.sort_by(|a, b| a.category.cmp(&b.category).then(a.month.cmp(&b.month)));
        Ok(rows)
    }

    fn make_series(
        &self,
        spec: &CategorySpec,
        months: &[NaiveDate],
        rng: &mut StdRng,
    ) -> Result<Vec<f64>> {
        let noise = Normal::new(0.0, spec.noise).map_err(|e| {
            Error::InvalidData(format!("Bad noise scale for {}: {}", spec.name, e))
        })?;

        Ok(months
            .iter()
            .enumerate()
            .map(|(t, month)| {
                let seasonal = self.config.seasonality[month.month0() as usize];
                let raw = spec.base * (1.0 + spec.trend * t as f64) * seasonal;
                let eps: f64 = noise.sample(rng);
                (raw * eps.exp()).max(0.0)
            })
            .collect())
    }
}

/// ALL rows: the per-month sum over every category present
pub fn monthly_totals(rows: &[MonthlyObservation]) -> Vec<MonthlyObservation> {
    let mut totals: BTreeMap<NaiveDate, f64> = BTreeMap::new();
    for row in rows.iter().filter(|r| r.category != ALL_CATEGORY) {
        *totals.entry(row.month).or_insert(0.0) += row.amount;
    }
    totals
        .into_iter()
        .map(|(month, amount)| MonthlyObservation {
            month,
            category: ALL_CATEGORY.to_string(),
            amount,
        })
        .collect()
}
