//! In-memory snapshots of the history and forecast tables
//!
//! Readers clone the current `Arc` and keep a complete table for as long as
//! they need it. A retrain builds a new table off to the side and swaps it in
//! with [`Snapshot::replace`].

use std::path::Path;
use std::sync::{Arc, RwLock};

use crate::config::MAX_HORIZON;
use crate::error::{Error, Result};
use crate::models::{ForecastRow, MonthlyObservation};
use crate::tables;

/// Latest forecast rows with their categories in table order
#[derive(Debug, Clone, Default)]
pub struct ForecastTable {
    rows: Vec<ForecastRow>,
    categories: Vec<String>,
}

impl ForecastTable {
    pub fn new(rows: Vec<ForecastRow>) -> Self {
        let mut categories: Vec<String> = Vec::new();
        for row in &rows {
            if !categories.contains(&row.category) {
                categories.push(row.category.clone());
            }
        }
        Self { rows, categories }
    }

    /// Load a forecast CSV, or an empty table if the file doesn't exist yet
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Ok(Self::new(tables::read_forecasts(path)?))
    }

    pub fn rows(&self) -> &[ForecastRow] {
        &self.rows
    }

    /// Categories in order of first appearance, ALL included
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    /// First `months` forecast rows for `category`, earliest first
    ///
    /// Asking past the horizon the table was trained on is an error, so a
    /// successful call always returns exactly `months` rows.
    pub fn for_category(&self, category: &str, months: usize) -> Result<Vec<ForecastRow>> {
        if months == 0 || months > MAX_HORIZON {
            return Err(Error::InvalidData(format!(
                "months must be between 1 and {}, got {}",
                MAX_HORIZON, months
            )));
        }
        if !self.categories.iter().any(|c| c == category) {
            return Err(Error::UnknownCategory {
                category: category.to_string(),
                valid: self.categories.clone(),
            });
        }

        let mut rows: Vec<ForecastRow> = self
            .rows
            .iter()
            .filter(|r| r.category == category)
            .cloned()
            .collect();
        if rows.len() < months {
            return Err(Error::HorizonExceeded {
                category: category.to_string(),
                requested: months,
                available: rows.len(),
            });
        }
        rows.sort_by_key(|r| r.month);
        rows.truncate(months);
        Ok(rows)
    }
}

/// Observed history as last read from disk
#[derive(Debug, Clone, Default)]
pub struct HistoryTable {
    rows: Vec<MonthlyObservation>,
}

impl HistoryTable {
    pub fn new(rows: Vec<MonthlyObservation>) -> Self {
        Self { rows }
    }

    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        Ok(Self::new(tables::read_history(path)?))
    }

    pub fn rows(&self) -> &[MonthlyObservation] {
        &self.rows
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// A swappable, shared, immutable value
#[derive(Debug, Default)]
pub struct Snapshot<T> {
    current: RwLock<Arc<T>>,
}

impl<T> Snapshot<T> {
    pub fn new(value: T) -> Self {
        Self {
            current: RwLock::new(Arc::new(value)),
        }
    }

    /// The current value; stays valid after later swaps
    pub fn snapshot(&self) -> Arc<T> {
        // The lock only guards an Arc swap, so a poisoned lock still holds a whole value
        let guard = self.current.read().unwrap_or_else(|e| e.into_inner());
        Arc::clone(&*guard)
    }

    /// Install `value` and return the one it replaced
    pub fn replace(&self, value: T) -> Arc<T> {
        let mut guard = self.current.write().unwrap_or_else(|e| e.into_inner());
        std::mem::replace(&mut *guard, Arc::new(value))
    }
}

pub type ForecastStore = Snapshot<ForecastTable>;
pub type HistoryStore = Snapshot<HistoryTable>;

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn row(category: &str, month: u32, amount: f64) -> ForecastRow {
        ForecastRow {
            month: NaiveDate::from_ymd_opt(2025, month, 1).unwrap(),
            category: category.to_string(),
            forecast_amount: amount,
            lower_ci: amount - 1.0,
            upper_ci: amount + 1.0,
        }
    }

    fn table() -> ForecastTable {
        ForecastTable::new(vec![
            row("ALL", 9, 300.0),
            row("ALL", 10, 310.0),
            row("Payroll", 10, 210.0),
            row("Payroll", 9, 200.0),
            row("Payroll", 11, 220.0),
            row("Cloud", 9, 100.0),
        ])
    }

    #[test]
    fn test_categories_in_table_order() {
        assert_eq!(table().categories(), &["ALL", "Payroll", "Cloud"]);
    }

    #[test]
    fn test_for_category_sorted_and_truncated() {
        let rows = table().for_category("Payroll", 2).unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[0].forecast_amount, 200.0);
        assert_eq!(rows[1].forecast_amount, 210.0);
    }

    #[test]
    fn test_unknown_category_lists_valid() {
        match table().for_category("Rent", 3) {
            Err(Error::UnknownCategory { category, valid }) => {
                assert_eq!(category, "Rent");
                assert_eq!(valid, vec!["ALL", "Payroll", "Cloud"]);
            }
            other => panic!("expected UnknownCategory, got {:?}", other),
        }
    }

    #[test]
    fn test_months_bounds() {
        let t = table();
        assert!(t.for_category("Payroll", 0).is_err());
        assert!(t.for_category("Payroll", 13).is_err());
        assert_eq!(t.for_category("Payroll", 3).unwrap().len(), 3);
    }

    #[test]
    fn test_months_past_trained_horizon() {
        match table().for_category("Payroll", 4) {
            Err(Error::HorizonExceeded {
                category,
                requested,
                available,
            }) => {
                assert_eq!(category, "Payroll");
                assert_eq!(requested, 4);
                assert_eq!(available, 3);
            }
            other => panic!("expected HorizonExceeded, got {:?}", other),
        }
    }

    #[test]
    fn test_snapshot_survives_replace() {
        let store = ForecastStore::new(table());
        let before = store.snapshot();
        let old = store.replace(ForecastTable::new(vec![row("Travel", 9, 5.0)]));

        assert_eq!(before.categories().len(), 3);
        assert!(Arc::ptr_eq(&before, &old));
        assert_eq!(store.snapshot().categories(), &["Travel"]);
    }

    #[test]
    fn test_load_missing_file_is_empty() {
        let dir = tempfile::TempDir::new().unwrap();
        let table = ForecastTable::load(&dir.path().join("none.csv")).unwrap();
        assert!(table.is_empty());
        assert!(HistoryTable::load(&dir.path().join("none.csv")).unwrap().is_empty());
    }
}
