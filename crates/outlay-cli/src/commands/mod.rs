//! CLI command implementations
//!
//! Commands are organized by domain:
//! - `core` - Shared utilities (config loading)
//! - `generate` - Synthetic history generation
//! - `train` - Batch forecast and holdout backtest
//! - `forecast` - Forecast table queries
//! - `serve` - Web server command

pub mod core;
pub mod forecast;
pub mod generate;
pub mod serve;
pub mod train;

// Re-export command functions for main.rs
pub use core::*;
pub use forecast::*;
pub use generate::*;
pub use serve::*;
pub use train::*;

/// Format an amount with thousands separators and two decimals
pub fn format_amount(amount: f64) -> String {
    let negative = amount < 0.0;
    let cents = (amount.abs() * 100.0).round() as u64;
    let whole = (cents / 100).to_string();
    let mut grouped = String::with_capacity(whole.len() + whole.len() / 3);
    for (i, c) in whole.chars().enumerate() {
        if i > 0 && (whole.len() - i) % 3 == 0 {
            grouped.push(',');
        }
        grouped.push(c);
    }
    format!("{}{}.{:02}", if negative { "-" } else { "" }, grouped, cents % 100)
}
