//! CLI argument definitions using clap
//!
//! This module contains all the clap structs and enums for parsing CLI arguments.
//! The actual command implementations are in the `commands` module.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// Outlay - Forecast monthly expenses per category
#[derive(Parser)]
#[command(name = "outlay")]
#[command(about = "Synthetic expense data, per-category forecasts and a query API", long_about = None)]
#[command(version)]
pub struct Cli {
    /// Config override file (defaults to <data dir>/outlay/config.toml if present)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Generate the synthetic monthly history table
    Generate {
        /// RNG seed (overrides config)
        #[arg(long)]
        seed: Option<u64>,

        /// Output CSV (defaults to paths.history)
        #[arg(short, long)]
        out: Option<PathBuf>,
    },

    /// Fit every category and write the forecast table
    Train {
        /// History CSV (defaults to paths.history)
        #[arg(long)]
        history: Option<PathBuf>,

        /// Output CSV (defaults to paths.forecasts)
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Months to forecast (1-12, overrides config)
        #[arg(long)]
        horizon: Option<usize>,
    },

    /// Score each method on a holdout of the most recent months
    Backtest {
        /// Months held out per category
        #[arg(long, default_value = "6")]
        holdout: usize,

        /// History CSV (defaults to paths.history)
        #[arg(long)]
        history: Option<PathBuf>,

        /// Print the report as JSON
        #[arg(long)]
        json: bool,
    },

    /// Print forecast rows for one category
    Forecast {
        /// Category name, or ALL
        #[arg(short, long, default_value = "Payroll")]
        category: String,

        /// Number of months (1-12)
        #[arg(short, long, default_value = "3")]
        months: usize,

        /// Forecast CSV (defaults to paths.forecasts)
        #[arg(long)]
        forecasts: Option<PathBuf>,
    },

    /// Start the query server
    Serve {
        /// Port to listen on
        #[arg(short, long, default_value = "8000")]
        port: u16,

        /// Host to bind to
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// Allowed CORS origin (repeatable)
        #[arg(long = "allow-origin")]
        allow_origins: Vec<String>,
    },
}
