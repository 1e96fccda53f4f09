//! Outlay CLI - Monthly expense forecaster
//!
//! Usage:
//!   outlay generate              Write the synthetic history table
//!   outlay train                 Fit all categories and write forecasts
//!   outlay backtest --holdout 6  Score methods on recent months
//!   outlay forecast -c Travel    Print a category forecast
//!   outlay serve --port 8000     Start the query server

mod cli;
mod commands;

#[cfg(test)]
mod tests;

use anyhow::Result;
use clap::Parser;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use cli::*;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Set up logging
    // Priority: RUST_LOG env var > --verbose flag > default (info)
    let filter = if std::env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_target(false).compact())
        .init();

    let config = commands::load_config(cli.config.as_deref())?;

    match cli.command {
        Commands::Generate { seed, out } => {
            commands::cmd_generate(&config, seed, out.as_deref()).map(|_| ())
        }
        Commands::Train {
            history,
            out,
            horizon,
        } => commands::cmd_train(&config, history.as_deref(), out.as_deref(), horizon).map(|_| ()),
        Commands::Backtest {
            holdout,
            history,
            json,
        } => commands::cmd_backtest(&config, holdout, history.as_deref(), json).map(|_| ()),
        Commands::Forecast {
            category,
            months,
            forecasts,
        } => commands::cmd_forecast(&config, &category, months, forecasts.as_deref()).map(|_| ()),
        Commands::Serve {
            port,
            host,
            allow_origins,
        } => commands::cmd_serve(config, &host, port, allow_origins).await,
    }
}
