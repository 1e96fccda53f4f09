//! HTTP request handlers organized by domain
//!
//! Each submodule contains handlers for a specific API area.

pub mod forecasts;
pub mod history;
pub mod retrain;

// Re-export all handlers for use in router
pub use forecasts::*;
pub use history::*;
pub use retrain::*;
