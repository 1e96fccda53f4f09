//! Error types for Outlay

use thiserror::Error;

#[derive(Error, Debug)]
pub enum Error {
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Config error: {0}")]
    Config(String),

    #[error("Invalid data: {0}")]
    InvalidData(String),

    #[error("Insufficient data for {category}: need {required} months, have {actual}")]
    InsufficientData {
        category: String,
        required: usize,
        actual: usize,
    },

    #[error("{method} fit failed for {category}: {reason}")]
    Fit {
        method: String,
        category: String,
        reason: String,
    },

    #[error("{category} has {available} forecast months, {requested} requested")]
    HorizonExceeded {
        category: String,
        requested: usize,
        available: usize,
    },

    #[error("Unknown category '{category}'")]
    UnknownCategory {
        category: String,
        valid: Vec<String>,
    },
}

impl From<toml::de::Error> for Error {
    fn from(err: toml::de::Error) -> Self {
        Error::Config(err.to_string())
    }
}

impl Error {
    /// Attach a category to a fit error raised by a model that doesn't know it
    pub fn for_category(self, category: &str) -> Self {
        match self {
            Error::Fit { method, reason, .. } => Error::Fit {
                method,
                category: category.to_string(),
                reason,
            },
            Error::InsufficientData {
                required, actual, ..
            } => Error::InsufficientData {
                category: category.to_string(),
                required,
                actual,
            },
            other => other,
        }
    }
}

pub type Result<T> = std::result::Result<T, Error>;
