//! Error types for the optimiser

use crate::validation::ValidationError;
use thiserror::Error;

/// Optimiser errors
#[derive(Error, Debug)]
pub enum Error {
    #[error("Invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("No feasible allocation exists under the given constraints")]
    Infeasible,

    #[error("Solver did not converge: {status}")]
    DidNotConverge { status: String },

    #[error("Numerical error: {0}")]
    Numerical(String),

    #[error("Insufficient price history for {asset}")]
    DataGap { asset: String },

    #[error("Data format error in {source_name}: {message}")]
    DataFormat { source_name: String, message: String },

    #[error("Configuration error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl Error {
    pub fn data_format(source_name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DataFormat {
            source_name: source_name.into(),
            message: message.into(),
        }
    }

    /// Whether re-running with a relaxed risk budget or a regularised
    /// covariance might succeed.
    pub fn is_numerical(&self) -> bool {
        matches!(self, Self::DidNotConverge { .. } | Self::Numerical(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
