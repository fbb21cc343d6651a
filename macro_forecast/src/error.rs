//! Error types for the macro_forecast crate

use polars::prelude::PolarsError;
use thiserror::Error;
use ts_math::MathError;

/// Errors raised by the analysis engine
#[derive(Debug, Error)]
pub enum ForecastError {
    /// Malformed or out-of-range input data or arguments
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// A series on which a statistic is undefined (e.g. zero variance)
    #[error("Series '{series}' cannot be tested: {reason}")]
    NonComputableSeries { series: String, reason: String },

    /// Estimation did not converge
    #[error("{model} did not converge: {reason}")]
    NonConvergence { model: String, reason: String },

    /// A forecast was requested before the model was fitted
    #[error("Model not fitted: {0}")]
    NotFitted(String),

    /// Forecast input does not have the shape the model was fitted on
    #[error("Dimension mismatch: expected {expected}, found {found}")]
    DimensionMismatch { expected: String, found: String },

    /// Error from numerical routines
    #[error("Math error: {0}")]
    Math(#[from] MathError),

    /// Error from IO operations
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    /// Error writing tabular output
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Error from Polars operations
    #[error("Polars error: {0}")]
    PolarsError(String),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Result type with our custom error
pub type Result<T> = std::result::Result<T, ForecastError>;

impl From<PolarsError> for ForecastError {
    fn from(err: PolarsError) -> Self {
        ForecastError::PolarsError(err.to_string())
    }
}

impl From<serde_json::Error> for ForecastError {
    fn from(err: serde_json::Error) -> Self {
        ForecastError::Config(err.to_string())
    }
}
