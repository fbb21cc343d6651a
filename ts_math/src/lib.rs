//! # TS Math
//!
//! Numerical building blocks for time series econometrics.
//! This crate provides least-squares regression, the distributions used for
//! hypothesis tests, information criteria, unit-root statistics, ARMA
//! estimation and a small derivative-free optimiser.

use thiserror::Error;

pub mod arma;
pub mod criteria;
pub mod distributions;
pub mod optimize;
pub mod polynomial;
pub mod regression;
pub mod unit_root;

pub use criteria::InformationCriterion;
pub use regression::{ols, OlsFit};

/// Errors that can occur in numerical routines
#[derive(Error, Debug, Clone, PartialEq)]
pub enum MathError {
    #[error("Insufficient data for calculation: {0}")]
    InsufficientData(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Singular matrix: {0}")]
    SingularMatrix(String),

    #[error("Calculation error: {0}")]
    CalculationError(String),
}

/// Result type for numerical operations
pub type Result<T> = std::result::Result<T, MathError>;

/// Sample mean, `NaN` for an empty slice
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population variance (divides by `n`)
pub fn variance(values: &[f64]) -> f64 {
    let m = mean(values);
    values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mean_and_variance() {
        let data = [1.0, 2.0, 3.0, 4.0];
        assert!((mean(&data) - 2.5).abs() < 1e-12);
        assert!((variance(&data) - 1.25).abs() < 1e-12);
        assert_eq!(variance(&[7.0; 10]), 0.0);
    }
}
