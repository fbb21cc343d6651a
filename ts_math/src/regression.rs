//! Ordinary least squares
//!
//! Single-equation and multi-equation OLS solved through the Cholesky
//! factorisation of the normal equations.

use crate::{MathError, Result};
use nalgebra::{Cholesky, DMatrix, DVector, Dyn};
use std::f64::consts::PI;

/// Relative pivot size below which the design matrix is treated as rank deficient
const RANK_TOLERANCE: f64 = 1e-12;

/// Result of a single-equation least-squares fit
#[derive(Debug, Clone)]
pub struct OlsFit {
    /// Estimated coefficients, one per regressor column
    pub coefficients: DVector<f64>,
    /// In-sample residuals
    pub residuals: DVector<f64>,
    /// Sum of squared residuals
    pub ssr: f64,
    /// Number of observations
    pub nobs: usize,
    xtx_inv: DMatrix<f64>,
}

impl OlsFit {
    /// Number of estimated coefficients
    pub fn n_params(&self) -> usize {
        self.coefficients.len()
    }

    /// Residual degrees of freedom
    pub fn df_resid(&self) -> usize {
        self.nobs - self.n_params()
    }

    /// Unbiased residual variance
    pub fn sigma2(&self) -> f64 {
        self.ssr / self.df_resid() as f64
    }

    /// Standard errors of the coefficients
    pub fn std_errors(&self) -> DVector<f64> {
        let s2 = self.sigma2();
        DVector::from_iterator(
            self.n_params(),
            self.xtx_inv.diagonal().iter().map(|v| (s2 * v).sqrt()),
        )
    }

    /// t statistic of coefficient `index`
    pub fn t_value(&self, index: usize) -> f64 {
        self.coefficients[index] / (self.sigma2() * self.xtx_inv[(index, index)]).sqrt()
    }

    /// Gaussian log-likelihood evaluated at the MLE of the error variance
    pub fn log_likelihood(&self) -> f64 {
        let n = self.nobs as f64;
        -0.5 * n * ((2.0 * PI * self.ssr / n).ln() + 1.0)
    }

    /// Akaike information criterion counting every coefficient as a parameter
    pub fn aic(&self) -> f64 {
        -2.0 * self.log_likelihood() + 2.0 * self.n_params() as f64
    }
}

/// Result of a multi-equation least-squares fit sharing one design matrix
#[derive(Debug, Clone)]
pub struct MultiOlsFit {
    /// Coefficients, regressors in rows and equations in columns
    pub coefficients: DMatrix<f64>,
    /// Residuals, observations in rows and equations in columns
    pub residuals: DMatrix<f64>,
    /// Number of observations
    pub nobs: usize,
}

fn factorize(x: &DMatrix<f64>) -> Result<Cholesky<f64, Dyn>> {
    let xtx = x.tr_mul(x);
    let scale = xtx
        .diagonal()
        .iter()
        .fold(0.0_f64, |acc, v| acc.max(v.abs()));
    if scale == 0.0 || !scale.is_finite() {
        return Err(MathError::SingularMatrix(
            "design matrix has no non-zero column".to_string(),
        ));
    }

    let chol = xtx.cholesky().ok_or_else(|| {
        MathError::SingularMatrix("normal equations are not positive definite".to_string())
    })?;

    let min_pivot = chol
        .l()
        .diagonal()
        .iter()
        .fold(f64::INFINITY, |acc, v| acc.min(v * v));
    if min_pivot <= RANK_TOLERANCE * scale {
        return Err(MathError::SingularMatrix(format!(
            "design matrix is rank deficient (relative pivot {:.3e})",
            min_pivot / scale
        )));
    }

    Ok(chol)
}

/// Fit `y = X b + e` by ordinary least squares
pub fn ols(x: &DMatrix<f64>, y: &DVector<f64>) -> Result<OlsFit> {
    if x.nrows() != y.len() {
        return Err(MathError::InvalidInput(format!(
            "design has {} rows but response has {}",
            x.nrows(),
            y.len()
        )));
    }
    if x.nrows() <= x.ncols() {
        return Err(MathError::InsufficientData(format!(
            "{} observations cannot identify {} coefficients",
            x.nrows(),
            x.ncols()
        )));
    }

    let chol = factorize(x)?;
    let coefficients = chol.solve(&x.tr_mul(y));
    let residuals = y - x * &coefficients;
    let ssr = residuals.norm_squared();

    Ok(OlsFit {
        coefficients,
        residuals,
        ssr,
        nobs: x.nrows(),
        xtx_inv: chol.inverse(),
    })
}

/// Fit every column of `y` on the same regressors `x`
pub fn ols_multi(x: &DMatrix<f64>, y: &DMatrix<f64>) -> Result<MultiOlsFit> {
    if x.nrows() != y.nrows() {
        return Err(MathError::InvalidInput(format!(
            "design has {} rows but response has {}",
            x.nrows(),
            y.nrows()
        )));
    }
    if x.nrows() <= x.ncols() {
        return Err(MathError::InsufficientData(format!(
            "{} observations cannot identify {} coefficients per equation",
            x.nrows(),
            x.ncols()
        )));
    }

    let chol = factorize(x)?;
    let coefficients = chol.solve(&x.tr_mul(y));
    let residuals = y - x * &coefficients;

    Ok(MultiOlsFit {
        coefficients,
        residuals,
        nobs: x.nrows(),
    })
}
