//! Vector autoregression on the full return system
//!
//! The target column's return forecasts are cumulated onto the log of the
//! last observed price. The interval either treats the per-step forecast
//! errors as independent ([`IntervalMethod::IndependentSteps`], the default)
//! or propagates the exact covariance of their sum
//! ([`IntervalMethod::FullCovariance`]).

use crate::data::TimeSeriesTable;
use crate::error::{ForecastError, Result};
use crate::models::{FittedModel, ForecastResult};
use chrono::NaiveDate;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};
use std::f64::consts::PI;
use tracing::{debug, info};
use ts_math::regression::ols_multi;
use ts_math::{InformationCriterion, MathError};

/// How per-step forecast variances are combined into a cumulative interval
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum IntervalMethod {
    /// Running sum of the target's own `h`-step MSE diagonal entries
    #[default]
    IndependentSteps,
    /// Variance of the summed forecast errors including cross-step covariance
    FullCovariance,
}

/// Information-criterion scores per candidate lag
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LagSelection {
    pub lag: usize,
    pub criterion: InformationCriterion,
    /// `(lag, score)` for every lag that could be estimated
    pub scores: Vec<(usize, f64)>,
}

/// Least-squares VAR(p) estimates
#[derive(Debug, Clone)]
pub struct FittedVar {
    columns: Vec<String>,
    lag: usize,
    intercept: DVector<f64>,
    /// `A_1..A_p`, equations in rows
    coefficients: Vec<DMatrix<f64>>,
    /// Residual covariance with the `T - kp - 1` correction
    sigma_u: DMatrix<f64>,
    log_det_sigma_mle: f64,
    nobs: usize,
    last_date: Option<NaiveDate>,
}

/// Multivariate forecaster of a target column's price
#[derive(Debug, Clone)]
pub struct VarForecaster {
    target: String,
    interval_method: IntervalMethod,
    fitted: Option<FittedVar>,
}

struct LaggedSystem {
    x: DMatrix<f64>,
    y: DMatrix<f64>,
}

/// Regress rows `start..n` on an intercept and `lag` lags of every column
fn lagged_system(table: &TimeSeriesTable, lag: usize, start: usize) -> LaggedSystem {
    let k = table.n_columns();
    let nobs = table.len() - start;
    let x = DMatrix::from_fn(nobs, 1 + k * lag, |row, col| {
        if col == 0 {
            return 1.0;
        }
        let i = (col - 1) / k + 1;
        let var = (col - 1) % k;
        table.column_at(var)[start + row - i]
    });
    let y = DMatrix::from_fn(nobs, k, |row, var| table.column_at(var)[start + row]);
    LaggedSystem { x, y }
}

fn log_det(matrix: &DMatrix<f64>) -> Result<f64> {
    let chol = matrix.clone().cholesky().ok_or_else(|| {
        MathError::SingularMatrix("residual covariance is not positive definite".to_string())
    })?;
    Ok(2.0 * chol.l().diagonal().iter().map(|v| v.ln()).sum::<f64>())
}

impl VarForecaster {
    /// Forecaster for the column named `target`
    pub fn new(target: impl Into<String>) -> Self {
        Self {
            target: target.into(),
            interval_method: IntervalMethod::default(),
            fitted: None,
        }
    }

    pub fn with_interval_method(mut self, method: IntervalMethod) -> Self {
        self.interval_method = method;
        self
    }

    pub fn target(&self) -> &str {
        &self.target
    }

    pub fn fitted(&self) -> Option<&FittedVar> {
        self.fitted.as_ref()
    }

    pub fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    pub fn into_fitted(self) -> Option<FittedVar> {
        self.fitted
    }

    /// Pick the lag in `1..=max_lag` minimising `criterion`
    ///
    /// All candidates are estimated on the same sample, which holds out the
    /// first `max_lag` rows.
    pub fn select_lag(
        &self,
        returns: &TimeSeriesTable,
        max_lag: usize,
        criterion: InformationCriterion,
    ) -> Result<LagSelection> {
        if max_lag == 0 {
            return Err(ForecastError::InvalidInput(
                "max_lag must be at least 1".to_string(),
            ));
        }
        if returns.len() < max_lag + 1 {
            return Err(ForecastError::InvalidInput(format!(
                "{} rows cannot support lag selection up to {}",
                returns.len(),
                max_lag
            )));
        }

        let k = returns.n_columns();
        let mut scores = Vec::with_capacity(max_lag);
        for lag in 1..=max_lag {
            let system = lagged_system(returns, lag, max_lag);
            let nobs = system.y.nrows();
            let score = ols_multi(&system.x, &system.y)
                .map_err(ForecastError::from)
                .and_then(|fit| {
                    let sigma_mle = fit.residuals.tr_mul(&fit.residuals) / nobs as f64;
                    log_det(&sigma_mle)
                })
                .map(|ld| criterion.from_log_det(ld, lag * k * k + k, nobs));
            match score {
                Ok(score) if score.is_finite() => scores.push((lag, score)),
                Ok(_) => debug!(lag, "VAR lag has a non-finite score"),
                Err(e) => debug!(lag, error = %e, "VAR lag could not be estimated"),
            }
        }

        let (lag, _) = scores
            .iter()
            .copied()
            .min_by(|a, b| a.1.total_cmp(&b.1))
            .ok_or_else(|| {
                ForecastError::InvalidInput(format!(
                    "no VAR lag in 1..={} could be estimated from {} rows",
                    max_lag,
                    returns.len()
                ))
            })?;

        info!(lag, %criterion, "selected VAR lag");
        Ok(LagSelection {
            lag,
            criterion,
            scores,
        })
    }

    /// Estimate a VAR(`lag`) with an intercept by multivariate least squares
    pub fn fit(&mut self, returns: &TimeSeriesTable, lag: usize) -> Result<&FittedVar> {
        if lag == 0 {
            return Err(ForecastError::InvalidInput(
                "VAR lag must be at least 1".to_string(),
            ));
        }
        returns.require_column(&self.target)?;
        let k = returns.n_columns();
        let needed = lag + k * lag + 2;
        if returns.len() < needed {
            return Err(ForecastError::InvalidInput(format!(
                "VAR({}) on {} series needs at least {} rows, got {}",
                lag,
                k,
                needed,
                returns.len()
            )));
        }

        let system = lagged_system(returns, lag, lag);
        let nobs = system.y.nrows();
        let fit = ols_multi(&system.x, &system.y)?;

        let intercept = fit.coefficients.row(0).transpose();
        let coefficients = (0..lag)
            .map(|i| {
                fit.coefficients
                    .rows(1 + i * k, k)
                    .transpose()
            })
            .collect();
        let cross = fit.residuals.tr_mul(&fit.residuals);
        let sigma_u = &cross / (nobs - k * lag - 1) as f64;
        let log_det_sigma_mle = log_det(&(&cross / nobs as f64))?;

        let fitted = FittedVar {
            columns: returns.columns().to_vec(),
            lag,
            intercept,
            coefficients,
            sigma_u,
            log_det_sigma_mle,
            nobs,
            last_date: returns.last_date(),
        };
        info!(
            lag,
            nobs,
            aic = fitted.aic(),
            "fitted VAR"
        );
        Ok(self.fitted.insert(fitted))
    }

    /// Price forecast of the target for `steps` days after the last row of `returns`
    ///
    /// `returns` must have the columns the model was fitted on, in the same order.
    pub fn forecast(
        &self,
        returns: &TimeSeriesTable,
        last_observed_price: f64,
        steps: usize,
        alpha: f64,
    ) -> Result<ForecastResult> {
        let fitted = self
            .fitted
            .as_ref()
            .ok_or_else(|| ForecastError::NotFitted("VAR model has not been fitted".to_string()))?;

        if returns.columns() != fitted.columns.as_slice() {
            return Err(ForecastError::DimensionMismatch {
                expected: fitted.columns.join(","),
                found: returns.columns().join(","),
            });
        }
        if steps == 0 {
            return Err(ForecastError::InvalidInput(
                "forecast steps must be at least 1".to_string(),
            ));
        }
        if !(last_observed_price > 0.0 && last_observed_price.is_finite()) {
            return Err(ForecastError::InvalidInput(format!(
                "last observed price must be positive, got {}",
                last_observed_price
            )));
        }
        if returns.len() < fitted.lag {
            return Err(ForecastError::InvalidInput(format!(
                "VAR({}) forecast needs {} seed rows, got {}",
                fitted.lag,
                fitted.lag,
                returns.len()
            )));
        }
        let last_date = returns.last_date().ok_or_else(|| {
            ForecastError::InvalidInput("return table is empty".to_string())
        })?;
        let target = returns.column_index(&self.target).ok_or_else(|| {
            ForecastError::InvalidInput(format!("target column '{}' not found", self.target))
        })?;

        let seed: Vec<DVector<f64>> = (returns.len() - fitted.lag..returns.len())
            .map(|t| DVector::from_vec(returns.row(t)))
            .collect();
        let path = fitted.point_forecast(&seed, steps);

        let mut log_mean = Vec::with_capacity(steps);
        let mut level = last_observed_price.ln();
        for step in &path {
            level += step[target];
            log_mean.push(level);
        }

        let std_errors = fitted.cumulative_std_errors(target, steps, self.interval_method);
        ForecastResult::from_log_space(fitted.label(), last_date, &log_mean, &std_errors, alpha)
    }
}

impl FittedVar {
    pub fn columns(&self) -> &[String] {
        &self.columns
    }

    pub fn lag(&self) -> usize {
        self.lag
    }

    pub fn intercept(&self) -> &DVector<f64> {
        &self.intercept
    }

    /// Lag coefficient matrices `A_1..A_p`
    pub fn coefficient_matrices(&self) -> &[DMatrix<f64>] {
        &self.coefficients
    }

    /// Residual covariance `Σ_u`
    pub fn sigma_u(&self) -> &DMatrix<f64> {
        &self.sigma_u
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.last_date
    }

    pub fn information_criterion(&self, criterion: InformationCriterion) -> f64 {
        let k = self.columns.len();
        criterion.from_log_det(
            self.log_det_sigma_mle,
            self.lag * k * k + k,
            self.nobs,
        )
    }

    pub fn bic(&self) -> f64 {
        self.information_criterion(InformationCriterion::Bic)
    }

    pub fn hqic(&self) -> f64 {
        self.information_criterion(InformationCriterion::Hqic)
    }

    /// Gaussian log-likelihood at the MLE residual covariance
    pub fn log_likelihood(&self) -> f64 {
        let k = self.columns.len() as f64;
        let t = self.nobs as f64;
        -0.5 * t * (k * (2.0 * PI).ln() + self.log_det_sigma_mle + k)
    }

    /// Recursive point forecasts from the last `lag` observations, oldest first
    pub fn point_forecast(&self, seed: &[DVector<f64>], steps: usize) -> Vec<DVector<f64>> {
        let mut history: Vec<DVector<f64>> = seed.to_vec();
        let mut out = Vec::with_capacity(steps);
        for _ in 0..steps {
            let mut next = self.intercept.clone();
            for (i, a) in self.coefficients.iter().enumerate() {
                next += a * &history[history.len() - 1 - i];
            }
            history.push(next.clone());
            out.push(next);
        }
        out
    }

    /// MA(∞) matrices `Φ_0 = I, Φ_1, ..., Φ_{n-1}`
    pub fn ma_matrices(&self, n: usize) -> Vec<DMatrix<f64>> {
        let k = self.columns.len();
        let mut phi: Vec<DMatrix<f64>> = Vec::with_capacity(n);
        for i in 0..n {
            if i == 0 {
                phi.push(DMatrix::identity(k, k));
                continue;
            }
            let mut next = DMatrix::zeros(k, k);
            for j in 1..=i.min(self.lag) {
                next += &phi[i - j] * &self.coefficients[j - 1];
            }
            phi.push(next);
        }
        phi
    }

    /// Forecast MSE matrices `Σ(h) = Σ_{i<h} Φ_i Σ_u Φ_iᵀ` for `h = 1..=steps`
    pub fn forecast_mse(&self, steps: usize) -> Vec<DMatrix<f64>> {
        let mut running = DMatrix::zeros(self.columns.len(), self.columns.len());
        self.ma_matrices(steps)
            .iter()
            .map(|phi| {
                running += phi * &self.sigma_u * phi.transpose();
                running.clone()
            })
            .collect()
    }

    /// Standard errors of the cumulative log-return of column `target`
    pub fn cumulative_std_errors(
        &self,
        target: usize,
        steps: usize,
        method: IntervalMethod,
    ) -> Vec<f64> {
        let mut cumulative = 0.0;
        match method {
            IntervalMethod::IndependentSteps => self
                .forecast_mse(steps)
                .iter()
                .map(|mse| {
                    cumulative += mse[(target, target)];
                    cumulative.sqrt()
                })
                .collect(),
            IntervalMethod::FullCovariance => {
                let k = self.columns.len();
                let mut summed_phi = DMatrix::zeros(k, k);
                self.ma_matrices(steps)
                    .iter()
                    .map(|phi| {
                        summed_phi += phi;
                        let c = summed_phi.row(target);
                        cumulative += (&c * &self.sigma_u * c.transpose())[(0, 0)];
                        cumulative.sqrt()
                    })
                    .collect()
            }
        }
    }
}

impl FittedModel for FittedVar {
    fn label(&self) -> String {
        format!("VAR({})", self.lag)
    }

    fn nobs(&self) -> usize {
        self.nobs
    }

    fn aic(&self) -> f64 {
        self.information_criterion(InformationCriterion::Aic)
    }

    fn summary(&self) -> String {
        let mut out = format!(
            "{} on {} series ({}), {} observations\n",
            self.label(),
            self.columns.len(),
            self.columns.join(", "),
            self.nobs
        );
        out.push_str(&format!(
            "log-likelihood {:.3}  AIC {:.4}  BIC {:.4}  HQIC {:.4}\n",
            self.log_likelihood(),
            self.aic(),
            self.bic(),
            self.hqic()
        ));
        for (eq, name) in self.columns.iter().enumerate() {
            out.push_str(&format!("  {}: const {:.6}", name, self.intercept[eq]));
            for (i, a) in self.coefficients.iter().enumerate() {
                for (var, other) in self.columns.iter().enumerate() {
                    out.push_str(&format!("  L{}.{} {:.4}", i + 1, other, a[(eq, var)]));
                }
            }
            out.push('\n');
        }
        out
    }
}
