//! ARMA(p, q) estimation
//!
//! Two estimators share one parameterisation:
//!
//! * conditional sum of squares (CSS), cheap and used while searching orders;
//! * exact Gaussian maximum likelihood through a Kalman filter on the Harvey
//!   state-space form, used to refit the chosen order.
//!
//! Both optimise over unconstrained reals mapped through
//! [`constrain_stationary`], so every estimate is stationary and invertible.

use crate::optimize::{numerical_hessian, NelderMead};
use crate::polynomial::{constrain_stationary, psi_weights, unconstrain_stationary};
use crate::{InformationCriterion, MathError, Result};
use nalgebra::{DMatrix, DVector};
use std::f64::consts::PI;

/// Orders and deterministic terms of an ARMA model
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArmaSpec {
    /// Autoregressive order
    pub p: usize,
    /// Moving-average order
    pub q: usize,
    /// Whether a mean is estimated (otherwise the series is taken as zero-mean)
    pub include_mean: bool,
}

/// ARMA coefficients in the convention
/// `x_t - mu = sum ar_i (x_{t-i} - mu) + e_t + sum ma_j e_{t-j}`
#[derive(Debug, Clone, PartialEq)]
pub struct ArmaParams {
    pub ar: Vec<f64>,
    pub ma: Vec<f64>,
    pub mean: f64,
}

/// Which objective produced an estimate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EstimationMethod {
    /// Conditional sum of squares
    Css,
    /// Exact Gaussian likelihood
    ExactMle,
}

/// A fitted ARMA model
#[derive(Debug, Clone)]
pub struct ArmaEstimate {
    pub spec: ArmaSpec,
    pub params: ArmaParams,
    /// Innovation variance
    pub sigma2: f64,
    pub log_likelihood: f64,
    /// Observations entering the likelihood
    pub nobs: usize,
    pub method: EstimationMethod,
    /// Whether the optimiser met its tolerances
    pub converged: bool,
    pub evaluations: usize,
    /// Covariance of `[mean?, ar..., ma...]` from the inverse Hessian
    pub covariance: Option<DMatrix<f64>>,
    final_state: DVector<f64>,
}

impl ArmaSpec {
    pub fn new(p: usize, q: usize, include_mean: bool) -> Self {
        Self { p, q, include_mean }
    }

    fn n_coefficients(&self) -> usize {
        usize::from(self.include_mean) + self.p + self.q
    }

    /// Parameters counted by information criteria, including the innovation variance
    pub fn n_params(&self) -> usize {
        self.n_coefficients() + 1
    }

    fn from_unconstrained(&self, raw: &[f64]) -> ArmaParams {
        let offset = usize::from(self.include_mean);
        let mean = if self.include_mean { raw[0] } else { 0.0 };
        let ar = constrain_stationary(&raw[offset..offset + self.p]);
        let ma = constrain_stationary(&raw[offset + self.p..])
            .into_iter()
            .map(|c| -c)
            .collect();
        ArmaParams { ar, ma, mean }
    }

    fn to_unconstrained(&self, params: &ArmaParams) -> Result<Vec<f64>> {
        let mut raw = Vec::with_capacity(self.n_coefficients());
        if self.include_mean {
            raw.push(params.mean);
        }
        raw.extend(unconstrain_stationary(&params.ar)?);
        let neg_ma: Vec<f64> = params.ma.iter().map(|c| -c).collect();
        raw.extend(unconstrain_stationary(&neg_ma)?);
        Ok(raw)
    }

    fn from_constrained(&self, raw: &[f64]) -> ArmaParams {
        let offset = usize::from(self.include_mean);
        ArmaParams {
            mean: if self.include_mean { raw[0] } else { 0.0 },
            ar: raw[offset..offset + self.p].to_vec(),
            ma: raw[offset + self.p..].to_vec(),
        }
    }

    fn check_length(&self, n: usize) -> Result<()> {
        let needed = self.p + self.q + self.n_params() + 1;
        if n < needed {
            return Err(MathError::InsufficientData(format!(
                "ARMA({},{}) needs at least {} observations, got {}",
                self.p, self.q, needed, n
            )));
        }
        Ok(())
    }
}

impl ArmaParams {
    fn to_vec(&self, spec: &ArmaSpec) -> Vec<f64> {
        let mut out = Vec::with_capacity(spec.n_coefficients());
        if spec.include_mean {
            out.push(self.mean);
        }
        out.extend_from_slice(&self.ar);
        out.extend_from_slice(&self.ma);
        out
    }
}

/// Harvey state-space form of an ARMA process
struct StateSpace {
    transition: DMatrix<f64>,
    selection_outer: DMatrix<f64>,
}

impl StateSpace {
    fn new(ar: &[f64], ma: &[f64]) -> Self {
        let r = ar.len().max(ma.len() + 1);
        let mut transition = DMatrix::zeros(r, r);
        for (i, phi) in ar.iter().enumerate() {
            transition[(i, 0)] = *phi;
        }
        for i in 0..r - 1 {
            transition[(i, i + 1)] = 1.0;
        }
        let mut selection = DVector::zeros(r);
        selection[0] = 1.0;
        for (j, theta) in ma.iter().enumerate() {
            selection[j + 1] = *theta;
        }
        let selection_outer = &selection * selection.transpose();
        Self {
            transition,
            selection_outer,
        }
    }

    fn dim(&self) -> usize {
        self.transition.nrows()
    }

    /// Solve `P = T P T' + R R'` for the unconditional state covariance
    fn stationary_covariance(&self) -> Result<DMatrix<f64>> {
        let r = self.dim();
        let lhs = DMatrix::identity(r * r, r * r) - self.transition.kronecker(&self.transition);
        let rhs = DVector::from_column_slice(self.selection_outer.as_slice());
        let solution = lhs.lu().solve(&rhs).ok_or_else(|| {
            MathError::SingularMatrix("state covariance equation has no unique solution".to_string())
        })?;
        Ok(DMatrix::from_column_slice(r, r, solution.as_slice()))
    }
}

struct FilterOutput {
    log_likelihood: f64,
    sigma2: f64,
    final_state: DVector<f64>,
}

/// Concentrated exact log-likelihood of a zero-mean series
fn kalman_filter(x: &[f64], ar: &[f64], ma: &[f64]) -> Result<FilterOutput> {
    let ss = StateSpace::new(ar, ma);
    let r = ss.dim();
    let transition_t = ss.transition.transpose();
    let mut cov = ss.stationary_covariance()?;
    let mut state = DVector::zeros(r);
    let mut gain = DVector::zeros(r);
    let mut f = 1.0;
    let mut steady = false;
    let mut sum_log_f = 0.0;
    let mut sum_scaled = 0.0;

    for &obs in x {
        if !steady {
            f = cov[(0, 0)];
            if !(f > 0.0 && f.is_finite()) {
                return Err(MathError::CalculationError(format!(
                    "prediction variance {} is not positive",
                    f
                )));
            }
            gain = &ss.transition * cov.column(0) / f;
        }

        let v = obs - state[0];
        sum_log_f += f.ln();
        sum_scaled += v * v / f;
        state = &ss.transition * &state + &gain * v;

        if !steady {
            let next = &ss.transition * &cov * &transition_t + &ss.selection_outer
                - &gain * gain.transpose() * f;
            steady = (&next - &cov).amax() < 1e-12;
            cov = next;
        }
    }

    let n = x.len() as f64;
    let sigma2 = sum_scaled / n;
    let log_likelihood = -0.5 * n * ((2.0 * PI).ln() + 1.0 + sigma2.ln()) - 0.5 * sum_log_f;
    Ok(FilterOutput {
        log_likelihood,
        sigma2,
        final_state: state,
    })
}

/// Residuals of the CSS recursion, conditioning on the first `start` observations
///
/// `start` must be at least the AR order.
fn css_residuals(x: &[f64], ar: &[f64], ma: &[f64], start: usize) -> Vec<f64> {
    let mut resid = vec![0.0; x.len()];
    for t in start..x.len() {
        let mut e = x[t];
        for (i, phi) in ar.iter().enumerate() {
            e -= phi * x[t - i - 1];
        }
        for (j, theta) in ma.iter().enumerate() {
            if t >= start + j + 1 {
                e -= theta * resid[t - j - 1];
            }
        }
        resid[t] = e;
    }
    resid.split_off(start)
}

fn css_log_likelihood(x: &[f64], params: &ArmaParams, start: usize) -> (f64, f64, usize) {
    let centered: Vec<f64> = x.iter().map(|v| v - params.mean).collect();
    let resid = css_residuals(&centered, &params.ar, &params.ma, start);
    let n = resid.len();
    let sigma2 = resid.iter().map(|e| e * e).sum::<f64>() / n as f64;
    let ll = -0.5 * n as f64 * ((2.0 * PI * sigma2).ln() + 1.0);
    (ll, sigma2, n)
}

fn exact_log_likelihood(x: &[f64], params: &ArmaParams) -> Result<FilterOutput> {
    let centered: Vec<f64> = x.iter().map(|v| v - params.mean).collect();
    kalman_filter(&centered, &params.ar, &params.ma)
}

fn starting_point(x: &[f64], spec: &ArmaSpec) -> Vec<f64> {
    let mut raw = vec![0.0; spec.n_coefficients()];
    if spec.include_mean {
        raw[0] = crate::mean(x);
    }
    raw
}

/// Estimate by conditional sum of squares
pub fn fit_css(x: &[f64], spec: ArmaSpec, optimizer: &NelderMead) -> Result<ArmaEstimate> {
    fit_css_conditioned(x, spec, spec.p, optimizer)
}

/// Estimate by conditional sum of squares over the observations after `condition`
///
/// Candidates fitted with the same `condition` share one estimation sample,
/// so their likelihoods and information criteria are comparable. Values below
/// the AR order are raised to it.
pub fn fit_css_conditioned(
    x: &[f64],
    spec: ArmaSpec,
    condition: usize,
    optimizer: &NelderMead,
) -> Result<ArmaEstimate> {
    let condition = condition.max(spec.p);
    spec.check_length(x.len().saturating_sub(condition - spec.p))?;
    let start = starting_point(x, &spec);
    let min = optimizer.minimize(
        |raw| -css_log_likelihood(x, &spec.from_unconstrained(raw), condition).0,
        &start,
    )?;

    let params = spec.from_unconstrained(&min.x);
    let (log_likelihood, sigma2, nobs) = css_log_likelihood(x, &params, condition);
    let final_state = exact_log_likelihood(x, &params)?.final_state;

    Ok(ArmaEstimate {
        spec,
        params,
        sigma2,
        log_likelihood,
        nobs,
        method: EstimationMethod::Css,
        converged: min.converged,
        evaluations: min.evaluations,
        covariance: None,
        final_state,
    })
}

/// Estimate by exact maximum likelihood, optionally warm-started
///
/// The parameter covariance is the inverse numerical Hessian of the negative
/// log-likelihood; it is `None` when the Hessian is not invertible.
pub fn fit_exact(
    x: &[f64],
    spec: ArmaSpec,
    start: Option<&ArmaParams>,
    optimizer: &NelderMead,
) -> Result<ArmaEstimate> {
    spec.check_length(x.len())?;
    let initial = match start {
        Some(params) => spec.to_unconstrained(params)?,
        None => starting_point(x, &spec),
    };
    let negative_ll = |params: &ArmaParams| match exact_log_likelihood(x, params) {
        Ok(out) => -out.log_likelihood,
        Err(_) => f64::INFINITY,
    };
    let min = optimizer.minimize(|raw| negative_ll(&spec.from_unconstrained(raw)), &initial)?;

    let params = spec.from_unconstrained(&min.x);
    let output = exact_log_likelihood(x, &params)?;

    let covariance = if spec.n_coefficients() == 0 {
        None
    } else {
        numerical_hessian(
            |raw| negative_ll(&spec.from_constrained(raw)),
            &params.to_vec(&spec),
        )
        .ok()
        .and_then(|h| h.try_inverse())
        .filter(|cov| cov.diagonal().iter().all(|v| *v > 0.0 && v.is_finite()))
    };

    Ok(ArmaEstimate {
        spec,
        params,
        sigma2: output.sigma2,
        log_likelihood: output.log_likelihood,
        nobs: x.len(),
        method: EstimationMethod::ExactMle,
        converged: min.converged,
        evaluations: min.evaluations,
        covariance,
        final_state: output.final_state,
    })
}

impl ArmaEstimate {
    /// Information criterion of the fit
    pub fn information_criterion(&self, criterion: InformationCriterion) -> f64 {
        criterion.from_log_likelihood(self.log_likelihood, self.spec.n_params(), self.nobs)
    }

    pub fn aic(&self) -> f64 {
        self.information_criterion(InformationCriterion::Aic)
    }

    pub fn bic(&self) -> f64 {
        self.information_criterion(InformationCriterion::Bic)
    }

    /// Estimated coefficients as `(name, value)` pairs in covariance order
    pub fn named_coefficients(&self) -> Vec<(String, f64)> {
        let mut out = Vec::with_capacity(self.spec.n_coefficients());
        if self.spec.include_mean {
            out.push(("const".to_string(), self.params.mean));
        }
        for (i, c) in self.params.ar.iter().enumerate() {
            out.push((format!("ar.L{}", i + 1), *c));
        }
        for (j, c) in self.params.ma.iter().enumerate() {
            out.push((format!("ma.L{}", j + 1), *c));
        }
        out
    }

    /// Standard errors in the order of [`named_coefficients`](Self::named_coefficients)
    pub fn std_errors(&self) -> Option<Vec<f64>> {
        self.covariance
            .as_ref()
            .map(|cov| cov.diagonal().iter().map(|v| v.sqrt()).collect())
    }

    /// Mean forecasts `h = 1..=steps` ahead of the end of the sample
    pub fn forecast(&self, steps: usize) -> Vec<f64> {
        let ss = StateSpace::new(&self.params.ar, &self.params.ma);
        let mut state = self.final_state.clone();
        let mut out = Vec::with_capacity(steps);
        for _ in 0..steps {
            out.push(state[0] + self.params.mean);
            state = &ss.transition * &state;
        }
        out
    }

    /// MA(∞) weights of the fitted process
    pub fn psi_weights(&self, n: usize) -> Vec<f64> {
        psi_weights(&self.params.ar, &self.params.ma, n)
    }
}
