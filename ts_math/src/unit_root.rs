//! Unit-root and level-stationarity tests
//!
//! * Augmented Dickey-Fuller with a constant, AIC lag selection and
//!   MacKinnon (1994, 2010) response-surface p-values and critical values.
//! * KPSS level-stationarity test with a Bartlett long-run variance, used to
//!   pick the differencing order of ARIMA models.

use crate::distributions::normal_cdf;
use crate::regression::ols;
use crate::{variance, MathError, Result};
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

/// Series whose variance falls below this are treated as constant
pub const CONSTANT_VARIANCE: f64 = 1e-20;

// MacKinnon (1994) surface, constant-only regression, one variable
const TAU_MAX_C: f64 = 2.74;
const TAU_MIN_C: f64 = -18.83;
const TAU_STAR_C: f64 = -1.61;
const TAU_C_SMALLP: [f64; 3] = [2.1659, 1.4412, 0.038269];
const TAU_C_LARGEP: [f64; 4] = [1.7339, 0.93202, -0.12745, -0.010368];

// MacKinnon (2010) critical value surfaces, constant-only regression
const TAU_C_2010: [[f64; 4]; 3] = [
    [-3.43035, -6.5393, -16.786, -79.433],
    [-2.86154, -2.8903, -4.234, -40.040],
    [-2.56677, -1.5384, -2.809, 0.0],
];

// KPSS level-stationarity table
const KPSS_CRITICAL: [f64; 4] = [0.347, 0.463, 0.574, 0.739];
const KPSS_PVALUES: [f64; 4] = [0.10, 0.05, 0.025, 0.01];

/// Critical values of a test statistic at conventional sizes
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CriticalValues {
    /// 1% critical value
    pub one_percent: f64,
    /// 5% critical value
    pub five_percent: f64,
    /// 10% critical value
    pub ten_percent: f64,
}

/// Outcome of an augmented Dickey-Fuller regression
#[derive(Debug, Clone, PartialEq)]
pub struct AdfResult {
    /// t statistic of the lagged level
    pub statistic: f64,
    /// MacKinnon approximate p-value
    pub p_value: f64,
    /// Number of lagged differences kept by the AIC search
    pub used_lag: usize,
    /// Observations in the final regression
    pub nobs: usize,
    /// Finite-sample critical values
    pub critical_values: CriticalValues,
    /// Best AIC found during lag selection
    pub ic_best: f64,
}

/// Outcome of a KPSS level-stationarity test
#[derive(Debug, Clone, PartialEq)]
pub struct KpssResult {
    /// KPSS eta statistic
    pub statistic: f64,
    /// Interpolated p-value, clamped to [0.01, 0.10]
    pub p_value: f64,
    /// Bartlett truncation lag
    pub lags: usize,
}

fn polyval(coefficients: &[f64], x: f64) -> f64 {
    coefficients.iter().rev().fold(0.0, |acc, c| acc * x + c)
}

/// MacKinnon approximate p-value of an ADF statistic (constant, N = 1)
pub fn mackinnon_p_value(statistic: f64) -> Result<f64> {
    if statistic > TAU_MAX_C {
        return Ok(1.0);
    }
    if statistic < TAU_MIN_C {
        return Ok(0.0);
    }
    let z = if statistic <= TAU_STAR_C {
        polyval(&TAU_C_SMALLP, statistic)
    } else {
        polyval(&TAU_C_LARGEP, statistic)
    };
    normal_cdf(z)
}

/// MacKinnon (2010) finite-sample critical values (constant, N = 1)
pub fn mackinnon_critical_values(nobs: usize) -> CriticalValues {
    let inv = 1.0 / nobs as f64;
    let value = |row: &[f64; 4]| polyval(row, inv);
    CriticalValues {
        one_percent: value(&TAU_C_2010[0]),
        five_percent: value(&TAU_C_2010[1]),
        ten_percent: value(&TAU_C_2010[2]),
    }
}

/// Design for `Δx_t = c + γ x_{t-1} + Σ δ_j Δx_{t-j}` on rows `start..`
fn adf_design(levels: &[f64], diffs: &[f64], start: usize, lags: usize) -> (DMatrix<f64>, DVector<f64>) {
    let nobs = diffs.len() - start;
    let x = DMatrix::from_fn(nobs, 2 + lags, |r, c| {
        let t = start + r;
        match c {
            0 => 1.0,
            1 => levels[t],
            j => diffs[t - (j - 1)],
        }
    });
    let y = DVector::from_iterator(nobs, diffs[start..].iter().copied());
    (x, y)
}

/// Augmented Dickey-Fuller test with a constant and AIC lag selection
///
/// Lags `0..=max_lag` are compared on a common sample; the default bound is
/// `ceil(12 (n/100)^{1/4})`, capped at `n/2 - 2`. The chosen lag is then
/// re-estimated on the longest available sample.
pub fn adf_test(data: &[f64], max_lag: Option<usize>) -> Result<AdfResult> {
    let n = data.len();
    if variance(data) < CONSTANT_VARIANCE || n < 2 {
        return Err(MathError::InvalidInput(
            "series is constant; the unit-root regression is undefined".to_string(),
        ));
    }

    let cap = (n / 2) as i64 - 2;
    if cap < 0 {
        return Err(MathError::InsufficientData(format!(
            "{} observations are too few for an ADF regression",
            n
        )));
    }
    let default_lag = (12.0 * (n as f64 / 100.0).powf(0.25)).ceil() as i64;
    let max_lag = match max_lag {
        Some(lag) => lag,
        None => default_lag.min(cap) as usize,
    };

    let diffs: Vec<f64> = data.windows(2).map(|w| w[1] - w[0]).collect();
    if diffs.len() <= max_lag + 2 + max_lag {
        return Err(MathError::InsufficientData(format!(
            "{} observations are too few for {} ADF lags",
            n, max_lag
        )));
    }

    let mut best: Option<(usize, f64)> = None;
    for lag in 0..=max_lag {
        let (x, y) = adf_design(data, &diffs, max_lag, lag);
        let fit = ols(&x, &y)?;
        let aic = fit.aic();
        if best.map_or(true, |(_, b)| aic < b) {
            best = Some((lag, aic));
        }
    }
    let (used_lag, ic_best) = best.ok_or_else(|| {
        MathError::CalculationError("no ADF lag candidate could be evaluated".to_string())
    })?;

    let (x, y) = adf_design(data, &diffs, used_lag, used_lag);
    let fit = ols(&x, &y)?;
    let statistic = fit.t_value(1);
    if !statistic.is_finite() {
        return Err(MathError::CalculationError(
            "ADF statistic is not finite".to_string(),
        ));
    }

    Ok(AdfResult {
        statistic,
        p_value: mackinnon_p_value(statistic)?,
        used_lag,
        nobs: fit.nobs,
        critical_values: mackinnon_critical_values(fit.nobs),
        ic_best,
    })
}

/// KPSS test of level stationarity with the short Bartlett bandwidth
/// `trunc(3 sqrt(n) / 13)`
pub fn kpss_level(data: &[f64]) -> Result<KpssResult> {
    let n = data.len();
    if n < 3 {
        return Err(MathError::InsufficientData(format!(
            "{} observations are too few for a KPSS test",
            n
        )));
    }
    let m = crate::mean(data);
    let resid: Vec<f64> = data.iter().map(|v| v - m).collect();

    let mut partial = 0.0;
    let eta = resid
        .iter()
        .map(|r| {
            partial += r;
            partial * partial
        })
        .sum::<f64>()
        / (n * n) as f64;

    let lags = (3.0 * (n as f64).sqrt() / 13.0) as usize;
    let mut long_run = resid.iter().map(|r| r * r).sum::<f64>();
    for i in 1..=lags.min(n - 1) {
        let gamma: f64 = (i..n).map(|j| resid[j] * resid[j - i]).sum();
        long_run += 2.0 * (1.0 - i as f64 / (lags + 1) as f64) * gamma;
    }
    let s2 = long_run / n as f64;
    if s2 <= 0.0 {
        return Err(MathError::CalculationError(
            "long-run variance is not positive".to_string(),
        ));
    }

    let statistic = eta / s2;
    Ok(KpssResult {
        statistic,
        p_value: kpss_p_value(statistic),
        lags,
    })
}

fn kpss_p_value(statistic: f64) -> f64 {
    if statistic <= KPSS_CRITICAL[0] {
        return KPSS_PVALUES[0];
    }
    for i in 1..KPSS_CRITICAL.len() {
        if statistic <= KPSS_CRITICAL[i] {
            let w = (statistic - KPSS_CRITICAL[i - 1]) / (KPSS_CRITICAL[i] - KPSS_CRITICAL[i - 1]);
            return KPSS_PVALUES[i - 1] + w * (KPSS_PVALUES[i] - KPSS_PVALUES[i - 1]);
        }
    }
    KPSS_PVALUES[KPSS_PVALUES.len() - 1]
}

/// Number of differences needed for level stationarity according to KPSS
///
/// A constant series needs no differencing.
pub fn kpss_differencing_order(data: &[f64], alpha: f64, max_d: usize) -> Result<usize> {
    let mut series = data.to_vec();
    if variance(&series) < CONSTANT_VARIANCE {
        return Ok(0);
    }

    let mut d = 0;
    let mut needs_diff = kpss_level(&series)?.p_value < alpha;
    while needs_diff && d < max_d {
        d += 1;
        series = crate::polynomial::difference(&series, 1);
        if variance(&series) < CONSTANT_VARIANCE {
            return Ok(d);
        }
        needs_diff = kpss_level(&series)?.p_value < alpha;
    }
    Ok(d)
}
