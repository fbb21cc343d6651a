//! Reference distributions for test statistics and forecast intervals

use crate::{MathError, Result};
use statrs::distribution::{ContinuousCDF, FisherSnedecor, Normal};

fn standard_normal() -> Result<Normal> {
    Normal::new(0.0, 1.0).map_err(|e| MathError::CalculationError(e.to_string()))
}

/// Standard normal cumulative distribution function
pub fn normal_cdf(x: f64) -> Result<f64> {
    Ok(standard_normal()?.cdf(x))
}

/// Two-sided critical value `z_{1 - alpha/2}` of the standard normal
///
/// `alpha = 0.05` gives approximately 1.959964.
pub fn two_sided_z(alpha: f64) -> Result<f64> {
    if !(alpha > 0.0 && alpha < 1.0) {
        return Err(MathError::InvalidInput(format!(
            "alpha must lie strictly between 0 and 1, got {}",
            alpha
        )));
    }
    Ok(standard_normal()?.inverse_cdf(1.0 - alpha / 2.0))
}

/// Upper-tail probability of an F statistic with `(df_num, df_den)` degrees of freedom
pub fn f_survival(statistic: f64, df_num: f64, df_den: f64) -> Result<f64> {
    if !statistic.is_finite() {
        return Err(MathError::CalculationError(format!(
            "F statistic is not finite ({})",
            statistic
        )));
    }
    if statistic <= 0.0 {
        return Ok(1.0);
    }
    let dist = FisherSnedecor::new(df_num, df_den)
        .map_err(|e| MathError::InvalidInput(format!("F({}, {}): {}", df_num, df_den, e)))?;
    Ok(dist.sf(statistic).clamp(0.0, 1.0))
}
