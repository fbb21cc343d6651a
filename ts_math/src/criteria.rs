//! Information criteria for order and lag selection

use serde::{Deserialize, Serialize};
use std::fmt;

/// Penalised-likelihood score used to rank candidate model orders
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum InformationCriterion {
    /// Akaike information criterion
    #[default]
    Aic,
    /// Bayesian (Schwarz) information criterion
    Bic,
    /// Hannan-Quinn information criterion
    Hqic,
}

impl InformationCriterion {
    /// Score a model from its log-likelihood
    ///
    /// Lower is better.
    pub fn from_log_likelihood(self, log_likelihood: f64, n_params: usize, nobs: usize) -> f64 {
        let k = n_params as f64;
        let n = nobs as f64;
        let penalty = match self {
            InformationCriterion::Aic => 2.0 * k,
            InformationCriterion::Bic => k * n.ln(),
            InformationCriterion::Hqic => 2.0 * k * n.ln().ln(),
        };
        -2.0 * log_likelihood + penalty
    }

    /// Per-observation score of a multivariate system from `ln det` of the
    /// MLE residual covariance
    pub fn from_log_det(self, log_det_sigma: f64, free_params: usize, nobs: usize) -> f64 {
        let k = free_params as f64;
        let n = nobs as f64;
        let penalty = match self {
            InformationCriterion::Aic => 2.0 * k / n,
            InformationCriterion::Bic => k * n.ln() / n,
            InformationCriterion::Hqic => 2.0 * k * n.ln().ln() / n,
        };
        log_det_sigma + penalty
    }
}

impl fmt::Display for InformationCriterion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            InformationCriterion::Aic => "AIC",
            InformationCriterion::Bic => "BIC",
            InformationCriterion::Hqic => "HQIC",
        };
        write!(f, "{}", name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_penalties_order() {
        // With many observations BIC penalises harder than HQIC, which beats AIC
        let aic = InformationCriterion::Aic.from_log_likelihood(-100.0, 3, 500);
        let hqic = InformationCriterion::Hqic.from_log_likelihood(-100.0, 3, 500);
        let bic = InformationCriterion::Bic.from_log_likelihood(-100.0, 3, 500);
        assert_eq!(aic, 206.0);
        assert!(aic < hqic && hqic < bic);
        assert_eq!(InformationCriterion::Bic.to_string(), "BIC");
    }
}
