//! Augmented Dickey-Fuller stationarity checks

use crate::data::TimeSeriesTable;
use crate::error::{ForecastError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use ts_math::unit_root::{adf_test, CriticalValues};
use ts_math::MathError;

/// Significance level separating the two verdicts
pub const STATIONARITY_ALPHA: f64 = 0.05;

/// Outcome of a unit-root test at [`STATIONARITY_ALPHA`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Verdict {
    Stationary,
    #[serde(rename = "Non-Stationary")]
    NonStationary,
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Verdict::Stationary => write!(f, "Stationary"),
            Verdict::NonStationary => write!(f, "Non-Stationary"),
        }
    }
}

/// ADF result for one named series
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StationarityResult {
    pub series: String,
    pub statistic: f64,
    pub p_value: f64,
    pub critical_values: CriticalValues,
    /// Augmentation lag chosen by AIC
    pub used_lag: usize,
    /// Observations in the final regression
    pub nobs: usize,
    pub verdict: Verdict,
}

impl StationarityResult {
    pub fn is_stationary(&self) -> bool {
        self.verdict == Verdict::Stationary
    }
}

/// Run the ADF test (constant, AIC lag selection) on one series
pub fn test(series: &[f64], label: &str) -> Result<StationarityResult> {
    let adf = adf_test(series, None).map_err(|e| match e {
        MathError::InsufficientData(msg) => {
            ForecastError::InvalidInput(format!("series '{}': {}", label, msg))
        }
        other => ForecastError::NonComputableSeries {
            series: label.to_string(),
            reason: other.to_string(),
        },
    })?;

    let verdict = if adf.p_value < STATIONARITY_ALPHA {
        Verdict::Stationary
    } else {
        Verdict::NonStationary
    };

    Ok(StationarityResult {
        series: label.to_string(),
        statistic: adf.statistic,
        p_value: adf.p_value,
        critical_values: adf.critical_values,
        used_lag: adf.used_lag,
        nobs: adf.nobs,
        verdict,
    })
}

/// Test every column of a table, in column order
pub fn test_all(table: &TimeSeriesTable) -> Result<Vec<StationarityResult>> {
    table
        .columns()
        .iter()
        .enumerate()
        .map(|(i, name)| test(table.column_at(i), name))
        .collect()
}
